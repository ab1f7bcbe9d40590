//! The bean definition reference writer.
//!
//! A reference describes a definition (bean type, definition type, flags and
//! annotation metadata) so the runtime can decide whether to load it without
//! loading the definition class itself. It is also the class that owns the
//! materialized annotation metadata the definition delegates to.

use super::metadata::MaterializeContext;
use super::precalculated::PrecalculatedInfo;
use crate::codegen::class::access_flags::{ACC_FINAL, ACC_PUBLIC, ACC_STATIC, ACC_SUPER, ACC_SYNTHETIC};
use crate::codegen::descriptor::{method_descriptor, JvmType};
use crate::codegen::emit::push_bool;
use crate::codegen::{ClassBuilder, GeneratedClass};
use crate::consts::names::{ANNOTATION_METADATA_FIELD, REFERENCE_SUFFIX};
use crate::consts::{annotations, types};
use crate::error::Result;
use crate::model::{AnnotationMetadata, ClassElement};

#[derive(Debug, Clone)]
pub struct BeanDefinitionReferenceWriter {
    class_name: String,
    definition: String,
    bean_type: ClassElement,
    metadata: AnnotationMetadata,
    flags: [bool; 8],
}

impl BeanDefinitionReferenceWriter {
    /// `definition` is the internal name of the referenced definition
    pub fn new(
        definition: &str,
        bean_type: &ClassElement,
        metadata: &AnnotationMetadata,
        info: &PrecalculatedInfo,
        has_exposed_types: bool,
    ) -> Self {
        let flags = [
            info.is_primary,
            metadata.has_declared_stereotype(annotations::CONTEXT),
            metadata.has_stereotype(annotations::REQUIRES),
            info.is_container_type,
            info.is_singleton,
            info.is_configuration_properties,
            has_exposed_types,
            info.requires_method_processing,
        ];
        Self {
            class_name: format!("{}{}", definition, REFERENCE_SUFFIX),
            definition: definition.to_string(),
            bean_type: bean_type.clone(),
            metadata: metadata.clone(),
            flags,
        }
    }

    /// Internal name of the generated class
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// `isPrimary`, `isContextScope`, `isConditional`, `isContainerType`,
    /// `isSingleton`, `isConfigurationProperties`, `hasExposedTypes`,
    /// `requiresMethodProcessing`
    pub fn flags(&self) -> [bool; 8] {
        self.flags
    }

    pub fn generate(&self, version: u16, verify: bool) -> Result<GeneratedClass> {
        let mut builder = ClassBuilder::new(
            &self.class_name,
            types::ABSTRACT_BEAN_DEFINITION_REFERENCE,
            &[],
            ACC_PUBLIC | ACC_FINAL | ACC_SUPER | ACC_SYNTHETIC,
            version,
        )?;
        let metadata_type = JvmType::object(types::ANNOTATION_METADATA);
        builder.add_field(ACC_PUBLIC | ACC_STATIC | ACC_FINAL, ANNOTATION_METADATA_FIELD, &metadata_type, None)?;

        let mut ctx = MaterializeContext::new(&self.class_name);
        builder.add_method(ACC_STATIC, "<clinit>", "()V", |code| {
            ctx.push_annotation_metadata(code, &self.metadata)?;
            code.putstatic(&self.class_name, ANNOTATION_METADATA_FIELD, &metadata_type)?;
            if ctx.has_defaults() {
                ctx.push_register_defaults(code)?;
            }
            code.return_void()?;
            Ok(())
        })?;
        ctx.write_load_class_methods(&mut builder)?;

        builder.add_method(ACC_PUBLIC, "<init>", "()V", |code| {
            code.aload(0);
            code.ldc_string(&self.bean_type.name)?;
            code.ldc_string(&self.definition.replace('/', "."))?;
            code.getstatic(&self.class_name, ANNOTATION_METADATA_FIELD, &metadata_type)?;
            for flag in self.flags {
                push_bool(code, flag)?;
            }
            let mut params = vec![JvmType::string(), JvmType::string(), metadata_type.clone()];
            params.extend(std::iter::repeat(JvmType::boolean()).take(self.flags.len()));
            code.invokespecial(
                types::ABSTRACT_BEAN_DEFINITION_REFERENCE,
                "<init>",
                &method_descriptor(&params, &JvmType::void()),
            )?;
            code.return_void()?;
            Ok(())
        })?;

        let definition_type = JvmType::object(types::BEAN_DEFINITION);
        builder.add_method(ACC_PUBLIC, "load", &method_descriptor(&[], &definition_type), |code| {
            code.new_instance(&self.definition)?;
            code.dup()?;
            code.invokespecial(&self.definition, "<init>", "()V")?;
            code.return_value(&definition_type)?;
            Ok(())
        })?;
        let class = JvmType::object(types::CLASS);
        let class_getter = method_descriptor(&[], &class);
        builder.add_method(ACC_PUBLIC, "getBeanDefinitionType", &class_getter, |code| {
            code.ldc_class(&JvmType::object(&self.definition))?;
            code.return_value(&class)?;
            Ok(())
        })?;
        builder.add_method(ACC_PUBLIC, "getBeanType", &class_getter, |code| {
            code.ldc_class(&self.bean_type.jvm_type())?;
            code.return_value(&class)?;
            Ok(())
        })?;
        log::debug!("wrote bean definition reference {}", self.class_name);
        builder.finish(verify)
    }
}

//! The executable methods sub-writer.
//!
//! Produces the `$Exec` companion of a definition: one method reference per
//! executable method, stored in a static array, plus the dispatch table the
//! runtime invokes them through.

use super::arguments::{argument, argument_array, ArgumentWriter};
use super::dispatch::{DispatchTarget, DispatchWriter};
use super::metadata::MaterializeContext;
use crate::codegen::class::access_flags::{ACC_FINAL, ACC_PRIVATE, ACC_PUBLIC, ACC_STATIC, ACC_SUPER, ACC_SYNTHETIC};
use crate::codegen::descriptor::{method_descriptor, JvmType};
use crate::codegen::emit::{push_array, push_bool};
use crate::codegen::{ClassBuilder, GeneratedClass};
use crate::consts::names::{EXEC_SUFFIX, INTERCEPTABLE_FIELD, METHODS_REFERENCES_FIELD};
use crate::consts::types;
use crate::error::Result;
use crate::model::MethodElement;

fn method_reference() -> JvmType {
    JvmType::object(types::EXECUTABLE_METHOD_REFERENCE)
}

/// Collects executable methods for one definition
#[derive(Debug)]
pub struct ExecutableMethodsWriter {
    class_name: String,
    methods: Vec<MethodElement>,
    reflective: Vec<bool>,
}

impl ExecutableMethodsWriter {
    /// `definition` is the internal name of the owning definition
    pub fn new(definition: &str) -> Self {
        let class_name = format!("{}{}", definition, EXEC_SUFFIX);
        Self { class_name, methods: Vec::new(), reflective: Vec::new() }
    }

    /// Internal name of the generated class
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    pub fn methods(&self) -> &[MethodElement] {
        &self.methods
    }

    /// Registers `method` and returns its index
    pub fn visit_executable_method(&mut self, method: MethodElement, requires_reflection: bool) -> usize {
        log::trace!("{}: executable method {}", self.class_name, method.name);
        self.methods.push(method);
        self.reflective.push(requires_reflection);
        self.methods.len() - 1
    }

    /// Dispatch table over the registered methods. `proxy_type` is the
    /// internal name of the generated advised subtype, when there is one.
    fn dispatch(&self, proxy_type: Option<&str>) -> DispatchWriter {
        let mut dispatch = DispatchWriter::new(&self.class_name).with_interceptable_flag(INTERCEPTABLE_FIELD);
        for (method, &requires_reflection) in self.methods.iter().zip(&self.reflective) {
            let target = if requires_reflection {
                DispatchTarget::ReflectiveMethod { method: method.clone() }
            } else if method.has_defaults() {
                DispatchTarget::KotlinDefaults { method: method.clone() }
            } else if let (Some(proxy), false) = (proxy_type, method.is_static()) {
                DispatchTarget::Interceptable { method: method.clone(), proxy_type: proxy.to_string() }
            } else {
                DispatchTarget::Method { method: method.clone() }
            };
            dispatch.add(target);
        }
        dispatch
    }

    pub fn generate(&self, proxy_type: Option<&str>, version: u16, verify: bool) -> Result<GeneratedClass> {
        let mut builder = ClassBuilder::new(
            &self.class_name,
            types::ABSTRACT_EXECUTABLE_METHODS_DEFINITION,
            &[],
            ACC_PUBLIC | ACC_FINAL | ACC_SUPER | ACC_SYNTHETIC,
            version,
        )?;
        let references = JvmType::array_of(method_reference());
        builder.add_field(ACC_PRIVATE | ACC_STATIC | ACC_FINAL, METHODS_REFERENCES_FIELD, &references, None)?;
        builder.add_field(ACC_PRIVATE | ACC_FINAL, INTERCEPTABLE_FIELD, &JvmType::boolean(), None)?;

        let mut ctx = MaterializeContext::new(&self.class_name);
        builder.add_method(ACC_STATIC, "<clinit>", "()V", |code| {
            push_array(code, &method_reference(), self.methods.len(), |code, i| {
                let method = &self.methods[i];
                code.new_instance(types::EXECUTABLE_METHOD_REFERENCE)?;
                code.dup()?;
                code.ldc_class(&method.declaring_type.jvm_type())?;
                ctx.push_annotation_metadata(code, &method.annotation_metadata)?;
                code.ldc_string(&method.name)?;
                let mut arguments = ArgumentWriter::new(&mut ctx);
                arguments.push_return_type(code, &method.return_type)?;
                arguments.push_parameters(code, &method.parameters)?;
                push_bool(code, method.modifiers.is_abstract)?;
                push_bool(code, false)?;
                let desc = method_descriptor(
                    &[
                        JvmType::object(types::CLASS),
                        JvmType::object(types::ANNOTATION_METADATA),
                        JvmType::string(),
                        argument(),
                        argument_array(),
                        JvmType::boolean(),
                        JvmType::boolean(),
                    ],
                    &JvmType::void(),
                );
                code.invokespecial(types::EXECUTABLE_METHOD_REFERENCE, "<init>", &desc)?;
                Ok(())
            })?;
            code.putstatic(&self.class_name, METHODS_REFERENCES_FIELD, &references)?;
            if ctx.has_defaults() {
                ctx.push_register_defaults(code)?;
            }
            code.return_void()?;
            Ok(())
        })?;
        ctx.write_load_class_methods(&mut builder)?;

        let with_flag = method_descriptor(&[JvmType::boolean()], &JvmType::void());
        builder.add_method(ACC_PUBLIC, "<init>", "()V", |code| {
            code.aload(0);
            code.iconst(0)?;
            code.invokespecial(&self.class_name, "<init>", &with_flag)?;
            code.return_void()?;
            Ok(())
        })?;
        builder.add_method(ACC_PUBLIC, "<init>", &with_flag, |code| {
            code.aload(0);
            code.getstatic(&self.class_name, METHODS_REFERENCES_FIELD, &references)?;
            let super_desc = method_descriptor(&[references.clone()], &JvmType::void());
            code.invokespecial(types::ABSTRACT_EXECUTABLE_METHODS_DEFINITION, "<init>", &super_desc)?;
            code.aload(0);
            code.iload(1);
            code.putfield(&self.class_name, INTERCEPTABLE_FIELD, &JvmType::boolean())?;
            code.return_void()?;
            Ok(())
        })?;
        self.dispatch(proxy_type).write(&mut builder)?;
        log::debug!("wrote executable methods {} ({} methods)", self.class_name, self.methods.len());
        builder.finish(verify)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::reader::ParsedClass;
    use crate::model::{ClassElement, Modifiers, ParameterElement};

    #[test]
    fn test_indices_follow_visit_order() {
        let svc = ClassElement::of("a.Svc");
        let mut writer = ExecutableMethodsWriter::new("a/$Svc$Definition");
        let first = writer.visit_executable_method(MethodElement::new(&svc, "start", ClassElement::of("void")), false);
        let second = writer.visit_executable_method(
            MethodElement::new(&svc, "hidden", ClassElement::of("int")).with_modifiers(Modifiers::private()),
            true,
        );
        assert_eq!((first, second), (0, 1));
        let class = ParsedClass::parse(&writer.generate(None, 61, true).unwrap().bytes).unwrap();
        assert_eq!(class.name(), "a/$Svc$Definition$Exec");
        let dispatch = class.instructions("dispatch", "(ILjava/lang/Object;[Ljava/lang/Object;)Ljava/lang/Object;");
        assert!(dispatch.iter().any(|i| i == "invokevirtual a/Svc.start()V"));
        assert!(dispatch.iter().any(|i| i.contains("ReflectionUtils.invokeMethod")));
        assert!(dispatch.iter().any(|i| i == "checkcast java/lang/Integer"));
    }

    #[test]
    fn test_interceptable_methods_use_proxy_bridge() {
        let svc = ClassElement::of("a.Svc");
        let mut writer = ExecutableMethodsWriter::new("a/$Svc$Definition");
        let method = MethodElement::new(&svc, "greet", ClassElement::of("java.lang.String"))
            .with_parameter(ParameterElement::new("name", ClassElement::of("java.lang.String")));
        writer.visit_executable_method(method, false);
        let class = ParsedClass::parse(&writer.generate(Some("a/$Svc$Intercepted"), 61, true).unwrap().bytes).unwrap();
        assert!(class.references(
            "a/$Svc$Intercepted",
            "$$access$$greet",
            "(Ljava/lang/String;)Ljava/lang/String;"
        ));
        assert!(class.has_method("<init>", "(Z)V"));
    }
}

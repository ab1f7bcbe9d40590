//! The bean definition writer.
//!
//! [`BeanDefinitionWriter`] is driven through a visitor protocol: exactly one
//! construction declaration (a constructor or a factory member), any number
//! of injection points, lifecycle and executable methods, and finally
//! [`visit_bean_definition_end`](BeanDefinitionWriter::visit_bean_definition_end).
//! Finalization writes the definition class together with its companions:
//! the `$Exec` executable methods class, interception shims and the
//! `$Reference`. [`accept`](BeanDefinitionWriter::accept) hands them to an
//! output visitor.
//!
//! Generated methods share one calling convention: slot 0 is the definition,
//! slot 1 the `BeanResolutionContext` and slot 2 the `BeanContext`.

use std::collections::HashMap;
use std::io::Write;

use indexmap::{IndexMap, IndexSet};

use super::arguments::{argument, argument_array, ArgumentWriter};
use super::dispatch::{
    dispatch_descriptor, dispatch_one_descriptor, invoke_method, kotlin_defaults_descriptor, kotlin_mask_count,
    DispatchTarget, DispatchWriter, DISPATCH, DISPATCH_ONE,
};
use super::executable::ExecutableMethodsWriter;
use super::injection::{
    is_nullable, property_of, InjectionSite, Resolution, ResolutionCall, BEAN_CONTEXT_SLOT, RESOLUTION_CONTEXT_SLOT,
};
use super::interception::{
    binding_names, constructor_shim_init, lifecycle_shim_init, write_constructor_shim, write_lifecycle_shim,
    InterceptionDecisions, InterceptionInputs, InterceptionKind, ShimNames,
};
use super::metadata::{mutate_once, register_evaluated_expressions, MaterializeContext};
use super::precalculated::PrecalculatedInfo;
use super::qualifier::{push_qualifier, resolve_qualifier, Qualifier};
use super::reference::BeanDefinitionReferenceWriter;
use crate::codegen::class::access_flags::{
    ACC_FINAL, ACC_PRIVATE, ACC_PROTECTED, ACC_PUBLIC, ACC_STATIC, ACC_SUPER, ACC_SYNTHETIC,
};
use crate::codegen::descriptor::{method_descriptor, JvmType};
use crate::codegen::emit::{
    box_if_primitive, cast_to_type, push_array, push_bool, push_class, push_default_value, push_set_of,
    push_string_or_null,
};
use crate::codegen::opcodes::{IFNONNULL, IFNULL};
use crate::codegen::signature::INSTANCEOF;
use crate::codegen::{ClassBuilder, Code, GeneratedClass, SignatureWriter};
use crate::config::Config;
use crate::consts::names::{
    ANNOTATION_INJECTIONS_FIELD, ANNOTATION_METADATA_FIELD, CONSTRUCTOR_FIELD, DEFINITION_SUFFIX, EXPOSED_TYPES_FIELD,
    INJECTION_FIELDS_FIELD, INJECTION_METHODS_FIELD, KOTLIN_DEFAULT_SUFFIX, PRECALCULATED_INFO_FIELD,
    SERVICE_BEAN_DEFINITION, SERVICE_BEAN_DEFINITION_REFERENCE, TYPE_ARGUMENTS_FIELD,
};
use crate::consts::{annotations, types};
use crate::error::{Error, Result};
use crate::model::{
    AnnotationMetadata, ClassElement, Element, FieldElement, MethodElement, ParameterElement, PropertyElement,
    VisitorContext,
};
use crate::output::ClassWriterOutputVisitor;

/// Slot of the bean instance parameter in `inject`, `initialize` and `dispose`
const BEAN_PARAMETER_SLOT: u16 = 3;

/// The element a bean is produced from
#[derive(Debug, Clone)]
pub enum ProducingElement {
    /// A class instantiated through one of its constructors
    Class(ClassElement),
    /// A factory method; `index` disambiguates overloads in the generated name
    FactoryMethod { factory: ClassElement, method: MethodElement, index: usize },
    FactoryField { factory: ClassElement, field: FieldElement },
    FactoryProperty { factory: ClassElement, property: PropertyElement },
    /// A bean registered programmatically, attributed to `originating`
    Builder { bean: ClassElement, originating: ClassElement },
}

impl ProducingElement {
    pub fn bean_type(&self) -> &ClassElement {
        match self {
            ProducingElement::Class(c) => c,
            ProducingElement::FactoryMethod { method, .. } => &method.return_type,
            ProducingElement::FactoryField { field, .. } => &field.class_element,
            ProducingElement::FactoryProperty { property, .. } => &property.class_element,
            ProducingElement::Builder { bean, .. } => bean,
        }
    }

    pub fn annotation_metadata(&self) -> &AnnotationMetadata {
        match self {
            ProducingElement::Class(c) => &c.annotation_metadata,
            ProducingElement::FactoryMethod { method, .. } => &method.annotation_metadata,
            ProducingElement::FactoryField { field, .. } => &field.annotation_metadata,
            ProducingElement::FactoryProperty { property, .. } => &property.annotation_metadata,
            ProducingElement::Builder { bean, .. } => &bean.annotation_metadata,
        }
    }

    /// The source element failures and output files are attributed to
    pub fn originating(&self) -> &dyn Element {
        match self {
            ProducingElement::Class(c) => c,
            ProducingElement::FactoryMethod { method, .. } => method,
            ProducingElement::FactoryField { field, .. } => field,
            ProducingElement::FactoryProperty { property, .. } => property,
            ProducingElement::Builder { originating, .. } => originating,
        }
    }

    /// Internal name of the definition class
    pub fn definition_name(&self) -> String {
        match self {
            ProducingElement::Class(c) | ProducingElement::Builder { bean: c, .. } => {
                format!("{}${}{}", package_prefix(c), c.simple_name(), DEFINITION_SUFFIX)
            }
            ProducingElement::FactoryMethod { factory, method, index } => format!(
                "{}${}${}{}{}",
                package_prefix(factory),
                factory.simple_name(),
                capitalize(&method.name),
                index,
                DEFINITION_SUFFIX
            ),
            ProducingElement::FactoryField { factory, field } => factory_member_name(factory, &field.name),
            ProducingElement::FactoryProperty { factory, property } => factory_member_name(factory, &property.name),
        }
    }
}

fn package_prefix(t: &ClassElement) -> String {
    match t.package_name() {
        "" => String::new(),
        package => format!("{}/", package.replace('.', "/")),
    }
}

fn factory_member_name(factory: &ClassElement, member: &str) -> String {
    format!("{}${}${}{}", package_prefix(factory), factory.simple_name(), capitalize(member), DEFINITION_SUFFIX)
}

fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    chars.next().map(|c| c.to_ascii_uppercase()).into_iter().chain(chars).collect()
}

/// How the bean instance is obtained
#[derive(Debug, Clone)]
enum Construction {
    Constructor { method: MethodElement, requires_reflection: bool },
    FactoryMethod { factory: ClassElement, method: MethodElement, dispatch_index: Option<usize> },
    FactoryField { factory: ClassElement, field: FieldElement, dispatch_index: Option<usize> },
    FactoryProperty { factory: ClassElement, getter: MethodElement },
}

impl Construction {
    fn requires_reflection(&self) -> bool {
        match self {
            Construction::Constructor { requires_reflection, .. } => *requires_reflection,
            Construction::FactoryMethod { dispatch_index, .. } | Construction::FactoryField { dispatch_index, .. } => {
                dispatch_index.is_some()
            }
            Construction::FactoryProperty { .. } => false,
        }
    }

    /// Parameters resolved as `ConstructorArgument` sites
    fn parameters(&self) -> &[ParameterElement] {
        match self {
            Construction::Constructor { method, .. } | Construction::FactoryMethod { method, .. } => &method.parameters,
            _ => &[],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MethodRole {
    Inject,
    Setter { required: bool },
    PostConstruct,
    PreDestroy,
}

#[derive(Debug, Clone)]
struct MethodInjection {
    method: MethodElement,
    role: MethodRole,
    requires_reflection: bool,
    /// Position in `$INJECTION_METHODS`; setters kept out of the
    /// descriptor have none
    index: Option<usize>,
    dispatch_index: Option<usize>,
}

#[derive(Debug, Clone)]
struct FieldInjection {
    field: FieldElement,
    requires_reflection: bool,
    dispatch_index: Option<usize>,
}

/// A property of an annotation member bean checked before the bean loads
#[derive(Debug, Clone)]
struct AnnotationInjection {
    bean_index: usize,
    property: PropertyElement,
    getter: MethodElement,
    required_value: Option<String>,
    not_equals: Option<String>,
}

#[derive(Debug, Clone)]
enum MetadataSource {
    /// The `$ANNOTATION_METADATA` field of the reference class
    Reference(String),
    Own,
}

/// Decisions fixed at finalization that method bodies depend on
#[derive(Debug)]
struct Plan {
    metadata: MetadataSource,
    info: PrecalculatedInfo,
    construct_shim: Option<String>,
    /// Shim class per entry of `methods`
    lifecycle_shims: HashMap<usize, String>,
}

#[derive(Debug, Clone)]
struct Output {
    definition: GeneratedClass,
    companions: Vec<GeneratedClass>,
    reference: Option<GeneratedClass>,
}

impl Output {
    fn classes(&self) -> impl Iterator<Item = &GeneratedClass> {
        std::iter::once(&self.definition).chain(&self.companions).chain(&self.reference)
    }
}

/// Resolved Kotlin default-argument call state
struct KotlinArguments {
    values: Vec<Option<u16>>,
    masks: Vec<u16>,
}

fn resolution_context() -> JvmType {
    JvmType::object(types::BEAN_RESOLUTION_CONTEXT)
}

fn bean_context() -> JvmType {
    JvmType::object(types::BEAN_CONTEXT)
}

fn annotation_metadata_type() -> JvmType {
    JvmType::object(types::ANNOTATION_METADATA)
}

fn instantiate_descriptor() -> String {
    method_descriptor(&[resolution_context(), bean_context()], &JvmType::java_object())
}

/// `inject`, `initialize` and `dispose` share this shape
fn bean_method_descriptor() -> String {
    method_descriptor(&[resolution_context(), bean_context(), JvmType::java_object()], &JvmType::java_object())
}

fn array_of(name: &str) -> JvmType {
    JvmType::array_of(JvmType::object(name))
}

/// Parameters with a value source are resolved even when they declare a
/// default
fn has_value_source(p: &ParameterElement) -> bool {
    let metadata = &p.annotation_metadata;
    metadata.has_stereotype(annotations::VALUE)
        || metadata.has_stereotype(annotations::PROPERTY)
        || !metadata.annotation_names_by_stereotype(annotations::QUALIFIER).is_empty()
}

/// Fills an empty `@Named` with the element name so the runtime sees the
/// qualifier the injection point resolves with
fn with_default_name(key: &str, metadata: &AnnotationMetadata, name: &str) -> AnnotationMetadata {
    let unnamed = metadata.has_declared_annotation(annotations::NAMED)
        && metadata.string_value(annotations::NAMED, "value").map_or(true, str::is_empty);
    if !unnamed {
        return metadata.clone();
    }
    mutate_once(key, metadata, |m| m.set_member(annotations::NAMED, "value", name.into()))
}

fn with_default_parameter_names(mut method: MethodElement) -> MethodElement {
    let prefix = method.description();
    for p in &mut method.parameters {
        let key = format!("{}#{}", prefix, p.name);
        p.annotation_metadata = with_default_name(&key, &p.annotation_metadata, &p.name);
    }
    method
}

/// Writes one bean definition and its companion classes
pub struct BeanDefinitionWriter<'a> {
    context: &'a dyn VisitorContext,
    config: Config,
    producing: ProducingElement,
    bean_type: ClassElement,
    metadata: AnnotationMetadata,
    definition_name: String,
    construction: Option<Construction>,
    fields: Vec<FieldInjection>,
    methods: Vec<MethodInjection>,
    method_descriptors: usize,
    annotation_injections: Vec<AnnotationInjection>,
    /// Annotation member bean types by binary name, in visit order
    annotation_beans: IndexMap<String, ClassElement>,
    type_arguments: IndexMap<String, IndexMap<String, ClassElement>>,
    intercepted_type: Option<ClassElement>,
    /// Internal name of the generated advised subtype
    proxy_type: Option<String>,
    exposed_types: Vec<String>,
    dispatch: DispatchWriter,
    executable: Option<ExecutableMethodsWriter>,
    decisions: InterceptionDecisions,
    is_abstract: bool,
    enabled: bool,
    finalized: bool,
    output: Option<Output>,
}

impl<'a> BeanDefinitionWriter<'a> {
    /// Starts a definition for the bean produced by `producing`. Invalid
    /// `@Bean(typed = ...)` declarations are reported to `context` and
    /// disable the definition.
    pub fn new(producing: ProducingElement, context: &'a dyn VisitorContext, config: Config) -> Self {
        let bean_type = producing.bean_type().clone();
        let metadata = producing.annotation_metadata().clone();
        let definition_name = producing.definition_name();
        let is_abstract = matches!(&producing, ProducingElement::Class(c) if c.is_abstract());
        // `Set.of` rejects duplicates at runtime
        let exposed_types: Vec<String> = metadata
            .annotation(annotations::BEAN)
            .map(|bean| {
                let typed: IndexSet<&str> = bean.string_values("typed").into_iter().collect();
                typed.into_iter().map(str::to_string).collect()
            })
            .unwrap_or_default();

        let mut enabled = true;
        for name in &exposed_types {
            let message = match context.class_element(name) {
                None => format!("Bean defines an exposed type [{}] that is not on the compile classpath", name),
                Some(_) if !bean_type.is_assignable(name) => {
                    format!("Bean defines an exposed type [{}] that is not implemented by the bean type", name)
                }
                Some(_) => continue,
            };
            context.fail(&message, producing.originating());
            enabled = false;
        }
        if !enabled {
            log::warn!("bean definition {} disabled, nothing will be written", definition_name);
        }
        log::debug!("bean definition start: definition={} bean={} enabled={}", definition_name, bean_type.name, enabled);

        Self {
            context,
            type_arguments: bean_type.all_type_arguments(),
            dispatch: DispatchWriter::new(&definition_name),
            config,
            producing,
            bean_type,
            metadata,
            definition_name,
            construction: None,
            fields: Vec::new(),
            methods: Vec::new(),
            method_descriptors: 0,
            annotation_injections: Vec::new(),
            annotation_beans: IndexMap::new(),
            intercepted_type: None,
            proxy_type: None,
            exposed_types,
            executable: None,
            decisions: InterceptionDecisions::default(),
            is_abstract,
            enabled,
            finalized: false,
            output: None,
        }
    }

    /// Internal name of the definition class
    pub fn bean_definition_name(&self) -> &str {
        &self.definition_name
    }

    pub fn bean_type(&self) -> &ClassElement {
        &self.bean_type
    }

    /// False once a validation failure was reported; a disabled definition
    /// finalizes to nothing
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn ensure_open(&self) -> Result<()> {
        if self.finalized {
            return Err(Error::protocol(format!("definition {} is already finalized", self.definition_name)));
        }
        Ok(())
    }

    fn ensure_constructible(&self) -> Result<()> {
        self.ensure_open()?;
        if self.construction.is_some() {
            return Err(Error::protocol(format!(
                "only a single constructor or factory may be declared for bean {}",
                self.bean_type.name
            )));
        }
        Ok(())
    }

    // ---- construction ----

    pub fn visit_bean_definition_constructor(&mut self, constructor: MethodElement, requires_reflection: bool) -> Result<()> {
        self.ensure_constructible()?;
        log::trace!("{}: constructor with {} parameters", self.definition_name, constructor.parameters.len());
        let method = with_default_parameter_names(constructor);
        self.construction = Some(Construction::Constructor { method, requires_reflection });
        Ok(())
    }

    /// Declares the implicit no-argument constructor
    pub fn visit_default_constructor(&mut self) -> Result<()> {
        let constructor = MethodElement::constructor(&self.bean_type);
        self.visit_bean_definition_constructor(constructor, false)
    }

    pub fn visit_bean_factory_method(
        &mut self,
        factory: ClassElement,
        method: MethodElement,
        requires_reflection: bool,
    ) -> Result<()> {
        self.ensure_constructible()?;
        let method = with_default_parameter_names(method);
        let dispatch_index = requires_reflection
            .then(|| self.dispatch.add(DispatchTarget::ReflectiveMethod { method: method.clone() }));
        log::trace!("{}: factory method {}.{}", self.definition_name, factory.name, method.name);
        self.construction = Some(Construction::FactoryMethod { factory, method, dispatch_index });
        Ok(())
    }

    pub fn visit_bean_factory_field(&mut self, factory: ClassElement, field: FieldElement, requires_reflection: bool) -> Result<()> {
        self.ensure_constructible()?;
        let dispatch_index = requires_reflection
            .then(|| self.dispatch.add(DispatchTarget::FieldGet { field: field.clone(), reflective: true }));
        log::trace!("{}: factory field {}.{}", self.definition_name, factory.name, field.name);
        self.construction = Some(Construction::FactoryField { factory, field, dispatch_index });
        Ok(())
    }

    pub fn visit_bean_factory_property(&mut self, factory: ClassElement, property: PropertyElement) -> Result<()> {
        self.ensure_constructible()?;
        let getter = property
            .read_method
            .clone()
            .ok_or_else(|| Error::malformed(format!("factory property {} has no getter", property.description())))?;
        log::trace!("{}: factory property {}.{}", self.definition_name, factory.name, property.name);
        self.construction = Some(Construction::FactoryProperty { factory, getter });
        Ok(())
    }

    // ---- injection points ----

    pub fn visit_field_injection_point(&mut self, field: FieldElement, requires_reflection: bool) -> Result<()> {
        self.ensure_open()?;
        let mut field = field;
        field.annotation_metadata = with_default_name(&field.description(), &field.annotation_metadata, &field.name);
        let dispatch_index = requires_reflection
            .then(|| self.dispatch.add(DispatchTarget::FieldSet { field: field.clone(), reflective: true }));
        log::trace!("{}: field {} (reflective={})", self.definition_name, field.name, requires_reflection);
        self.fields.push(FieldInjection { field, requires_reflection, dispatch_index });
        Ok(())
    }

    pub fn visit_method_injection_point(&mut self, method: MethodElement, requires_reflection: bool) -> Result<()> {
        self.add_method(method, MethodRole::Inject, requires_reflection, true)
    }

    /// A configuration-properties setter. It is only listed in
    /// `$INJECTION_METHODS` when injection points are kept; otherwise the
    /// value is read inline from the property source.
    pub fn visit_setter_value(&mut self, method: MethodElement, requires_reflection: bool, required: bool) -> Result<()> {
        if method.parameters.len() != 1 {
            return Err(Error::malformed(format!(
                "setter {} must take exactly one parameter",
                method.description()
            )));
        }
        let keep = self.config.keep_config_props_injection_points;
        self.add_method(method, MethodRole::Setter { required }, requires_reflection, keep)
    }

    pub fn visit_post_construct_method(&mut self, method: MethodElement, requires_reflection: bool) -> Result<()> {
        self.add_method(method, MethodRole::PostConstruct, requires_reflection, true)
    }

    pub fn visit_pre_destroy_method(&mut self, method: MethodElement, requires_reflection: bool) -> Result<()> {
        self.add_method(method, MethodRole::PreDestroy, requires_reflection, true)
    }

    fn add_method(&mut self, method: MethodElement, role: MethodRole, requires_reflection: bool, describe: bool) -> Result<()> {
        self.ensure_open()?;
        let method = with_default_parameter_names(method);
        let index = describe.then(|| {
            self.method_descriptors += 1;
            self.method_descriptors - 1
        });
        let dispatch_index = requires_reflection
            .then(|| self.dispatch.add(DispatchTarget::ReflectiveMethod { method: method.clone() }));
        log::trace!("{}: {:?} method {} (reflective={})", self.definition_name, role, method.name, requires_reflection);
        self.methods.push(MethodInjection { method, role, requires_reflection, index, dispatch_index });
        Ok(())
    }

    /// Registers an executable method on the `$Exec` companion and returns
    /// its dispatch index there
    pub fn visit_executable_method(&mut self, method: MethodElement, requires_reflection: bool) -> Result<usize> {
        self.ensure_open()?;
        let executable = self.executable.get_or_insert_with(|| ExecutableMethodsWriter::new(&self.definition_name));
        Ok(executable.visit_executable_method(method, requires_reflection))
    }

    /// Requires `property` of the annotation member bean `bean_type` to
    /// match before the definition loads
    pub fn visit_annotation_member_property_injection_point(
        &mut self,
        bean_type: &ClassElement,
        property: &PropertyElement,
        required_value: Option<&str>,
        not_equals: Option<&str>,
    ) -> Result<()> {
        self.ensure_open()?;
        let getter = property
            .read_method
            .clone()
            .ok_or_else(|| Error::malformed(format!("annotation member property {} has no getter", property.description())))?;
        let bean_index = match self.annotation_beans.get_index_of(&bean_type.name) {
            Some(i) => i,
            None => {
                self.annotation_beans.insert(bean_type.name.clone(), bean_type.clone());
                self.annotation_beans.len() - 1
            }
        };
        self.annotation_injections.push(AnnotationInjection {
            bean_index,
            property: property.clone(),
            getter,
            required_value: required_value.map(str::to_string),
            not_equals: not_equals.map(str::to_string),
        });
        Ok(())
    }

    // ---- types ----

    /// Replaces the type arguments recorded per type name
    pub fn visit_type_arguments(&mut self, type_arguments: IndexMap<String, IndexMap<String, ClassElement>>) -> Result<()> {
        self.ensure_open()?;
        self.type_arguments = type_arguments;
        Ok(())
    }

    /// Marks the bean as the advised form of `name`, which must be on the
    /// classpath
    pub fn visit_intercepted_type(&mut self, name: &str) -> Result<()> {
        self.ensure_open()?;
        let intercepted = self
            .context
            .class_element(name)
            .ok_or_else(|| Error::unresolvable(name, "intercepted type is not on the compile classpath"))?;
        self.intercepted_type = Some(intercepted);
        Ok(())
    }

    /// `proxy` is the internal name of the generated advised subtype whose
    /// bridge methods executable methods dispatch through
    pub fn visit_proxy_type(&mut self, proxy: &str) -> Result<()> {
        self.ensure_open()?;
        self.proxy_type = Some(proxy.to_string());
        Ok(())
    }

    // ---- finalization ----

    /// Writes every class of the definition. Valid once per writer, and
    /// only after a construction was declared.
    pub fn visit_bean_definition_end(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.finalized = true;
        if !self.enabled {
            log::debug!("skipping disabled definition {}", self.definition_name);
            return Ok(());
        }
        let construction = self.construction.as_ref().ok_or_else(|| {
            Error::protocol(format!("no constructor or factory was declared for bean {}", self.bean_type.name))
        })?;
        let version = self.config.class_version;
        let verify = self.config.verify;

        let inputs = InterceptionInputs {
            bean_type: &self.bean_type,
            metadata: &self.metadata,
            factory_method: matches!(construction, Construction::FactoryMethod { .. }),
            has_intercepted_type: self.intercepted_type.is_some(),
        };
        let mut companions = Vec::new();
        if let Some(executable) = &self.executable {
            companions.push(executable.generate(self.proxy_type.as_deref(), version, verify)?);
        }
        let mut shims = ShimNames::new(&self.definition_name);
        let construct_shim = match construction {
            Construction::Constructor { method, .. }
                if self.decisions.is_intercepted(InterceptionKind::AroundConstruct, &inputs) =>
            {
                let name = shims.next();
                companions.push(write_constructor_shim(&name, &self.definition_name, method, version, verify)?);
                Some(name)
            }
            _ => None,
        };
        let mut lifecycle_shims = HashMap::new();
        for (i, m) in self.methods.iter().enumerate() {
            let kind = match m.role {
                MethodRole::PostConstruct => InterceptionKind::PostConstruct,
                MethodRole::PreDestroy => InterceptionKind::PreDestroy,
                _ => continue,
            };
            if self.decisions.is_intercepted(kind, &inputs) {
                let name = shims.next();
                companions.push(write_lifecycle_shim(
                    &name,
                    &self.definition_name,
                    &m.method,
                    m.requires_reflection,
                    version,
                    verify,
                )?);
                lifecycle_shims.insert(i, name);
            }
        }

        let mut info = PrecalculatedInfo::compute(&self.bean_type, &self.metadata, self.is_abstract);
        let processes_on_startup = self.executable.iter().flat_map(|e| e.methods()).any(|m| {
            m.annotation_metadata.bool_value(annotations::EXECUTABLE, "processOnStartup") == Some(true)
        });
        info.requires_method_processing |= processes_on_startup;
        if info.has_evaluated_expressions || self.injection_metadata().any(AnnotationMetadata::has_evaluated_expressions) {
            info.has_evaluated_expressions = true;
            register_evaluated_expressions(&self.definition_name.replace('/', "."));
        }

        let reference = if self.config.generate_references {
            let writer = BeanDefinitionReferenceWriter::new(
                &self.definition_name,
                &self.bean_type,
                &self.metadata,
                &info,
                !self.exposed_types.is_empty(),
            );
            Some(writer.generate(version, verify)?)
        } else {
            None
        };
        let metadata = match &reference {
            Some(r) => MetadataSource::Reference(r.internal_name()),
            None => MetadataSource::Own,
        };
        let plan = Plan { metadata, info, construct_shim, lifecycle_shims };
        let definition = self.write_definition(construction, &plan)?;
        log::debug!(
            "bean definition end: definition={} companions={} reference={}",
            definition.name,
            companions.len(),
            reference.is_some()
        );
        self.output = Some(Output { definition, companions, reference });
        Ok(())
    }

    /// The definition class; available once finalized
    pub fn generated_class(&self) -> Result<&GeneratedClass> {
        self.output().map(|o| &o.definition)
    }

    /// Every generated class: the definition, its companions and the
    /// reference, in write order
    pub fn generated_classes(&self) -> Result<Vec<&GeneratedClass>> {
        Ok(self.output()?.classes().collect())
    }

    fn output(&self) -> Result<&Output> {
        self.output.as_ref().ok_or_else(|| {
            Error::protocol(format!("definition {} has not been written", self.definition_name))
        })
    }

    /// Writes the generated classes and the service registration through
    /// `visitor`. A disabled definition writes nothing.
    pub fn accept(&self, visitor: &mut dyn ClassWriterOutputVisitor) -> Result<()> {
        if self.finalized && !self.enabled {
            return Ok(());
        }
        let output = self.output()?;
        let originating = [self.producing.originating()];
        for class in output.classes() {
            let mut sink = visitor.visit_class(&class.name, &originating)?;
            sink.write_all(&class.bytes)?;
            sink.flush()?;
            log::trace!("wrote class {} ({} bytes)", class.name, class.bytes.len());
        }
        match &output.reference {
            Some(reference) => {
                visitor.visit_service_descriptor(SERVICE_BEAN_DEFINITION_REFERENCE, &reference.name, originating[0])?
            }
            None => visitor.visit_service_descriptor(SERVICE_BEAN_DEFINITION, &output.definition.name, originating[0])?,
        }
        Ok(())
    }

    fn injection_metadata(&self) -> impl Iterator<Item = &AnnotationMetadata> {
        let fields = self.fields.iter().map(|f| &f.field.annotation_metadata);
        let parameters = self
            .methods
            .iter()
            .flat_map(|m| &m.method.parameters)
            .chain(self.construction.iter().flat_map(Construction::parameters))
            .map(|p| &p.annotation_metadata);
        fields.chain(parameters)
    }

    fn has_role(&self, role: MethodRole) -> bool {
        self.methods.iter().any(|m| m.role == role)
    }

    fn described_methods(&self) -> impl Iterator<Item = &MethodInjection> {
        self.methods.iter().filter(|m| m.index.is_some())
    }

    // ---- the definition class ----

    fn write_definition(&self, construction: &Construction, plan: &Plan) -> Result<GeneratedClass> {
        let mut interfaces = Vec::new();
        if self.has_role(MethodRole::PostConstruct) {
            interfaces.push(types::INITIALIZING_BEAN_DEFINITION);
        }
        if self.has_role(MethodRole::PreDestroy) {
            interfaces.push(types::DISPOSABLE_BEAN_DEFINITION);
        }
        if self.intercepted_type.is_some() {
            interfaces.push(types::ADVISED_BEAN_TYPE);
        }
        let owner = self.definition_name.as_str();
        let mut builder = ClassBuilder::new(
            owner,
            types::ABSTRACT_BEAN_DEFINITION,
            &interfaces,
            ACC_PUBLIC | ACC_SUPER | ACC_SYNTHETIC,
            self.config.class_version,
        )?;
        builder.set_signature(&self.class_signature(&interfaces))?;
        self.write_static_fields(&mut builder, plan)?;
        self.write_constructors(&mut builder, plan)?;

        let mut ctx = MaterializeContext::new(owner);
        if !self.is_abstract {
            builder.add_method(ACC_PUBLIC, "instantiate", &instantiate_descriptor(), |code| {
                self.write_instantiate(code, construction, plan)
            })?;
        }
        builder.add_method(ACC_PUBLIC, "inject", &bean_method_descriptor(), |code| self.write_inject(code, &mut ctx))?;
        if self.has_role(MethodRole::PostConstruct) {
            builder.add_method(ACC_PUBLIC, "initialize", &bean_method_descriptor(), |code| {
                self.write_lifecycle(code, &mut ctx, plan, MethodRole::PostConstruct)
            })?;
        }
        if self.has_role(MethodRole::PreDestroy) {
            builder.add_method(ACC_PUBLIC, "dispose", &bean_method_descriptor(), |code| {
                self.write_lifecycle(code, &mut ctx, plan, MethodRole::PreDestroy)
            })?;
        }
        if !self.annotation_beans.is_empty() {
            let desc = method_descriptor(&[resolution_context(), bean_context()], &JvmType::void());
            builder.add_method(ACC_PROTECTED, "checkIfShouldLoad", &desc, |code| self.write_check_if_should_load(code))?;
        }
        if !self.exposed_types.is_empty() {
            let set = JvmType::object(types::SET);
            builder.add_method(ACC_PUBLIC, "getExposedTypes", &method_descriptor(&[], &set), |code| {
                code.getstatic(owner, EXPOSED_TYPES_FIELD, &set)?;
                code.return_value(&set)?;
                Ok(())
            })?;
        }
        if let Some(intercepted) = &self.intercepted_type {
            let class = JvmType::object(types::CLASS);
            builder.add_method(ACC_PUBLIC, "getInterceptedType", &method_descriptor(&[], &class), |code| {
                code.ldc_class(&intercepted.jvm_type())?;
                code.return_value(&class)?;
                Ok(())
            })?;
        }
        self.dispatch.write(&mut builder)?;
        builder.add_method(ACC_STATIC, "<clinit>", "()V", |code| self.write_static_init(code, &mut ctx, construction, plan))?;
        ctx.write_load_class_methods(&mut builder)?;
        builder.finish(self.config.verify)
    }

    /// `AbstractInitializableBeanDefinition<Bean>` plus the interfaces,
    /// each parameterized by the bean type
    fn class_signature(&self, interfaces: &[&str]) -> String {
        let bean = match self.bean_type.primitive_type() {
            Some(p) if !self.bean_type.is_array() => ClassElement::of(&p.wrapper().replace('/', ".")),
            _ => self.bean_type.clone(),
        };
        let mut writer = SignatureWriter::new();
        writer.visit_superclass();
        for (i, owner) in std::iter::once(&types::ABSTRACT_BEAN_DEFINITION).chain(interfaces).enumerate() {
            if i > 0 {
                writer.visit_interface();
            }
            writer.visit_class_type(owner);
            writer.visit_type_argument_wildcard(INSTANCEOF);
            bean.write_signature(&mut writer);
            writer.visit_end();
        }
        writer.as_str().to_string()
    }

    fn write_static_fields(&self, builder: &mut ClassBuilder, plan: &Plan) -> Result<()> {
        let flags = ACC_PRIVATE | ACC_STATIC | ACC_FINAL;
        if let MetadataSource::Own = plan.metadata {
            builder.add_field(ACC_PUBLIC | ACC_STATIC | ACC_FINAL, ANNOTATION_METADATA_FIELD, &annotation_metadata_type(), None)?;
        }
        builder.add_field(flags, CONSTRUCTOR_FIELD, &JvmType::object(types::METHOD_OR_FIELD_REFERENCE), None)?;
        if self.method_descriptors > 0 {
            builder.add_field(flags, INJECTION_METHODS_FIELD, &array_of(types::METHOD_REFERENCE), None)?;
        }
        if !self.fields.is_empty() {
            builder.add_field(flags, INJECTION_FIELDS_FIELD, &array_of(types::FIELD_REFERENCE), None)?;
        }
        if !self.annotation_beans.is_empty() {
            builder.add_field(flags, ANNOTATION_INJECTIONS_FIELD, &array_of(types::ANNOTATION_REFERENCE), None)?;
        }
        if !self.type_arguments.is_empty() {
            builder.add_field(flags, TYPE_ARGUMENTS_FIELD, &JvmType::object(types::MAP), None)?;
        }
        builder.add_field(flags, PRECALCULATED_INFO_FIELD, &JvmType::object(types::PRECALCULATED_INFO), None)?;
        if !self.exposed_types.is_empty() {
            builder.add_field(flags, EXPOSED_TYPES_FIELD, &JvmType::object(types::SET), None)?;
        }
        Ok(())
    }

    fn push_metadata_source(&self, code: &mut Code<'_>, plan: &Plan) -> Result<()> {
        let owner = match &plan.metadata {
            MetadataSource::Reference(reference) => reference.as_str(),
            MetadataSource::Own => self.definition_name.as_str(),
        };
        code.getstatic(owner, ANNOTATION_METADATA_FIELD, &annotation_metadata_type())?;
        Ok(())
    }

    fn write_static_init(
        &self,
        code: &mut Code<'_>,
        ctx: &mut MaterializeContext,
        construction: &Construction,
        plan: &Plan,
    ) -> Result<()> {
        let owner = self.definition_name.as_str();
        if let MetadataSource::Own = plan.metadata {
            ctx.push_annotation_metadata(code, &self.metadata)?;
            code.putstatic(owner, ANNOTATION_METADATA_FIELD, &annotation_metadata_type())?;
        }

        self.push_construction_reference(code, ctx, construction)?;
        code.putstatic(owner, CONSTRUCTOR_FIELD, &JvmType::object(types::METHOD_OR_FIELD_REFERENCE))?;

        if self.method_descriptors > 0 {
            let described: Vec<&MethodInjection> = self.described_methods().collect();
            push_array(code, &JvmType::object(types::METHOD_REFERENCE), described.len(), |code, i| {
                self.push_method_reference(code, ctx, described[i])
            })?;
            code.putstatic(owner, INJECTION_METHODS_FIELD, &array_of(types::METHOD_REFERENCE))?;
        }
        if !self.fields.is_empty() {
            push_array(code, &JvmType::object(types::FIELD_REFERENCE), self.fields.len(), |code, i| {
                let field = &self.fields[i];
                self.push_field_reference(code, ctx, &field.field, field.requires_reflection)
            })?;
            code.putstatic(owner, INJECTION_FIELDS_FIELD, &array_of(types::FIELD_REFERENCE))?;
        }
        if !self.annotation_beans.is_empty() {
            let beans: Vec<&ClassElement> = self.annotation_beans.values().collect();
            push_array(code, &JvmType::object(types::ANNOTATION_REFERENCE), beans.len(), |code, i| {
                code.new_instance(types::ANNOTATION_REFERENCE)?;
                code.dup()?;
                let bean = beans[i];
                ArgumentWriter::new(ctx).push_argument(code, bean.simple_name(), bean, &AnnotationMetadata::Empty)?;
                code.invokespecial(types::ANNOTATION_REFERENCE, "<init>", &method_descriptor(&[argument()], &JvmType::void()))?;
                Ok(())
            })?;
            code.putstatic(owner, ANNOTATION_INJECTIONS_FIELD, &array_of(types::ANNOTATION_REFERENCE))?;
        }
        if !self.type_arguments.is_empty() {
            ArgumentWriter::new(ctx).push_type_arguments_map(code, &self.type_arguments)?;
            code.putstatic(owner, TYPE_ARGUMENTS_FIELD, &JvmType::object(types::MAP))?;
        }
        plan.info.push(code)?;
        code.putstatic(owner, PRECALCULATED_INFO_FIELD, &JvmType::object(types::PRECALCULATED_INFO))?;
        if !self.exposed_types.is_empty() {
            push_set_of(code, self.exposed_types.len(), |code, i| {
                code.ldc_class(&JvmType::object(&self.exposed_types[i].replace('.', "/")))?;
                Ok(())
            })?;
            code.putstatic(owner, EXPOSED_TYPES_FIELD, &JvmType::object(types::SET))?;
        }
        if ctx.has_defaults() {
            ctx.push_register_defaults(code)?;
        }
        code.return_void()?;
        Ok(())
    }

    /// `new MethodReference(Class, String, Argument[], AnnotationMetadata, boolean)`
    fn push_simple_method_reference(
        &self,
        code: &mut Code<'_>,
        ctx: &mut MaterializeContext,
        declaring: &ClassElement,
        name: &str,
        parameters: &[ParameterElement],
        metadata: &AnnotationMetadata,
        requires_reflection: bool,
        lifecycle: Option<MethodRole>,
    ) -> Result<()> {
        code.new_instance(types::METHOD_REFERENCE)?;
        code.dup()?;
        code.ldc_class(&declaring.jvm_type())?;
        code.ldc_string(name)?;
        ArgumentWriter::new(ctx).push_parameters(code, parameters)?;
        ctx.push_annotation_metadata(code, metadata)?;
        push_bool(code, requires_reflection)?;
        let mut params = vec![
            JvmType::object(types::CLASS),
            JvmType::string(),
            argument_array(),
            annotation_metadata_type(),
            JvmType::boolean(),
        ];
        if let Some(role) = lifecycle {
            push_bool(code, role == MethodRole::PostConstruct)?;
            push_bool(code, role == MethodRole::PreDestroy)?;
            params.extend([JvmType::boolean(), JvmType::boolean()]);
        }
        code.invokespecial(types::METHOD_REFERENCE, "<init>", &method_descriptor(&params, &JvmType::void()))?;
        Ok(())
    }

    fn push_method_reference(&self, code: &mut Code<'_>, ctx: &mut MaterializeContext, m: &MethodInjection) -> Result<()> {
        let lifecycle = matches!(m.role, MethodRole::PostConstruct | MethodRole::PreDestroy).then_some(m.role);
        let method = &m.method;
        self.push_simple_method_reference(
            code,
            ctx,
            &method.declaring_type,
            &method.name,
            &method.parameters,
            &method.annotation_metadata,
            m.requires_reflection,
            lifecycle,
        )
    }

    /// `new FieldReference(Class, Argument, boolean)`
    fn push_field_reference(
        &self,
        code: &mut Code<'_>,
        ctx: &mut MaterializeContext,
        field: &FieldElement,
        requires_reflection: bool,
    ) -> Result<()> {
        code.new_instance(types::FIELD_REFERENCE)?;
        code.dup()?;
        code.ldc_class(&field.declaring_type.jvm_type())?;
        ArgumentWriter::new(ctx).push_argument(code, &field.name, &field.class_element, &field.annotation_metadata)?;
        push_bool(code, requires_reflection)?;
        let desc = method_descriptor(&[JvmType::object(types::CLASS), argument(), JvmType::boolean()], &JvmType::void());
        code.invokespecial(types::FIELD_REFERENCE, "<init>", &desc)?;
        Ok(())
    }

    fn push_construction_reference(
        &self,
        code: &mut Code<'_>,
        ctx: &mut MaterializeContext,
        construction: &Construction,
    ) -> Result<()> {
        let reflective = construction.requires_reflection();
        match construction {
            Construction::Constructor { method, .. } => self.push_simple_method_reference(
                code,
                ctx,
                &method.declaring_type,
                "<init>",
                &method.parameters,
                &method.annotation_metadata,
                reflective,
                None,
            ),
            Construction::FactoryMethod { factory, method, .. } => self.push_simple_method_reference(
                code,
                ctx,
                factory,
                &method.name,
                &method.parameters,
                &method.annotation_metadata,
                reflective,
                None,
            ),
            Construction::FactoryField { field, .. } => self.push_field_reference(code, ctx, field, reflective),
            Construction::FactoryProperty { factory, getter } => self.push_simple_method_reference(
                code,
                ctx,
                factory,
                &getter.name,
                &[],
                &getter.annotation_metadata,
                false,
                None,
            ),
        }
    }

    fn write_constructors(&self, builder: &mut ClassBuilder, plan: &Plan) -> Result<()> {
        let owner = self.definition_name.as_str();
        let class = JvmType::object(types::CLASS);
        let reference = JvmType::object(types::METHOD_OR_FIELD_REFERENCE);
        let protected_init = method_descriptor(&[class.clone(), reference.clone()], &JvmType::void());

        builder.add_method(ACC_PUBLIC, "<init>", "()V", |code| {
            code.aload(0);
            code.ldc_class(&self.bean_type.jvm_type().boxed())?;
            code.getstatic(owner, CONSTRUCTOR_FIELD, &reference)?;
            code.invokespecial(owner, "<init>", &protected_init)?;
            code.return_void()?;
            Ok(())
        })?;

        builder.add_method(ACC_PROTECTED, "<init>", &protected_init, |code| {
            code.aload(0);
            code.aload(1);
            code.aload(2);
            self.push_metadata_source(code, plan)?;
            let arrays = [
                (self.method_descriptors > 0, INJECTION_METHODS_FIELD, types::METHOD_REFERENCE),
                (!self.fields.is_empty(), INJECTION_FIELDS_FIELD, types::FIELD_REFERENCE),
                (!self.annotation_beans.is_empty(), ANNOTATION_INJECTIONS_FIELD, types::ANNOTATION_REFERENCE),
            ];
            for (present, field, component) in arrays {
                if present {
                    code.getstatic(owner, field, &array_of(component))?;
                } else {
                    code.aconst_null();
                }
            }
            match &self.executable {
                Some(executable) => {
                    code.new_instance(executable.class_name())?;
                    code.dup()?;
                    push_bool(code, self.proxy_type.is_some())?;
                    let desc = method_descriptor(&[JvmType::boolean()], &JvmType::void());
                    code.invokespecial(executable.class_name(), "<init>", &desc)?;
                }
                None => code.aconst_null(),
            }
            if self.type_arguments.is_empty() {
                code.aconst_null();
            } else {
                code.getstatic(owner, TYPE_ARGUMENTS_FIELD, &JvmType::object(types::MAP))?;
            }
            code.getstatic(owner, PRECALCULATED_INFO_FIELD, &JvmType::object(types::PRECALCULATED_INFO))?;
            let super_desc = method_descriptor(
                &[
                    class.clone(),
                    reference.clone(),
                    annotation_metadata_type(),
                    array_of(types::METHOD_REFERENCE),
                    array_of(types::FIELD_REFERENCE),
                    array_of(types::ANNOTATION_REFERENCE),
                    JvmType::object(types::EXECUTABLE_METHODS_DEFINITION),
                    JvmType::object(types::MAP),
                    JvmType::object(types::PRECALCULATED_INFO),
                ],
                &JvmType::void(),
            );
            code.invokespecial(types::ABSTRACT_BEAN_DEFINITION, "<init>", &super_desc)?;
            code.return_void()?;
            Ok(())
        })?;
        Ok(())
    }

    // ---- value resolution ----

    /// Pushes the runtime metadata of the injection point at `site`, read
    /// back from the descriptor arrays
    fn push_site_metadata(&self, code: &mut Code<'_>, site: InjectionSite) -> Result<()> {
        let owner = self.definition_name.as_str();
        match site {
            InjectionSite::ConstructorArgument { argument: index } => {
                code.getstatic(owner, CONSTRUCTOR_FIELD, &JvmType::object(types::METHOD_OR_FIELD_REFERENCE))?;
                code.checkcast(&JvmType::object(types::METHOD_REFERENCE))?;
                code.getfield(types::METHOD_REFERENCE, "arguments", &argument_array())?;
                code.iconst(index as i32)?;
                code.aaload()?;
            }
            InjectionSite::Field { field } => {
                code.getstatic(owner, INJECTION_FIELDS_FIELD, &array_of(types::FIELD_REFERENCE))?;
                code.iconst(field as i32)?;
                code.aaload()?;
                code.getfield(types::FIELD_REFERENCE, "argument", &argument())?;
            }
            InjectionSite::MethodArgument { method, argument: index } => {
                code.getstatic(owner, INJECTION_METHODS_FIELD, &array_of(types::METHOD_REFERENCE))?;
                code.iconst(method as i32)?;
                code.aaload()?;
                code.getfield(types::METHOD_REFERENCE, "arguments", &argument_array())?;
                code.iconst(index as i32)?;
                code.aaload()?;
            }
        }
        let desc = method_descriptor(&[], &annotation_metadata_type());
        code.invokeinterface(types::ARGUMENT, "getAnnotationMetadata", &desc)?;
        Ok(())
    }

    /// Pushes the raw resolved value for an injection point
    fn push_resolved(
        &self,
        code: &mut Code<'_>,
        site: InjectionSite,
        name: &str,
        t: &ClassElement,
        metadata: &AnnotationMetadata,
    ) -> Result<()> {
        let resolution = Resolution::select(t, metadata);
        let qualifier = if resolution.is_property() { Qualifier::None } else { resolve_qualifier(metadata, name) };
        let property = property_of(metadata);
        let call = ResolutionCall { property: property.as_deref(), ..ResolutionCall::new(resolution, site, t, &qualifier) };
        log::trace!("{}: resolve {} via {:?}", self.definition_name, name, resolution);
        call.emit(code, &self.definition_name, &mut |code: &mut Code<'_>| self.push_site_metadata(code, site))
    }

    fn push_resolved_parameter(&self, code: &mut Code<'_>, site: InjectionSite, p: &ParameterElement) -> Result<()> {
        self.push_resolved(code, site, &p.name, &p.class_element, &p.annotation_metadata)
    }

    // ---- instantiate ----

    fn write_instantiate(&self, code: &mut Code<'_>, construction: &Construction, plan: &Plan) -> Result<()> {
        let owner = self.definition_name.as_str();
        if !self.annotation_beans.is_empty() {
            code.aload(0);
            code.aload(RESOLUTION_CONTEXT_SLOT);
            code.aload(BEAN_CONTEXT_SLOT);
            let desc = method_descriptor(&[resolution_context(), bean_context()], &JvmType::void());
            code.invokevirtual(owner, "checkIfShouldLoad", &desc)?;
        }
        let bean = self.bean_type.jvm_type();
        match construction {
            Construction::Constructor { method, requires_reflection } => {
                if let Some(shim) = &plan.construct_shim {
                    self.push_intercepted_construction(code, method, shim)?;
                } else if *requires_reflection {
                    self.push_reflective_construction(code, method)?;
                } else if method.has_defaults() {
                    let arguments = self.resolve_kotlin_arguments(code, method)?;
                    let owner = method.declaring_type.internal_name();
                    code.new_instance(&owner)?;
                    code.dup()?;
                    self.push_kotlin_arguments(code, method, &arguments)?;
                    let mut params = method.parameter_types();
                    params.extend(std::iter::repeat(JvmType::int()).take(arguments.masks.len()));
                    params.push(JvmType::object(types::DEFAULT_CONSTRUCTOR_MARKER));
                    code.invokespecial(&owner, "<init>", &method_descriptor(&params, &JvmType::void()))?;
                } else {
                    let owner = method.declaring_type.internal_name();
                    code.new_instance(&owner)?;
                    code.dup()?;
                    for (i, p) in method.parameters.iter().enumerate() {
                        self.push_resolved_parameter(code, InjectionSite::ConstructorArgument { argument: i }, p)?;
                        cast_to_type(code, &p.class_element.jvm_type())?;
                    }
                    code.invokespecial(&owner, "<init>", &method.descriptor())?;
                }
            }
            Construction::FactoryMethod { factory, method, dispatch_index } => {
                if let Some(index) = dispatch_index {
                    code.aload(0);
                    code.iconst(*index as i32)?;
                    self.push_factory_receiver(code, factory, method.is_static())?;
                    push_array(code, &JvmType::java_object(), method.parameters.len(), |code, i| {
                        let p = &method.parameters[i];
                        self.push_resolved_parameter(code, InjectionSite::ConstructorArgument { argument: i }, p)
                    })?;
                    code.invokevirtual(owner, DISPATCH, &dispatch_descriptor())?;
                    cast_to_type(code, &bean)?;
                } else if method.has_defaults() {
                    let arguments = self.resolve_kotlin_arguments(code, method)?;
                    if !method.is_static() {
                        self.push_factory_instance(code, factory)?;
                    }
                    self.push_kotlin_arguments(code, method, &arguments)?;
                    let name = format!("{}{}", method.name, KOTLIN_DEFAULT_SUFFIX);
                    let defaults_owner = method.declaring_type.internal_name();
                    code.invokestatic(&defaults_owner, &name, &kotlin_defaults_descriptor(method))?;
                } else {
                    if !method.is_static() {
                        self.push_factory_instance(code, factory)?;
                    }
                    for (i, p) in method.parameters.iter().enumerate() {
                        self.push_resolved_parameter(code, InjectionSite::ConstructorArgument { argument: i }, p)?;
                        cast_to_type(code, &p.class_element.jvm_type())?;
                    }
                    invoke_method(code, method)?;
                }
            }
            Construction::FactoryField { factory, field, dispatch_index } => {
                let is_static = field.modifiers.is_static;
                if let Some(index) = dispatch_index {
                    code.aload(0);
                    code.iconst(*index as i32)?;
                    self.push_factory_receiver(code, factory, is_static)?;
                    code.aconst_null();
                    code.invokevirtual(owner, DISPATCH, &dispatch_descriptor())?;
                    cast_to_type(code, &bean)?;
                } else if is_static {
                    code.getstatic(&field.declaring_type.internal_name(), &field.name, &field.class_element.jvm_type())?;
                } else {
                    self.push_factory_instance(code, factory)?;
                    code.getfield(&field.declaring_type.internal_name(), &field.name, &field.class_element.jvm_type())?;
                }
            }
            Construction::FactoryProperty { factory, getter } => {
                if !getter.is_static() {
                    self.push_factory_instance(code, factory)?;
                }
                invoke_method(code, getter)?;
            }
        }
        box_if_primitive(code, &bean)?;
        let instance = code.new_local(&JvmType::java_object());
        code.astore(instance)?;
        code.aload(0);
        code.aload(RESOLUTION_CONTEXT_SLOT);
        code.aload(BEAN_CONTEXT_SLOT);
        code.aload(instance);
        code.invokevirtual(owner, "inject", &bean_method_descriptor())?;
        code.return_value(&JvmType::java_object())?;
        Ok(())
    }

    /// Looks the factory bean up through the context
    fn push_factory_instance(&self, code: &mut Code<'_>, factory: &ClassElement) -> Result<()> {
        code.aload(BEAN_CONTEXT_SLOT);
        code.checkcast(&JvmType::object(types::DEFAULT_BEAN_CONTEXT))?;
        code.aload(RESOLUTION_CONTEXT_SLOT);
        code.ldc_class(&factory.jvm_type())?;
        code.aconst_null();
        let desc = method_descriptor(
            &[resolution_context(), JvmType::object(types::CLASS), JvmType::object(types::QUALIFIER)],
            &JvmType::java_object(),
        );
        code.invokevirtual(types::DEFAULT_BEAN_CONTEXT, "getBean", &desc)?;
        code.checkcast(&factory.jvm_type())?;
        Ok(())
    }

    fn push_factory_receiver(&self, code: &mut Code<'_>, factory: &ClassElement, is_static: bool) -> Result<()> {
        if is_static {
            code.aconst_null();
            Ok(())
        } else {
            self.push_factory_instance(code, factory)
        }
    }

    fn push_reflective_construction(&self, code: &mut Code<'_>, method: &MethodElement) -> Result<()> {
        let class = JvmType::object(types::CLASS);
        let constructor = JvmType::object(types::CONSTRUCTOR);
        let object_array = JvmType::array_of(JvmType::java_object());
        code.ldc_class(&method.declaring_type.jvm_type())?;
        let params = method.parameter_types();
        push_array(code, &class, params.len(), |code, i| push_class(code, &params[i]))?;
        let lookup = method_descriptor(&[class.clone(), JvmType::array_of(class.clone())], &constructor);
        code.invokestatic(types::REFLECTION_UTILS, "getRequiredInternalConstructor", &lookup)?;
        push_array(code, &JvmType::java_object(), method.parameters.len(), |code, i| {
            self.push_resolved_parameter(code, InjectionSite::ConstructorArgument { argument: i }, &method.parameters[i])
        })?;
        let instantiate = method_descriptor(&[constructor, object_array], &JvmType::java_object());
        code.invokestatic(types::INSTANTIATION_UTILS, "instantiate", &instantiate)?;
        code.checkcast(&method.declaring_type.jvm_type())?;
        Ok(())
    }

    /// Runs the constructor through the around-construct interceptor chain
    fn push_intercepted_construction(&self, code: &mut Code<'_>, method: &MethodElement, shim: &str) -> Result<()> {
        let owner = self.definition_name.as_str();
        code.aload(RESOLUTION_CONTEXT_SLOT);
        code.aload(BEAN_CONTEXT_SLOT);

        code.aload(BEAN_CONTEXT_SLOT);
        code.ldc_class(&JvmType::object(types::INTERCEPTOR))?;
        let bindings = Qualifier::InterceptorBinding(binding_names(&self.metadata, InterceptionKind::AroundConstruct));
        push_qualifier(code, &bindings, &mut |_: &mut Code<'_>| Ok(()))?;
        let registrations = method_descriptor(
            &[JvmType::object(types::CLASS), JvmType::object(types::QUALIFIER)],
            &JvmType::object(types::COLLECTION),
        );
        code.invokeinterface(types::BEAN_CONTEXT, "getBeanRegistrations", &registrations)?;
        let copy = method_descriptor(&[JvmType::object(types::COLLECTION)], &JvmType::object(types::LIST));
        code.invokestatic_interface(types::LIST, "copyOf", &copy)?;

        code.aload(0);
        code.new_instance(shim)?;
        code.dup()?;
        code.aload(0);
        code.getstatic(owner, CONSTRUCTOR_FIELD, &JvmType::object(types::METHOD_OR_FIELD_REFERENCE))?;
        code.checkcast(&JvmType::object(types::METHOD_REFERENCE))?;
        code.getfield(types::METHOD_REFERENCE, "arguments", &argument_array())?;
        code.invokespecial(shim, "<init>", &constructor_shim_init())?;

        push_array(code, &JvmType::java_object(), method.parameters.len(), |code, i| {
            self.push_resolved_parameter(code, InjectionSite::ConstructorArgument { argument: i }, &method.parameters[i])
        })?;
        let chain = method_descriptor(
            &[
                resolution_context(),
                bean_context(),
                JvmType::object(types::LIST),
                JvmType::object(types::BEAN_DEFINITION),
                JvmType::object(types::BEAN_CONSTRUCTOR),
                JvmType::array_of(JvmType::java_object()),
            ],
            &JvmType::java_object(),
        );
        code.invokestatic(types::CONSTRUCTOR_INTERCEPTOR_CHAIN, "instantiate", &chain)?;
        code.checkcast(&method.declaring_type.jvm_type())?;
        Ok(())
    }

    /// Resolves the arguments of a Kotlin constructor or factory with
    /// default parameters into locals and computes the default masks. A
    /// default parameter with no value source always takes its default; a
    /// resolved `null` selects the default at runtime.
    fn resolve_kotlin_arguments(&self, code: &mut Code<'_>, method: &MethodElement) -> Result<KotlinArguments> {
        let count = kotlin_mask_count(method.parameters.len());
        let mut static_bits = vec![0i32; count];
        for (i, p) in method.parameters.iter().enumerate() {
            if p.has_default && !has_value_source(p) {
                static_bits[i / 32] |= 1 << (i % 32);
            }
        }
        let mut masks = Vec::with_capacity(count);
        for bits in static_bits {
            let mask = code.new_local(&JvmType::int());
            code.iconst(bits)?;
            code.istore(mask)?;
            masks.push(mask);
        }
        let mut values = Vec::with_capacity(method.parameters.len());
        for (i, p) in method.parameters.iter().enumerate() {
            if p.has_default && !has_value_source(p) {
                values.push(None);
                continue;
            }
            self.push_resolved_parameter(code, InjectionSite::ConstructorArgument { argument: i }, p)?;
            let value = code.new_local(&JvmType::java_object());
            code.astore(value)?;
            if p.has_default && Resolution::select(&p.class_element, &p.annotation_metadata).may_be_null() {
                let resolved = code.new_label();
                code.aload(value);
                code.if_zero(IFNONNULL, resolved)?;
                code.iload(masks[i / 32]);
                code.iconst(1 << (i % 32))?;
                code.ior()?;
                code.istore(masks[i / 32])?;
                code.mark(resolved);
            }
            values.push(Some(value));
        }
        Ok(KotlinArguments { values, masks })
    }

    /// Pushes the arguments, the masks and the marker of a `$default` call
    fn push_kotlin_arguments(&self, code: &mut Code<'_>, method: &MethodElement, arguments: &KotlinArguments) -> Result<()> {
        for (p, value) in method.parameters.iter().zip(&arguments.values) {
            let t = p.class_element.jvm_type();
            match value {
                None => push_default_value(code, &t)?,
                Some(value) if p.has_default && t.is_primitive() => {
                    let present = code.new_label();
                    let done = code.new_label();
                    code.aload(*value);
                    code.if_zero(IFNONNULL, present)?;
                    push_default_value(code, &t)?;
                    code.goto(done);
                    code.mark(present);
                    code.aload(*value);
                    cast_to_type(code, &t)?;
                    code.mark(done);
                }
                Some(value) => {
                    code.aload(*value);
                    cast_to_type(code, &t)?;
                }
            }
        }
        for &mask in &arguments.masks {
            code.iload(mask);
        }
        code.aconst_null();
        Ok(())
    }

    // ---- inject ----

    /// Casts the bean parameter into a typed local
    fn bean_local(&self, code: &mut Code<'_>) -> Result<u16> {
        let bean = self.bean_type.jvm_type();
        let slot = code.new_local(&bean);
        code.aload(BEAN_PARAMETER_SLOT);
        code.checkcast(&bean)?;
        code.astore(slot)?;
        Ok(slot)
    }

    fn write_inject(&self, code: &mut Code<'_>, ctx: &mut MaterializeContext) -> Result<()> {
        let injected = self.methods.iter().any(|m| matches!(m.role, MethodRole::Inject | MethodRole::Setter { .. }));
        if self.bean_type.is_primitive() || (self.fields.is_empty() && !injected) {
            code.aload(BEAN_PARAMETER_SLOT);
            code.return_value(&JvmType::java_object())?;
            return Ok(());
        }
        let bean = self.bean_local(code)?;
        for (i, f) in self.fields.iter().enumerate() {
            self.write_field_injection(code, bean, i, f)?;
        }
        for m in &self.methods {
            if matches!(m.role, MethodRole::Inject | MethodRole::Setter { .. }) {
                self.write_method_injection(code, ctx, bean, m)?;
            }
        }
        code.aload(BEAN_PARAMETER_SLOT);
        code.return_value(&JvmType::java_object())?;
        Ok(())
    }

    fn write_field_injection(&self, code: &mut Code<'_>, bean: u16, index: usize, f: &FieldInjection) -> Result<()> {
        let field = &f.field;
        let t = field.class_element.jvm_type();
        let site = InjectionSite::Field { field: index };
        let declaring = field.declaring_type.internal_name();
        let nullable = is_nullable(&field.annotation_metadata);

        if f.dispatch_index.is_none() && !nullable {
            if !field.modifiers.is_static {
                code.aload(bean);
            }
            self.push_resolved(code, site, &field.name, &field.class_element, &field.annotation_metadata)?;
            cast_to_type(code, &t)?;
            if field.modifiers.is_static {
                code.putstatic(&declaring, &field.name, &t)?;
            } else {
                code.putfield(&declaring, &field.name, &t)?;
            }
            return Ok(());
        }

        self.push_resolved(code, site, &field.name, &field.class_element, &field.annotation_metadata)?;
        let value = code.new_local(&JvmType::java_object());
        code.astore(value)?;
        let skip = code.new_label();
        if nullable {
            code.aload(value);
            code.if_zero(IFNULL, skip)?;
        }
        match f.dispatch_index {
            Some(index) => {
                code.aload(0);
                code.iconst(index as i32)?;
                code.aload(bean);
                code.aload(value);
                code.invokevirtual(&self.definition_name, DISPATCH_ONE, &dispatch_one_descriptor())?;
                code.pop_value()?;
            }
            None if field.modifiers.is_static => {
                code.aload(value);
                cast_to_type(code, &t)?;
                code.putstatic(&declaring, &field.name, &t)?;
            }
            None => {
                code.aload(bean);
                code.aload(value);
                cast_to_type(code, &t)?;
                code.putfield(&declaring, &field.name, &t)?;
            }
        }
        if nullable {
            code.mark(skip);
        }
        Ok(())
    }

    /// Pushes argument `a` of `m`: resolved through its descriptor entry,
    /// or read inline as a property for setters without one
    fn push_method_argument(&self, code: &mut Code<'_>, ctx: &mut MaterializeContext, m: &MethodInjection, a: usize) -> Result<()> {
        let p = &m.method.parameters[a];
        match m.index {
            Some(method) => self.push_resolved_parameter(code, InjectionSite::MethodArgument { method, argument: a }, p),
            None => self.push_setter_value(code, ctx, &m.method, p),
        }
    }

    fn push_setter_value(
        &self,
        code: &mut Code<'_>,
        ctx: &mut MaterializeContext,
        method: &MethodElement,
        p: &ParameterElement,
    ) -> Result<()> {
        code.aload(0);
        code.aload(RESOLUTION_CONTEXT_SLOT);
        code.aload(BEAN_CONTEXT_SLOT);
        code.ldc_string(&method.name)?;
        ArgumentWriter::new(ctx).push_argument(code, &p.name, &p.class_element, &p.annotation_metadata)?;
        let property = property_of(&p.annotation_metadata).or_else(|| property_of(&method.annotation_metadata));
        push_string_or_null(code, property.as_deref())?;
        code.aconst_null();
        let desc = method_descriptor(
            &[
                resolution_context(),
                bean_context(),
                JvmType::string(),
                argument(),
                JvmType::string(),
                JvmType::string(),
            ],
            &JvmType::java_object(),
        );
        code.invokevirtual(&self.definition_name, "getPropertyValueForSetter", &desc)?;
        Ok(())
    }

    fn write_method_injection(&self, code: &mut Code<'_>, ctx: &mut MaterializeContext, bean: u16, m: &MethodInjection) -> Result<()> {
        let method = &m.method;
        let guarded = method.parameters.len() == 1
            && (m.role == MethodRole::Setter { required: false } || is_nullable(&method.parameters[0].annotation_metadata));
        if !guarded {
            return self.invoke_injected(code, ctx, bean, m, None);
        }
        self.push_method_argument(code, ctx, m, 0)?;
        let value = code.new_local(&JvmType::java_object());
        code.astore(value)?;
        let skip = code.new_label();
        code.aload(value);
        code.if_zero(IFNULL, skip)?;
        self.invoke_injected(code, ctx, bean, m, Some(value))?;
        code.mark(skip);
        Ok(())
    }

    /// Calls `m` on the bean. `stored` holds the already resolved single
    /// argument of a guarded call.
    fn invoke_injected(
        &self,
        code: &mut Code<'_>,
        ctx: &mut MaterializeContext,
        bean: u16,
        m: &MethodInjection,
        stored: Option<u16>,
    ) -> Result<()> {
        let method = &m.method;
        let mut push_value = |code: &mut Code<'_>, a: usize| -> Result<()> {
            match stored {
                Some(value) => {
                    code.aload(value);
                    Ok(())
                }
                None => self.push_method_argument(code, ctx, m, a),
            }
        };
        if let Some(index) = m.dispatch_index {
            code.aload(0);
            code.iconst(index as i32)?;
            code.aload(bean);
            push_array(code, &JvmType::java_object(), method.parameters.len(), |code, a| push_value(code, a))?;
            code.invokevirtual(&self.definition_name, DISPATCH, &dispatch_descriptor())?;
            code.pop_value()?;
            return Ok(());
        }
        if !method.is_static() {
            code.aload(bean);
        }
        for (a, p) in method.parameters.iter().enumerate() {
            push_value(code, a)?;
            cast_to_type(code, &p.class_element.jvm_type())?;
        }
        invoke_method(code, method)?;
        if !method.return_type.is_void() {
            code.pop_value()?;
        }
        Ok(())
    }

    // ---- lifecycle ----

    fn write_lifecycle(&self, code: &mut Code<'_>, ctx: &mut MaterializeContext, plan: &Plan, role: MethodRole) -> Result<()> {
        let bean = self.bean_local(code)?;
        let chain = if role == MethodRole::PostConstruct { "initialize" } else { "dispose" };
        for (i, m) in self.methods.iter().enumerate().filter(|(_, m)| m.role == role) {
            match plan.lifecycle_shims.get(&i) {
                Some(shim) => self.push_intercepted_lifecycle(code, bean, m, shim, chain)?,
                None => self.invoke_injected(code, ctx, bean, m, None)?,
            }
        }
        code.aload(BEAN_PARAMETER_SLOT);
        code.return_value(&JvmType::java_object())?;
        Ok(())
    }

    /// Runs a lifecycle method through its interceptor chain
    fn push_intercepted_lifecycle(&self, code: &mut Code<'_>, bean: u16, m: &MethodInjection, shim: &str, chain: &str) -> Result<()> {
        code.aload(RESOLUTION_CONTEXT_SLOT);
        code.aload(BEAN_CONTEXT_SLOT);
        code.aload(0);
        code.new_instance(shim)?;
        code.dup()?;
        let parameters = &m.method.parameters;
        push_array(code, &JvmType::java_object(), parameters.len(), |code, a| match m.index {
            Some(method) => {
                self.push_resolved_parameter(code, InjectionSite::MethodArgument { method, argument: a }, &parameters[a])
            }
            None => Err(Error::malformed(format!("lifecycle method {} has no descriptor", m.method.description()))),
        })?;
        code.invokespecial(shim, "<init>", &lifecycle_shim_init())?;
        code.aload(bean);
        let desc = method_descriptor(
            &[
                resolution_context(),
                bean_context(),
                JvmType::object(types::BEAN_DEFINITION),
                JvmType::object(types::EXECUTABLE_METHOD),
                JvmType::java_object(),
            ],
            &JvmType::java_object(),
        );
        code.invokestatic(types::METHOD_INTERCEPTOR_CHAIN, chain, &desc)?;
        code.pop_value()?;
        Ok(())
    }

    // ---- conditional loading ----

    fn write_check_if_should_load(&self, code: &mut Code<'_>) -> Result<()> {
        let owner = self.definition_name.as_str();
        let lookup = method_descriptor(
            &[resolution_context(), bean_context(), JvmType::int(), JvmType::object(types::QUALIFIER)],
            &JvmType::java_object(),
        );
        let check = method_descriptor(
            &[JvmType::string(), JvmType::java_object(), JvmType::string(), JvmType::string()],
            &JvmType::void(),
        );
        for (bean_index, bean_type) in self.annotation_beans.values().enumerate() {
            code.aload(0);
            code.aload(RESOLUTION_CONTEXT_SLOT);
            code.aload(BEAN_CONTEXT_SLOT);
            code.iconst(bean_index as i32)?;
            code.aconst_null();
            code.invokevirtual(owner, "getBeanForAnnotation", &lookup)?;
            let t = bean_type.jvm_type();
            code.checkcast(&t)?;
            let bean = code.new_local(&t);
            code.astore(bean)?;
            for injection in self.annotation_injections.iter().filter(|a| a.bean_index == bean_index) {
                code.aload(0);
                code.ldc_string(&injection.property.name)?;
                code.aload(bean);
                invoke_method(code, &injection.getter)?;
                box_if_primitive(code, &injection.getter.return_type.jvm_type())?;
                push_string_or_null(code, injection.required_value.as_deref())?;
                push_string_or_null(code, injection.not_equals.as_deref())?;
                code.invokevirtual(owner, "checkInjectedBeanPropertyValue", &check)?;
            }
        }
        code.return_void()?;
        Ok(())
    }
}

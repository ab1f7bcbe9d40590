//! Construction and lifecycle interception.
//!
//! Decides whether a bean's constructor or lifecycle methods run through an
//! interceptor chain, and writes the small shim classes the chains call
//! back into. Shims are named after the owning definition with a counter
//! suffix (`$1`, `$2`, ...).

use indexmap::IndexMap;

use super::dispatch::invoke_method;
use crate::codegen::class::access_flags::{ACC_FINAL, ACC_PRIVATE, ACC_PROTECTED, ACC_PUBLIC, ACC_SUPER, ACC_SYNTHETIC};
use crate::codegen::descriptor::{method_descriptor, JvmType};
use crate::codegen::emit::{box_if_primitive, cast_to_type, push_array, push_class};
use crate::codegen::{ClassBuilder, Code, GeneratedClass};
use crate::consts::{annotations, types};
use crate::error::Result;
use crate::model::{AnnotationMetadata, ClassElement, MethodElement};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InterceptionKind {
    AroundConstruct,
    PostConstruct,
    PreDestroy,
}

impl InterceptionKind {
    /// The `kind` member value of an interceptor binding
    pub fn binding_name(&self) -> &'static str {
        match self {
            InterceptionKind::AroundConstruct => "AROUND_CONSTRUCT",
            InterceptionKind::PostConstruct => "POST_CONSTRUCT",
            InterceptionKind::PreDestroy => "PRE_DESTROY",
        }
    }
}

/// What the decision depends on, fixed once the definition knows its
/// producer and intercepted type
#[derive(Debug, Clone)]
pub struct InterceptionInputs<'a> {
    pub bean_type: &'a ClassElement,
    pub metadata: &'a AnnotationMetadata,
    /// The bean is produced by a factory method
    pub factory_method: bool,
    /// An advised subtype is generated for the bean
    pub has_intercepted_type: bool,
}

/// Per-definition cache of interception decisions
#[derive(Debug, Default)]
pub struct InterceptionDecisions {
    cache: IndexMap<InterceptionKind, bool>,
}

impl InterceptionDecisions {
    pub fn is_intercepted(&mut self, kind: InterceptionKind, inputs: &InterceptionInputs<'_>) -> bool {
        *self.cache.entry(kind).or_insert_with(|| decide(kind, inputs))
    }
}

fn has_binding_kind(metadata: &AnnotationMetadata, kind: InterceptionKind) -> bool {
    metadata.annotation(annotations::INTERCEPTOR_BINDING_DEFINITIONS).map_or(false, |defs| {
        defs.annotations("value")
            .iter()
            .any(|binding| binding.string_value("kind") == Some(kind.binding_name()))
    })
}

/// Binding annotation names declared for `kind`
pub fn binding_names(metadata: &AnnotationMetadata, kind: InterceptionKind) -> Vec<String> {
    metadata
        .annotation(annotations::INTERCEPTOR_BINDING_DEFINITIONS)
        .map(|defs| {
            defs.annotations("value")
                .into_iter()
                .filter(|binding| binding.string_value("kind") == Some(kind.binding_name()))
                .filter_map(|binding| binding.string_value("value").map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

fn decide(kind: InterceptionKind, inputs: &InterceptionInputs<'_>) -> bool {
    if inputs.bean_type.is_assignable(annotations::INTERCEPTOR) {
        return false;
    }
    let has_kind = has_binding_kind(inputs.metadata, kind);
    let proxy_target = inputs.metadata.bool_value(annotations::AROUND, "proxyTarget").unwrap_or(false)
        || inputs.factory_method;
    let decision = if proxy_target != inputs.has_intercepted_type {
        has_kind
    } else {
        has_kind && !inputs.metadata.has_stereotype(annotations::AROUND)
    };
    log::debug!("interception decision: bean={} kind={} intercept={}", inputs.bean_type.name, kind.binding_name(), decision);
    decision
}

/// Hands out shim names for one definition
#[derive(Debug)]
pub struct ShimNames {
    definition: String,
    counter: usize,
}

impl ShimNames {
    /// `definition` is the internal name of the owning definition
    pub fn new(definition: &str) -> Self {
        Self { definition: definition.to_string(), counter: 0 }
    }

    pub fn next(&mut self) -> String {
        self.counter += 1;
        format!("{}${}", self.definition, self.counter)
    }
}

const ARGUMENTS_FIELD: &str = "$arguments";

fn object_array() -> JvmType {
    JvmType::array_of(JvmType::java_object())
}

/// Descriptor of a constructor shim's constructor
pub fn constructor_shim_init() -> String {
    method_descriptor(
        &[JvmType::object(types::BEAN_DEFINITION), JvmType::array_of(JvmType::object(types::ARGUMENT))],
        &JvmType::void(),
    )
}

/// Descriptor of a lifecycle shim's constructor
pub fn lifecycle_shim_init() -> String {
    method_descriptor(&[object_array()], &JvmType::void())
}

/// Writes the `BeanConstructor` a constructor interceptor chain finishes
/// with. Its `instantiate` calls `constructor` with the chain's arguments.
pub fn write_constructor_shim(
    name: &str,
    definition: &str,
    constructor: &MethodElement,
    version: u16,
    verify: bool,
) -> Result<GeneratedClass> {
    let bean = constructor.declaring_type.internal_name();
    let mut builder = ClassBuilder::new(name, types::ABSTRACT_BEAN_CONSTRUCTOR, &[], ACC_FINAL | ACC_SUPER | ACC_SYNTHETIC, version)?;
    builder.add_inner_class(name, definition, &shim_simple_name(name), ACC_FINAL);
    builder.add_method(ACC_PUBLIC, "<init>", &constructor_shim_init(), |code| {
        code.aload(0);
        code.ldc_class(&JvmType::object(&bean))?;
        code.aload(1);
        let metadata = method_descriptor(&[], &JvmType::object(types::ANNOTATION_METADATA));
        code.invokeinterface(types::BEAN_DEFINITION, "getAnnotationMetadata", &metadata)?;
        code.aload(2);
        let super_desc = method_descriptor(
            &[
                JvmType::object(types::CLASS),
                JvmType::object(types::ANNOTATION_METADATA),
                JvmType::array_of(JvmType::object(types::ARGUMENT)),
            ],
            &JvmType::void(),
        );
        code.invokespecial(types::ABSTRACT_BEAN_CONSTRUCTOR, "<init>", &super_desc)?;
        code.return_void()?;
        Ok(())
    })?;
    let instantiate = method_descriptor(&[object_array()], &JvmType::java_object());
    builder.add_method(ACC_PUBLIC, "instantiate", &instantiate, |code| {
        code.new_instance(&bean)?;
        code.dup()?;
        push_unpacked(code, 1, constructor)?;
        code.invokespecial(&bean, "<init>", &constructor.descriptor())?;
        code.return_value(&JvmType::java_object())?;
        Ok(())
    })?;
    log::debug!("wrote constructor interception shim {}", name);
    builder.finish(verify)
}

/// Writes the `ExecutableMethod` a lifecycle interceptor chain finishes
/// with. The resolved arguments are copied into the shim when it is built.
pub fn write_lifecycle_shim(
    name: &str,
    definition: &str,
    method: &MethodElement,
    requires_reflection: bool,
    version: u16,
    verify: bool,
) -> Result<GeneratedClass> {
    let mut builder =
        ClassBuilder::new(name, types::ABSTRACT_EXECUTABLE_METHOD, &[], ACC_FINAL | ACC_SUPER | ACC_SYNTHETIC, version)?;
    builder.add_inner_class(name, definition, &shim_simple_name(name), ACC_FINAL);
    builder.add_field(ACC_PRIVATE | ACC_FINAL, ARGUMENTS_FIELD, &object_array(), None)?;
    builder.add_method(ACC_PUBLIC, "<init>", &lifecycle_shim_init(), |code| {
        code.aload(0);
        code.ldc_class(&method.declaring_type.jvm_type())?;
        code.ldc_string(&method.name)?;
        let super_desc = method_descriptor(&[JvmType::object(types::CLASS), JvmType::string()], &JvmType::void());
        code.invokespecial(types::ABSTRACT_EXECUTABLE_METHOD, "<init>", &super_desc)?;
        code.aload(0);
        code.aload(1);
        code.putfield(name, ARGUMENTS_FIELD, &object_array())?;
        code.return_void()?;
        Ok(())
    })?;
    let invoke = method_descriptor(&[JvmType::java_object(), object_array()], &JvmType::java_object());
    builder.add_method(ACC_PROTECTED, "invokeInternal", &invoke, |code| {
        if requires_reflection {
            code.aload(1);
            code.ldc_class(&method.declaring_type.jvm_type())?;
            code.ldc_string(&method.name)?;
            let params = method.parameter_types();
            let class = JvmType::object(types::CLASS);
            push_array(code, &class, params.len(), |code, i| push_class(code, &params[i]))?;
            let lookup = method_descriptor(&[class.clone(), JvmType::string(), JvmType::array_of(class)], &JvmType::object(types::METHOD));
            code.invokestatic(types::REFLECTION_UTILS, "getRequiredMethod", &lookup)?;
            code.aload(0);
            code.getfield(name, ARGUMENTS_FIELD, &object_array())?;
            let desc = method_descriptor(
                &[JvmType::java_object(), JvmType::object(types::METHOD), object_array()],
                &JvmType::java_object(),
            );
            code.invokestatic(types::REFLECTION_UTILS, "invokeMethod", &desc)?;
        } else {
            code.aload(1);
            code.checkcast(&method.declaring_type.jvm_type())?;
            code.aload(0);
            code.getfield(name, ARGUMENTS_FIELD, &object_array())?;
            let arguments = code.new_local(&object_array());
            code.astore(arguments)?;
            push_unpacked(code, arguments, method)?;
            invoke_method(code, method)?;
            let ret = method.return_type.jvm_type();
            if ret.is_void() {
                code.aconst_null();
            } else {
                box_if_primitive(code, &ret)?;
            }
        }
        code.return_value(&JvmType::java_object())?;
        Ok(())
    })?;
    log::debug!("wrote lifecycle interception shim {} for {}", name, method.name);
    builder.finish(verify)
}

fn shim_simple_name(name: &str) -> String {
    name.rsplit('$').next().unwrap_or(name).to_string()
}

/// Pushes every parameter of `method` from the `Object[]` in `slot`
fn push_unpacked(code: &mut Code<'_>, slot: u16, method: &MethodElement) -> Result<()> {
    for (i, p) in method.parameters.iter().enumerate() {
        code.aload(slot);
        code.iconst(i as i32)?;
        code.aaload()?;
        cast_to_type(code, &p.class_element.jvm_type())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::reader::ParsedClass;
    use crate::model::{AnnotationValue, ParameterElement};

    fn bound(kinds: &[&str]) -> AnnotationMetadata {
        let bindings: Vec<_> = kinds
            .iter()
            .map(|k| {
                crate::model::AnnotationMember::Annotation(
                    AnnotationValue::new(annotations::INTERCEPTOR_BINDING).with("value", "a.Logged").with("kind", *k),
                )
            })
            .collect();
        AnnotationMetadata::builder()
            .annotate(
                AnnotationValue::new(annotations::INTERCEPTOR_BINDING_DEFINITIONS)
                    .with("value", crate::model::AnnotationMember::Array(bindings)),
            )
            .build()
    }

    #[test]
    fn test_decision_requires_matching_kind() {
        let bean = ClassElement::of("a.Svc");
        let metadata = bound(&["POST_CONSTRUCT"]);
        let inputs = InterceptionInputs { bean_type: &bean, metadata: &metadata, factory_method: false, has_intercepted_type: false };
        let mut decisions = InterceptionDecisions::default();
        assert!(decisions.is_intercepted(InterceptionKind::PostConstruct, &inputs));
        assert!(!decisions.is_intercepted(InterceptionKind::AroundConstruct, &inputs));
        assert!(!decisions.is_intercepted(InterceptionKind::PreDestroy, &inputs));
    }

    #[test]
    fn test_advised_type_not_intercepted_twice() {
        let bean = ClassElement::of("a.Svc");
        let metadata = AnnotationMetadata::builder()
            .annotate(AnnotationValue::new(annotations::INTERCEPTOR_BINDING_DEFINITIONS).with(
                "value",
                crate::model::AnnotationMember::Array(vec![crate::model::AnnotationMember::Annotation(
                    AnnotationValue::new(annotations::INTERCEPTOR_BINDING).with("kind", "AROUND_CONSTRUCT"),
                )]),
            ))
            .annotate(AnnotationValue::new("a.Traced"))
            .stereotype("a.Traced", AnnotationValue::new(annotations::AROUND))
            .build();
        let mut decisions = InterceptionDecisions::default();
        let in_place = InterceptionInputs { bean_type: &bean, metadata: &metadata, factory_method: false, has_intercepted_type: true };
        assert!(decisions.is_intercepted(InterceptionKind::AroundConstruct, &in_place));
        let mut decisions = InterceptionDecisions::default();
        let subtype = InterceptionInputs { bean_type: &bean, metadata: &metadata, factory_method: false, has_intercepted_type: false };
        assert!(!decisions.is_intercepted(InterceptionKind::AroundConstruct, &subtype));
    }

    #[test]
    fn test_interceptors_are_never_intercepted() {
        let bean = ClassElement::of("a.LogInterceptor").with_interface(ClassElement::interface(annotations::INTERCEPTOR));
        let metadata = bound(&["AROUND_CONSTRUCT"]);
        let inputs = InterceptionInputs { bean_type: &bean, metadata: &metadata, factory_method: false, has_intercepted_type: false };
        assert!(!InterceptionDecisions::default().is_intercepted(InterceptionKind::AroundConstruct, &inputs));
    }

    #[test]
    fn test_shim_names_count_up() {
        let mut names = ShimNames::new("a/$Svc$Definition");
        assert_eq!(names.next(), "a/$Svc$Definition$1");
        assert_eq!(names.next(), "a/$Svc$Definition$2");
    }

    #[test]
    fn test_constructor_shim_instantiates_bean() {
        let svc = ClassElement::of("a.Svc");
        let ctor = MethodElement::constructor(&svc).with_parameter(ParameterElement::new("n", ClassElement::primitive(crate::codegen::PrimitiveType::Int)));
        let shim = write_constructor_shim("a/$Svc$Definition$1", "a/$Svc$Definition", &ctor, 61, true).unwrap();
        let class = ParsedClass::parse(&shim.bytes).unwrap();
        assert_eq!(class.super_name(), types::ABSTRACT_BEAN_CONSTRUCTOR);
        let code = class.instructions("instantiate", "([Ljava/lang/Object;)Ljava/lang/Object;");
        assert!(code.contains(&"invokevirtual java/lang/Integer.intValue()I".to_string()));
        assert!(code.contains(&"invokespecial a/Svc.<init>(I)V".to_string()));
    }
}

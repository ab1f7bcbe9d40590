//! End-to-end tests for bean definitions
//!
//! Each test drives a `BeanDefinitionWriter` through the visitor protocol and
//! inspects the generated class with the class reader.

mod common;

use beanc::codegen::{BytecodeError, ConstPoolError, PrimitiveType};
use beanc::consts::{annotations, types};
use beanc::model::{
    AnnotationMember, AnnotationMetadata, AnnotationValue, ClassElement, DefaultVisitorContext, FieldElement,
    MethodElement, Modifiers, ParameterElement, PropertyElement,
};
use beanc::{BeanDefinitionWriter, Error, ProducingElement};
use common::*;

#[cfg(test)]
mod construction_tests {
    use super::*;

    #[test]
    fn test_singleton_with_injected_field() {
        let svc = ClassElement::of("a.Svc").with_metadata(singleton());
        let class = generate(ProducingElement::Class(svc.clone()), config(), |w| {
            w.visit_default_constructor().unwrap();
            let field = FieldElement::new(&svc, "repo", ClassElement::of("a.Repo")).with_metadata(injected());
            w.visit_field_injection_point(field, false).unwrap();
        });

        let instantiate = class.instructions("instantiate", INSTANTIATE);
        assert_eq!(instantiate[0], "new a/Svc");

        let inject = class.instructions("inject", BEAN_METHOD);
        let lookups: Vec<usize> = inject
            .iter()
            .enumerate()
            .filter(|(_, i)| i.contains("getBeanForField"))
            .map(|(at, _)| at)
            .collect();
        assert_eq!(lookups.len(), 1);
        // field index, then the absent qualifier
        assert_eq!(inject[lookups[0] - 2], "iconst_0");
        assert_eq!(inject[lookups[0] - 1], "aconst_null");
        assert!(inject.contains(&"putfield a/Svc.repo:La/Repo;".to_string()));

        assert!(info_flags(&class)[2], "singleton flag");
        assert!(class.fields().iter().any(|(_, name, _)| *name == "$INJECTION_FIELDS"));
    }

    #[test]
    fn test_plain_bean_is_not_singleton() {
        let class = generate(ProducingElement::Class(ClassElement::of("a.Plain")), config(), |w| {
            w.visit_default_constructor().unwrap();
        });
        assert_eq!(info_flags(&class), vec![false; 8]);
        let clinit = class.instructions("<clinit>", "()V");
        assert!(clinit.contains(&"invokestatic java/util/Optional.empty()Ljava/util/Optional;".to_string()));
    }

    #[test]
    fn test_factory_method_for_container_type() {
        let factory = ClassElement::of("a.Factory");
        let list = ClassElement::interface("java.util.List").with_type_argument("E", ClassElement::of("a.Svc"));
        let method = MethodElement::new(&factory, "services", list);
        let producing = ProducingElement::FactoryMethod { factory: factory.clone(), method: method.clone(), index: 0 };
        let class = generate(producing, config(), |w| {
            w.visit_bean_factory_method(factory, method, false).unwrap();
        });

        assert_eq!(class.name(), "a/$Factory$Services0$Definition");
        assert_eq!(info_flags(&class), vec![false, false, false, false, false, true, false, false]);

        let instantiate = class.instructions("instantiate", INSTANTIATE);
        let lookup = instantiate
            .iter()
            .position(|i| i.starts_with("invokevirtual io/micronaut/context/DefaultBeanContext.getBean("))
            .expect("factory lookup");
        let call = instantiate
            .iter()
            .position(|i| i == "invokevirtual a/Factory.services()Ljava/util/List;")
            .expect("factory call");
        assert!(lookup < call);
        assert_eq!(
            class.signature(),
            Some("Lio/micronaut/context/AbstractInitializableBeanDefinition<Ljava/util/List<La/Svc;>;>;")
        );
    }

    #[test]
    fn test_kotlin_constructor_defaults() {
        let k = ClassElement::of("a.K");
        let constructor = MethodElement::constructor(&k)
            .with_parameter(ParameterElement::new("name", ClassElement::of("java.lang.String")).with_default())
            .with_parameter(ParameterElement::new("repo", ClassElement::of("a.Repo")));
        let class = generate(ProducingElement::Class(k), config(), |w| {
            w.visit_bean_definition_constructor(constructor, false).unwrap();
        });

        let instantiate = class.instructions("instantiate", INSTANTIATE);
        assert_eq!(instantiate[0], "iconst_1");
        assert!(instantiate[1].starts_with("istore"));
        assert_eq!(count(&instantiate, "getBeanForConstructorArgument"), 1);
        let init = instantiate
            .iter()
            .position(|i| i == "invokespecial a/K.<init>(Ljava/lang/String;La/Repo;ILkotlin/jvm/internal/DefaultConstructorMarker;)V")
            .expect("defaults constructor");
        assert_eq!(instantiate[init - 1], "aconst_null");
        assert!(instantiate[init - 2].starts_with("iload"));
    }

    #[test]
    fn test_kotlin_default_collection_is_always_supplied() {
        let k = ClassElement::of("a.Kc");
        let repos = ClassElement::interface("java.util.List").with_type_argument("E", ClassElement::of("a.Repo"));
        let named = AnnotationMetadata::builder()
            .annotate(AnnotationValue::new(annotations::NAMED).with("value", "main"))
            .stereotype(annotations::NAMED, AnnotationValue::new(annotations::QUALIFIER))
            .build();
        let constructor = MethodElement::constructor(&k)
            .with_parameter(ParameterElement::new("repos", repos).with_metadata(named).with_default());
        let class = generate(ProducingElement::Class(k), config(), |w| {
            w.visit_bean_definition_constructor(constructor, false).unwrap();
        });

        let instantiate = class.instructions("instantiate", INSTANTIATE);
        assert_eq!(instantiate[0], "iconst_0");
        assert_eq!(count(&instantiate, "getBeansOfTypeForConstructorArgument"), 1);
        assert!(!instantiate.iter().any(|i| i.starts_with("ifnonnull")), "a collection lookup never yields null");
        assert!(instantiate.iter().any(|i| i.starts_with("invokespecial a/Kc.<init>(Ljava/util/List;I")));
    }

    #[test]
    fn test_kotlin_factory_defaults() {
        let factory = ClassElement::of("a.Factory");
        let method = MethodElement::new(&factory, "create", ClassElement::of("a.Svc"))
            .with_parameter(ParameterElement::new("size", ClassElement::primitive(PrimitiveType::Int)).with_default());
        let producing = ProducingElement::FactoryMethod { factory: factory.clone(), method: method.clone(), index: 1 };
        let class = generate(producing, config(), |w| {
            w.visit_bean_factory_method(factory, method, false).unwrap();
        });

        let instantiate = class.instructions("instantiate", INSTANTIATE);
        let call = instantiate
            .iter()
            .position(|i| i == "invokestatic a/Factory.create$default(La/Factory;IILjava/lang/Object;)La/Svc;")
            .expect("defaults call");
        assert_eq!(instantiate[call - 1], "aconst_null");
        assert!(instantiate[call - 2].starts_with("iload"));
        assert_eq!(instantiate[call - 3], "iconst_0");
        assert_eq!(instantiate[0], "iconst_1");
    }

    #[test]
    fn test_reflective_constructor() {
        let svc = ClassElement::of("a.Hidden");
        let constructor = MethodElement::constructor(&svc)
            .with_modifiers(Modifiers::private())
            .with_parameter(ParameterElement::new("repo", ClassElement::of("a.Repo")));
        let class = generate(ProducingElement::Class(svc), config(), |w| {
            w.visit_bean_definition_constructor(constructor, true).unwrap();
        });
        let instantiate = class.instructions("instantiate", INSTANTIATE);
        assert!(instantiate.iter().any(|i| i.starts_with(&format!("invokestatic {}.instantiate", types::INSTANTIATION_UTILS))));
        assert!(!instantiate.iter().any(|i| i.starts_with("new a/Hidden")));
    }

    #[test]
    fn test_factory_field() {
        let factory = ClassElement::of("a.Pools");
        let field = FieldElement::new(&factory, "primary", ClassElement::of("a.Pool"));
        let producing = ProducingElement::FactoryField { factory: factory.clone(), field: field.clone() };
        let class = generate(producing, config(), |w| {
            w.visit_bean_factory_field(factory, field, false).unwrap();
        });
        assert_eq!(class.name(), "a/$Pools$Primary$Definition");
        let instantiate = class.instructions("instantiate", INSTANTIATE);
        assert!(instantiate.contains(&"getfield a/Pools.primary:La/Pool;".to_string()));
    }
}

#[cfg(test)]
mod protocol_tests {
    use super::*;

    #[test]
    fn test_second_construction_is_rejected() {
        let context = DefaultVisitorContext::new();
        let factory = ClassElement::of("a.Pools");
        let field = FieldElement::new(&factory, "pool", ClassElement::of("a.Pool"));
        let mut writer = BeanDefinitionWriter::new(
            ProducingElement::FactoryField { factory: factory.clone(), field: field.clone() },
            &context,
            config(),
        );
        writer.visit_bean_factory_field(factory.clone(), field.clone(), false).unwrap();
        let err = writer.visit_bean_factory_field(factory, field, false).unwrap_err();
        assert!(matches!(err, Error::ProtocolViolation { .. }));
    }

    #[test]
    fn test_reading_before_finalization() {
        let context = DefaultVisitorContext::new();
        let mut writer = BeanDefinitionWriter::new(ProducingElement::Class(ClassElement::of("a.Early")), &context, config());
        writer.visit_default_constructor().unwrap();
        assert!(writer.generated_class().is_err());
        assert!(writer.generated_classes().is_err());
        writer.visit_bean_definition_end().unwrap();
        assert!(writer.generated_class().is_ok());
    }

    #[test]
    fn test_setter_needs_one_parameter() {
        let context = DefaultVisitorContext::new();
        let svc = ClassElement::of("a.Conf");
        let mut writer = BeanDefinitionWriter::new(ProducingElement::Class(svc.clone()), &context, config());
        let setter = MethodElement::new(&svc, "setHost", ClassElement::primitive(PrimitiveType::Void));
        assert!(matches!(writer.visit_setter_value(setter, false, true), Err(Error::MalformedModel { .. })));
    }

    #[test]
    fn test_executable_indices_are_sequential() {
        let context = DefaultVisitorContext::new();
        let svc = ClassElement::of("a.Exec");
        let mut writer = BeanDefinitionWriter::new(ProducingElement::Class(svc.clone()), &context, config());
        writer.visit_default_constructor().unwrap();
        let void = ClassElement::primitive(PrimitiveType::Void);
        let first = writer.visit_executable_method(MethodElement::new(&svc, "start", void.clone()), false).unwrap();
        let second = writer.visit_executable_method(MethodElement::new(&svc, "stop", void), false).unwrap();
        assert_eq!((first, second), (0, 1));
        writer.visit_bean_definition_end().unwrap();
        let names: Vec<String> = writer.generated_classes().unwrap().iter().map(|c| c.name.clone()).collect();
        assert!(names.contains(&"a.$Exec$Definition$Exec".to_string()));
    }

    #[test]
    fn test_primitive_array_field_is_rejected() {
        let context = DefaultVisitorContext::new();
        let svc = ClassElement::of("a.Ports");
        let mut writer = BeanDefinitionWriter::new(ProducingElement::Class(svc.clone()), &context, config());
        writer.visit_default_constructor().unwrap();
        let ints = ClassElement::primitive(PrimitiveType::Int).to_array();
        writer.visit_field_injection_point(FieldElement::new(&svc, "ports", ints).with_metadata(injected()), false).unwrap();
        let err = writer.visit_bean_definition_end().unwrap_err();
        assert!(matches!(err, Error::MalformedModel { ref message } if message.contains("int[]")));
    }

    #[test]
    fn test_oversized_string_constant_fails_finalization() {
        let context = DefaultVisitorContext::new();
        let svc = ClassElement::of("a.Huge");
        let metadata = AnnotationMetadata::builder()
            .annotate(AnnotationValue::new(annotations::PROPERTY).with("name", "k".repeat(70_000).as_str()))
            .build();
        let mut writer = BeanDefinitionWriter::new(ProducingElement::Class(svc.clone()), &context, config());
        writer.visit_default_constructor().unwrap();
        let field = FieldElement::new(&svc, "value", ClassElement::of("java.lang.String")).with_metadata(metadata);
        writer.visit_field_injection_point(field, false).unwrap();
        let err = writer.visit_bean_definition_end().unwrap_err();
        assert!(matches!(
            err,
            Error::Bytecode(BytecodeError::ConstPool(ConstPoolError::Utf8TooLong { length: 70_000 }))
        ));
    }
}

#[cfg(test)]
mod qualifier_tests {
    use super::*;

    fn inject_of(bean: &str, field: &str, metadata: AnnotationMetadata) -> Vec<String> {
        let svc = ClassElement::of(bean);
        let class = generate(ProducingElement::Class(svc.clone()), config(), |w| {
            w.visit_default_constructor().unwrap();
            let field = FieldElement::new(&svc, field, ClassElement::of("a.DataSource")).with_metadata(metadata);
            w.visit_field_injection_point(field, false).unwrap();
        });
        class.instructions("inject", BEAN_METHOD)
    }

    fn named(value: &str) -> AnnotationMetadata {
        AnnotationMetadata::builder()
            .annotate(AnnotationValue::new(annotations::INJECT))
            .annotate(AnnotationValue::new(annotations::NAMED).with("value", value))
            .stereotype(annotations::NAMED, AnnotationValue::new(annotations::QUALIFIER))
            .build()
    }

    #[test]
    fn test_named_field() {
        let inject = inject_of("a.NamedSvc", "dataSource", named("db"));
        assert!(inject.contains(&"ldc \"db\"".to_string()));
        assert!(inject.contains(
            &"invokestatic io/micronaut/inject/qualifiers/Qualifiers.byName(Ljava/lang/String;)Lio/micronaut/context/Qualifier;"
                .to_string()
        ));
    }

    #[test]
    fn test_empty_name_falls_back_to_element_name() {
        let inject = inject_of("a.DefaultNameSvc", "reportingSource", named(""));
        assert!(inject.contains(&"ldc \"reportingSource\"".to_string()));
    }

    #[test]
    fn test_primary_wins_over_name() {
        let metadata = AnnotationMetadata::builder()
            .annotate(AnnotationValue::new(annotations::INJECT))
            .annotate(AnnotationValue::new(annotations::PRIMARY))
            .stereotype(annotations::PRIMARY, AnnotationValue::new(annotations::QUALIFIER))
            .annotate(AnnotationValue::new(annotations::NAMED).with("value", "db"))
            .stereotype(annotations::NAMED, AnnotationValue::new(annotations::QUALIFIER))
            .build();
        let inject = inject_of("a.PrimarySvc", "dataSource", metadata);
        let lookup = inject.iter().position(|i| i.contains("getBeanForField")).unwrap();
        assert_eq!(inject[lookup - 1], "aconst_null");
        assert!(!inject.iter().any(|i| i.contains("Qualifiers.byName")));
    }

    #[test]
    fn test_property_value_skips_qualifier() {
        let metadata = AnnotationMetadata::builder()
            .annotate(AnnotationValue::new(annotations::PROPERTY).with("name", "app.port"))
            .build();
        let svc = ClassElement::of("a.PortSvc");
        let class = generate(ProducingElement::Class(svc.clone()), config(), |w| {
            w.visit_default_constructor().unwrap();
            let field = FieldElement::new(&svc, "port", ClassElement::of("java.lang.Integer")).with_metadata(metadata);
            w.visit_field_injection_point(field, false).unwrap();
        });
        let inject = class.instructions("inject", BEAN_METHOD);
        assert!(inject.contains(&"ldc \"app.port\"".to_string()));
        assert!(inject.iter().any(|i| i.contains("getPropertyValueForField")));
    }

    #[test]
    fn test_several_qualifiers_are_composed() {
        let metadata = AnnotationMetadata::builder()
            .annotate(AnnotationValue::new(annotations::INJECT))
            .annotate(AnnotationValue::new(annotations::NAMED).with("value", "db"))
            .stereotype(annotations::NAMED, AnnotationValue::new(annotations::QUALIFIER))
            .annotate(AnnotationValue::new("a.Fast"))
            .stereotype("a.Fast", AnnotationValue::new(annotations::QUALIFIER))
            .build();
        let inject = inject_of("a.CompositeSvc", "dataSource", metadata);
        let position = |needle: &str| inject.iter().position(|i| i.contains(needle)).expect(needle);
        let array = position(&format!("anewarray {}", types::QUALIFIER));
        let by_name = position("Qualifiers.byName");
        let by_annotation = position("Qualifiers.byAnnotationSimple");
        let composed = inject
            .iter()
            .position(|i| {
                *i == format!(
                    "invokestatic {}.byQualifiers([L{};)L{};",
                    types::QUALIFIERS,
                    types::QUALIFIER,
                    types::QUALIFIER
                )
            })
            .expect("byQualifiers");
        assert!(array < by_name && by_name < composed);
        assert!(array < by_annotation && by_annotation < composed);
        assert_eq!(inject[array - 1], "iconst_2");
        assert!(inject[composed + 1].contains("getBeanForField"));
    }
}

#[cfg(test)]
mod setter_tests {
    use super::*;

    fn port_setter(bean: &ClassElement) -> MethodElement {
        let metadata = AnnotationMetadata::builder()
            .annotate(AnnotationValue::new(annotations::PROPERTY).with("name", "app.port"))
            .build();
        MethodElement::new(bean, "setPort", ClassElement::primitive(PrimitiveType::Void))
            .with_parameter(ParameterElement::new("port", ClassElement::of("java.lang.Integer")).with_metadata(metadata))
    }

    #[test]
    fn test_discarded_setter_descriptors() {
        let conf = ClassElement::of("a.DropConf");
        let setter = port_setter(&conf);
        let class = generate(
            ProducingElement::Class(conf),
            config().with_keep_config_props_injection_points(false),
            |w| {
                w.visit_default_constructor().unwrap();
                w.visit_setter_value(setter, false, true).unwrap();
            },
        );
        let inject = class.instructions("inject", BEAN_METHOD);
        assert!(inject.iter().any(|i| i.contains("getPropertyValueForSetter")));
        assert!(inject.contains(&"invokevirtual a/DropConf.setPort(Ljava/lang/Integer;)V".to_string()));
        assert!(!class.fields().iter().any(|(_, name, _)| *name == "$INJECTION_METHODS"));
    }

    #[test]
    fn test_kept_setter_descriptors() {
        let conf = ClassElement::of("a.KeepConf");
        let setter = port_setter(&conf);
        let class = generate(ProducingElement::Class(conf), config(), |w| {
            w.visit_default_constructor().unwrap();
            w.visit_setter_value(setter, false, false).unwrap();
        });
        let inject = class.instructions("inject", BEAN_METHOD);
        assert!(inject.iter().any(|i| i.contains("getPropertyValueForMethodArgument")));
        assert!(inject.iter().any(|i| i.starts_with("ifnull")), "optional setter is guarded");
        assert!(class.fields().iter().any(|(_, name, _)| *name == "$INJECTION_METHODS"));
    }
}

#[cfg(test)]
mod lifecycle_tests {
    use super::*;

    fn void() -> ClassElement {
        ClassElement::primitive(PrimitiveType::Void)
    }

    #[test]
    fn test_post_construct() {
        let svc = ClassElement::of("a.Started");
        let init = MethodElement::new(&svc, "init", void());
        let class = generate(ProducingElement::Class(svc), config(), |w| {
            w.visit_default_constructor().unwrap();
            w.visit_post_construct_method(init, false).unwrap();
        });
        assert!(class.interfaces().contains(&types::INITIALIZING_BEAN_DEFINITION));
        let initialize = class.instructions("initialize", BEAN_METHOD);
        assert!(initialize.contains(&"invokevirtual a/Started.init()V".to_string()));
        assert!(!class.has_method("dispose", BEAN_METHOD));
    }

    #[test]
    fn test_pre_destroy() {
        let svc = ClassElement::of("a.Stopped");
        let close = MethodElement::new(&svc, "close", void());
        let class = generate(ProducingElement::Class(svc), config(), |w| {
            w.visit_default_constructor().unwrap();
            w.visit_pre_destroy_method(close, false).unwrap();
        });
        assert!(class.interfaces().contains(&types::DISPOSABLE_BEAN_DEFINITION));
        let dispose = class.instructions("dispose", BEAN_METHOD);
        assert!(dispose.contains(&"invokevirtual a/Stopped.close()V".to_string()));
    }

    #[test]
    fn test_intercepted_post_construct() {
        let binding = AnnotationValue::new(annotations::INTERCEPTOR_BINDING)
            .with("value", "a.Log")
            .with("kind", "POST_CONSTRUCT");
        let metadata = AnnotationMetadata::builder()
            .annotate(
                AnnotationValue::new(annotations::INTERCEPTOR_BINDING_DEFINITIONS)
                    .with("value", AnnotationMember::Array(vec![AnnotationMember::Annotation(binding)])),
            )
            .build();
        let svc = ClassElement::of("a.Logged").with_metadata(metadata);
        let init = MethodElement::new(&svc, "init", void());
        let classes = generate_bytes(ProducingElement::Class(svc), config(), |w| {
            w.visit_default_constructor().unwrap();
            w.visit_post_construct_method(init, false).unwrap();
        });
        let parsed: Vec<_> = classes.iter().map(|bytes| parse(bytes)).collect();
        let definition = parsed.iter().find(|c| c.name() == "a/$Logged$Definition").expect("definition");
        let shim = parsed.iter().find(|c| c.name() == "a/$Logged$Definition$1").expect("shim");
        assert_eq!(shim.super_name(), types::ABSTRACT_EXECUTABLE_METHOD);
        let initialize = definition.instructions("initialize", BEAN_METHOD);
        assert!(initialize.iter().any(|i| i.starts_with(&format!("invokestatic {}.initialize", types::METHOD_INTERCEPTOR_CHAIN))));
        assert!(initialize.contains(&"new a/$Logged$Definition$1".to_string()));
    }
}

#[cfg(test)]
mod exposed_type_tests {
    use super::*;

    fn typed(name: &str) -> AnnotationMetadata {
        AnnotationMetadata::builder()
            .annotate(AnnotationValue::new(annotations::BEAN).with("typed", name))
            .build()
    }

    #[test]
    fn test_exposed_type_not_implemented() {
        let context = DefaultVisitorContext::new().with_class(ClassElement::of("a.Other"));
        let svc = ClassElement::of("a.Svc").with_metadata(typed("a.Other"));
        let mut writer = BeanDefinitionWriter::new(ProducingElement::Class(svc), &context, config());
        assert!(!writer.is_enabled());
        let failures = context.failures();
        assert_eq!(failures.len(), 1);
        assert!(failures[0].message.contains("not implemented by the bean type"));
        writer.visit_default_constructor().unwrap();
        writer.visit_bean_definition_end().unwrap();
        assert!(writer.generated_classes().is_err());
    }

    #[test]
    fn test_exposed_interface() {
        let api = ClassElement::interface("a.Api");
        let context = DefaultVisitorContext::new().with_class(api.clone());
        let svc = ClassElement::of("a.ApiImpl").with_interface(api).with_metadata(typed("a.Api"));
        let mut writer = BeanDefinitionWriter::new(ProducingElement::Class(svc), &context, config());
        writer.visit_default_constructor().unwrap();
        writer.visit_bean_definition_end().unwrap();
        assert!(!context.has_failures());
        let class = parse(&writer.generated_class().unwrap().bytes);
        assert!(class.has_method("getExposedTypes", "()Ljava/util/Set;"));
        assert!(class.fields().iter().any(|(_, name, _)| *name == "$EXPOSED_TYPES"));
    }

    #[test]
    fn test_duplicate_exposed_types_are_collapsed() {
        let api = ClassElement::interface("a.Api");
        let context = DefaultVisitorContext::new().with_class(api.clone());
        let typed = AnnotationMember::Array(vec!["a.Api".into(), "a.Api".into()]);
        let metadata = AnnotationMetadata::builder().annotate(AnnotationValue::new(annotations::BEAN).with("typed", typed)).build();
        let svc = ClassElement::of("a.Twice").with_interface(api).with_metadata(metadata);
        let mut writer = BeanDefinitionWriter::new(ProducingElement::Class(svc), &context, config());
        writer.visit_default_constructor().unwrap();
        writer.visit_bean_definition_end().unwrap();
        assert!(!context.has_failures());
        let class = parse(&writer.generated_class().unwrap().bytes);
        let clinit = class.instructions("<clinit>", "()V");
        assert!(clinit.contains(&"invokestatic java/util/Set.of(Ljava/lang/Object;)Ljava/util/Set;".to_string()));
        assert!(!clinit.iter().any(|i| i.starts_with("invokestatic java/util/Set.of(Ljava/lang/Object;Ljava/lang/Object;)")));
    }

    #[test]
    fn test_unresolvable_intercepted_type() {
        let context = DefaultVisitorContext::new();
        let mut writer = BeanDefinitionWriter::new(ProducingElement::Class(ClassElement::of("a.Proxy")), &context, config());
        let err = writer.visit_intercepted_type("a.Missing").unwrap_err();
        assert!(matches!(err, Error::UnresolvableType { .. }));
    }
}

#[cfg(test)]
mod generics_tests {
    use super::*;
    use indexmap::IndexMap;

    #[test]
    fn test_nested_field_type_keeps_arguments() {
        let holder = ClassElement::of("a.Holder");
        let node = ClassElement::of("a.Node")
            .with_type_argument("T", ClassElement::of("a.Node").with_type_argument("T", ClassElement::of("a.Leaf")));
        let class = generate(ProducingElement::Class(holder.clone()), config(), |w| {
            w.visit_default_constructor().unwrap();
            let field = FieldElement::new(&holder, "tree", node).with_metadata(injected());
            w.visit_field_injection_point(field, false).unwrap();
        });
        let clinit = class.instructions("<clinit>", "()V");
        assert_eq!(class_literals(&clinit, "a/Node"), 2);
        assert_eq!(class_literals(&clinit, "a/Leaf"), 1);
    }

    #[test]
    fn test_nested_list_field_keeps_element_type() {
        let holder = ClassElement::of("a.Names");
        let names = ClassElement::interface("java.util.List").with_type_argument(
            "E",
            ClassElement::interface("java.util.List").with_type_argument("E", ClassElement::of("java.lang.String")),
        );
        let class = generate(ProducingElement::Class(holder.clone()), config(), |w| {
            w.visit_default_constructor().unwrap();
            let field = FieldElement::new(&holder, "groups", names).with_metadata(injected());
            w.visit_field_injection_point(field, false).unwrap();
        });
        let clinit = class.instructions("<clinit>", "()V");
        assert!(class_literals(&clinit, "java/lang/String") >= 1);
    }

    #[test]
    fn test_primitive_array_signature() {
        let bean = ClassElement::interface("java.util.List")
            .with_type_argument("E", ClassElement::primitive(PrimitiveType::Int).to_array());
        let factory = ClassElement::of("a.Arrays");
        let method = MethodElement::new(&factory, "ints", bean);
        let producing = ProducingElement::FactoryMethod { factory: factory.clone(), method: method.clone(), index: 0 };
        let class = generate(producing, config(), |w| {
            w.visit_bean_factory_method(factory, method, false).unwrap();
        });
        assert_eq!(
            class.signature(),
            Some("Lio/micronaut/context/AbstractInitializableBeanDefinition<Ljava/util/List<[I>;>;")
        );
    }

    fn with_type_arguments(order: &[&str]) -> Vec<Vec<u8>> {
        let svc = ClassElement::of("a.Typed");
        let mut type_arguments = IndexMap::new();
        for name in order {
            let mut arguments = IndexMap::new();
            arguments.insert("T".to_string(), ClassElement::of("java.lang.String"));
            type_arguments.insert(name.to_string(), arguments);
        }
        generate_bytes(ProducingElement::Class(svc), config(), |w| {
            w.visit_default_constructor().unwrap();
            w.visit_type_arguments(type_arguments).unwrap();
        })
    }

    #[test]
    fn test_output_is_deterministic() {
        let first = with_type_arguments(&["a.Beta", "a.Alpha"]);
        let second = with_type_arguments(&["a.Beta", "a.Alpha"]);
        let reordered = with_type_arguments(&["a.Alpha", "a.Beta"]);
        assert_eq!(first, second);
        assert_eq!(first, reordered);
    }
}

#[cfg(test)]
mod interception_tests {
    use super::*;

    fn around_construct() -> AnnotationMetadata {
        let binding = AnnotationValue::new(annotations::INTERCEPTOR_BINDING)
            .with("value", "a.Audit")
            .with("kind", "AROUND_CONSTRUCT");
        AnnotationMetadata::builder()
            .annotate(
                AnnotationValue::new(annotations::INTERCEPTOR_BINDING_DEFINITIONS)
                    .with("value", AnnotationMember::Array(vec![AnnotationMember::Annotation(binding)])),
            )
            .build()
    }

    #[test]
    fn test_around_construct_runs_interceptor_chain() {
        let svc = ClassElement::of("a.Audited").with_metadata(around_construct());
        let constructor = MethodElement::constructor(&svc).with_parameter(ParameterElement::new("repo", ClassElement::of("a.Repo")));
        let classes = generate_bytes(ProducingElement::Class(svc), config(), |w| {
            w.visit_bean_definition_constructor(constructor, false).unwrap();
        });
        let parsed: Vec<_> = classes.iter().map(|bytes| parse(bytes)).collect();
        let definition = parsed.iter().find(|c| c.name() == "a/$Audited$Definition").expect("definition");
        let shim = parsed.iter().find(|c| c.name() == "a/$Audited$Definition$1").expect("constructor shim");
        assert_eq!(shim.super_name(), types::ABSTRACT_BEAN_CONSTRUCTOR);
        assert!(shim.has_method("instantiate", "([Ljava/lang/Object;)Ljava/lang/Object;"));

        let instantiate = definition.instructions("instantiate", INSTANTIATE);
        let position = |needle: &str| instantiate.iter().position(|i| i.starts_with(needle)).expect(needle);
        let bindings = position(&format!("invokestatic {}.byInterceptorBindingTypes", types::QUALIFIERS));
        let registrations = position(&format!("invokeinterface {}.getBeanRegistrations", types::BEAN_CONTEXT));
        let shim_instance = position("new a/$Audited$Definition$1");
        let argument = position("invokevirtual a/$Audited$Definition.getBeanForConstructorArgument");
        let chain = format!(
            "invokestatic {}.instantiate(L{};L{};Ljava/util/List;L{};L{};[Ljava/lang/Object;)Ljava/lang/Object;",
            types::CONSTRUCTOR_INTERCEPTOR_CHAIN,
            types::BEAN_RESOLUTION_CONTEXT,
            types::BEAN_CONTEXT,
            types::BEAN_DEFINITION,
            types::BEAN_CONSTRUCTOR
        );
        let chain = instantiate.iter().position(|i| *i == chain).expect("interceptor chain");
        assert!(bindings < registrations && registrations < shim_instance);
        assert!(shim_instance < argument && argument < chain);
        assert_eq!(instantiate[chain + 1], "checkcast a/Audited");
        assert!(!instantiate.iter().any(|i| i.starts_with("invokespecial a/Audited.<init>")));
    }

    #[test]
    fn test_proxy_type_declared_after_executable_methods() {
        let svc = ClassElement::of("a.Greeter");
        let greet = MethodElement::new(&svc, "greet", ClassElement::of("java.lang.String"))
            .with_parameter(ParameterElement::new("name", ClassElement::of("java.lang.String")));
        let classes = generate_bytes(ProducingElement::Class(svc), config(), |w| {
            w.visit_default_constructor().unwrap();
            w.visit_executable_method(greet, false).unwrap();
            w.visit_proxy_type("a/$Greeter$Intercepted").unwrap();
        });
        let parsed: Vec<_> = classes.iter().map(|bytes| parse(bytes)).collect();
        let exec = parsed.iter().find(|c| c.name() == "a/$Greeter$Definition$Exec").expect("executable methods");
        let dispatch = exec.instructions("dispatch", "(ILjava/lang/Object;[Ljava/lang/Object;)Ljava/lang/Object;");
        assert!(dispatch.contains(&"instanceof a/$Greeter$Intercepted".to_string()));
        assert!(dispatch.contains(
            &"invokevirtual a/$Greeter$Intercepted.$$access$$greet(Ljava/lang/String;)Ljava/lang/String;".to_string()
        ));
        assert!(dispatch.contains(&"invokevirtual a/Greeter.greet(Ljava/lang/String;)Ljava/lang/String;".to_string()));
    }
}

#[cfg(test)]
mod conditional_tests {
    use super::*;

    const CHECK: &str = "(Lio/micronaut/context/BeanResolutionContext;Lio/micronaut/context/BeanContext;)V";

    #[test]
    fn test_annotation_member_property_gates_loading() {
        let toggle = ClassElement::of("a.Toggle");
        let enabled = PropertyElement::with_getter(&toggle, "enabled", ClassElement::primitive(PrimitiveType::Boolean));
        let class = generate(ProducingElement::Class(ClassElement::of("a.Gated")), config(), |w| {
            w.visit_default_constructor().unwrap();
            w.visit_annotation_member_property_injection_point(&toggle, &enabled, Some("true"), None).unwrap();
        });

        let check = class.instructions("checkIfShouldLoad", CHECK);
        let position = |needle: &str| check.iter().position(|i| i == needle).expect(needle);
        let lookup = check
            .iter()
            .position(|i| i.starts_with("invokevirtual a/$Gated$Definition.getBeanForAnnotation("))
            .expect("annotation bean lookup");
        assert_eq!(check[lookup - 1], "aconst_null");
        assert_eq!(check[lookup + 1], "checkcast a/Toggle");
        let name = position("ldc \"enabled\"");
        let getter = position("invokevirtual a/Toggle.getEnabled()Z");
        let boxed = position("invokestatic java/lang/Boolean.valueOf(Z)Ljava/lang/Boolean;");
        let required = position("ldc \"true\"");
        let compare = position(
            "invokevirtual a/$Gated$Definition.checkInjectedBeanPropertyValue(Ljava/lang/String;Ljava/lang/Object;Ljava/lang/String;Ljava/lang/String;)V",
        );
        assert!(lookup < name && name < getter && getter < boxed && boxed < required && required < compare);
        assert_eq!(check[compare - 1], "aconst_null", "no not-equals value");
        assert_eq!(check.last().map(String::as_str), Some("return"));

        let instantiate = class.instructions("instantiate", INSTANTIATE);
        let gate = instantiate
            .iter()
            .position(|i| *i == format!("invokevirtual a/$Gated$Definition.checkIfShouldLoad{}", CHECK))
            .expect("gate before construction");
        let construct = instantiate.iter().position(|i| i == "new a/Gated").expect("construction");
        assert!(gate < construct);
    }

    #[test]
    fn test_no_member_properties_no_gate() {
        let class = generate(ProducingElement::Class(ClassElement::of("a.Open")), config(), |w| {
            w.visit_default_constructor().unwrap();
        });
        assert!(!class.has_method("checkIfShouldLoad", CHECK));
    }
}

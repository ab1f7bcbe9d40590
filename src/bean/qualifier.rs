//! Qualifier resolution for injection points.
//!
//! [`resolve_qualifier`] decides which qualifier an element carries;
//! [`push_qualifier`] emits the instructions that build it. Precedence:
//! an `@Any` marker without qualifiers, then `@Primary`, then a single
//! qualifier, then a composite of several, then an explicit `@Type` hint.

use crate::codegen::descriptor::{method_descriptor, JvmType};
use crate::codegen::emit::{push_array, push_list_of};
use crate::codegen::Code;
use crate::consts::{annotations, types};
use crate::error::Result;
use crate::model::AnnotationMetadata;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Qualifier {
    /// No qualifier; `null` at runtime
    None,
    Any,
    Named(String),
    /// Interceptor binding annotation names
    InterceptorBinding(Vec<String>),
    /// Qualifier by annotation, reading the element's metadata at runtime
    ByAnnotation(String),
    Composite(Vec<Qualifier>),
    /// Binary names of the types in `@Type`
    ByType(Vec<String>),
}

/// Resolves the qualifier of an element. `name` is used when `@Named` has
/// no explicit value.
pub fn resolve_qualifier(metadata: &AnnotationMetadata, name: &str) -> Qualifier {
    let qualifiers: Vec<&str> = metadata
        .annotation_names_by_stereotype(annotations::QUALIFIER)
        .into_iter()
        .filter(|q| *q != annotations::ANY)
        .collect();
    if qualifiers.is_empty() && metadata.has_annotation(annotations::ANY) {
        return Qualifier::Any;
    }
    if qualifiers.contains(&annotations::PRIMARY) {
        return Qualifier::None;
    }
    match qualifiers.as_slice() {
        [] => {
            let types = metadata
                .annotation(annotations::TYPE)
                .map(|t| t.string_values("value").into_iter().map(str::to_string).collect::<Vec<_>>())
                .unwrap_or_default();
            if types.is_empty() {
                Qualifier::None
            } else {
                Qualifier::ByType(types)
            }
        }
        [single] => single_qualifier(metadata, single, name),
        several => Qualifier::Composite(several.iter().map(|q| single_qualifier(metadata, q, name)).collect()),
    }
}

fn single_qualifier(metadata: &AnnotationMetadata, annotation: &str, name: &str) -> Qualifier {
    if annotation == annotations::NAMED {
        let value = metadata.string_value(annotations::NAMED, "value").filter(|v| !v.is_empty()).unwrap_or(name);
        return Qualifier::Named(value.to_string());
    }
    if annotation == annotations::INTERCEPTOR_BINDING_DEFINITIONS || annotation == annotations::INTERCEPTOR_BINDING {
        let bindings = metadata
            .annotation(annotations::INTERCEPTOR_BINDING_DEFINITIONS)
            .map(|defs| {
                defs.annotations("value")
                    .into_iter()
                    .filter_map(|b| b.string_value("value").map(str::to_string))
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();
        return Qualifier::InterceptorBinding(bindings);
    }
    Qualifier::ByAnnotation(annotation.to_string())
}

fn qualifier_type() -> JvmType {
    JvmType::object(types::QUALIFIER)
}

/// Emits `qualifier`. `push_metadata` pushes the element's runtime
/// `AnnotationMetadata` and is only called for by-annotation qualifiers.
pub fn push_qualifier<F>(code: &mut Code<'_>, qualifier: &Qualifier, push_metadata: &mut F) -> Result<()>
where
    F: FnMut(&mut Code<'_>) -> Result<()>,
{
    match qualifier {
        Qualifier::None => code.aconst_null(),
        Qualifier::Any => {
            code.getstatic(types::ANY_QUALIFIER, "INSTANCE", &JvmType::object(types::ANY_QUALIFIER))?;
        }
        Qualifier::Named(name) => {
            code.ldc_string(name)?;
            let desc = method_descriptor(&[JvmType::string()], &qualifier_type());
            code.invokestatic(types::QUALIFIERS, "byName", &desc)?;
        }
        Qualifier::InterceptorBinding(bindings) => {
            push_list_of(code, bindings.len(), |code, i| Ok(code.ldc_string(&bindings[i])?))?;
            let desc = method_descriptor(&[JvmType::object(types::COLLECTION)], &qualifier_type());
            code.invokestatic(types::QUALIFIERS, "byInterceptorBindingTypes", &desc)?;
        }
        Qualifier::ByAnnotation(annotation) => {
            push_metadata(code)?;
            code.ldc_string(annotation)?;
            let desc = method_descriptor(&[JvmType::object(types::ANNOTATION_METADATA), JvmType::string()], &qualifier_type());
            code.invokestatic(types::QUALIFIERS, "byAnnotationSimple", &desc)?;
        }
        Qualifier::Composite(parts) => {
            push_array(code, &qualifier_type(), parts.len(), |code, i| push_qualifier(code, &parts[i], push_metadata))?;
            let desc = method_descriptor(&[JvmType::array_of(qualifier_type())], &qualifier_type());
            code.invokestatic(types::QUALIFIERS, "byQualifiers", &desc)?;
        }
        Qualifier::ByType(names) => {
            let class = JvmType::object(types::CLASS);
            push_array(code, &class, names.len(), |code, i| Ok(code.ldc_class(&JvmType::object(&names[i]))?))?;
            let desc = method_descriptor(&[JvmType::array_of(class)], &qualifier_type());
            code.invokestatic(types::QUALIFIERS, "byType", &desc)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AnnotationMember, AnnotationValue};

    fn qualified(names: &[&str]) -> AnnotationMetadata {
        let mut builder = AnnotationMetadata::builder();
        for name in names {
            builder = builder
                .annotate(AnnotationValue::new(name))
                .stereotype(name, AnnotationValue::new(annotations::QUALIFIER));
        }
        builder.build()
    }

    #[test]
    fn test_primary_wins_over_named() {
        let metadata = qualified(&[annotations::PRIMARY, annotations::NAMED]);
        assert_eq!(resolve_qualifier(&metadata, "db"), Qualifier::None);
    }

    #[test]
    fn test_named_defaults_to_element_name() {
        let metadata = qualified(&[annotations::NAMED]);
        assert_eq!(resolve_qualifier(&metadata, "db"), Qualifier::Named("db".into()));
    }

    #[test]
    fn test_two_qualifiers_build_composite() {
        let metadata = qualified(&["a.Fast", "a.Cheap"]);
        assert_eq!(
            resolve_qualifier(&metadata, "x"),
            Qualifier::Composite(vec![Qualifier::ByAnnotation("a.Fast".into()), Qualifier::ByAnnotation("a.Cheap".into())])
        );
    }

    #[test]
    fn test_any_without_qualifiers() {
        let metadata = AnnotationMetadata::builder().annotate(AnnotationValue::new(annotations::ANY)).build();
        assert_eq!(resolve_qualifier(&metadata, "x"), Qualifier::Any);
    }

    #[test]
    fn test_type_hint() {
        let metadata = AnnotationMetadata::builder()
            .annotate(AnnotationValue::new(annotations::TYPE).with(
                "value",
                AnnotationMember::Array(vec![AnnotationMember::Class("a.Impl".into())]),
            ))
            .build();
        assert_eq!(resolve_qualifier(&metadata, "x"), Qualifier::ByType(vec!["a.Impl".into()]));
    }

    #[test]
    fn test_unqualified() {
        assert_eq!(resolve_qualifier(&AnnotationMetadata::Empty, "x"), Qualifier::None);
    }
}

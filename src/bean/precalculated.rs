//! The precalculated info bundle: flags computed once at generation time
//! and handed to the definition's super constructor.

use crate::codegen::descriptor::{method_descriptor, JvmType};
use crate::codegen::emit::{invoke_constructor, push_bool};
use crate::codegen::Code;
use crate::consts::{annotations, types, CONTAINER_TYPES};
use crate::error::Result;
use crate::model::{AnnotationMetadata, ClassElement};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrecalculatedInfo {
    /// Binary name of the scope annotation, if any
    pub scope: Option<String>,
    pub is_abstract: bool,
    pub is_iterable: bool,
    pub is_singleton: bool,
    pub is_primary: bool,
    pub is_configuration_properties: bool,
    pub is_container_type: bool,
    pub requires_method_processing: bool,
    pub has_evaluated_expressions: bool,
}

impl PrecalculatedInfo {
    /// Computes the bundle for a bean of `bean_type` whose definition
    /// carries `metadata`
    pub fn compute(bean_type: &ClassElement, metadata: &AnnotationMetadata, is_abstract: bool) -> Self {
        let scope = metadata
            .declared_annotation_names_by_stereotype(annotations::SCOPE)
            .into_iter()
            .next()
            .or_else(|| metadata.annotation_names_by_stereotype(annotations::SCOPE).into_iter().next())
            .map(str::to_string);
        let is_singleton = metadata.has_stereotype(annotations::SINGLETON)
            || scope.as_deref() == Some(annotations::SINGLETON);
        Self {
            scope,
            is_abstract,
            is_iterable: metadata.has_stereotype(annotations::EACH_PROPERTY)
                || metadata.has_stereotype(annotations::EACH_BEAN),
            is_singleton,
            is_primary: metadata.has_declared_stereotype(annotations::PRIMARY),
            is_configuration_properties: metadata.has_stereotype(annotations::CONFIGURATION_READER),
            is_container_type: bean_type.is_array() || CONTAINER_TYPES.contains(&bean_type.name.as_str()),
            requires_method_processing: metadata
                .bool_value(annotations::EXECUTABLE, "processOnStartup")
                .unwrap_or(false),
            has_evaluated_expressions: metadata.has_evaluated_expressions(),
        }
    }

    /// The flags in constructor order
    pub fn flags(&self) -> [bool; 8] {
        [
            self.is_abstract,
            self.is_iterable,
            self.is_singleton,
            self.is_primary,
            self.is_configuration_properties,
            self.is_container_type,
            self.requires_method_processing,
            self.has_evaluated_expressions,
        ]
    }

    /// Pushes `new PrecalculatedInfo(Optional<String>, boolean x 8)`
    pub fn push(&self, code: &mut Code<'_>) -> Result<()> {
        let mut params = vec![JvmType::object(types::OPTIONAL)];
        params.extend(std::iter::repeat(JvmType::boolean()).take(8));
        invoke_constructor(code, types::PRECALCULATED_INFO, &params, |code| {
            let optional = JvmType::object(types::OPTIONAL);
            match &self.scope {
                Some(scope) => {
                    code.ldc_string(scope)?;
                    code.invokestatic(types::OPTIONAL, "of", &method_descriptor(&[JvmType::java_object()], &optional))?;
                }
                None => code.invokestatic(types::OPTIONAL, "empty", &method_descriptor(&[], &optional))?,
            }
            for flag in self.flags() {
                push_bool(code, flag)?;
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AnnotationValue;

    #[test]
    fn test_singleton_scope() {
        let metadata = AnnotationMetadata::builder()
            .annotate(AnnotationValue::new(annotations::SINGLETON))
            .stereotype(annotations::SINGLETON, AnnotationValue::new(annotations::SCOPE))
            .build();
        let info = PrecalculatedInfo::compute(&ClassElement::of("a.Svc"), &metadata, false);
        assert_eq!(info.scope.as_deref(), Some(annotations::SINGLETON));
        assert!(info.is_singleton);
        assert!(!info.is_container_type);
    }

    #[test]
    fn test_container_types() {
        let list = ClassElement::interface("java.util.List");
        assert!(PrecalculatedInfo::compute(&list, &AnnotationMetadata::Empty, false).is_container_type);
        let array = ClassElement::of("a.Svc").to_array();
        assert!(PrecalculatedInfo::compute(&array, &AnnotationMetadata::Empty, false).is_container_type);
        let info = PrecalculatedInfo::compute(&ClassElement::of("a.Svc"), &AnnotationMetadata::Empty, false);
        assert_eq!(info, PrecalculatedInfo::default());
    }
}

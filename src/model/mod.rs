//! The element and annotation model consumed by the writers, plus the
//! visitor context through which failures are reported.

pub mod annotation;
pub mod context;
pub mod element;

pub use annotation::{AnnotationMember, AnnotationMetadata, AnnotationMetadataBuilder, AnnotationValue};
pub use context::{DefaultVisitorContext, Failure, VisitorContext};
pub use element::{
    ClassElement, ClassKind, Element, FieldElement, MethodElement, Modifiers, ParameterElement, PropertyElement,
    Wildcard,
};

//! Batch-scoped caches
//!
//! Kept in its own test binary since `finish` clears process-wide state.
//! A single test touches the caches so no other test can race the reset.

mod common;

use beanc::bean::metadata::{evaluated_expression_definitions, is_mutated};
use beanc::consts::annotations;
use beanc::model::{AnnotationMetadata, AnnotationValue, ClassElement, Element, FieldElement};
use beanc::ProducingElement;
use common::*;

#[test]
fn test_finish_resets_batch_caches() {
    let svc = ClassElement::of("a.Cached");
    let named = AnnotationMetadata::builder()
        .annotate(AnnotationValue::new(annotations::INJECT))
        .annotate(AnnotationValue::new(annotations::NAMED).with("value", ""))
        .stereotype(annotations::NAMED, AnnotationValue::new(annotations::QUALIFIER))
        .build();
    let field = FieldElement::new(&svc, "source", ClassElement::of("a.Source")).with_metadata(named);
    let key = field.description();

    let class = generate(ProducingElement::Class(svc.clone()), config(), |w| {
        w.visit_default_constructor().unwrap();
        w.visit_field_injection_point(field, false).unwrap();
    });
    assert!(class.has_string_constant("source"));
    assert!(is_mutated(&key));
    assert!(evaluated_expression_definitions().is_empty());

    let computed = ClassElement::of("a.Computed");
    let expression = AnnotationMetadata::builder()
        .annotate(AnnotationValue::new(annotations::VALUE).with("value", "#{ 1 + 1 }"))
        .evaluated_expressions(true)
        .build();
    let total = FieldElement::new(&computed, "total", ClassElement::of("java.lang.Integer")).with_metadata(expression);
    let class = generate(ProducingElement::Class(computed), config(), |w| {
        w.visit_default_constructor().unwrap();
        w.visit_field_injection_point(total, false).unwrap();
    });
    assert!(info_flags(&class)[7], "evaluated expressions flag");
    assert_eq!(evaluated_expression_definitions(), vec!["a.$Computed$Definition".to_string()]);

    beanc::finish();
    assert!(!is_mutated(&key));
    assert!(evaluated_expression_definitions().is_empty());
}

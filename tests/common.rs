// Common test utilities

#![allow(dead_code)]

use beanc::codegen::ParsedClass;
use beanc::consts::{annotations, types};
use beanc::model::{AnnotationMetadata, AnnotationValue, DefaultVisitorContext};
use beanc::{BeanDefinitionWriter, Config, ProducingElement};

pub const INSTANTIATE: &str =
    "(Lio/micronaut/context/BeanResolutionContext;Lio/micronaut/context/BeanContext;)Ljava/lang/Object;";
pub const BEAN_METHOD: &str = "(Lio/micronaut/context/BeanResolutionContext;Lio/micronaut/context/BeanContext;Ljava/lang/Object;)Ljava/lang/Object;";

/// Verification on, everything else at defaults
pub fn config() -> Config {
    Config::default().with_verify(true)
}

pub fn annotated(name: &str) -> AnnotationMetadata {
    AnnotationMetadata::builder().annotate(AnnotationValue::new(name)).build()
}

pub fn singleton() -> AnnotationMetadata {
    AnnotationMetadata::builder()
        .annotate(AnnotationValue::new(annotations::SINGLETON))
        .stereotype(annotations::SINGLETON, AnnotationValue::new(annotations::SCOPE))
        .build()
}

pub fn injected() -> AnnotationMetadata {
    annotated(annotations::INJECT)
}

pub fn parse(bytes: &[u8]) -> ParsedClass {
    ParsedClass::parse(bytes).expect("generated class should parse")
}

/// Drives a writer over a fresh context and returns the parsed definition
pub fn generate<F>(producing: ProducingElement, config: Config, visit: F) -> ParsedClass
where
    F: FnOnce(&mut BeanDefinitionWriter<'_>),
{
    let context = DefaultVisitorContext::new();
    let mut writer = BeanDefinitionWriter::new(producing, &context, config);
    visit(&mut writer);
    writer.visit_bean_definition_end().expect("finalize");
    assert!(!context.has_failures(), "unexpected failures: {:?}", context.failures());
    parse(&writer.generated_class().expect("definition").bytes)
}

/// Same as [`generate`] but returns the raw bytes of every generated class
pub fn generate_bytes<F>(producing: ProducingElement, config: Config, visit: F) -> Vec<Vec<u8>>
where
    F: FnOnce(&mut BeanDefinitionWriter<'_>),
{
    let context = DefaultVisitorContext::new();
    let mut writer = BeanDefinitionWriter::new(producing, &context, config);
    visit(&mut writer);
    writer.visit_bean_definition_end().expect("finalize");
    writer.generated_classes().expect("classes").into_iter().map(|c| c.bytes.clone()).collect()
}

/// The eight flags handed to the precalculated info constructor in `<clinit>`
pub fn info_flags(class: &ParsedClass) -> Vec<bool> {
    let clinit = class.instructions("<clinit>", "()V");
    let call = format!("invokespecial {}.<init>", types::PRECALCULATED_INFO);
    let at = clinit
        .iter()
        .position(|i| i.starts_with(&call))
        .expect("precalculated info constructor");
    clinit[at - 8..at].iter().map(|i| i == "iconst_1").collect()
}

pub fn count(instructions: &[String], needle: &str) -> usize {
    instructions.iter().filter(|i| i.contains(needle)).count()
}

/// Number of `ldc`/`ldc_w` loads of the class literal `name`
pub fn class_literals(instructions: &[String], name: &str) -> usize {
    let (ldc, ldc_w) = (format!("ldc {}", name), format!("ldc_w {}", name));
    instructions.iter().filter(|i| **i == ldc || **i == ldc_w).count()
}

//! Writing generated classes and service registrations

mod common;

use std::path::PathBuf;

use beanc::model::{ClassElement, DefaultVisitorContext};
use beanc::{BeanDefinitionWriter, DirectoryOutputVisitor, InMemoryOutputVisitor, ProducingElement};
use common::*;
use tempfile::TempDir;
use walkdir::WalkDir;

fn written_files(root: &std::path::Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.path().strip_prefix(root).unwrap().to_path_buf())
        .collect();
    files.sort();
    files
}

#[test]
fn test_directory_layout() {
    let dir = TempDir::new().unwrap();
    let context = DefaultVisitorContext::new();
    let svc = ClassElement::of("a.b.Svc").with_metadata(singleton());
    let mut writer = BeanDefinitionWriter::new(ProducingElement::Class(svc), &context, config());
    writer.visit_default_constructor().unwrap();
    writer.visit_bean_definition_end().unwrap();

    let mut visitor = DirectoryOutputVisitor::new(dir.path());
    writer.accept(&mut visitor).unwrap();

    let files = written_files(dir.path());
    assert_eq!(
        files,
        vec![
            PathBuf::from("META-INF/micronaut/io.micronaut.inject.BeanDefinitionReference/a.b.$Svc$Definition$Reference"),
            PathBuf::from("a/b/$Svc$Definition$Reference.class"),
            PathBuf::from("a/b/$Svc$Definition.class"),
        ]
    );

    let bytes = std::fs::read(visitor.class_path("a.b.$Svc$Definition")).unwrap();
    assert_eq!(bytes, writer.generated_class().unwrap().bytes);
    let class = parse(&bytes);
    assert_eq!(class.version(), 61);
    assert!(info_flags(&class)[2]);
}

#[test]
fn test_in_memory_without_references() {
    let context = DefaultVisitorContext::new();
    let svc = ClassElement::of("a.Plain");
    let mut writer = BeanDefinitionWriter::new(
        ProducingElement::Class(svc),
        &context,
        config().with_generate_references(false),
    );
    writer.visit_default_constructor().unwrap();
    writer.visit_bean_definition_end().unwrap();

    let mut visitor = InMemoryOutputVisitor::new();
    writer.accept(&mut visitor).unwrap();
    assert_eq!(visitor.classes().keys().collect::<Vec<_>>(), vec!["a.$Plain$Definition"]);
    assert_eq!(visitor.services("io.micronaut.inject.BeanDefinition"), vec!["a.$Plain$Definition"]);
    assert!(visitor.services("io.micronaut.inject.BeanDefinitionReference").is_empty());
}

#[test]
fn test_disabled_definition_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let context = DefaultVisitorContext::new();
    let metadata = beanc::model::AnnotationMetadata::builder()
        .annotate(beanc::model::AnnotationValue::new(beanc::consts::annotations::BEAN).with("typed", "a.Gone"))
        .build();
    let svc = ClassElement::of("a.Broken").with_metadata(metadata);
    let mut writer = BeanDefinitionWriter::new(ProducingElement::Class(svc), &context, config());
    writer.visit_default_constructor().unwrap();
    writer.visit_bean_definition_end().unwrap();

    let mut visitor = DirectoryOutputVisitor::new(dir.path());
    writer.accept(&mut visitor).unwrap();
    assert!(written_files(dir.path()).is_empty());
    assert!(context.has_failures());
}

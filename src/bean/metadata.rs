//! Annotation metadata materialization.
//!
//! Emits the instructions that rebuild an [`AnnotationMetadata`] at class
//! initialization. Class values are loaded through one generated static
//! method per class name so a missing class degrades to a string-named
//! value, and annotation defaults seen along the way are collected and
//! registered once per annotation.
//!
//! This module also owns the process-wide caches that live for one
//! compilation batch; [`reset_caches`] clears them.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use indexmap::{IndexMap, IndexSet};
use once_cell::sync::Lazy;

use crate::codegen::class::access_flags::{ACC_PRIVATE, ACC_STATIC, ACC_SYNTHETIC};
use crate::codegen::descriptor::{method_descriptor, JvmType};
use crate::codegen::emit::{box_if_primitive, push_array, push_list_of, push_string_map_of};
use crate::codegen::{ClassBuilder, Code};
use crate::consts::names::{ANNOTATION_METADATA_FIELD, LOAD_CLASS_VALUE_PREFIX};
use crate::consts::types;
use crate::error::Result;
use crate::model::{AnnotationMember, AnnotationMetadata, AnnotationValue};

/// Metadata mutations applied to elements, keyed by element
static MUTATED_METADATA: Lazy<Mutex<HashMap<String, AnnotationMetadata>>> = Lazy::new(Default::default);

/// Definitions that carry evaluated expressions
static EVALUATED_EXPRESSION_DEFINITIONS: Lazy<Mutex<IndexSet<String>>> = Lazy::new(Default::default);

/// Returns the mutated metadata recorded for `key`, applying `mutate` to
/// `metadata` the first time the key is seen in this batch
pub fn mutate_once<F>(key: &str, metadata: &AnnotationMetadata, mutate: F) -> AnnotationMetadata
where
    F: FnOnce(&mut AnnotationMetadata),
{
    let mut cache = MUTATED_METADATA.lock().unwrap_or_else(PoisonError::into_inner);
    cache
        .entry(key.to_string())
        .or_insert_with(|| {
            let mut copy = metadata.clone();
            mutate(&mut copy);
            log::trace!("mutated annotation metadata of {}", key);
            copy
        })
        .clone()
}

pub fn is_mutated(key: &str) -> bool {
    MUTATED_METADATA.lock().unwrap_or_else(PoisonError::into_inner).contains_key(key)
}

pub fn register_evaluated_expressions(definition: &str) {
    EVALUATED_EXPRESSION_DEFINITIONS
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .insert(definition.to_string());
}

/// Definitions of the current batch that carry evaluated expressions, in
/// registration order. The compiler integration reads this before
/// [`crate::finish`] to index the expressions it has to compile.
pub fn evaluated_expression_definitions() -> Vec<String> {
    EVALUATED_EXPRESSION_DEFINITIONS
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .iter()
        .cloned()
        .collect()
}

pub(crate) fn reset_caches() {
    MUTATED_METADATA.lock().unwrap_or_else(PoisonError::into_inner).clear();
    EVALUATED_EXPRESSION_DEFINITIONS.lock().unwrap_or_else(PoisonError::into_inner).clear();
    log::debug!("reset process-wide writer caches");
}

fn map() -> JvmType {
    JvmType::object(types::MAP)
}

/// Per-class state for metadata materialization
#[derive(Debug)]
pub struct MaterializeContext {
    owner: String,
    defaults: IndexMap<String, IndexMap<String, AnnotationMember>>,
    load_type_methods: IndexMap<String, String>,
}

impl MaterializeContext {
    /// `owner` is the internal name of the class whose initializer the
    /// instructions are emitted into
    pub fn new(owner: &str) -> Self {
        Self { owner: owner.to_string(), defaults: IndexMap::new(), load_type_methods: IndexMap::new() }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Pushes an `AnnotationMetadata`: the shared empty instance, a static
    /// field of the referenced class, or a newly built instance
    pub fn push_annotation_metadata(&mut self, code: &mut Code<'_>, metadata: &AnnotationMetadata) -> Result<()> {
        let metadata_type = JvmType::object(types::ANNOTATION_METADATA);
        match metadata {
            AnnotationMetadata::Empty => code.getstatic(types::ANNOTATION_METADATA, "EMPTY_METADATA", &metadata_type)?,
            AnnotationMetadata::Reference { class_name, .. } => {
                code.getstatic(&class_name.replace('.', "/"), ANNOTATION_METADATA_FIELD, &metadata_type)?
            }
            AnnotationMetadata::Instance(m) => {
                for (annotation, members) in &m.annotation_defaults {
                    let slot = self.defaults.entry(annotation.clone()).or_default();
                    for (member, value) in members {
                        slot.entry(member.clone()).or_insert_with(|| value.clone());
                    }
                }
                code.new_instance(types::DEFAULT_ANNOTATION_METADATA)?;
                code.dup()?;
                for annotations in
                    [&m.declared_annotations, &m.declared_stereotypes, &m.all_stereotypes, &m.all_annotations]
                {
                    self.push_annotation_map(code, annotations)?;
                }
                let by_stereotype: Vec<(&str, &Vec<String>)> =
                    m.annotations_by_stereotype.iter().map(|(k, v)| (k.as_str(), v)).collect();
                push_string_map_of(code, &by_stereotype, |code, names| {
                    push_list_of(code, names.len(), |code, i| Ok(code.ldc_string(&names[i])?))
                })?;
                code.iconst(m.has_property_expressions as i32)?;
                code.iconst(m.has_evaluated_expressions as i32)?;
                let mut params = vec![map(); 5];
                params.extend([JvmType::boolean(), JvmType::boolean()]);
                code.invokespecial(
                    types::DEFAULT_ANNOTATION_METADATA,
                    "<init>",
                    &method_descriptor(&params, &JvmType::void()),
                )?;
            }
        }
        Ok(())
    }

    /// Like [`push_annotation_metadata`](Self::push_annotation_metadata)
    /// but pushes `null` for empty metadata
    pub fn push_annotation_metadata_or_null(&mut self, code: &mut Code<'_>, metadata: &AnnotationMetadata) -> Result<()> {
        if metadata.is_empty() && !matches!(metadata, AnnotationMetadata::Reference { .. }) {
            code.aconst_null();
            Ok(())
        } else {
            self.push_annotation_metadata(code, metadata)
        }
    }

    fn push_annotation_map(&mut self, code: &mut Code<'_>, annotations: &IndexMap<String, AnnotationValue>) -> Result<()> {
        let entries: Vec<(&str, &AnnotationValue)> = annotations.iter().map(|(k, v)| (k.as_str(), v)).collect();
        push_string_map_of(code, &entries, |code, value| self.push_members(code, &value.values))
    }

    fn push_members(&mut self, code: &mut Code<'_>, members: &IndexMap<String, AnnotationMember>) -> Result<()> {
        let entries: Vec<(&str, &AnnotationMember)> = members.iter().map(|(k, v)| (k.as_str(), v)).collect();
        push_string_map_of(code, &entries, |code, value| self.push_member(code, value))
    }

    fn push_member(&mut self, code: &mut Code<'_>, member: &AnnotationMember) -> Result<()> {
        match member {
            AnnotationMember::String(s) | AnnotationMember::Enum(s) => code.ldc_string(s)?,
            AnnotationMember::Bool(b) => {
                code.iconst(*b as i32)?;
                box_if_primitive(code, &JvmType::boolean())?;
            }
            AnnotationMember::Int(v) => {
                code.iconst(*v)?;
                box_if_primitive(code, &JvmType::int())?;
            }
            AnnotationMember::Long(v) => {
                code.ldc_long(*v)?;
                box_if_primitive(code, &JvmType::Primitive(crate::codegen::PrimitiveType::Long))?;
            }
            AnnotationMember::Double(v) => {
                code.ldc_double(*v)?;
                box_if_primitive(code, &JvmType::Primitive(crate::codegen::PrimitiveType::Double))?;
            }
            AnnotationMember::Class(name) => {
                let method = self.load_class_method(name);
                let desc = method_descriptor(&[], &JvmType::object(types::ANNOTATION_CLASS_VALUE));
                let owner = self.owner.clone();
                code.invokestatic(&owner, &method, &desc)?;
            }
            AnnotationMember::Annotation(value) => {
                code.new_instance(types::ANNOTATION_VALUE)?;
                code.dup()?;
                code.ldc_string(&value.annotation_name)?;
                self.push_members(code, &value.values)?;
                let desc = method_descriptor(&[JvmType::string(), map()], &JvmType::void());
                code.invokespecial(types::ANNOTATION_VALUE, "<init>", &desc)?;
            }
            AnnotationMember::Array(items) => {
                let component = array_component(items);
                push_array(code, &component, items.len(), |code, i| self.push_member(code, &items[i]))?;
            }
        }
        Ok(())
    }

    fn load_class_method(&mut self, class_name: &str) -> String {
        let next = self.load_type_methods.len();
        self.load_type_methods
            .entry(class_name.to_string())
            .or_insert_with(|| format!("{}{}", LOAD_CLASS_VALUE_PREFIX, next))
            .clone()
    }

    pub fn has_defaults(&self) -> bool {
        !self.defaults.is_empty()
    }

    /// Emits one `registerDefaultValues` call per annotation with defaults
    pub fn push_register_defaults(&mut self, code: &mut Code<'_>) -> Result<()> {
        let defaults = std::mem::take(&mut self.defaults);
        let desc = method_descriptor(&[JvmType::string(), map()], &JvmType::void());
        for (annotation, members) in &defaults {
            code.ldc_string(annotation)?;
            self.push_members(code, members)?;
            code.invokestatic(types::ANNOTATION_METADATA_SUPPORT, "registerDefaultValues", &desc)?;
        }
        Ok(())
    }

    /// Writes the class-value loading methods requested so far
    pub fn write_load_class_methods(&self, builder: &mut ClassBuilder) -> Result<()> {
        let desc = method_descriptor(&[], &JvmType::object(types::ANNOTATION_CLASS_VALUE));
        for (class_name, method) in &self.load_type_methods {
            builder.add_method(ACC_PRIVATE | ACC_STATIC | ACC_SYNTHETIC, method, &desc, |code| {
                let start = code.new_label();
                let end = code.new_label();
                let handler = code.new_label();
                code.try_catch(start, end, handler, Some(types::THROWABLE));
                code.mark(start);
                code.new_instance(types::ANNOTATION_CLASS_VALUE)?;
                code.dup()?;
                code.ldc_class(&JvmType::object(class_name))?;
                let by_class = method_descriptor(&[JvmType::object(types::CLASS)], &JvmType::void());
                code.invokespecial(types::ANNOTATION_CLASS_VALUE, "<init>", &by_class)?;
                code.mark(end);
                code.return_value(&JvmType::object(types::ANNOTATION_CLASS_VALUE))?;
                code.mark_handler(handler, types::THROWABLE);
                code.pop_value()?;
                code.new_instance(types::ANNOTATION_CLASS_VALUE)?;
                code.dup()?;
                code.ldc_string(class_name)?;
                let by_name = method_descriptor(&[JvmType::string()], &JvmType::void());
                code.invokespecial(types::ANNOTATION_CLASS_VALUE, "<init>", &by_name)?;
                code.return_value(&JvmType::object(types::ANNOTATION_CLASS_VALUE))?;
                Ok(())
            })?;
        }
        Ok(())
    }
}

fn array_component(items: &[AnnotationMember]) -> JvmType {
    let all = |f: fn(&AnnotationMember) -> bool| !items.is_empty() && items.iter().all(f);
    if items.is_empty() || all(|m| matches!(m, AnnotationMember::String(_) | AnnotationMember::Enum(_))) {
        JvmType::string()
    } else if all(|m| matches!(m, AnnotationMember::Class(_))) {
        JvmType::object(types::ANNOTATION_CLASS_VALUE)
    } else if all(|m| matches!(m, AnnotationMember::Annotation(_))) {
        JvmType::object(types::ANNOTATION_VALUE)
    } else {
        JvmType::java_object()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::class::access_flags::ACC_PUBLIC;
    use crate::codegen::reader::ParsedClass;

    fn metadata_class(metadata: &AnnotationMetadata) -> ParsedClass {
        let mut builder = ClassBuilder::new("a/Gen", types::OBJECT, &[], ACC_PUBLIC, 61).unwrap();
        let mut ctx = MaterializeContext::new("a/Gen");
        builder
            .add_method(ACC_STATIC, "<clinit>", "()V", |code| {
                ctx.push_annotation_metadata(code, metadata)?;
                code.pop_value()?;
                ctx.push_register_defaults(code)?;
                code.return_void()?;
                Ok(())
            })
            .unwrap();
        ctx.write_load_class_methods(&mut builder).unwrap();
        ParsedClass::parse(&builder.finish(true).unwrap().bytes).unwrap()
    }

    #[test]
    fn test_class_values_share_one_loader() {
        let metadata = AnnotationMetadata::builder()
            .annotate(AnnotationValue::new("a.Ann").with("value", AnnotationMember::Class("x.Y".into())))
            .annotate(AnnotationValue::new("a.Other").with("type", AnnotationMember::Class("x.Y".into())))
            .build();
        let class = metadata_class(&metadata);
        let loaders: Vec<_> = class
            .methods()
            .into_iter()
            .filter(|(_, name, _)| name.starts_with(LOAD_CLASS_VALUE_PREFIX))
            .collect();
        assert_eq!(loaders.len(), 1);
        assert!(class.has_string_constant("x.Y"));
    }

    #[test]
    fn test_defaults_registered_once() {
        let metadata = AnnotationMetadata::builder()
            .annotate(AnnotationValue::new("a.Ann"))
            .default_value("a.Ann", "size", AnnotationMember::Int(3))
            .build();
        let class = metadata_class(&metadata);
        let calls = class
            .instructions("<clinit>", "()V")
            .into_iter()
            .filter(|i| i.contains("registerDefaultValues"))
            .count();
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_mutate_once_keeps_first_mutation() {
        let key = "metadata::tests::mutate_once";
        let first = mutate_once(key, &AnnotationMetadata::Empty, |m| m.set_member("a.N", "value", "x".into()));
        let second = mutate_once(key, &AnnotationMetadata::Empty, |m| m.set_member("a.N", "value", "y".into()));
        assert_eq!(first, second);
        assert!(is_mutated(key));
    }
}

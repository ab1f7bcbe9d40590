//! Annotation metadata as seen by the writer.
//!
//! Metadata is either empty, an instance holding annotation values and
//! stereotype mappings, or a reference to the metadata already materialized
//! on another generated type.

use indexmap::IndexMap;

/// A single annotation member value
#[derive(Debug, Clone, PartialEq)]
pub enum AnnotationMember {
    String(String),
    Bool(bool),
    Int(i32),
    Long(i64),
    Double(f64),
    /// Binary class name
    Class(String),
    /// Enum constant name
    Enum(String),
    Annotation(AnnotationValue),
    Array(Vec<AnnotationMember>),
}

impl AnnotationMember {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AnnotationMember::String(s) | AnnotationMember::Enum(s) | AnnotationMember::Class(s) => Some(s),
            AnnotationMember::Array(items) => items.first().and_then(AnnotationMember::as_str),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AnnotationMember::Bool(b) => Some(*b),
            AnnotationMember::String(s) => s.parse().ok(),
            _ => None,
        }
    }
}

impl From<&str> for AnnotationMember {
    fn from(s: &str) -> Self {
        AnnotationMember::String(s.to_string())
    }
}

impl From<bool> for AnnotationMember {
    fn from(b: bool) -> Self {
        AnnotationMember::Bool(b)
    }
}

impl From<i32> for AnnotationMember {
    fn from(v: i32) -> Self {
        AnnotationMember::Int(v)
    }
}

/// An annotation with its explicitly set members
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AnnotationValue {
    pub annotation_name: String,
    pub values: IndexMap<String, AnnotationMember>,
}

impl AnnotationValue {
    pub fn new(annotation_name: &str) -> Self {
        Self { annotation_name: annotation_name.to_string(), values: IndexMap::new() }
    }

    pub fn with(mut self, member: &str, value: impl Into<AnnotationMember>) -> Self {
        self.values.insert(member.to_string(), value.into());
        self
    }

    pub fn string_value(&self, member: &str) -> Option<&str> {
        self.values.get(member).and_then(AnnotationMember::as_str)
    }

    pub fn string_values(&self, member: &str) -> Vec<&str> {
        match self.values.get(member) {
            Some(AnnotationMember::Array(items)) => items.iter().filter_map(AnnotationMember::as_str).collect(),
            Some(other) => other.as_str().into_iter().collect(),
            None => Vec::new(),
        }
    }

    pub fn bool_value(&self, member: &str) -> Option<bool> {
        self.values.get(member).and_then(AnnotationMember::as_bool)
    }

    /// Nested annotation values of an array member
    pub fn annotations(&self, member: &str) -> Vec<&AnnotationValue> {
        match self.values.get(member) {
            Some(AnnotationMember::Array(items)) => items
                .iter()
                .filter_map(|m| match m {
                    AnnotationMember::Annotation(a) => Some(a),
                    _ => None,
                })
                .collect(),
            Some(AnnotationMember::Annotation(a)) => vec![a],
            _ => Vec::new(),
        }
    }
}

/// Fully populated metadata for one element
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DefaultAnnotationMetadata {
    pub declared_annotations: IndexMap<String, AnnotationValue>,
    pub declared_stereotypes: IndexMap<String, AnnotationValue>,
    pub all_stereotypes: IndexMap<String, AnnotationValue>,
    pub all_annotations: IndexMap<String, AnnotationValue>,
    /// Stereotype name to the annotations that carry it
    pub annotations_by_stereotype: IndexMap<String, Vec<String>>,
    /// Default member values per annotation, registered once at class init
    pub annotation_defaults: IndexMap<String, IndexMap<String, AnnotationMember>>,
    pub has_property_expressions: bool,
    pub has_evaluated_expressions: bool,
}

impl DefaultAnnotationMetadata {
    pub fn is_empty(&self) -> bool {
        self.all_annotations.is_empty() && self.all_stereotypes.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum AnnotationMetadata {
    #[default]
    Empty,
    /// Metadata already materialized on `class_name`; queries delegate to
    /// `target`
    Reference { class_name: String, target: Box<AnnotationMetadata> },
    Instance(Box<DefaultAnnotationMetadata>),
}

impl AnnotationMetadata {
    pub fn builder() -> AnnotationMetadataBuilder {
        AnnotationMetadataBuilder::default()
    }

    pub fn reference(class_name: &str, target: AnnotationMetadata) -> Self {
        AnnotationMetadata::Reference { class_name: class_name.to_string(), target: Box::new(target) }
    }

    fn instance(&self) -> Option<&DefaultAnnotationMetadata> {
        match self {
            AnnotationMetadata::Empty => None,
            AnnotationMetadata::Reference { target, .. } => target.instance(),
            AnnotationMetadata::Instance(m) => Some(m),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.instance().map_or(true, DefaultAnnotationMetadata::is_empty)
    }

    pub fn has_annotation(&self, name: &str) -> bool {
        self.instance().map_or(false, |m| m.all_annotations.contains_key(name))
    }

    pub fn has_declared_annotation(&self, name: &str) -> bool {
        self.instance().map_or(false, |m| m.declared_annotations.contains_key(name))
    }

    /// True if `name` is present directly or as a stereotype
    pub fn has_stereotype(&self, name: &str) -> bool {
        self.instance()
            .map_or(false, |m| m.all_annotations.contains_key(name) || m.all_stereotypes.contains_key(name))
    }

    pub fn has_declared_stereotype(&self, name: &str) -> bool {
        self.instance().map_or(false, |m| {
            m.declared_annotations.contains_key(name) || m.declared_stereotypes.contains_key(name)
        })
    }

    pub fn annotation(&self, name: &str) -> Option<&AnnotationValue> {
        let m = self.instance()?;
        m.all_annotations.get(name).or_else(|| m.all_stereotypes.get(name))
    }

    pub fn string_value(&self, annotation: &str, member: &str) -> Option<&str> {
        self.annotation(annotation)?.string_value(member)
    }

    pub fn bool_value(&self, annotation: &str, member: &str) -> Option<bool> {
        self.annotation(annotation)?.bool_value(member)
    }

    /// Names of annotations carrying `stereotype`, in declaration order
    pub fn annotation_names_by_stereotype(&self, stereotype: &str) -> Vec<&str> {
        self.instance()
            .and_then(|m| m.annotations_by_stereotype.get(stereotype))
            .map(|names| names.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    pub fn declared_annotation_names_by_stereotype(&self, stereotype: &str) -> Vec<&str> {
        let Some(m) = self.instance() else {
            return Vec::new();
        };
        self.annotation_names_by_stereotype(stereotype)
            .into_iter()
            .filter(|n| m.declared_annotations.contains_key(*n))
            .collect()
    }

    pub fn has_evaluated_expressions(&self) -> bool {
        self.instance().map_or(false, |m| m.has_evaluated_expressions)
    }

    pub fn has_property_expressions(&self) -> bool {
        self.instance().map_or(false, |m| m.has_property_expressions)
    }

    /// Sets a member on a declared annotation, converting empty metadata to
    /// an instance. Stereotype mappings are left untouched.
    pub fn set_member(&mut self, annotation: &str, member: &str, value: AnnotationMember) {
        let instance = match self {
            AnnotationMetadata::Instance(m) => m,
            AnnotationMetadata::Reference { target, .. } => {
                let mut copy = (**target).clone();
                copy.set_member(annotation, member, value);
                *self = copy;
                return;
            }
            AnnotationMetadata::Empty => {
                *self = AnnotationMetadata::Instance(Box::default());
                match self {
                    AnnotationMetadata::Instance(m) => m,
                    _ => return,
                }
            }
        };
        for map in [&mut instance.declared_annotations, &mut instance.all_annotations] {
            map.entry(annotation.to_string())
                .or_insert_with(|| AnnotationValue::new(annotation))
                .values
                .insert(member.to_string(), value.clone());
        }
    }

    /// Walks every annotation value reachable from this metadata
    pub fn for_each_annotation<F: FnMut(&AnnotationValue)>(&self, mut f: F) {
        if let Some(m) = self.instance() {
            for map in [&m.declared_annotations, &m.declared_stereotypes, &m.all_stereotypes, &m.all_annotations] {
                for value in map.values() {
                    f(value);
                }
            }
        }
    }
}

/// Fluent construction of annotation metadata
#[derive(Debug, Default, Clone)]
pub struct AnnotationMetadataBuilder {
    metadata: DefaultAnnotationMetadata,
}

impl AnnotationMetadataBuilder {
    /// Adds a directly declared annotation
    pub fn annotate(mut self, value: AnnotationValue) -> Self {
        let name = value.annotation_name.clone();
        self.metadata.declared_annotations.insert(name.clone(), value.clone());
        self.metadata.all_annotations.insert(name, value);
        self
    }

    /// Adds an annotation inherited from a supertype
    pub fn inherit(mut self, value: AnnotationValue) -> Self {
        self.metadata.all_annotations.insert(value.annotation_name.clone(), value);
        self
    }

    /// Declares that `annotation` is meta-annotated with `stereotype`
    pub fn stereotype(mut self, annotation: &str, stereotype: AnnotationValue) -> Self {
        let name = stereotype.annotation_name.clone();
        let declared = self.metadata.declared_annotations.contains_key(annotation);
        let carriers = self.metadata.annotations_by_stereotype.entry(name.clone()).or_default();
        if !carriers.iter().any(|c| c == annotation) {
            carriers.push(annotation.to_string());
        }
        if declared {
            self.metadata.declared_stereotypes.insert(name.clone(), stereotype.clone());
        }
        self.metadata.all_stereotypes.insert(name, stereotype);
        self
    }

    pub fn default_value(mut self, annotation: &str, member: &str, value: AnnotationMember) -> Self {
        self.metadata
            .annotation_defaults
            .entry(annotation.to_string())
            .or_default()
            .insert(member.to_string(), value);
        self
    }

    pub fn property_expressions(mut self, present: bool) -> Self {
        self.metadata.has_property_expressions = present;
        self
    }

    pub fn evaluated_expressions(mut self, present: bool) -> Self {
        self.metadata.has_evaluated_expressions = present;
        self
    }

    pub fn build(self) -> AnnotationMetadata {
        if self.metadata.is_empty() && self.metadata.annotation_defaults.is_empty() {
            AnnotationMetadata::Empty
        } else {
            AnnotationMetadata::Instance(Box::new(self.metadata))
        }
    }
}

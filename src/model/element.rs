//! Read-only element model handed to the writers by the compiler
//! integration.

use indexmap::IndexMap;

use super::annotation::AnnotationMetadata;
use crate::codegen::descriptor::{JvmType, PrimitiveType};
use crate::codegen::signature::{SignatureWriter, EXTENDS, SUPER};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClassKind {
    #[default]
    Class,
    Interface,
    Enum,
    Record,
    Annotation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modifiers {
    pub is_public: bool,
    pub is_protected: bool,
    pub is_private: bool,
    pub is_static: bool,
    pub is_final: bool,
    pub is_abstract: bool,
}

impl Modifiers {
    pub fn public() -> Self {
        Self { is_public: true, ..Self::default() }
    }

    pub fn private() -> Self {
        Self { is_private: true, ..Self::default() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wildcard {
    Unbounded,
    Extends,
    Super,
}

/// Common surface of every element
pub trait Element {
    fn name(&self) -> &str;
    fn annotation_metadata(&self) -> &AnnotationMetadata;

    /// Human readable description used in failure reports
    fn description(&self) -> String {
        self.name().to_string()
    }
}

/// A type reference: a class, a primitive, an array of either, a type
/// variable or a wildcard
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ClassElement {
    /// Binary name (`java.util.List`) or primitive name (`int`). For a type
    /// variable this is the name of its bound.
    pub name: String,
    pub array_dimensions: usize,
    pub kind: ClassKind,
    pub modifiers: Modifiers,
    /// Variable name when this element stands for a type variable
    pub placeholder: Option<String>,
    pub wildcard: Option<Wildcard>,
    /// Type arguments keyed by the declared type variable name
    pub type_arguments: IndexMap<String, ClassElement>,
    pub annotation_metadata: AnnotationMetadata,
    pub super_type: Option<Box<ClassElement>>,
    pub interfaces: Vec<ClassElement>,
}

impl ClassElement {
    pub fn of(name: &str) -> Self {
        Self { name: name.to_string(), modifiers: Modifiers::public(), ..Self::default() }
    }

    pub fn primitive(p: PrimitiveType) -> Self {
        Self::of(p.name())
    }

    pub fn interface(name: &str) -> Self {
        Self { kind: ClassKind::Interface, modifiers: Modifiers { is_abstract: true, ..Modifiers::public() }, ..Self::of(name) }
    }

    /// A type variable `variable` bounded by `bound`
    pub fn type_variable(variable: &str, bound: ClassElement) -> Self {
        Self { placeholder: Some(variable.to_string()), ..bound }
    }

    pub fn with_type_argument(mut self, variable: &str, argument: ClassElement) -> Self {
        self.type_arguments.insert(variable.to_string(), argument);
        self
    }

    pub fn with_metadata(mut self, metadata: AnnotationMetadata) -> Self {
        self.annotation_metadata = metadata;
        self
    }

    pub fn with_super_type(mut self, super_type: ClassElement) -> Self {
        self.super_type = Some(Box::new(super_type));
        self
    }

    pub fn with_interface(mut self, interface: ClassElement) -> Self {
        self.interfaces.push(interface);
        self
    }

    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    pub fn with_wildcard(mut self, wildcard: Wildcard) -> Self {
        self.wildcard = Some(wildcard);
        self
    }

    pub fn to_array(&self) -> Self {
        Self { array_dimensions: self.array_dimensions + 1, ..self.clone() }
    }

    /// The component type with one dimension removed
    pub fn from_array(&self) -> Self {
        Self { array_dimensions: self.array_dimensions.saturating_sub(1), ..self.clone() }
    }

    pub fn primitive_type(&self) -> Option<PrimitiveType> {
        PrimitiveType::from_name(&self.name)
    }

    pub fn is_primitive(&self) -> bool {
        self.array_dimensions == 0 && self.primitive_type().map_or(false, |p| p != PrimitiveType::Void)
    }

    pub fn is_void(&self) -> bool {
        self.array_dimensions == 0 && self.primitive_type() == Some(PrimitiveType::Void)
    }

    pub fn is_array(&self) -> bool {
        self.array_dimensions > 0
    }

    pub fn is_interface(&self) -> bool {
        self.kind == ClassKind::Interface
    }

    pub fn is_abstract(&self) -> bool {
        self.modifiers.is_abstract || self.is_interface()
    }

    pub fn is_type_variable(&self) -> bool {
        self.placeholder.is_some()
    }

    pub fn is_wildcard(&self) -> bool {
        self.wildcard.is_some()
    }

    pub fn package_name(&self) -> &str {
        self.name.rsplit_once('.').map_or("", |(pkg, _)| pkg)
    }

    /// Simple name, with enclosing classes joined by `$`
    pub fn simple_name(&self) -> &str {
        self.name.rsplit_once('.').map_or(self.name.as_str(), |(_, simple)| simple)
    }

    pub fn internal_name(&self) -> String {
        self.name.replace('.', "/")
    }

    /// Erased JVM type, including array dimensions
    pub fn jvm_type(&self) -> JvmType {
        let component = match self.primitive_type() {
            Some(p) => JvmType::Primitive(p),
            None => JvmType::object(&self.name),
        };
        JvmType::with_dimensions(component, self.array_dimensions)
    }

    /// True if this type is `name` or has it as a super type or interface
    pub fn is_assignable(&self, name: &str) -> bool {
        if self.array_dimensions > 0 {
            return name == "java.lang.Object";
        }
        self.name == name
            || name == "java.lang.Object" && !self.is_primitive()
            || self.super_type.as_deref().map_or(false, |s| s.is_assignable(name))
            || self.interfaces.iter().any(|i| i.is_assignable(name))
    }

    /// Every generic super type (this type included) with its type arguments,
    /// keyed by binary name in the order encountered
    pub fn all_type_arguments(&self) -> IndexMap<String, IndexMap<String, ClassElement>> {
        let mut out = IndexMap::new();
        self.collect_type_arguments(&mut out);
        out
    }

    fn collect_type_arguments(&self, out: &mut IndexMap<String, IndexMap<String, ClassElement>>) {
        if !self.type_arguments.is_empty() && !out.contains_key(&self.name) {
            out.insert(self.name.clone(), self.type_arguments.clone());
        }
        if let Some(s) = &self.super_type {
            s.collect_type_arguments(out);
        }
        for i in &self.interfaces {
            i.collect_type_arguments(out);
        }
    }

    /// Writes this type as a generic signature type
    pub fn write_signature(&self, writer: &mut SignatureWriter) {
        for _ in 0..self.array_dimensions {
            writer.visit_array_type();
        }
        if let Some(p) = self.primitive_type() {
            writer.visit_base_type(p.descriptor());
        } else if let (Some(variable), true) = (&self.placeholder, self.type_arguments.is_empty()) {
            writer.visit_type_variable(variable);
        } else {
            writer.visit_class_type(&self.internal_name());
            for argument in self.type_arguments.values() {
                match argument.wildcard {
                    Some(Wildcard::Unbounded) => {
                        writer.visit_type_argument();
                        continue;
                    }
                    Some(Wildcard::Extends) => writer.visit_type_argument_wildcard(EXTENDS),
                    Some(Wildcard::Super) => writer.visit_type_argument_wildcard(SUPER),
                    None => writer.visit_type_argument_wildcard(crate::codegen::signature::INSTANCEOF),
                }
                argument.write_signature(writer);
            }
            writer.visit_end();
        }
        for _ in 0..self.array_dimensions {
            writer.visit_end_array();
        }
    }

    /// Generic field-type signature, or `None` when the type has no generics
    pub fn signature(&self) -> Option<String> {
        if self.type_arguments.is_empty() && !self.is_type_variable() {
            return None;
        }
        let mut writer = SignatureWriter::new();
        self.write_signature(&mut writer);
        Some(writer.to_string())
    }
}

impl Element for ClassElement {
    fn name(&self) -> &str {
        &self.name
    }

    fn annotation_metadata(&self) -> &AnnotationMetadata {
        &self.annotation_metadata
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParameterElement {
    pub name: String,
    pub class_element: ClassElement,
    pub annotation_metadata: AnnotationMetadata,
    /// Declares a default value (Kotlin)
    pub has_default: bool,
}

impl ParameterElement {
    pub fn new(name: &str, class_element: ClassElement) -> Self {
        Self { name: name.to_string(), class_element, ..Self::default() }
    }

    pub fn with_metadata(mut self, metadata: AnnotationMetadata) -> Self {
        self.annotation_metadata = metadata;
        self
    }

    pub fn with_default(mut self) -> Self {
        self.has_default = true;
        self
    }
}

impl Element for ParameterElement {
    fn name(&self) -> &str {
        &self.name
    }

    fn annotation_metadata(&self) -> &AnnotationMetadata {
        &self.annotation_metadata
    }
}

/// A method or, when named `<init>`, a constructor
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MethodElement {
    pub name: String,
    pub declaring_type: ClassElement,
    pub parameters: Vec<ParameterElement>,
    pub return_type: ClassElement,
    pub modifiers: Modifiers,
    pub annotation_metadata: AnnotationMetadata,
}

impl MethodElement {
    pub fn new(declaring_type: &ClassElement, name: &str, return_type: ClassElement) -> Self {
        Self {
            name: name.to_string(),
            declaring_type: declaring_type.clone(),
            return_type,
            modifiers: Modifiers::public(),
            ..Self::default()
        }
    }

    pub fn constructor(declaring_type: &ClassElement) -> Self {
        Self::new(declaring_type, "<init>", ClassElement::primitive(PrimitiveType::Void))
    }

    pub fn with_parameter(mut self, parameter: ParameterElement) -> Self {
        self.parameters.push(parameter);
        self
    }

    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    pub fn with_metadata(mut self, metadata: AnnotationMetadata) -> Self {
        self.annotation_metadata = metadata;
        self
    }

    pub fn is_constructor(&self) -> bool {
        self.name == "<init>"
    }

    pub fn is_static(&self) -> bool {
        self.modifiers.is_static
    }

    /// Has parameters with Kotlin default values
    pub fn has_defaults(&self) -> bool {
        self.parameters.iter().any(|p| p.has_default)
    }

    pub fn parameter_types(&self) -> Vec<JvmType> {
        self.parameters.iter().map(|p| p.class_element.jvm_type()).collect()
    }

    pub fn descriptor(&self) -> String {
        crate::codegen::descriptor::method_descriptor(&self.parameter_types(), &self.return_type.jvm_type())
    }
}

impl Element for MethodElement {
    fn name(&self) -> &str {
        &self.name
    }

    fn annotation_metadata(&self) -> &AnnotationMetadata {
        &self.annotation_metadata
    }

    fn description(&self) -> String {
        let params: Vec<&str> = self.parameters.iter().map(|p| p.class_element.name.as_str()).collect();
        format!("{}.{}({})", self.declaring_type.name, self.name, params.join(", "))
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct FieldElement {
    pub name: String,
    pub declaring_type: ClassElement,
    pub class_element: ClassElement,
    pub modifiers: Modifiers,
    pub annotation_metadata: AnnotationMetadata,
}

impl FieldElement {
    pub fn new(declaring_type: &ClassElement, name: &str, class_element: ClassElement) -> Self {
        Self {
            name: name.to_string(),
            declaring_type: declaring_type.clone(),
            class_element,
            ..Self::default()
        }
    }

    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    pub fn with_metadata(mut self, metadata: AnnotationMetadata) -> Self {
        self.annotation_metadata = metadata;
        self
    }
}

impl Element for FieldElement {
    fn name(&self) -> &str {
        &self.name
    }

    fn annotation_metadata(&self) -> &AnnotationMetadata {
        &self.annotation_metadata
    }

    fn description(&self) -> String {
        format!("{}.{}", self.declaring_type.name, self.name)
    }
}

/// A bean property backed by accessor methods and possibly a field
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PropertyElement {
    pub name: String,
    pub declaring_type: ClassElement,
    pub class_element: ClassElement,
    pub read_method: Option<MethodElement>,
    pub write_method: Option<MethodElement>,
    pub field: Option<FieldElement>,
    pub annotation_metadata: AnnotationMetadata,
}

impl PropertyElement {
    /// A property read through a conventional getter
    pub fn with_getter(declaring_type: &ClassElement, name: &str, class_element: ClassElement) -> Self {
        let mut chars = name.chars();
        let capitalized: String = chars.next().map(|c| c.to_ascii_uppercase()).into_iter().chain(chars).collect();
        let getter = format!("get{}", capitalized);
        Self {
            name: name.to_string(),
            declaring_type: declaring_type.clone(),
            read_method: Some(MethodElement::new(declaring_type, &getter, class_element.clone())),
            class_element,
            ..Self::default()
        }
    }
}

impl Element for PropertyElement {
    fn name(&self) -> &str {
        &self.name
    }

    fn annotation_metadata(&self) -> &AnnotationMetadata {
        &self.annotation_metadata
    }

    fn description(&self) -> String {
        format!("{}.{}", self.declaring_type.name, self.name)
    }
}

//! JVM types and method/field descriptors

use super::error::{BytecodeError, BytecodeResult};

/// The primitive types of the JVM, `void` included
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PrimitiveType {
    Boolean,
    Byte,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
    Void,
}

impl PrimitiveType {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "boolean" => PrimitiveType::Boolean,
            "byte" => PrimitiveType::Byte,
            "char" => PrimitiveType::Char,
            "short" => PrimitiveType::Short,
            "int" => PrimitiveType::Int,
            "long" => PrimitiveType::Long,
            "float" => PrimitiveType::Float,
            "double" => PrimitiveType::Double,
            "void" => PrimitiveType::Void,
            _ => return None,
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            PrimitiveType::Boolean => "boolean",
            PrimitiveType::Byte => "byte",
            PrimitiveType::Char => "char",
            PrimitiveType::Short => "short",
            PrimitiveType::Int => "int",
            PrimitiveType::Long => "long",
            PrimitiveType::Float => "float",
            PrimitiveType::Double => "double",
            PrimitiveType::Void => "void",
        }
    }

    pub fn descriptor(&self) -> char {
        match self {
            PrimitiveType::Boolean => 'Z',
            PrimitiveType::Byte => 'B',
            PrimitiveType::Char => 'C',
            PrimitiveType::Short => 'S',
            PrimitiveType::Int => 'I',
            PrimitiveType::Long => 'J',
            PrimitiveType::Float => 'F',
            PrimitiveType::Double => 'D',
            PrimitiveType::Void => 'V',
        }
    }

    pub fn from_descriptor(c: char) -> Option<Self> {
        Some(match c {
            'Z' => PrimitiveType::Boolean,
            'B' => PrimitiveType::Byte,
            'C' => PrimitiveType::Char,
            'S' => PrimitiveType::Short,
            'I' => PrimitiveType::Int,
            'J' => PrimitiveType::Long,
            'F' => PrimitiveType::Float,
            'D' => PrimitiveType::Double,
            'V' => PrimitiveType::Void,
            _ => return None,
        })
    }

    /// Internal name of the wrapper class used when boxing
    pub fn wrapper(&self) -> &'static str {
        match self {
            PrimitiveType::Boolean => "java/lang/Boolean",
            PrimitiveType::Byte => "java/lang/Byte",
            PrimitiveType::Char => "java/lang/Character",
            PrimitiveType::Short => "java/lang/Short",
            PrimitiveType::Int => "java/lang/Integer",
            PrimitiveType::Long => "java/lang/Long",
            PrimitiveType::Float => "java/lang/Float",
            PrimitiveType::Double => "java/lang/Double",
            PrimitiveType::Void => "java/lang/Void",
        }
    }

    /// Name of the wrapper's accessor returning the primitive value
    pub fn unbox_method(&self) -> &'static str {
        match self {
            PrimitiveType::Boolean => "booleanValue",
            PrimitiveType::Byte => "byteValue",
            PrimitiveType::Char => "charValue",
            PrimitiveType::Short => "shortValue",
            PrimitiveType::Int => "intValue",
            PrimitiveType::Long => "longValue",
            PrimitiveType::Float => "floatValue",
            PrimitiveType::Double => "doubleValue",
            PrimitiveType::Void => "",
        }
    }

    /// Long and double occupy two local/stack slots
    pub fn is_wide(&self) -> bool {
        matches!(self, PrimitiveType::Long | PrimitiveType::Double)
    }
}

/// An erased JVM type as it appears in descriptors
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum JvmType {
    Primitive(PrimitiveType),
    /// Internal (slash separated) class name
    Object(String),
    Array(Box<JvmType>),
}

impl JvmType {
    /// Accepts binary (`java.lang.String`) or internal (`java/lang/String`) names
    pub fn object(name: &str) -> Self {
        JvmType::Object(name.replace('.', "/"))
    }

    pub fn java_object() -> Self {
        JvmType::Object("java/lang/Object".to_string())
    }

    pub fn string() -> Self {
        JvmType::Object("java/lang/String".to_string())
    }

    pub fn int() -> Self {
        JvmType::Primitive(PrimitiveType::Int)
    }

    pub fn boolean() -> Self {
        JvmType::Primitive(PrimitiveType::Boolean)
    }

    pub fn void() -> Self {
        JvmType::Primitive(PrimitiveType::Void)
    }

    pub fn array_of(component: JvmType) -> Self {
        JvmType::Array(Box::new(component))
    }

    /// Wraps `component` in `dims` array dimensions
    pub fn with_dimensions(component: JvmType, dims: usize) -> Self {
        (0..dims).fold(component, |t, _| JvmType::array_of(t))
    }

    pub fn descriptor(&self) -> String {
        match self {
            JvmType::Primitive(p) => p.descriptor().to_string(),
            JvmType::Object(name) => format!("L{};", name),
            JvmType::Array(component) => format!("[{}", component.descriptor()),
        }
    }

    /// The name used in a CONSTANT_Class entry: internal name for classes,
    /// descriptor for arrays
    pub fn class_constant_name(&self) -> String {
        match self {
            JvmType::Object(name) => name.clone(),
            other => other.descriptor(),
        }
    }

    pub fn is_primitive(&self) -> bool {
        matches!(self, JvmType::Primitive(p) if *p != PrimitiveType::Void)
    }

    pub fn is_void(&self) -> bool {
        matches!(self, JvmType::Primitive(PrimitiveType::Void))
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, JvmType::Object(_) | JvmType::Array(_))
    }

    pub fn as_primitive(&self) -> Option<PrimitiveType> {
        match self {
            JvmType::Primitive(p) => Some(*p),
            _ => None,
        }
    }

    /// Number of slots a value of this type occupies
    pub fn size(&self) -> u16 {
        match self {
            JvmType::Primitive(PrimitiveType::Void) => 0,
            JvmType::Primitive(p) if p.is_wide() => 2,
            _ => 1,
        }
    }

    /// The reference type a value of this type is boxed into
    pub fn boxed(&self) -> JvmType {
        match self {
            JvmType::Primitive(p) => JvmType::Object(p.wrapper().to_string()),
            other => other.clone(),
        }
    }

    pub fn is_java_object(&self) -> bool {
        matches!(self, JvmType::Object(name) if name == "java/lang/Object")
    }

    /// Parses one field type starting at `start`, returning it with the
    /// index just past its end
    pub fn parse(descriptor: &str, start: usize) -> BytecodeResult<(JvmType, usize)> {
        let invalid = || BytecodeError::InvalidDescriptor { descriptor: descriptor.to_string() };
        let bytes = descriptor.as_bytes();
        let first = *bytes.get(start).ok_or_else(invalid)? as char;
        match first {
            'L' => {
                let end = descriptor[start..].find(';').ok_or_else(invalid)? + start;
                Ok((JvmType::Object(descriptor[start + 1..end].to_string()), end + 1))
            }
            '[' => {
                let (component, next) = JvmType::parse(descriptor, start + 1)?;
                Ok((JvmType::array_of(component), next))
            }
            c => {
                let p = PrimitiveType::from_descriptor(c).ok_or_else(invalid)?;
                Ok((JvmType::Primitive(p), start + 1))
            }
        }
    }
}

/// Builds a method descriptor from parameter and return types
pub fn method_descriptor(params: &[JvmType], ret: &JvmType) -> String {
    let mut d = String::from("(");
    for p in params {
        d.push_str(&p.descriptor());
    }
    d.push(')');
    d.push_str(&ret.descriptor());
    d
}

/// Splits a method descriptor into parameter types and return type
pub fn parse_method_descriptor(descriptor: &str) -> BytecodeResult<(Vec<JvmType>, JvmType)> {
    let invalid = || BytecodeError::InvalidDescriptor { descriptor: descriptor.to_string() };
    if !descriptor.starts_with('(') {
        return Err(invalid());
    }
    let close = descriptor.find(')').ok_or_else(invalid)?;
    let mut params = Vec::new();
    let mut i = 1;
    while i < close {
        let (t, next) = JvmType::parse(descriptor, i)?;
        params.push(t);
        i = next;
    }
    let (ret, end) = JvmType::parse(descriptor, close + 1)?;
    if end != descriptor.len() {
        return Err(invalid());
    }
    Ok((params, ret))
}

//! Deduplicating constant pool for Java class files

use std::collections::HashMap;

use super::error::{ConstPoolError, ConstPoolResult};

#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    Utf8(String),
    Integer(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    Class(u16),
    String(u16),
    FieldRef(u16, u16),
    MethodRef(u16, u16),
    InterfaceMethodRef(u16, u16),
    NameAndType(u16, u16),
}

pub(crate) mod constant_tags {
    pub const CONSTANT_UTF8: u8 = 1;
    pub const CONSTANT_INTEGER: u8 = 3;
    pub const CONSTANT_FLOAT: u8 = 4;
    pub const CONSTANT_LONG: u8 = 5;
    pub const CONSTANT_DOUBLE: u8 = 6;
    pub const CONSTANT_CLASS: u8 = 7;
    pub const CONSTANT_STRING: u8 = 8;
    pub const CONSTANT_FIELDREF: u8 = 9;
    pub const CONSTANT_METHODREF: u8 = 10;
    pub const CONSTANT_INTERFACEMETHODREF: u8 = 11;
    pub const CONSTANT_NAMEANDTYPE: u8 = 12;
}

impl Constant {
    pub fn tag(&self) -> u8 {
        use constant_tags::*;
        match self {
            Constant::Utf8(_) => CONSTANT_UTF8,
            Constant::Integer(_) => CONSTANT_INTEGER,
            Constant::Float(_) => CONSTANT_FLOAT,
            Constant::Long(_) => CONSTANT_LONG,
            Constant::Double(_) => CONSTANT_DOUBLE,
            Constant::Class(_) => CONSTANT_CLASS,
            Constant::String(_) => CONSTANT_STRING,
            Constant::FieldRef(..) => CONSTANT_FIELDREF,
            Constant::MethodRef(..) => CONSTANT_METHODREF,
            Constant::InterfaceMethodRef(..) => CONSTANT_INTERFACEMETHODREF,
            Constant::NameAndType(..) => CONSTANT_NAMEANDTYPE,
        }
    }

    /// Long and double constants take two pool slots
    pub fn is_wide(&self) -> bool {
        matches!(self, Constant::Long(_) | Constant::Double(_))
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = vec![self.tag()];
        match self {
            Constant::Utf8(value) => {
                let encoded = encode_modified_utf8(value);
                bytes.extend_from_slice(&(encoded.len() as u16).to_be_bytes());
                bytes.extend_from_slice(&encoded);
            }
            Constant::Integer(value) => bytes.extend_from_slice(&value.to_be_bytes()),
            Constant::Float(value) => bytes.extend_from_slice(&value.to_bits().to_be_bytes()),
            Constant::Long(value) => bytes.extend_from_slice(&value.to_be_bytes()),
            Constant::Double(value) => bytes.extend_from_slice(&value.to_bits().to_be_bytes()),
            Constant::Class(index) | Constant::String(index) => {
                bytes.extend_from_slice(&index.to_be_bytes())
            }
            Constant::FieldRef(a, b)
            | Constant::MethodRef(a, b)
            | Constant::InterfaceMethodRef(a, b)
            | Constant::NameAndType(a, b) => {
                bytes.extend_from_slice(&a.to_be_bytes());
                bytes.extend_from_slice(&b.to_be_bytes());
            }
        }
        bytes
    }
}

/// Encodes a string in the JVM's modified UTF-8: NUL as two bytes and
/// supplementary characters as surrogate pairs
pub fn encode_modified_utf8(value: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(value.len());
    for unit in value.encode_utf16() {
        match unit {
            0x0001..=0x007f => out.push(unit as u8),
            0x0000 | 0x0080..=0x07ff => {
                out.push((0xc0 | ((unit >> 6) & 0x1f)) as u8);
                out.push((0x80 | (unit & 0x3f)) as u8);
            }
            _ => {
                out.push((0xe0 | ((unit >> 12) & 0x0f)) as u8);
                out.push((0x80 | ((unit >> 6) & 0x3f)) as u8);
                out.push((0x80 | (unit & 0x3f)) as u8);
            }
        }
    }
    out
}

/// Length in bytes of the modified UTF-8 encoding of `value`
pub fn modified_utf8_len(value: &str) -> usize {
    value
        .encode_utf16()
        .map(|unit| match unit {
            0x0001..=0x007f => 1,
            0x0000 | 0x0080..=0x07ff => 2,
            _ => 3,
        })
        .sum()
}

/// Decodes modified UTF-8, `None` on malformed input
pub fn decode_modified_utf8(bytes: &[u8]) -> Option<String> {
    let mut units = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i] as u16;
        if b & 0x80 == 0 {
            units.push(b);
            i += 1;
        } else if b & 0xe0 == 0xc0 {
            let b2 = *bytes.get(i + 1)? as u16;
            units.push(((b & 0x1f) << 6) | (b2 & 0x3f));
            i += 2;
        } else if b & 0xf0 == 0xe0 {
            let b2 = *bytes.get(i + 1)? as u16;
            let b3 = *bytes.get(i + 2)? as u16;
            units.push(((b & 0x0f) << 12) | ((b2 & 0x3f) << 6) | (b3 & 0x3f));
            i += 3;
        } else {
            return None;
        }
    }
    String::from_utf16(&units).ok()
}

/// Structural key used for deduplication; floats are keyed by bit pattern
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ConstantKey {
    Utf8(String),
    Integer(i32),
    Float(u32),
    Long(i64),
    Double(u64),
    Class(u16),
    String(u16),
    FieldRef(u16, u16),
    MethodRef(u16, u16),
    InterfaceMethodRef(u16, u16),
    NameAndType(u16, u16),
}

impl From<&Constant> for ConstantKey {
    fn from(c: &Constant) -> Self {
        match c {
            Constant::Utf8(s) => ConstantKey::Utf8(s.clone()),
            Constant::Integer(v) => ConstantKey::Integer(*v),
            Constant::Float(v) => ConstantKey::Float(v.to_bits()),
            Constant::Long(v) => ConstantKey::Long(*v),
            Constant::Double(v) => ConstantKey::Double(v.to_bits()),
            Constant::Class(i) => ConstantKey::Class(*i),
            Constant::String(i) => ConstantKey::String(*i),
            Constant::FieldRef(a, b) => ConstantKey::FieldRef(*a, *b),
            Constant::MethodRef(a, b) => ConstantKey::MethodRef(*a, *b),
            Constant::InterfaceMethodRef(a, b) => ConstantKey::InterfaceMethodRef(*a, *b),
            Constant::NameAndType(a, b) => ConstantKey::NameAndType(*a, *b),
        }
    }
}

/// A constant pool with 1-based indices. Slot 0 is unused and the slot
/// after every long or double is empty.
#[derive(Debug, Clone)]
pub struct ConstantPool {
    slots: Vec<Option<Constant>>,
    lookup: HashMap<ConstantKey, u16>,
}

impl Default for ConstantPool {
    fn default() -> Self {
        Self::new()
    }
}

impl ConstantPool {
    pub fn new() -> Self {
        Self { slots: vec![None], lookup: HashMap::new() }
    }

    /// The `constant_pool_count` value written to the class file
    pub fn count(&self) -> u16 {
        self.slots.len() as u16
    }

    pub fn get(&self, index: u16) -> Option<&Constant> {
        self.slots.get(index as usize).and_then(|c| c.as_ref())
    }

    /// Iterates over `(index, constant)` pairs in pool order
    pub fn iter(&self) -> impl Iterator<Item = (u16, &Constant)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, c)| c.as_ref().map(|c| (i as u16, c)))
    }

    fn add(&mut self, constant: Constant) -> ConstPoolResult<u16> {
        let key = ConstantKey::from(&constant);
        if let Some(&index) = self.lookup.get(&key) {
            return Ok(index);
        }
        self.push(constant)
    }

    /// Appends without deduplication; used when reading a class back
    pub(crate) fn push(&mut self, constant: Constant) -> ConstPoolResult<u16> {
        let width = if constant.is_wide() { 2 } else { 1 };
        if self.slots.len() + width > u16::MAX as usize {
            return Err(ConstPoolError::OutOfSpace);
        }
        let index = self.slots.len() as u16;
        self.lookup.entry(ConstantKey::from(&constant)).or_insert(index);
        let wide = constant.is_wide();
        self.slots.push(Some(constant));
        if wide {
            self.slots.push(None);
        }
        Ok(index)
    }

    pub fn add_utf8(&mut self, value: &str) -> ConstPoolResult<u16> {
        let length = modified_utf8_len(value);
        if length > u16::MAX as usize {
            return Err(ConstPoolError::Utf8TooLong { length });
        }
        self.add(Constant::Utf8(value.to_string()))
    }

    pub fn add_integer(&mut self, value: i32) -> ConstPoolResult<u16> {
        self.add(Constant::Integer(value))
    }

    pub fn add_float(&mut self, value: f32) -> ConstPoolResult<u16> {
        self.add(Constant::Float(value))
    }

    pub fn add_long(&mut self, value: i64) -> ConstPoolResult<u16> {
        self.add(Constant::Long(value))
    }

    pub fn add_double(&mut self, value: f64) -> ConstPoolResult<u16> {
        self.add(Constant::Double(value))
    }

    /// Adds a class constant for an internal name or array descriptor
    pub fn add_class(&mut self, name: &str) -> ConstPoolResult<u16> {
        let name_index = self.add_utf8(name)?;
        self.add(Constant::Class(name_index))
    }

    pub fn add_string(&mut self, value: &str) -> ConstPoolResult<u16> {
        let utf8 = self.add_utf8(value)?;
        self.add(Constant::String(utf8))
    }

    pub fn add_name_and_type(&mut self, name: &str, descriptor: &str) -> ConstPoolResult<u16> {
        let name_index = self.add_utf8(name)?;
        let descriptor_index = self.add_utf8(descriptor)?;
        self.add(Constant::NameAndType(name_index, descriptor_index))
    }

    pub fn add_field_ref(&mut self, owner: &str, name: &str, descriptor: &str) -> ConstPoolResult<u16> {
        let class_index = self.add_class(owner)?;
        let nat = self.add_name_and_type(name, descriptor)?;
        self.add(Constant::FieldRef(class_index, nat))
    }

    pub fn add_method_ref(&mut self, owner: &str, name: &str, descriptor: &str) -> ConstPoolResult<u16> {
        let class_index = self.add_class(owner)?;
        let nat = self.add_name_and_type(name, descriptor)?;
        self.add(Constant::MethodRef(class_index, nat))
    }

    pub fn add_interface_method_ref(
        &mut self,
        owner: &str,
        name: &str,
        descriptor: &str,
    ) -> ConstPoolResult<u16> {
        let class_index = self.add_class(owner)?;
        let nat = self.add_name_and_type(name, descriptor)?;
        self.add(Constant::InterfaceMethodRef(class_index, nat))
    }

    pub fn utf8_at(&self, index: u16) -> Option<&str> {
        match self.get(index) {
            Some(Constant::Utf8(s)) => Some(s),
            _ => None,
        }
    }

    pub fn class_name_at(&self, index: u16) -> Option<&str> {
        match self.get(index) {
            Some(Constant::Class(name)) => self.utf8_at(*name),
            _ => None,
        }
    }

    /// Resolves a field, method or interface method reference into
    /// `(owner, name, descriptor)`
    pub fn member_at(&self, index: u16) -> Option<(&str, &str, &str)> {
        let (class_index, nat_index) = match self.get(index)? {
            Constant::FieldRef(c, n) | Constant::MethodRef(c, n) | Constant::InterfaceMethodRef(c, n) => (*c, *n),
            _ => return None,
        };
        let owner = self.class_name_at(class_index)?;
        match self.get(nat_index)? {
            Constant::NameAndType(name, desc) => Some((owner, self.utf8_at(*name)?, self.utf8_at(*desc)?)),
            _ => None,
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&self.count().to_be_bytes());
        for (_, constant) in self.iter() {
            bytes.extend_from_slice(&constant.to_bytes());
        }
        bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indices_are_one_based_and_deduplicated() {
        let mut cp = ConstantPool::new();
        let a = cp.add_utf8("a").unwrap();
        assert_eq!(a, 1);
        assert_eq!(cp.add_utf8("a").unwrap(), 1);
        let m1 = cp.add_method_ref("x/Y", "m", "()V").unwrap();
        let m2 = cp.add_method_ref("x/Y", "m", "()V").unwrap();
        assert_eq!(m1, m2);
        assert_eq!(cp.member_at(m1), Some(("x/Y", "m", "()V")));
    }

    #[test]
    fn test_wide_constants_take_two_slots() {
        let mut cp = ConstantPool::new();
        let l = cp.add_long(42).unwrap();
        let next = cp.add_integer(7).unwrap();
        assert_eq!(l, 1);
        assert_eq!(next, 3);
        assert_eq!(cp.count(), 4);
    }

    #[test]
    fn test_oversized_utf8_is_rejected() {
        let mut cp = ConstantPool::new();
        assert!(cp.add_utf8(&"x".repeat(u16::MAX as usize)).is_ok());
        // two bytes per NUL
        let err = cp.add_utf8(&"\0".repeat(40_000)).unwrap_err();
        assert_eq!(err, ConstPoolError::Utf8TooLong { length: 80_000 });
        assert!(matches!(cp.add_string(&"y".repeat(70_000)), Err(ConstPoolError::Utf8TooLong { length: 70_000 })));
    }

    #[test]
    fn test_modified_utf8() {
        assert_eq!(encode_modified_utf8("\0"), vec![0xc0, 0x80]);
        let s = "caf\u{e9} \u{1F600}";
        assert_eq!(decode_modified_utf8(&encode_modified_utf8(s)).as_deref(), Some(s));
    }
}

//! Trait-based serialization for classfile structures

use std::io::Write;

use super::attribute::{AttributeInfo, CodeAttribute, ExceptionTableEntry};
use super::class::ClassFile;
use super::constpool::ConstantPool;
use super::field::FieldInfo;
use super::method::MethodInfo;

/// An object which can be written into a classfile.
pub trait ClassfileWritable {
    /// Writes the bytes of this object into the given buffer.
    fn write_to_classfile<W: Write>(&self, buffer: &mut W) -> std::io::Result<()>;

    /// Writes the bytes of this object into a newly created buffer.
    fn to_classfile_bytes(&self) -> Vec<u8> {
        let mut buffer = Vec::new();
        // Writing into a Vec cannot fail
        let _ = self.write_to_classfile(&mut buffer);
        buffer
    }
}

impl ClassfileWritable for ClassFile {
    fn write_to_classfile<W: Write>(&self, buffer: &mut W) -> std::io::Result<()> {
        buffer.write_all(&self.magic.to_be_bytes())?;
        buffer.write_all(&self.minor_version.to_be_bytes())?;
        buffer.write_all(&self.major_version.to_be_bytes())?;

        self.constant_pool.write_to_classfile(buffer)?;

        buffer.write_all(&self.access_flags.to_be_bytes())?;
        buffer.write_all(&self.this_class.to_be_bytes())?;
        buffer.write_all(&self.super_class.to_be_bytes())?;

        buffer.write_all(&(self.interfaces.len() as u16).to_be_bytes())?;
        for interface in &self.interfaces {
            buffer.write_all(&interface.to_be_bytes())?;
        }

        buffer.write_all(&(self.fields.len() as u16).to_be_bytes())?;
        for field in &self.fields {
            field.write_to_classfile(buffer)?;
        }

        buffer.write_all(&(self.methods.len() as u16).to_be_bytes())?;
        for method in &self.methods {
            method.write_to_classfile(buffer)?;
        }

        write_attributes(&self.attributes, buffer)
    }
}

impl ClassfileWritable for ConstantPool {
    fn write_to_classfile<W: Write>(&self, buffer: &mut W) -> std::io::Result<()> {
        buffer.write_all(&self.to_bytes())
    }
}

impl ClassfileWritable for FieldInfo {
    fn write_to_classfile<W: Write>(&self, buffer: &mut W) -> std::io::Result<()> {
        buffer.write_all(&self.access_flags.to_be_bytes())?;
        buffer.write_all(&self.name_index.to_be_bytes())?;
        buffer.write_all(&self.descriptor_index.to_be_bytes())?;
        write_attributes(&self.attributes, buffer)
    }
}

impl ClassfileWritable for MethodInfo {
    fn write_to_classfile<W: Write>(&self, buffer: &mut W) -> std::io::Result<()> {
        buffer.write_all(&self.access_flags.to_be_bytes())?;
        buffer.write_all(&self.name_index.to_be_bytes())?;
        buffer.write_all(&self.descriptor_index.to_be_bytes())?;
        write_attributes(&self.attributes, buffer)
    }
}

impl ClassfileWritable for AttributeInfo {
    fn write_to_classfile<W: Write>(&self, buffer: &mut W) -> std::io::Result<()> {
        buffer.write_all(&self.name_index.to_be_bytes())?;
        buffer.write_all(&(self.info.len() as u32).to_be_bytes())?;
        buffer.write_all(&self.info)
    }
}

impl ClassfileWritable for ExceptionTableEntry {
    fn write_to_classfile<W: Write>(&self, buffer: &mut W) -> std::io::Result<()> {
        buffer.write_all(&self.start_pc.to_be_bytes())?;
        buffer.write_all(&self.end_pc.to_be_bytes())?;
        buffer.write_all(&self.handler_pc.to_be_bytes())?;
        buffer.write_all(&self.catch_type.to_be_bytes())
    }
}

/// Writes the body of a Code attribute (everything after the length)
impl ClassfileWritable for CodeAttribute {
    fn write_to_classfile<W: Write>(&self, buffer: &mut W) -> std::io::Result<()> {
        buffer.write_all(&self.max_stack.to_be_bytes())?;
        buffer.write_all(&self.max_locals.to_be_bytes())?;
        buffer.write_all(&(self.code.len() as u32).to_be_bytes())?;
        buffer.write_all(&self.code)?;
        buffer.write_all(&(self.exception_table.len() as u16).to_be_bytes())?;
        for entry in &self.exception_table {
            entry.write_to_classfile(buffer)?;
        }
        write_attributes(&self.attributes, buffer)
    }
}

fn write_attributes<W: Write>(attributes: &[AttributeInfo], buffer: &mut W) -> std::io::Result<()> {
    buffer.write_all(&(attributes.len() as u16).to_be_bytes())?;
    for attribute in attributes {
        attribute.write_to_classfile(buffer)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_class_header() {
        let class = ClassFile::default();
        let bytes = class.to_classfile_bytes();
        assert_eq!(&bytes[0..4], &[0xCA, 0xFE, 0xBA, 0xBE]);
        assert_eq!(u16::from_be_bytes([bytes[6], bytes[7]]), 61);
        // pool count of 1 means no entries
        assert_eq!(u16::from_be_bytes([bytes[8], bytes[9]]), 1);
    }
}

//! Attributes and exception table structures for Java class files

use super::constpool::ConstantPool;
use super::error::ConstPoolResult;
use super::frame::StackMapFrame;
use super::writer::ClassfileWritable;

#[derive(Debug, Clone, PartialEq)]
pub struct AttributeInfo {
    pub name_index: u16,
    pub info: Vec<u8>,
}

impl AttributeInfo {
    pub fn new(name_index: u16, info: Vec<u8>) -> Self {
        Self { name_index, info }
    }

    /// Resolves the attribute name through the pool
    pub fn name<'a>(&self, pool: &'a ConstantPool) -> Option<&'a str> {
        pool.utf8_at(self.name_index)
    }

    pub fn signature(pool: &mut ConstantPool, signature: &str) -> ConstPoolResult<Self> {
        let name_index = pool.add_utf8("Signature")?;
        let sig_index = pool.add_utf8(signature)?;
        Ok(Self::new(name_index, sig_index.to_be_bytes().to_vec()))
    }

    pub fn source_file(pool: &mut ConstantPool, file: &str) -> ConstPoolResult<Self> {
        let name_index = pool.add_utf8("SourceFile")?;
        let file_index = pool.add_utf8(file)?;
        Ok(Self::new(name_index, file_index.to_be_bytes().to_vec()))
    }

    /// An `InnerClasses` attribute for `(inner, outer, simple name, access)` entries
    pub fn inner_classes(
        pool: &mut ConstantPool,
        entries: &[(String, String, String, u16)],
    ) -> ConstPoolResult<Self> {
        let name_index = pool.add_utf8("InnerClasses")?;
        let mut info = Vec::new();
        info.extend_from_slice(&(entries.len() as u16).to_be_bytes());
        for (inner, outer, simple, access) in entries {
            info.extend_from_slice(&pool.add_class(inner)?.to_be_bytes());
            info.extend_from_slice(&pool.add_class(outer)?.to_be_bytes());
            info.extend_from_slice(&pool.add_utf8(simple)?.to_be_bytes());
            info.extend_from_slice(&access.to_be_bytes());
        }
        Ok(Self::new(name_index, info))
    }

    pub fn stack_map_table(pool: &mut ConstantPool, frames: &[StackMapFrame]) -> ConstPoolResult<Self> {
        let name_index = pool.add_utf8("StackMapTable")?;
        let mut info = Vec::new();
        info.extend_from_slice(&(frames.len() as u16).to_be_bytes());
        for frame in frames {
            info.extend_from_slice(&frame.to_bytes());
        }
        Ok(Self::new(name_index, info))
    }

    pub fn code(pool: &mut ConstantPool, code: &CodeAttribute) -> ConstPoolResult<Self> {
        let name_index = pool.add_utf8("Code")?;
        Ok(Self::new(name_index, code.to_classfile_bytes()))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CodeAttribute {
    pub max_stack: u16,
    pub max_locals: u16,
    pub code: Vec<u8>,
    pub exception_table: Vec<ExceptionTableEntry>,
    pub attributes: Vec<AttributeInfo>,
}

impl CodeAttribute {
    pub fn new(max_stack: u16, max_locals: u16, code: Vec<u8>) -> Self {
        Self {
            max_stack,
            max_locals,
            code,
            exception_table: Vec::new(),
            attributes: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExceptionTableEntry {
    pub start_pc: u16,
    pub end_pc: u16,
    pub handler_pc: u16,
    /// Zero catches everything
    pub catch_type: u16,
}

impl ExceptionTableEntry {
    pub fn new(start_pc: u16, end_pc: u16, handler_pc: u16, catch_type: u16) -> Self {
        Self { start_pc, end_pc, handler_pc, catch_type }
    }
}

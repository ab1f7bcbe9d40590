//! Error types for class-file generation

use thiserror::Error;

/// Errors that can occur during constant pool operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConstPoolError {
    #[error("Constant pool is out of space")]
    OutOfSpace,
    #[error("Invalid constant pool index: {0}")]
    InvalidIndex(u16),
    /// Modified UTF-8 encoding longer than the 16-bit length prefix allows
    #[error("UTF-8 constant too long: {length} bytes")]
    Utf8TooLong { length: usize },
}

/// Errors that can occur while emitting instructions into a method body
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BytecodeError {
    #[error("Stack underflow at pc {pc}")]
    StackUnderflow { pc: usize },
    #[error("Branch target too far: {offset}")]
    BranchTooFar { offset: i64 },
    #[error("Label {label} was never bound")]
    UnboundLabel { label: usize },
    #[error("Invalid type descriptor: {descriptor}")]
    InvalidDescriptor { descriptor: String },
    #[error("Code too large: {size} bytes")]
    CodeTooLarge { size: usize },
    #[error("Constant pool error: {0}")]
    ConstPool(#[from] ConstPoolError),
}

/// Errors that can occur while parsing a serialized class file
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClassReadError {
    #[error("Unexpected end of class file at offset {offset}")]
    UnexpectedEof { offset: usize },
    #[error("Bad magic number: {0:#x}")]
    BadMagic(u32),
    #[error("Unknown constant pool tag {tag} at index {index}")]
    UnknownConstantTag { tag: u8, index: u16 },
    #[error("Invalid constant pool reference {0}")]
    BadReference(u16),
    #[error("Invalid modified UTF-8 in constant pool")]
    BadUtf8,
    #[error("Unknown opcode {opcode:#x} at pc {pc}")]
    UnknownOpcode { opcode: u8, pc: usize },
}

/// Result type for constant pool operations
pub type ConstPoolResult<T> = Result<T, ConstPoolError>;

/// Result type for bytecode operations
pub type BytecodeResult<T> = Result<T, BytecodeError>;

/// Result type for class reading
pub type ReadResult<T> = Result<T, ClassReadError>;

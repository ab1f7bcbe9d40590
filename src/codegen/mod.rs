//! Class file generation.
//!
//! Low-level building blocks for emitting JVM class files: a deduplicating
//! constant pool, a typed code buffer that computes stack map frames, a
//! class builder, reusable emission helpers, a generic signature writer and
//! a reader used to inspect the output.

pub mod attribute;
pub mod class;
pub mod class_writer;
pub mod code;
pub mod constpool;
pub mod descriptor;
pub mod emit;
pub mod error;
pub mod field;
pub mod frame;
pub mod method;
pub mod opcodes;
pub mod reader;
pub mod signature;
pub mod writer;

pub use class::{access_flags, ClassFile, JAVA_17};
pub use class_writer::{ClassBuilder, GeneratedClass};
pub use code::{Code, Label};
pub use constpool::{Constant, ConstantPool};
pub use descriptor::{method_descriptor, parse_method_descriptor, JvmType, PrimitiveType};
pub use error::{BytecodeError, ConstPoolError};
pub use reader::{disassemble, ClassReader, ParsedClass};
pub use signature::SignatureWriter;
pub use writer::ClassfileWritable;

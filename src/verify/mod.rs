//! Structural verification of generated class files.
//!
//! These checks run over a `ClassFile` before it is serialized: constant
//! pool references must point at entries of the right kind, member access
//! flags must be consistent, and every method body must decode cleanly with
//! branch targets on instruction boundaries and a StackMapTable wherever
//! control flow merges.

pub mod constant_pool;
pub mod members;

use crate::codegen::class::{access_flags, ClassFile};
use crate::codegen::constpool::Constant;

pub use constant_pool::ConstantPoolVerifyError;
pub use members::MemberVerifyError;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum VerifyError {
    #[error("{0}")]
    ConstantPool(#[from] ConstantPoolVerifyError),
    #[error("{0}")]
    Member(#[from] MemberVerifyError),
    #[error("Invalid this_class index {0}")]
    InvalidThisClass(u16),
    #[error("Invalid super_class index {0}")]
    InvalidSuperClass(u16),
    #[error("Invalid interface index {0}")]
    InvalidInterface(u16),
    #[error("Class cannot be both abstract and final: 0x{0:04x}")]
    InvalidClassAccessFlags(u16),
}

pub type VerifyResult<T> = Result<T, VerifyError>;

/// Verify the ClassFile by orchestrating all sub-verifiers
pub fn verify(class_file: &ClassFile) -> VerifyResult<()> {
    constant_pool::verify(class_file)?;
    verify_class_header(class_file)?;
    members::verify(class_file)?;
    Ok(())
}

fn is_class(class_file: &ClassFile, index: u16) -> bool {
    matches!(class_file.constant_pool.get(index), Some(Constant::Class(_)))
}

fn verify_class_header(class_file: &ClassFile) -> VerifyResult<()> {
    let flags = class_file.access_flags;
    if flags & access_flags::ACC_ABSTRACT != 0 && flags & access_flags::ACC_FINAL != 0 {
        return Err(VerifyError::InvalidClassAccessFlags(flags));
    }
    if !is_class(class_file, class_file.this_class) {
        return Err(VerifyError::InvalidThisClass(class_file.this_class));
    }
    if !is_class(class_file, class_file.super_class) {
        return Err(VerifyError::InvalidSuperClass(class_file.super_class));
    }
    for &interface in &class_file.interfaces {
        if !is_class(class_file, interface) {
            return Err(VerifyError::InvalidInterface(interface));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_missing_this_class() {
        let class = ClassFile::default();
        assert_eq!(verify(&class), Err(VerifyError::InvalidThisClass(0)));
    }

    #[test]
    fn test_rejects_abstract_final() {
        let mut class = ClassFile::default();
        class.access_flags = access_flags::ACC_ABSTRACT | access_flags::ACC_FINAL;
        class.this_class = class.constant_pool.add_class("a/B").unwrap();
        class.super_class = class.constant_pool.add_class("java/lang/Object").unwrap();
        assert!(matches!(verify(&class), Err(VerifyError::InvalidClassAccessFlags(_))));
    }
}

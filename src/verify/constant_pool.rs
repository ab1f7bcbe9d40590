use crate::codegen::class::ClassFile;
use crate::codegen::constpool::Constant;
use crate::codegen::descriptor::{parse_method_descriptor, JvmType};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConstantPoolVerifyError {
    #[error("Invalid constant pool index {0}")]
    InvalidConstantPoolIndex(u16),
    #[error("Invalid constant pool index type {0}")]
    InvalidConstantPoolIndexType(u16),
    #[error("Invalid descriptor '{descriptor}' at constant {index}")]
    InvalidDescriptor { index: u16, descriptor: String },
}

pub type Result<T> = std::result::Result<T, ConstantPoolVerifyError>;

/// Verify the ClassFile ConstantPool
pub fn verify(class_file: &ClassFile) -> Result<()> {
    let pool = &class_file.constant_pool;
    let expect_utf8 = |owner: u16, index: u16| match pool.get(index) {
        Some(Constant::Utf8(_)) => Ok(()),
        None => Err(ConstantPoolVerifyError::InvalidConstantPoolIndex(owner)),
        _ => Err(ConstantPoolVerifyError::InvalidConstantPoolIndexType(owner)),
    };
    for (index, constant) in pool.iter() {
        match constant {
            Constant::Class(name) | Constant::String(name) => expect_utf8(index, *name)?,
            Constant::FieldRef(class, nat) | Constant::MethodRef(class, nat) | Constant::InterfaceMethodRef(class, nat) => {
                match pool.get(*class) {
                    Some(Constant::Class(_)) => {}
                    None => return Err(ConstantPoolVerifyError::InvalidConstantPoolIndex(index)),
                    _ => return Err(ConstantPoolVerifyError::InvalidConstantPoolIndexType(index)),
                }
                let (name, desc) = match pool.get(*nat) {
                    Some(Constant::NameAndType(n, d)) => (*n, *d),
                    None => return Err(ConstantPoolVerifyError::InvalidConstantPoolIndex(index)),
                    _ => return Err(ConstantPoolVerifyError::InvalidConstantPoolIndexType(index)),
                };
                expect_utf8(index, name)?;
                expect_utf8(index, desc)?;
                let descriptor = pool.utf8_at(desc).unwrap_or_default();
                let valid = match constant {
                    Constant::FieldRef(..) => {
                        matches!(JvmType::parse(descriptor, 0), Ok((_, end)) if end == descriptor.len())
                    }
                    _ => parse_method_descriptor(descriptor).is_ok(),
                };
                if !valid {
                    return Err(ConstantPoolVerifyError::InvalidDescriptor { index, descriptor: descriptor.to_string() });
                }
            }
            Constant::NameAndType(name, desc) => {
                expect_utf8(index, *name)?;
                expect_utf8(index, *desc)?;
            }
            Constant::Utf8(_)
            | Constant::Integer(_)
            | Constant::Float(_)
            | Constant::Long(_)
            | Constant::Double(_) => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_pool() {
        let mut class = ClassFile::default();
        class.constant_pool.add_method_ref("a/B", "m", "(I)V").unwrap();
        class.constant_pool.add_field_ref("a/B", "f", "[Ljava/lang/String;").unwrap();
        assert_eq!(verify(&class), Ok(()));
    }

    #[test]
    fn test_bad_method_descriptor() {
        let mut class = ClassFile::default();
        class.constant_pool.add_method_ref("a/B", "m", "(I").unwrap();
        assert!(matches!(verify(&class), Err(ConstantPoolVerifyError::InvalidDescriptor { .. })));
    }
}

use std::collections::HashSet;

use crate::codegen::attribute::AttributeInfo;
use crate::codegen::class::{access_flags, ClassFile};
use crate::codegen::descriptor::{parse_method_descriptor, JvmType, PrimitiveType};
use crate::codegen::opcodes;
use crate::codegen::reader::{disassemble, parse_code_attribute, Operand};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MemberVerifyError {
    #[error("Invalid access flags 0x{flags:04x} on {member}")]
    InvalidAccessFlags { member: String, flags: u16 },
    #[error("Invalid name or descriptor index on member {0}")]
    InvalidMemberIndex(u16),
    #[error("Invalid descriptor '{descriptor}' on {member}")]
    InvalidDescriptor { member: String, descriptor: String },
    #[error("Duplicate member {0}")]
    Duplicate(String),
    #[error("Method {0} must have a Code attribute")]
    MissingCodeAttribute(String),
    #[error("Abstract method {0} must not have a Code attribute")]
    ForbiddenCodeAttribute(String),
    #[error("Malformed code in {member}: {message}")]
    MalformedCode { member: String, message: String },
    #[error("Return opcode in {member} does not match descriptor: expected {expected}, found {found}")]
    ReturnMismatch { member: String, expected: &'static str, found: &'static str },
    #[error("Method {0} branches but has no StackMapTable")]
    MissingStackMapTable(String),
}

pub type Result<T> = std::result::Result<T, MemberVerifyError>;

pub fn verify(class_file: &ClassFile) -> Result<()> {
    let pool = &class_file.constant_pool;
    let mut seen = HashSet::new();
    for field in &class_file.fields {
        let (name, desc) = match (pool.utf8_at(field.name_index), pool.utf8_at(field.descriptor_index)) {
            (Some(n), Some(d)) => (n, d),
            _ => return Err(MemberVerifyError::InvalidMemberIndex(field.name_index)),
        };
        let member = format!("{}:{}", name, desc);
        verify_visibility(&member, field.access_flags)?;
        if !matches!(JvmType::parse(desc, 0), Ok((_, end)) if end == desc.len()) {
            return Err(MemberVerifyError::InvalidDescriptor { member, descriptor: desc.to_string() });
        }
        if !seen.insert(member.clone()) {
            return Err(MemberVerifyError::Duplicate(member));
        }
    }
    for method in &class_file.methods {
        let (name, desc) = match (pool.utf8_at(method.name_index), pool.utf8_at(method.descriptor_index)) {
            (Some(n), Some(d)) => (n, d),
            _ => return Err(MemberVerifyError::InvalidMemberIndex(method.name_index)),
        };
        let member = format!("{}{}", name, desc);
        verify_visibility(&member, method.access_flags)?;
        let (params, ret) = parse_method_descriptor(desc)
            .map_err(|_| MemberVerifyError::InvalidDescriptor { member: member.clone(), descriptor: desc.to_string() })?;
        if !seen.insert(member.clone()) {
            return Err(MemberVerifyError::Duplicate(member));
        }
        let code = find(&method.attributes, class_file, "Code");
        let is_abstract = method.access_flags & (access_flags::ACC_ABSTRACT | access_flags::ACC_NATIVE) != 0;
        match (code, is_abstract) {
            (None, false) => return Err(MemberVerifyError::MissingCodeAttribute(member)),
            (Some(_), true) => return Err(MemberVerifyError::ForbiddenCodeAttribute(member)),
            (Some(attr), false) => {
                let is_static = method.access_flags & access_flags::ACC_STATIC != 0;
                let param_slots: u16 = params.iter().map(JvmType::size).sum::<u16>() + if is_static { 0 } else { 1 };
                verify_code(class_file, &member, attr, param_slots, &ret)?;
            }
            (None, true) => {}
        }
    }
    Ok(())
}

fn find<'a>(attributes: &'a [AttributeInfo], class_file: &ClassFile, name: &str) -> Option<&'a AttributeInfo> {
    attributes.iter().find(|a| a.name(&class_file.constant_pool) == Some(name))
}

fn verify_visibility(member: &str, flags: u16) -> Result<()> {
    let visibility = [access_flags::ACC_PUBLIC, access_flags::ACC_PROTECTED, access_flags::ACC_PRIVATE]
        .iter()
        .filter(|f| flags & **f != 0)
        .count();
    if visibility > 1 {
        return Err(MemberVerifyError::InvalidAccessFlags { member: member.to_string(), flags });
    }
    Ok(())
}

fn return_mnemonic(ret: &JvmType) -> &'static str {
    match ret.as_primitive() {
        Some(PrimitiveType::Void) => "return",
        Some(PrimitiveType::Long) => "lreturn",
        Some(PrimitiveType::Float) => "freturn",
        Some(PrimitiveType::Double) => "dreturn",
        Some(_) => "ireturn",
        None => "areturn",
    }
}

fn verify_code(class_file: &ClassFile, member: &str, attr: &AttributeInfo, param_slots: u16, ret: &JvmType) -> Result<()> {
    let malformed = |message: String| MemberVerifyError::MalformedCode { member: member.to_string(), message };
    let code = parse_code_attribute(&attr.info).map_err(|e| malformed(e.to_string()))?;
    if code.max_locals < param_slots {
        return Err(malformed(format!("max_locals {} below parameter slots {}", code.max_locals, param_slots)));
    }
    let instructions = disassemble(&code.code).map_err(|e| malformed(e.to_string()))?;
    let starts: HashSet<usize> = instructions.iter().map(|i| i.pc).collect();
    let mut has_targets = !code.exception_table.is_empty();
    let expected = return_mnemonic(ret);
    for insn in &instructions {
        let targets: Vec<usize> = match &insn.operand {
            Operand::Branch(t) => vec![*t],
            Operand::TableSwitch { default, targets, .. } => {
                std::iter::once(*default).chain(targets.iter().copied()).collect()
            }
            Operand::LookupSwitch { default, pairs } => {
                std::iter::once(*default).chain(pairs.iter().map(|(_, t)| *t)).collect()
            }
            _ => Vec::new(),
        };
        if !targets.is_empty() {
            has_targets = true;
        }
        if let Some(bad) = targets.iter().find(|t| !starts.contains(t)) {
            return Err(malformed(format!("branch at {} targets {} which is not an instruction", insn.pc, bad)));
        }
        if matches!(insn.opcode, opcodes::IRETURN..=opcodes::RETURN) && insn.mnemonic() != expected {
            return Err(MemberVerifyError::ReturnMismatch {
                member: member.to_string(),
                expected,
                found: insn.mnemonic(),
            });
        }
    }
    for entry in &code.exception_table {
        let end_ok = entry.end_pc as usize == code.code.len() || starts.contains(&(entry.end_pc as usize));
        if !starts.contains(&(entry.start_pc as usize)) || !starts.contains(&(entry.handler_pc as usize)) || !end_ok {
            return Err(malformed(format!("exception range {}..{} is misaligned", entry.start_pc, entry.end_pc)));
        }
    }
    if has_targets && find(&code.attributes, class_file, "StackMapTable").is_none() {
        return Err(MemberVerifyError::MissingStackMapTable(member.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::class_writer::ClassBuilder;
    use crate::codegen::code::Code;
    use crate::codegen::opcodes::IFNULL;

    #[test]
    fn test_return_mismatch_is_rejected() {
        let mut builder = ClassBuilder::new("a/B", "java/lang/Object", &[], 0x0021, 61).unwrap();
        builder
            .add_method(0x0009, "f", "()I", |code: &mut Code<'_>| {
                code.return_void()?;
                Ok(())
            })
            .unwrap();
        let class = builder.into_class_file().unwrap();
        assert!(matches!(verify(&class), Err(MemberVerifyError::ReturnMismatch { .. })));
    }

    #[test]
    fn test_branching_method_verifies() {
        let mut builder = ClassBuilder::new("a/B", "java/lang/Object", &[], 0x0021, 61).unwrap();
        builder
            .add_method(0x0009, "f", "(Ljava/lang/Object;)V", |code| {
                let l = code.new_label();
                code.aload(0);
                code.if_zero(IFNULL, l)?;
                code.mark(l);
                code.return_void()?;
                Ok(())
            })
            .unwrap();
        let class = builder.into_class_file().unwrap();
        assert_eq!(verify(&class), Ok(()));
    }

    #[test]
    fn test_duplicate_method() {
        let mut builder = ClassBuilder::new("a/B", "java/lang/Object", &[], 0x0021, 61).unwrap();
        for _ in 0..2 {
            builder.add_abstract_method(0x0401, "f", "()V").unwrap();
        }
        let class = builder.into_class_file().unwrap();
        assert!(matches!(verify(&class), Err(MemberVerifyError::Duplicate(_))));
    }
}

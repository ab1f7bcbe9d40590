//! Reading serialized class files back into `ClassFile` and disassembling
//! method bodies. Used to inspect and verify generated output.

use super::attribute::{AttributeInfo, CodeAttribute, ExceptionTableEntry};
use super::class::{ClassFile, MAGIC};
use super::constpool::{constant_tags::*, decode_modified_utf8, Constant, ConstantPool};
use super::error::{ClassReadError, ReadResult};
use super::field::FieldInfo;
use super::method::MethodInfo;
use super::opcodes::{self, OperandKind};

/// Bounds-checked big-endian cursor over class bytes
#[derive(Clone, Copy)]
struct ClassBuffer<'class> {
    data: &'class [u8],
}

impl<'class> ClassBuffer<'class> {
    fn read_bytes(&self, index: usize, len: usize) -> ReadResult<&'class [u8]> {
        self.data
            .get(index..index + len)
            .ok_or(ClassReadError::UnexpectedEof { offset: index + len })
    }

    fn read_u8(&self, index: usize) -> ReadResult<u8> {
        self.read_bytes(index, 1).map(|b| b[0])
    }

    fn read_u16(&self, index: usize) -> ReadResult<u16> {
        self.read_bytes(index, 2).map(|b| u16::from_be_bytes([b[0], b[1]]))
    }

    fn read_u32(&self, index: usize) -> ReadResult<u32> {
        self.read_bytes(index, 4).map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn read_u64(&self, index: usize) -> ReadResult<u64> {
        let hi = self.read_u32(index)? as u64;
        let lo = self.read_u32(index + 4)? as u64;
        Ok((hi << 32) | lo)
    }

    fn read_i32(&self, index: usize) -> ReadResult<i32> {
        self.read_u32(index).map(|u| u as i32)
    }
}

pub struct ClassReader<'class> {
    buf: ClassBuffer<'class>,
    pos: usize,
}

impl<'class> ClassReader<'class> {
    pub fn new(data: &'class [u8]) -> Self {
        Self { buf: ClassBuffer { data }, pos: 0 }
    }

    fn u8(&mut self) -> ReadResult<u8> {
        let v = self.buf.read_u8(self.pos)?;
        self.pos += 1;
        Ok(v)
    }

    fn u16(&mut self) -> ReadResult<u16> {
        let v = self.buf.read_u16(self.pos)?;
        self.pos += 2;
        Ok(v)
    }

    fn u32(&mut self) -> ReadResult<u32> {
        let v = self.buf.read_u32(self.pos)?;
        self.pos += 4;
        Ok(v)
    }

    fn u64(&mut self) -> ReadResult<u64> {
        let v = self.buf.read_u64(self.pos)?;
        self.pos += 8;
        Ok(v)
    }

    fn bytes(&mut self, len: usize) -> ReadResult<&'class [u8]> {
        let v = self.buf.read_bytes(self.pos, len)?;
        self.pos += len;
        Ok(v)
    }

    /// Parses a whole class file
    pub fn read(mut self) -> ReadResult<ClassFile> {
        let magic = self.u32()?;
        if magic != MAGIC {
            return Err(ClassReadError::BadMagic(magic));
        }
        let minor_version = self.u16()?;
        let major_version = self.u16()?;
        let mut class = ClassFile::new(major_version);
        class.minor_version = minor_version;
        class.constant_pool = self.read_constant_pool()?;
        class.access_flags = self.u16()?;
        class.this_class = self.u16()?;
        class.super_class = self.u16()?;
        let interface_count = self.u16()?;
        for _ in 0..interface_count {
            class.interfaces.push(self.u16()?);
        }
        let field_count = self.u16()?;
        for _ in 0..field_count {
            let mut field = FieldInfo::new(self.u16()?, self.u16()?, self.u16()?);
            field.attributes = self.read_attributes()?;
            class.fields.push(field);
        }
        let method_count = self.u16()?;
        for _ in 0..method_count {
            let mut method = MethodInfo::new(self.u16()?, self.u16()?, self.u16()?);
            method.attributes = self.read_attributes()?;
            class.methods.push(method);
        }
        class.attributes = self.read_attributes()?;
        Ok(class)
    }

    fn read_constant_pool(&mut self) -> ReadResult<ConstantPool> {
        let count = self.u16()?;
        let mut pool = ConstantPool::new();
        let mut index = 1;
        while index < count {
            let tag = self.u8()?;
            let constant = match tag {
                CONSTANT_UTF8 => {
                    let len = self.u16()? as usize;
                    let raw = self.bytes(len)?;
                    Constant::Utf8(decode_modified_utf8(raw).ok_or(ClassReadError::BadUtf8)?)
                }
                CONSTANT_INTEGER => Constant::Integer(self.u32()? as i32),
                CONSTANT_FLOAT => Constant::Float(f32::from_bits(self.u32()?)),
                CONSTANT_LONG => Constant::Long(self.u64()? as i64),
                CONSTANT_DOUBLE => Constant::Double(f64::from_bits(self.u64()?)),
                CONSTANT_CLASS => Constant::Class(self.u16()?),
                CONSTANT_STRING => Constant::String(self.u16()?),
                CONSTANT_FIELDREF => Constant::FieldRef(self.u16()?, self.u16()?),
                CONSTANT_METHODREF => Constant::MethodRef(self.u16()?, self.u16()?),
                CONSTANT_INTERFACEMETHODREF => Constant::InterfaceMethodRef(self.u16()?, self.u16()?),
                CONSTANT_NAMEANDTYPE => Constant::NameAndType(self.u16()?, self.u16()?),
                tag => return Err(ClassReadError::UnknownConstantTag { tag, index }),
            };
            let wide = constant.is_wide();
            // push appends the gap slot itself for wide constants
            pool.push(constant).map_err(|_| ClassReadError::BadReference(index))?;
            index += if wide { 2 } else { 1 };
        }
        Ok(pool)
    }

    fn read_attributes(&mut self) -> ReadResult<Vec<AttributeInfo>> {
        let count = self.u16()?;
        let mut attributes = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let name_index = self.u16()?;
            let len = self.u32()? as usize;
            attributes.push(AttributeInfo::new(name_index, self.bytes(len)?.to_vec()));
        }
        Ok(attributes)
    }
}

/// Parses the body of a Code attribute
pub fn parse_code_attribute(info: &[u8]) -> ReadResult<CodeAttribute> {
    let mut reader = ClassReader::new(info);
    let max_stack = reader.u16()?;
    let max_locals = reader.u16()?;
    let code_len = reader.u32()? as usize;
    let code = reader.bytes(code_len)?.to_vec();
    let mut attribute = CodeAttribute::new(max_stack, max_locals, code);
    let handler_count = reader.u16()?;
    for _ in 0..handler_count {
        attribute.exception_table.push(ExceptionTableEntry::new(
            reader.u16()?,
            reader.u16()?,
            reader.u16()?,
            reader.u16()?,
        ));
    }
    attribute.attributes = reader.read_attributes()?;
    Ok(attribute)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    None,
    Int(i32),
    Local(u16),
    Constant(u16),
    /// Absolute target pc
    Branch(usize),
    TableSwitch { default: usize, low: i32, targets: Vec<usize> },
    LookupSwitch { default: usize, pairs: Vec<(i32, usize)> },
    Iinc { local: u16, delta: i16 },
    NewArray(u8),
    MultiANewArray { class: u16, dimensions: u8 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub pc: usize,
    pub opcode: u8,
    pub operand: Operand,
}

impl Instruction {
    pub fn mnemonic(&self) -> &'static str {
        opcodes::mnemonic(self.opcode).unwrap_or("???")
    }

    /// Human readable form with constant pool references resolved, e.g.
    /// `invokestatic java/util/List.of(Ljava/lang/Object;)Ljava/util/List;`
    pub fn render(&self, pool: &ConstantPool) -> String {
        let m = self.mnemonic();
        match &self.operand {
            Operand::None => m.to_string(),
            Operand::Int(v) => format!("{} {}", m, v),
            Operand::Local(l) => format!("{} {}", m, l),
            Operand::Branch(target) => format!("{} {}", m, target),
            Operand::Constant(index) => format!("{} {}", m, render_constant(pool, *index)),
            Operand::TableSwitch { default, low, targets } => {
                format!("{} {}..{} {:?} default {}", m, low, low + targets.len() as i32 - 1, targets, default)
            }
            Operand::LookupSwitch { default, pairs } => format!("{} {:?} default {}", m, pairs, default),
            Operand::Iinc { local, delta } => format!("{} {} {}", m, local, delta),
            Operand::NewArray(t) => format!("{} {}", m, t),
            Operand::MultiANewArray { class, dimensions } => {
                format!("{} {} {}", m, render_constant(pool, *class), dimensions)
            }
        }
    }
}

fn render_constant(pool: &ConstantPool, index: u16) -> String {
    if let Some((owner, name, desc)) = pool.member_at(index) {
        return match pool.get(index) {
            Some(Constant::FieldRef(..)) => format!("{}.{}:{}", owner, name, desc),
            _ => format!("{}.{}{}", owner, name, desc),
        };
    }
    match pool.get(index) {
        Some(Constant::Class(_)) => pool.class_name_at(index).unwrap_or("?").to_string(),
        Some(Constant::String(s)) => format!("{:?}", pool.utf8_at(*s).unwrap_or("?")),
        Some(Constant::Integer(v)) => v.to_string(),
        Some(Constant::Long(v)) => format!("{}L", v),
        Some(Constant::Float(v)) => format!("{}f", v),
        Some(Constant::Double(v)) => format!("{}d", v),
        Some(Constant::Utf8(s)) => s.clone(),
        _ => format!("#{}", index),
    }
}

/// Decodes a method body into instructions
pub fn disassemble(code: &[u8]) -> ReadResult<Vec<Instruction>> {
    let buf = ClassBuffer { data: code };
    let mut out = Vec::new();
    let mut pc = 0;
    while pc < code.len() {
        let opcode = buf.read_u8(pc)?;
        let kind = opcodes::operand_kind(opcode).ok_or(ClassReadError::UnknownOpcode { opcode, pc })?;
        let relative = |offset: i32| (pc as i64 + offset as i64) as usize;
        let (operand, len) = match kind {
            OperandKind::None => (Operand::None, 1),
            OperandKind::Byte if is_local_op(opcode) => (Operand::Local(buf.read_u8(pc + 1)? as u16), 2),
            OperandKind::Byte => (Operand::Int(buf.read_u8(pc + 1)? as i8 as i32), 2),
            OperandKind::Short => (Operand::Int(buf.read_u16(pc + 1)? as i16 as i32), 3),
            OperandKind::ConstU8 => (Operand::Constant(buf.read_u8(pc + 1)? as u16), 2),
            OperandKind::ConstU16 => (Operand::Constant(buf.read_u16(pc + 1)?), 3),
            OperandKind::Branch => (Operand::Branch(relative(buf.read_u16(pc + 1)? as i16 as i32)), 3),
            OperandKind::BranchWide => (Operand::Branch(relative(buf.read_i32(pc + 1)?)), 5),
            OperandKind::Iinc => (
                Operand::Iinc { local: buf.read_u8(pc + 1)? as u16, delta: buf.read_u8(pc + 2)? as i8 as i16 },
                3,
            ),
            OperandKind::InvokeInterface => (Operand::Constant(buf.read_u16(pc + 1)?), 5),
            OperandKind::InvokeDynamic => (Operand::Constant(buf.read_u16(pc + 1)?), 5),
            OperandKind::NewArray => (Operand::NewArray(buf.read_u8(pc + 1)?), 2),
            OperandKind::MultiANewArray => (
                Operand::MultiANewArray { class: buf.read_u16(pc + 1)?, dimensions: buf.read_u8(pc + 3)? },
                4,
            ),
            OperandKind::TableSwitch => {
                let base = (pc + 4) & !3;
                let default = relative(buf.read_i32(base)?);
                let low = buf.read_i32(base + 4)?;
                let high = buf.read_i32(base + 8)?;
                let count = (high - low + 1).max(0) as usize;
                let mut targets = Vec::with_capacity(count);
                for i in 0..count {
                    targets.push(relative(buf.read_i32(base + 12 + i * 4)?));
                }
                (Operand::TableSwitch { default, low, targets }, base + 12 + count * 4 - pc)
            }
            OperandKind::LookupSwitch => {
                let base = (pc + 4) & !3;
                let default = relative(buf.read_i32(base)?);
                let npairs = buf.read_i32(base + 4)?.max(0) as usize;
                let mut pairs = Vec::with_capacity(npairs);
                for i in 0..npairs {
                    let key = buf.read_i32(base + 8 + i * 8)?;
                    pairs.push((key, relative(buf.read_i32(base + 12 + i * 8)?)));
                }
                (Operand::LookupSwitch { default, pairs }, base + 8 + npairs * 8 - pc)
            }
            OperandKind::Wide => {
                let inner = buf.read_u8(pc + 1)?;
                let local = buf.read_u16(pc + 2)?;
                if inner == opcodes::IINC {
                    let delta = buf.read_u16(pc + 4)? as i16;
                    (Operand::Iinc { local, delta }, 6)
                } else {
                    (Operand::Local(local), 4)
                }
            }
        };
        out.push(Instruction { pc, opcode, operand });
        pc += len;
    }
    Ok(out)
}

fn is_local_op(opcode: u8) -> bool {
    matches!(opcode, opcodes::ILOAD..=opcodes::ALOAD | opcodes::ISTORE..=opcodes::ASTORE | opcodes::RET)
}

/// Convenience view over a read class used for inspection
pub struct ParsedClass {
    pub class_file: ClassFile,
}

impl ParsedClass {
    pub fn parse(bytes: &[u8]) -> ReadResult<Self> {
        Ok(Self { class_file: ClassReader::new(bytes).read()? })
    }

    pub fn pool(&self) -> &ConstantPool {
        &self.class_file.constant_pool
    }

    pub fn name(&self) -> &str {
        self.class_file.this_class_name().unwrap_or_default()
    }

    pub fn super_name(&self) -> &str {
        self.class_file.super_class_name().unwrap_or_default()
    }

    pub fn interfaces(&self) -> Vec<&str> {
        self.class_file.interfaces.iter().filter_map(|i| self.pool().class_name_at(*i)).collect()
    }

    pub fn version(&self) -> u16 {
        self.class_file.major_version
    }

    fn attribute<'a>(&'a self, attributes: &'a [AttributeInfo], name: &str) -> Option<&'a AttributeInfo> {
        attributes.iter().find(|a| a.name(self.pool()) == Some(name))
    }

    fn signature_of(&self, attributes: &[AttributeInfo]) -> Option<&str> {
        let attr = self.attribute(attributes, "Signature")?;
        let index = u16::from_be_bytes([*attr.info.first()?, *attr.info.get(1)?]);
        self.pool().utf8_at(index)
    }

    pub fn signature(&self) -> Option<&str> {
        self.signature_of(&self.class_file.attributes)
    }

    /// `(access, name, descriptor)` of every field
    pub fn fields(&self) -> Vec<(u16, &str, &str)> {
        self.class_file
            .fields
            .iter()
            .map(|f| {
                (
                    f.access_flags,
                    self.pool().utf8_at(f.name_index).unwrap_or_default(),
                    self.pool().utf8_at(f.descriptor_index).unwrap_or_default(),
                )
            })
            .collect()
    }

    pub fn field_signature(&self, name: &str) -> Option<&str> {
        let field = self.class_file.fields.iter().find(|f| self.pool().utf8_at(f.name_index) == Some(name))?;
        self.signature_of(&field.attributes)
    }

    /// `(access, name, descriptor)` of every method
    pub fn methods(&self) -> Vec<(u16, &str, &str)> {
        self.class_file
            .methods
            .iter()
            .map(|m| {
                (
                    m.access_flags,
                    self.pool().utf8_at(m.name_index).unwrap_or_default(),
                    self.pool().utf8_at(m.descriptor_index).unwrap_or_default(),
                )
            })
            .collect()
    }

    fn find_method(&self, name: &str, descriptor: &str) -> Option<&MethodInfo> {
        self.class_file.methods.iter().find(|m| {
            self.pool().utf8_at(m.name_index) == Some(name) && self.pool().utf8_at(m.descriptor_index) == Some(descriptor)
        })
    }

    pub fn has_method(&self, name: &str, descriptor: &str) -> bool {
        self.find_method(name, descriptor).is_some()
    }

    pub fn code(&self, name: &str, descriptor: &str) -> Option<CodeAttribute> {
        let method = self.find_method(name, descriptor)?;
        let attr = self.attribute(&method.attributes, "Code")?;
        parse_code_attribute(&attr.info).ok()
    }

    /// Rendered instructions of a method, empty if it has no body
    pub fn instructions(&self, name: &str, descriptor: &str) -> Vec<String> {
        self.code(name, descriptor)
            .and_then(|code| disassemble(&code.code).ok())
            .map(|insns| insns.iter().map(|i| i.render(self.pool())).collect())
            .unwrap_or_default()
    }

    /// Rendered instructions of every method, keyed by `name + descriptor`
    pub fn all_instructions(&self) -> Vec<(String, Vec<String>)> {
        self.methods()
            .into_iter()
            .map(|(_, name, desc)| (format!("{}{}", name, desc), self.instructions(name, desc)))
            .collect()
    }

    /// Whether any member reference in the pool matches
    pub fn references(&self, owner: &str, name: &str, descriptor: &str) -> bool {
        self.pool().iter().any(|(i, _)| self.pool().member_at(i) == Some((owner, name, descriptor)))
    }

    pub fn has_string_constant(&self, value: &str) -> bool {
        self.pool().iter().any(|(_, c)| matches!(c, Constant::String(s) if self.pool().utf8_at(*s) == Some(value)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::class_writer::ClassBuilder;
    use crate::codegen::descriptor::JvmType;

    #[test]
    fn test_round_trip_through_reader() {
        let mut builder = ClassBuilder::new("p/Q", "java/lang/Object", &["java/io/Serializable"], 0x0021, 61).unwrap();
        builder.add_field(0x0019, "N", &JvmType::Primitive(crate::codegen::descriptor::PrimitiveType::Long), None).unwrap();
        builder
            .add_method(0x0009, "f", "()J", |code| {
                code.ldc_long(1 << 40)?;
                code.return_value(&JvmType::Primitive(crate::codegen::descriptor::PrimitiveType::Long))?;
                Ok(())
            })
            .unwrap();
        let class = builder.finish(false).unwrap();
        let parsed = ParsedClass::parse(&class.bytes).unwrap();
        assert_eq!(parsed.name(), "p/Q");
        assert_eq!(parsed.interfaces(), vec!["java/io/Serializable"]);
        assert_eq!(parsed.fields(), vec![(0x0019, "N", "J")]);
        assert_eq!(parsed.instructions("f", "()J"), vec!["ldc2_w 1099511627776L", "lreturn"]);
    }

    #[test]
    fn test_bad_magic() {
        assert!(matches!(ClassReader::new(&[0, 1, 2, 3]).read(), Err(ClassReadError::BadMagic(_))));
    }
}

//! StackMapTable frames

use super::constpool::ConstantPool;
use super::error::ConstPoolResult;

/// VerificationTypeInfo as defined in JVMS 4.7.4
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationType {
    Top,
    Integer,
    Float,
    Double,
    Long,
    Null,
    UninitializedThis,
    Object(u16),        // cpool index to CONSTANT_Class
    Uninitialized(u16), // offset of the `new` instruction
}

impl VerificationType {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        match self {
            VerificationType::Top => bytes.push(0),
            VerificationType::Integer => bytes.push(1),
            VerificationType::Float => bytes.push(2),
            VerificationType::Double => bytes.push(3),
            VerificationType::Long => bytes.push(4),
            VerificationType::Null => bytes.push(5),
            VerificationType::UninitializedThis => bytes.push(6),
            VerificationType::Object(cp_index) => {
                bytes.push(7);
                bytes.extend_from_slice(&cp_index.to_be_bytes());
            }
            VerificationType::Uninitialized(offset) => {
                bytes.push(8);
                bytes.extend_from_slice(&offset.to_be_bytes());
            }
        }
        bytes
    }
}

/// Type of a local slot or stack entry as tracked while emitting code.
/// Object types carry their internal name and are interned into the pool
/// only when a frame is written.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum VType {
    Top,
    Integer,
    Float,
    Long,
    Double,
    Null,
    UninitializedThis,
    Object(String),
    Uninitialized(u16),
}

impl VType {
    pub fn is_wide(&self) -> bool {
        matches!(self, VType::Long | VType::Double)
    }

    pub fn size(&self) -> u16 {
        if self.is_wide() {
            2
        } else {
            1
        }
    }

    pub fn is_reference(&self) -> bool {
        matches!(
            self,
            VType::Null | VType::Object(_) | VType::UninitializedThis | VType::Uninitialized(_)
        )
    }

    /// Least upper bound used when two control-flow paths meet
    pub fn merge(&self, other: &VType) -> VType {
        match (self, other) {
            (a, b) if a == b => a.clone(),
            (VType::Null, o @ VType::Object(_)) | (o @ VType::Object(_), VType::Null) => o.clone(),
            (VType::Object(_), VType::Object(_)) => VType::Object("java/lang/Object".to_string()),
            _ => VType::Top,
        }
    }

    pub fn to_verification(&self, pool: &mut ConstantPool) -> ConstPoolResult<VerificationType> {
        Ok(match self {
            VType::Top => VerificationType::Top,
            VType::Integer => VerificationType::Integer,
            VType::Float => VerificationType::Float,
            VType::Long => VerificationType::Long,
            VType::Double => VerificationType::Double,
            VType::Null => VerificationType::Null,
            VType::UninitializedThis => VerificationType::UninitializedThis,
            VType::Object(name) => VerificationType::Object(pool.add_class(name)?),
            VType::Uninitialized(pc) => VerificationType::Uninitialized(*pc),
        })
    }
}

/// StackMapFrame variants as defined in JVMS 4.7.4
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StackMapFrame {
    Same { offset_delta: u16 },
    SameLocals1StackItem { offset_delta: u16, stack: VerificationType },
    Full { offset_delta: u16, locals: Vec<VerificationType>, stack: Vec<VerificationType> },
}

impl StackMapFrame {
    pub fn offset_delta(&self) -> u16 {
        match self {
            StackMapFrame::Same { offset_delta }
            | StackMapFrame::SameLocals1StackItem { offset_delta, .. }
            | StackMapFrame::Full { offset_delta, .. } => *offset_delta,
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        match self {
            StackMapFrame::Same { offset_delta } => {
                if *offset_delta <= 63 {
                    bytes.push(*offset_delta as u8);
                } else {
                    bytes.push(251); // same_frame_extended
                    bytes.extend_from_slice(&offset_delta.to_be_bytes());
                }
            }
            StackMapFrame::SameLocals1StackItem { offset_delta, stack } => {
                if *offset_delta <= 63 {
                    bytes.push(64 + *offset_delta as u8);
                } else {
                    bytes.push(247); // same_locals_1_stack_item_frame_extended
                    bytes.extend_from_slice(&offset_delta.to_be_bytes());
                }
                bytes.extend_from_slice(&stack.to_bytes());
            }
            StackMapFrame::Full { offset_delta, locals, stack } => {
                bytes.push(255);
                bytes.extend_from_slice(&offset_delta.to_be_bytes());
                bytes.extend_from_slice(&(locals.len() as u16).to_be_bytes());
                for l in locals {
                    bytes.extend_from_slice(&l.to_bytes());
                }
                bytes.extend_from_slice(&(stack.len() as u16).to_be_bytes());
                for s in stack {
                    bytes.extend_from_slice(&s.to_bytes());
                }
            }
        }
        bytes
    }
}

/// Converts slot-indexed locals to the frame encoding: a long or double is
/// listed once for its two slots and trailing tops are dropped.
pub fn compress_locals(locals: &[VType]) -> Vec<VType> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < locals.len() {
        let t = &locals[i];
        out.push(t.clone());
        i += if t.is_wide() { 2 } else { 1 };
    }
    while matches!(out.last(), Some(VType::Top)) {
        out.pop();
    }
    out
}

/// Picks the most compact frame type for `(locals, stack)` given the
/// previous frame's compressed locals
pub fn encode_frame(
    pool: &mut ConstantPool,
    offset_delta: u16,
    previous_locals: &[VType],
    locals: &[VType],
    stack: &[VType],
) -> ConstPoolResult<StackMapFrame> {
    if locals == previous_locals {
        match stack {
            [] => return Ok(StackMapFrame::Same { offset_delta }),
            [single] => {
                return Ok(StackMapFrame::SameLocals1StackItem {
                    offset_delta,
                    stack: single.to_verification(pool)?,
                })
            }
            _ => {}
        }
    }
    let locals = locals.iter().map(|t| t.to_verification(pool)).collect::<ConstPoolResult<Vec<_>>>()?;
    let stack = stack.iter().map(|t| t.to_verification(pool)).collect::<ConstPoolResult<Vec<_>>>()?;
    Ok(StackMapFrame::Full { offset_delta, locals, stack })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compress_locals() {
        let locals = vec![VType::Integer, VType::Long, VType::Top, VType::Top, VType::Top];
        assert_eq!(compress_locals(&locals), vec![VType::Integer, VType::Long]);
    }

    #[test]
    fn test_frame_selection() {
        let mut pool = ConstantPool::new();
        let locals = vec![VType::Object("a/B".into())];
        let f = encode_frame(&mut pool, 3, &locals, &locals, &[]).unwrap();
        assert_eq!(f, StackMapFrame::Same { offset_delta: 3 });
        let f = encode_frame(&mut pool, 70, &locals, &locals, &[VType::Integer]).unwrap();
        assert_eq!(f.to_bytes()[0], 247);
        let f = encode_frame(&mut pool, 0, &[], &locals, &[]).unwrap();
        assert!(matches!(f, StackMapFrame::Full { .. }));
    }

    #[test]
    fn test_merge() {
        let obj = VType::Object("a/B".into());
        assert_eq!(VType::Null.merge(&obj), obj);
        assert_eq!(VType::Integer.merge(&obj), VType::Top);
    }
}

//! Method body emission with operand stack and local variable tracking.
//!
//! `Code` writes instructions into a byte buffer while keeping a typed model
//! of the operand stack and locals. Every label that is the target of a jump,
//! a switch or an exception handler gets a stack map frame, so the emitted
//! methods verify under class file version 50 and later.

use std::collections::{BTreeMap, HashMap};

use super::attribute::{AttributeInfo, CodeAttribute, ExceptionTableEntry};
use super::class::access_flags::ACC_STATIC;
use super::constpool::ConstantPool;
use super::descriptor::{parse_method_descriptor, JvmType, PrimitiveType};
use super::error::{BytecodeError, BytecodeResult};
use super::frame::{compress_locals, encode_frame, VType};
use super::opcodes::*;

/// A position in the code that jumps can target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Label(usize);

/// Types of the locals and the operand stack at one program point
#[derive(Debug, Clone, PartialEq)]
struct State {
    locals: Vec<VType>,
    stack: Vec<VType>,
}

impl State {
    fn stack_size(&self) -> u16 {
        self.stack.iter().map(VType::size).sum()
    }

    fn merge_from(&mut self, other: &State) {
        let len = self.locals.len().max(other.locals.len());
        self.locals.resize(len, VType::Top);
        for (i, local) in self.locals.iter_mut().enumerate() {
            let theirs = other.locals.get(i).unwrap_or(&VType::Top);
            *local = local.merge(theirs);
        }
        if self.stack.len() == other.stack.len() {
            for (mine, theirs) in self.stack.iter_mut().zip(&other.stack) {
                *mine = mine.merge(theirs);
            }
        }
    }
}

#[derive(Debug, Default)]
struct LabelInfo {
    pc: Option<usize>,
    state: Option<State>,
    is_target: bool,
}

#[derive(Debug)]
struct Fixup {
    label: Label,
    /// pc of the instruction the offset is relative to
    base: usize,
    /// position of the offset operand
    at: usize,
    wide: bool,
}

#[derive(Debug)]
struct Handler {
    start: Label,
    end: Label,
    handler: Label,
    catch_type: Option<String>,
}

pub struct Code<'a> {
    pool: &'a mut ConstantPool,
    owner: String,
    bytes: Vec<u8>,
    state: State,
    initial_locals: Vec<VType>,
    alive: bool,
    max_stack: u16,
    max_locals: u16,
    labels: Vec<LabelInfo>,
    fixups: Vec<Fixup>,
    handlers: Vec<Handler>,
    new_types: HashMap<u16, String>,
}

fn vtype_of(t: &JvmType) -> VType {
    match t {
        JvmType::Primitive(p) => match p {
            PrimitiveType::Long => VType::Long,
            PrimitiveType::Float => VType::Float,
            PrimitiveType::Double => VType::Double,
            PrimitiveType::Void => VType::Top,
            _ => VType::Integer,
        },
        other => VType::Object(other.class_constant_name()),
    }
}

impl<'a> Code<'a> {
    /// Starts a method body. Locals are seeded from the receiver (unless
    /// static) and the descriptor's parameters.
    pub fn new(
        pool: &'a mut ConstantPool,
        owner: &str,
        access_flags: u16,
        name: &str,
        descriptor: &str,
    ) -> BytecodeResult<Self> {
        let (params, _) = parse_method_descriptor(descriptor)?;
        let mut locals = Vec::new();
        if access_flags & ACC_STATIC == 0 {
            locals.push(if name == "<init>" {
                VType::UninitializedThis
            } else {
                VType::Object(owner.to_string())
            });
        }
        for p in &params {
            let t = vtype_of(p);
            let wide = t.is_wide();
            locals.push(t);
            if wide {
                locals.push(VType::Top);
            }
        }
        let max_locals = locals.len() as u16;
        Ok(Self {
            pool,
            owner: owner.to_string(),
            bytes: Vec::new(),
            state: State { locals: locals.clone(), stack: Vec::new() },
            initial_locals: locals,
            alive: true,
            max_stack: 0,
            max_locals,
            labels: Vec::new(),
            fixups: Vec::new(),
            handlers: Vec::new(),
            new_types: HashMap::new(),
        })
    }

    pub fn pool(&mut self) -> &mut ConstantPool {
        self.pool
    }

    /// Internal name of the class this method belongs to
    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn cur_cp(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    /// Current operand stack depth in slots
    pub fn stack_depth(&self) -> u16 {
        self.state.stack_size()
    }

    pub fn max_stack(&self) -> u16 {
        self.max_stack
    }

    pub fn local_type(&self, slot: u16) -> Option<&VType> {
        self.state.locals.get(slot as usize)
    }

    fn emit1(&mut self, b: u8) {
        self.bytes.push(b);
    }

    fn emit2(&mut self, v: u16) {
        self.bytes.extend_from_slice(&v.to_be_bytes());
    }

    fn emit4(&mut self, v: u32) {
        self.bytes.extend_from_slice(&v.to_be_bytes());
    }

    fn emitop(&mut self, op: u8) {
        self.emit1(op);
    }

    fn emitop2(&mut self, op: u8, operand: u16) {
        self.emit1(op);
        self.emit2(operand);
    }

    fn push(&mut self, t: VType) {
        self.state.stack.push(t);
        self.max_stack = self.max_stack.max(self.state.stack_size());
    }

    fn push_jvm(&mut self, t: &JvmType) {
        if !t.is_void() {
            self.push(vtype_of(t));
        }
    }

    fn pop(&mut self) -> BytecodeResult<VType> {
        let pc = self.cur_cp();
        self.state.stack.pop().ok_or(BytecodeError::StackUnderflow { pc })
    }

    fn pop_n(&mut self, n: usize) -> BytecodeResult<()> {
        for _ in 0..n {
            self.pop()?;
        }
        Ok(())
    }

    fn touch_local(&mut self, slot: u16, size: u16) {
        self.max_locals = self.max_locals.max(slot + size);
    }

    // ---- constants ----

    pub fn aconst_null(&mut self) {
        self.emitop(ACONST_NULL);
        self.push(VType::Null);
    }

    pub fn iconst(&mut self, v: i32) -> BytecodeResult<()> {
        match v {
            -1..=5 => self.emitop((ICONST_0 as i32 + v) as u8),
            -128..=127 => {
                self.emitop(BIPUSH);
                self.emit1(v as i8 as u8);
            }
            -32768..=32767 => self.emitop2(SIPUSH, v as i16 as u16),
            _ => {
                let index = self.pool.add_integer(v)?;
                self.ldc_index(index);
            }
        }
        self.push(VType::Integer);
        Ok(())
    }

    /// Pushes the zero value of a primitive type
    pub fn zero(&mut self, p: PrimitiveType) -> BytecodeResult<()> {
        match p {
            PrimitiveType::Long => {
                self.emitop(LCONST_0);
                self.push(VType::Long);
            }
            PrimitiveType::Float => {
                self.emitop(FCONST_0);
                self.push(VType::Float);
            }
            PrimitiveType::Double => {
                self.emitop(DCONST_0);
                self.push(VType::Double);
            }
            PrimitiveType::Void => {}
            _ => self.iconst(0)?,
        }
        Ok(())
    }

    fn ldc_index(&mut self, index: u16) {
        if index <= u8::MAX as u16 {
            self.emitop(LDC);
            self.emit1(index as u8);
        } else {
            self.emitop2(LDC_W, index);
        }
    }

    pub fn ldc_string(&mut self, value: &str) -> BytecodeResult<()> {
        let index = self.pool.add_string(value)?;
        self.ldc_index(index);
        self.push(VType::Object("java/lang/String".to_string()));
        Ok(())
    }

    /// Pushes a class literal; primitives are not representable here
    pub fn ldc_class(&mut self, t: &JvmType) -> BytecodeResult<()> {
        let index = self.pool.add_class(&t.class_constant_name())?;
        self.ldc_index(index);
        self.push(VType::Object("java/lang/Class".to_string()));
        Ok(())
    }

    pub fn ldc_long(&mut self, v: i64) -> BytecodeResult<()> {
        let index = self.pool.add_long(v)?;
        self.emitop2(LDC2_W, index);
        self.push(VType::Long);
        Ok(())
    }

    pub fn ldc_double(&mut self, v: f64) -> BytecodeResult<()> {
        let index = self.pool.add_double(v)?;
        self.emitop2(LDC2_W, index);
        self.push(VType::Double);
        Ok(())
    }

    pub fn ldc_float(&mut self, v: f32) -> BytecodeResult<()> {
        let index = self.pool.add_float(v)?;
        self.ldc_index(index);
        self.push(VType::Float);
        Ok(())
    }

    // ---- locals ----

    /// Reserves a fresh local slot for a value of type `t`
    pub fn new_local(&mut self, t: &JvmType) -> u16 {
        let slot = self.state.locals.len() as u16;
        for _ in 0..t.size().max(1) {
            self.state.locals.push(VType::Top);
        }
        self.touch_local(slot, t.size().max(1));
        slot
    }

    fn local_op(&mut self, base: u8, short_base: u8, slot: u16) {
        if slot <= 3 {
            self.emitop(short_base + slot as u8);
        } else if slot <= u8::MAX as u16 {
            self.emitop(base);
            self.emit1(slot as u8);
        } else {
            self.emitop(WIDE);
            self.emitop2(base, slot);
        }
    }

    pub fn load(&mut self, slot: u16, t: &JvmType) {
        let (base, short) = match t.as_primitive() {
            Some(PrimitiveType::Long) => (LLOAD, LLOAD_0),
            Some(PrimitiveType::Float) => (FLOAD, FLOAD_0),
            Some(PrimitiveType::Double) => (DLOAD, DLOAD_0),
            Some(_) => (ILOAD, ILOAD_0),
            None => (ALOAD, ALOAD_0),
        };
        self.local_op(base, short, slot);
        let tracked = match (t.is_reference(), self.state.locals.get(slot as usize)) {
            (true, Some(v)) if v.is_reference() => v.clone(),
            _ => vtype_of(t),
        };
        self.push(tracked);
    }

    /// Loads a reference local with the type it was last stored with
    pub fn aload(&mut self, slot: u16) {
        self.local_op(ALOAD, ALOAD_0, slot);
        let t = self
            .state
            .locals
            .get(slot as usize)
            .cloned()
            .unwrap_or_else(|| VType::Object("java/lang/Object".to_string()));
        self.push(t);
    }

    pub fn iload(&mut self, slot: u16) {
        self.local_op(ILOAD, ILOAD_0, slot);
        self.push(VType::Integer);
    }

    pub fn store(&mut self, slot: u16, t: &JvmType) -> BytecodeResult<()> {
        let (base, short) = match t.as_primitive() {
            Some(PrimitiveType::Long) => (LSTORE, LSTORE_0),
            Some(PrimitiveType::Float) => (FSTORE, FSTORE_0),
            Some(PrimitiveType::Double) => (DSTORE, DSTORE_0),
            Some(_) => (ISTORE, ISTORE_0),
            None => (ASTORE, ASTORE_0),
        };
        self.local_op(base, short, slot);
        let value = self.pop()?;
        self.set_local(slot, value);
        Ok(())
    }

    pub fn astore(&mut self, slot: u16) -> BytecodeResult<()> {
        self.local_op(ASTORE, ASTORE_0, slot);
        let value = self.pop()?;
        self.set_local(slot, value);
        Ok(())
    }

    pub fn istore(&mut self, slot: u16) -> BytecodeResult<()> {
        self.local_op(ISTORE, ISTORE_0, slot);
        self.pop()?;
        self.set_local(slot, VType::Integer);
        Ok(())
    }

    fn set_local(&mut self, slot: u16, value: VType) {
        let size = value.size();
        let end = slot as usize + size as usize;
        if self.state.locals.len() < end {
            self.state.locals.resize(end, VType::Top);
        }
        self.state.locals[slot as usize] = value;
        if size == 2 {
            self.state.locals[slot as usize + 1] = VType::Top;
        }
        self.touch_local(slot, size);
    }

    // ---- stack manipulation ----

    pub fn dup(&mut self) -> BytecodeResult<()> {
        self.emitop(DUP);
        let top = self.pop()?;
        self.push(top.clone());
        self.push(top);
        Ok(())
    }

    pub fn dup_x1(&mut self) -> BytecodeResult<()> {
        self.emitop(DUP_X1);
        let a = self.pop()?;
        let b = self.pop()?;
        self.push(a.clone());
        self.push(b);
        self.push(a);
        Ok(())
    }

    pub fn swap(&mut self) -> BytecodeResult<()> {
        self.emitop(SWAP);
        let a = self.pop()?;
        let b = self.pop()?;
        self.push(a);
        self.push(b);
        Ok(())
    }

    /// Discards the top value, whatever its width
    pub fn pop_value(&mut self) -> BytecodeResult<()> {
        let top = self.pop()?;
        self.emitop(if top.is_wide() { POP2 } else { POP });
        Ok(())
    }

    pub fn ior(&mut self) -> BytecodeResult<()> {
        self.emitop(IOR);
        self.pop_n(2)?;
        self.push(VType::Integer);
        Ok(())
    }

    // ---- fields and invocations ----

    pub fn getstatic(&mut self, owner: &str, name: &str, t: &JvmType) -> BytecodeResult<()> {
        let index = self.pool.add_field_ref(owner, name, &t.descriptor())?;
        self.emitop2(GETSTATIC, index);
        self.push_jvm(t);
        Ok(())
    }

    pub fn putstatic(&mut self, owner: &str, name: &str, t: &JvmType) -> BytecodeResult<()> {
        let index = self.pool.add_field_ref(owner, name, &t.descriptor())?;
        self.emitop2(PUTSTATIC, index);
        self.pop()?;
        Ok(())
    }

    pub fn getfield(&mut self, owner: &str, name: &str, t: &JvmType) -> BytecodeResult<()> {
        let index = self.pool.add_field_ref(owner, name, &t.descriptor())?;
        self.emitop2(GETFIELD, index);
        self.pop()?;
        self.push_jvm(t);
        Ok(())
    }

    pub fn putfield(&mut self, owner: &str, name: &str, t: &JvmType) -> BytecodeResult<()> {
        let index = self.pool.add_field_ref(owner, name, &t.descriptor())?;
        self.emitop2(PUTFIELD, index);
        self.pop_n(2)?;
        Ok(())
    }

    pub fn invokevirtual(&mut self, owner: &str, name: &str, descriptor: &str) -> BytecodeResult<()> {
        self.invoke(INVOKEVIRTUAL, owner, name, descriptor, false)
    }

    pub fn invokespecial(&mut self, owner: &str, name: &str, descriptor: &str) -> BytecodeResult<()> {
        self.invoke(INVOKESPECIAL, owner, name, descriptor, false)
    }

    pub fn invokestatic(&mut self, owner: &str, name: &str, descriptor: &str) -> BytecodeResult<()> {
        self.invoke(INVOKESTATIC, owner, name, descriptor, false)
    }

    /// Static method declared on an interface, such as `List.of`
    pub fn invokestatic_interface(&mut self, owner: &str, name: &str, descriptor: &str) -> BytecodeResult<()> {
        self.invoke(INVOKESTATIC, owner, name, descriptor, true)
    }

    pub fn invokeinterface(&mut self, owner: &str, name: &str, descriptor: &str) -> BytecodeResult<()> {
        self.invoke(INVOKEINTERFACE, owner, name, descriptor, true)
    }

    fn invoke(&mut self, op: u8, owner: &str, name: &str, descriptor: &str, interface: bool) -> BytecodeResult<()> {
        let (params, ret) = parse_method_descriptor(descriptor)?;
        let index = if interface {
            self.pool.add_interface_method_ref(owner, name, descriptor)?
        } else {
            self.pool.add_method_ref(owner, name, descriptor)?
        };
        self.emitop2(op, index);
        if op == INVOKEINTERFACE {
            let count: u16 = 1 + params.iter().map(JvmType::size).sum::<u16>();
            self.emit1(count as u8);
            self.emit1(0);
        }
        self.pop_n(params.len())?;
        if op != INVOKESTATIC {
            let receiver = self.pop()?;
            if op == INVOKESPECIAL && name == "<init>" {
                self.initialize(&receiver);
            }
        }
        self.push_jvm(&ret);
        Ok(())
    }

    /// Replaces every copy of an uninitialized reference once its
    /// constructor has run
    fn initialize(&mut self, receiver: &VType) {
        let initialized = match receiver {
            VType::UninitializedThis => VType::Object(self.owner.clone()),
            VType::Uninitialized(pc) => match self.new_types.get(pc) {
                Some(name) => VType::Object(name.clone()),
                None => return,
            },
            _ => return,
        };
        for t in self.state.stack.iter_mut().chain(self.state.locals.iter_mut()) {
            if t == receiver {
                *t = initialized.clone();
            }
        }
    }

    // ---- objects and arrays ----

    pub fn new_instance(&mut self, class: &str) -> BytecodeResult<()> {
        let pc = self.cur_cp() as u16;
        let index = self.pool.add_class(class)?;
        self.emitop2(NEW, index);
        self.new_types.insert(pc, class.to_string());
        self.push(VType::Uninitialized(pc));
        Ok(())
    }

    pub fn checkcast(&mut self, t: &JvmType) -> BytecodeResult<()> {
        let index = self.pool.add_class(&t.class_constant_name())?;
        self.emitop2(CHECKCAST, index);
        self.pop()?;
        self.push(vtype_of(t));
        Ok(())
    }

    pub fn instanceof(&mut self, class: &str) -> BytecodeResult<()> {
        let index = self.pool.add_class(class)?;
        self.emitop2(INSTANCEOF, index);
        self.pop()?;
        self.push(VType::Integer);
        Ok(())
    }

    /// Creates a reference array; the length must be on the stack
    pub fn anewarray(&mut self, component: &JvmType) -> BytecodeResult<()> {
        let index = self.pool.add_class(&component.class_constant_name())?;
        self.emitop2(ANEWARRAY, index);
        self.pop()?;
        self.push(vtype_of(&JvmType::array_of(component.clone())));
        Ok(())
    }

    /// Loads a reference element; the element type comes from the array's
    /// tracked type
    pub fn aaload(&mut self) -> BytecodeResult<()> {
        self.emitop(AALOAD);
        self.pop()?;
        let array = self.pop()?;
        let element = match array {
            VType::Object(name) if name.starts_with('[') => JvmType::parse(&name, 1)
                .map(|(t, _)| vtype_of(&t))
                .unwrap_or_else(|_| VType::Object("java/lang/Object".to_string())),
            _ => VType::Object("java/lang/Object".to_string()),
        };
        self.push(element);
        Ok(())
    }

    pub fn aastore(&mut self) -> BytecodeResult<()> {
        self.emitop(AASTORE);
        self.pop_n(3)
    }

    // ---- control flow ----

    pub fn new_label(&mut self) -> Label {
        self.labels.push(LabelInfo::default());
        Label(self.labels.len() - 1)
    }

    /// Binds `label` to the current position. After an unconditional
    /// transfer the state is restored from the frame recorded by the jumps
    /// that target it.
    pub fn mark(&mut self, label: Label) {
        let pc = self.cur_cp();
        let alive = self.alive;
        let current = self.state.clone();
        let info = &mut self.labels[label.0];
        info.pc = Some(pc);
        match (&mut info.state, alive) {
            (Some(recorded), true) => {
                recorded.merge_from(&current);
                self.state = recorded.clone();
            }
            (Some(recorded), false) => self.state = recorded.clone(),
            (None, true) => info.state = Some(current),
            (None, false) => {
                self.state.stack.clear();
                info.state = Some(self.state.clone());
            }
        }
        self.alive = true;
    }

    fn record_jump(&mut self, label: Label) {
        let current = self.state.clone();
        let info = &mut self.labels[label.0];
        info.is_target = true;
        match &mut info.state {
            Some(recorded) => recorded.merge_from(&current),
            None => info.state = Some(current),
        }
    }

    fn branch(&mut self, op: u8, label: Label) {
        let base = self.cur_cp();
        self.emitop(op);
        self.fixups.push(Fixup { label, base, at: self.cur_cp(), wide: false });
        self.emit2(0);
    }

    pub fn goto(&mut self, label: Label) {
        self.branch(GOTO, label);
        self.record_jump(label);
        self.alive = false;
    }

    /// Conditional branch popping one operand: `ifeq`, `ifne`, `ifnull`,
    /// `ifnonnull` and friends
    pub fn if_zero(&mut self, op: u8, label: Label) -> BytecodeResult<()> {
        self.pop()?;
        self.branch(op, label);
        self.record_jump(label);
        Ok(())
    }

    /// Conditional branch comparing two operands
    pub fn if_cmp(&mut self, op: u8, label: Label) -> BytecodeResult<()> {
        self.pop_n(2)?;
        self.branch(op, label);
        self.record_jump(label);
        Ok(())
    }

    /// Emits a `tableswitch` over `low..low + targets.len()`
    pub fn tableswitch(&mut self, low: i32, targets: &[Label], default: Label) -> BytecodeResult<()> {
        self.pop()?;
        let base = self.cur_cp();
        self.emitop(TABLESWITCH);
        while self.bytes.len() % 4 != 0 {
            self.emit1(0);
        }
        self.fixups.push(Fixup { label: default, base, at: self.cur_cp(), wide: true });
        self.emit4(0);
        let high = low + targets.len() as i32 - 1;
        self.emit4(low as u32);
        self.emit4(high as u32);
        for &target in targets {
            self.fixups.push(Fixup { label: target, base, at: self.cur_cp(), wide: true });
            self.emit4(0);
        }
        self.record_jump(default);
        for &target in targets {
            self.record_jump(target);
        }
        self.alive = false;
        Ok(())
    }

    /// Registers an exception handler for `[start, end)`. `catch_type` of
    /// `None` catches everything.
    pub fn try_catch(&mut self, start: Label, end: Label, handler: Label, catch_type: Option<&str>) {
        self.handlers.push(Handler { start, end, handler, catch_type: catch_type.map(str::to_string) });
    }

    /// Binds a handler label. Its frame has the locals of the protected
    /// range's start and the caught exception on the stack.
    pub fn mark_handler(&mut self, label: Label, exception: &str) {
        let locals = self
            .handlers
            .iter()
            .find(|h| h.handler == label)
            .and_then(|h| self.labels[h.start.0].state.as_ref())
            .map(|s| s.locals.clone())
            .unwrap_or_else(|| self.initial_locals.clone());
        let state = State { locals, stack: vec![VType::Object(exception.to_string())] };
        self.max_stack = self.max_stack.max(state.stack_size());
        let pc = self.cur_cp();
        let info = &mut self.labels[label.0];
        info.pc = Some(pc);
        info.is_target = true;
        info.state = Some(state.clone());
        self.state = state;
        self.alive = true;
    }

    pub fn athrow(&mut self) -> BytecodeResult<()> {
        self.emitop(ATHROW);
        self.pop()?;
        self.alive = false;
        Ok(())
    }

    /// Returns a value of type `t`, or nothing for void
    pub fn return_value(&mut self, t: &JvmType) -> BytecodeResult<()> {
        let op = match t.as_primitive() {
            Some(PrimitiveType::Void) => RETURN,
            Some(PrimitiveType::Long) => LRETURN,
            Some(PrimitiveType::Float) => FRETURN,
            Some(PrimitiveType::Double) => DRETURN,
            Some(_) => IRETURN,
            None => ARETURN,
        };
        self.emitop(op);
        if op != RETURN {
            self.pop()?;
        }
        self.alive = false;
        Ok(())
    }

    pub fn return_void(&mut self) -> BytecodeResult<()> {
        self.return_value(&JvmType::void())
    }

    /// Resolves branches and produces the Code attribute with its
    /// StackMapTable
    pub fn finish(self) -> BytecodeResult<CodeAttribute> {
        let Code { pool, mut bytes, labels, fixups, handlers, initial_locals, max_stack, max_locals, .. } = self;
        if bytes.len() > u16::MAX as usize {
            return Err(BytecodeError::CodeTooLarge { size: bytes.len() });
        }
        let pc_of = |label: Label| labels[label.0].pc.ok_or(BytecodeError::UnboundLabel { label: label.0 });

        for fixup in &fixups {
            let offset = pc_of(fixup.label)? as i64 - fixup.base as i64;
            if fixup.wide {
                bytes[fixup.at..fixup.at + 4].copy_from_slice(&(offset as i32).to_be_bytes());
            } else {
                let short = i16::try_from(offset).map_err(|_| BytecodeError::BranchTooFar { offset })?;
                bytes[fixup.at..fixup.at + 2].copy_from_slice(&short.to_be_bytes());
            }
        }

        let mut exception_table = Vec::with_capacity(handlers.len());
        for h in &handlers {
            let catch_type = match &h.catch_type {
                Some(name) => pool.add_class(name)?,
                None => 0,
            };
            exception_table.push(ExceptionTableEntry::new(
                pc_of(h.start)? as u16,
                pc_of(h.end)? as u16,
                pc_of(h.handler)? as u16,
                catch_type,
            ));
        }

        let mut targets: BTreeMap<usize, &State> = BTreeMap::new();
        for info in labels.iter().filter(|l| l.is_target) {
            if let (Some(pc), Some(state)) = (info.pc, info.state.as_ref()) {
                targets.entry(pc).or_insert(state);
            }
        }
        let mut frames = Vec::with_capacity(targets.len());
        let mut previous_locals = compress_locals(&initial_locals);
        let mut previous_pc: Option<usize> = None;
        for (pc, state) in targets {
            let delta = match previous_pc {
                None => pc,
                Some(p) => pc - p - 1,
            };
            let locals = compress_locals(&state.locals);
            frames.push(encode_frame(pool, delta as u16, &previous_locals, &locals, &state.stack)?);
            previous_locals = locals;
            previous_pc = Some(pc);
        }

        log::trace!(
            "finished method body: size={} frames={} max_stack={} max_locals={}",
            bytes.len(),
            frames.len(),
            max_stack,
            max_locals
        );
        let mut code = CodeAttribute::new(max_stack, max_locals, bytes);
        code.exception_table = exception_table;
        if !frames.is_empty() {
            code.attributes.push(AttributeInfo::stack_map_table(pool, &frames)?);
        }
        Ok(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::frame::StackMapFrame;

    fn code<'a>(pool: &'a mut ConstantPool, desc: &str) -> Code<'a> {
        Code::new(pool, "a/Owner", 0x0001, "m", desc).unwrap()
    }

    #[test]
    fn test_max_stack_and_locals() {
        let mut pool = ConstantPool::new();
        let mut c = code(&mut pool, "(J)V");
        assert_eq!(c.max_locals, 3);
        c.ldc_long(5).unwrap();
        c.iconst(1).unwrap();
        assert_eq!(c.stack_depth(), 3);
        c.pop_value().unwrap();
        c.pop_value().unwrap();
        c.return_void().unwrap();
        let attr = c.finish().unwrap();
        assert_eq!(attr.max_stack, 3);
        assert!(attr.attributes.is_empty());
    }

    #[test]
    fn test_branch_creates_frame() {
        let mut pool = ConstantPool::new();
        let mut c = code(&mut pool, "(Ljava/lang/Object;)Ljava/lang/Object;");
        let end = c.new_label();
        c.aload(1);
        c.if_zero(IFNONNULL, end).unwrap();
        c.aconst_null();
        c.return_value(&JvmType::java_object()).unwrap();
        c.mark(end);
        c.aload(1);
        c.return_value(&JvmType::java_object()).unwrap();
        let attr = c.finish().unwrap();
        // aload_1, ifnonnull +5, aconst_null, areturn, aload_1, areturn
        assert_eq!(attr.code, vec![0x2b, 0xc7, 0x00, 0x05, 0x01, 0xb0, 0x2b, 0xb0]);
        assert_eq!(attr.attributes.len(), 1);
    }

    #[test]
    fn test_same_frame_after_initial_locals() {
        let mut pool = ConstantPool::new();
        let mut c = code(&mut pool, "(I)V");
        let l = c.new_label();
        c.iload(1);
        c.if_zero(IFEQ, l).unwrap();
        c.mark(l);
        c.return_void().unwrap();
        let attr = c.finish().unwrap();
        let frames = &attr.attributes[0].info;
        // one frame, same_frame with delta 4
        assert_eq!(frames, &vec![0x00, 0x01, 0x04]);
        assert_eq!(StackMapFrame::Same { offset_delta: 4 }.to_bytes(), vec![0x04]);
    }

    #[test]
    fn test_tableswitch_padding() {
        let mut pool = ConstantPool::new();
        let mut c = code(&mut pool, "(I)V");
        let a = c.new_label();
        let d = c.new_label();
        c.iload(1);
        c.tableswitch(0, &[a], d).unwrap();
        c.mark(a);
        c.return_void().unwrap();
        c.mark(d);
        c.return_void().unwrap();
        let attr = c.finish().unwrap();
        // iload_1 at 0, tableswitch at 1, two padding bytes
        assert_eq!(attr.code[1], TABLESWITCH);
        assert_eq!(&attr.code[2..4], &[0, 0]);
        let default = i32::from_be_bytes([attr.code[4], attr.code[5], attr.code[6], attr.code[7]]);
        assert_eq!(default, 20);
    }

    #[test]
    fn test_constructor_initializes_receiver() {
        let mut pool = ConstantPool::new();
        let mut c = Code::new(&mut pool, "a/Owner", 0x0001, "<init>", "()V").unwrap();
        assert_eq!(c.local_type(0), Some(&VType::UninitializedThis));
        c.aload(0);
        c.invokespecial("java/lang/Object", "<init>", "()V").unwrap();
        assert_eq!(c.local_type(0), Some(&VType::Object("a/Owner".into())));
        c.new_instance("x/Y").unwrap();
        c.dup().unwrap();
        c.invokespecial("x/Y", "<init>", "()V").unwrap();
        c.pop_value().unwrap();
        c.return_void().unwrap();
        assert!(c.finish().is_ok());
    }

    #[test]
    fn test_unbound_label() {
        let mut pool = ConstantPool::new();
        let mut c = code(&mut pool, "()V");
        let l = c.new_label();
        c.goto(l);
        assert!(matches!(c.finish(), Err(BytecodeError::UnboundLabel { .. })));
    }

    #[test]
    fn test_stack_underflow() {
        let mut pool = ConstantPool::new();
        let mut c = code(&mut pool, "()V");
        assert!(matches!(c.pop_value(), Err(BytecodeError::StackUnderflow { pc: 0 })));
    }
}

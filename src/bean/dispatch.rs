//! Indexed dispatch tables.
//!
//! Targets are registered once and addressed only by the index returned at
//! registration. [`DispatchWriter::write`] turns them into up to three dense
//! `tableswitch` methods: `dispatch` (arguments as an array), `dispatchOne`
//! (a single argument) and `getTargetMethodByIndex`. Indices a method does
//! not handle, and indices outside the table, fall to a default branch that
//! throws the runtime's unknown-index exception.

use crate::codegen::class::access_flags::{ACC_FINAL, ACC_PROTECTED, ACC_PUBLIC};
use crate::codegen::descriptor::{method_descriptor, JvmType};
use crate::codegen::emit::{box_if_primitive, cast_to_type, push_array, push_class, push_default_value};
use crate::codegen::opcodes::{IFEQ, IFNONNULL, IFNULL};
use crate::codegen::{ClassBuilder, Code, Label};
use crate::consts::names::{KOTLIN_DEFAULT_SUFFIX, PROXY_BRIDGE_PREFIX};
use crate::consts::types;
use crate::error::Result;
use crate::model::{FieldElement, MethodElement};

pub const DISPATCH: &str = "dispatch";
pub const DISPATCH_ONE: &str = "dispatchOne";
pub const GET_TARGET_METHOD: &str = "getTargetMethodByIndex";

const TARGET_SLOT: u16 = 2;
const ARGS_SLOT: u16 = 3;

pub fn dispatch_descriptor() -> String {
    method_descriptor(
        &[JvmType::int(), JvmType::java_object(), JvmType::array_of(JvmType::java_object())],
        &JvmType::java_object(),
    )
}

pub fn dispatch_one_descriptor() -> String {
    method_descriptor(&[JvmType::int(), JvmType::java_object(), JvmType::java_object()], &JvmType::java_object())
}

pub fn get_target_method_descriptor() -> String {
    method_descriptor(&[JvmType::int()], &JvmType::object(types::METHOD))
}

#[derive(Debug, Clone, PartialEq)]
pub enum DispatchTarget {
    FieldGet { field: FieldElement, reflective: bool },
    FieldSet { field: FieldElement, reflective: bool },
    Method { method: MethodElement },
    ReflectiveMethod { method: MethodElement },
    /// A method with Kotlin default parameters, called through its
    /// `$default` companion
    KotlinDefaults { method: MethodElement },
    /// A method that is routed through the proxy's bridge when the
    /// instance is the intercepted subtype
    Interceptable { method: MethodElement, proxy_type: String },
}

impl DispatchTarget {
    pub fn supports_dispatch_multi(&self) -> bool {
        !matches!(self, DispatchTarget::FieldSet { .. })
    }

    pub fn supports_dispatch_one(&self) -> bool {
        match self {
            DispatchTarget::FieldSet { .. } => true,
            DispatchTarget::Method { method } | DispatchTarget::ReflectiveMethod { method } => {
                method.parameters.len() <= 1
            }
            _ => false,
        }
    }

    /// The method a reflective lookup by index resolves to
    pub fn method(&self) -> Option<&MethodElement> {
        match self {
            DispatchTarget::Method { method }
            | DispatchTarget::ReflectiveMethod { method }
            | DispatchTarget::KotlinDefaults { method }
            | DispatchTarget::Interceptable { method, .. } => Some(method),
            _ => None,
        }
    }
}

/// Dispatch targets of one generated class
#[derive(Debug, Clone, Default)]
pub struct DispatchWriter {
    owner: String,
    targets: Vec<DispatchTarget>,
    interceptable_flag: Option<String>,
}

impl DispatchWriter {
    /// `owner` is the internal name of the class the methods are written to
    pub fn new(owner: &str) -> Self {
        Self { owner: owner.to_string(), ..Self::default() }
    }

    /// Names the boolean field of `owner` that enables proxy bridges
    pub fn with_interceptable_flag(mut self, field: &str) -> Self {
        self.interceptable_flag = Some(field.to_string());
        self
    }

    /// Registers a target and returns its permanent index
    pub fn add(&mut self, target: DispatchTarget) -> usize {
        self.targets.push(target);
        self.targets.len() - 1
    }

    pub fn target(&self, index: usize) -> Option<&DispatchTarget> {
        self.targets.get(index)
    }

    pub fn targets(&self) -> &[DispatchTarget] {
        &self.targets
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Writes every dispatch method that has at least one case
    pub fn write(&self, builder: &mut ClassBuilder) -> Result<()> {
        if self.targets.iter().any(DispatchTarget::supports_dispatch_multi) {
            self.write_switch(builder, DISPATCH, &dispatch_descriptor(), DispatchTarget::supports_dispatch_multi, |w, code, t| {
                w.dispatch_case(code, t)
            })?;
        }
        if self.targets.iter().any(DispatchTarget::supports_dispatch_one) {
            self.write_switch(builder, DISPATCH_ONE, &dispatch_one_descriptor(), DispatchTarget::supports_dispatch_one, |w, code, t| {
                w.dispatch_one_case(code, t)
            })?;
        }
        if self.targets.iter().any(|t| t.method().is_some()) {
            self.write_switch(builder, GET_TARGET_METHOD, &get_target_method_descriptor(), |t| t.method().is_some(), |_, code, t| {
                match t.method() {
                    Some(method) => push_target_method(code, method),
                    None => Ok(()),
                }
            })?;
        }
        log::debug!("wrote dispatch table of {} with {} targets", self.owner, self.targets.len());
        Ok(())
    }

    fn write_switch<S, C>(&self, builder: &mut ClassBuilder, name: &str, descriptor: &str, supports: S, mut case: C) -> Result<()>
    where
        S: Fn(&DispatchTarget) -> bool,
        C: FnMut(&Self, &mut Code<'_>, &DispatchTarget) -> Result<()>,
    {
        let access = if name == GET_TARGET_METHOD { ACC_PROTECTED | ACC_FINAL } else { ACC_PUBLIC | ACC_FINAL };
        builder.add_method(access, name, descriptor, |code| {
            let default = code.new_label();
            let labels: Vec<Label> = self
                .targets
                .iter()
                .map(|t| if supports(t) { code.new_label() } else { default })
                .collect();
            code.iload(1);
            code.tableswitch(0, &labels, default)?;
            for (target, label) in self.targets.iter().zip(&labels) {
                if *label != default {
                    code.mark(*label);
                    case(self, code, target)?;
                }
            }
            code.mark(default);
            code.aload(0);
            code.iload(1);
            let desc = method_descriptor(&[JvmType::int()], &JvmType::object(types::RUNTIME_EXCEPTION));
            code.invokevirtual(&self.owner, "unknownDispatchAtIndexException", &desc)?;
            code.athrow()?;
            Ok(())
        })
    }

    fn dispatch_case(&self, code: &mut Code<'_>, target: &DispatchTarget) -> Result<()> {
        match target {
            DispatchTarget::FieldGet { field, reflective: false } => {
                let t = field.class_element.jvm_type();
                let owner = field.declaring_type.internal_name();
                if field.modifiers.is_static {
                    code.getstatic(&owner, &field.name, &t)?;
                } else {
                    code.aload(TARGET_SLOT);
                    code.checkcast(&JvmType::Object(owner.clone()))?;
                    code.getfield(&owner, &field.name, &t)?;
                }
                box_if_primitive(code, &t)?;
            }
            DispatchTarget::FieldGet { field, reflective: true } => {
                push_required_field(code, field)?;
                code.aload(TARGET_SLOT);
                let desc = method_descriptor(&[JvmType::object(types::FIELD), JvmType::java_object()], &JvmType::java_object());
                code.invokestatic(types::REFLECTION_UTILS, "getField", &desc)?;
            }
            DispatchTarget::Method { method } => {
                push_receiver(code, method)?;
                for (i, p) in method.parameters.iter().enumerate() {
                    push_array_argument(code, i, &p.class_element.jvm_type())?;
                }
                invoke_method(code, method)?;
                push_return(code, method)?;
            }
            DispatchTarget::ReflectiveMethod { method } => {
                self.push_reflective_call(code, method, |code| {
                    code.aload(ARGS_SLOT);
                    Ok(())
                })?;
            }
            DispatchTarget::KotlinDefaults { method } => push_kotlin_defaults_call(code, method)?,
            DispatchTarget::Interceptable { method, proxy_type } => {
                let plain = code.new_label();
                if let Some(flag) = &self.interceptable_flag {
                    code.aload(0);
                    code.getfield(&self.owner, flag, &JvmType::boolean())?;
                    code.if_zero(IFEQ, plain)?;
                }
                code.aload(TARGET_SLOT);
                code.instanceof(proxy_type)?;
                code.if_zero(IFEQ, plain)?;
                code.aload(TARGET_SLOT);
                code.checkcast(&JvmType::Object(proxy_type.clone()))?;
                for (i, p) in method.parameters.iter().enumerate() {
                    push_array_argument(code, i, &p.class_element.jvm_type())?;
                }
                let bridge = format!("{}{}", PROXY_BRIDGE_PREFIX, method.name);
                code.invokevirtual(proxy_type, &bridge, &method.descriptor())?;
                push_return(code, method)?;
                code.return_value(&JvmType::java_object())?;
                code.mark(plain);
                push_receiver(code, method)?;
                for (i, p) in method.parameters.iter().enumerate() {
                    push_array_argument(code, i, &p.class_element.jvm_type())?;
                }
                invoke_method(code, method)?;
                push_return(code, method)?;
            }
            DispatchTarget::FieldSet { .. } => return Ok(()),
        }
        code.return_value(&JvmType::java_object())?;
        Ok(())
    }

    fn dispatch_one_case(&self, code: &mut Code<'_>, target: &DispatchTarget) -> Result<()> {
        match target {
            DispatchTarget::FieldSet { field, reflective: false } => {
                let t = field.class_element.jvm_type();
                let owner = field.declaring_type.internal_name();
                if !field.modifiers.is_static {
                    code.aload(TARGET_SLOT);
                    code.checkcast(&JvmType::Object(owner.clone()))?;
                }
                code.aload(ARGS_SLOT);
                cast_to_type(code, &t)?;
                if field.modifiers.is_static {
                    code.putstatic(&owner, &field.name, &t)?;
                } else {
                    code.putfield(&owner, &field.name, &t)?;
                }
                code.aconst_null();
            }
            DispatchTarget::FieldSet { field, reflective: true } => {
                push_required_field(code, field)?;
                code.aload(TARGET_SLOT);
                code.aload(ARGS_SLOT);
                let desc = method_descriptor(
                    &[JvmType::object(types::FIELD), JvmType::java_object(), JvmType::java_object()],
                    &JvmType::void(),
                );
                code.invokestatic(types::REFLECTION_UTILS, "setField", &desc)?;
                code.aconst_null();
            }
            DispatchTarget::Method { method } => {
                push_receiver(code, method)?;
                if let Some(p) = method.parameters.first() {
                    code.aload(ARGS_SLOT);
                    cast_to_type(code, &p.class_element.jvm_type())?;
                }
                invoke_method(code, method)?;
                push_return(code, method)?;
            }
            DispatchTarget::ReflectiveMethod { method } => {
                let len = method.parameters.len();
                self.push_reflective_call(code, method, |code| {
                    push_array(code, &JvmType::java_object(), len, |code, _| {
                        code.aload(ARGS_SLOT);
                        Ok(())
                    })
                })?;
            }
            _ => return Ok(()),
        }
        code.return_value(&JvmType::java_object())?;
        Ok(())
    }

    /// `ReflectionUtils.invokeMethod(target, getAccessibleTargetMethodByIndex(index), args)`
    fn push_reflective_call<F>(&self, code: &mut Code<'_>, method: &MethodElement, push_args: F) -> Result<()>
    where
        F: FnOnce(&mut Code<'_>) -> Result<()>,
    {
        if method.is_static() {
            code.aconst_null();
        } else {
            code.aload(TARGET_SLOT);
        }
        code.aload(0);
        code.iload(1);
        let lookup = method_descriptor(&[JvmType::int()], &JvmType::object(types::METHOD));
        code.invokevirtual(&self.owner, "getAccessibleTargetMethodByIndex", &lookup)?;
        push_args(code)?;
        let desc = method_descriptor(
            &[JvmType::java_object(), JvmType::object(types::METHOD), JvmType::array_of(JvmType::java_object())],
            &JvmType::java_object(),
        );
        code.invokestatic(types::REFLECTION_UTILS, "invokeMethod", &desc)?;
        let ret = method.return_type.jvm_type();
        if ret.is_void() {
            code.pop_value()?;
            code.aconst_null();
        } else {
            code.checkcast(&ret.boxed())?;
        }
        Ok(())
    }
}

fn push_receiver(code: &mut Code<'_>, method: &MethodElement) -> Result<()> {
    if !method.is_static() {
        code.aload(TARGET_SLOT);
        code.checkcast(&method.declaring_type.jvm_type())?;
    }
    Ok(())
}

fn push_array_argument(code: &mut Code<'_>, index: usize, t: &JvmType) -> Result<()> {
    code.aload(ARGS_SLOT);
    code.iconst(index as i32)?;
    code.aaload()?;
    cast_to_type(code, t)
}

/// Invokes `method` with receiver and arguments already on the stack
pub fn invoke_method(code: &mut Code<'_>, method: &MethodElement) -> Result<()> {
    let owner = method.declaring_type.internal_name();
    let desc = method.descriptor();
    let interface = method.declaring_type.is_interface();
    match (method.is_static(), interface) {
        (true, true) => code.invokestatic_interface(&owner, &method.name, &desc)?,
        (true, false) => code.invokestatic(&owner, &method.name, &desc)?,
        (false, true) => code.invokeinterface(&owner, &method.name, &desc)?,
        (false, false) => code.invokevirtual(&owner, &method.name, &desc)?,
    }
    Ok(())
}

/// Leaves the boxed result, or `null` for `void`, on the stack
fn push_return(code: &mut Code<'_>, method: &MethodElement) -> Result<()> {
    let ret = method.return_type.jvm_type();
    if ret.is_void() {
        code.aconst_null();
    } else {
        box_if_primitive(code, &ret)?;
    }
    Ok(())
}

fn push_required_field(code: &mut Code<'_>, field: &FieldElement) -> Result<()> {
    code.ldc_class(&field.declaring_type.jvm_type())?;
    code.ldc_string(&field.name)?;
    let desc = method_descriptor(&[JvmType::object(types::CLASS), JvmType::string()], &JvmType::object(types::FIELD));
    code.invokestatic(types::REFLECTION_UTILS, "getRequiredField", &desc)?;
    Ok(())
}

fn push_target_method(code: &mut Code<'_>, method: &MethodElement) -> Result<()> {
    code.ldc_class(&method.declaring_type.jvm_type())?;
    code.ldc_string(&method.name)?;
    let params = method.parameter_types();
    push_array(code, &JvmType::object(types::CLASS), params.len(), |code, i| push_class(code, &params[i]))?;
    let class = JvmType::object(types::CLASS);
    let desc = method_descriptor(&[class.clone(), JvmType::string(), JvmType::array_of(class)], &JvmType::object(types::METHOD));
    code.invokestatic(types::REFLECTION_UTILS, "getRequiredMethod", &desc)?;
    code.return_value(&JvmType::object(types::METHOD))?;
    Ok(())
}

/// Number of `int` masks a Kotlin `$default` companion takes
pub fn kotlin_mask_count(parameters: usize) -> usize {
    parameters.div_ceil(32).max(1)
}

/// Descriptor of the `$default` companion of `method`: the receiver first
/// for instance methods, then the parameters, the masks and a marker
pub fn kotlin_defaults_descriptor(method: &MethodElement) -> String {
    let mut params = Vec::new();
    if !method.is_static() {
        params.push(method.declaring_type.jvm_type());
    }
    params.extend(method.parameter_types());
    params.extend(std::iter::repeat(JvmType::int()).take(kotlin_mask_count(method.parameters.len())));
    params.push(JvmType::java_object());
    method_descriptor(&params, &method.return_type.jvm_type())
}

/// Calls `name$default` with arguments from the `Object[]` in the args
/// slot. Mask bit `i` is set when argument `i` is null and the parameter
/// declares a default.
fn push_kotlin_defaults_call(code: &mut Code<'_>, method: &MethodElement) -> Result<()> {
    let masks: Vec<u16> = (0..kotlin_mask_count(method.parameters.len()))
        .map(|_| code.new_local(&JvmType::int()))
        .collect();
    for &mask in &masks {
        code.iconst(0)?;
        code.istore(mask)?;
    }
    let mut slots = Vec::with_capacity(method.parameters.len());
    for i in 0..method.parameters.len() {
        let slot = code.new_local(&JvmType::java_object());
        code.aload(ARGS_SLOT);
        code.iconst(i as i32)?;
        code.aaload()?;
        code.astore(slot)?;
        slots.push(slot);
    }
    for (i, p) in method.parameters.iter().enumerate() {
        if p.has_default {
            let present = code.new_label();
            code.aload(slots[i]);
            code.if_zero(IFNONNULL, present)?;
            let mask = masks[i / 32];
            code.iload(mask);
            code.iconst(1 << (i % 32))?;
            code.ior()?;
            code.istore(mask)?;
            code.mark(present);
        }
    }
    push_receiver(code, method)?;
    for (i, p) in method.parameters.iter().enumerate() {
        let t = p.class_element.jvm_type();
        if p.has_default {
            let missing = code.new_label();
            let done = code.new_label();
            code.aload(slots[i]);
            code.if_zero(IFNULL, missing)?;
            code.aload(slots[i]);
            cast_to_type(code, &t)?;
            code.goto(done);
            code.mark(missing);
            push_default_value(code, &t)?;
            code.mark(done);
        } else {
            code.aload(slots[i]);
            cast_to_type(code, &t)?;
        }
    }
    for &mask in &masks {
        code.iload(mask);
    }
    code.aconst_null();
    let owner = method.declaring_type.internal_name();
    let name = format!("{}{}", method.name, KOTLIN_DEFAULT_SUFFIX);
    code.invokestatic(&owner, &name, &kotlin_defaults_descriptor(method))?;
    push_return(code, method)
}

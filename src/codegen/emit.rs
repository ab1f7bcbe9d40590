//! Reusable instruction sequences: arrays, collections, boxing and
//! constructor calls.

use super::code::Code;
use super::descriptor::{method_descriptor, JvmType};
use crate::error::Result;

/// Largest arity with a dedicated `List.of`/`Set.of`/`Map.of` overload
pub const MAX_FIXED_ARITY: usize = 10;

const LIST: &str = "java/util/List";
const SET: &str = "java/util/Set";
const MAP: &str = "java/util/Map";
const MAP_ENTRY: &str = "java/util/Map$Entry";

/// Pushes a new array of `component` with `len` elements, each produced by
/// `push_element`. An empty array is just the allocation.
pub fn push_array<F>(code: &mut Code<'_>, component: &JvmType, len: usize, mut push_element: F) -> Result<()>
where
    F: FnMut(&mut Code<'_>, usize) -> Result<()>,
{
    code.iconst(len as i32)?;
    code.anewarray(component)?;
    for i in 0..len {
        code.dup()?;
        code.iconst(i as i32)?;
        push_element(code, i)?;
        code.aastore()?;
    }
    Ok(())
}

/// Boxes the value on top of the stack if `t` is primitive
pub fn box_if_primitive(code: &mut Code<'_>, t: &JvmType) -> Result<()> {
    if let Some(p) = t.as_primitive().filter(|_| t.is_primitive()) {
        let wrapper = p.wrapper();
        let desc = method_descriptor(&[t.clone()], &JvmType::Object(wrapper.to_string()));
        code.invokestatic(wrapper, "valueOf", &desc)?;
    }
    Ok(())
}

/// Converts an `Object` on the stack to `t`: a checkcast for references,
/// a cast to the wrapper and unboxing for primitives
pub fn cast_to_type(code: &mut Code<'_>, t: &JvmType) -> Result<()> {
    match t {
        _ if t.is_void() || t.is_java_object() => {}
        JvmType::Primitive(p) => {
            let wrapper = JvmType::Object(p.wrapper().to_string());
            code.checkcast(&wrapper)?;
            let desc = method_descriptor(&[], t);
            code.invokevirtual(p.wrapper(), p.unbox_method(), &desc)?;
        }
        _ => code.checkcast(t)?,
    }
    Ok(())
}

/// Pushes `null` or the zero value of a primitive type
pub fn push_default_value(code: &mut Code<'_>, t: &JvmType) -> Result<()> {
    match t.as_primitive() {
        Some(p) => code.zero(p)?,
        None => code.aconst_null(),
    }
    Ok(())
}

/// Pushes the `Class` object for `t`; primitives load the wrapper's `TYPE`
pub fn push_class(code: &mut Code<'_>, t: &JvmType) -> Result<()> {
    match t.as_primitive() {
        Some(p) => code.getstatic(p.wrapper(), "TYPE", &JvmType::object("java/lang/Class"))?,
        None => code.ldc_class(t)?,
    }
    Ok(())
}

pub fn push_string_or_null(code: &mut Code<'_>, value: Option<&str>) -> Result<()> {
    match value {
        Some(s) => code.ldc_string(s)?,
        None => code.aconst_null(),
    }
    Ok(())
}

pub fn push_bool(code: &mut Code<'_>, value: bool) -> Result<()> {
    code.iconst(value as i32)?;
    Ok(())
}

fn object_params(n: usize) -> Vec<JvmType> {
    vec![JvmType::java_object(); n]
}

fn push_collection_of<F>(code: &mut Code<'_>, owner: &str, len: usize, push_element: F) -> Result<()>
where
    F: FnMut(&mut Code<'_>, usize) -> Result<()>,
{
    let ret = JvmType::Object(owner.to_string());
    if len <= MAX_FIXED_ARITY {
        let mut push_element = push_element;
        for i in 0..len {
            push_element(code, i)?;
        }
        code.invokestatic_interface(owner, "of", &method_descriptor(&object_params(len), &ret))?;
    } else {
        push_array(code, &JvmType::java_object(), len, push_element)?;
        let desc = method_descriptor(&[JvmType::array_of(JvmType::java_object())], &ret);
        code.invokestatic_interface(owner, "of", &desc)?;
    }
    Ok(())
}

/// Pushes an immutable `List` of `len` elements
pub fn push_list_of<F>(code: &mut Code<'_>, len: usize, push_element: F) -> Result<()>
where
    F: FnMut(&mut Code<'_>, usize) -> Result<()>,
{
    push_collection_of(code, LIST, len, push_element)
}

/// Pushes an immutable `Set` of `len` elements
pub fn push_set_of<F>(code: &mut Code<'_>, len: usize, push_element: F) -> Result<()>
where
    F: FnMut(&mut Code<'_>, usize) -> Result<()>,
{
    push_collection_of(code, SET, len, push_element)
}

/// Pushes an immutable `Map` of `len` entries. `push_entry` pushes the key
/// and then the value of entry `i`. Up to ten entries use the fixed-arity
/// `Map.of`; larger maps go through `Map.ofEntries`.
pub fn push_map_of<F>(code: &mut Code<'_>, len: usize, mut push_entry: F) -> Result<()>
where
    F: FnMut(&mut Code<'_>, usize) -> Result<()>,
{
    let map = JvmType::object(MAP);
    if len <= MAX_FIXED_ARITY {
        for i in 0..len {
            push_entry(code, i)?;
        }
        code.invokestatic_interface(MAP, "of", &method_descriptor(&object_params(len * 2), &map))?;
    } else {
        let entry = JvmType::object(MAP_ENTRY);
        let entry_desc = method_descriptor(&object_params(2), &entry);
        push_array(code, &entry, len, |code, i| {
            push_entry(code, i)?;
            code.invokestatic_interface(MAP, "entry", &entry_desc)?;
            Ok(())
        })?;
        let desc = method_descriptor(&[JvmType::array_of(entry)], &map);
        code.invokestatic_interface(MAP, "ofEntries", &desc)?;
    }
    Ok(())
}

/// Pushes a `Map<String, V>` with entries in key order so output does not
/// depend on insertion order
pub fn push_string_map_of<V, F>(code: &mut Code<'_>, entries: &[(&str, V)], mut push_value: F) -> Result<()>
where
    F: FnMut(&mut Code<'_>, &V) -> Result<()>,
{
    let mut sorted: Vec<&(&str, V)> = entries.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));
    push_map_of(code, sorted.len(), |code, i| {
        let (key, value) = sorted[i];
        code.ldc_string(key)?;
        push_value(code, value)
    })
}

/// `new owner(args)`, leaving the instance on the stack
pub fn invoke_constructor<F>(code: &mut Code<'_>, owner: &str, params: &[JvmType], push_args: F) -> Result<()>
where
    F: FnOnce(&mut Code<'_>) -> Result<()>,
{
    code.new_instance(owner)?;
    code.dup()?;
    push_args(code)?;
    code.invokespecial(owner, "<init>", &method_descriptor(params, &JvmType::void()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::constpool::ConstantPool;
    use crate::codegen::opcodes::*;

    fn with_code<F: FnOnce(&mut Code<'_>) -> Result<()>>(f: F) -> (Vec<u8>, ConstantPool) {
        let mut pool = ConstantPool::new();
        let bytes = {
            let mut code = Code::new(&mut pool, "a/B", 0x0009, "m", "()V").unwrap();
            f(&mut code).unwrap();
            code.pop_value().unwrap();
            code.return_void().unwrap();
            code.finish().unwrap().code
        };
        (bytes, pool)
    }

    #[test]
    fn test_empty_array_has_no_dup() {
        let (bytes, _) = with_code(|code| push_array(code, &JvmType::string(), 0, |_, _| Ok(())));
        assert_eq!(bytes[0], ICONST_0);
        assert_eq!(bytes[1], ANEWARRAY);
        assert!(!bytes.contains(&DUP));
    }

    #[test]
    fn test_map_of_uses_fixed_arity() {
        let (_, pool) = with_code(|code| push_map_of(code, 2, |code, _| {
            code.aconst_null();
            code.aconst_null();
            Ok(())
        }));
        let refs: Vec<_> = pool.iter().filter_map(|(i, _)| pool.member_at(i)).collect();
        assert!(refs.contains(&(
            "java/util/Map",
            "of",
            "(Ljava/lang/Object;Ljava/lang/Object;Ljava/lang/Object;Ljava/lang/Object;)Ljava/util/Map;"
        )));
    }

    #[test]
    fn test_primitive_class_uses_wrapper_type() {
        let (_, pool) = with_code(|code| push_class(code, &JvmType::int()));
        let refs: Vec<_> = pool.iter().filter_map(|(i, _)| pool.member_at(i)).collect();
        assert_eq!(refs, vec![("java/lang/Integer", "TYPE", "Ljava/lang/Class;")]);
    }
}

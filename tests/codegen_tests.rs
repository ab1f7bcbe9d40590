//! Class file building blocks exercised through the public API

use beanc::bean::{DispatchTarget, DispatchWriter};
use beanc::codegen::access_flags::{ACC_PUBLIC, ACC_STATIC, ACC_SUPER};
use beanc::codegen::emit::{push_list_of, push_map_of, push_string_map_of, MAX_FIXED_ARITY};
use beanc::codegen::{ClassBuilder, Code, JvmType, ParsedClass};
use beanc::consts::types;
use beanc::model::{ClassElement, FieldElement, MethodElement, Modifiers, ParameterElement};
use beanc::Result;

/// Emits a static method returning the value pushed by `body` and returns
/// its rendered instructions
fn emitted<F>(body: F) -> Vec<String>
where
    F: FnOnce(&mut Code<'_>) -> Result<()>,
{
    let mut builder = ClassBuilder::new("t/Gen", types::OBJECT, &[], ACC_PUBLIC | ACC_SUPER, 61).unwrap();
    builder
        .add_method(ACC_PUBLIC | ACC_STATIC, "m", "()Ljava/lang/Object;", |code| {
            body(code)?;
            code.return_value(&JvmType::java_object())?;
            Ok(())
        })
        .unwrap();
    let class = ParsedClass::parse(&builder.finish(true).unwrap().bytes).unwrap();
    class.instructions("m", "()Ljava/lang/Object;")
}

fn objects(n: usize) -> String {
    "Ljava/lang/Object;".repeat(n)
}

fn nulls(code: &mut Code<'_>, n: usize) {
    for _ in 0..n {
        code.aconst_null();
    }
}

#[cfg(test)]
mod collection_tests {
    use super::*;

    #[test]
    fn test_list_at_fixed_arity_limit() {
        let insns = emitted(|code| push_list_of(code, MAX_FIXED_ARITY, |code, _| Ok(code.aconst_null())));
        let mut expected = vec!["aconst_null".to_string(); 10];
        expected.push(format!("invokestatic java/util/List.of({})Ljava/util/List;", objects(10)));
        expected.push("areturn".to_string());
        assert_eq!(insns, expected);
    }

    #[test]
    fn test_list_above_fixed_arity_limit() {
        let insns = emitted(|code| push_list_of(code, MAX_FIXED_ARITY + 1, |code, _| Ok(code.aconst_null())));
        assert_eq!(insns[0], "bipush 11");
        assert_eq!(insns[1], "anewarray java/lang/Object");
        assert_eq!(insns.iter().filter(|i| *i == "aastore").count(), 11);
        assert_eq!(insns[insns.len() - 2], "invokestatic java/util/List.of([Ljava/lang/Object;)Ljava/util/List;");
    }

    #[test]
    fn test_map_at_fixed_arity_limit() {
        let insns = emitted(|code| push_map_of(code, MAX_FIXED_ARITY, |code, _| Ok(nulls(code, 2))));
        let mut expected = vec!["aconst_null".to_string(); 20];
        expected.push(format!("invokestatic java/util/Map.of({})Ljava/util/Map;", objects(20)));
        expected.push("areturn".to_string());
        assert_eq!(insns, expected);
    }

    #[test]
    fn test_map_above_fixed_arity_limit() {
        let insns = emitted(|code| push_map_of(code, MAX_FIXED_ARITY + 1, |code, _| Ok(nulls(code, 2))));
        let entry = "invokestatic java/util/Map.entry(Ljava/lang/Object;Ljava/lang/Object;)Ljava/util/Map$Entry;";
        assert_eq!(insns.iter().filter(|i| *i == entry).count(), 11);
        assert_eq!(insns[1], "anewarray java/util/Map$Entry");
        assert_eq!(
            insns[insns.len() - 2],
            "invokestatic java/util/Map.ofEntries([Ljava/util/Map$Entry;)Ljava/util/Map;"
        );
        assert!(!insns.iter().any(|i| i.starts_with("invokestatic java/util/Map.of(")));
    }

    #[test]
    fn test_string_map_is_sorted() {
        let entries = [("zone", 1), ("app", 2), ("mid", 3)];
        let insns = emitted(|code| push_string_map_of(code, &entries, |code, _| Ok(code.aconst_null())));
        let keys: Vec<&String> = insns.iter().filter(|i| i.starts_with("ldc")).collect();
        assert_eq!(keys, vec!["ldc \"app\"", "ldc \"mid\"", "ldc \"zone\""]);
    }
}

#[cfg(test)]
mod dispatch_tests {
    use super::*;

    fn dispatch_class(writer: &DispatchWriter) -> ParsedClass {
        let mut builder = ClassBuilder::new("a/Host", types::OBJECT, &[], ACC_PUBLIC | ACC_SUPER, 61).unwrap();
        writer.write(&mut builder).unwrap();
        ParsedClass::parse(&builder.finish(true).unwrap().bytes).unwrap()
    }

    const DISPATCH: &str = "(ILjava/lang/Object;[Ljava/lang/Object;)Ljava/lang/Object;";

    #[test]
    fn test_unsupported_index_falls_to_default() {
        let owner = ClassElement::of("a.Target");
        let mut writer = DispatchWriter::new("a/Host");
        let method = MethodElement::new(&owner, "run", ClassElement::of("java.lang.String"))
            .with_parameter(ParameterElement::new("arg", ClassElement::of("java.lang.String")));
        let field = FieldElement::new(&owner, "hidden", ClassElement::of("a.Repo")).with_modifiers(Modifiers::private());
        assert_eq!(writer.add(DispatchTarget::Method { method }), 0);
        assert_eq!(writer.add(DispatchTarget::FieldSet { field, reflective: true }), 1);

        let class = dispatch_class(&writer);
        let insns = class.instructions("dispatch", DISPATCH);
        let switch = insns.iter().find(|i| i.starts_with("tableswitch 0..1")).expect("tableswitch");
        let (targets, default) = switch.split_once(" default ").unwrap();
        let targets = &targets[targets.find('[').unwrap() + 1..targets.len() - 1];
        let targets: Vec<&str> = targets.split(", ").collect();
        assert_eq!(targets.len(), 2);
        assert_ne!(targets[0], default);
        assert_eq!(targets[1], default, "field set has no dispatch case");
        assert!(insns.contains(
            &"invokevirtual a/Host.unknownDispatchAtIndexException(I)Ljava/lang/RuntimeException;".to_string()
        ));
        assert_eq!(insns.last().map(String::as_str), Some("athrow"));
        assert!(class.has_method("dispatchOne", "(ILjava/lang/Object;Ljava/lang/Object;)Ljava/lang/Object;"));
    }
}

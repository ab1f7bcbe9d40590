//! Argument materialization.
//!
//! Emits `Argument` instances describing constructor parameters, fields,
//! method parameters and return types, recursing into generic type
//! arguments. The narrowest factory overload that carries the required
//! information is chosen for every argument.

use std::collections::HashSet;

use indexmap::IndexMap;

use super::metadata::MaterializeContext;
use crate::codegen::descriptor::{method_descriptor, JvmType};
use crate::codegen::emit::{push_array, push_class, push_string_map_of};
use crate::codegen::Code;
use crate::consts::types;
use crate::error::{Error, Result};
use crate::model::{AnnotationMetadata, ClassElement, ParameterElement};

/// The `Argument` factory overload used for one argument
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgumentOverload {
    /// `of(Class, String)`
    Plain,
    /// `ofTypeVariable(Class, String, String)`
    TypeVariable,
    /// `of(Class, String, Argument[])`
    Generic,
    /// `ofTypeVariable(Class, String, String, AnnotationMetadata, Argument[])`
    TypeVariableFull,
    /// `of(Class, String, AnnotationMetadata, Argument[])`
    Full,
}

impl ArgumentOverload {
    pub fn select(has_metadata: bool, has_generics: bool, has_variable: bool) -> Self {
        match (has_metadata, has_generics, has_variable) {
            (false, false, false) => ArgumentOverload::Plain,
            (false, false, true) => ArgumentOverload::TypeVariable,
            (_, _, true) => ArgumentOverload::TypeVariableFull,
            (false, true, false) => ArgumentOverload::Generic,
            (true, _, false) => ArgumentOverload::Full,
        }
    }

    pub fn method_name(&self) -> &'static str {
        match self {
            ArgumentOverload::TypeVariable | ArgumentOverload::TypeVariableFull => "ofTypeVariable",
            _ => "of",
        }
    }

    pub fn descriptor(&self) -> String {
        let class = JvmType::object(types::CLASS);
        let string = JvmType::string();
        let metadata = JvmType::object(types::ANNOTATION_METADATA);
        let arguments = argument_array();
        let params = match self {
            ArgumentOverload::Plain => vec![class, string],
            ArgumentOverload::TypeVariable => vec![class, string.clone(), string],
            ArgumentOverload::Generic => vec![class, string, arguments],
            ArgumentOverload::TypeVariableFull => vec![class, string.clone(), string, metadata, arguments],
            ArgumentOverload::Full => vec![class, string, metadata, arguments],
        };
        method_descriptor(&params, &argument())
    }
}

/// Identity of a type variable: its name together with the type it is
/// bounded by
fn variable_key(variable: &str, bound: &ClassElement) -> String {
    format!("{}:{}", variable, bound.name)
}

pub fn argument() -> JvmType {
    JvmType::object(types::ARGUMENT)
}

pub fn argument_array() -> JvmType {
    JvmType::array_of(argument())
}

/// Pushes the shared empty `Argument[]`
pub fn push_zero_arguments(code: &mut Code<'_>) -> Result<()> {
    code.getstatic(types::ARGUMENT, "ZERO_ARGUMENTS", &argument_array())?;
    Ok(())
}

/// Emits arguments for one writer pass. The visited set holds the types
/// whose arguments are being expanded on the current path; it is threaded
/// through the recursion explicitly.
pub struct ArgumentWriter<'c> {
    ctx: &'c mut MaterializeContext,
}

impl<'c> ArgumentWriter<'c> {
    pub fn new(ctx: &'c mut MaterializeContext) -> Self {
        Self { ctx }
    }

    pub fn context(&mut self) -> &mut MaterializeContext {
        self.ctx
    }

    /// Pushes an `Argument` for a value named `name` of type `t`
    pub fn push_argument(
        &mut self,
        code: &mut Code<'_>,
        name: &str,
        t: &ClassElement,
        metadata: &AnnotationMetadata,
    ) -> Result<()> {
        let mut visited = HashSet::new();
        self.push_argument_visited(code, name, t, metadata, &mut visited)
    }

    fn push_argument_visited(
        &mut self,
        code: &mut Code<'_>,
        name: &str,
        t: &ClassElement,
        metadata: &AnnotationMetadata,
        visited: &mut HashSet<String>,
    ) -> Result<()> {
        if t.name.is_empty() {
            return Err(Error::malformed(format!("type argument '{}' has no native type", name)));
        }
        let variable = t.placeholder.as_deref().filter(|v| *v != name);
        let has_metadata = !metadata.is_empty() || matches!(metadata, AnnotationMetadata::Reference { .. });
        let has_generics = !t.type_arguments.is_empty();
        let overload = ArgumentOverload::select(has_metadata, has_generics, variable.is_some());
        log::trace!("argument: name={} type={} overload={:?}", name, t.name, overload);

        push_class(code, &t.jvm_type())?;
        code.ldc_string(name)?;
        if let Some(variable) = variable {
            code.ldc_string(variable)?;
        }
        match overload {
            ArgumentOverload::Plain | ArgumentOverload::TypeVariable => {}
            ArgumentOverload::Generic => self.push_type_parameters(code, t, visited)?,
            ArgumentOverload::TypeVariableFull | ArgumentOverload::Full => {
                self.ctx.push_annotation_metadata_or_null(code, metadata)?;
                self.push_type_parameters(code, t, visited)?;
            }
        }
        code.invokestatic_interface(types::ARGUMENT, overload.method_name(), &overload.descriptor())?;
        Ok(())
    }

    fn push_type_parameters(&mut self, code: &mut Code<'_>, t: &ClassElement, visited: &mut HashSet<String>) -> Result<()> {
        if t.type_arguments.is_empty() {
            return push_zero_arguments(code);
        }
        // Only a type variable can refer back to itself through its bound;
        // concrete arguments are finite and always expanded in full.
        let key = t.placeholder.as_ref().map(|variable| variable_key(variable, t));
        if let Some(key) = &key {
            if !visited.insert(key.clone()) {
                log::trace!("cut generic expansion at {}", key);
                return push_zero_arguments(code);
            }
        }
        let entries: Vec<(&String, &ClassElement)> = t.type_arguments.iter().collect();
        let result = push_array(code, &argument(), entries.len(), |code, i| {
            let (variable, argument) = entries[i];
            let metadata = argument.annotation_metadata.clone();
            self.push_argument_visited(code, variable, argument, &metadata, visited)
        });
        if let Some(key) = &key {
            visited.remove(key);
        }
        result
    }

    /// Pushes an `Argument[]` for method or constructor parameters
    pub fn push_parameters(&mut self, code: &mut Code<'_>, parameters: &[ParameterElement]) -> Result<()> {
        if parameters.is_empty() {
            return push_zero_arguments(code);
        }
        push_array(code, &argument(), parameters.len(), |code, i| {
            let p = &parameters[i];
            self.push_argument(code, &p.name, &p.class_element, &p.annotation_metadata)
        })
    }

    /// Pushes the `Argument` for a return type; `void` uses the shared
    /// constant
    pub fn push_return_type(&mut self, code: &mut Code<'_>, t: &ClassElement) -> Result<()> {
        if t.is_void() {
            code.getstatic(types::ARGUMENT, "VOID", &argument())?;
            return Ok(());
        }
        self.push_argument(code, "R", t, &t.annotation_metadata)
    }

    /// Pushes a `Map<String, Argument[]>` of type arguments per type name,
    /// ordered by type name
    pub fn push_type_arguments_map(
        &mut self,
        code: &mut Code<'_>,
        type_arguments: &IndexMap<String, IndexMap<String, ClassElement>>,
    ) -> Result<()> {
        let entries: Vec<(&str, &IndexMap<String, ClassElement>)> =
            type_arguments.iter().map(|(k, v)| (k.as_str(), v)).collect();
        push_string_map_of(code, &entries, |code, arguments| {
            let arguments: Vec<(&String, &ClassElement)> = arguments.iter().collect();
            push_array(code, &argument(), arguments.len(), |code, i| {
                let (variable, t) = arguments[i];
                self.push_argument(code, variable, t, &t.annotation_metadata)
            })
        })
    }
}

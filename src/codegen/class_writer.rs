//! Class assembly on top of the raw classfile structures.
//!
//! `ClassBuilder` owns a `ClassFile` and its constant pool; fields and
//! methods are added through it and method bodies are emitted through a
//! `Code` cursor that borrows the pool.

use super::attribute::AttributeInfo;
use super::class::ClassFile;
use super::code::Code;
use super::descriptor::JvmType;
use super::field::FieldInfo;
use super::method::MethodInfo;
use super::writer::ClassfileWritable;
use crate::error::Result;
use crate::verify;

/// A finished class: binary name plus serialized bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedClass {
    /// Binary (dotted) class name
    pub name: String,
    pub bytes: Vec<u8>,
}

impl GeneratedClass {
    pub fn internal_name(&self) -> String {
        self.name.replace('.', "/")
    }
}

pub struct ClassBuilder {
    class_file: ClassFile,
    name: String,
    super_name: String,
    inner_classes: Vec<(String, String, String, u16)>,
}

impl ClassBuilder {
    /// Starts a class. Names are internal (slash separated).
    pub fn new(name: &str, super_name: &str, interfaces: &[&str], access_flags: u16, version: u16) -> Result<Self> {
        let mut class_file = ClassFile::new(version);
        class_file.access_flags = access_flags;
        class_file.this_class = class_file.constant_pool.add_class(name)?;
        class_file.super_class = class_file.constant_pool.add_class(super_name)?;
        for interface in interfaces {
            let index = class_file.constant_pool.add_class(interface)?;
            class_file.interfaces.push(index);
        }
        Ok(Self {
            class_file,
            name: name.to_string(),
            super_name: super_name.to_string(),
            inner_classes: Vec::new(),
        })
    }

    /// Internal name of the class being built
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn super_name(&self) -> &str {
        &self.super_name
    }

    pub fn set_signature(&mut self, signature: &str) -> Result<()> {
        let attr = AttributeInfo::signature(&mut self.class_file.constant_pool, signature)?;
        self.class_file.attributes.push(attr);
        Ok(())
    }

    /// Records a nested class relationship for the InnerClasses attribute
    pub fn add_inner_class(&mut self, inner: &str, outer: &str, simple_name: &str, access_flags: u16) {
        self.inner_classes
            .push((inner.to_string(), outer.to_string(), simple_name.to_string(), access_flags));
    }

    pub fn add_field(&mut self, access_flags: u16, name: &str, t: &JvmType, signature: Option<&str>) -> Result<()> {
        let pool = &mut self.class_file.constant_pool;
        let mut field = FieldInfo::new(access_flags, pool.add_utf8(name)?, pool.add_utf8(&t.descriptor())?);
        if let Some(sig) = signature {
            field.attributes.push(AttributeInfo::signature(pool, sig)?);
        }
        self.class_file.fields.push(field);
        Ok(())
    }

    /// Adds a method whose body is produced by `body`
    pub fn add_method<F>(&mut self, access_flags: u16, name: &str, descriptor: &str, body: F) -> Result<()>
    where
        F: FnOnce(&mut Code<'_>) -> Result<()>,
    {
        let owner = self.name.clone();
        let pool = &mut self.class_file.constant_pool;
        let name_index = pool.add_utf8(name)?;
        let descriptor_index = pool.add_utf8(descriptor)?;
        let mut code = Code::new(pool, &owner, access_flags, name, descriptor)?;
        body(&mut code)?;
        let code_attribute = code.finish()?;
        log::trace!("emitted {}.{}{} ({} bytes)", owner, name, descriptor, code_attribute.code.len());
        let mut method = MethodInfo::new(access_flags, name_index, descriptor_index);
        method.attributes.push(AttributeInfo::code(pool, &code_attribute)?);
        self.class_file.methods.push(method);
        Ok(())
    }

    /// Adds a method without a body, such as an abstract declaration
    pub fn add_abstract_method(&mut self, access_flags: u16, name: &str, descriptor: &str) -> Result<()> {
        let pool = &mut self.class_file.constant_pool;
        let method = MethodInfo::new(access_flags, pool.add_utf8(name)?, pool.add_utf8(descriptor)?);
        self.class_file.methods.push(method);
        Ok(())
    }

    pub fn into_class_file(mut self) -> Result<ClassFile> {
        if !self.inner_classes.is_empty() {
            let attr = AttributeInfo::inner_classes(&mut self.class_file.constant_pool, &self.inner_classes)?;
            self.class_file.attributes.push(attr);
        }
        Ok(self.class_file)
    }

    /// Serializes the class, optionally running the structural verifier first
    pub fn finish(self, verify_output: bool) -> Result<GeneratedClass> {
        let name = self.name.replace('/', ".");
        let class_file = self.into_class_file()?;
        if verify_output {
            verify::verify(&class_file)?;
        }
        Ok(GeneratedClass { name, bytes: class_file.to_classfile_bytes() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::class::access_flags::*;

    #[test]
    fn test_build_minimal_class() {
        let mut builder = ClassBuilder::new("a/B", "java/lang/Object", &[], ACC_PUBLIC | ACC_SUPER, 61).unwrap();
        builder.add_field(ACC_PRIVATE, "x", &JvmType::int(), None).unwrap();
        builder
            .add_method(ACC_PUBLIC, "<init>", "()V", |code| {
                code.aload(0);
                code.invokespecial("java/lang/Object", "<init>", "()V")?;
                code.return_void()?;
                Ok(())
            })
            .unwrap();
        let class = builder.finish(true).unwrap();
        assert_eq!(class.name, "a.B");
        assert_eq!(&class.bytes[0..4], &[0xCA, 0xFE, 0xBA, 0xBE]);
    }
}

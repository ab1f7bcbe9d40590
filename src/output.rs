//! Destinations for generated classes and service registrations.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::model::Element;

/// Directory holding one empty marker file per service implementation
pub const SERVICES_DIR: &str = "META-INF/micronaut";

/// Receives the output of the writers
pub trait ClassWriterOutputVisitor {
    /// Opens a sink for the class `name` (binary name). `originating` lists
    /// the source elements the class was generated from.
    fn visit_class<'a>(&'a mut self, name: &str, originating: &[&dyn Element]) -> Result<Box<dyn Write + 'a>>;

    /// Registers `implementation` (binary name) as a provider of `service`
    fn visit_service_descriptor(&mut self, service: &str, implementation: &str, originating: &dyn Element) -> Result<()>;
}

/// Writes classes under a root directory in package layout
#[derive(Debug, Clone)]
pub struct DirectoryOutputVisitor {
    root: PathBuf,
}

impl DirectoryOutputVisitor {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the class file for binary name `name`
    pub fn class_path(&self, name: &str) -> PathBuf {
        let mut path = self.root.clone();
        path.extend(name.split('.'));
        path.set_extension("class");
        path
    }
}

impl ClassWriterOutputVisitor for DirectoryOutputVisitor {
    fn visit_class<'a>(&'a mut self, name: &str, originating: &[&dyn Element]) -> Result<Box<dyn Write + 'a>> {
        let path = self.class_path(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        log::debug!(
            "writing class: path={} originating={:?}",
            path.display(),
            originating.iter().map(|e| e.description()).collect::<Vec<_>>()
        );
        Ok(Box::new(BufWriter::new(File::create(path)?)))
    }

    fn visit_service_descriptor(&mut self, service: &str, implementation: &str, originating: &dyn Element) -> Result<()> {
        let dir = self.root.join(SERVICES_DIR).join(service);
        fs::create_dir_all(&dir)?;
        File::create(dir.join(implementation))?;
        log::debug!("registered service: {} -> {} (from {})", service, implementation, originating.description());
        Ok(())
    }
}

/// Keeps classes and service registrations in memory
#[derive(Debug, Default, Clone)]
pub struct InMemoryOutputVisitor {
    classes: BTreeMap<String, Vec<u8>>,
    services: BTreeMap<String, BTreeSet<String>>,
}

impl InMemoryOutputVisitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generated classes by binary name
    pub fn classes(&self) -> &BTreeMap<String, Vec<u8>> {
        &self.classes
    }

    pub fn class(&self, name: &str) -> Option<&[u8]> {
        self.classes.get(name).map(Vec::as_slice)
    }

    /// Implementations registered for `service`, in name order
    pub fn services(&self, service: &str) -> Vec<&str> {
        self.services.get(service).map(|s| s.iter().map(String::as_str).collect()).unwrap_or_default()
    }
}

impl ClassWriterOutputVisitor for InMemoryOutputVisitor {
    fn visit_class<'a>(&'a mut self, name: &str, _originating: &[&dyn Element]) -> Result<Box<dyn Write + 'a>> {
        let sink = self.classes.entry(name.to_string()).or_default();
        sink.clear();
        Ok(Box::new(sink))
    }

    fn visit_service_descriptor(&mut self, service: &str, implementation: &str, _originating: &dyn Element) -> Result<()> {
        self.services.entry(service.to_string()).or_default().insert(implementation.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ClassElement;

    #[test]
    fn test_class_path() {
        let visitor = DirectoryOutputVisitor::new("/out");
        assert_eq!(visitor.class_path("a.b.$Svc$Definition"), PathBuf::from("/out/a/b/$Svc$Definition.class"));
    }

    #[test]
    fn test_in_memory_overwrites() {
        let origin = ClassElement::of("a.Svc");
        let mut visitor = InMemoryOutputVisitor::new();
        visitor.visit_class("a.X", &[&origin]).unwrap().write_all(b"first").unwrap();
        visitor.visit_class("a.X", &[&origin]).unwrap().write_all(b"2").unwrap();
        assert_eq!(visitor.class("a.X"), Some(&b"2"[..]));
        visitor.visit_service_descriptor("s.Service", "a.Y", &origin).unwrap();
        visitor.visit_service_descriptor("s.Service", "a.X", &origin).unwrap();
        assert_eq!(visitor.services("s.Service"), vec!["a.X", "a.Y"]);
    }
}

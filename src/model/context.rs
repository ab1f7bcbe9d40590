use std::cell::RefCell;
use std::collections::HashMap;

use super::element::{ClassElement, Element};

/// A failure reported against a source element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub message: String,
    pub element: String,
}

/// Services the compiler integration provides to the writers
pub trait VisitorContext {
    /// Resolves a class on the compile classpath by binary name
    fn class_element(&self, name: &str) -> Option<ClassElement>;

    /// Reports a user-facing error anchored to `element`. Generation of the
    /// affected definition is abandoned but the batch continues.
    fn fail(&self, message: &str, element: &dyn Element);

    fn options(&self) -> &HashMap<String, String>;
}

/// Context backed by a fixed set of known classes; failures are collected
/// for the caller to inspect
#[derive(Debug, Default)]
pub struct DefaultVisitorContext {
    classes: HashMap<String, ClassElement>,
    options: HashMap<String, String>,
    failures: RefCell<Vec<Failure>>,
}

impl DefaultVisitorContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_class(mut self, class: ClassElement) -> Self {
        self.classes.insert(class.name.clone(), class);
        self
    }

    pub fn with_option(mut self, key: &str, value: &str) -> Self {
        self.options.insert(key.to_string(), value.to_string());
        self
    }

    pub fn failures(&self) -> Vec<Failure> {
        self.failures.borrow().clone()
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.borrow().is_empty()
    }
}

impl VisitorContext for DefaultVisitorContext {
    fn class_element(&self, name: &str) -> Option<ClassElement> {
        self.classes.get(name).cloned()
    }

    fn fail(&self, message: &str, element: &dyn Element) {
        let element = element.description();
        log::warn!("{}: {}", element, message);
        self.failures.borrow_mut().push(Failure { message: message.to_string(), element });
    }

    fn options(&self) -> &HashMap<String, String> {
        &self.options
    }
}

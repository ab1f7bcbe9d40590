//! Generic signature writer.
//!
//! Follows the visitor protocol of the JVMS 4.7.9.1 signature grammar: a
//! caller walks a type and reports formal parameters, bounds, class types,
//! type arguments and array dimensions; the writer accumulates the textual
//! signature. One flag per open class type records whether its `<` has been
//! written, so the matching `>` is only emitted when arguments exist.

/// Wildcard marker for [`SignatureWriter::visit_type_argument_wildcard`]
pub const EXTENDS: char = '+';
pub const SUPER: char = '-';
pub const INSTANCEOF: char = '=';

#[derive(Debug, Default, Clone)]
pub struct SignatureWriter {
    buf: String,
    has_formals: bool,
    has_parameters: bool,
    /// Per open class type: true once its argument list was opened
    argument_stack: Vec<bool>,
}

impl SignatureWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn visit_formal_type_parameter(&mut self, name: &str) {
        if !self.has_formals {
            self.has_formals = true;
            self.buf.push('<');
        }
        self.buf.push_str(name);
        self.buf.push(':');
    }

    /// Class bound of a formal parameter; the bound type follows
    pub fn visit_class_bound(&mut self) {}

    pub fn visit_interface_bound(&mut self) {
        self.buf.push(':');
    }

    pub fn visit_superclass(&mut self) {
        self.end_formals();
    }

    pub fn visit_interface(&mut self) {}

    pub fn visit_parameter_type(&mut self) {
        self.end_formals();
        if !self.has_parameters {
            self.has_parameters = true;
            self.buf.push('(');
        }
    }

    pub fn visit_return_type(&mut self) {
        self.end_formals();
        if !self.has_parameters {
            self.buf.push('(');
        }
        self.buf.push(')');
    }

    pub fn visit_exception_type(&mut self) {
        self.buf.push('^');
    }

    pub fn visit_base_type(&mut self, descriptor: char) {
        self.buf.push(descriptor);
    }

    pub fn visit_type_variable(&mut self, name: &str) {
        self.buf.push('T');
        self.buf.push_str(name);
        self.buf.push(';');
    }

    /// Opens one array dimension; the component type follows and is closed
    /// with [`visit_end_array`](Self::visit_end_array)
    pub fn visit_array_type(&mut self) {
        self.buf.push('[');
    }

    /// Closes an array dimension. Base and class components terminate
    /// themselves, so nothing is written; in particular a primitive
    /// component never gets a `;`.
    pub fn visit_end_array(&mut self) {}

    pub fn visit_class_type(&mut self, internal_name: &str) {
        self.buf.push('L');
        self.buf.push_str(internal_name);
        self.argument_stack.push(false);
    }

    pub fn visit_inner_class_type(&mut self, name: &str) {
        self.end_arguments();
        self.buf.push('.');
        self.buf.push_str(name);
        self.argument_stack.push(false);
    }

    /// Unbounded wildcard `*`
    pub fn visit_type_argument(&mut self) {
        self.open_arguments();
        self.buf.push('*');
    }

    /// A type argument with `EXTENDS`, `SUPER` or `INSTANCEOF`; the
    /// argument type follows
    pub fn visit_type_argument_wildcard(&mut self, wildcard: char) {
        self.open_arguments();
        if wildcard != INSTANCEOF {
            self.buf.push(wildcard);
        }
    }

    /// Closes the innermost class type
    pub fn visit_end(&mut self) {
        self.end_arguments();
        self.buf.push(';');
    }

    fn open_arguments(&mut self) {
        if let Some(open) = self.argument_stack.last_mut() {
            if !*open {
                *open = true;
                self.buf.push('<');
            }
        }
    }

    fn end_formals(&mut self) {
        if self.has_formals {
            self.has_formals = false;
            self.buf.push('>');
        }
    }

    fn end_arguments(&mut self) {
        if self.argument_stack.pop() == Some(true) {
            self.buf.push('>');
        }
    }

    pub fn as_str(&self) -> &str {
        &self.buf
    }
}

impl std::fmt::Display for SignatureWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.buf)
    }
}

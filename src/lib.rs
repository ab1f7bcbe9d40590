//! beanc
//!
//! Compile-time synthesis of JVM bean definition classes for dependency
//! injection and AOP. A compiler integration describes each bean through the
//! element model and drives a [`BeanDefinitionWriter`]; the writer emits the
//! definition class, its companions and a service registration, ready to be
//! loaded by the runtime without reflection.
//!
//! ## Layout
//!
//! - **model**: elements, annotation metadata and the visitor context
//! - **bean**: the definition writer and its sub-writers
//! - **codegen**: class file building blocks (constant pool, code buffer
//!   with stack map frames, signatures, a reader for inspection)
//! - **verify**: structural checks run over every generated class
//! - **output**: directory and in-memory destinations
//!
//! ```text
//! elements → BeanDefinitionWriter → definition + $Exec + shims + $Reference
//!                                          ↓
//!                               ClassWriterOutputVisitor
//! ```

pub mod bean;
pub mod codegen;
pub mod config;
pub mod consts;
pub mod error;
pub mod model;
pub mod output;
pub mod verify;

pub use bean::{BeanDefinitionWriter, ProducingElement};
pub use config::Config;
pub use error::{Error, Result};
pub use output::{ClassWriterOutputVisitor, DirectoryOutputVisitor, InMemoryOutputVisitor};

/// Ends a compilation batch, clearing the process-wide metadata caches
/// shared by the writers of the batch
pub fn finish() {
    bean::metadata::reset_caches();
}

//! Bean definition synthesis.
//!
//! The [`BeanDefinitionWriter`] drives everything else in this module: the
//! argument and annotation metadata materializers, qualifier and value
//! resolution, the dispatch table, interception shims, the executable
//! methods companion and the definition reference.

pub mod arguments;
pub mod definition;
pub mod dispatch;
pub mod executable;
pub mod injection;
pub mod interception;
pub mod metadata;
pub mod precalculated;
pub mod qualifier;
pub mod reference;

pub use arguments::ArgumentWriter;
pub use definition::{BeanDefinitionWriter, ProducingElement};
pub use dispatch::{DispatchTarget, DispatchWriter};
pub use executable::ExecutableMethodsWriter;
pub use injection::{InjectionSite, Resolution};
pub use interception::{InterceptionDecisions, InterceptionKind};
pub use metadata::MaterializeContext;
pub use precalculated::PrecalculatedInfo;
pub use qualifier::Qualifier;
pub use reference::BeanDefinitionReferenceWriter;

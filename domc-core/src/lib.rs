//! Value model shared by the template compiler and the document host.

pub mod scope;
pub mod value;

pub use scope::Scope;
pub use value::{Function, Value};

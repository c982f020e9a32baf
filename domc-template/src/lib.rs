//! Template compiler: turns a markup tree with `${...}` / `{{...}}`
//! expressions into a [`Template`] whose instances are built once and then
//! kept current by a flat dirty-checking update pass.

pub mod analyze;
pub mod binding;
mod construct;
pub mod directives;
pub mod error;
pub mod expr;
pub mod extract;
pub mod registry;
pub mod template;
pub mod template_ast;
pub mod template_parse;
pub mod update;

pub use binding::{AnchorId, Binding, BindingKind, Computed, NodePath, Operation, Slot, Target};
pub use error::{CompileError, EvalError, ParseError};
pub use registry::{
    AttributeDirective, Directive, Mounted, Registry, Subtree, SubtreeCompiler, default_registry,
    register_component, register_directive, with_registry,
};
pub use template::{Template, TemplateInstance, compile, compile_str, compile_with};
pub use template_ast::{Node, TemplateAttr};
pub use template_parse::{parse_fragment, parse_template};
pub use update::{Snapshot, TemplateId};

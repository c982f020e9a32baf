//! Extension registry: names that hand a template location to another
//! compiler.
//!
//! There are two kinds of extension. A *structural* extension (component
//! tags and directives such as `v-if`) takes over a whole element: the
//! analyzer does not descend into it and the subtree compiler decides what
//! gets mounted there. An *attribute* directive (such as `v-show`) only
//! intercepts its own attribute; the element is analyzed normally and the
//! directive is applied whenever its expression value changes.
//!
//! A thread-local default registry, pre-populated with the built-in
//! directives, backs [`crate::compile`]. Register custom extensions before
//! compiling templates that use them: lookup happens at compile time.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use domc_core::{Scope, Value};
use domc_dom::{Document, NodeId};
use tracing::debug;

use crate::error::{CompileError, EvalError};
use crate::template_ast::Node;

/// Something that can be mounted into a document, with the same
/// create/update shape as a compiled template.
pub trait Subtree {
    fn create(&self, doc: &Document, scope: &Scope) -> Result<Box<dyn Mounted>, EvalError>;
}

/// A live mounted subtree.
pub trait Mounted {
    /// The node currently standing for this subtree in the document.
    fn node(&self) -> NodeId;
    fn update(&mut self, doc: &Document, scope: &Scope) -> Result<(), EvalError>;
}

/// Compiles the element found at an extension point.
pub trait SubtreeCompiler {
    /// `element` is the element at the extension point, minus the directive
    /// attribute for directives. `argument` is the directive's attribute
    /// value, or `""` for component tags.
    fn compile(
        &self,
        element: &Node,
        argument: &str,
        registry: &Registry,
    ) -> Result<Rc<dyn Subtree>, CompileError>;
}

pub trait AttributeDirective {
    fn apply(&self, doc: &Document, node: NodeId, value: &Value);
}

#[derive(Clone)]
pub enum Directive {
    Structural(Rc<dyn SubtreeCompiler>),
    Attribute(Rc<dyn AttributeDirective>),
}

#[derive(Clone, Default)]
pub struct Registry {
    directives: HashMap<String, Directive>,
    components: HashMap<String, Rc<dyn SubtreeCompiler>>,
}

impl Registry {
    /// An empty registry, without the built-ins.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builtins() -> Self {
        let mut r = Self::new();
        crate::directives::register_builtins(&mut r);
        r
    }

    /// Registers (or replaces) the directive used by `v-<name>` attributes.
    pub fn register_directive(&mut self, name: impl Into<String>, directive: Directive) {
        let name = name.into();
        debug!(%name, "registering directive");
        self.directives.insert(name, directive);
    }

    /// Registers (or replaces) the compiler for `<tag>` elements.
    pub fn register_component(&mut self, tag: impl Into<String>, compiler: Rc<dyn SubtreeCompiler>) {
        let tag = tag.into();
        debug!(%tag, "registering component");
        self.components.insert(tag, compiler);
    }

    pub fn directive(&self, name: &str) -> Option<&Directive> {
        self.directives.get(name)
    }

    pub fn component(&self, tag: &str) -> Option<&Rc<dyn SubtreeCompiler>> {
        self.components.get(tag)
    }

    pub fn directive_names(&self) -> impl Iterator<Item = &str> {
        self.directives.keys().map(String::as_str)
    }
}

thread_local! {
    static DEFAULT: RefCell<Registry> = RefCell::new(Registry::with_builtins());
}

pub fn register_directive(name: impl Into<String>, directive: Directive) {
    DEFAULT.with(|r| r.borrow_mut().register_directive(name, directive));
}

pub fn register_component(tag: impl Into<String>, compiler: Rc<dyn SubtreeCompiler>) {
    DEFAULT.with(|r| r.borrow_mut().register_component(tag, compiler));
}

/// Runs `f` with the default registry of this thread. `f` must not compile
/// templates itself: the registry is borrowed for the duration.
pub fn with_registry<R>(f: impl FnOnce(&mut Registry) -> R) -> R {
    DEFAULT.with(|r| f(&mut r.borrow_mut()))
}

/// A copy of the default registry. Entries are shared, so this is cheap.
pub fn default_registry() -> Registry {
    DEFAULT.with(|r| r.borrow().clone())
}

/// Tag names that denote components rather than plain elements.
pub fn is_component_tag(tag: &str) -> bool {
    tag.contains('-') || tag.chars().next().is_some_and(|c| c.is_ascii_uppercase())
}

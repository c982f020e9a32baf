//! Bindings: the dynamic points of a compiled template.

use std::collections::BTreeSet;
use std::fmt;
use std::rc::Rc;

use domc_core::Value;

use crate::error::EvalError;
use crate::expr::{Env, Expr};
use crate::extract::Extraction;

/// Position of a node as child indexes from the template root (indexes in
/// the raw template tree). The same tree shape always yields the same paths.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodePath(Vec<u32>);

impl NodePath {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn child(&self, index: usize) -> Self {
        let mut p = self.0.clone();
        p.push(index as u32);
        Self(p)
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn indices(&self) -> &[u32] {
        &self.0
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("/");
        }
        for i in &self.0 {
            write!(f, "/{i}")?;
        }
        Ok(())
    }
}

/// Which facet of the anchor node a binding drives.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Slot {
    Text,
    Attribute(String),
    Event(String),
    Directive(String),
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Slot::Text => f.write_str("#text"),
            Slot::Attribute(name) => write!(f, ":{name}"),
            Slot::Event(name) => write!(f, "@{name}"),
            Slot::Directive(name) => write!(f, "*{name}"),
        }
    }
}

/// Identifier of one binding, unique within its template: the anchor node's
/// path plus the bound slot, printed like `/0/1:class`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AnchorId {
    pub path: NodePath,
    pub slot: Slot,
}

impl fmt::Display for AnchorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_root() {
            write!(f, "/{}", self.slot)
        } else {
            write!(f, "{}{}", self.path, self.slot)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    EventArgs,
    Class,
    Attribute,
    Text,
    Directive,
}

impl BindingKind {
    pub fn as_str(self) -> &'static str {
        match self {
            BindingKind::EventArgs => "event-args",
            BindingKind::Class => "class",
            BindingKind::Attribute => "attribute",
            BindingKind::Text => "text",
            BindingKind::Directive => "directive",
        }
    }
}

/// How the update procedure reaches a binding's node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Root,
    /// Index into the back-reference table stored on the root.
    Anchor(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    SetText,
    ReplaceClass,
    SetAttribute { name: String },
    SetEventData { event: String },
    /// `index` selects the resolved attribute directive in the template.
    Directive { name: String, index: usize },
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::SetText => f.write_str("set text"),
            Operation::ReplaceClass => f.write_str("replace class"),
            Operation::SetAttribute { name } => write!(f, "set attribute `{name}`"),
            Operation::SetEventData { event } => write!(f, "set `{event}` data"),
            Operation::Directive { name, .. } => write!(f, "apply v-{name}"),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Root => f.write_str("root"),
            Target::Anchor(slot) => write!(f, "ref[{slot}]"),
        }
    }
}

/// Declarative description of the mutation applied when a binding changes.
#[derive(Debug, Clone, PartialEq)]
pub struct ApplyAction {
    pub target: Target,
    pub operation: Operation,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Compute {
    Interpolation(Extraction),
    Arguments(Vec<Expr>),
    Expression(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub anchor: AnchorId,
    pub kind: BindingKind,
    /// Raw expression text as written in the template.
    pub expression: String,
    pub apply: ApplyAction,
    pub variables: BTreeSet<String>,
    pub(crate) compute: Compute,
}

impl Binding {
    pub fn reads(&self, name: &str) -> bool {
        self.variables.contains(name)
    }

    pub(crate) fn compute(&self, env: &dyn Env) -> Result<Computed, EvalError> {
        match &self.compute {
            Compute::Interpolation(x) => x.evaluate(env).map(Computed::Value),
            Compute::Expression(e) => e.eval(env).map(Computed::Value),
            Compute::Arguments(args) => {
                let values = args
                    .iter()
                    .map(|a| a.eval(env))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Computed::Args(values.into()))
            }
        }
    }
}

/// Value computed for one binding during an update pass.
#[derive(Debug, Clone, PartialEq)]
pub enum Computed {
    Value(Value),
    /// Event handler argument tuple.
    Args(Rc<[Value]>),
}

impl Computed {
    /// Identity test deciding whether the binding is re-applied. Argument
    /// tuples are compared element by element, each element by identity.
    pub fn is_identical(&self, other: &Computed) -> bool {
        match (self, other) {
            (Computed::Value(a), Computed::Value(b)) => a.is_identical(b),
            (Computed::Args(a), Computed::Args(b)) => {
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.is_identical(y))
            }
            _ => false,
        }
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Computed::Value(v) => Some(v),
            Computed::Args(_) => None,
        }
    }
}

impl fmt::Display for Computed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Computed::Value(v) => write!(f, "{v}"),
            Computed::Args(args) => {
                f.write_str("(")?;
                for (i, a) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{a}")?;
                }
                f.write_str(")")
            }
        }
    }
}

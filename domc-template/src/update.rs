//! The flat update loop: compute every binding, compare with the previous
//! snapshot by identity, apply what changed.

use std::collections::HashMap;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use domc_core::Scope;
use domc_dom::{Document, NodeId};
use tracing::trace;

use crate::analyze::Analysis;
use crate::binding::{AnchorId, Binding, Computed, Operation, Target};
use crate::error::EvalError;
use crate::registry::AttributeDirective;

static NEXT_TEMPLATE: AtomicU64 = AtomicU64::new(1);

/// Identity of one compiled template. Snapshots carry it so a snapshot is
/// never compared against bindings it was not computed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TemplateId(u64);

impl TemplateId {
    pub(crate) fn next() -> Self {
        Self(NEXT_TEMPLATE.fetch_add(1, Ordering::Relaxed))
    }
}

/// Last computed value of every binding of one template.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    template: TemplateId,
    values: HashMap<AnchorId, Computed>,
    applied: usize,
}

impl Snapshot {
    pub fn template(&self) -> TemplateId {
        self.template
    }

    pub fn get(&self, anchor: &AnchorId) -> Option<&Computed> {
        self.values.get(anchor)
    }

    /// Looks a value up by its printed anchor id, e.g. `"/0#text"`.
    pub fn get_by_name(&self, anchor: &str) -> Option<&Computed> {
        self.values
            .iter()
            .find(|(id, _)| id.to_string() == anchor)
            .map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn anchors(&self) -> impl Iterator<Item = &AnchorId> {
        self.values.keys()
    }

    /// How many bindings the pass that produced this snapshot applied.
    pub fn applied(&self) -> usize {
        self.applied
    }
}

/// Runs one update pass for the instance rooted at `root`.
///
/// Only the variables the bindings reference are read from `scope`; a
/// missing one reads as `undefined`. All values are computed before any is
/// applied. An evaluation error stops the pass: bindings applied before it
/// stay applied.
pub(crate) fn run(
    doc: &Document,
    template: TemplateId,
    analysis: &Analysis,
    scope: &Scope,
    root: NodeId,
    previous: Option<&Snapshot>,
) -> Result<Snapshot, EvalError> {
    if previous.is_some_and(|p| p.template != template) {
        return Err(EvalError::ForeignSnapshot);
    }

    let locals = scope.narrow(analysis.variables.iter().map(String::as_str));
    let mut computed = Vec::with_capacity(analysis.bindings.len());
    for binding in &analysis.bindings {
        let value = binding.compute(&locals).map_err(|e| wrap(binding, e))?;
        computed.push(value);
    }

    let mut applied = 0;
    for (binding, value) in analysis.bindings.iter().zip(&computed) {
        let unchanged = previous
            .and_then(|p| p.values.get(&binding.anchor))
            .is_some_and(|old| old.is_identical(value));
        if unchanged {
            continue;
        }
        apply(doc, root, binding, value, &analysis.directives)?;
        applied += 1;
    }

    let values = analysis
        .bindings
        .iter()
        .map(|b| b.anchor.clone())
        .zip(computed)
        .collect();
    Ok(Snapshot {
        template,
        values,
        applied,
    })
}

fn wrap(binding: &Binding, err: EvalError) -> EvalError {
    match &binding.apply.operation {
        Operation::Directive { name, .. } => EvalError::Directive {
            directive: name.clone(),
            cause: Box::new(err),
        },
        _ => err,
    }
}

fn apply(
    doc: &Document,
    root: NodeId,
    binding: &Binding,
    value: &Computed,
    directives: &[Rc<dyn AttributeDirective>],
) -> Result<(), EvalError> {
    let node = match binding.apply.target {
        Target::Root => root,
        Target::Anchor(slot) => {
            doc.anchor_ref(root, slot)
                .ok_or_else(|| EvalError::DetachedAnchor {
                    anchor: binding.anchor.to_string(),
                    root: root.to_string(),
                })?
        }
    };
    trace!(anchor = %binding.anchor, %node, %value, "apply");

    match (&binding.apply.operation, value) {
        (Operation::SetEventData { event }, Computed::Args(args)) => {
            doc.set_handler_data(node, event, args.clone());
        }
        (Operation::SetEventData { event }, Computed::Value(v)) => {
            doc.set_handler_data(node, event, Rc::from(vec![v.clone()]));
        }
        (Operation::SetText, v) => doc.set_text(node, &v.to_string()),
        (Operation::ReplaceClass, v) => doc.set_attribute(node, "class", &v.to_string()),
        (Operation::SetAttribute { name }, v) => doc.set_attribute(node, name, &v.to_string()),
        (Operation::Directive { index, .. }, v) => {
            if let (Some(directive), Some(v)) = (directives.get(*index), v.as_value()) {
                directive.apply(doc, node, v);
            }
        }
    }
    Ok(())
}

//! Builds the static side of a template into a document.

use domc_core::Scope;
use domc_dom::events::ensure_listening;
use domc_dom::{Document, NodeId};
use tracing::{debug, trace};

use crate::analyze::{Analysis, HandlerWiring, PlanNode};
use crate::error::EvalError;
use crate::registry::Mounted;

pub(crate) struct Built {
    pub root: NodeId,
    /// Mounted extension points, in template order.
    pub children: Vec<Box<dyn Mounted>>,
}

/// Instantiates every static node in document order, attaching each child
/// only once its own subtree is complete, then mounts the extension points
/// over their placeholders. Binding values are not applied here; the first
/// update does that.
pub(crate) fn build(
    doc: &Document,
    analysis: &Analysis,
    scope: &Scope,
) -> Result<Built, EvalError> {
    for event in &analysis.events {
        ensure_listening(doc, event);
    }

    let mut builder = Builder {
        doc,
        scope,
        refs: vec![None; analysis.anchors.len()],
        placeholders: vec![None; analysis.extensions.len()],
    };
    let root = builder.node(&analysis.plan)?;

    let mut refs = Vec::with_capacity(builder.refs.len());
    for (slot, node) in builder.refs.iter().enumerate() {
        let node = node.ok_or_else(|| EvalError::DetachedAnchor {
            anchor: analysis.anchors[slot].to_string(),
            root: root.to_string(),
        })?;
        refs.push(node);
    }
    doc.set_anchor_refs(root, refs);

    let mut children = Vec::with_capacity(analysis.extensions.len());
    for (point, placeholder) in analysis.extensions.iter().zip(&builder.placeholders) {
        let mounted = point.subtree.create(doc, scope)?;
        if let Some(placeholder) = placeholder {
            doc.replace_node(*placeholder, mounted.node());
            doc.release(*placeholder);
        }
        trace!(path = %point.path, name = %point.name, node = %mounted.node(), "mounted extension");
        children.push(mounted);
    }

    debug!(%root, nodes = doc.node_count(), "constructed");
    Ok(Built { root, children })
}

struct Builder<'a> {
    doc: &'a Document,
    scope: &'a Scope,
    refs: Vec<Option<NodeId>>,
    placeholders: Vec<Option<NodeId>>,
}

impl Builder<'_> {
    fn node(&mut self, plan: &PlanNode) -> Result<NodeId, EvalError> {
        let doc = self.doc;
        match plan {
            PlanNode::Element {
                tag,
                attrs,
                handlers,
                children,
                anchor,
            } => {
                let el = doc.create_element(tag);
                for (name, value) in attrs {
                    doc.set_attribute(el, name, value);
                }
                for wiring in handlers {
                    self.wire(el, wiring)?;
                }
                for child in children {
                    let c = self.node(child)?;
                    doc.append_child(el, c);
                }
                self.remember(*anchor, el);
                Ok(el)
            }
            PlanNode::Text { content, anchor } => {
                let t = doc.create_text(content);
                self.remember(*anchor, t);
                Ok(t)
            }
            PlanNode::Comment(data) => Ok(doc.create_comment(data)),
            PlanNode::Placeholder { extension } => {
                let c = doc.create_comment("");
                if let Some(slot) = self.placeholders.get_mut(*extension) {
                    *slot = Some(c);
                }
                Ok(c)
            }
        }
    }

    fn remember(&mut self, anchor: Option<usize>, node: NodeId) {
        if let Some(slot) = anchor.and_then(|a| self.refs.get_mut(a)) {
            *slot = Some(node);
        }
    }

    fn wire(&self, node: NodeId, wiring: &HandlerWiring) -> Result<(), EvalError> {
        let value = self.scope.lookup(&wiring.handler);
        let Some(handler) = value.as_function() else {
            return Err(EvalError::MissingHandler {
                event: wiring.event.clone(),
                handler: wiring.handler.clone(),
                found: value.type_name(),
            });
        };
        self.doc.set_handler(node, &wiring.event, handler.clone());
        Ok(())
    }
}

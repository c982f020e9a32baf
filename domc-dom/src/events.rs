//! Delegated event dispatch.
//!
//! Nodes never get their own listeners. Each event name gets at most one
//! listener on the document root; when a native event arrives, the listener
//! walks from the event's origin up through its ancestors to the first node
//! whose handler slot for that event is filled, calls that handler with the
//! node's current argument snapshot, and stops there.

use std::rc::Rc;

use tracing::{debug, trace};

use crate::{Document, NodeId};

/// A native event as delivered to root listeners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub name: String,
    pub target: NodeId,
}

/// Registers the delegating root listener for `event` unless one is already
/// registered on this document. Returns `true` when a listener was added.
///
/// The document root is the ancestor shared by every instance in the
/// process, so the listening set lives there and is write-once per name.
pub fn ensure_listening(doc: &Document, event: &str) -> bool {
    if !doc.mark_listening(event) {
        return false;
    }
    debug!(event, "registering delegated listener");
    doc.add_root_listener(
        event,
        Rc::new(|doc: &Document, ev: &Event| {
            dispatch(doc, ev.target, &ev.name);
        }),
    );
    true
}

pub fn is_listening(doc: &Document, event: &str) -> bool {
    doc.is_marked_listening(event)
}

/// First node, starting at `origin` itself and walking up, that carries a
/// handler for `event`.
pub fn find_handler(doc: &Document, origin: NodeId, event: &str) -> Option<NodeId> {
    let mut cur = Some(origin);
    while let Some(node) = cur {
        if doc.has_handler(node, event) {
            return Some(node);
        }
        cur = doc.parent(node);
    }
    None
}

/// Routes one event to the nearest handler at or above `origin`.
///
/// The handler runs with the argument snapshot stored in that node's data
/// slot (empty if none was stored). Returns the node that handled the event;
/// `None` means nothing in the ancestor chain listens, which is not an error.
pub fn dispatch(doc: &Document, origin: NodeId, event: &str) -> Option<NodeId> {
    let Some(node) = find_handler(doc, origin, event) else {
        trace!(%origin, event, "no handler in ancestor chain");
        return None;
    };
    let handler = doc.handler(node, event)?;
    let args = doc.handler_data(node, event);
    trace!(%origin, %node, event, "dispatching");
    handler.call(args.as_deref().unwrap_or(&[]));
    Some(node)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listener_registered_once_per_name() {
        let doc = Document::new();
        assert!(ensure_listening(&doc, "click"));
        assert!(!ensure_listening(&doc, "click"));
        assert!(ensure_listening(&doc, "input"));
        assert_eq!(doc.root_listener_count("click"), 1);
        assert!(is_listening(&doc, "input"));
        assert!(!is_listening(&doc, "keydown"));
    }

    #[test]
    fn find_handler_is_inclusive_of_origin() {
        let doc = Document::new();
        let outer = doc.create_element("div");
        let button = doc.create_element("button");
        doc.append_child(outer, button);
        doc.set_handler(outer, "click", domc_core::Function::new(|_| domc_core::Value::Undefined));
        assert_eq!(find_handler(&doc, button, "click"), Some(outer));
        doc.set_handler(button, "click", domc_core::Function::new(|_| domc_core::Value::Undefined));
        assert_eq!(find_handler(&doc, button, "click"), Some(button));
        assert_eq!(find_handler(&doc, button, "input"), None);
    }
}

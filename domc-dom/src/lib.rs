//! In-memory live node tree.
//!
//! [`Document`] supplies the primitive mutations the template engine drives
//! (create, set attribute, append, replace, ...), per-node event handler and
//! argument-data slots, and root listeners for delegated events. A document
//! made with [`Document::with_journal`] also records every primitive
//! mutation as a [`Mutation`].
//!
//! Nodes live in a `SlotMap`. [`Document::release`] frees a subtree so its
//! slots can be reused; a [`NodeId`] that outlived its node (or belongs to
//! another document) is ignored with a warning.
//!
//! The handle is cheap to clone and never holds a borrow while user code
//! (handlers, listeners) runs, so a handler may mutate the document again.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::rc::Rc;

use domc_core::{Function, Value};
use slotmap::{SlotMap, new_key_type};
use tracing::{trace, warn};

pub mod events;
mod markup;
pub mod mutation;

pub use events::Event;
pub use mutation::Mutation;

new_key_type! {
    /// Generational handle to a node. Stays invalid once its node is
    /// released, even after the slot is reused.
    pub struct NodeId;
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:?}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Element {
        tag: String,
        attrs: Vec<(String, String)>,
        props: BTreeMap<String, Value>,
    },
    Text(String),
    Comment(String),
}

struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    handlers: HashMap<String, Function>,
    handler_data: HashMap<String, Rc<[Value]>>,
    anchors: Option<Rc<[NodeId]>>,
}

impl NodeData {
    fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            parent: None,
            children: Vec::new(),
            handlers: HashMap::new(),
            handler_data: HashMap::new(),
            anchors: None,
        }
    }
}

/// Root listener: receives every event of the name it was registered for.
pub type Listener = Rc<dyn Fn(&Document, &Event)>;

#[derive(Default)]
struct Arena {
    nodes: SlotMap<NodeId, NodeData>,
    journal: Option<Vec<Mutation>>,
    listeners: HashMap<String, Vec<Listener>>,
    listening: HashSet<String>,
}

impl Arena {
    fn node(&self, id: NodeId) -> Option<&NodeData> {
        self.nodes.get(id)
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut NodeData> {
        self.nodes.get_mut(id)
    }

    fn insert(&mut self, kind: NodeKind) -> NodeId {
        self.nodes.insert(NodeData::new(kind))
    }

    fn detach(&mut self, id: NodeId) {
        let Some(parent) = self.node_mut(id).and_then(|n| n.parent.take()) else {
            return;
        };
        if let Some(p) = self.node_mut(parent) {
            p.children.retain(|c| *c != id);
        }
    }

    /// Detaches `id` and frees it with all its descendants. Returns the number
    /// of nodes freed.
    fn release(&mut self, id: NodeId) -> usize {
        self.detach(id);
        let mut stack = vec![id];
        let mut freed = 0;
        while let Some(id) = stack.pop() {
            if let Some(data) = self.nodes.remove(id) {
                freed += 1;
                stack.extend(data.children);
            }
        }
        freed
    }

    fn record(&mut self, mutation: impl FnOnce() -> Mutation) {
        if let Some(journal) = &mut self.journal {
            journal.push(mutation());
        }
    }
}

fn unknown(node: NodeId, op: &'static str) {
    warn!(%node, op, "unknown or released node ignored");
}

#[derive(Clone, Default)]
pub struct Document {
    inner: Rc<RefCell<Arena>>,
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let arena = self.inner.borrow();
        f.debug_struct("Document")
            .field("nodes", &arena.nodes.len())
            .field("journal", &arena.journal.as_ref().map(Vec::len))
            .finish()
    }
}

impl Document {
    /// A document that does not record mutations.
    pub fn new() -> Self {
        Self::default()
    }

    /// A document that records every primitive mutation until
    /// [`take_journal`](Self::take_journal) drains it.
    pub fn with_journal() -> Self {
        let doc = Self::default();
        doc.inner.borrow_mut().journal = Some(Vec::new());
        doc
    }

    /// Whether two handles refer to the same document.
    pub fn ptr_eq(&self, other: &Document) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Live (not released) nodes, attached or not.
    pub fn node_count(&self) -> usize {
        self.inner.borrow().nodes.len()
    }

    /// Whether `node` refers to a live node of this document.
    pub fn contains(&self, node: NodeId) -> bool {
        self.inner.borrow().node(node).is_some()
    }

    // ---- creation ----------------------------------------------------------

    pub fn create_element(&self, tag: &str) -> NodeId {
        let mut arena = self.inner.borrow_mut();
        let node = arena.insert(NodeKind::Element {
            tag: tag.to_string(),
            attrs: Vec::new(),
            props: BTreeMap::new(),
        });
        arena.record(|| Mutation::CreateElement {
            node,
            tag: tag.to_string(),
        });
        node
    }

    pub fn create_text(&self, content: &str) -> NodeId {
        let mut arena = self.inner.borrow_mut();
        let node = arena.insert(NodeKind::Text(content.to_string()));
        arena.record(|| Mutation::CreateText {
            node,
            content: content.to_string(),
        });
        node
    }

    pub fn create_comment(&self, data: &str) -> NodeId {
        let mut arena = self.inner.borrow_mut();
        let node = arena.insert(NodeKind::Comment(data.to_string()));
        arena.record(|| Mutation::CreateComment { node });
        node
    }

    // ---- attributes, properties, content -----------------------------------

    pub fn set_attribute(&self, node: NodeId, name: &str, value: &str) {
        let mut arena = self.inner.borrow_mut();
        let Some(data) = arena.node_mut(node) else {
            return unknown(node, "set_attribute");
        };
        match &mut data.kind {
            NodeKind::Element { attrs, .. } => {
                match attrs.iter_mut().find(|(k, _)| k == name) {
                    Some((_, v)) => *v = value.to_string(),
                    None => attrs.push((name.to_string(), value.to_string())),
                }
            }
            _ => {
                warn!(%node, name, "set_attribute on a non-element node ignored");
                return;
            }
        }
        arena.record(|| Mutation::SetAttribute {
            node,
            name: name.to_string(),
            value: value.to_string(),
        });
    }

    pub fn remove_attribute(&self, node: NodeId, name: &str) {
        let mut arena = self.inner.borrow_mut();
        let Some(data) = arena.node_mut(node) else {
            return unknown(node, "remove_attribute");
        };
        if let NodeKind::Element { attrs, .. } = &mut data.kind {
            attrs.retain(|(k, _)| k != name);
            arena.record(|| Mutation::RemoveAttribute {
                node,
                name: name.to_string(),
            });
        }
    }

    pub fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        match &self.inner.borrow().node(node)?.kind {
            NodeKind::Element { attrs, .. } => attrs
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.clone()),
            _ => None,
        }
    }

    pub fn attributes(&self, node: NodeId) -> Vec<(String, String)> {
        match self.inner.borrow().node(node).map(|n| &n.kind) {
            Some(NodeKind::Element { attrs, .. }) => attrs.clone(),
            _ => Vec::new(),
        }
    }

    pub fn set_property(&self, node: NodeId, name: &str, value: Value) {
        let mut arena = self.inner.borrow_mut();
        let Some(data) = arena.node_mut(node) else {
            return unknown(node, "set_property");
        };
        if let NodeKind::Element { props, .. } = &mut data.kind {
            props.insert(name.to_string(), value.clone());
            arena.record(|| Mutation::SetProperty {
                node,
                name: name.to_string(),
                value,
            });
        }
    }

    pub fn property(&self, node: NodeId, name: &str) -> Value {
        match self.inner.borrow().node(node).map(|n| &n.kind) {
            Some(NodeKind::Element { props, .. }) => props.get(name).cloned().unwrap_or_default(),
            _ => Value::Undefined,
        }
    }

    /// Replaces the content of a text or comment node.
    pub fn set_text(&self, node: NodeId, content: &str) {
        let mut arena = self.inner.borrow_mut();
        let Some(data) = arena.node_mut(node) else {
            return unknown(node, "set_text");
        };
        match &mut data.kind {
            NodeKind::Text(t) | NodeKind::Comment(t) => *t = content.to_string(),
            NodeKind::Element { .. } => {
                warn!(%node, "set_text on an element ignored");
                return;
            }
        }
        arena.record(|| Mutation::SetText {
            node,
            content: content.to_string(),
        });
    }

    pub fn kind(&self, node: NodeId) -> Option<NodeKind> {
        self.inner.borrow().node(node).map(|n| n.kind.clone())
    }

    pub fn tag(&self, node: NodeId) -> Option<String> {
        match &self.inner.borrow().node(node)?.kind {
            NodeKind::Element { tag, .. } => Some(tag.clone()),
            _ => None,
        }
    }

    /// Content of a text/comment node, or the concatenated text of an
    /// element's descendants.
    pub fn text(&self, node: NodeId) -> String {
        fn collect(arena: &Arena, id: NodeId, out: &mut String) {
            let Some(data) = arena.node(id) else {
                return;
            };
            match &data.kind {
                NodeKind::Text(t) => out.push_str(t),
                NodeKind::Comment(_) => {}
                NodeKind::Element { .. } => {
                    for c in &data.children {
                        collect(arena, *c, out);
                    }
                }
            }
        }
        let arena = self.inner.borrow();
        if let Some(NodeKind::Comment(c)) = arena.node(node).map(|n| &n.kind) {
            return c.clone();
        }
        let mut out = String::new();
        collect(&arena, node, &mut out);
        out
    }

    // ---- structure ---------------------------------------------------------

    /// Appends `child` as the last child of `parent`, detaching it from any
    /// previous parent first.
    pub fn append_child(&self, parent: NodeId, child: NodeId) {
        let mut arena = self.inner.borrow_mut();
        if arena.node(parent).is_none() {
            return unknown(parent, "append_child");
        }
        if arena.node(child).is_none() {
            return unknown(child, "append_child");
        }
        arena.detach(child);
        if let Some(c) = arena.node_mut(child) {
            c.parent = Some(parent);
        }
        if let Some(p) = arena.node_mut(parent) {
            p.children.push(child);
        }
        arena.record(|| Mutation::AppendChild { parent, child });
    }

    /// Puts `new` in `old`'s position and detaches `old`.
    pub fn replace_node(&self, old: NodeId, new: NodeId) {
        if old == new {
            return;
        }
        let mut arena = self.inner.borrow_mut();
        if arena.node(new).is_none() {
            return unknown(new, "replace_node");
        }
        let Some(parent) = arena.node(old).and_then(|n| n.parent) else {
            warn!(%old, %new, "replace_node target is detached");
            return;
        };
        arena.detach(new);
        if let Some(p) = arena.node_mut(parent) {
            if let Some(pos) = p.children.iter().position(|c| *c == old) {
                p.children[pos] = new;
            }
        }
        if let Some(o) = arena.node_mut(old) {
            o.parent = None;
        }
        if let Some(n) = arena.node_mut(new) {
            n.parent = Some(parent);
        }
        arena.record(|| Mutation::ReplaceNode { old, new });
    }

    /// Detaches `node` from its parent. The node stays alive and may be
    /// attached again.
    pub fn remove_node(&self, node: NodeId) {
        let mut arena = self.inner.borrow_mut();
        if arena.node(node).is_none() {
            return unknown(node, "remove_node");
        }
        arena.detach(node);
        arena.record(|| Mutation::RemoveNode { node });
    }

    /// Detaches `node` and frees it together with its descendants. Their ids
    /// become stale and their slots are reused by later creations. Returns
    /// the number of nodes freed.
    pub fn release(&self, node: NodeId) -> usize {
        let mut arena = self.inner.borrow_mut();
        if arena.node(node).is_none() {
            unknown(node, "release");
            return 0;
        }
        let freed = arena.release(node);
        trace!(%node, freed, "released");
        arena.record(|| Mutation::Release { node });
        freed
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.inner.borrow().node(node)?.parent
    }

    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.inner
            .borrow()
            .node(node)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    /// Ancestors of `node`, nearest first, excluding `node` itself.
    pub fn ancestors(&self, node: NodeId) -> Vec<NodeId> {
        let arena = self.inner.borrow();
        let mut out = Vec::new();
        let mut cur = arena.node(node).and_then(|n| n.parent);
        while let Some(id) = cur {
            out.push(id);
            cur = arena.node(id).and_then(|n| n.parent);
        }
        out
    }

    // ---- handler slots -----------------------------------------------------

    pub fn set_handler(&self, node: NodeId, event: &str, handler: Function) {
        let mut arena = self.inner.borrow_mut();
        let Some(data) = arena.node_mut(node) else {
            return unknown(node, "set_handler");
        };
        data.handlers.insert(event.to_string(), handler);
        arena.record(|| Mutation::SetHandler {
            node,
            event: event.to_string(),
        });
    }

    pub fn handler(&self, node: NodeId, event: &str) -> Option<Function> {
        self.inner.borrow().node(node)?.handlers.get(event).cloned()
    }

    pub fn has_handler(&self, node: NodeId, event: &str) -> bool {
        self.inner
            .borrow()
            .node(node)
            .is_some_and(|n| n.handlers.contains_key(event))
    }

    /// Stores the argument snapshot passed to the node's handler for `event`.
    /// Independent of the handler slot itself.
    pub fn set_handler_data(&self, node: NodeId, event: &str, args: Rc<[Value]>) {
        let mut arena = self.inner.borrow_mut();
        let Some(data) = arena.node_mut(node) else {
            return unknown(node, "set_handler_data");
        };
        data.handler_data.insert(event.to_string(), args.clone());
        arena.record(|| Mutation::SetHandlerData {
            node,
            event: event.to_string(),
            args: args.to_vec(),
        });
    }

    pub fn handler_data(&self, node: NodeId, event: &str) -> Option<Rc<[Value]>> {
        self.inner.borrow().node(node)?.handler_data.get(event).cloned()
    }

    // ---- anchor back-references ---------------------------------------------

    /// Attaches the table of anchor nodes a template instance rooted at
    /// `root` updates. Not journaled: it is bookkeeping, not tree state.
    pub fn set_anchor_refs(&self, root: NodeId, refs: Vec<NodeId>) {
        match self.inner.borrow_mut().node_mut(root) {
            Some(data) => data.anchors = Some(refs.into()),
            None => unknown(root, "set_anchor_refs"),
        }
    }

    pub fn anchor_ref(&self, root: NodeId, slot: usize) -> Option<NodeId> {
        self.inner
            .borrow()
            .node(root)?
            .anchors
            .as_ref()
            .and_then(|refs| refs.get(slot).copied())
    }

    pub fn anchor_refs(&self, root: NodeId) -> Option<Rc<[NodeId]>> {
        self.inner.borrow().node(root)?.anchors.clone()
    }

    // ---- journal -----------------------------------------------------------

    pub fn is_journaling(&self) -> bool {
        self.inner.borrow().journal.is_some()
    }

    /// Mutations recorded since the last drain. Always empty unless the
    /// document was made with [`with_journal`](Self::with_journal).
    pub fn journal(&self) -> Vec<Mutation> {
        self.inner.borrow().journal.clone().unwrap_or_default()
    }

    /// Returns and clears the journal.
    pub fn take_journal(&self) -> Vec<Mutation> {
        self.inner
            .borrow_mut()
            .journal
            .as_mut()
            .map(std::mem::take)
            .unwrap_or_default()
    }

    // ---- root listeners ----------------------------------------------------

    pub fn add_root_listener(&self, event: &str, listener: Listener) {
        self.inner
            .borrow_mut()
            .listeners
            .entry(event.to_string())
            .or_default()
            .push(listener);
    }

    pub fn root_listener_count(&self, event: &str) -> usize {
        self.inner
            .borrow()
            .listeners
            .get(event)
            .map_or(0, Vec::len)
    }

    /// Simulates a native event originating at `target`: every root listener
    /// for `event` is invoked. Returns how many listeners ran.
    pub fn fire(&self, target: NodeId, event: &str) -> usize {
        let listeners = self
            .inner
            .borrow()
            .listeners
            .get(event)
            .cloned()
            .unwrap_or_default();
        trace!(%target, event, listeners = listeners.len(), "fire");
        let ev = Event {
            name: event.to_string(),
            target,
        };
        for l in &listeners {
            l(self, &ev);
        }
        listeners.len()
    }

    pub(crate) fn mark_listening(&self, event: &str) -> bool {
        self.inner.borrow_mut().listening.insert(event.to_string())
    }

    pub(crate) fn is_marked_listening(&self, event: &str) -> bool {
        self.inner.borrow().listening.contains(event)
    }

    // ---- serialization -----------------------------------------------------

    pub fn to_markup(&self, node: NodeId) -> String {
        let arena = self.inner.borrow();
        if arena.node(node).is_none() {
            unknown(node, "to_markup");
            return String::new();
        }
        let mut out = String::new();
        markup::write_node(&arena, node, &mut out);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_tree() {
        let doc = Document::new();
        let div = doc.create_element("div");
        doc.set_attribute(div, "class", "app");
        let hello = doc.create_text("hello");
        let span = doc.create_element("span");
        let world = doc.create_text("world");
        doc.append_child(span, world);
        doc.append_child(div, hello);
        doc.append_child(div, span);

        assert_eq!(doc.tag(div).as_deref(), Some("div"));
        assert_eq!(doc.attribute(div, "class").as_deref(), Some("app"));
        assert_eq!(doc.children(div), vec![hello, span]);
        assert_eq!(doc.text(div), "helloworld");
        assert_eq!(doc.ancestors(world), vec![span, div]);
    }

    #[test]
    fn replace_keeps_position() {
        let doc = Document::new();
        let ul = doc.create_element("ul");
        let a = doc.create_element("li");
        let b = doc.create_comment("placeholder");
        let c = doc.create_element("li");
        for n in [a, b, c] {
            doc.append_child(ul, n);
        }
        let fresh = doc.create_element("li");
        doc.replace_node(b, fresh);

        assert_eq!(doc.children(ul), vec![a, fresh, c]);
        assert_eq!(doc.parent(b), None);
        assert_eq!(doc.parent(fresh), Some(ul));
    }

    #[test]
    fn append_moves_between_parents() {
        let doc = Document::new();
        let a = doc.create_element("a");
        let b = doc.create_element("b");
        let t = doc.create_text("x");
        doc.append_child(a, t);
        doc.append_child(b, t);
        assert!(doc.children(a).is_empty());
        assert_eq!(doc.children(b), vec![t]);
    }

    #[test]
    fn set_attribute_overwrites_in_place() {
        let doc = Document::new();
        let el = doc.create_element("p");
        doc.set_attribute(el, "id", "a");
        doc.set_attribute(el, "title", "t");
        doc.set_attribute(el, "id", "b");
        assert_eq!(
            doc.attributes(el),
            vec![("id".to_string(), "b".to_string()), ("title".to_string(), "t".to_string())]
        );
    }

    #[test]
    fn properties_are_separate_from_attributes() {
        let doc = Document::new();
        let input = doc.create_element("input");
        doc.set_property(input, "value", Value::from("typed"));
        assert_eq!(doc.property(input, "value"), Value::from("typed"));
        assert_eq!(doc.attribute(input, "value"), None);
    }

    #[test]
    fn release_frees_the_subtree_and_reuses_slots() {
        let doc = Document::new();
        let root = doc.create_element("div");
        let p = doc.create_element("p");
        let t = doc.create_text("x");
        doc.append_child(p, t);
        doc.append_child(root, p);
        assert_eq!(doc.node_count(), 3);

        assert_eq!(doc.release(p), 2);
        assert_eq!(doc.node_count(), 1);
        assert!(doc.children(root).is_empty());
        assert!(!doc.contains(p));
        assert!(!doc.contains(t));

        let fresh = doc.create_element("b");
        assert_eq!(doc.node_count(), 2);
        assert_ne!(fresh, p);
        assert_ne!(fresh, t);
        // a reused slot does not revive the old id
        assert_eq!(doc.tag(p), None);
        assert_eq!(doc.tag(fresh).as_deref(), Some("b"));
    }

    #[test]
    fn stale_and_foreign_ids_are_ignored() {
        let doc = Document::new();
        let a = doc.create_element("a");
        doc.release(a);
        doc.set_attribute(a, "id", "x");
        doc.set_text(a, "x");
        assert_eq!(doc.attribute(a, "id"), None);
        assert_eq!(doc.kind(a), None);
        assert_eq!(doc.to_markup(a), "");
        assert_eq!(doc.release(a), 0);

        let other = Document::new();
        for _ in 0..3 {
            other.create_element("i");
        }
        let far = other.create_element("i");
        doc.append_child(far, far);
        assert!(doc.children(far).is_empty());
        assert_eq!(doc.text(far), "");
    }

    #[test]
    fn journal_is_opt_in() {
        let doc = Document::new();
        let a = doc.create_element("a");
        doc.set_attribute(a, "id", "x");
        assert!(!doc.is_journaling());
        assert!(doc.take_journal().is_empty());

        let doc = Document::with_journal();
        let a = doc.create_element("a");
        doc.set_attribute(a, "id", "x");
        assert_eq!(doc.take_journal().len(), 2);
        assert!(doc.journal().is_empty());
    }
}

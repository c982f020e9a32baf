use domc_core::Value;

use crate::NodeId;

/// One primitive tree mutation, as recorded in the document journal.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    CreateElement { node: NodeId, tag: String },
    CreateText { node: NodeId, content: String },
    CreateComment { node: NodeId },
    SetAttribute { node: NodeId, name: String, value: String },
    RemoveAttribute { node: NodeId, name: String },
    SetProperty { node: NodeId, name: String, value: Value },
    SetText { node: NodeId, content: String },
    AppendChild { parent: NodeId, child: NodeId },
    ReplaceNode { old: NodeId, new: NodeId },
    RemoveNode { node: NodeId },
    /// The node and its descendants were freed.
    Release { node: NodeId },
    SetHandler { node: NodeId, event: String },
    SetHandlerData { node: NodeId, event: String, args: Vec<Value> },
}

impl Mutation {
    /// The node whose state the mutation changes.
    pub fn node(&self) -> NodeId {
        match self {
            Mutation::CreateElement { node, .. }
            | Mutation::CreateText { node, .. }
            | Mutation::CreateComment { node }
            | Mutation::SetAttribute { node, .. }
            | Mutation::RemoveAttribute { node, .. }
            | Mutation::SetProperty { node, .. }
            | Mutation::SetText { node, .. }
            | Mutation::RemoveNode { node }
            | Mutation::Release { node }
            | Mutation::SetHandler { node, .. }
            | Mutation::SetHandlerData { node, .. } => *node,
            Mutation::AppendChild { parent, .. } => *parent,
            Mutation::ReplaceNode { old, .. } => *old,
        }
    }

    /// Creation and attach steps, as opposed to writes on existing nodes.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Mutation::CreateElement { .. }
                | Mutation::CreateText { .. }
                | Mutation::CreateComment { .. }
                | Mutation::AppendChild { .. }
                | Mutation::ReplaceNode { .. }
                | Mutation::RemoveNode { .. }
                | Mutation::Release { .. }
        )
    }
}

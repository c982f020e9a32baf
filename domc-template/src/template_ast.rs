#[derive(Debug, Clone, PartialEq)]
pub struct TemplateAttr {
    pub name: String,
    pub value: String, // boolean attributes carry ""
}

/// Raw template tree. Attribute values and text keep their expression spans
/// verbatim; classifying them is the analyzer's job.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element {
        tag: String,
        attrs: Vec<TemplateAttr>,
        children: Vec<Node>,
    },
    Text(String),
    Comment(String),
}

impl Node {
    pub fn element<K, V>(
        tag: impl Into<String>,
        attrs: impl IntoIterator<Item = (K, V)>,
        children: Vec<Node>,
    ) -> Node
    where
        K: Into<String>,
        V: Into<String>,
    {
        Node::Element {
            tag: tag.into(),
            attrs: attrs
                .into_iter()
                .map(|(name, value)| TemplateAttr {
                    name: name.into(),
                    value: value.into(),
                })
                .collect(),
            children,
        }
    }

    pub fn text(t: impl Into<String>) -> Node {
        Node::Text(t.into())
    }

    pub fn tag(&self) -> Option<&str> {
        match self {
            Node::Element { tag, .. } => Some(tag),
            _ => None,
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        match self {
            Node::Element { attrs, .. } => attrs
                .iter()
                .find(|a| a.name == name)
                .map(|a| a.value.as_str()),
            _ => None,
        }
    }

    /// Copy of this element without the named attribute.
    pub fn without_attr(&self, name: &str) -> Node {
        match self {
            Node::Element {
                tag,
                attrs,
                children,
            } => Node::Element {
                tag: tag.clone(),
                attrs: attrs.iter().filter(|a| a.name != name).cloned().collect(),
                children: children.clone(),
            },
            other => other.clone(),
        }
    }
}

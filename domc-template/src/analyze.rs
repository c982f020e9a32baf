//! Single pass over the raw template tree.
//!
//! Every attribute and text node is classified as static or dynamic. Static
//! content goes into the construction plan; dynamic content becomes a
//! [`Binding`] anchored at the node's path. Component tags and structural
//! directives become extension points and are not descended into.

use std::collections::BTreeSet;
use std::rc::Rc;

use tracing::trace;

use crate::binding::{
    AnchorId, ApplyAction, Binding, BindingKind, Compute, NodePath, Operation, Slot, Target,
};
use crate::error::CompileError;
use crate::expr::{parse_arguments, parse_expression};
use crate::extract::{extract, scan};
use crate::registry::{AttributeDirective, Directive, Registry, Subtree, is_component_tag};
use crate::template_ast::Node;

/// Event handler resolved from scope by name once, at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerWiring {
    pub event: String,
    pub handler: String,
}

/// Static side of the template, in document order.
#[derive(Debug, Clone, PartialEq)]
pub enum PlanNode {
    Element {
        tag: String,
        attrs: Vec<(String, String)>,
        handlers: Vec<HandlerWiring>,
        children: Vec<PlanNode>,
        anchor: Option<usize>,
    },
    Text {
        content: String,
        anchor: Option<usize>,
    },
    Comment(String),
    /// Stand-in for an extension point, replaced once the extension mounts.
    Placeholder { extension: usize },
}

pub struct ExtensionPoint {
    pub path: NodePath,
    /// Component tag or `v-<directive>` name.
    pub name: String,
    pub subtree: Rc<dyn Subtree>,
}

pub struct Analysis {
    pub plan: PlanNode,
    pub bindings: Vec<Binding>,
    /// Back-reference table layout: slot `i` holds the node at `anchors[i]`.
    pub anchors: Vec<NodePath>,
    pub extensions: Vec<ExtensionPoint>,
    pub directives: Vec<Rc<dyn AttributeDirective>>,
    pub variables: BTreeSet<String>,
    pub events: BTreeSet<String>,
    /// Scope names resolved as event handlers at construction.
    pub handlers: BTreeSet<String>,
}

pub fn analyze(root: &Node, registry: &Registry) -> Result<Analysis, CompileError> {
    let mut cx = Context {
        registry,
        bindings: Vec::new(),
        anchors: Vec::new(),
        extensions: Vec::new(),
        directives: Vec::new(),
        events: BTreeSet::new(),
        handlers: BTreeSet::new(),
    };
    let plan = cx
        .visit(root, NodePath::root())?
        .unwrap_or_else(|| PlanNode::Text {
            content: String::new(),
            anchor: None,
        });
    let variables = cx
        .bindings
        .iter()
        .flat_map(|b| b.variables.iter().cloned())
        .collect();
    Ok(Analysis {
        plan,
        bindings: cx.bindings,
        anchors: cx.anchors,
        extensions: cx.extensions,
        directives: cx.directives,
        variables,
        events: cx.events,
        handlers: cx.handlers,
    })
}

/// Compile-scoped state threaded through the walk.
struct Context<'r> {
    registry: &'r Registry,
    bindings: Vec<Binding>,
    anchors: Vec<NodePath>,
    extensions: Vec<ExtensionPoint>,
    directives: Vec<Rc<dyn AttributeDirective>>,
    events: BTreeSet<String>,
    handlers: BTreeSet<String>,
}

impl Context<'_> {
    fn target(&mut self, path: &NodePath) -> Target {
        if path.is_root() {
            return Target::Root;
        }
        let slot = match self.anchors.iter().position(|p| p == path) {
            Some(i) => i,
            None => {
                self.anchors.push(path.clone());
                self.anchors.len() - 1
            }
        };
        Target::Anchor(slot)
    }

    fn anchor_slot(&self, path: &NodePath) -> Option<usize> {
        self.anchors.iter().position(|p| p == path)
    }

    fn bind(
        &mut self,
        path: &NodePath,
        slot: Slot,
        kind: BindingKind,
        expression: &str,
        operation: Operation,
        compute: Compute,
    ) -> Result<(), CompileError> {
        let variables = match &compute {
            Compute::Interpolation(x) => x.variables(),
            Compute::Expression(e) => e.variables(),
            Compute::Arguments(args) => {
                let mut out = BTreeSet::new();
                for a in args {
                    a.collect_variables(&mut out);
                }
                out
            }
        };
        let anchor = AnchorId {
            path: path.clone(),
            slot,
        };
        if self.bindings.iter().any(|b| b.anchor == anchor) {
            return Err(CompileError::DuplicateBinding {
                anchor: anchor.to_string(),
            });
        }
        trace!(%anchor, ?kind, "binding");
        let target = self.target(path);
        self.bindings.push(Binding {
            anchor,
            kind,
            expression: expression.to_string(),
            apply: ApplyAction { target, operation },
            variables,
            compute,
        });
        Ok(())
    }

    fn visit(&mut self, node: &Node, path: NodePath) -> Result<Option<PlanNode>, CompileError> {
        match node {
            Node::Comment(c) => Ok(Some(PlanNode::Comment(c.clone()))),
            Node::Text(t) => self.visit_text(t, &path),
            Node::Element {
                tag,
                attrs,
                children,
            } => {
                if let Some(plan) = self.extension_point(node, tag, &path)? {
                    return Ok(Some(plan));
                }

                let mut static_attrs = Vec::new();
                let mut handlers = Vec::new();
                for attr in attrs {
                    let (name, value) = (attr.name.as_str(), attr.value.as_str());
                    if let Some(directive) = name.strip_prefix("v-") {
                        self.attribute_directive(directive, value, &path)?;
                    } else if let Some(event) = event_name(name) {
                        let wiring = self.event(&event, value, &path)?;
                        if handlers.iter().any(|h: &HandlerWiring| h.event == wiring.event) {
                            let anchor = AnchorId {
                                path: path.clone(),
                                slot: Slot::Event(event),
                            };
                            return Err(CompileError::DuplicateBinding {
                                anchor: anchor.to_string(),
                            });
                        }
                        handlers.push(wiring);
                    } else {
                        let x = extract(value)?;
                        if x.is_static() {
                            static_attrs.push((name.to_string(), value.to_string()));
                        } else if name == "class" {
                            self.bind(
                                &path,
                                Slot::Attribute(name.to_string()),
                                BindingKind::Class,
                                value,
                                Operation::ReplaceClass,
                                Compute::Interpolation(x),
                            )?;
                        } else {
                            self.bind(
                                &path,
                                Slot::Attribute(name.to_string()),
                                BindingKind::Attribute,
                                value,
                                Operation::SetAttribute {
                                    name: name.to_string(),
                                },
                                Compute::Interpolation(x),
                            )?;
                        }
                    }
                }
                // Bindings for this node are all registered by now, so its
                // back-reference slot (if any) is known before descending.
                let anchor = self.anchor_slot(&path);

                let mut kids = Vec::with_capacity(children.len());
                for (i, child) in children.iter().enumerate() {
                    if let Some(plan) = self.visit(child, path.child(i))? {
                        kids.push(plan);
                    }
                }
                Ok(Some(PlanNode::Element {
                    tag: tag.clone(),
                    attrs: static_attrs,
                    handlers,
                    children: kids,
                    anchor,
                }))
            }
        }
    }

    fn visit_text(&mut self, text: &str, path: &NodePath) -> Result<Option<PlanNode>, CompileError> {
        if text.trim().is_empty() {
            return Ok(None);
        }
        let x = extract(text)?;
        if x.is_static() {
            return Ok(Some(PlanNode::Text {
                content: text.to_string(),
                anchor: None,
            }));
        }
        self.bind(
            path,
            Slot::Text,
            BindingKind::Text,
            text,
            Operation::SetText,
            Compute::Interpolation(x),
        )?;
        Ok(Some(PlanNode::Text {
            content: String::new(),
            anchor: self.anchor_slot(path),
        }))
    }

    /// Structural directives, then component tags, take the element over.
    /// A structural directive on a component tag wraps the component.
    fn extension_point(
        &mut self,
        node: &Node,
        tag: &str,
        path: &NodePath,
    ) -> Result<Option<PlanNode>, CompileError> {
        let Node::Element { attrs, .. } = node else {
            return Ok(None);
        };
        let structural = attrs.iter().find_map(|a| {
            let directive = a.name.strip_prefix("v-")?;
            match self.registry.directive(directive) {
                Some(Directive::Structural(c)) => Some((a, c.clone())),
                _ => None,
            }
        });
        let name = match &structural {
            Some((attr, _)) => attr.name.clone(),
            None if is_component_tag(tag) => tag.to_string(),
            None => return Ok(None),
        };
        if path.is_root() {
            return Err(CompileError::ExtensionAtRoot { name });
        }
        let subtree = match structural {
            Some((attr, compiler)) => {
                compiler.compile(&node.without_attr(&attr.name), &attr.value, self.registry)?
            }
            None => component_subtree(node, tag, self.registry)?,
        };
        trace!(%path, %name, "extension point");
        self.extensions.push(ExtensionPoint {
            path: path.clone(),
            name,
            subtree,
        });
        Ok(Some(PlanNode::Placeholder {
            extension: self.extensions.len() - 1,
        }))
    }

    fn attribute_directive(
        &mut self,
        name: &str,
        value: &str,
        path: &NodePath,
    ) -> Result<(), CompileError> {
        let directive = match self.registry.directive(name) {
            Some(Directive::Attribute(d)) => d.clone(),
            // structural ones were handled before attributes were visited
            Some(Directive::Structural(_)) => return Ok(()),
            None => {
                return Err(CompileError::UnknownDirective {
                    name: name.to_string(),
                });
            }
        };
        let source = unwrap_span(value);
        if source.trim().is_empty() {
            return Err(CompileError::InvalidDirective {
                directive: name.to_string(),
                value: value.to_string(),
                message: "expected an expression".into(),
            });
        }
        let expr = parse_expression(source.trim())?;
        self.directives.push(directive);
        let index = self.directives.len() - 1;
        self.bind(
            path,
            Slot::Directive(name.to_string()),
            BindingKind::Directive,
            value,
            Operation::Directive {
                name: name.to_string(),
                index,
            },
            Compute::Expression(expr),
        )
    }

    /// `on<event>` attributes. Returns the handler to wire at construction;
    /// the argument tuple, if any, becomes a binding.
    fn event(
        &mut self,
        event: &str,
        value: &str,
        path: &NodePath,
    ) -> Result<HandlerWiring, CompileError> {
        let invalid = |reason: &'static str| CompileError::InvalidEventHandler {
            event: event.to_string(),
            value: value.to_string(),
            reason,
        };
        let spans = scan(value)?;
        let body = match spans.as_slice() {
            [] => value.trim(),
            [span] if span.start == 0 && span.end == value.len() => span.body.trim(),
            [_] => return Err(invalid("literal text around the handler expression")),
            _ => return Err(invalid("more than one expression")),
        };
        let (handler, args) = split_handler(body).map_err(invalid)?;
        if spans.is_empty() && args.is_some() {
            return Err(invalid("arguments need a `${...}` expression"));
        }

        self.events.insert(event.to_string());
        self.handlers.insert(handler.to_string());
        if let Some(args_src) = args {
            let args = parse_arguments(args_src)?;
            if !args.is_empty() {
                self.bind(
                    path,
                    Slot::Event(event.to_string()),
                    BindingKind::EventArgs,
                    args_src.trim(),
                    Operation::SetEventData {
                        event: event.to_string(),
                    },
                    Compute::Arguments(args),
                )?;
            }
        }
        Ok(HandlerWiring {
            event: event.to_string(),
            handler: handler.to_string(),
        })
    }
}

/// Resolves a component tag to its subtree. A component element carries no
/// attribute directives or handlers of its own.
pub(crate) fn component_subtree(
    element: &Node,
    tag: &str,
    registry: &Registry,
) -> Result<Rc<dyn Subtree>, CompileError> {
    let Some(compiler) = registry.component(tag) else {
        return Err(CompileError::UnknownComponent {
            tag: tag.to_string(),
        });
    };
    if let Node::Element { attrs, .. } = element {
        if let Some(attr) = attrs
            .iter()
            .find(|a| a.name.starts_with("v-") || event_name(&a.name).is_some())
        {
            return Err(CompileError::UnsupportedOnComponent {
                tag: tag.to_string(),
                attribute: attr.name.clone(),
            });
        }
    }
    compiler.compile(element, "", registry)
}

fn event_name(attr: &str) -> Option<String> {
    let lower = attr.to_ascii_lowercase();
    let event = lower.strip_prefix("on")?;
    if event.is_empty() || !event.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return None;
    }
    Some(event.to_string())
}

/// Splits `handler(args)` at the first `(` and its matching `)`. A bare
/// `handler` has no argument list.
fn split_handler(body: &str) -> Result<(&str, Option<&str>), &'static str> {
    let (name, args) = match body.find('(') {
        None => (body.trim(), None),
        Some(open) => {
            let close = matching_paren(body, open).ok_or("unbalanced parentheses")?;
            if !body[close + 1..].trim().is_empty() {
                return Err("unexpected text after the argument list");
            }
            (body[..open].trim(), Some(&body[open + 1..close]))
        }
    };
    if !is_identifier(name) {
        return Err("expected a handler name");
    }
    Ok((name, args))
}

fn matching_paren(s: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (i, c) in s[open..].char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' => quote = Some(c),
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(open + i);
                }
            }
            _ => {}
        }
    }
    None
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

/// Directive values may be written bare (`v-show="open"`) or wrapped in a
/// single span (`v-show="${open}"`).
fn unwrap_span(value: &str) -> &str {
    let t = value.trim();
    if let Some(inner) = t.strip_prefix("${").and_then(|r| r.strip_suffix('}')) {
        return inner;
    }
    if let Some(inner) = t.strip_prefix("{{").and_then(|r| r.strip_suffix("}}")) {
        return inner;
    }
    t
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_handler_forms() {
        assert_eq!(split_handler("save"), Ok(("save", None)));
        assert_eq!(split_handler("save()"), Ok(("save", Some(""))));
        assert_eq!(
            split_handler("pick(item, fmt(')'))"),
            Ok(("pick", Some("item, fmt(')')")))
        );
        assert!(split_handler("save(a").is_err());
        assert!(split_handler("save(a) + 1").is_err());
        assert!(split_handler("a.b(c)").is_err());
        assert!(split_handler("(x)").is_err());
    }

    #[test]
    fn event_attribute_names() {
        assert_eq!(event_name("onclick").as_deref(), Some("click"));
        assert_eq!(event_name("onKeyDown").as_deref(), Some("keydown"));
        assert_eq!(event_name("on"), None);
        assert_eq!(event_name("title"), None);
    }

    #[test]
    fn unwrap_directive_values() {
        assert_eq!(unwrap_span("open"), "open");
        assert_eq!(unwrap_span(" ${ open } "), " open ");
        assert_eq!(unwrap_span("{{open}}"), "open");
    }
}

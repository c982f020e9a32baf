//! `v-if`: mounts the element while its condition holds.
//!
//! Accepted conditions:
//! - empty: always visible
//! - an identifier, visible when loosely equal to `true`
//! - an arrow `(a, b) => body`, where `body` is an expression or a block
//!   `{ return expr }`; only the parameters are read from scope and the
//!   element is visible when the result is strictly `true`
//! - any other expression, visible when strictly `true`

use std::rc::Rc;

use domc_core::{Scope, Value};
use domc_dom::{Document, NodeId};
use tracing::trace;

use crate::analyze::component_subtree;
use crate::error::{CompileError, EvalError};
use crate::expr::{Env, Expr, parse_expression};
use crate::registry::{Mounted, Registry, Subtree, SubtreeCompiler, is_component_tag};
use crate::template::compile_with;
use crate::template_ast::Node;

const NAME: &str = "if";

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Always,
    Identifier(String),
    Predicate { params: Vec<String>, body: Expr },
    Expression(Expr),
}

impl Condition {
    pub fn parse(src: &str) -> Result<Condition, CompileError> {
        let src = src.trim();
        let invalid = |message: String| CompileError::InvalidDirective {
            directive: NAME.to_string(),
            value: src.to_string(),
            message,
        };
        if src.is_empty() {
            return Ok(Condition::Always);
        }
        if is_identifier(src) {
            return Ok(Condition::Identifier(src.to_string()));
        }
        if let Some((params, body)) = split_arrow(src) {
            let params = params
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(|p| {
                    if is_identifier(p) {
                        Ok(p.to_string())
                    } else {
                        Err(invalid(format!("invalid parameter `{p}`")))
                    }
                })
                .collect::<Result<Vec<_>, _>>()?;
            let body = match arrow_body(body) {
                None => Expr::Literal(Value::Bool(true)),
                Some("") => Expr::Literal(Value::Undefined),
                Some(expr) => parse_expression(expr).map_err(|e| invalid(e.to_string()))?,
            };
            return Ok(Condition::Predicate { params, body });
        }
        parse_expression(src)
            .map(Condition::Expression)
            .map_err(|e| invalid(e.to_string()))
    }

    pub fn holds(&self, scope: &Scope) -> Result<bool, EvalError> {
        match self {
            Condition::Always => Ok(true),
            Condition::Identifier(name) => Ok(scope.lookup(name).loose_eq(&Value::Bool(true))),
            Condition::Predicate { params, body } => {
                let env = Params { params, scope };
                Ok(matches!(body.eval(&env)?, Value::Bool(true)))
            }
            Condition::Expression(expr) => Ok(matches!(expr.eval(scope)?, Value::Bool(true))),
        }
    }
}

/// Exposes only the arrow's parameters.
struct Params<'a> {
    params: &'a [String],
    scope: &'a Scope,
}

impl Env for Params<'_> {
    fn var(&self, name: &str) -> Value {
        if self.params.iter().any(|p| p == name) {
            self.scope.lookup(name)
        } else {
            Value::Undefined
        }
    }
}

/// `(params) => body`, split into its two halves.
fn split_arrow(src: &str) -> Option<(&str, &str)> {
    let rest = src.strip_prefix('(')?;
    let close = rest.find(')')?;
    let params = &rest[..close];
    let body = rest[close + 1..].trim_start().strip_prefix("=>")?;
    Some((params, body))
}

/// The returned expression of an arrow body. `None` for an empty body,
/// which counts as `true`; `Some("")` for a block without a return value.
fn arrow_body(body: &str) -> Option<&str> {
    let body = body.trim();
    if body.is_empty() {
        return None;
    }
    let Some(block) = body.strip_prefix('{') else {
        return Some(body);
    };
    let block = block.trim_end().strip_suffix('}').unwrap_or(block).trim();
    let expr = block.strip_prefix("return").unwrap_or(block);
    Some(expr.trim().trim_end_matches(';').trim())
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
        && !matches!(s, "true" | "false" | "null" | "undefined")
}

/// Compiler registered for `v-if`. The element may be a component tag, in
/// which case the component itself is mounted while the condition holds.
#[derive(Debug, Clone, Copy, Default)]
pub struct Conditional;

impl SubtreeCompiler for Conditional {
    fn compile(
        &self,
        element: &Node,
        argument: &str,
        registry: &Registry,
    ) -> Result<Rc<dyn Subtree>, CompileError> {
        let condition = Condition::parse(argument)?;
        let body: Rc<dyn Subtree> = match element {
            Node::Element { tag, .. } if is_component_tag(tag) => {
                component_subtree(element, tag, registry)?
            }
            _ => Rc::new(compile_with(element, registry)?),
        };
        Ok(Rc::new(ConditionalSubtree {
            condition: Rc::new(condition),
            body,
        }))
    }
}

struct ConditionalSubtree {
    condition: Rc<Condition>,
    body: Rc<dyn Subtree>,
}

impl Subtree for ConditionalSubtree {
    fn create(&self, doc: &Document, scope: &Scope) -> Result<Box<dyn Mounted>, EvalError> {
        let (node, mounted) = if holds(&self.condition, scope)? {
            let mounted = self.body.create(doc, scope)?;
            (mounted.node(), Some(mounted))
        } else {
            (doc.create_comment("v-if"), None)
        };
        Ok(Box::new(ConditionalMount {
            condition: self.condition.clone(),
            body: self.body.clone(),
            node,
            mounted,
        }))
    }
}

struct ConditionalMount {
    condition: Rc<Condition>,
    body: Rc<dyn Subtree>,
    node: NodeId,
    /// `Some` while visible.
    mounted: Option<Box<dyn Mounted>>,
}

impl ConditionalMount {
    /// Puts `next` where the current node stands and frees the old subtree.
    fn swap(&mut self, doc: &Document, next: NodeId) {
        let old = self.node;
        doc.replace_node(old, next);
        doc.release(old);
        self.node = next;
    }
}

impl Mounted for ConditionalMount {
    fn node(&self) -> NodeId {
        self.node
    }

    fn update(&mut self, doc: &Document, scope: &Scope) -> Result<(), EvalError> {
        let visible = holds(&self.condition, scope)?;
        match (visible, self.mounted.as_mut()) {
            (true, Some(mounted)) => mounted.update(doc, scope)?,
            (true, None) => {
                let mounted = self.body.create(doc, scope)?;
                trace!(old = %self.node, new = %mounted.node(), "v-if shown");
                self.swap(doc, mounted.node());
                self.mounted = Some(mounted);
            }
            (false, Some(_)) => {
                let placeholder = doc.create_comment("v-if");
                trace!(old = %self.node, new = %placeholder, "v-if hidden");
                self.mounted = None;
                self.swap(doc, placeholder);
            }
            (false, None) => {}
        }
        Ok(())
    }
}

fn holds(condition: &Condition, scope: &Scope) -> Result<bool, EvalError> {
    condition.holds(scope).map_err(|cause| EvalError::Directive {
        directive: NAME.to_string(),
        cause: Box::new(cause),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn condition_forms() {
        assert_eq!(Condition::parse("  "), Ok(Condition::Always));
        assert_eq!(
            Condition::parse("open"),
            Ok(Condition::Identifier("open".into()))
        );
        assert!(matches!(
            Condition::parse("(a, b) => a > b"),
            Ok(Condition::Predicate { ref params, .. }) if params == &["a", "b"]
        ));
        assert!(matches!(
            Condition::parse("count > 0"),
            Ok(Condition::Expression(_))
        ));
        assert!(Condition::parse("(1) => true").is_err());
        assert!(Condition::parse("a >").is_err());
    }

    #[test]
    fn identifier_is_loose_and_arrow_is_strict() {
        let scope = Scope::new().with("n", 1).with("open", "1");
        assert_eq!(Condition::parse("n").unwrap().holds(&scope), Ok(true));
        assert_eq!(Condition::parse("() => n").unwrap().holds(&scope), Ok(false));
        assert_eq!(Condition::parse("(n) => n == 1").unwrap().holds(&scope), Ok(true));
        // names outside the parameter list read as undefined
        assert_eq!(
            Condition::parse("() => { return n === undefined; }")
                .unwrap()
                .holds(&scope),
            Ok(true)
        );
        assert_eq!(Condition::parse("() =>").unwrap().holds(&scope), Ok(true));
        assert_eq!(Condition::parse("() => {}").unwrap().holds(&scope), Ok(false));
    }
}

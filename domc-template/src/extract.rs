//! Splitting attribute values and text content into literal text and
//! embedded `${ ... }` / `{{ ... }}` expression spans.

use std::collections::BTreeSet;

use domc_core::Value;

use crate::error::{CompileError, EvalError};
use crate::expr::{Env, Expr, parse_expression};

/// Marker standing in for each expression span in [`Extraction::skeleton`].
pub const PLACEHOLDER: &str = "{}";

/// One lexical span found by [`scan`]: its raw body and byte range in the
/// scanned text (delimiters included).
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RawSpan<'a> {
    pub body: &'a str,
    pub start: usize,
    pub end: usize,
}

/// Finds every delimited span, left to right. Spans do not nest: `${` ends at
/// the first `}` and `{{` at the first `}}`.
pub(crate) fn scan(text: &str) -> Result<Vec<RawSpan<'_>>, CompileError> {
    let mut spans = Vec::new();
    let mut i = 0usize;
    while i < text.len() {
        let rest = &text[i..];
        let dollar = rest.find("${");
        let mustache = rest.find("{{");
        let (offset, open, close) = match (dollar, mustache) {
            (Some(d), Some(m)) if m < d => (m, "{{", "}}"),
            (Some(d), _) => (d, "${", "}"),
            (None, Some(m)) => (m, "{{", "}}"),
            (None, None) => break,
        };
        let start = i + offset;
        let body_start = start + open.len();
        let Some(len) = text[body_start..].find(close) else {
            return Err(CompileError::UnterminatedExpression {
                open,
                text: text.to_string(),
            });
        };
        let end = body_start + len + close.len();
        spans.push(RawSpan {
            body: &text[body_start..body_start + len],
            start,
            end,
        });
        i = end;
    }
    Ok(spans)
}

/// A parsed expression span.
#[derive(Debug, Clone, PartialEq)]
pub struct Span {
    pub source: String,
    pub expr: Expr,
    pub variables: BTreeSet<String>,
}

/// Result of extracting expressions from one value: `literals` always has
/// exactly one more element than `spans`, and the original text is
/// `literals[0] + span[0] + literals[1] + ...`.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub literals: Vec<String>,
    pub spans: Vec<Span>,
}

pub fn extract(text: &str) -> Result<Extraction, CompileError> {
    let raw = scan(text)?;
    let mut literals = Vec::with_capacity(raw.len() + 1);
    let mut spans = Vec::with_capacity(raw.len());
    let mut cursor = 0usize;
    for span in raw {
        literals.push(text[cursor..span.start].to_string());
        let body = span.body.trim();
        if body.is_empty() {
            return Err(CompileError::EmptyExpression {
                text: text.to_string(),
            });
        }
        let expr = parse_expression(body)?;
        spans.push(Span {
            source: body.to_string(),
            variables: expr.variables(),
            expr,
        });
        cursor = span.end;
    }
    literals.push(text[cursor..].to_string());
    Ok(Extraction { literals, spans })
}

impl Extraction {
    /// No expression spans: the value is fixed at construction time.
    pub fn is_static(&self) -> bool {
        self.spans.is_empty()
    }

    /// Exactly one span covering the whole value. Its computed value is the
    /// raw expression result rather than a string.
    pub fn is_single(&self) -> bool {
        self.spans.len() == 1 && self.literals.iter().all(String::is_empty)
    }

    pub fn expressions(&self) -> impl Iterator<Item = &str> {
        self.spans.iter().map(|s| s.source.as_str())
    }

    /// Union of the variables of all spans.
    pub fn variables(&self) -> BTreeSet<String> {
        self.spans
            .iter()
            .flat_map(|s| s.variables.iter().cloned())
            .collect()
    }

    /// The literal text with every span replaced by [`PLACEHOLDER`].
    pub fn skeleton(&self) -> String {
        self.literals.join(PLACEHOLDER)
    }

    pub fn evaluate(&self, env: &dyn Env) -> Result<Value, EvalError> {
        if self.is_single() {
            return self.spans[0].expr.eval(env);
        }
        let mut out = String::new();
        for (i, lit) in self.literals.iter().enumerate() {
            out.push_str(lit);
            if let Some(span) = self.spans.get(i) {
                out.push_str(&span.expr.eval(env)?.to_string());
            }
        }
        Ok(Value::from(out))
    }
}

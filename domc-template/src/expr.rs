//! Binding expressions: parsing, free-variable collection and evaluation.
//!
//! The language is a small side-effect-free subset of JavaScript expressions:
//! literals, identifiers, member/index access, calls to scope functions, list
//! literals, `!`/unary `-`, arithmetic, comparison, `&&`/`||` and `?:`.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::LazyLock;

use domc_core::{Scope, Value};
use pest::Parser;
use pest::error::InputLocation;
use pest::iterators::Pair;
use pest::pratt_parser::{Assoc, Op, PrattParser};

use crate::error::{CompileError, EvalError};

#[derive(pest_derive::Parser)]
#[grammar = "expr.pest"]
struct ExprParser;

static PRATT: LazyLock<PrattParser<Rule>> = LazyLock::new(|| {
    PrattParser::new()
        .op(Op::infix(Rule::or, Assoc::Left))
        .op(Op::infix(Rule::and, Assoc::Left))
        .op(Op::infix(Rule::strict_eq, Assoc::Left)
            | Op::infix(Rule::strict_ne, Assoc::Left)
            | Op::infix(Rule::eq, Assoc::Left)
            | Op::infix(Rule::ne, Assoc::Left))
        .op(Op::infix(Rule::lt, Assoc::Left)
            | Op::infix(Rule::le, Assoc::Left)
            | Op::infix(Rule::gt, Assoc::Left)
            | Op::infix(Rule::ge, Assoc::Left))
        .op(Op::infix(Rule::add, Assoc::Left) | Op::infix(Rule::sub, Assoc::Left))
        .op(Op::infix(Rule::mul, Assoc::Left)
            | Op::infix(Rule::div, Assoc::Left)
            | Op::infix(Rule::rem, Assoc::Left))
        .op(Op::prefix(Rule::not) | Op::prefix(Rule::neg))
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    StrictEq,
    StrictNe,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl BinaryOp {
    fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Or => "||",
            BinaryOp::And => "&&",
            BinaryOp::StrictEq => "===",
            BinaryOp::StrictNe => "!==",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Ident(String),
    Member(Box<Expr>, String),
    Index(Box<Expr>, Box<Expr>),
    Call(Box<Expr>, Vec<Expr>),
    List(Vec<Expr>),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Conditional(Box<Expr>, Box<Expr>, Box<Expr>),
}

/// Variable source an expression is evaluated against.
pub trait Env {
    fn var(&self, name: &str) -> Value;
}

impl Env for Scope {
    fn var(&self, name: &str) -> Value {
        self.lookup(name)
    }
}

pub fn parse_expression(src: &str) -> Result<Expr, CompileError> {
    let mut pairs =
        ExprParser::parse(Rule::expression, src).map_err(|e| syntax_error(src, e))?;
    let body = pairs
        .next()
        .and_then(|root| root.into_inner().find(|p| p.as_rule() == Rule::ternary))
        .ok_or_else(|| CompileError::EmptyExpression {
            text: src.to_string(),
        })?;
    lower_ternary(body)
}

/// Parses a comma-separated argument list such as the inside of
/// `handler(a, b.c)`. An empty or blank string is an empty list.
pub fn parse_arguments(src: &str) -> Result<Vec<Expr>, CompileError> {
    let mut pairs =
        ExprParser::parse(Rule::argument_list, src).map_err(|e| syntax_error(src, e))?;
    let Some(root) = pairs.next() else {
        return Ok(Vec::new());
    };
    root.into_inner()
        .filter(|p| p.as_rule() == Rule::ternary)
        .map(lower_ternary)
        .collect()
}

fn syntax_error(src: &str, e: pest::error::Error<Rule>) -> CompileError {
    let offset = match e.location {
        InputLocation::Pos(p) => p,
        InputLocation::Span((start, _)) => start,
    };
    CompileError::InvalidExpression {
        expr: src.to_string(),
        offset,
        message: e.variant.message().into_owned(),
    }
}

fn lower_ternary(pair: Pair<Rule>) -> Result<Expr, CompileError> {
    let mut inner = pair.into_inner();
    let cond = match inner.next() {
        Some(p) => lower_binary(p)?,
        None => return Ok(Expr::Literal(Value::Undefined)),
    };
    match (inner.next(), inner.next()) {
        (Some(then), Some(otherwise)) => Ok(Expr::Conditional(
            Box::new(cond),
            Box::new(lower_ternary(then)?),
            Box::new(lower_ternary(otherwise)?),
        )),
        _ => Ok(cond),
    }
}

fn lower_binary(pair: Pair<Rule>) -> Result<Expr, CompileError> {
    PRATT
        .map_primary(lower_postfix)
        .map_prefix(|op, rhs| {
            let op = match op.as_rule() {
                Rule::not => UnaryOp::Not,
                _ => UnaryOp::Neg,
            };
            Ok(Expr::Unary(op, Box::new(rhs?)))
        })
        .map_infix(|lhs, op, rhs| {
            let op = match op.as_rule() {
                Rule::or => BinaryOp::Or,
                Rule::and => BinaryOp::And,
                Rule::strict_eq => BinaryOp::StrictEq,
                Rule::strict_ne => BinaryOp::StrictNe,
                Rule::eq => BinaryOp::Eq,
                Rule::ne => BinaryOp::Ne,
                Rule::lt => BinaryOp::Lt,
                Rule::le => BinaryOp::Le,
                Rule::gt => BinaryOp::Gt,
                Rule::ge => BinaryOp::Ge,
                Rule::add => BinaryOp::Add,
                Rule::sub => BinaryOp::Sub,
                Rule::mul => BinaryOp::Mul,
                Rule::div => BinaryOp::Div,
                _ => BinaryOp::Rem,
            };
            Ok(Expr::Binary(op, Box::new(lhs?), Box::new(rhs?)))
        })
        .parse(pair.into_inner())
}

fn lower_postfix(pair: Pair<Rule>) -> Result<Expr, CompileError> {
    let mut inner = pair.into_inner();
    let mut expr = match inner.next() {
        Some(p) => lower_primary(p)?,
        None => return Ok(Expr::Literal(Value::Undefined)),
    };
    for accessor in inner {
        expr = match accessor.as_rule() {
            Rule::member => {
                let name = accessor
                    .into_inner()
                    .next()
                    .map(|p| p.as_str().to_string())
                    .unwrap_or_default();
                Expr::Member(Box::new(expr), name)
            }
            Rule::index => {
                let key = accessor
                    .into_inner()
                    .next()
                    .map(lower_ternary)
                    .transpose()?
                    .unwrap_or(Expr::Literal(Value::Undefined));
                Expr::Index(Box::new(expr), Box::new(key))
            }
            Rule::call => {
                let args = accessor
                    .into_inner()
                    .map(lower_ternary)
                    .collect::<Result<Vec<_>, _>>()?;
                Expr::Call(Box::new(expr), args)
            }
            _ => expr,
        };
    }
    Ok(expr)
}

fn lower_primary(pair: Pair<Rule>) -> Result<Expr, CompileError> {
    Ok(match pair.as_rule() {
        Rule::number => Expr::Literal(Value::Number(pair.as_str().parse().unwrap_or(f64::NAN))),
        Rule::string => {
            let raw = pair.into_inner().next().map(|p| p.as_str()).unwrap_or("");
            Expr::Literal(Value::from(unescape(raw)))
        }
        Rule::boolean => Expr::Literal(Value::Bool(pair.as_str() == "true")),
        Rule::null => Expr::Literal(Value::Null),
        Rule::undefined => Expr::Literal(Value::Undefined),
        Rule::ident => Expr::Ident(pair.as_str().to_string()),
        Rule::list => Expr::List(
            pair.into_inner()
                .map(lower_ternary)
                .collect::<Result<Vec<_>, _>>()?,
        ),
        Rule::ternary => lower_ternary(pair)?,
        _ => Expr::Literal(Value::Undefined),
    })
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

impl Expr {
    /// Scope names this expression reads: the leading segment of every
    /// identifier path. Property names after `.` are not variables.
    pub fn variables(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        self.collect_variables(&mut out);
        out
    }

    pub fn collect_variables(&self, out: &mut BTreeSet<String>) {
        match self {
            Expr::Literal(_) => {}
            Expr::Ident(name) => {
                out.insert(name.clone());
            }
            Expr::Member(obj, _) => obj.collect_variables(out),
            Expr::Index(obj, key) => {
                obj.collect_variables(out);
                key.collect_variables(out);
            }
            Expr::Call(callee, args) => {
                callee.collect_variables(out);
                for a in args {
                    a.collect_variables(out);
                }
            }
            Expr::List(items) => {
                for i in items {
                    i.collect_variables(out);
                }
            }
            Expr::Unary(_, e) => e.collect_variables(out),
            Expr::Binary(_, l, r) => {
                l.collect_variables(out);
                r.collect_variables(out);
            }
            Expr::Conditional(c, t, e) => {
                c.collect_variables(out);
                t.collect_variables(out);
                e.collect_variables(out);
            }
        }
    }

    pub fn eval(&self, env: &dyn Env) -> Result<Value, EvalError> {
        match self {
            Expr::Literal(v) => Ok(v.clone()),
            Expr::Ident(name) => Ok(env.var(name)),
            Expr::Member(obj, prop) => {
                let base = obj.eval(env)?;
                if base.is_nullish() {
                    return Err(EvalError::PropertyOfNullish {
                        property: prop.clone(),
                        base: base.type_name(),
                    });
                }
                Ok(base.property(prop))
            }
            Expr::Index(obj, key) => {
                let base = obj.eval(env)?;
                let key = key.eval(env)?;
                if base.is_nullish() {
                    return Err(EvalError::PropertyOfNullish {
                        property: key.to_string(),
                        base: base.type_name(),
                    });
                }
                Ok(base.index(&key))
            }
            Expr::Call(callee, args) => {
                let target = callee.eval(env)?;
                let Value::Function(f) = target else {
                    return Err(EvalError::NotCallable {
                        callee: callee.to_string(),
                        found: target.type_name(),
                    });
                };
                let args = args
                    .iter()
                    .map(|a| a.eval(env))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(f.call(&args))
            }
            Expr::List(items) => Ok(Value::list(
                items
                    .iter()
                    .map(|i| i.eval(env))
                    .collect::<Result<Vec<_>, _>>()?,
            )),
            Expr::Unary(UnaryOp::Not, e) => Ok(Value::Bool(!e.eval(env)?.is_truthy())),
            Expr::Unary(UnaryOp::Neg, e) => Ok(Value::Number(-e.eval(env)?.to_number())),
            Expr::Binary(BinaryOp::And, l, r) => {
                let lhs = l.eval(env)?;
                if lhs.is_truthy() { r.eval(env) } else { Ok(lhs) }
            }
            Expr::Binary(BinaryOp::Or, l, r) => {
                let lhs = l.eval(env)?;
                if lhs.is_truthy() { Ok(lhs) } else { r.eval(env) }
            }
            Expr::Binary(op, l, r) => Ok(binary(*op, &l.eval(env)?, &r.eval(env)?)),
            Expr::Conditional(c, t, e) => {
                if c.eval(env)?.is_truthy() {
                    t.eval(env)
                } else {
                    e.eval(env)
                }
            }
        }
    }
}

fn is_numeric_operand(v: &Value) -> bool {
    matches!(
        v,
        Value::Undefined | Value::Null | Value::Bool(_) | Value::Number(_)
    )
}

fn binary(op: BinaryOp, a: &Value, b: &Value) -> Value {
    match op {
        BinaryOp::Add => {
            if is_numeric_operand(a) && is_numeric_operand(b) {
                Value::Number(a.to_number() + b.to_number())
            } else {
                Value::from(format!("{a}{b}"))
            }
        }
        BinaryOp::Sub => Value::Number(a.to_number() - b.to_number()),
        BinaryOp::Mul => Value::Number(a.to_number() * b.to_number()),
        BinaryOp::Div => Value::Number(a.to_number() / b.to_number()),
        BinaryOp::Rem => Value::Number(a.to_number() % b.to_number()),
        BinaryOp::StrictEq => Value::Bool(a.is_identical(b)),
        BinaryOp::StrictNe => Value::Bool(!a.is_identical(b)),
        BinaryOp::Eq => Value::Bool(a.loose_eq(b)),
        BinaryOp::Ne => Value::Bool(!a.loose_eq(b)),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ordering = match (a, b) {
                (Value::Str(x), Value::Str(y)) => Some(x.cmp(y)),
                _ => a.to_number().partial_cmp(&b.to_number()),
            };
            let Some(ord) = ordering else {
                return Value::Bool(false);
            };
            Value::Bool(match op {
                BinaryOp::Lt => ord.is_lt(),
                BinaryOp::Le => ord.is_le(),
                BinaryOp::Gt => ord.is_gt(),
                _ => ord.is_ge(),
            })
        }
        // short-circuiting operators are handled in `Expr::eval`
        BinaryOp::And | BinaryOp::Or => Value::Undefined,
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Literal(Value::Str(s)) => write!(f, "{s:?}"),
            Expr::Literal(v) => write!(f, "{v}"),
            Expr::Ident(name) => f.write_str(name),
            Expr::Member(obj, prop) => write!(f, "{obj}.{prop}"),
            Expr::Index(obj, key) => write!(f, "{obj}[{key}]"),
            Expr::Call(callee, args) => {
                write!(f, "{callee}(")?;
                for (i, a) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{a}")?;
                }
                f.write_str(")")
            }
            Expr::List(items) => {
                f.write_str("[")?;
                for (i, a) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{a}")?;
                }
                f.write_str("]")
            }
            Expr::Unary(UnaryOp::Not, e) => write!(f, "!{e}"),
            Expr::Unary(UnaryOp::Neg, e) => write!(f, "-{e}"),
            Expr::Binary(op, l, r) => write!(f, "({l} {} {r})", op.symbol()),
            Expr::Conditional(c, t, e) => write!(f, "({c} ? {t} : {e})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(src: &str, scope: &Scope) -> Value {
        parse_expression(src).unwrap().eval(scope).unwrap()
    }

    #[test]
    fn precedence_and_ternary() {
        let scope = Scope::new().with("a", 2).with("b", 3);
        assert_eq!(eval("a + b * 2", &scope), Value::from(8));
        assert_eq!(eval("(a + b) * 2", &scope), Value::from(10));
        assert_eq!(eval("a > 1 && b < 3 ? 'x' : 'y'", &scope), Value::from("y"));
        assert_eq!(eval("!a", &scope), Value::from(false));
        assert_eq!(eval("-a + 1", &scope), Value::from(-1));
    }

    #[test]
    fn string_concatenation() {
        let scope = Scope::new().with("n", 3);
        assert_eq!(eval("'n=' + n", &scope), Value::from("n=3"));
        assert_eq!(eval(r#""a\"b""#, &scope), Value::from("a\"b"));
    }

    #[test]
    fn member_and_index_access() {
        let user = Value::map([("name", Value::from("Ada")), ("tags", Value::list([Value::from("x")]))]);
        let scope = Scope::new().with("user", user);
        assert_eq!(eval("user.name", &scope), Value::from("Ada"));
        assert_eq!(eval("user.tags[0]", &scope), Value::from("x"));
        assert_eq!(eval("user.tags.length", &scope), Value::from(1));
        assert_eq!(eval("user.missing", &scope), Value::Undefined);
    }

    #[test]
    fn property_of_undefined_fails() {
        let err = parse_expression("user.name")
            .unwrap()
            .eval(&Scope::new())
            .unwrap_err();
        assert_eq!(
            err,
            EvalError::PropertyOfNullish {
                property: "name".into(),
                base: "undefined"
            }
        );
    }

    #[test]
    fn calls_scope_functions() {
        let upper = Value::function(|args| {
            Value::from(args.first().map(|a| a.to_string().to_uppercase()).unwrap_or_default())
        });
        let scope = Scope::new().with("upper", upper).with("name", "ada");
        assert_eq!(eval("upper(name)", &scope), Value::from("ADA"));

        let err = parse_expression("name()").unwrap().eval(&scope).unwrap_err();
        assert!(matches!(err, EvalError::NotCallable { found: "string", .. }));
    }

    #[test]
    fn variables_are_root_identifiers() {
        let e = parse_expression("user.name + fmt(count, item[key]) + 'lit'").unwrap();
        let vars: Vec<_> = e.variables().into_iter().collect();
        assert_eq!(vars, vec!["count", "fmt", "item", "key", "user"]);
    }

    #[test]
    fn keywords_are_not_variables() {
        let e = parse_expression("flag === true || x == null || y === undefined").unwrap();
        let vars: Vec<_> = e.variables().into_iter().collect();
        assert_eq!(vars, vec!["flag", "x", "y"]);
    }

    #[test]
    fn argument_lists() {
        assert!(parse_arguments("").unwrap().is_empty());
        assert_eq!(parse_arguments("count").unwrap().len(), 1);
        assert_eq!(parse_arguments("a, b.c, 'x'").unwrap().len(), 3);
        assert!(parse_arguments("a,").is_err());
    }

    #[test]
    fn syntax_errors_are_reported() {
        let err = parse_expression("a +").unwrap_err();
        assert!(matches!(err, CompileError::InvalidExpression { .. }));
        assert!(parse_expression("a b").is_err());
    }
}

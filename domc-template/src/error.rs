use thiserror::Error;

/// Malformed markup handed to [`crate::parse_template`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("empty template")]
    Empty,

    #[error("unclosed <{tag}> opened at byte {offset}")]
    UnclosedTag { tag: String, offset: usize },

    #[error("closing </{found}> at byte {offset} does not match open <{expected}>")]
    MismatchedTag {
        expected: String,
        found: String,
        offset: usize,
    },

    #[error("closing </{tag}> at byte {offset} has no open element")]
    UnexpectedClosingTag { tag: String, offset: usize },

    #[error("unterminated {what} starting at byte {offset}")]
    Unterminated { what: &'static str, offset: usize },

    #[error("expected a tag name at byte {offset}")]
    MissingTagName { offset: usize },

    #[error("template must have exactly one root element, found {count}")]
    RootCount { count: usize },
}

/// Raised synchronously by `compile`. Never retried.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompileError {
    #[error(transparent)]
    Markup(#[from] ParseError),

    #[error("unterminated `{open}` in {text:?}")]
    UnterminatedExpression { open: &'static str, text: String },

    #[error("empty expression in {text:?}")]
    EmptyExpression { text: String },

    #[error("invalid expression {expr:?} at offset {offset}: {message}")]
    InvalidExpression {
        expr: String,
        offset: usize,
        message: String,
    },

    #[error("invalid handler for `on{event}` ({value:?}): {reason}")]
    InvalidEventHandler {
        event: String,
        value: String,
        reason: &'static str,
    },

    #[error("unknown directive `v-{name}`")]
    UnknownDirective { name: String },

    #[error("unknown component <{tag}>")]
    UnknownComponent { tag: String },

    #[error("<{tag}> is a component; `{attribute}` cannot be used on it")]
    UnsupportedOnComponent { tag: String, attribute: String },

    #[error("`{anchor}` is bound more than once")]
    DuplicateBinding { anchor: String },

    #[error("`{name}` cannot be used on the template root")]
    ExtensionAtRoot { name: String },

    #[error("invalid `v-{directive}` value {value:?}: {message}")]
    InvalidDirective {
        directive: String,
        value: String,
        message: String,
    },
}

/// Raised while a binding expression is evaluated against a scope. The update
/// pass stops at the first one; nothing is rolled back.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("cannot read property `{property}` of {base}")]
    PropertyOfNullish {
        property: String,
        base: &'static str,
    },

    #[error("`{callee}` is not a function (found {found})")]
    NotCallable { callee: String, found: &'static str },

    #[error("handler `{handler}` for `{event}` is not a function (found {found})")]
    MissingHandler {
        event: String,
        handler: String,
        found: &'static str,
    },

    #[error("snapshot was produced by another template")]
    ForeignSnapshot,

    #[error("no anchor reference for `{anchor}` on root {root}")]
    DetachedAnchor { anchor: String, root: String },

    #[error("`v-{directive}` failed: {cause}")]
    Directive {
        directive: String,
        #[source]
        cause: Box<EvalError>,
    },
}

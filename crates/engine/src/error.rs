//! Error types for each stage of the pipeline: lexing, parsing, and
//! rendering. Kept as three separate enums (rather than one grab-bag) so
//! callers can match on the stage that failed; [TinjaError] unifies them for
//! the top-level API.

use derive_more::From;
use thiserror::Error;

/// A lexer failure: an unterminated construct or an unrecognized character in
/// code mode. Always carries a source position.
#[derive(Clone, Debug, Error, PartialEq)]
#[error("{message}, line: {line}, col: {column}")]
pub struct LexError {
    pub message: String,
    pub line: u32,
    pub column: u32,
}

impl LexError {
    pub fn new(message: impl Into<String>, line: u32, column: u32) -> Self {
        Self {
            message: message.into(),
            line,
            column,
        }
    }
}

/// A parser failure: unexpected token, unknown tag, or malformed arguments.
///
/// The `Display` format is fixed by the external template-source contract:
/// `"<message>, line: <L>, col: <C>, near: <lexeme>, token: <tokenRepr>"`.
#[derive(Clone, Debug, Error, PartialEq)]
#[error("{message}, line: {line}, col: {column}, near: {near:?}, token: {token}")]
pub struct ParseError {
    pub message: String,
    pub line: u32,
    pub column: u32,
    /// The lexeme of the token where parsing failed
    pub near: String,
    /// A debug representation of the token's kind, e.g. `Name` or `BlockEnd`
    pub token: String,
}

/// A render-time failure: undefined name under strict mode, type mismatch,
/// out-of-range index, filter/test/function failure, loader failure, or
/// arity mismatch.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum RenderError {
    #[error("{name:?} is undefined")]
    UndefinedName { name: String },

    #[error("{container} has no attribute or item {key:?}")]
    UndefinedAttribute { container: String, key: String },

    #[error("index {index} is out of range")]
    IndexOutOfRange { index: i64 },

    #[error("unsupported operation: {op} on {left} and {right}")]
    TypeMismatch {
        op: String,
        left: String,
        right: String,
    },

    #[error("division by zero")]
    DivisionByZero,

    #[error("unknown filter {name:?}")]
    UnknownFilter { name: String },

    #[error("unknown test {name:?}")]
    UnknownTest { name: String },

    #[error("unknown function {name:?}")]
    UnknownFunction { name: String },

    #[error("unknown statement tag {name:?}")]
    UnknownStatement { name: String },

    #[error(
        "{name} expected {expected} argument(s), got {actual}"
    )]
    Arity {
        name: String,
        expected: String,
        actual: usize,
    },

    #[error("{name} is not callable")]
    NotCallable { name: String },

    #[error("error in filter {filter:?}: {source}")]
    Filter {
        filter: String,
        #[source]
        source: Box<RenderError>,
    },

    #[error("error loading template {name:?}: {message}")]
    Loader { name: String, message: String },

    #[error("error rendering {name:?}: {source}")]
    Nested {
        name: String,
        #[source]
        source: Box<RenderError>,
    },

    #[error("{message}")]
    Other { message: String },
}

impl RenderError {
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
        }
    }

    /// Wrap this error as having originated from the named filter
    #[must_use]
    pub fn in_filter(self, filter: impl Into<String>) -> Self {
        Self::Filter {
            filter: filter.into(),
            source: Box::new(self),
        }
    }

    /// Wrap this error as having originated from rendering a nested template
    #[must_use]
    pub fn in_template(self, name: impl Into<String>) -> Self {
        Self::Nested {
            name: name.into(),
            source: Box::new(self),
        }
    }
}

/// Union of every error kind the public API can return.
#[derive(Clone, Debug, Error, From)]
pub enum TinjaError {
    #[error(transparent)]
    Lex(LexError),
    #[error(transparent)]
    Parse(ParseError),
    #[error(transparent)]
    Render(RenderError),
}

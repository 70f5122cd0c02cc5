//! A Jinja-compatible text template engine: lexing, parsing, and rendering
//! over a dynamic value layer. This crate is the core pipeline only —
//! concrete filters/tests/statements beyond the handful in [builtins] are a
//! library built atop the registration protocol exposed here, not part of
//! the core.

pub mod ast;
#[cfg(feature = "builtins")]
pub mod builtins;
pub mod callable;
pub mod context;
pub mod environment;
pub mod error;
pub mod lexer;
pub mod loader;
pub mod parser;
pub mod registry;
pub mod renderer;
pub mod template;
pub mod token;
pub mod value;

pub use ast::{Expression, Statement, Visitor, walk_expression, walk_statement};
pub use context::Context;
pub use environment::{Config, Environment};
pub use error::{LexError, ParseError, RenderError, TinjaError};
pub use loader::{ChainLoader, FsLoader, Loader, MemoryLoader, NullLoader};
pub use parser::Parser;
pub use registry::Registry;
pub use renderer::Renderer;
pub use template::Template;
pub use value::{Callable, HostValue, VarArgs, Value};

//! Callable dispatch: the canonical signature filters, tests, and functions
//! are registered under, and the statement-tag trait statements implement.
//!
//! spec.md §4.5 asks the dispatcher to support both a varargs form and a
//! typed form. Per the Design Notes (spec.md §9, "a typed re-implementation
//! should accept a single canonical signature... and require users to
//! handle extraction from VarArgs"), both collapse to one signature here;
//! a typed callable is just one that calls [VarArgs::get]/[VarArgs::get_kw]
//! and converts, rather than the dispatcher doing reflection.

use crate::{
    ast::Statement,
    error::{ParseError, RenderError},
    parser::Parser,
    renderer::Renderer,
    value::{VarArgs, Value},
};
use std::rc::Rc;

/// `value | name(args)`: receives the piped value as `receiver` plus the
/// remaining evaluated arguments.
pub type FilterFn = Rc<dyn Fn(&Value, &VarArgs) -> Result<Value, RenderError>>;

/// `value is name(args)`: same shape as a filter, but the dispatcher coerces
/// the result to a bool (spec.md §4.5).
pub type TestFn = Rc<dyn Fn(&Value, &VarArgs) -> Result<bool, RenderError>>;

/// A function available as a name in the context, e.g. `range(...)`.
pub type FunctionFn = Rc<dyn Fn(&VarArgs) -> Result<Value, RenderError>>;

/// A registered `{% tag %}`. Combines the two halves spec.md §4.2/§4.6
/// describe separately: `parse` builds the tag's AST node (including any
/// nested body collected via [Parser::wrap_until]), and `execute` runs it
/// against a live [Renderer].
pub trait StatementTag {
    /// Parse this tag's arguments and body. Called with the cursor
    /// positioned just after the tag name; must leave it positioned just
    /// after the tag's own `BlockEnd` (and, transitively, past any nested
    /// body/end-tag it consumes).
    fn parse(&self, parser: &mut Parser, line: u32, column: u32) -> Result<Statement, ParseError>;

    /// Execute a previously parsed `Statement::StatementBlock` against
    /// `renderer`, writing output through it.
    fn execute(&self, renderer: &mut Renderer, statement: &Statement) -> Result<(), RenderError>;
}

/// Check that `varargs` has between `min` and `max` positional arguments
/// (inclusive), returning an arity error named after `name` otherwise.
pub fn check_arity(
    name: &str,
    varargs: &VarArgs,
    min: usize,
    max: usize,
) -> Result<(), RenderError> {
    let actual = varargs.positional.len();
    if actual < min || actual > max {
        let expected = if min == max {
            min.to_string()
        } else {
            format!("{min}-{max}")
        };
        return Err(RenderError::Arity {
            name: name.to_string(),
            expected,
            actual,
        });
    }
    Ok(())
}

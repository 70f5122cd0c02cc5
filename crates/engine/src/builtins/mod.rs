//! A small library of statements, filters, tests, and functions built atop
//! the core registration protocol (spec.md §1 scopes these out of core;
//! they live here, gated behind the `builtins` feature, so the core stays
//! usable standalone per the Design Notes' "library built atop the core").
//!
//! `raw` and `filter` are grounded directly in spec.md §4.6/§8's illustrative
//! statement contracts and testable scenarios 2-3; the rest are supplemented
//! from gonja's `builtins/` package (filters.go, tests.go, statements).

mod filters;
mod functions;
mod statements;
mod tests;

use crate::environment::Environment;

/// Register every built-in statement, filter, test, and function. Called
/// automatically by [Environment::new] when the `builtins` feature is on.
pub fn register_all(env: &mut Environment) {
    statements::register(env);
    filters::register(env);
    tests::register(env);
    functions::register(env);
}

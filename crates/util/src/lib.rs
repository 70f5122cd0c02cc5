//! Small helpers shared across tinja's subcrates. Nothing here is specific to
//! template parsing or rendering; it's the kind of utility code that would
//! otherwise get duplicated between the engine crate and its driver.

#[cfg(any(test, feature = "test"))]
mod test_util;

#[cfg(any(test, feature = "test"))]
pub use test_util::*;

use std::fmt::Debug;
use tracing_subscriber::{EnvFilter, prelude::*};

/// Link to file a bug against this project. Used in panic/assert messages for
/// conditions that should be impossible to hit.
pub const NEW_ISSUE_LINK: &str =
    "https://github.com/tinja-engine/tinja/issues/new";

/// A static mapping between values (of type `T`) and one or more string
/// labels. Used to parse registry/config names into an enum and print the
/// canonical label back out.
pub struct Mapping<'a, T: Copy>(&'a [(T, &'a [&'a str])]);

impl<'a, T: Copy> Mapping<'a, T> {
    pub const fn new(mapping: &'a [(T, &'a [&'a str])]) -> Self {
        Self(mapping)
    }

    /// Get a value by one of its labels
    pub fn get(&self, s: &str) -> Option<T> {
        for (value, labels) in self.0 {
            if labels.contains(&s) {
                return Some(*value);
            }
        }
        None
    }

    /// Get the canonical label for a value. If it has multiple labels, use
    /// the first. Panic if the value isn't in the mapping.
    pub fn get_label(&self, value: T) -> &str
    where
        T: Debug + PartialEq,
    {
        let (_, labels) = self
            .0
            .iter()
            .find(|(v, _)| v == &value)
            .unwrap_or_else(|| panic!("Unknown value {value:?}"));
        labels
            .first()
            .unwrap_or_else(|| panic!("No labels mapped for value {value:?}"))
    }
}

/// Extension trait for [Result] to trace an error before returning it
/// unchanged, so failures are logged at the point they occur rather than
/// only when a caller happens to print them.
pub trait ResultTraced<T, E>: Sized {
    #[must_use]
    fn traced(self) -> Self;
}

impl<T, E: std::fmt::Display> ResultTraced<T, E> for Result<T, E> {
    fn traced(self) -> Self {
        self.inspect_err(|error| tracing::error!(%error))
    }
}

/// Initialize a stderr tracing subscriber reading its filter from `RUST_LOG`
/// (or `level` if the env var isn't set). Intended to be called once, at the
/// top of a driver binary's `main`.
pub fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);
    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(filter)
        .init();
}

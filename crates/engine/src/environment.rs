//! The shared, configured factory for templates: registries, globals,
//! config, and loader (spec.md §3, §6).

use crate::{
    callable::{FilterFn, FunctionFn, StatementTag, TestFn},
    error::TinjaError,
    loader::{Loader, NullLoader},
    registry::Registry,
    template::Template,
    value::Value,
};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, rc::Rc};
use tinja_util::ResultTraced;

/// Engine-wide configuration. `Default` matches Jinja's own defaults:
/// permissive undefined, autoescape off (core templates are not assumed to
/// be HTML), trimming off.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
#[serde(default)]
pub struct Config {
    /// Missing `Name`/`Getattr`/`Getitem` lookups raise a [crate::RenderError]
    /// instead of yielding nil (spec.md §4.4).
    pub strict_undefined: bool,
    /// HTML-escape `Output` values that aren't marked `safe` (spec.md §4.6).
    pub autoescape: bool,
    /// Strip the first newline after a block tag's `%}`, a common Jinja
    /// whitespace-control default.
    pub trim_blocks: bool,
    /// Strip leading whitespace before a block tag's `{%`.
    pub lstrip_blocks: bool,
    /// Fractional digits used when rendering a float (spec.md §9's
    /// "keep configurable" resolution of the Open Question).
    pub float_precision: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            strict_undefined: false,
            autoescape: false,
            trim_blocks: false,
            lstrip_blocks: false,
            float_precision: 6,
        }
    }
}

/// The factory templates are built from. Mutable during setup (registering
/// statements/filters/tests/functions, setting globals); templates built
/// from it hold an `Rc` so an environment outlives every template that
/// references it, matching spec.md §5's "read-only after freeze, shared by
/// concurrent renders" model (a caller enforces the freeze by simply no
/// longer taking `&mut Environment` once templates have been built).
pub struct Environment {
    pub(crate) config: Config,
    pub(crate) statements: Registry<Rc<dyn StatementTag>>,
    pub(crate) filters: Registry<FilterFn>,
    pub(crate) tests: Registry<TestFn>,
    pub(crate) functions: Registry<FunctionFn>,
    pub(crate) globals: HashMap<String, Value>,
    pub(crate) loader: Box<dyn Loader>,
}

impl Environment {
    pub fn new(config: Config) -> Self {
        let mut env = Self {
            config,
            statements: Registry::new(),
            filters: Registry::new(),
            tests: Registry::new(),
            functions: Registry::new(),
            globals: HashMap::new(),
            loader: Box::new(NullLoader),
        };
        #[cfg(feature = "builtins")]
        crate::builtins::register_all(&mut env);
        env
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn set_loader(&mut self, loader: impl Loader + 'static) {
        self.loader = Box::new(loader);
    }

    pub fn set_global(&mut self, name: impl Into<String>, value: Value) {
        self.globals.insert(name.into(), value);
    }

    pub fn register_statement(&mut self, name: impl Into<String>, tag: Rc<dyn StatementTag>) -> bool {
        self.statements.register(name, tag)
    }

    pub fn replace_statement(&mut self, name: impl Into<String>, tag: Rc<dyn StatementTag>) {
        self.statements.replace(name, tag);
    }

    pub fn register_filter(&mut self, name: impl Into<String>, filter: FilterFn) -> bool {
        self.filters.register(name, filter)
    }

    pub fn replace_filter(&mut self, name: impl Into<String>, filter: FilterFn) {
        self.filters.replace(name, filter);
    }

    pub fn register_test(&mut self, name: impl Into<String>, test: TestFn) -> bool {
        self.tests.register(name, test)
    }

    pub fn register_function(&mut self, name: impl Into<String>, function: FunctionFn) -> bool {
        self.functions.register(name, function)
    }

    /// Parse `src` into a standalone template named `name`, not registered
    /// with the loader.
    pub fn from_string(self: &Rc<Self>, name: impl Into<String>, src: &str) -> Result<Template, TinjaError> {
        Template::parse(name.into(), src, Rc::clone(self))
    }

    /// Resolve `name` through this environment's loader, parsing (and, per
    /// the loader's own behavior, caching) the result.
    pub fn from_loader(self: &Rc<Self>, name: &str) -> Result<Template, TinjaError> {
        let source = self
            .loader
            .get_source(name)
            .map_err(|message| TinjaError::Render(crate::error::RenderError::Loader {
                name: name.to_string(),
                message,
            }))
            .traced()?;
        Template::parse(name.to_string(), &source, Rc::clone(self))
    }
}

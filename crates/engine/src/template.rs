//! A parsed, immutable template bound to the [Environment] it was built
//! from (spec.md §3: "immutable after parsing; rendering allocates fresh
//! state per invocation").

use crate::{
    ast::Statement,
    context::Context,
    environment::Environment,
    error::{RenderError, TinjaError},
    lexer::lex,
    parser::Parser,
    renderer::Renderer,
    value::Value,
};
use std::rc::Rc;
use tinja_util::ResultTraced;

pub struct Template {
    pub name: String,
    pub source: String,
    root: Statement,
    environment: Rc<Environment>,
}

impl Template {
    /// Lex then parse `src` into a `Template` bound to `environment`.
    pub fn parse(name: String, src: &str, environment: Rc<Environment>) -> Result<Self, TinjaError> {
        let tokens = lex(src).traced()?;
        let root = {
            let mut parser = Parser::new(tokens, src, &environment);
            parser.parse_template().traced()?
        };
        tracing::debug!(name, "parsed template");
        Ok(Self {
            name,
            source: src.to_string(),
            root,
            environment,
        })
    }

    pub fn environment(&self) -> &Rc<Environment> {
        &self.environment
    }

    /// Render against `context`, returning the accumulated output string.
    pub fn execute(
        &self,
        context: impl IntoIterator<Item = (String, Value)>,
    ) -> Result<String, RenderError> {
        let ctx = Context::from_map(context).inherit();
        let mut renderer = Renderer::new(Rc::clone(&self.environment), ctx);
        renderer
            .execute_statement(&self.root)
            .map_err(|e| e.in_template(self.name.clone()))
            .traced()?;
        Ok(renderer.into_output())
    }

    /// Like [Self::execute], but returns raw bytes for callers writing
    /// directly to a byte sink.
    pub fn execute_bytes(
        &self,
        context: impl IntoIterator<Item = (String, Value)>,
    ) -> Result<Vec<u8>, RenderError> {
        self.execute(context).map(String::into_bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::Config;
    use rstest::rstest;

    fn render(source: &str, context: Vec<(&str, Value)>) -> String {
        let env = Rc::new(Environment::new(Config::default()));
        let template = Template::parse("test".to_string(), source, env).unwrap();
        template
            .execute(context.into_iter().map(|(k, v)| (k.to_string(), v)))
            .unwrap()
    }

    #[rstest]
    #[case("{{ 2 + 3 * 4 ** 2 }}", "50")]
    #[case("{{ 'a' ~ 1 }}", "a1")]
    #[case("plain text", "plain text")]
    #[case("{# a comment #}after", "after")]
    fn test_scenario_rendering(#[case] source: &str, #[case] expected: &str) {
        assert_eq!(render(source, vec![]), expected);
    }

    #[test]
    fn test_short_circuit_scenario() {
        assert_eq!(
            render("{{ x or 'default' }}", vec![("x", Value::string(""))]),
            "default"
        );
        assert_eq!(
            render("{{ x or 'default' }}", vec![("x", Value::string("set"))]),
            "set"
        );
    }

    #[test]
    fn test_strict_undefined_mentions_name() {
        let env = Rc::new(Environment::new(Config {
            strict_undefined: true,
            ..Config::default()
        }));
        let template = Template::parse("test".to_string(), "{{ missing }}", env).unwrap();
        let err = template.execute(Vec::new()).unwrap_err();
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn test_string_plus_integer_is_render_error() {
        assert!(matches!(
            {
                let env = Rc::new(Environment::new(Config::default()));
                let template = Template::parse("test".to_string(), "{{ 'a' + 1 }}", env).unwrap();
                template.execute(Vec::new())
            },
            Err(_)
        ));
    }

    #[test]
    fn test_parse_error_propagates_with_location() {
        let env = Rc::new(Environment::new(Config::default()));
        let err = Template::parse("test".to_string(), "{% bogus %}", env).unwrap_err();
        assert!(matches!(err, TinjaError::Parse(_)));
    }
}

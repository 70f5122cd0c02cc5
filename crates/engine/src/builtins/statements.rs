//! `raw` and `filter`, the two statement contracts spec.md §4.6 describes by
//! example and §8 tests by scenario.

use crate::{
    ast::{Expression, FilterCall, Statement},
    callable::StatementTag,
    environment::Environment,
    error::{ParseError, RenderError},
    parser::Parser,
    renderer::Renderer,
    token::TokenKind,
    value::{VarArgs, Value},
};
use indexmap::IndexMap;
use std::rc::Rc;

pub fn register(env: &mut Environment) {
    env.register_statement("raw", Rc::new(RawTag));
    env.register_statement("filter", Rc::new(FilterTag));
}

/// Emits its body verbatim, bypassing interpretation entirely. Scans the
/// token stream for the matching `{% endraw %}` rather than recursing
/// through `parse_nodes_until`, then recovers the exact original text via
/// the tokens' character spans (lexing the body would otherwise already
/// have thrown away the whitespace inside e.g. `{{ not_a_var }}`).
struct RawTag;

impl StatementTag for RawTag {
    fn parse(&self, parser: &mut Parser, line: u32, column: u32) -> Result<Statement, ParseError> {
        parser.expect(TokenKind::BlockEnd)?;
        let body_start = parser.previous().end_char;
        let body_end = loop {
            if parser.peek().kind == TokenKind::Eof {
                return Err(parser.error("unexpected end of template, expected {% endraw %}"));
            }
            if parser.peek().kind == TokenKind::BlockStart
                && parser.peek_at(1).map(|t| t.lexeme.as_str()) == Some("endraw")
            {
                let end = parser.peek().start_char;
                parser.advance(); // BlockStart
                parser.advance(); // Name("endraw")
                parser.expect(TokenKind::BlockEnd)?;
                break end;
            }
            parser.advance();
        };
        Ok(Statement::StatementBlock {
            name: "raw".to_string(),
            args: vec![Expression::String(parser.source_slice(body_start, body_end))],
            kwargs: vec![],
            wrappers: vec![],
            line,
            column,
        })
    }

    fn execute(&self, renderer: &mut Renderer, statement: &Statement) -> Result<(), RenderError> {
        let Statement::StatementBlock { args, .. } = statement else {
            return Ok(());
        };
        if let Some(Expression::String(text)) = args.first() {
            renderer.write(text);
        }
        Ok(())
    }
}

/// Captures its body into a sub-render, then pipes the result through a
/// declared filter chain (e.g. `{% filter upper %}...{% endfilter %}`),
/// matching gonja's `builtins/statements/filter.go`.
struct FilterTag;

impl StatementTag for FilterTag {
    fn parse(&self, parser: &mut Parser, line: u32, column: u32) -> Result<Statement, ParseError> {
        let mut filters = Vec::new();
        loop {
            let name_token = parser.expect(TokenKind::Name)?;
            let (args, kwargs) = if parser.peek().kind == TokenKind::LParen {
                parser.parse_call_args()?
            } else {
                (Vec::new(), Vec::new())
            };
            filters.push(FilterCall {
                name: name_token.lexeme,
                args,
                kwargs,
                line: name_token.line,
                column: name_token.column,
            });
            if parser.peek().kind == TokenKind::Pipe {
                parser.advance();
            } else {
                break;
            }
        }
        parser.expect(TokenKind::BlockEnd)?;
        let wrapper = parser.wrap_until(&["endfilter"])?;
        Ok(Statement::StatementBlock {
            name: "filter".to_string(),
            args: vec![Expression::Filtered {
                target: Box::new(Expression::None),
                filters,
            }],
            kwargs: vec![],
            wrappers: vec![wrapper],
            line,
            column,
        })
    }

    fn execute(&self, renderer: &mut Renderer, statement: &Statement) -> Result<(), RenderError> {
        let Statement::StatementBlock { args, wrappers, .. } = statement else {
            return Ok(());
        };
        let Some(Expression::Filtered { filters, .. }) = args.first() else {
            return Err(RenderError::other("malformed filter statement"));
        };
        let captured = renderer.execute_wrapper(&wrappers[0])?;
        let mut value = Value::string(captured);
        for filter in filters {
            let filter_fn = renderer
                .environment()
                .filters
                .get(&filter.name)
                .cloned()
                .ok_or_else(|| RenderError::UnknownFilter {
                    name: filter.name.clone(),
                })?;
            let mut positional = Vec::with_capacity(filter.args.len());
            for arg in &filter.args {
                positional.push(renderer.evaluate(arg)?);
            }
            let mut keyword = IndexMap::with_capacity(filter.kwargs.len());
            for (name, arg) in &filter.kwargs {
                keyword.insert(name.clone(), renderer.evaluate(arg)?);
            }
            let varargs = VarArgs { positional, keyword };
            value = filter_fn(&value, &varargs).map_err(|e| e.in_filter(&filter.name))?;
        }
        let precision = renderer.environment().config().float_precision;
        let rendered = value.to_display_string(precision);
        renderer.write(&rendered);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::{environment::Config, template::Template};
    use std::rc::Rc;

    fn render(source: &str, context: Vec<(&str, crate::value::Value)>) -> String {
        let env = Rc::new(crate::environment::Environment::new(Config::default()));
        let template = Template::parse("test".to_string(), source, env).unwrap();
        template
            .execute(context.into_iter().map(|(k, v)| (k.to_string(), v)))
            .unwrap()
    }

    #[test]
    fn test_raw_block_emits_verbatim() {
        assert_eq!(
            render("{% raw %}{{ not_a_var }}{% endraw %}", vec![]),
            "{{ not_a_var }}"
        );
    }

    #[test]
    fn test_filter_statement_applies_chain() {
        assert_eq!(
            render(
                "{% filter upper %}hello {{ name }}{% endfilter %}",
                vec![("name", crate::value::Value::string("world"))]
            ),
            "HELLO WORLD"
        );
    }
}

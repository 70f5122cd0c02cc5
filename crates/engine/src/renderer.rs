//! AST + Context → string (spec.md §4.6). A tree-walking interpreter: no
//! bytecode, no streaming below the output buffer, matching the Non-goals in
//! spec.md §1.

use crate::{
    ast::{BinaryOp, Call, Expression, Statement, Wrapper},
    context::Context,
    environment::Environment,
    error::RenderError,
    value::{VarArgs, Value},
};
use indexmap::IndexMap;
use std::rc::Rc;
use tinja_util::ResultTraced;

/// Walks a parsed template's statements, writing into an owned output
/// buffer. `Inherit()` (spec.md §4.6) creates a child sharing the
/// environment but with its own buffer and child context; a statement like
/// `filter` uses this to capture a sub-render before post-processing it.
pub struct Renderer {
    env: Rc<Environment>,
    context: Context,
    output: String,
}

impl Renderer {
    pub fn new(env: Rc<Environment>, context: Context) -> Self {
        Self {
            env,
            context,
            output: String::new(),
        }
    }

    pub fn environment(&self) -> &Environment {
        &self.env
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn write(&mut self, text: &str) {
        self.output.push_str(text);
    }

    pub fn into_output(self) -> String {
        self.output
    }

    /// A child renderer: same environment, a child context, a fresh buffer.
    #[must_use]
    pub fn inherit(&self) -> Self {
        Self::new(Rc::clone(&self.env), self.context.inherit())
    }

    /// Render `wrapper`'s body against the current context, returning the
    /// accumulated text without disturbing this renderer's own buffer.
    pub fn execute_wrapper(&mut self, wrapper: &Wrapper) -> Result<String, RenderError> {
        let mut child = self.inherit();
        for statement in &wrapper.body {
            child.execute_statement(statement)?;
        }
        Ok(child.into_output())
    }

    pub fn execute_statement(&mut self, statement: &Statement) -> Result<(), RenderError> {
        match statement {
            Statement::Template(body) => {
                for node in body {
                    self.execute_statement(node)?;
                }
                Ok(())
            }
            Statement::Data(text) => {
                self.write(text);
                Ok(())
            }
            Statement::Comment => Ok(()),
            Statement::Output(expr) => {
                let value = propagate(self.evaluate(expr)?)?;
                let precision = self.env.config().float_precision;
                let rendered = value.to_display_string(precision);
                if self.env.config().autoescape && !value.is_safe() {
                    self.write(&escape_html(&rendered));
                } else {
                    self.write(&rendered);
                }
                Ok(())
            }
            Statement::StatementBlock { name, .. } => {
                let tag = self
                    .env
                    .statements
                    .get(name)
                    .cloned()
                    .ok_or_else(|| RenderError::UnknownStatement { name: name.clone() })
                    .traced()?;
                tag.execute(self, statement).traced()
            }
        }
    }

    pub fn evaluate(&mut self, expr: &Expression) -> Result<Value, RenderError> {
        match expr {
            Expression::None => Ok(Value::Nil),
            Expression::Bool(b) => Ok(Value::Bool(*b)),
            Expression::Integer(i) => Ok(Value::Integer(*i)),
            Expression::Float(f) => Ok(Value::Float(*f)),
            Expression::String(s) => Ok(Value::string(s.clone())),
            Expression::List(items) | Expression::Tuple(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(propagate(self.evaluate(item)?)?);
                }
                Ok(Value::List(values))
            }
            Expression::Dict(entries) => {
                let mut map = IndexMap::with_capacity(entries.len());
                for (key_expr, value_expr) in entries {
                    let key = propagate(self.evaluate(key_expr)?)?;
                    let key = match key {
                        Value::String(s, _) => s.to_string(),
                        other => other.to_display_string(self.env.config().float_precision),
                    };
                    let value = propagate(self.evaluate(value_expr)?)?;
                    map.insert(key, value);
                }
                Ok(Value::Dict(map))
            }
            Expression::Name(name) => self.lookup_name(name),
            Expression::Getattr { target, attr } => {
                let target_value = propagate(self.evaluate(target)?)?;
                match target_value.getattr(attr) {
                    Some(value) => Ok(value),
                    None => self.undefined_attribute(&target_value, attr),
                }
            }
            Expression::Getitem { target, index } => {
                let target_value = propagate(self.evaluate(target)?)?;
                let index_value = propagate(self.evaluate(index)?)?;
                match target_value.getitem(&index_value)? {
                    Some(value) => Ok(value),
                    None => {
                        let key = index_value.to_display_string(self.env.config().float_precision);
                        self.undefined_attribute(&target_value, &key)
                    }
                }
            }
            Expression::Call(call) => self.evaluate_call(call),
            Expression::Unary { negative, term } => {
                let value = propagate(self.evaluate(term)?)?;
                if *negative {
                    let precision = self.env.config().float_precision;
                    value.apply_binary(BinaryOp::Mul, &Value::Integer(-1), precision)
                } else {
                    Ok(value)
                }
            }
            Expression::Binary { left, op, right } => self.evaluate_binary(left, *op, right),
            Expression::Filtered { target, filters } => {
                let mut value = propagate(self.evaluate(target)?)?;
                for filter in filters {
                    let filter_fn = self
                        .env
                        .filters
                        .get(&filter.name)
                        .cloned()
                        .ok_or_else(|| RenderError::UnknownFilter {
                            name: filter.name.clone(),
                        })?;
                    let varargs = self.evaluate_varargs(&filter.args, &filter.kwargs)?;
                    value = filter_fn(&value, &varargs).map_err(|e| e.in_filter(&filter.name))?;
                }
                Ok(value)
            }
            Expression::Test { target, test, negated } => {
                let value = propagate(self.evaluate(target)?)?;
                let test_fn = self
                    .env
                    .tests
                    .get(&test.name)
                    .cloned()
                    .ok_or_else(|| RenderError::UnknownTest {
                        name: test.name.clone(),
                    })?;
                let varargs = self.evaluate_varargs(&test.args, &test.kwargs)?;
                let result = test_fn(&value, &varargs)?;
                Ok(Value::Bool(result != *negated))
            }
            Expression::Negation(term) => {
                let value = propagate(self.evaluate(term)?)?;
                Ok(Value::Bool(!value.is_true()))
            }
            Expression::Conditional {
                condition,
                then,
                other,
            } => {
                let cond = propagate(self.evaluate(condition)?)?;
                if cond.is_true() {
                    self.evaluate(then)
                } else {
                    self.evaluate(other)
                }
            }
            Expression::Error(message) => Ok(Value::error(RenderError::other(message.clone()))),
        }
    }

    /// `and`/`or` short-circuit at the renderer level (spec.md §4.4/§8): the
    /// right operand is never evaluated when the left side already
    /// determines the result.
    fn evaluate_binary(
        &mut self,
        left: &Expression,
        op: BinaryOp,
        right: &Expression,
    ) -> Result<Value, RenderError> {
        let left_value = propagate(self.evaluate(left)?)?;
        match op {
            BinaryOp::And if !left_value.is_true() => return Ok(left_value),
            BinaryOp::Or if left_value.is_true() => return Ok(left_value),
            _ => {}
        }
        let right_value = propagate(self.evaluate(right)?)?;
        let precision = self.env.config().float_precision;
        left_value.apply_binary(op, &right_value, precision)
    }

    fn evaluate_call(&mut self, call: &Call) -> Result<Value, RenderError> {
        let callee = propagate(self.evaluate(&call.function)?)?;
        let Value::Callable(callable) = &callee else {
            let name = match call.function.as_ref() {
                Expression::Name(name) => name.clone(),
                _ => "expression".to_string(),
            };
            return Err(RenderError::NotCallable { name }).traced();
        };
        let varargs = self.evaluate_varargs(&call.args, &call.kwargs)?;
        (callable.func)(&varargs)
    }

    fn evaluate_varargs(
        &mut self,
        args: &[Expression],
        kwargs: &[(String, Expression)],
    ) -> Result<VarArgs, RenderError> {
        let mut positional = Vec::with_capacity(args.len());
        for arg in args {
            positional.push(propagate(self.evaluate(arg)?)?);
        }
        let mut keyword = IndexMap::with_capacity(kwargs.len());
        for (name, expr) in kwargs {
            keyword.insert(name.clone(), propagate(self.evaluate(expr)?)?);
        }
        Ok(VarArgs { positional, keyword })
    }

    fn lookup_name(&self, name: &str) -> Result<Value, RenderError> {
        if let Some(value) = self.context.get(name) {
            return Ok(value);
        }
        if let Some(value) = self.env.globals.get(name) {
            return Ok(value.clone());
        }
        if self.env.config().strict_undefined {
            Err(RenderError::UndefinedName {
                name: name.to_string(),
            })
        } else {
            Ok(Value::Nil)
        }
    }

    fn undefined_attribute(&self, container: &Value, key: &str) -> Result<Value, RenderError> {
        if self.env.config().strict_undefined {
            Err(RenderError::UndefinedAttribute {
                container: container.to_display_string(self.env.config().float_precision),
                key: key.to_string(),
            })
        } else {
            Ok(Value::Nil)
        }
    }
}

/// An `Error` value reaching an evaluation step halts it, per spec.md §7's
/// "error Values poison further operations and surface at the output step".
fn propagate(value: Value) -> Result<Value, RenderError> {
    match value {
        Value::Error(e) => Err((*e).clone()),
        other => Ok(other),
    }
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ast::TestCall,
        environment::Config,
        value::Callable,
    };
    use std::cell::Cell;
    use std::rc::Rc as StdRc;

    fn renderer() -> Renderer {
        let env = Rc::new(Environment::new(Config::default()));
        Renderer::new(env, Context::new())
    }

    #[test]
    fn test_output_writes_display_string() {
        let mut r = renderer();
        r.execute_statement(&Statement::Output(Expression::Integer(5))).unwrap();
        assert_eq!(r.into_output(), "5");
    }

    #[test]
    fn test_strict_undefined_errors() {
        let mut env = Environment::new(Config {
            strict_undefined: true,
            ..Config::default()
        });
        env.set_global("present", Value::Integer(1));
        let mut r = Renderer::new(Rc::new(env), Context::new());
        assert!(r.evaluate(&Expression::Name("missing".into())).is_err());
        assert!(r.evaluate(&Expression::Name("present".into())).is_ok());
    }

    #[test]
    fn test_non_strict_undefined_is_nil() {
        let mut r = renderer();
        assert_eq!(r.evaluate(&Expression::Name("missing".into())).unwrap(), Value::Nil);
    }

    #[test]
    fn test_autoescape_escapes_unsafe_strings() {
        let env = Environment::new(Config {
            autoescape: true,
            ..Config::default()
        });
        let mut r = Renderer::new(Rc::new(env), Context::new());
        r.execute_statement(&Statement::Output(Expression::String("<b>".into())))
            .unwrap();
        assert_eq!(r.into_output(), "&lt;b&gt;");
    }

    #[test]
    fn test_short_circuit_and_skips_right_side() {
        let called = StdRc::new(Cell::new(false));
        let called_inner = StdRc::clone(&called);
        let mut env = Environment::new(Config::default());
        env.register_function(
            "mark",
            StdRc::new(move |_: &VarArgs| {
                called_inner.set(true);
                Ok(Value::Bool(true))
            }),
        );
        let function = env.functions.get("mark").unwrap().clone();
        env.set_global(
            "mark",
            Value::Callable(Callable {
                name: "mark".into(),
                func: function,
            }),
        );
        let mut r = Renderer::new(Rc::new(env), Context::new());
        let expr = Expression::Binary {
            left: Box::new(Expression::Bool(false)),
            op: BinaryOp::And,
            right: Box::new(Expression::Call(Call {
                function: Box::new(Expression::Name("mark".into())),
                args: vec![],
                kwargs: vec![],
            })),
        };
        let result = r.evaluate(&expr).unwrap();
        assert_eq!(result, Value::Bool(false));
        assert!(!called.get());
    }

    #[test]
    fn test_unknown_filter_errors() {
        let mut r = renderer();
        let expr = Expression::Filtered {
            target: Box::new(Expression::String("x".into())),
            filters: vec![crate::ast::FilterCall {
                name: "nope".into(),
                args: vec![],
                kwargs: vec![],
                line: 1,
                column: 1,
            }],
        };
        assert!(r.evaluate(&expr).is_err());
    }

    #[test]
    fn test_negative_index_is_always_error_even_non_strict() {
        let mut r = renderer();
        let expr = Expression::Getitem {
            target: Box::new(Expression::List(vec![Expression::Integer(1)])),
            index: Box::new(Expression::Integer(-1)),
        };
        assert!(r.evaluate(&expr).is_err());
    }

    #[test]
    fn test_is_test_dispatch() {
        let mut env = Environment::new(Config::default());
        env.register_test(
            "even",
            StdRc::new(|value: &Value, _: &VarArgs| Ok(value.to_integer().unwrap_or(1) % 2 == 0)),
        );
        let mut r = Renderer::new(Rc::new(env), Context::new());
        let expr = Expression::Test {
            target: Box::new(Expression::Integer(4)),
            test: TestCall {
                name: "even".into(),
                args: vec![],
                kwargs: vec![],
                line: 1,
                column: 1,
            },
            negated: false,
        };
        assert_eq!(r.evaluate(&expr).unwrap(), Value::Bool(true));
    }
}

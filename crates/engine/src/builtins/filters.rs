//! Filters: `upper`, `lower`, `default`, `length`, `join`, grounded on
//! gonja's `builtins/filters.go` and kept to the handful spec.md §8's
//! scenarios actually exercise plus the small set any rendered template
//! needs.

use crate::{
    callable::check_arity,
    environment::Environment,
    error::RenderError,
    value::{VarArgs, Value},
};
use std::rc::Rc;

/// Fixed display precision used when a filter stringifies a value outside
/// any `Environment`'s configured `float_precision` — filters only see the
/// receiver and its arguments, not the environment. Matches the engine's
/// own pre-§9 default.
const DEFAULT_PRECISION: usize = 6;

pub fn register(env: &mut Environment) {
    env.register_filter("upper", Rc::new(upper));
    env.register_filter("lower", Rc::new(lower));
    env.register_filter("default", Rc::new(default));
    env.register_filter("length", Rc::new(length));
    env.register_filter("join", Rc::new(join));
}

fn upper(value: &Value, args: &VarArgs) -> Result<Value, RenderError> {
    check_arity("upper", args, 0, 0)?;
    Ok(Value::string(
        value.to_display_string(DEFAULT_PRECISION).to_uppercase(),
    ))
}

fn lower(value: &Value, args: &VarArgs) -> Result<Value, RenderError> {
    check_arity("lower", args, 0, 0)?;
    Ok(Value::string(
        value.to_display_string(DEFAULT_PRECISION).to_lowercase(),
    ))
}

/// `value | default(fallback, boolean=false)`: substitutes `fallback` when
/// `value` is nil, or (with `boolean=true`) whenever `value` is falsy.
fn default(value: &Value, args: &VarArgs) -> Result<Value, RenderError> {
    check_arity("default", args, 0, 1)?;
    let fallback = args.get(0).cloned().unwrap_or(Value::Nil);
    let treat_falsy_as_missing = args.get_kw("boolean").is_some_and(Value::is_true);
    if value.is_nil() || (treat_falsy_as_missing && !value.is_true()) {
        Ok(fallback)
    } else {
        Ok(value.clone())
    }
}

fn length(value: &Value, args: &VarArgs) -> Result<Value, RenderError> {
    check_arity("length", args, 0, 0)?;
    match value.len() {
        Some(len) => Ok(Value::Integer(len as i64)),
        None => Err(RenderError::other(format!(
            "{} has no length",
            value.to_display_string(DEFAULT_PRECISION)
        ))),
    }
}

fn join(value: &Value, args: &VarArgs) -> Result<Value, RenderError> {
    check_arity("join", args, 0, 1)?;
    let Value::List(items) = value else {
        return Err(RenderError::other(format!(
            "join expects a list, got {}",
            value.to_display_string(DEFAULT_PRECISION)
        )));
    };
    let separator = match args.get(0) {
        Some(Value::String(s, _)) => s.to_string(),
        Some(other) => other.to_display_string(DEFAULT_PRECISION),
        None => String::new(),
    };
    let rendered = items
        .iter()
        .map(|item| item.to_display_string(DEFAULT_PRECISION))
        .collect::<Vec<_>>()
        .join(&separator);
    Ok(Value::string(rendered))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upper_and_lower() {
        assert_eq!(
            upper(&Value::string("hello"), &VarArgs::default()).unwrap(),
            Value::string("HELLO")
        );
        assert_eq!(
            lower(&Value::string("HELLO"), &VarArgs::default()).unwrap(),
            Value::string("hello")
        );
    }

    #[test]
    fn test_default_substitutes_nil() {
        let args = VarArgs {
            positional: vec![Value::string("fallback")],
            ..Default::default()
        };
        assert_eq!(default(&Value::Nil, &args).unwrap(), Value::string("fallback"));
        assert_eq!(
            default(&Value::string("set"), &args).unwrap(),
            Value::string("set")
        );
    }

    #[test]
    fn test_default_boolean_also_substitutes_falsy() {
        let mut args = VarArgs {
            positional: vec![Value::string("fallback")],
            ..Default::default()
        };
        args.keyword.insert("boolean".to_string(), Value::Bool(true));
        assert_eq!(
            default(&Value::string(""), &args).unwrap(),
            Value::string("fallback")
        );
    }

    #[test]
    fn test_length_of_list_and_string() {
        assert_eq!(
            length(
                &Value::List(vec![Value::Integer(1), Value::Integer(2)]),
                &VarArgs::default()
            )
            .unwrap(),
            Value::Integer(2)
        );
        assert_eq!(
            length(&Value::string("abc"), &VarArgs::default()).unwrap(),
            Value::Integer(3)
        );
    }

    #[test]
    fn test_join_with_separator() {
        let list = Value::List(vec![Value::Integer(1), Value::Integer(2), Value::Integer(3)]);
        let args = VarArgs {
            positional: vec![Value::string(", ")],
            ..Default::default()
        };
        assert_eq!(join(&list, &args).unwrap(), Value::string("1, 2, 3"));
    }
}

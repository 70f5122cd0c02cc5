//! Functions available as plain names in a template's context: `range`,
//! grounded on gonja's `builtins/globals.go`.

use crate::{
    environment::Environment,
    error::RenderError,
    value::{Callable, VarArgs, Value},
};
use std::rc::Rc;

pub fn register(env: &mut Environment) {
    let func: Rc<dyn Fn(&VarArgs) -> Result<Value, RenderError>> = Rc::new(range);
    env.register_function("range", Rc::clone(&func));
    env.set_global(
        "range",
        Value::Callable(Callable {
            name: "range".into(),
            func,
        }),
    );
}

/// `range(stop)`, `range(start, stop)`, or `range(start, stop, step)`,
/// matching Python/Jinja's `range` semantics.
fn range(args: &VarArgs) -> Result<Value, RenderError> {
    let ints: Vec<i64> = args
        .positional
        .iter()
        .map(|v| v.to_integer().ok_or_else(|| RenderError::other("range expects integers")))
        .collect::<Result<_, _>>()?;
    let (start, stop, step) = match ints.as_slice() {
        [stop] => (0, *stop, 1),
        [start, stop] => (*start, *stop, 1),
        [start, stop, step] => (*start, *stop, *step),
        _ => {
            return Err(RenderError::Arity {
                name: "range".to_string(),
                expected: "1-3".to_string(),
                actual: ints.len(),
            })
        }
    };
    if step == 0 {
        return Err(RenderError::other("range() step must not be zero"));
    }
    let mut values = Vec::new();
    let mut i = start;
    while (step > 0 && i < stop) || (step < 0 && i > stop) {
        values.push(Value::Integer(i));
        i += step;
    }
    Ok(Value::List(values))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_single_arg() {
        let args = VarArgs {
            positional: vec![Value::Integer(3)],
            ..Default::default()
        };
        assert_eq!(
            range(&args).unwrap(),
            Value::List(vec![Value::Integer(0), Value::Integer(1), Value::Integer(2)])
        );
    }

    #[test]
    fn test_range_start_stop_step() {
        let args = VarArgs {
            positional: vec![Value::Integer(10), Value::Integer(0), Value::Integer(-2)],
            ..Default::default()
        };
        assert_eq!(
            range(&args).unwrap(),
            Value::List(vec![
                Value::Integer(10),
                Value::Integer(8),
                Value::Integer(6),
                Value::Integer(4),
                Value::Integer(2),
            ])
        );
    }
}

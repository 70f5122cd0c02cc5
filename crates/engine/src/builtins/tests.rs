//! Tests: `defined`, `even`, `odd`, grounded on gonja's `builtins/tests.go`.

use crate::{environment::Environment, error::RenderError, value::{VarArgs, Value}};
use std::rc::Rc;

pub fn register(env: &mut Environment) {
    env.register_test("defined", Rc::new(defined));
    env.register_test("even", Rc::new(even));
    env.register_test("odd", Rc::new(odd));
}

fn defined(value: &Value, _args: &VarArgs) -> Result<bool, RenderError> {
    Ok(!value.is_nil())
}

fn even(value: &Value, _args: &VarArgs) -> Result<bool, RenderError> {
    let n = value
        .to_integer()
        .ok_or_else(|| RenderError::other("even expects a number"))?;
    Ok(n % 2 == 0)
}

fn odd(value: &Value, _args: &VarArgs) -> Result<bool, RenderError> {
    Ok(!even(value, _args)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defined() {
        assert!(!defined(&Value::Nil, &VarArgs::default()).unwrap());
        assert!(defined(&Value::Integer(0), &VarArgs::default()).unwrap());
    }

    #[test]
    fn test_even_odd() {
        assert!(even(&Value::Integer(4), &VarArgs::default()).unwrap());
        assert!(odd(&Value::Integer(3), &VarArgs::default()).unwrap());
        assert!(!even(&Value::Integer(3), &VarArgs::default()).unwrap());
    }
}

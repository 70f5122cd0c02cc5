//! The runtime value representation every expression evaluates to, and the
//! uniform operations (arithmetic, truthiness, attribute/item access,
//! equality, iteration) the evaluator drives through it.
//!
//! Binary-operator coercion rules are a direct port of gonja's
//! `evalBinaryExpression` (see `exec/evaluate.go`), with two deliberate
//! deviations recorded in DESIGN.md: floor division rounds toward negative
//! infinity rather than truncating, and list indexing does not accept
//! negative indices.

use crate::{ast::BinaryOp, error::RenderError};
use indexmap::IndexMap;
use std::{fmt, rc::Rc};

/// The narrow adapter a user implements to bridge an arbitrary host type into
/// the value layer, per the Design Notes' "host-value bridge" (spec.md §9).
pub trait HostValue: fmt::Debug {
    /// Look up a field or zero-argument method by name.
    fn get_attr(&self, name: &str) -> Option<Value>;

    /// A human-readable type name, used in error messages and `{{ }}`
    /// fallback string rendering.
    fn type_name(&self) -> &'static str {
        "object"
    }
}

/// A callable Value: either a user filter/test/function registered by name,
/// or a value produced by evaluating a template-level callable expression.
/// Equality compares only by name, since comparing closures is meaningless;
/// this mirrors how Jinja treats functions as opaque, unordered values.
#[derive(Clone)]
pub struct Callable {
    pub name: Rc<str>,
    pub func: Rc<dyn Fn(&VarArgs) -> Result<Value, RenderError>>,
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<callable {}>", self.name)
    }
}

impl PartialEq for Callable {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

/// Positional and keyword arguments bundled for a varargs-form callable
/// (spec.md §4.5).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct VarArgs {
    pub positional: Vec<Value>,
    pub keyword: IndexMap<String, Value>,
}

impl VarArgs {
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.positional.get(index)
    }

    pub fn get_kw(&self, name: &str) -> Option<&Value> {
        self.keyword.get(name)
    }
}

/// The tagged union every expression evaluates to.
#[derive(Clone, Debug, Default)]
pub enum Value {
    #[default]
    Nil,
    Bool(bool),
    Integer(i64),
    UInteger(u64),
    Float(f64),
    /// A string value. The second field is the `safe` attribute: when true,
    /// autoescape skips this value (spec.md §4.6).
    String(Rc<str>, bool),
    List(Vec<Value>),
    Dict(IndexMap<String, Value>),
    /// A two-element key/value pair, produced when iterating a `Dict`.
    Pair(Box<Value>, Box<Value>),
    Callable(Callable),
    /// An opaque reference to a user-supplied type with reflective access.
    Host(Rc<dyn HostValue>),
    /// A propagated error. Poisons any further operation it participates in.
    Error(Rc<RenderError>),
}

impl Value {
    pub fn string(s: impl Into<Rc<str>>) -> Self {
        Self::String(s.into(), false)
    }

    pub fn safe_string(s: impl Into<Rc<str>>) -> Self {
        Self::String(s.into(), true)
    }

    pub fn error(err: RenderError) -> Self {
        Self::Error(Rc::new(err))
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Self::Nil)
    }

    pub fn is_bool(&self) -> bool {
        matches!(self, Self::Bool(_))
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, Self::Integer(_) | Self::UInteger(_))
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Self::Float(_))
    }

    pub fn is_number(&self) -> bool {
        self.is_integer() || self.is_float()
    }

    pub fn is_string(&self) -> bool {
        matches!(self, Self::String(..))
    }

    pub fn is_list(&self) -> bool {
        matches!(self, Self::List(_))
    }

    pub fn is_dict(&self) -> bool {
        matches!(self, Self::Dict(_))
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, Self::Callable(_))
    }

    pub fn is_iterable(&self) -> bool {
        matches!(self, Self::List(_) | Self::Dict(_) | Self::String(..))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    /// Whether this value is marked HTML-safe.
    pub fn is_safe(&self) -> bool {
        matches!(self, Self::String(_, true))
    }

    /// Truthiness per spec.md §4.4: numbers truthy iff nonzero, strings and
    /// containers truthy iff nonempty, nil and error always falsy.
    pub fn is_true(&self) -> bool {
        match self {
            Self::Nil | Self::Error(_) => false,
            Self::Bool(b) => *b,
            Self::Integer(i) => *i != 0,
            Self::UInteger(i) => *i != 0,
            Self::Float(f) => *f != 0.0,
            Self::String(s, _) => !s.is_empty(),
            Self::List(items) => !items.is_empty(),
            Self::Dict(map) => !map.is_empty(),
            Self::Pair(..) | Self::Callable(_) | Self::Host(_) => true,
        }
    }

    /// String rendering: `True`/`False` for booleans, fixed-precision for
    /// floats, empty for nil, per spec.md §4.4.
    pub fn to_display_string(&self, float_precision: usize) -> String {
        match self {
            Self::Nil => String::new(),
            Self::Bool(true) => "True".to_string(),
            Self::Bool(false) => "False".to_string(),
            Self::Integer(i) => i.to_string(),
            Self::UInteger(i) => i.to_string(),
            Self::Float(f) => format!("{f:.float_precision$}"),
            Self::String(s, _) => s.to_string(),
            Self::List(items) => format!(
                "[{}]",
                items
                    .iter()
                    .map(|v| v.to_debug_string(float_precision))
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            Self::Dict(map) => format!(
                "{{{}}}",
                map.iter()
                    .map(|(k, v)| format!("{k:?}: {}", v.to_debug_string(float_precision)))
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            Self::Pair(k, v) => format!(
                "({}, {})",
                k.to_display_string(float_precision),
                v.to_display_string(float_precision)
            ),
            Self::Callable(c) => format!("<callable {}>", c.name),
            Self::Host(h) => format!("<{}>", h.type_name()),
            Self::Error(e) => e.to_string(),
        }
    }

    /// Rendering of a value nested inside a list/dict display, where strings
    /// get quoted.
    fn to_debug_string(&self, float_precision: usize) -> String {
        if let Self::String(s, _) = self {
            format!("{s:?}")
        } else {
            self.to_display_string(float_precision)
        }
    }

    /// Lossy numeric coercion to an integer.
    pub fn to_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            Self::UInteger(i) => i64::try_from(*i).ok(),
            Self::Float(f) => Some(*f as i64),
            Self::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    /// Lossy numeric coercion to a float.
    pub fn to_float(&self) -> Option<f64> {
        match self {
            Self::Integer(i) => Some(*i as f64),
            Self::UInteger(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            Self::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    /// `Contains(other)`, used by `in`.
    pub fn contains(&self, other: &Value) -> bool {
        match self {
            Self::List(items) => items.iter().any(|item| item.equal_to(other)),
            Self::Dict(map) => {
                matches!(other, Self::String(s, _) if map.contains_key(s.as_ref()))
            }
            Self::String(s, _) => {
                matches!(other, Self::String(sub, _) if s.contains(sub.as_ref()))
            }
            _ => false,
        }
    }

    /// `Len()`.
    pub fn len(&self) -> Option<usize> {
        match self {
            Self::List(items) => Some(items.len()),
            Self::Dict(map) => Some(map.len()),
            Self::String(s, _) => Some(s.chars().count()),
            _ => None,
        }
    }

    /// Iterate this value's elements as key/value pairs: lists yield
    /// `(index, value)`, dicts yield `(key, value)`, strings yield
    /// `(index, char)`.
    pub fn iter_pairs(&self) -> Vec<(Value, Value)> {
        match self {
            Self::List(items) => items
                .iter()
                .enumerate()
                .map(|(i, v)| (Value::Integer(i as i64), v.clone()))
                .collect(),
            Self::Dict(map) => map
                .iter()
                .map(|(k, v)| (Value::string(k.clone()), v.clone()))
                .collect(),
            Self::String(s, _) => s
                .chars()
                .enumerate()
                .map(|(i, c)| (Value::Integer(i as i64), Value::string(c.to_string())))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// `Getattr(name)`: native attribute table first (dict keys, host-bridge
    /// reflective lookup), falling back to `Getitem(name)` so dot-access into
    /// a dict works (spec.md §4.4).
    pub fn getattr(&self, name: &str) -> Option<Value> {
        match self {
            Self::Host(host) => host.get_attr(name),
            Self::Dict(map) => map.get(name).cloned(),
            _ => self.getitem(&Value::string(name.to_string())).ok().flatten(),
        }
    }

    /// `Getitem(key)`: lists indexed by non-negative integer, dicts indexed
    /// by string key. Returns `Ok(None)` for "not found", and `Err` for an
    /// out-of-range integer index, which is unconditionally an error per
    /// spec.md §4.4/§8 regardless of strict mode.
    pub fn getitem(&self, key: &Value) -> Result<Option<Value>, RenderError> {
        match (self, key) {
            (Self::List(items), Self::Integer(_) | Self::UInteger(_)) => {
                let i = key.to_integer().unwrap_or_default();
                if i < 0 {
                    return Err(RenderError::IndexOutOfRange { index: i });
                }
                match items.get(i as usize) {
                    Some(v) => Ok(Some(v.clone())),
                    None => Err(RenderError::IndexOutOfRange { index: i }),
                }
            }
            (Self::Dict(map), Self::String(s, _)) => Ok(map.get(s.as_ref()).cloned()),
            (Self::String(s, _), Self::Integer(_) | Self::UInteger(_)) => {
                let i = key.to_integer().unwrap_or_default();
                if i < 0 {
                    return Err(RenderError::IndexOutOfRange { index: i });
                }
                match s.chars().nth(i as usize) {
                    Some(c) => Ok(Some(Value::string(c.to_string()))),
                    None => Err(RenderError::IndexOutOfRange { index: i }),
                }
            }
            _ => Ok(None),
        }
    }

    /// Structural equality, recursing through containers (spec.md §4.4).
    /// Numeric values compare across integer/float representations so
    /// `1 == 1.0`.
    pub fn equal_to(&self, other: &Value) -> bool {
        match (self, other) {
            (Self::Nil, Self::Nil) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (a, b) if a.is_number() && b.is_number() => {
                // Compare as float unless both are exact integers, to avoid
                // lossy-cast surprises for large integers compared to each
                // other.
                match (a, b) {
                    (Self::Integer(x), Self::Integer(y)) => x == y,
                    (Self::UInteger(x), Self::UInteger(y)) => x == y,
                    _ => a.to_float() == b.to_float(),
                }
            }
            (Self::String(a, _), Self::String(b, _)) => a == b,
            (Self::List(a), Self::List(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.equal_to(y))
            }
            (Self::Dict(a), Self::Dict(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .all(|(k, v)| b.get(k).is_some_and(|bv| v.equal_to(bv)))
            }
            (Self::Pair(ak, av), Self::Pair(bk, bv)) => ak.equal_to(bk) && av.equal_to(bv),
            _ => false,
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            Self::Nil => "nil",
            Self::Bool(_) => "bool",
            Self::Integer(_) | Self::UInteger(_) => "integer",
            Self::Float(_) => "float",
            Self::String(..) => "string",
            Self::List(_) => "list",
            Self::Dict(_) => "dict",
            Self::Pair(..) => "pair",
            Self::Callable(_) => "callable",
            Self::Host(h) => h.type_name(),
            Self::Error(_) => "error",
        }
    }

    /// Apply a binary operator to `self` (left) and `right`, per the
    /// coercion table in spec.md §4.4. `precision` is the configured
    /// float-display precision (spec.md §9), used when `~` stringifies a
    /// float operand — the same precision the renderer applies to `Output`.
    pub fn apply_binary(&self, op: BinaryOp, right: &Value, precision: usize) -> Result<Value, RenderError> {
        use BinaryOp as Op;
        // Error values poison any expression they participate in.
        if let Self::Error(e) = self {
            return Err((**e).clone());
        }
        if let Self::Error(e) = right {
            return Err((**e).clone());
        }
        match op {
            Op::Eq => return Ok(Value::Bool(self.equal_to(right))),
            Op::Ne => return Ok(Value::Bool(!self.equal_to(right))),
            Op::In => return Ok(Value::Bool(right.contains(self))),
            Op::Concat => {
                let a = self.to_display_string(precision);
                let b = right.to_display_string(precision);
                return Ok(Value::string(format!("{a}{b}")));
            }
            _ => {}
        }

        let mismatch = || RenderError::TypeMismatch {
            op: op.to_string(),
            left: self.type_name().to_string(),
            right: right.type_name().to_string(),
        };

        match op {
            Op::And => {
                return Ok(if !self.is_true() {
                    self.clone()
                } else {
                    right.clone()
                });
            }
            Op::Or => {
                return Ok(if self.is_true() {
                    self.clone()
                } else {
                    right.clone()
                });
            }
            _ => {}
        }

        if matches!(op, Op::Add) {
            if let (Self::List(a), Self::List(b)) = (self, right) {
                let mut out = a.clone();
                out.extend(b.clone());
                return Ok(Value::List(out));
            }
        }
        if matches!(op, Op::Mul) {
            if let (Self::String(s, _), other) | (other, Self::String(s, _)) = (self, right) {
                if !matches!(other, Self::String(..)) {
                    if let Some(n) = other.to_integer() {
                        let n = n.max(0) as usize;
                        return Ok(Value::string(s.repeat(n)));
                    }
                }
            }
        }

        if matches!(op, Op::Lt | Op::Le | Op::Gt | Op::Ge) {
            let (Some(a), Some(b)) = (self.to_float(), right.to_float()) else {
                return Err(mismatch());
            };
            let result = match op {
                Op::Lt => a < b,
                Op::Le => a <= b,
                Op::Gt => a > b,
                Op::Ge => a >= b,
                _ => unreachable!(),
            };
            return Ok(Value::Bool(result));
        }

        if !self.is_number() || !right.is_number() {
            return Err(mismatch());
        }

        let use_float = self.is_float() || right.is_float();
        match op {
            Op::Add | Op::Sub | Op::Mul if use_float => {
                let a = self.to_float().unwrap();
                let b = right.to_float().unwrap();
                let result = match op {
                    Op::Add => a + b,
                    Op::Sub => a - b,
                    Op::Mul => a * b,
                    _ => unreachable!(),
                };
                Ok(Value::Float(result))
            }
            Op::Add | Op::Sub | Op::Mul => {
                let a = self.to_integer().unwrap();
                let b = right.to_integer().unwrap();
                let result = match op {
                    Op::Add => a.wrapping_add(b),
                    Op::Sub => a.wrapping_sub(b),
                    Op::Mul => a.wrapping_mul(b),
                    _ => unreachable!(),
                };
                Ok(Value::Integer(result))
            }
            Op::Div => {
                let a = self.to_float().unwrap();
                let b = right.to_float().unwrap();
                if b == 0.0 {
                    return Err(RenderError::DivisionByZero);
                }
                Ok(Value::Float(a / b))
            }
            Op::FloorDiv => {
                let a = self.to_float().unwrap();
                let b = right.to_float().unwrap();
                if b == 0.0 {
                    return Err(RenderError::DivisionByZero);
                }
                Ok(Value::Integer(floor_div(a, b)))
            }
            Op::Mod => {
                // Modulo is defined only on integers; a float operand errors,
                // per spec.md §8's boundary case.
                if self.is_float() || right.is_float() {
                    return Err(mismatch());
                }
                let a = self.to_integer().unwrap();
                let b = right.to_integer().unwrap();
                if b == 0 {
                    return Err(RenderError::DivisionByZero);
                }
                Ok(Value::Integer(a.rem_euclid(b)))
            }
            Op::Pow => {
                if !use_float {
                    let base = self.to_integer().unwrap();
                    let exp = right.to_integer().unwrap();
                    if let Ok(exp) = u32::try_from(exp) {
                        return Ok(Value::Integer(base.wrapping_pow(exp)));
                    }
                }
                let a = self.to_float().unwrap();
                let b = right.to_float().unwrap();
                Ok(Value::Float(a.powf(b)))
            }
            _ => Err(mismatch()),
        }
    }
}

/// Floor-toward-negative-infinity division, per the Open Question in
/// spec.md §9 resolved toward the Jinja-spec convention rather than gonja's
/// truncation.
fn floor_div(a: f64, b: f64) -> i64 {
    (a / b).floor() as i64
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.equal_to(other)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::string(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::string(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::integer_precedence(Value::Integer(2), BinaryOp::Add, Value::Integer(3), Value::Integer(5))]
    #[case::floor_div_positive(Value::Integer(7), BinaryOp::FloorDiv, Value::Integer(2), Value::Integer(3))]
    #[case::floor_div_negative(Value::Integer(-7), BinaryOp::FloorDiv, Value::Integer(2), Value::Integer(-4))]
    #[case::true_div_is_float(Value::Integer(7), BinaryOp::Div, Value::Integer(2), Value::Float(3.5))]
    #[case::string_repeat(Value::string("ab"), BinaryOp::Mul, Value::Integer(3), Value::string("ababab"))]
    #[case::list_concat(
        Value::List(vec![Value::Integer(1)]),
        BinaryOp::Add,
        Value::List(vec![Value::Integer(2)]),
        Value::List(vec![Value::Integer(1), Value::Integer(2)])
    )]
    fn test_apply_binary(
        #[case] left: Value,
        #[case] op: BinaryOp,
        #[case] right: Value,
        #[case] expected: Value,
    ) {
        assert_eq!(left.apply_binary(op, &right, 6).unwrap(), expected);
    }

    #[test]
    fn test_string_plus_integer_is_error() {
        let result = Value::string("a").apply_binary(BinaryOp::Add, &Value::Integer(1), 6);
        assert!(result.is_err());
    }

    #[test]
    fn test_mod_on_float_is_error() {
        let result = Value::Float(1.5).apply_binary(BinaryOp::Mod, &Value::Integer(1), 6);
        assert!(result.is_err());
    }

    #[test]
    fn test_concat_stringifies_both_sides() {
        let result = Value::string("a").apply_binary(BinaryOp::Concat, &Value::Integer(1), 6);
        assert_eq!(result.unwrap(), Value::string("a1"));
    }

    #[test]
    fn test_pow_stays_integer_for_integer_operands() {
        let result = Value::Integer(4).apply_binary(BinaryOp::Pow, &Value::Integer(2), 6);
        assert_eq!(result.unwrap(), Value::Integer(16));
    }

    #[test]
    fn test_pow_is_float_when_either_operand_is_float() {
        let result = Value::Integer(4).apply_binary(BinaryOp::Pow, &Value::Float(0.5), 6);
        assert_eq!(result.unwrap(), Value::Float(2.0));
    }

    #[test]
    fn test_negative_list_index_is_out_of_range() {
        let list = Value::List(vec![Value::Integer(1), Value::Integer(2)]);
        assert!(list.getitem(&Value::Integer(-1)).is_err());
    }

    #[rstest]
    #[case(Value::Nil, false)]
    #[case(Value::Bool(false), false)]
    #[case(Value::Integer(0), false)]
    #[case(Value::Float(0.0), false)]
    #[case(Value::string(""), false)]
    #[case(Value::List(vec![]), false)]
    #[case(Value::Dict(IndexMap::new()), false)]
    #[case(Value::string("x"), true)]
    #[case(Value::Integer(1), true)]
    fn test_truthiness(#[case] value: Value, #[case] expected: bool) {
        assert_eq!(value.is_true(), expected);
    }

    #[test]
    fn test_structural_equality() {
        let a = Value::Dict(IndexMap::from([
            ("a".to_string(), Value::Integer(1)),
            ("b".to_string(), Value::Integer(2)),
        ]));
        let b = Value::Dict(IndexMap::from([
            ("b".to_string(), Value::Integer(2)),
            ("a".to_string(), Value::Integer(1)),
        ]));
        assert_eq!(a, b);
        assert_eq!(Value::Integer(1), Value::Float(1.0));
    }
}

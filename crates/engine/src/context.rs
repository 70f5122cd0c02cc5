//! The scoped name→value chain consulted during evaluation.
//!
//! Modeled as a vector of frames rather than a linked list of heap nodes,
//! per the Design Notes (spec.md §9). Each frame is reference-counted so
//! `inherit()` is O(depth) rather than O(total bindings): the child shares
//! every existing frame with its parent and only allocates one new frame of
//! its own, which is exactly the frame `set`/`update` ever write to — so
//! writes made through the child are invisible to the parent, matching the
//! context-inheritance invariant in spec.md §8.

use crate::value::Value;
use std::{cell::RefCell, collections::HashMap, rc::Rc};

type Frame = Rc<RefCell<HashMap<String, Value>>>;

#[derive(Clone, Debug)]
pub struct Context {
    frames: Vec<Frame>,
}

impl Context {
    /// A fresh root context holding only globals, with nothing bound yet.
    pub fn new() -> Self {
        Self {
            frames: vec![Rc::new(RefCell::new(HashMap::new()))],
        }
    }

    /// Build a root context pre-populated with the given bindings, e.g. the
    /// caller-supplied map passed to `Template::execute`.
    pub fn from_map(values: impl IntoIterator<Item = (String, Value)>) -> Self {
        let ctx = Self::new();
        ctx.update(values);
        ctx
    }

    /// Create a child scope sharing all of this context's frames, plus one
    /// new empty frame that the child's own writes land in. Every
    /// block/for/macro statement execution creates a further child.
    #[must_use]
    pub fn inherit(&self) -> Self {
        let mut frames = self.frames.clone();
        frames.push(Rc::new(RefCell::new(HashMap::new())));
        Self { frames }
    }

    /// Walk frames from innermost to outermost, returning the first match.
    pub fn get(&self, name: &str) -> Option<Value> {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| frame.borrow().get(name).cloned())
    }

    pub fn has(&self, name: &str) -> bool {
        self.frames.iter().any(|frame| frame.borrow().contains_key(name))
    }

    /// Write only to the local (innermost) frame.
    pub fn set(&self, name: impl Into<String>, value: Value) {
        self.local_frame().borrow_mut().insert(name.into(), value);
    }

    /// Bulk-merge bindings into the local frame.
    pub fn update(&self, values: impl IntoIterator<Item = (String, Value)>) {
        let mut frame = self.local_frame().borrow_mut();
        for (name, value) in values {
            frame.insert(name, value);
        }
    }

    fn local_frame(&self) -> &Frame {
        self.frames.last().expect("context always has at least one frame")
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_child_sees_parent_bindings() {
        let parent = Context::new();
        parent.set("x", Value::Integer(1));
        let child = parent.inherit();
        assert_eq!(child.get("x"), Some(Value::Integer(1)));
    }

    #[test]
    fn test_child_writes_do_not_affect_parent() {
        let parent = Context::new();
        parent.set("x", Value::Integer(1));
        let child = parent.inherit();
        child.set("x", Value::Integer(2));
        child.set("y", Value::Integer(3));
        assert_eq!(parent.get("x"), Some(Value::Integer(1)));
        assert_eq!(parent.get("y"), None);
        assert_eq!(child.get("x"), Some(Value::Integer(2)));
    }

    #[test]
    fn test_missing_name_is_none() {
        let ctx = Context::new();
        assert_eq!(ctx.get("nope"), None);
        assert!(!ctx.has("nope"));
    }

    #[test]
    fn test_update_bulk_merges() {
        let ctx = Context::from_map([
            ("a".to_string(), Value::Integer(1)),
            ("b".to_string(), Value::Integer(2)),
        ]);
        assert_eq!(ctx.get("a"), Some(Value::Integer(1)));
        assert_eq!(ctx.get("b"), Some(Value::Integer(2)));
    }
}

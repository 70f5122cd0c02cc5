//! The parsed representation of a template: two tagged-union node families,
//! [Expression] and [Statement], plus a depth-first [Visitor].

use std::fmt;

/// A binary operator, shared by arithmetic, comparison, and membership
/// expressions.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Pow,
    Concat,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    In,
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::FloorDiv => "//",
            Self::Mod => "%",
            Self::Pow => "**",
            Self::Concat => "~",
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::And => "and",
            Self::Or => "or",
            Self::In => "in",
        };
        write!(f, "{s}")
    }
}

/// A named filter application: `value | name(args, kw=value)`.
#[derive(Clone, Debug, PartialEq)]
pub struct FilterCall {
    pub name: String,
    pub args: Vec<Expression>,
    pub kwargs: Vec<(String, Expression)>,
    pub line: u32,
    pub column: u32,
}

/// A named test application: `value is [not] name(args)`.
#[derive(Clone, Debug, PartialEq)]
pub struct TestCall {
    pub name: String,
    pub args: Vec<Expression>,
    pub kwargs: Vec<(String, Expression)>,
    pub line: u32,
    pub column: u32,
}

/// A function/macro call: `name(args, kw=value)`, or the invocation at the
/// end of a postfix chain such as `obj.method(args)`.
#[derive(Clone, Debug, PartialEq)]
pub struct Call {
    pub function: Box<Expression>,
    pub args: Vec<Expression>,
    pub kwargs: Vec<(String, Expression)>,
}

/// The expression AST. One variant per construct in the grammar; see
/// `parser.rs` for the precedence that builds these.
#[derive(Clone, Debug, PartialEq)]
pub enum Expression {
    None,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    List(Vec<Expression>),
    Tuple(Vec<Expression>),
    Dict(Vec<(Expression, Expression)>),
    Name(String),
    /// `target.attr` or `target.NNN` (numeric attribute = tuple index)
    Getattr {
        target: Box<Expression>,
        attr: String,
    },
    /// `target[index]`
    Getitem {
        target: Box<Expression>,
        index: Box<Expression>,
    },
    Call(Call),
    /// Prefix `+`/`-`; `negative` reflects whether the operator was `-`
    Unary { negative: bool, term: Box<Expression> },
    Binary {
        left: Box<Expression>,
        op: BinaryOp,
        right: Box<Expression>,
    },
    /// `target | filter1 | filter2 | ...`
    Filtered {
        target: Box<Expression>,
        filters: Vec<FilterCall>,
    },
    /// `target is [not] test(args)`
    Test {
        target: Box<Expression>,
        test: TestCall,
        negated: bool,
    },
    /// Logical `not expr`
    Negation(Box<Expression>),
    /// `then if cond else other` — right-associative ternary
    Conditional {
        condition: Box<Expression>,
        then: Box<Expression>,
        other: Box<Expression>,
    },
    /// A parse-time error recorded in place rather than aborting the whole
    /// tree; used for error-recovery contexts. The core parser never
    /// produces these itself today, but the variant is part of the public
    /// AST shape so statement plugins can synthesize one.
    Error(String),
}

/// A nested body between a tag and its matching end tag, e.g. the body of
/// `{% if %}...{% endif %}`.
#[derive(Clone, Debug, PartialEq)]
pub struct Wrapper {
    pub body: Vec<Statement>,
    /// Which end tag actually terminated this wrapper (relevant when a tag
    /// has multiple valid terminators, e.g. `if`/`elif`/`else`/`endif`)
    pub end_tag: String,
}

/// The statement AST.
#[derive(Clone, Debug, PartialEq)]
pub enum Statement {
    /// The root of a parsed template: a sequence of nodes in source order
    Template(Vec<Statement>),
    /// A literal `Text` token, written verbatim
    Data(String),
    /// `{{ expr }}`
    Output(Expression),
    /// `{# ... #}`, contributes nothing to output
    Comment,
    /// A registered tag's parsed form: the tag name, its parsed argument
    /// expressions, and any nested wrapper(s) it collected via `WrapUntil`.
    StatementBlock {
        name: String,
        args: Vec<Expression>,
        kwargs: Vec<(String, Expression)>,
        wrappers: Vec<Wrapper>,
        line: u32,
        column: u32,
    },
}

/// A depth-first tree walk. `visit` is called for every node; returning
/// `true` descends into children, `false` skips the subtree. Only
/// `Template` and `Wrapper` bodies recurse generically — all other nodes are
/// leaves as far as the walk is concerned, matching the shape of the
/// grammar (expressions nested inside a `StatementBlock`'s args are not
/// walked by default, since statement plugins own their own argument
/// shapes).
pub trait Visitor {
    fn visit_statement(&mut self, statement: &Statement) -> bool {
        let _ = statement;
        true
    }

    fn visit_expression(&mut self, expression: &Expression) -> bool {
        let _ = expression;
        true
    }
}

/// Run `visitor` depth-first over `root`.
pub fn walk_statement(visitor: &mut impl Visitor, root: &Statement) {
    if !visitor.visit_statement(root) {
        return;
    }
    match root {
        Statement::Template(body) => {
            for node in body {
                walk_statement(visitor, node);
            }
        }
        Statement::Output(expr) => walk_expression(visitor, expr),
        Statement::StatementBlock {
            args,
            kwargs,
            wrappers,
            ..
        } => {
            for expr in args {
                walk_expression(visitor, expr);
            }
            for (_, expr) in kwargs {
                walk_expression(visitor, expr);
            }
            for wrapper in wrappers {
                for node in &wrapper.body {
                    walk_statement(visitor, node);
                }
            }
        }
        Statement::Data(_) | Statement::Comment => {}
    }
}

/// Run `visitor` depth-first over `root`.
pub fn walk_expression(visitor: &mut impl Visitor, root: &Expression) {
    if !visitor.visit_expression(root) {
        return;
    }
    match root {
        Expression::List(items) | Expression::Tuple(items) => {
            for item in items {
                walk_expression(visitor, item);
            }
        }
        Expression::Dict(entries) => {
            for (k, v) in entries {
                walk_expression(visitor, k);
                walk_expression(visitor, v);
            }
        }
        Expression::Getattr { target, .. } => walk_expression(visitor, target),
        Expression::Getitem { target, index } => {
            walk_expression(visitor, target);
            walk_expression(visitor, index);
        }
        Expression::Call(call) => {
            walk_expression(visitor, &call.function);
            for arg in &call.args {
                walk_expression(visitor, arg);
            }
            for (_, arg) in &call.kwargs {
                walk_expression(visitor, arg);
            }
        }
        Expression::Unary { term, .. } | Expression::Negation(term) => {
            walk_expression(visitor, term);
        }
        Expression::Binary { left, right, .. } => {
            walk_expression(visitor, left);
            walk_expression(visitor, right);
        }
        Expression::Filtered { target, filters } => {
            walk_expression(visitor, target);
            for filter in filters {
                for arg in &filter.args {
                    walk_expression(visitor, arg);
                }
                for (_, arg) in &filter.kwargs {
                    walk_expression(visitor, arg);
                }
            }
        }
        Expression::Test { target, test, .. } => {
            walk_expression(visitor, target);
            for arg in &test.args {
                walk_expression(visitor, arg);
            }
            for (_, arg) in &test.kwargs {
                walk_expression(visitor, arg);
            }
        }
        Expression::Conditional {
            condition,
            then,
            other,
        } => {
            walk_expression(visitor, condition);
            walk_expression(visitor, then);
            walk_expression(visitor, other);
        }
        Expression::None
        | Expression::Bool(_)
        | Expression::Integer(_)
        | Expression::Float(_)
        | Expression::String(_)
        | Expression::Name(_)
        | Expression::Error(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A visitor that records the name of every `Name` expression it sees,
    /// modeling the "dependency extraction" use case spec.md §4.3 names.
    #[derive(Default)]
    struct NameCollector(Vec<String>);

    impl Visitor for NameCollector {
        fn visit_expression(&mut self, expression: &Expression) -> bool {
            if let Expression::Name(name) = expression {
                self.0.push(name.clone());
            }
            true
        }
    }

    #[test]
    fn test_walk_collects_names() {
        let tree = Statement::Template(vec![
            Statement::Output(Expression::Binary {
                left: Box::new(Expression::Name("a".into())),
                op: BinaryOp::Add,
                right: Box::new(Expression::Name("b".into())),
            }),
            Statement::Data("literal".into()),
        ]);
        let mut collector = NameCollector::default();
        walk_statement(&mut collector, &tree);
        assert_eq!(collector.0, vec!["a".to_string(), "b".to_string()]);
    }

    /// A visitor that stops descending once it hits a `Data` node, proving
    /// that returning `false` from `visit` skips the subtree.
    #[test]
    fn test_walk_can_skip_subtree() {
        struct StopAtData(u32);
        impl Visitor for StopAtData {
            fn visit_statement(&mut self, statement: &Statement) -> bool {
                self.0 += 1;
                !matches!(statement, Statement::Data(_))
            }
        }
        let tree = Statement::Template(vec![Statement::Data("x".into())]);
        let mut visitor = StopAtData(0);
        walk_statement(&mut visitor, &tree);
        assert_eq!(visitor.0, 2); // Template, then Data; Data has no children anyway
    }
}

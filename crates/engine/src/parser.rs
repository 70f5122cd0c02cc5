//! Token stream → AST. Recursive-descent, with one function per precedence
//! level (mirroring gonja `parser/math.go`'s `parseMath` → `parseConcat` →
//! `parseMathPrioritary` → `parseUnary` → `parsePower` chain) and a
//! pluggable statement dispatch that looks tag names up in the
//! environment's statement registry.

use crate::{
    ast::{BinaryOp, Call, Expression, FilterCall, Statement, TestCall, Wrapper},
    environment::Environment,
    error::ParseError,
    token::{Token, TokenKind},
};

pub struct Parser<'env> {
    tokens: Vec<Token>,
    pos: usize,
    source_chars: Vec<char>,
    env: &'env Environment,
}

impl<'env> Parser<'env> {
    pub fn new(tokens: Vec<Token>, source: &str, env: &'env Environment) -> Self {
        Self {
            tokens,
            pos: 0,
            source_chars: source.chars().collect(),
            env,
        }
    }

    pub fn environment(&self) -> &'env Environment {
        self.env
    }

    pub fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    pub fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset)
    }

    fn is_name(&self, keyword: &str) -> bool {
        self.peek().kind == TokenKind::Name && self.peek().lexeme == keyword
    }

    fn is_name_at(&self, offset: usize, keyword: &str) -> bool {
        self.peek_at(offset)
            .is_some_and(|t| t.kind == TokenKind::Name && t.lexeme == keyword)
    }

    /// The most recently consumed token (the one just before the cursor).
    /// Used by tags like `raw` that need the exact end-of-span of a
    /// delimiter they just consumed.
    pub fn previous(&self) -> &Token {
        &self.tokens[self.pos.saturating_sub(1)]
    }

    pub fn advance(&mut self) -> Token {
        let token = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    pub fn expect(&mut self, kind: TokenKind) -> Result<Token, ParseError> {
        if self.peek().kind == kind {
            Ok(self.advance())
        } else {
            Err(self.error(format!("expected {kind:?}")))
        }
    }

    /// Consume a `Name` token and require it to equal `keyword`, e.g.
    /// `endif`/`else` inside a tag's own argument grammar.
    pub fn expect_keyword(&mut self, keyword: &str) -> Result<Token, ParseError> {
        if self.is_name(keyword) {
            Ok(self.advance())
        } else {
            Err(self.error(format!("expected {keyword:?}")))
        }
    }

    pub fn error(&self, message: impl Into<String>) -> ParseError {
        let token = self.peek();
        ParseError {
            message: message.into(),
            line: token.line,
            column: token.column,
            near: token.lexeme.clone(),
            token: format!("{:?}", token.kind),
        }
    }

    /// The exact source text between two char offsets, used by tags like
    /// `raw` that must bypass tokenization of their body.
    pub fn source_slice(&self, start: usize, end: usize) -> String {
        self.source_chars[start..end].iter().collect()
    }

    /// Parse the whole template: a sequence of nodes running to `Eof`.
    pub fn parse_template(&mut self) -> Result<Statement, ParseError> {
        let (nodes, _) = self.parse_nodes_until(&[])?;
        Ok(Statement::Template(nodes))
    }

    /// Parse a nested body up to one of `end_tags`, consuming the matched
    /// end tag's `{% name %}` and returning which one matched.
    pub fn wrap_until(&mut self, end_tags: &[&str]) -> Result<Wrapper, ParseError> {
        let (body, matched) = self.parse_nodes_until(end_tags)?;
        match matched {
            Some(end_tag) => Ok(Wrapper { body, end_tag }),
            None => Err(self.error(format!(
                "unexpected end of template, expected one of {end_tags:?}"
            ))),
        }
    }

    fn parse_nodes_until(
        &mut self,
        end_tags: &[&str],
    ) -> Result<(Vec<Statement>, Option<String>), ParseError> {
        let mut nodes = Vec::new();
        loop {
            match self.peek().kind {
                TokenKind::Eof => return Ok((nodes, None)),
                TokenKind::Text => {
                    let token = self.advance();
                    nodes.push(Statement::Data(token.lexeme));
                }
                TokenKind::CommentStart => {
                    self.advance();
                    if self.peek().kind == TokenKind::CommentText {
                        self.advance();
                    }
                    self.expect(TokenKind::CommentEnd)?;
                    nodes.push(Statement::Comment);
                }
                TokenKind::VariableStart => {
                    self.advance();
                    let expr = self.parse_expression()?;
                    self.expect(TokenKind::VariableEnd)?;
                    nodes.push(Statement::Output(expr));
                }
                TokenKind::BlockStart => {
                    let tag_name = self.peek_at(1).map(|t| t.lexeme.clone());
                    if let Some(tag_name) = &tag_name {
                        if end_tags.contains(&tag_name.as_str()) {
                            self.advance(); // BlockStart
                            self.advance(); // Name
                            self.expect(TokenKind::BlockEnd)?;
                            return Ok((nodes, Some(tag_name.clone())));
                        }
                    }
                    nodes.push(self.parse_statement_block()?);
                }
                _ => return Err(self.error("unexpected token")),
            }
        }
    }

    fn parse_statement_block(&mut self) -> Result<Statement, ParseError> {
        self.advance(); // BlockStart
        let name_token = self.expect(TokenKind::Name)?;
        let Some(tag) = self.env.statements.get(&name_token.lexeme).cloned() else {
            return Err(ParseError {
                message: format!("unknown tag {:?}", name_token.lexeme),
                line: name_token.line,
                column: name_token.column,
                near: name_token.lexeme,
                token: "Name".to_string(),
            });
        };
        tag.parse(self, name_token.line, name_token.column)
    }

    // ---- expression grammar, lowest to highest precedence ----

    pub fn parse_expression(&mut self) -> Result<Expression, ParseError> {
        let left = self.parse_or()?;
        if self.is_name("if") {
            self.advance();
            let condition = self.parse_or()?;
            self.expect_keyword("else")?;
            let other = self.parse_expression()?;
            Ok(Expression::Conditional {
                condition: Box::new(condition),
                then: Box::new(left),
                other: Box::new(other),
            })
        } else {
            Ok(left)
        }
    }

    fn parse_or(&mut self) -> Result<Expression, ParseError> {
        let mut left = self.parse_and()?;
        while self.is_name("or") {
            self.advance();
            let right = self.parse_and()?;
            left = Expression::Binary {
                left: Box::new(left),
                op: BinaryOp::Or,
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expression, ParseError> {
        let mut left = self.parse_not()?;
        while self.is_name("and") {
            self.advance();
            let right = self.parse_not()?;
            left = Expression::Binary {
                left: Box::new(left),
                op: BinaryOp::And,
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expression, ParseError> {
        if self.is_name("not") {
            self.advance();
            let term = self.parse_not()?;
            Ok(Expression::Negation(Box::new(term)))
        } else {
            self.parse_comparison()
        }
    }

    fn parse_comparison(&mut self) -> Result<Expression, ParseError> {
        let left = self.parse_additive()?;
        let op = match self.peek().kind {
            TokenKind::Eq => Some(BinaryOp::Eq),
            TokenKind::Ne => Some(BinaryOp::Ne),
            TokenKind::Lt => Some(BinaryOp::Lt),
            TokenKind::Le => Some(BinaryOp::Le),
            TokenKind::Gt => Some(BinaryOp::Gt),
            TokenKind::Ge => Some(BinaryOp::Ge),
            _ if self.is_name("in") => Some(BinaryOp::In),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let right = self.parse_additive()?;
            return Ok(Expression::Binary {
                left: Box::new(left),
                op,
                right: Box::new(right),
            });
        }
        if self.is_name("not") && self.is_name_at(1, "in") {
            self.advance();
            self.advance();
            let right = self.parse_additive()?;
            return Ok(Expression::Negation(Box::new(Expression::Binary {
                left: Box::new(left),
                op: BinaryOp::In,
                right: Box::new(right),
            })));
        }
        if self.is_name("is") {
            self.advance();
            let negated = if self.is_name("not") {
                self.advance();
                true
            } else {
                false
            };
            let test = self.parse_test_call()?;
            return Ok(Expression::Test {
                target: Box::new(left),
                test,
                negated,
            });
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Expression, ParseError> {
        let mut left = self.parse_concat()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_concat()?;
            left = Expression::Binary {
                left: Box::new(left),
                op,
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_concat(&mut self) -> Result<Expression, ParseError> {
        let mut left = self.parse_multiplicative()?;
        while self.peek().kind == TokenKind::Tilde {
            self.advance();
            let right = self.parse_multiplicative()?;
            left = Expression::Binary {
                left: Box::new(left),
                op: BinaryOp::Concat,
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expression, ParseError> {
        let mut left = self.parse_unary_sign()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::DoubleSlash => BinaryOp::FloorDiv,
                TokenKind::Percent => BinaryOp::Mod,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary_sign()?;
            left = Expression::Binary {
                left: Box::new(left),
                op,
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_unary_sign(&mut self) -> Result<Expression, ParseError> {
        match self.peek().kind {
            TokenKind::Plus | TokenKind::Minus => {
                let negative = self.peek().kind == TokenKind::Minus;
                self.advance();
                let term = self.parse_unary_sign()?;
                Ok(Expression::Unary {
                    negative,
                    term: Box::new(term),
                })
            }
            _ => self.parse_power(),
        }
    }

    fn parse_power(&mut self) -> Result<Expression, ParseError> {
        let base = self.parse_postfix()?;
        if self.peek().kind == TokenKind::DoubleStar {
            self.advance();
            let exponent = self.parse_unary_sign()?;
            Ok(Expression::Binary {
                left: Box::new(base),
                op: BinaryOp::Pow,
                right: Box::new(exponent),
            })
        } else {
            Ok(base)
        }
    }

    /// Atom followed by any chain of `.attr`, `[expr]`, `(args)`, and
    /// `|filter` postfixes. `is`/`is not` is handled one level up, in
    /// `parse_comparison`, since (unlike filters) it binds at comparison
    /// precedence rather than tight to the primary atom.
    fn parse_postfix(&mut self) -> Result<Expression, ParseError> {
        let mut expr = self.parse_atom()?;
        loop {
            match self.peek().kind {
                TokenKind::Dot => {
                    self.advance();
                    let attr = if self.peek().kind == TokenKind::Integer {
                        self.advance().lexeme
                    } else {
                        self.expect(TokenKind::Name)?.lexeme
                    };
                    expr = Expression::Getattr {
                        target: Box::new(expr),
                        attr,
                    };
                }
                TokenKind::LBracket => {
                    self.advance();
                    let index = self.parse_expression()?;
                    self.expect(TokenKind::RBracket)?;
                    expr = Expression::Getitem {
                        target: Box::new(expr),
                        index: Box::new(index),
                    };
                }
                TokenKind::LParen => {
                    let (args, kwargs) = self.parse_call_args()?;
                    expr = Expression::Call(Call {
                        function: Box::new(expr),
                        args,
                        kwargs,
                    });
                }
                TokenKind::Pipe => {
                    let mut filters = Vec::new();
                    while self.peek().kind == TokenKind::Pipe {
                        self.advance();
                        filters.push(self.parse_filter_call()?);
                    }
                    expr = Expression::Filtered {
                        target: Box::new(expr),
                        filters,
                    };
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    /// `(expr, ..., kw=expr, ...)`, used by calls and filter/test arg lists.
    /// Assumes the cursor is at `(`.
    pub(crate) fn parse_call_args(
        &mut self,
    ) -> Result<(Vec<Expression>, Vec<(String, Expression)>), ParseError> {
        self.expect(TokenKind::LParen)?;
        let mut args = Vec::new();
        let mut kwargs = Vec::new();
        while self.peek().kind != TokenKind::RParen {
            if self.peek().kind == TokenKind::Name
                && self.peek_at(1).map(|t| t.kind) == Some(TokenKind::Assign)
            {
                let name = self.advance().lexeme;
                self.advance(); // =
                let value = self.parse_expression()?;
                kwargs.push((name, value));
            } else {
                args.push(self.parse_expression()?);
            }
            if self.peek().kind == TokenKind::Comma {
                self.advance();
            } else {
                break;
            }
        }
        self.expect(TokenKind::RParen)?;
        Ok((args, kwargs))
    }

    fn parse_filter_call(&mut self) -> Result<FilterCall, ParseError> {
        let name_token = self.expect(TokenKind::Name)?;
        let (args, kwargs) = if self.peek().kind == TokenKind::LParen {
            self.parse_call_args()?
        } else {
            (Vec::new(), Vec::new())
        };
        Ok(FilterCall {
            name: name_token.lexeme,
            args,
            kwargs,
            line: name_token.line,
            column: name_token.column,
        })
    }

    fn parse_test_call(&mut self) -> Result<TestCall, ParseError> {
        let name_token = self.expect(TokenKind::Name)?;
        let (args, kwargs) = if self.peek().kind == TokenKind::LParen {
            self.parse_call_args()?
        } else {
            (Vec::new(), Vec::new())
        };
        Ok(TestCall {
            name: name_token.lexeme,
            args,
            kwargs,
            line: name_token.line,
            column: name_token.column,
        })
    }

    fn parse_atom(&mut self) -> Result<Expression, ParseError> {
        match self.peek().kind {
            TokenKind::None => {
                self.advance();
                Ok(Expression::None)
            }
            TokenKind::Bool => {
                let token = self.advance();
                Ok(Expression::Bool(matches!(token.lexeme.as_str(), "true" | "True")))
            }
            TokenKind::Integer => {
                let token = self.advance();
                let value = token
                    .lexeme
                    .parse()
                    .map_err(|_| self.error("invalid integer literal"))?;
                Ok(Expression::Integer(value))
            }
            TokenKind::Float => {
                let token = self.advance();
                let value = token
                    .lexeme
                    .parse()
                    .map_err(|_| self.error("invalid float literal"))?;
                Ok(Expression::Float(value))
            }
            TokenKind::String => Ok(Expression::String(self.advance().lexeme)),
            TokenKind::Name => Ok(Expression::Name(self.advance().lexeme)),
            TokenKind::LBracket => self.parse_list(),
            TokenKind::LBrace => self.parse_dict(),
            TokenKind::LParen => self.parse_group_or_tuple(),
            _ => Err(self.error("unexpected token in expression")),
        }
    }

    fn parse_list(&mut self) -> Result<Expression, ParseError> {
        self.advance(); // [
        let mut items = Vec::new();
        while self.peek().kind != TokenKind::RBracket {
            items.push(self.parse_expression()?);
            if self.peek().kind == TokenKind::Comma {
                self.advance();
            } else {
                break;
            }
        }
        self.expect(TokenKind::RBracket)?;
        Ok(Expression::List(items))
    }

    fn parse_dict(&mut self) -> Result<Expression, ParseError> {
        self.advance(); // {
        let mut entries = Vec::new();
        while self.peek().kind != TokenKind::RBrace {
            let key = self.parse_expression()?;
            self.expect(TokenKind::Colon)?;
            let value = self.parse_expression()?;
            entries.push((key, value));
            if self.peek().kind == TokenKind::Comma {
                self.advance();
            } else {
                break;
            }
        }
        self.expect(TokenKind::RBrace)?;
        Ok(Expression::Dict(entries))
    }

    /// `(expr)` is a grouping; `(a, b, ...)` with at least one comma is a
    /// tuple; `()` is an empty tuple.
    fn parse_group_or_tuple(&mut self) -> Result<Expression, ParseError> {
        self.advance(); // (
        if self.peek().kind == TokenKind::RParen {
            self.advance();
            return Ok(Expression::Tuple(Vec::new()));
        }
        let first = self.parse_expression()?;
        if self.peek().kind != TokenKind::Comma {
            self.expect(TokenKind::RParen)?;
            return Ok(first);
        }
        let mut items = vec![first];
        while self.peek().kind == TokenKind::Comma {
            self.advance();
            if self.peek().kind == TokenKind::RParen {
                break;
            }
            items.push(self.parse_expression()?);
        }
        self.expect(TokenKind::RParen)?;
        Ok(Expression::Tuple(items))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{environment::Config, lexer::lex};
    use rstest::rstest;

    fn parse_expr(source: &str) -> Expression {
        let tokens = lex(&format!("{{{{ {source} }}}}")).unwrap();
        let env = Environment::new(Config::default());
        let mut parser = Parser::new(tokens, source, &env);
        parser.expect(TokenKind::VariableStart).unwrap();
        let expr = parser.parse_expression().unwrap();
        parser.expect(TokenKind::VariableEnd).unwrap();
        expr
    }

    #[test]
    fn test_arithmetic_precedence() {
        // 2 + 3 * 4 ** 2 parses as 2 + (3 * (4 ** 2))
        let expr = parse_expr("2 + 3 * 4 ** 2");
        assert_eq!(
            expr,
            Expression::Binary {
                left: Box::new(Expression::Integer(2)),
                op: BinaryOp::Add,
                right: Box::new(Expression::Binary {
                    left: Box::new(Expression::Integer(3)),
                    op: BinaryOp::Mul,
                    right: Box::new(Expression::Binary {
                        left: Box::new(Expression::Integer(4)),
                        op: BinaryOp::Pow,
                        right: Box::new(Expression::Integer(2)),
                    }),
                }),
            }
        );
    }

    #[test]
    fn test_unary_binds_looser_than_power() {
        // -2 ** 2 parses as -(2 ** 2)
        let expr = parse_expr("-2 ** 2");
        assert_eq!(
            expr,
            Expression::Unary {
                negative: true,
                term: Box::new(Expression::Binary {
                    left: Box::new(Expression::Integer(2)),
                    op: BinaryOp::Pow,
                    right: Box::new(Expression::Integer(2)),
                }),
            }
        );
    }

    #[test]
    fn test_filter_pipeline_collects_left_to_right() {
        let expr = parse_expr("name | upper | trim");
        let Expression::Filtered { filters, .. } = expr else {
            panic!("expected Filtered");
        };
        assert_eq!(filters[0].name, "upper");
        assert_eq!(filters[1].name, "trim");
    }

    #[test]
    fn test_ternary_is_right_associative_over_else_branch() {
        let expr = parse_expr("a if c else b if d else e");
        let Expression::Conditional { other, .. } = expr else {
            panic!("expected Conditional");
        };
        assert!(matches!(*other, Expression::Conditional { .. }));
    }

    #[rstest]
    #[case("a and b", BinaryOp::And)]
    #[case("a or b", BinaryOp::Or)]
    fn test_logical_operators(#[case] source: &str, #[case] op: BinaryOp) {
        let expr = parse_expr(source);
        assert_eq!(
            expr,
            Expression::Binary {
                left: Box::new(Expression::Name("a".into())),
                op,
                right: Box::new(Expression::Name("b".into())),
            }
        );
    }

    #[test]
    fn test_tuple_requires_comma() {
        assert_eq!(parse_expr("(1)"), Expression::Integer(1));
        assert_eq!(
            parse_expr("(1, 2)"),
            Expression::Tuple(vec![Expression::Integer(1), Expression::Integer(2)])
        );
    }

    #[test]
    fn test_is_test_binds_looser_than_additive() {
        // 1 + 1 is even  ==  (1 + 1) is even
        let expr = parse_expr("1 + 1 is even");
        let Expression::Test { target, test, .. } = expr else {
            panic!("expected Test");
        };
        assert!(matches!(*target, Expression::Binary { .. }));
        assert_eq!(test.name, "even");
    }

    #[test]
    fn test_not_in() {
        let expr = parse_expr("a not in b");
        assert!(matches!(expr, Expression::Negation(_)));
    }

    #[test]
    fn test_unknown_tag_is_parse_error() {
        let tokens = lex("{% bogus %}").unwrap();
        let env = Environment::new(Config::default());
        let mut parser = Parser::new(tokens, "{% bogus %}", &env);
        assert!(parser.parse_template().is_err());
    }
}

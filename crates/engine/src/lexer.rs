//! Character-stream to token-stream lexer. Two modes: [Mode::Text], which
//! accumulates literal output verbatim, and [Mode::Code], entered on `{{`,
//! `{%`, or `{#` and left again on the matching closer. Multi-character
//! operators are checked before their single-character prefixes so `==`
//! isn't lexed as two `Assign` tokens, `**` as two `Star`s, and so on.

use crate::{
    error::LexError,
    token::{Token, TokenKind},
};

/// Lex a full template source into a token stream terminated by [TokenKind::Eof].
pub fn lex(source: &str) -> Result<Vec<Token>, LexError> {
    Lexer::new(source).run()
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: u32,
    column: u32,
    tokens: Vec<Token>,
    /// Set when the previous closing delimiter had a trim-right dash
    /// (`-%}`, `-}}`, `-#}`); the next Text token should have its leading
    /// whitespace stripped once captured.
    trim_next_text_left: bool,
}

impl Lexer {
    fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
            tokens: Vec::new(),
            trim_next_text_left: false,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn peek_str(&self, len: usize) -> String {
        self.chars.iter().skip(self.pos).take(len).collect()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn run(mut self) -> Result<Vec<Token>, LexError> {
        loop {
            self.lex_text()?;
            if self.peek().is_none() {
                break;
            }
            self.lex_code()?;
        }
        self.tokens.push(
            Token::new(TokenKind::Eof, "", self.line, self.column).with_span(self.pos, self.pos),
        );
        Ok(self.tokens)
    }

    /// Consume literal text up to (not including) the next opening delimiter
    /// or end of input, and push it as a `Text` token.
    fn lex_text(&mut self) -> Result<(), LexError> {
        let (line, column) = (self.line, self.column);
        let start = self.pos;
        let mut text = String::new();
        let mut trim_right = false;
        loop {
            match self.peek_str(2).as_str() {
                "{{" | "{%" | "{#" => {
                    trim_right = self.peek_at(2) == Some('-');
                    break;
                }
                _ => {}
            }
            match self.advance() {
                Some(c) => text.push(c),
                None => break,
            }
        }
        if self.trim_next_text_left {
            text = text.trim_start().to_string();
            self.trim_next_text_left = false;
        }
        if trim_right {
            text = text.trim_end().to_string();
        }
        if !text.is_empty() {
            self.tokens
                .push(Token::new(TokenKind::Text, text, line, column).with_span(start, self.pos));
        }
        Ok(())
    }

    /// Consume one `{{ ... }}`, `{% ... %}`, or `{# ... #}` region, including
    /// both delimiters.
    fn lex_code(&mut self) -> Result<(), LexError> {
        let opener = self.peek_str(2);
        let (open_kind, close_kind) = match opener.as_str() {
            "{{" => (TokenKind::VariableStart, TokenKind::VariableEnd),
            "{%" => (TokenKind::BlockStart, TokenKind::BlockEnd),
            "{#" => (TokenKind::CommentStart, TokenKind::CommentEnd),
            _ => unreachable!("lex_code called without a delimiter at cursor"),
        };
        let (line, column) = (self.line, self.column);
        let start = self.pos;
        self.advance();
        self.advance();
        let trim_left = self.peek() == Some('-');
        if trim_left {
            self.advance();
        }
        let mut open = Token::new(open_kind, &opener, line, column).with_span(start, self.pos);
        open.trim_left = trim_left;
        self.tokens.push(open);

        if opener == "{#" {
            self.lex_comment(close_kind)
        } else {
            self.lex_expr_tokens(close_kind)
        }
    }

    /// Comments capture their body completely verbatim and are never
    /// tokenized further.
    fn lex_comment(&mut self, close_kind: TokenKind) -> Result<(), LexError> {
        let closer = if close_kind == TokenKind::CommentEnd {
            "#}"
        } else {
            unreachable!()
        };
        let (line, column) = (self.line, self.column);
        let start = self.pos;
        let mut body = String::new();
        loop {
            if self.peek().is_none() {
                return Err(LexError::new("unterminated comment", line, column));
            }
            if self.peek() == Some('-') && self.peek_at(1) == Some('#') && self.peek_at(2) == Some('}') {
                break;
            }
            if self.peek_str(2) == closer {
                break;
            }
            body.push(self.advance().unwrap());
        }
        if !body.is_empty() {
            self.tokens.push(
                Token::new(TokenKind::CommentText, body, line, column).with_span(start, self.pos),
            );
        }
        self.close_delimiter(close_kind, closer)
    }

    fn close_delimiter(&mut self, close_kind: TokenKind, closer: &str) -> Result<(), LexError> {
        let (line, column) = (self.line, self.column);
        let start = self.pos;
        let trim_right = self.peek() == Some('-');
        if trim_right {
            self.advance();
        }
        for _ in 0..closer.chars().count() {
            self.advance();
        }
        let mut close = Token::new(close_kind, closer, line, column).with_span(start, self.pos);
        close.trim_right = trim_right;
        self.trim_next_text_left = trim_right;
        self.tokens.push(close);
        Ok(())
    }

    /// Tokenize the interior of `{{ ... }}` or `{% ... %}` until the matching
    /// closer.
    fn lex_expr_tokens(&mut self, close_kind: TokenKind) -> Result<(), LexError> {
        let closer = if close_kind == TokenKind::VariableEnd {
            "}}"
        } else {
            "%}"
        };
        loop {
            self.skip_code_whitespace();
            if self.peek() == Some('-') && self.peek_at(1) == closer.chars().next().unwrap() && self.peek_at(2) == closer.chars().nth(1).unwrap_or_default() {
                return self.close_delimiter(close_kind, closer);
            }
            if self.peek_str(2) == closer {
                return self.close_delimiter(close_kind, closer);
            }
            match self.peek() {
                None => {
                    return Err(LexError::new("unterminated code block", self.line, self.column));
                }
                Some(c) if c.is_ascii_digit() => self.lex_number()?,
                Some(c) if is_ident_start(c) => self.lex_name(),
                Some('\'') | Some('"') => self.lex_string()?,
                Some(_) => self.lex_operator()?,
            }
        }
    }

    fn skip_code_whitespace(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.advance();
        }
    }

    fn lex_number(&mut self) -> Result<(), LexError> {
        let (line, column) = (self.line, self.column);
        let start = self.pos;
        let mut text = String::new();
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            text.push(self.advance().unwrap());
        }
        let mut is_float = false;
        if self.peek() == Some('.') && matches!(self.peek_at(1), Some(c) if c.is_ascii_digit()) {
            is_float = true;
            text.push(self.advance().unwrap());
            while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                text.push(self.advance().unwrap());
            }
        }
        let kind = if is_float { TokenKind::Float } else { TokenKind::Integer };
        self.tokens
            .push(Token::new(kind, text, line, column).with_span(start, self.pos));
        Ok(())
    }

    fn lex_name(&mut self) {
        let (line, column) = (self.line, self.column);
        let start = self.pos;
        let mut text = String::new();
        while matches!(self.peek(), Some(c) if is_ident_continue(c)) {
            text.push(self.advance().unwrap());
        }
        let kind = match text.as_str() {
            "true" | "True" | "false" | "False" => TokenKind::Bool,
            "none" | "None" | "null" | "Null" => TokenKind::None,
            _ => TokenKind::Name,
        };
        self.tokens
            .push(Token::new(kind, text, line, column).with_span(start, self.pos));
    }

    fn lex_string(&mut self) -> Result<(), LexError> {
        let (line, column) = (self.line, self.column);
        let start = self.pos;
        let quote = self.advance().unwrap();
        let mut text = String::new();
        loop {
            match self.advance() {
                None => return Err(LexError::new("unterminated string", line, column)),
                Some(c) if c == quote => break,
                Some('\\') => match self.advance() {
                    Some('n') => text.push('\n'),
                    Some('t') => text.push('\t'),
                    Some('r') => text.push('\r'),
                    Some('\\') => text.push('\\'),
                    Some('\'') => text.push('\''),
                    Some('"') => text.push('"'),
                    Some(other) => text.push(other),
                    None => return Err(LexError::new("unterminated string", line, column)),
                },
                Some(c) => text.push(c),
            }
        }
        self.tokens.push(
            Token::new(TokenKind::String, text, line, column).with_span(start, self.pos),
        );
        Ok(())
    }

    fn lex_operator(&mut self) -> Result<(), LexError> {
        let (line, column) = (self.line, self.column);
        let start = self.pos;
        let two = self.peek_str(2);
        let (kind, len) = match two.as_str() {
            "**" => (TokenKind::DoubleStar, 2),
            "//" => (TokenKind::DoubleSlash, 2),
            "==" => (TokenKind::Eq, 2),
            "!=" => (TokenKind::Ne, 2),
            "<=" => (TokenKind::Le, 2),
            ">=" => (TokenKind::Ge, 2),
            _ => match self.peek().unwrap() {
                '+' => (TokenKind::Plus, 1),
                '-' => (TokenKind::Minus, 1),
                '*' => (TokenKind::Star, 1),
                '/' => (TokenKind::Slash, 1),
                '%' => (TokenKind::Percent, 1),
                '~' => (TokenKind::Tilde, 1),
                '=' => (TokenKind::Assign, 1),
                '<' => (TokenKind::Lt, 1),
                '>' => (TokenKind::Gt, 1),
                ',' => (TokenKind::Comma, 1),
                '.' => (TokenKind::Dot, 1),
                ':' => (TokenKind::Colon, 1),
                '|' => (TokenKind::Pipe, 1),
                '(' => (TokenKind::LParen, 1),
                ')' => (TokenKind::RParen, 1),
                '[' => (TokenKind::LBracket, 1),
                ']' => (TokenKind::RBracket, 1),
                '{' => (TokenKind::LBrace, 1),
                '}' => (TokenKind::RBrace, 1),
                c => {
                    return Err(LexError::new(
                        format!("unexpected character {c:?}"),
                        line,
                        column,
                    ));
                }
            },
        };
        let lexeme: String = self.chars[self.pos..self.pos + len].iter().collect();
        for _ in 0..len {
            self.advance();
        }
        self.tokens
            .push(Token::new(kind, lexeme, line, column).with_span(start, self.pos));
        Ok(())
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::TokenKind::*;
    use rstest::rstest;

    fn kinds(source: &str) -> Vec<TokenKind> {
        lex(source).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[rstest]
    #[case::plain_text("hello world", vec![Text, Eof])]
    #[case::variable("{{ x }}", vec![VariableStart, Name, VariableEnd, Eof])]
    #[case::block("{% if x %}", vec![BlockStart, Name, Name, BlockEnd, Eof])]
    #[case::comment("{# hi #}", vec![CommentStart, CommentText, CommentEnd, Eof])]
    fn test_lex_basic(#[case] source: &str, #[case] expected: Vec<TokenKind>) {
        assert_eq!(kinds(source), expected);
    }

    #[test]
    fn test_lex_operators_prefer_longest() {
        assert_eq!(
            kinds("{{ 2 ** 3 // 1 == 2 }}"),
            vec![
                VariableStart, Integer, DoubleStar, Integer, DoubleSlash, Integer, Eq, Integer,
                VariableEnd, Eof
            ]
        );
    }

    #[test]
    fn test_lex_string_escapes() {
        let tokens = lex(r#"{{ "a\nb" }}"#).unwrap();
        assert_eq!(tokens[1].lexeme, "a\nb");
    }

    #[test]
    fn test_whitespace_trim() {
        let tokens = lex("a \n{%- if x -%}\n  b\n{% endif %}").unwrap();
        let text_lexemes: Vec<_> = tokens
            .iter()
            .filter(|t| t.kind == Text)
            .map(|t| t.lexeme.as_str())
            .collect();
        assert_eq!(text_lexemes, vec!["a", "b\n"]);
    }

    #[test]
    fn test_unterminated_string_errors() {
        assert!(lex(r#"{{ "abc }}"#).is_err());
    }

    #[test]
    fn test_unknown_character_errors() {
        assert!(lex("{{ @ }}").is_err());
    }
}

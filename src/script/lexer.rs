//! Tokenizer for parameter scripts, built on logos.
//!
//! Whitespace and `#` comments are skipped. Newlines are real tokens because
//! they terminate statements, except inside `(...)` and `[...]` where they
//! are dropped so long argument lists and lists can wrap.

use super::error::{Pos, ScriptError};
use logos::Logos;
use std::fmt;

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\f]+")]
#[logos(skip r"#[^\n]*")]
pub enum Token {
    // Keywords
    #[token("if")]
    If,
    #[token("else")]
    Else,
    #[token("when")]
    When,
    #[token("true")]
    True,
    #[token("false")]
    False,
    #[token("none")]
    Null,
    #[token("and")]
    And,
    #[token("or")]
    Or,
    #[token("not")]
    Not,

    // Operators
    #[token("==")]
    EqEq,
    #[token("!=")]
    NotEq,
    #[token("<=")]
    LtEq,
    #[token(">=")]
    GtEq,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[token("=")]
    Assign,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,

    // Delimiters
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token(",")]
    Comma,
    #[token(";")]
    Semicolon,
    #[token("\n")]
    Newline,

    // Literals
    #[regex(r"[0-9]+", |lex| lex.slice().parse::<i64>().ok())]
    Integer(i64),

    #[regex(r"[0-9]+\.[0-9]+([eE][+-]?[0-9]+)?", |lex| lex.slice().parse::<f64>().ok())]
    #[regex(r"[0-9]+[eE][+-]?[0-9]+", |lex| lex.slice().parse::<f64>().ok())]
    Float(f64),

    #[regex(r#""([^"\\\n]|\\.)*""#, |lex| {
        let s = lex.slice();
        unescape(&s[1..s.len() - 1])
    })]
    Str(String),

    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice().to_string())]
    Ident(String),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Token::If => "`if`",
            Token::Else => "`else`",
            Token::When => "`when`",
            Token::True => "`true`",
            Token::False => "`false`",
            Token::Null => "`none`",
            Token::And => "`and`",
            Token::Or => "`or`",
            Token::Not => "`not`",
            Token::EqEq => "`==`",
            Token::NotEq => "`!=`",
            Token::LtEq => "`<=`",
            Token::GtEq => "`>=`",
            Token::Lt => "`<`",
            Token::Gt => "`>`",
            Token::Assign => "`=`",
            Token::Plus => "`+`",
            Token::Minus => "`-`",
            Token::Star => "`*`",
            Token::Slash => "`/`",
            Token::Percent => "`%`",
            Token::LParen => "`(`",
            Token::RParen => "`)`",
            Token::LBracket => "`[`",
            Token::RBracket => "`]`",
            Token::LBrace => "`{`",
            Token::RBrace => "`}`",
            Token::Comma => "`,`",
            Token::Semicolon => "`;`",
            Token::Newline => "newline",
            Token::Integer(i) => return write!(f, "integer {}", i),
            Token::Float(x) => return write!(f, "float {}", x),
            Token::Str(s) => return write!(f, "string {:?}", s),
            Token::Ident(name) => return write!(f, "name `{}`", name),
        };
        f.write_str(s)
    }
}

/// A token together with where it starts.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub pos: Pos,
}

/// Tokenize a whole script.
pub fn tokenize(source: &str) -> Result<Vec<Spanned>, ScriptError> {
    let lines = LineIndex::new(source);
    let mut tokens = Vec::new();
    let mut depth: usize = 0;
    let mut lexer = Token::lexer(source);

    while let Some(result) = lexer.next() {
        let pos = lines.pos(lexer.span().start);
        let token = match result {
            Ok(token) => token,
            Err(()) => {
                return Err(ScriptError::lex(
                    pos,
                    format!("unrecognized input `{}`", lexer.slice()),
                ));
            }
        };
        match token {
            Token::LParen | Token::LBracket => depth += 1,
            Token::RParen | Token::RBracket => depth = depth.saturating_sub(1),
            Token::Newline if depth > 0 => continue,
            _ => {}
        }
        tokens.push(Spanned { token, pos });
    }

    Ok(tokens)
}

fn unescape(s: &str) -> Option<String> {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('r') => out.push('\r'),
                Some('t') => out.push('\t'),
                Some('0') => out.push('\0'),
                Some('\\') => out.push('\\'),
                Some('"') => out.push('"'),
                _ => return None,
            }
        } else {
            out.push(c);
        }
    }
    Some(out)
}

/// Byte offset to line/column lookup.
struct LineIndex {
    starts: Vec<usize>,
}

impl LineIndex {
    fn new(source: &str) -> Self {
        let mut starts = vec![0];
        starts.extend(source.match_indices('\n').map(|(i, _)| i + 1));
        Self { starts }
    }

    fn pos(&self, offset: usize) -> Pos {
        let line = match self.starts.binary_search(&offset) {
            Ok(i) => i,
            Err(i) => i - 1,
        };
        Pos::new(line + 1, offset - self.starts[line] + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<Token> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .map(|s| s.token)
            .collect()
    }

    #[test]
    fn test_numbers() {
        assert_eq!(
            kinds("1 2.5 10e+7 1.5e-3"),
            vec![
                Token::Integer(1),
                Token::Float(2.5),
                Token::Float(10e7),
                Token::Float(1.5e-3)
            ]
        );
    }

    #[test]
    fn test_keywords_and_idents() {
        assert_eq!(
            kinds("if notice not"),
            vec![
                Token::If,
                Token::Ident("notice".to_string()),
                Token::Not
            ]
        );
    }

    #[test]
    fn test_comments_and_shebang_skipped() {
        assert_eq!(
            kinds("#!/usr/bin/env params\nx = 1 # trailing\n"),
            vec![
                Token::Newline,
                Token::Ident("x".to_string()),
                Token::Assign,
                Token::Integer(1),
                Token::Newline
            ]
        );
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(
            kinds(r#""a\tb\"c""#),
            vec![Token::Str("a\tb\"c".to_string())]
        );
    }

    #[test]
    fn test_newlines_dropped_inside_brackets() {
        let tokens = kinds("x = [1,\n2]\n");
        assert_eq!(tokens.iter().filter(|t| **t == Token::Newline).count(), 1);
    }

    #[test]
    fn test_error_position() {
        let err = tokenize("a = 1\nb = $").unwrap_err();
        assert_eq!(err.pos, Pos::new(2, 5));
        assert!(err.message.contains('$'));
    }
}

//! Hand-written recursive descent parser for parameter scripts.

use super::ast::{BinaryOp, Expr, ExprKind, Program, Stmt, Target, UnaryOp};
use super::error::{Pos, ScriptError};
use super::lexer::{Spanned, Token, tokenize};
use crate::value::Value;

/// Parse a complete script.
pub fn parse(source: &str) -> Result<Program, ScriptError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        stream: TokenStream::new(&tokens, end_pos(source)),
    };
    let stmts = parser.statements(false)?;
    Ok(Program { stmts })
}

fn end_pos(source: &str) -> Pos {
    let line = source.matches('\n').count() + 1;
    let column = source.rsplit('\n').next().map_or(0, |l| l.len()) + 1;
    Pos::new(line, column)
}

/// Token stream with lookahead and position tracking.
struct TokenStream<'src> {
    tokens: &'src [Spanned],
    pos: usize,
    end: Pos,
}

impl<'src> TokenStream<'src> {
    fn new(tokens: &'src [Spanned], end: Pos) -> Self {
        Self {
            tokens,
            pos: 0,
            end,
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|s| &s.token)
    }

    fn peek_nth(&self, n: usize) -> Option<&Token> {
        self.tokens.get(self.pos + n).map(|s| &s.token)
    }

    /// Position of the current token, or end of input.
    fn current_pos(&self) -> Pos {
        self.tokens.get(self.pos).map_or(self.end, |s| s.pos)
    }

    fn advance(&mut self) -> Option<&Token> {
        let token = self.tokens.get(self.pos).map(|s| &s.token);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn check(&self, expected: &Token) -> bool {
        matches!(self.peek(), Some(t) if std::mem::discriminant(t) == std::mem::discriminant(expected))
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.check(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: Token, context: &str) -> Result<Pos, ScriptError> {
        let pos = self.current_pos();
        if self.eat(&expected) {
            Ok(pos)
        } else {
            Err(self.unexpected(&format!("expected {} {}", expected, context)))
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn skip_separators(&mut self) {
        while matches!(self.peek(), Some(Token::Newline | Token::Semicolon)) {
            self.pos += 1;
        }
    }

    fn unexpected(&self, wanted: &str) -> ScriptError {
        let found = match self.peek() {
            Some(token) => token.to_string(),
            None => "end of input".to_string(),
        };
        ScriptError::parse(self.current_pos(), format!("{}, found {}", wanted, found))
    }
}

struct Parser<'src> {
    stream: TokenStream<'src>,
}

impl Parser<'_> {
    /// Statements up to end of input, or up to (not including) `}` when
    /// `in_block` is set.
    fn statements(&mut self, in_block: bool) -> Result<Vec<Stmt>, ScriptError> {
        let mut stmts = Vec::new();
        loop {
            self.stream.skip_separators();
            if self.stream.at_end() || (in_block && self.stream.check(&Token::RBrace)) {
                break;
            }
            stmts.push(self.statement()?);
            self.end_of_statement()?;
        }
        if in_block && self.stream.at_end() {
            return Err(self.stream.unexpected("expected `}` to close block"));
        }
        Ok(stmts)
    }

    fn end_of_statement(&mut self) -> Result<(), ScriptError> {
        match self.stream.peek() {
            None | Some(Token::Newline | Token::Semicolon | Token::RBrace) => Ok(()),
            Some(_) => Err(self.stream.unexpected("expected end of statement")),
        }
    }

    fn statement(&mut self) -> Result<Stmt, ScriptError> {
        match self.stream.peek() {
            Some(Token::If) => self.if_statement(),
            Some(Token::When) => self.when_statement(),
            Some(Token::Ident(_)) => {
                let (name, pos) = self.ident("at start of statement")?;
                self.stream.expect(Token::Assign, "after parameter name")?;
                let value = self.expr()?;
                Ok(Stmt::Assign { name, value, pos })
            }
            _ => Err(self.stream.unexpected("expected a statement")),
        }
    }

    fn ident(&mut self, context: &str) -> Result<(String, Pos), ScriptError> {
        let pos = self.stream.current_pos();
        match self.stream.peek() {
            Some(Token::Ident(name)) => {
                let name = name.clone();
                self.stream.advance();
                Ok((name, pos))
            }
            _ => Err(self.stream.unexpected(&format!("expected a name {}", context))),
        }
    }

    fn block(&mut self) -> Result<Vec<Stmt>, ScriptError> {
        self.stream.expect(Token::LBrace, "to open block")?;
        let stmts = self.statements(true)?;
        self.stream.expect(Token::RBrace, "to close block")?;
        Ok(stmts)
    }

    fn if_statement(&mut self) -> Result<Stmt, ScriptError> {
        self.stream.expect(Token::If, "")?;
        let mut branches = Vec::new();
        let cond = self.expr()?;
        branches.push((cond, self.block()?));

        let mut otherwise = Vec::new();
        while self.eat_else() {
            if self.stream.eat(&Token::If) {
                let cond = self.expr()?;
                branches.push((cond, self.block()?));
            } else {
                otherwise = self.block()?;
                break;
            }
        }
        Ok(Stmt::If {
            branches,
            otherwise,
        })
    }

    /// Consume `else`, allowing it to start on a following line.
    fn eat_else(&mut self) -> bool {
        let mut n = 0;
        while matches!(self.stream.peek_nth(n), Some(Token::Newline)) {
            n += 1;
        }
        if matches!(self.stream.peek_nth(n), Some(Token::Else)) {
            for _ in 0..=n {
                self.stream.advance();
            }
            true
        } else {
            false
        }
    }

    fn when_statement(&mut self) -> Result<Stmt, ScriptError> {
        let pos = self.stream.expect(Token::When, "")?;
        let (trigger, _) = self.ident("after `when`")?;
        self.stream.expect(Token::EqEq, "after trigger parameter")?;
        let value = self.expr()?;
        self.stream.expect(Token::LBrace, "to open `when` block")?;

        let mut targets = Vec::new();
        loop {
            self.stream.skip_separators();
            if self.stream.check(&Token::RBrace) {
                break;
            }
            if self.stream.at_end() {
                return Err(self.stream.unexpected("expected `}` to close `when` block"));
            }
            let (name, pos) = self.ident("for override target")?;
            self.stream.expect(Token::Assign, "after override target")?;
            let value = self.expr()?;
            targets.push(Target { name, value, pos });
            self.end_of_statement()?;
        }
        self.stream.expect(Token::RBrace, "to close `when` block")?;

        Ok(Stmt::When {
            trigger,
            value,
            targets,
            pos,
        })
    }

    fn expr(&mut self) -> Result<Expr, ScriptError> {
        self.or_expr()
    }

    fn or_expr(&mut self) -> Result<Expr, ScriptError> {
        let mut left = self.and_expr()?;
        while self.stream.check(&Token::Or) {
            let pos = self.stream.current_pos();
            self.stream.advance();
            let right = self.and_expr()?;
            left = binary(BinaryOp::Or, left, right, pos);
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> Result<Expr, ScriptError> {
        let mut left = self.not_expr()?;
        while self.stream.check(&Token::And) {
            let pos = self.stream.current_pos();
            self.stream.advance();
            let right = self.not_expr()?;
            left = binary(BinaryOp::And, left, right, pos);
        }
        Ok(left)
    }

    fn not_expr(&mut self) -> Result<Expr, ScriptError> {
        let pos = self.stream.current_pos();
        if self.stream.eat(&Token::Not) {
            let operand = self.not_expr()?;
            return Ok(Expr::new(
                ExprKind::Unary(UnaryOp::Not, Box::new(operand)),
                pos,
            ));
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Expr, ScriptError> {
        let left = self.additive()?;
        let Some(op) = self.comparison_op() else {
            return Ok(left);
        };
        let pos = self.stream.current_pos();
        self.stream.advance();
        let right = self.additive()?;
        if self.comparison_op().is_some() {
            return Err(ScriptError::parse(
                self.stream.current_pos(),
                "comparison operators cannot be chained",
            ));
        }
        Ok(binary(op, left, right, pos))
    }

    fn comparison_op(&self) -> Option<BinaryOp> {
        match self.stream.peek()? {
            Token::EqEq => Some(BinaryOp::Eq),
            Token::NotEq => Some(BinaryOp::Ne),
            Token::Lt => Some(BinaryOp::Lt),
            Token::LtEq => Some(BinaryOp::Le),
            Token::Gt => Some(BinaryOp::Gt),
            Token::GtEq => Some(BinaryOp::Ge),
            _ => None,
        }
    }

    fn additive(&mut self) -> Result<Expr, ScriptError> {
        let mut left = self.multiplicative()?;
        loop {
            let op = match self.stream.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => return Ok(left),
            };
            let pos = self.stream.current_pos();
            self.stream.advance();
            let right = self.multiplicative()?;
            left = binary(op, left, right, pos);
        }
    }

    fn multiplicative(&mut self) -> Result<Expr, ScriptError> {
        let mut left = self.unary()?;
        loop {
            let op = match self.stream.peek() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                Some(Token::Percent) => BinaryOp::Rem,
                _ => return Ok(left),
            };
            let pos = self.stream.current_pos();
            self.stream.advance();
            let right = self.unary()?;
            left = binary(op, left, right, pos);
        }
    }

    fn unary(&mut self) -> Result<Expr, ScriptError> {
        let pos = self.stream.current_pos();
        if self.stream.eat(&Token::Minus) {
            let operand = self.unary()?;
            return Ok(Expr::new(
                ExprKind::Unary(UnaryOp::Neg, Box::new(operand)),
                pos,
            ));
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Expr, ScriptError> {
        let pos = self.stream.current_pos();
        let Some(token) = self.stream.peek().cloned() else {
            return Err(self.stream.unexpected("expected an expression"));
        };
        let kind = match token {
            Token::Integer(i) => ExprKind::Literal(Value::Int(i)),
            Token::Float(f) => ExprKind::Literal(Value::Float(f)),
            Token::Str(s) => ExprKind::Literal(Value::Str(s)),
            Token::True => ExprKind::Literal(Value::Bool(true)),
            Token::False => ExprKind::Literal(Value::Bool(false)),
            Token::Null => ExprKind::Literal(Value::None),
            Token::Ident(name) => {
                self.stream.advance();
                if self.stream.check(&Token::LParen) {
                    self.stream.advance();
                    let args = self.comma_list(Token::RParen, "to close argument list")?;
                    return Ok(Expr::new(ExprKind::Call(name, args), pos));
                }
                return Ok(Expr::new(ExprKind::Name(name), pos));
            }
            Token::LBracket => {
                self.stream.advance();
                let items = self.comma_list(Token::RBracket, "to close list")?;
                return Ok(Expr::new(ExprKind::List(items), pos));
            }
            Token::LParen => {
                self.stream.advance();
                let inner = self.expr()?;
                self.stream.expect(Token::RParen, "to close parenthesis")?;
                return Ok(inner);
            }
            _ => return Err(self.stream.unexpected("expected an expression")),
        };
        self.stream.advance();
        Ok(Expr::new(kind, pos))
    }

    /// Comma separated expressions after an opening delimiter, trailing
    /// comma allowed.
    fn comma_list(&mut self, close: Token, context: &str) -> Result<Vec<Expr>, ScriptError> {
        let mut items = Vec::new();
        while !self.stream.check(&close) {
            items.push(self.expr()?);
            if !self.stream.eat(&Token::Comma) {
                break;
            }
        }
        self.stream.expect(close, context)?;
        Ok(items)
    }
}

fn binary(op: BinaryOp, left: Expr, right: Expr, pos: Pos) -> Expr {
    Expr::new(ExprKind::Binary(op, Box::new(left), Box::new(right)), pos)
}

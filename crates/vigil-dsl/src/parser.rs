use crate::ast::{Expr, Program, Stmt};
use crate::lexer::Lexer;
use crate::token::{Token, TokenKind};

/// Operator binding strength, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Precedence {
    Lowest,
    Logical,
    Equality,
    Relational,
    Sum,
    Product,
    Prefix,
    Call,
    Dot,
}

fn precedence_of(kind: TokenKind) -> Precedence {
    match kind {
        TokenKind::And | TokenKind::Or => Precedence::Logical,
        TokenKind::Eq | TokenKind::NotEq => Precedence::Equality,
        TokenKind::Lt | TokenKind::Gt | TokenKind::Lte | TokenKind::Gte => Precedence::Relational,
        TokenKind::Plus | TokenKind::Minus => Precedence::Sum,
        TokenKind::Asterisk | TokenKind::Slash => Precedence::Product,
        TokenKind::LParen => Precedence::Call,
        TokenKind::Dot => Precedence::Dot,
        _ => Precedence::Lowest,
    }
}

/// Pratt parser over the token stream.
///
/// Errors are collected rather than aborting the parse; a program that
/// produced any error must not be executed.
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    cur: Token,
    peek: Token,
    errors: Vec<String>,
}

impl<'a> Parser<'a> {
    pub fn new(mut lexer: Lexer<'a>) -> Self {
        let cur = lexer.next_token();
        let peek = lexer.next_token();
        Self {
            lexer,
            cur,
            peek,
            errors: Vec::new(),
        }
    }

    /// Convenience constructor from source text.
    pub fn from_source(source: &'a str) -> Self {
        Self::new(Lexer::new(source))
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    fn next_token(&mut self) {
        self.cur = std::mem::replace(&mut self.peek, self.lexer.next_token());
    }

    pub fn parse_program(&mut self) -> Program {
        let mut statements = Vec::new();

        while self.cur.kind != TokenKind::Eof {
            if let Some(stmt) = self.parse_statement() {
                statements.push(stmt);
            }
            self.next_token();
        }

        Program { statements }
    }

    fn parse_statement(&mut self) -> Option<Stmt> {
        match self.cur.kind {
            TokenKind::When => self.parse_when_statement(),
            _ => self.parse_expression_statement(),
        }
    }

    fn parse_when_statement(&mut self) -> Option<Stmt> {
        self.next_token();
        let condition = self.parse_expression(Precedence::Lowest)?;

        if !self.expect_peek(TokenKind::LBrace) {
            return None;
        }

        let body = self.parse_block_statement();
        Some(Stmt::When { condition, body })
    }

    fn parse_block_statement(&mut self) -> Vec<Stmt> {
        let mut statements = Vec::new();
        self.next_token();

        while self.cur.kind != TokenKind::RBrace && self.cur.kind != TokenKind::Eof {
            if let Some(stmt) = self.parse_statement() {
                statements.push(stmt);
            }
            self.next_token();
        }

        statements
    }

    fn parse_expression_statement(&mut self) -> Option<Stmt> {
        let expr = self.parse_expression(Precedence::Lowest)?;

        if self.peek.kind == TokenKind::Semicolon {
            self.next_token();
        }

        Some(Stmt::Expr(expr))
    }

    fn parse_expression(&mut self, precedence: Precedence) -> Option<Expr> {
        let mut left = self.parse_prefix()?;

        while self.peek.kind != TokenKind::Semicolon && precedence < precedence_of(self.peek.kind) {
            left = match self.peek.kind {
                TokenKind::Eq
                | TokenKind::NotEq
                | TokenKind::Lt
                | TokenKind::Gt
                | TokenKind::Lte
                | TokenKind::Gte
                | TokenKind::And
                | TokenKind::Or
                | TokenKind::Plus
                | TokenKind::Minus
                | TokenKind::Asterisk
                | TokenKind::Slash => {
                    self.next_token();
                    self.parse_infix_expression(left)?
                }
                TokenKind::LParen => {
                    self.next_token();
                    self.parse_call_expression(left)?
                }
                TokenKind::Dot => {
                    self.next_token();
                    self.parse_dot_expression(left)?
                }
                _ => return Some(left),
            };
        }

        Some(left)
    }

    fn parse_prefix(&mut self) -> Option<Expr> {
        match self.cur.kind {
            TokenKind::Ident => Some(Expr::Identifier(self.cur.literal.clone())),
            TokenKind::Int => self.parse_integer_literal(),
            TokenKind::Float => self.parse_float_literal(),
            TokenKind::Str => Some(Expr::StringLiteral(self.cur.literal.clone())),
            TokenKind::Not | TokenKind::Minus => self.parse_prefix_expression(),
            TokenKind::LParen => self.parse_grouped_expression(),
            kind => {
                self.errors.push(format!(
                    "no prefix parse rule for {} at line {}, column {}",
                    kind, self.cur.line, self.cur.column
                ));
                None
            }
        }
    }

    fn parse_integer_literal(&mut self) -> Option<Expr> {
        let value: i64 = match self.cur.literal.parse() {
            Ok(v) => v,
            Err(_) => {
                self.errors
                    .push(format!("could not parse {:?} as integer", self.cur.literal));
                return None;
            }
        };
        Some(self.attach_unit(Expr::IntegerLiteral(value)))
    }

    fn parse_float_literal(&mut self) -> Option<Expr> {
        let value: f64 = match self.cur.literal.parse() {
            Ok(v) => v,
            Err(_) => {
                self.errors
                    .push(format!("could not parse {:?} as float", self.cur.literal));
                return None;
            }
        };
        Some(self.attach_unit(Expr::FloatLiteral(value)))
    }

    /// Postfix unit attachment: the only place units enter the tree.
    fn attach_unit(&mut self, literal: Expr) -> Expr {
        if self.peek.kind.is_unit() {
            self.next_token();
            Expr::Unit {
                value: Box::new(literal),
                unit: self.cur.literal.clone(),
            }
        } else {
            literal
        }
    }

    fn parse_prefix_expression(&mut self) -> Option<Expr> {
        let operator = self.cur.literal.clone();
        self.next_token();
        let right = self.parse_expression(Precedence::Prefix)?;
        Some(Expr::Prefix {
            operator,
            right: Box::new(right),
        })
    }

    fn parse_infix_expression(&mut self, left: Expr) -> Option<Expr> {
        let operator = self.cur.literal.clone();
        let precedence = precedence_of(self.cur.kind);
        self.next_token();
        let right = self.parse_expression(precedence)?;
        Some(Expr::Infix {
            operator,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    fn parse_grouped_expression(&mut self) -> Option<Expr> {
        self.next_token();
        let expr = self.parse_expression(Precedence::Lowest)?;
        if !self.expect_peek(TokenKind::RParen) {
            return None;
        }
        Some(expr)
    }

    fn parse_call_expression(&mut self, function: Expr) -> Option<Expr> {
        let args = self.parse_expression_list(TokenKind::RParen)?;
        Some(Expr::Call {
            function: Box::new(function),
            args,
        })
    }

    fn parse_dot_expression(&mut self, left: Expr) -> Option<Expr> {
        self.next_token();
        let right = self.parse_expression(Precedence::Dot)?;
        Some(Expr::Dot {
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    fn parse_expression_list(&mut self, end: TokenKind) -> Option<Vec<Expr>> {
        let mut args = Vec::new();

        if self.peek.kind == end {
            self.next_token();
            return Some(args);
        }

        self.next_token();
        args.push(self.parse_expression(Precedence::Lowest)?);

        while self.peek.kind == TokenKind::Comma {
            self.next_token();
            self.next_token();
            args.push(self.parse_expression(Precedence::Lowest)?);
        }

        if !self.expect_peek(end) {
            return None;
        }

        Some(args)
    }

    fn expect_peek(&mut self, kind: TokenKind) -> bool {
        if self.peek.kind == kind {
            self.next_token();
            true
        } else {
            self.errors.push(format!(
                "expected next token to be {}, got {} instead at line {}, column {}",
                kind, self.peek.kind, self.peek.line, self.peek.column
            ));
            false
        }
    }
}

/// Lex and parse one rule program, returning the AST or the collected
/// parse errors.
pub fn parse(source: &str) -> Result<Program, Vec<String>> {
    let mut parser = Parser::from_source(source);
    let program = parser.parse_program();
    if parser.errors.is_empty() {
        Ok(program)
    } else {
        Err(parser.errors)
    }
}

use std::fmt;

use tracing::error;

use crate::{
    ast::{
        Assignment, BinaryOperator, Body, ElseStatement, Expr, Factor, FunctionCall,
        FunctionDecl, Ident, IfStatement, Primary, Statement, Term, TypeName, Unary, Unit,
        UseDecl, VariableDecl,
    },
    token::{Token, TokenKind},
};

/// On failure, the (partial) parsed element is returned alongside the errors.
pub type ParseResult<T> = Result<T, (T, Vec<Error>)>;

/// Parses a whole source file.
///
/// The first top-level declaration that fails to parse stops the parsing of
/// the unit; every declaration before it is kept in the returned unit.
pub fn parse_unit(tokens: &[Token]) -> ParseResult<Unit> {
    let mut p = Parser::new(tokens);
    let unit = p.parse_unit();
    if p.errors.is_empty() {
        Ok(unit)
    } else {
        Err((unit, p.errors))
    }
}

/// Parses a single expression spanning all of the provided tokens.
pub fn parse_expr(tokens: &[Token]) -> Result<Expr, (Option<Expr>, Vec<Error>)> {
    let mut p = Parser::new(tokens);
    let expr = p.parse_expr();
    if expr.is_some() {
        _ = p.expect(&TokenKind::EndOfUnit);
    }
    match expr {
        Some(expr) if p.errors.is_empty() => Ok(expr),
        expr => Err((expr, p.errors)),
    }
}

struct Parser<'tok> {
    tokens: &'tok [Token],
    cursor: usize,
    errors: Vec<Error>,
    errors_enabled: bool,
    start: Token,
    end: Token,
}

impl Parser<'_> {
    fn parse_unit(&mut self) -> Unit {
        let mut unit = Unit::default();
        while !self.is(&TokenKind::EndOfUnit) {
            if self.is(&TokenKind::Use) {
                let Some(use_decl) = self.parse_use() else {
                    break;
                };
                unit.uses.push(use_decl);
            } else {
                let Some(function) = self.parse_function() else {
                    break;
                };
                unit.functions.push(function);
            }
        }
        unit
    }

    fn parse_use(&mut self) -> Option<UseDecl> {
        let line = self.current().line;
        self.expect(&TokenKind::Use)?;
        let path = self.parse_string()?;
        self.expect(&TokenKind::Semicolon)?;
        Some(UseDecl { path, line })
    }

    fn parse_function(&mut self) -> Option<FunctionDecl> {
        self.expect(&TokenKind::Fn)?;
        let name = self.parse_ident()?;
        self.expect(&TokenKind::LParen)?;

        let params = if self.take(&TokenKind::RParen) {
            Vec::new()
        } else {
            let params = self.parse_variable_decl_list()?;
            self.expect(&TokenKind::RParen)?;
            params
        };

        let result = if self.optional(&TokenKind::Arrow) {
            Some(self.parse_variable_decl()?)
        } else {
            None
        };

        let body = self.parse_body()?;
        Some(FunctionDecl {
            name,
            params,
            result,
            body,
        })
    }

    fn parse_variable_decl(&mut self) -> Option<VariableDecl> {
        let ty = self.parse_typename()?;
        let name = self.parse_ident()?;
        Some(VariableDecl { ty, name })
    }

    /// A missing first declaration is reported but doesn't fail the list.
    fn parse_variable_decl_list(&mut self) -> Option<Vec<VariableDecl>> {
        let mut decls = Vec::with_capacity(4);
        match self.parse_variable_decl() {
            Some(decl) => decls.push(decl),
            None => self.error(ErrorKind::EmptyDeclList),
        }
        while self.take(&TokenKind::Comma) {
            decls.push(self.parse_variable_decl()?);
        }
        Some(decls)
    }

    fn parse_body(&mut self) -> Option<Body> {
        self.expect(&TokenKind::LBrace)?;
        let mut statements = Vec::new();
        while !self.is(&TokenKind::RBrace) {
            let Some(statement) = self.parse_statement() else {
                break;
            };
            statements.push(statement);
        }
        self.expect(&TokenKind::RBrace)?;
        Some(Body { statements })
    }

    fn parse_statement(&mut self) -> Option<Statement> {
        if self.is(&TokenKind::If) {
            return self.parse_if().map(Statement::If);
        }

        let is_call = matches!(self.current().kind, TokenKind::Identifier(_))
            && self.peek().is(&TokenKind::LParen);
        let statement = if is_call {
            Statement::Call(self.parse_call()?)
        } else if matches!(self.current().kind, TokenKind::Typename(_)) {
            Statement::VariableDecl(self.parse_variable_decl()?)
        } else {
            Statement::Assignment(self.parse_assignment()?)
        };
        self.expect(&TokenKind::Semicolon)?;
        Some(statement)
    }

    fn parse_if(&mut self) -> Option<IfStatement> {
        self.expect(&TokenKind::If)?;
        let condition = self.parse_expr()?;
        let body = self.parse_body()?;
        let else_branch = if self.optional(&TokenKind::Else) {
            Some(ElseStatement {
                body: self.parse_body()?,
            })
        } else {
            None
        };
        Some(IfStatement {
            condition,
            body,
            else_branch,
        })
    }

    fn parse_assignment(&mut self) -> Option<Assignment> {
        let target = self.parse_ident()?;
        self.expect(&TokenKind::Equals)?;
        let value = self.parse_expr()?;
        Some(Assignment { target, value })
    }

    fn parse_expr(&mut self) -> Option<Expr> {
        let term = self.parse_term()?;
        Some(Expr { term })
    }

    fn parse_term(&mut self) -> Option<Term> {
        let head = self.parse_factor()?;
        let mut tail = Vec::new();
        while let Some(op) = self.take_operator(&['+', '-']) {
            tail.push((op, self.parse_factor()?));
        }
        Some(Term { head, tail })
    }

    fn parse_factor(&mut self) -> Option<Factor> {
        let head = self.parse_unary()?;
        let mut tail = Vec::new();
        while let Some(op) = self.take_operator(&['*', '/']) {
            tail.push((op, self.parse_unary()?));
        }
        Some(Factor { head, tail })
    }

    fn parse_unary(&mut self) -> Option<Unary> {
        if self.is(&TokenKind::Minus) {
            let line = self.current().line;
            self.advance();
            let operand = self.parse_unary()?;
            return Some(Unary::Negate {
                operand: Box::new(operand),
                line,
            });
        }
        self.parse_primary().map(Unary::Primary)
    }

    fn parse_primary(&mut self) -> Option<Primary> {
        match self.current().kind {
            TokenKind::Number(value) => {
                self.advance();
                Some(Primary::Number(value))
            }
            TokenKind::String(_) => self.parse_string().map(Primary::String),
            TokenKind::Identifier(_) if self.peek().is(&TokenKind::LParen) => {
                self.parse_call().map(Primary::Call)
            }
            TokenKind::Identifier(_) => self.parse_ident().map(Primary::Ident),
            _ => self.parse_group(),
        }
    }

    fn parse_group(&mut self) -> Option<Primary> {
        self.expect(&TokenKind::LParen)?;
        let expr = self.parse_expr()?;
        self.expect(&TokenKind::RParen)?;
        Some(Primary::Group(Box::new(expr)))
    }

    fn parse_call(&mut self) -> Option<FunctionCall> {
        let callee = self.parse_ident()?;
        self.expect(&TokenKind::LParen)?;
        let mut args = Vec::new();
        while !self.is(&TokenKind::RParen) {
            if !args.is_empty() {
                self.expect(&TokenKind::Comma)?;
            }
            let Some(arg) = self.parse_expr() else {
                self.error(ErrorKind::InvalidArgument);
                return None;
            };
            args.push(arg);
        }
        self.expect(&TokenKind::RParen)?;
        Some(FunctionCall { callee, args })
    }

    fn parse_ident(&mut self) -> Option<Ident> {
        let token = self.current();
        let TokenKind::Identifier(name) = &token.kind else {
            self.error_expected(&TokenKind::Identifier(Box::default()));
            return None;
        };
        let ident = Ident {
            name: name.clone(),
            line: token.line,
        };
        self.advance();
        Some(ident)
    }

    fn parse_typename(&mut self) -> Option<TypeName> {
        let token = self.current();
        let TokenKind::Typename(name) = &token.kind else {
            self.error_expected(&TokenKind::Typename(Box::default()));
            return None;
        };
        let ident = Ident {
            name: name.clone(),
            line: token.line,
        };
        self.advance();
        Some(TypeName(ident))
    }

    fn parse_string(&mut self) -> Option<Box<[u8]>> {
        let TokenKind::String(bytes) = &self.current().kind else {
            self.error_expected(&TokenKind::String(Box::default()));
            return None;
        };
        let bytes = bytes.clone();
        self.advance();
        Some(bytes)
    }
}

impl<'tok> Parser<'tok> {
    fn new(tokens: &'tok [Token]) -> Parser<'tok> {
        let first_line = tokens.first().map_or(1, |t| t.line);
        let last_line = tokens.last().map_or(1, |t| t.line);
        Parser {
            tokens,
            cursor: 0,
            errors: Vec::with_capacity(8),
            errors_enabled: true,
            start: Token::new(TokenKind::StartOfUnit, first_line),
            end: Token::new(TokenKind::EndOfUnit, last_line),
        }
    }

    /// Returns the token under the cursor, or [`TokenKind::EndOfUnit`] once
    /// the input is exhausted.
    fn current(&self) -> &Token {
        self.tokens.get(self.cursor).unwrap_or(&self.end)
    }

    /// Returns the token after the current one.
    fn peek(&self) -> &Token {
        self.tokens.get(self.cursor + 1).unwrap_or(&self.end)
    }

    /// Returns the token before the current one. Yields
    /// [`TokenKind::StartOfUnit`] at the very beginning.
    fn previous(&self) -> &Token {
        match self.cursor.checked_sub(1) {
            Some(i) => self.tokens.get(i).unwrap_or(&self.end),
            None => &self.start,
        }
    }

    fn advance(&mut self) {
        if self.cursor < self.tokens.len() {
            self.cursor += 1;
        }
    }

    /// Checks whether the current token has the same kind as the given one.
    fn is(&self, kind: &TokenKind) -> bool {
        self.current().is(kind)
    }

    /// Advances if the current token matches the provided one, returning true.
    /// If not, returns false and doesn't advance.
    fn take(&mut self, kind: &TokenKind) -> bool {
        if self.is(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Advances if the current token matches the provided one. If not,
    /// records an error.
    fn expect(&mut self, kind: &TokenKind) -> Option<()> {
        if self.is(kind) {
            self.advance();
            Some(())
        } else {
            self.error_expected(kind);
            None
        }
    }

    /// Like [`Parser::expect`], but for constructs that may be absent: errors
    /// are turned off for the check.
    fn optional(&mut self, kind: &TokenKind) -> bool {
        let enabled = self.errors_enabled;
        self.set_errors_enabled(false);
        let present = self.expect(kind).is_some();
        self.set_errors_enabled(enabled);
        present
    }

    /// Advances over an arithmetic operator among the provided ones, returning
    /// the operator its literal character denotes.
    fn take_operator(&mut self, accepted: &[char]) -> Option<BinaryOperator> {
        let c = self.current().kind.operator_char()?;
        if !accepted.contains(&c) {
            return None;
        }
        self.advance();
        BinaryOperator::from_char(c)
    }

    fn set_errors_enabled(&mut self, enabled: bool) {
        self.errors_enabled = enabled;
    }

    fn error_expected(&mut self, expected: &TokenKind) {
        let kind = ErrorKind::Expected {
            expected: expected.clone(),
            previous: self.previous().kind.clone(),
            next: self.peek().kind.clone(),
            actual: self.current().kind.clone(),
        };
        self.error(kind);
    }

    /// Records an error on the current line, unless errors are turned off.
    fn error(&mut self, kind: ErrorKind) {
        if !self.errors_enabled {
            return;
        }
        let error = Error {
            line: self.current().line,
            kind,
        };
        error!("{error}");
        self.errors.push(error);
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Error {
    pub line: u32,
    pub kind: ErrorKind,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Expected {
        expected: TokenKind,
        previous: TokenKind,
        next: TokenKind,
        actual: TokenKind,
    },
    EmptyDeclList,
    InvalidArgument,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.kind)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Expected {
                expected,
                previous,
                next,
                actual,
            } => write!(
                f,
                "expected {expected} (between {previous} and {next}), instead got {actual}"
            ),
            ErrorKind::EmptyDeclList => write!(f, "variable declaration list is empty"),
            ErrorKind::InvalidArgument => write!(
                f,
                "expected expression for function argument, instead got invalid expression"
            ),
        }
    }
}

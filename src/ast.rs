// unit ::= (use | function)*
// use ::= 'use' STRING ';'
// function ::= 'fn' ID '(' [decl (',' decl)*] ')' ['->' decl] body
// decl ::= TYPE ID
// body ::= '{' statement* '}'
// statement ::= (call | decl | assignment) ';'
//             | if
// if ::= 'if' expr body ['else' body]
// assignment ::= ID '=' expr
// expr ::= term
// term ::= factor (('+' | '-') factor)*
// factor ::= unary (('*' | '/') unary)*
// unary ::= '-' unary | primary
// primary ::= NUMBER | STRING | call | ID | '(' expr ')'
// call ::= ID '(' [expr (',' expr)*] ')'

use std::fmt;

#[derive(Debug, PartialEq, Default)]
pub struct Unit {
    pub uses: Vec<UseDecl>,
    pub functions: Vec<FunctionDecl>,
}

#[derive(Debug, PartialEq)]
pub struct UseDecl {
    /// Module path, as written between the quotes.
    pub path: Box<[u8]>,
    pub line: u32,
}

#[derive(Debug, PartialEq)]
pub struct FunctionDecl {
    pub name: Ident,
    /// Parameters, in declaration order.
    pub params: Vec<VariableDecl>,
    /// The named result value, if any.
    pub result: Option<VariableDecl>,
    pub body: Body,
}

impl FunctionDecl {
    /// Returns the signature as written in source, e.g.
    /// `fn add(i64 a, i64 b) -> i64 c`.
    pub fn signature(&self) -> String {
        let params: Vec<_> = self.params.iter().map(ToString::to_string).collect();
        let mut signature = format!("fn {}({})", self.name, params.join(", "));
        if let Some(result) = &self.result {
            signature.push_str(&format!(" -> {result}"));
        }
        signature
    }
}

#[derive(Debug, PartialEq)]
pub struct VariableDecl {
    pub ty: TypeName,
    pub name: Ident,
}

impl fmt::Display for VariableDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.ty, self.name)
    }
}

#[derive(Debug, PartialEq, Default)]
pub struct Body {
    pub statements: Vec<Statement>,
}

#[derive(Debug, PartialEq)]
pub enum Statement {
    Assignment(Assignment),
    /// A call whose result is discarded.
    Call(FunctionCall),
    VariableDecl(VariableDecl),
    If(IfStatement),
}

#[derive(Debug, PartialEq)]
pub struct IfStatement {
    pub condition: Expr,
    pub body: Body,
    pub else_branch: Option<ElseStatement>,
}

#[derive(Debug, PartialEq)]
pub struct ElseStatement {
    pub body: Body,
}

#[derive(Debug, PartialEq)]
pub struct Assignment {
    pub target: Ident,
    pub value: Expr,
}

#[derive(Debug, PartialEq)]
pub struct Expr {
    pub term: Term,
}

/// Additive chain. Operators are recorded left to right, one per operand
/// after the head.
#[derive(Debug, PartialEq)]
pub struct Term {
    pub head: Factor,
    pub tail: Vec<(BinaryOperator, Factor)>,
}

/// Multiplicative chain.
#[derive(Debug, PartialEq)]
pub struct Factor {
    pub head: Unary,
    pub tail: Vec<(BinaryOperator, Unary)>,
}

#[derive(Debug, PartialEq)]
pub enum Unary {
    Negate { operand: Box<Unary>, line: u32 },
    Primary(Primary),
}

#[derive(Debug, PartialEq)]
pub enum Primary {
    Number(u64),
    /// Raw bytes between the quotes, escapes not yet interpreted.
    String(Box<[u8]>),
    Ident(Ident),
    Call(FunctionCall),
    Group(Box<Expr>),
}

#[derive(Debug, PartialEq)]
pub struct FunctionCall {
    pub callee: Ident,
    pub args: Vec<Expr>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BinaryOperator {
    Add,
    Sub,
    Mul,
    Div,
}

impl BinaryOperator {
    pub fn from_char(c: char) -> Option<BinaryOperator> {
        match c {
            '+' => Some(BinaryOperator::Add),
            '-' => Some(BinaryOperator::Sub),
            '*' => Some(BinaryOperator::Mul),
            '/' => Some(BinaryOperator::Div),
            _ => None,
        }
    }

    pub fn as_char(self) -> char {
        match self {
            BinaryOperator::Add => '+',
            BinaryOperator::Sub => '-',
            BinaryOperator::Mul => '*',
            BinaryOperator::Div => '/',
        }
    }
}

#[derive(Debug, PartialEq)]
pub struct TypeName(pub Ident);

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, PartialEq)]
pub struct Ident {
    pub name: Box<str>,
    pub line: u32,
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

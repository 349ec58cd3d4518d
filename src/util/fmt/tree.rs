use std::io::Write;

use crate::ast::*;

const INDENT_WIDTH: usize = 2;

pub fn print_unit_string(unit: &Unit) -> String {
    let mut buf = Vec::with_capacity(1024);
    print_unit(&mut buf, unit).unwrap();
    String::from_utf8(buf).unwrap()
}

pub fn print_expr_string(expr: &Expr) -> String {
    let mut buf = Vec::with_capacity(512);
    print_expr(&mut buf, 0, expr).unwrap();
    String::from_utf8(buf).unwrap()
}

pub fn print_unit(w: &mut impl Write, unit: &Unit) -> std::io::Result<()> {
    writeln!(w, "unit")?;
    for use_decl in &unit.uses {
        sp(w, 1)?;
        writeln!(w, "use \"{}\"", use_decl.path.escape_ascii())?;
    }
    for function in &unit.functions {
        sp(w, 1)?;
        writeln!(w, "{}", function.signature())?;
        print_body(w, 2, &function.body)?;
    }
    Ok(())
}

fn print_body(w: &mut impl Write, i: usize, body: &Body) -> std::io::Result<()> {
    for statement in &body.statements {
        print_statement(w, i, statement)?;
    }
    Ok(())
}

fn print_statement(w: &mut impl Write, i: usize, statement: &Statement) -> std::io::Result<()> {
    match statement {
        Statement::Assignment(Assignment { target, value }) => {
            sp(w, i)?;
            writeln!(w, "assign {target}")?;
            print_expr(w, i + 1, value)?;
        }
        Statement::Call(call) => print_call(w, i, call)?,
        Statement::VariableDecl(decl) => {
            sp(w, i)?;
            writeln!(w, "decl {decl}")?;
        }
        Statement::If(IfStatement {
            condition,
            body,
            else_branch,
        }) => {
            sp(w, i)?;
            writeln!(w, "if")?;
            print_expr(w, i + 1, condition)?;
            sp(w, i + 1)?;
            writeln!(w, "then")?;
            print_body(w, i + 2, body)?;
            if let Some(else_branch) = else_branch {
                sp(w, i + 1)?;
                writeln!(w, "else")?;
                print_body(w, i + 2, &else_branch.body)?;
            }
        }
    }
    Ok(())
}

pub fn print_expr(w: &mut impl Write, i: usize, expr: &Expr) -> std::io::Result<()> {
    print_term(w, i, &expr.term)
}

// Chains with a single operand are printed as that operand alone.

fn print_term(w: &mut impl Write, i: usize, term: &Term) -> std::io::Result<()> {
    if term.tail.is_empty() {
        return print_factor(w, i, &term.head);
    }
    sp(w, i)?;
    writeln!(w, "term")?;
    print_factor(w, i + 1, &term.head)?;
    for (op, factor) in &term.tail {
        print_operator(w, i + 1, *op)?;
        print_factor(w, i + 1, factor)?;
    }
    Ok(())
}

fn print_factor(w: &mut impl Write, i: usize, factor: &Factor) -> std::io::Result<()> {
    if factor.tail.is_empty() {
        return print_unary(w, i, &factor.head);
    }
    sp(w, i)?;
    writeln!(w, "factor")?;
    print_unary(w, i + 1, &factor.head)?;
    for (op, unary) in &factor.tail {
        print_operator(w, i + 1, *op)?;
        print_unary(w, i + 1, unary)?;
    }
    Ok(())
}

fn print_operator(w: &mut impl Write, i: usize, op: BinaryOperator) -> std::io::Result<()> {
    sp(w, i)?;
    writeln!(w, "operator {}", op.as_char())
}

fn print_unary(w: &mut impl Write, i: usize, unary: &Unary) -> std::io::Result<()> {
    match unary {
        Unary::Negate { operand, line: _ } => {
            sp(w, i)?;
            writeln!(w, "negate")?;
            print_unary(w, i + 1, operand)
        }
        Unary::Primary(primary) => print_primary(w, i, primary),
    }
}

fn print_primary(w: &mut impl Write, i: usize, primary: &Primary) -> std::io::Result<()> {
    if let Primary::Call(call) = primary {
        return print_call(w, i, call);
    }
    sp(w, i)?;
    match primary {
        Primary::Number(value) => writeln!(w, "int {value}"),
        Primary::String(bytes) => writeln!(w, "string \"{}\"", bytes.escape_ascii()),
        Primary::Ident(ident) => writeln!(w, "ident {ident}"),
        Primary::Group(inner) => {
            writeln!(w, "group")?;
            print_expr(w, i + 1, inner)
        }
        Primary::Call(_) => Ok(()),
    }
}

fn print_call(w: &mut impl Write, i: usize, call: &FunctionCall) -> std::io::Result<()> {
    sp(w, i)?;
    writeln!(w, "call {}", call.callee)?;
    for arg in &call.args {
        print_expr(w, i + 1, arg)?;
    }
    Ok(())
}

fn sp(w: &mut impl Write, i: usize) -> std::io::Result<()> {
    write!(w, "{:width$}", "", width = i * INDENT_WIDTH)
}

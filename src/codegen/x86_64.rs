use std::{collections::HashMap, collections::HashSet, format_args as f};

use tracing::debug;

use crate::{
    ast::{
        self, BinaryOperator, Body, Expr, FunctionCall, FunctionDecl, Primary, Statement, Unary,
        VariableDecl,
    },
    codegen::{
        asm::{Operand, Reg, Slot, Symbol, ARG_REGS, RETURN_REG},
        data::Data,
        CompileError,
    },
    config::Config,
};

/// Seeded into the result slot, so that reading it before any assignment
/// stands out.
pub const RETURN_SENTINEL: u64 = 0xdead_beef;

/// Lowers the functions of one unit into instructions and data entries.
pub struct Generator<'a> {
    config: &'a Config,
    /// Every function a call may target.
    callable: &'a HashSet<&'a str>,
    label_prefix: &'a str,
    text: Vec<String>,
    data: Data,
    labels: usize,
    indent: bool,
    frame: Frame,
}

impl<'a> Generator<'a> {
    pub fn new(
        config: &'a Config,
        callable: &'a HashSet<&'a str>,
        label_prefix: &'a str,
    ) -> Generator<'a> {
        Generator {
            config,
            callable,
            label_prefix,
            text: Vec::with_capacity(256),
            data: Data::new(label_prefix),
            labels: 0,
            indent: false,
            frame: Frame::default(),
        }
    }

    /// Returns the text and the data section lines.
    pub fn finish(self) -> (Vec<String>, Data) {
        (self.text, self.data)
    }

    pub fn function(&mut self, function: &FunctionDecl) -> Result<(), CompileError> {
        self.frame = Frame::new(&function.name.name);
        debug!("lowering `{}`", function.signature());

        if function.params.len() > ARG_REGS.len() {
            return Err(CompileError::TooManyArguments {
                name: function.name.name.clone(),
                line: function.name.line,
            });
        }

        self.out(f!("; {}", function.signature()));
        self.label(Symbol(&function.name.name));
        self.indented(|this| {
            this.out("push rbp");
            this.out("mov rbp, rsp");
            let reserve_at = this.text.len();

            if let Some(result) = &function.result {
                let slot = this.declare(result)?;
                this.out(f!("mov rax, {RETURN_SENTINEL:#x}"));
                this.store(slot, &Operand::Reg(Reg::Rax));
                this.frame.result = Some(slot);
            }
            for (param, reg) in function.params.iter().zip(ARG_REGS) {
                let slot = this.declare(param)?;
                this.store(slot, &Operand::Reg(reg));
            }

            this.body(&function.body)?;

            let result = this.frame.result.map_or(Operand::Imm(0), Operand::Slot);
            this.load(RETURN_REG, &result);
            this.out("leave");
            this.out("ret");

            let reserve = this.line(f!("sub rsp, {}", this.frame.size()));
            this.text.insert(reserve_at, reserve);
            Ok(())
        })
    }

    fn body(&mut self, body: &Body) -> Result<(), CompileError> {
        for statement in &body.statements {
            self.statement(statement)?;
        }
        Ok(())
    }

    fn statement(&mut self, statement: &Statement) -> Result<(), CompileError> {
        match statement {
            Statement::Assignment(ast::Assignment { target, value }) => {
                let slot = self.lookup(target)?;
                let value = self.expr(value)?;
                self.store(slot, &value);
            }
            Statement::Call(call) => {
                self.call(call)?;
            }
            Statement::VariableDecl(decl) => {
                self.declare(decl)?;
            }
            Statement::If(if_statement) => self.if_statement(if_statement)?,
        }
        Ok(())
    }

    fn if_statement(&mut self, statement: &ast::IfStatement) -> Result<(), CompileError> {
        let n = self.labels;
        self.labels += 1;
        let else_label = format!("{}_if{n}_else", self.label_prefix);
        let end_label = format!("{}_if{n}_end", self.label_prefix);

        let condition = self.expr(&statement.condition)?;
        self.load(Reg::Rax, &condition);
        self.out("cmp rax, 0");
        self.out(f!("je {else_label}"));
        self.body(&statement.body)?;
        self.out(f!("jmp {end_label}"));
        self.label(&else_label);
        if let Some(else_branch) = &statement.else_branch {
            self.body(&else_branch.body)?;
        }
        self.label(&end_label);
        Ok(())
    }

    fn expr(&mut self, expr: &Expr) -> Result<Operand, CompileError> {
        let term = &expr.term;
        self.chain(&term.head, &term.tail, |this, factor| {
            this.chain(&factor.head, &factor.tail, Self::unary)
        })
    }

    /// Lowers `head (op operand)*` left to right. The running value is kept in
    /// a fresh slot, as lowering the next operand may clobber any register.
    fn chain<T>(
        &mut self,
        head: &T,
        tail: &[(BinaryOperator, T)],
        mut lower: impl FnMut(&mut Self, &T) -> Result<Operand, CompileError>,
    ) -> Result<Operand, CompileError> {
        let first = lower(self, head)?;
        if tail.is_empty() {
            return Ok(first);
        }
        let accumulator = self.frame.alloc(8);
        self.store(accumulator, &first);
        for (op, operand) in tail {
            let right = lower(self, operand)?;
            self.operation(*op, &Operand::Slot(accumulator), &right)?;
            self.store(accumulator, &Operand::Reg(Reg::Rbx));
        }
        Ok(Operand::Slot(accumulator))
    }

    /// Computes `left op right` into `rbx`.
    fn operation(
        &mut self,
        op: BinaryOperator,
        left: &Operand,
        right: &Operand,
    ) -> Result<(), CompileError> {
        let mnemonic = match op {
            BinaryOperator::Add => "add",
            BinaryOperator::Sub => "sub",
            BinaryOperator::Mul => "imul",
            BinaryOperator::Div => return Err(self.unsupported("division")),
        };
        self.load(Reg::Rcx, right);
        self.load(Reg::Rax, left);
        self.out(f!("{mnemonic} rax, rcx"));
        self.out("mov rbx, rax");
        Ok(())
    }

    fn unary(&mut self, unary: &Unary) -> Result<Operand, CompileError> {
        match unary {
            Unary::Negate { .. } => Err(self.unsupported("unary negation")),
            Unary::Primary(primary) => self.primary(primary),
        }
    }

    fn primary(&mut self, primary: &Primary) -> Result<Operand, CompileError> {
        match primary {
            Primary::Number(value) => Ok(Operand::Imm(*value)),
            Primary::String(raw) => Ok(Operand::Label(self.data.push_string(raw))),
            Primary::Ident(ident) => self.lookup(ident).map(Operand::Slot),
            Primary::Call(call) => self.call(call),
            Primary::Group(inner) => self.expr(inner),
        }
    }

    /// Arguments are evaluated into slots first and only then moved into
    /// registers, since evaluating an argument may itself involve a call.
    fn call(&mut self, call: &FunctionCall) -> Result<Operand, CompileError> {
        let callee = &call.callee;
        if !self.callable.contains(&*callee.name) {
            return Err(CompileError::UndefinedFunction {
                name: callee.name.clone(),
                line: callee.line,
            });
        }
        if call.args.len() > ARG_REGS.len() {
            return Err(CompileError::TooManyArguments {
                name: callee.name.clone(),
                line: callee.line,
            });
        }

        let mut slots = Vec::with_capacity(call.args.len());
        for arg in &call.args {
            let value = self.expr(arg)?;
            let slot = self.frame.alloc(8);
            self.store(slot, &value);
            slots.push(slot);
        }
        for (slot, reg) in slots.into_iter().zip(ARG_REGS) {
            self.load(reg, &Operand::Slot(slot));
        }
        self.out(f!("call {}", Symbol(&callee.name)));
        Ok(Operand::Reg(RETURN_REG))
    }

    /// Allocates a slot for a new local.
    fn declare(&mut self, decl: &VariableDecl) -> Result<Slot, CompileError> {
        let ty_name = &decl.ty.0;
        let Some(ty) = self.config.types.get(&ty_name.name) else {
            return Err(CompileError::UnknownType {
                name: ty_name.name.clone(),
                line: ty_name.line,
            });
        };
        let name = &decl.name;
        if self.frame.locals.contains_key(&name.name) {
            return Err(CompileError::Redeclared {
                name: name.name.clone(),
                line: name.line,
            });
        }
        let slot = self.frame.alloc(ty.size());
        debug!("`{name}` of type {ty} at {slot}");
        self.frame.locals.insert(name.name.clone(), slot);
        Ok(slot)
    }

    fn lookup(&self, ident: &ast::Ident) -> Result<Slot, CompileError> {
        match self.frame.locals.get(&ident.name) {
            Some(slot) => Ok(*slot),
            None => Err(CompileError::UndeclaredIdentifier {
                name: ident.name.clone(),
                line: ident.line,
            }),
        }
    }

    fn unsupported(&self, construct: &'static str) -> CompileError {
        CompileError::Unsupported {
            construct,
            function: self.frame.function.clone(),
        }
    }
}

/// Data movement.
impl Generator<'_> {
    fn load(&mut self, reg: Reg, operand: &Operand) {
        match operand {
            Operand::Reg(src) if *src == reg => {}
            Operand::Slot(slot) if slot.size == 1 => self.out(f!("movzx {reg}, {slot}")),
            _ => self.out(f!("mov {reg}, {operand}")),
        }
    }

    /// Memory to memory moves (and immediates, which may not fit a 32 bit
    /// operand) go through `rax`.
    fn store(&mut self, slot: Slot, operand: &Operand) {
        match operand {
            Operand::Reg(reg) if slot.size == 1 => self.out(f!("mov {slot}, {}", reg.byte_name())),
            Operand::Reg(reg) => self.out(f!("mov {slot}, {reg}")),
            other => {
                self.load(Reg::Rax, other);
                self.store(slot, &Operand::Reg(Reg::Rax));
            }
        }
    }
}

/// Utility functions.
impl Generator<'_> {
    /// Prints a line.
    fn out(&mut self, f: impl std::fmt::Display) {
        let line = self.line(f);
        self.text.push(line);
    }

    fn line(&self, f: impl std::fmt::Display) -> String {
        let indent = if self.indent { "    " } else { "" };
        format!("{indent}{f}")
    }

    /// Prints a label, never indented.
    fn label(&mut self, name: impl std::fmt::Display) {
        self.text.push(format!("{name}:"));
    }

    /// Writes in an indented block that is finished with an empty line.
    fn indented<T>(&mut self, f: impl FnOnce(&mut Self) -> T) -> T {
        self.indent = true;
        let res = f(self);
        self.indent = false;
        self.text.push(String::new());
        res
    }
}

/// Per function state. Slots are bump allocated and never reused.
#[derive(Debug, Default)]
struct Frame {
    function: Box<str>,
    /// Slots of parameters and locals, sized by their declared type.
    locals: HashMap<Box<str>, Slot>,
    cursor: usize,
    result: Option<Slot>,
}

impl Frame {
    fn new(function: &str) -> Frame {
        Frame {
            function: function.into(),
            ..Frame::default()
        }
    }

    fn alloc(&mut self, size: usize) -> Slot {
        self.cursor = (self.cursor + size).next_multiple_of(size);
        Slot {
            offset: self.cursor,
            size,
        }
    }

    /// The bytes to reserve, keeping the stack 16 byte aligned.
    fn size(&self) -> usize {
        self.cursor.next_multiple_of(16)
    }
}

//! Registers, operands and symbols of the emitted NASM x86-64 code.

use std::fmt;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Reg {
    Rax,
    Rbx,
    Rcx,
    Rdx,
    Rsi,
    Rdi,
    R8,
    R9,
}

/// Registers of the outgoing arguments, in order.
pub const ARG_REGS: [Reg; 6] = [Reg::Rdi, Reg::Rsi, Reg::Rdx, Reg::Rcx, Reg::R8, Reg::R9];

/// Holds a function's return value.
pub const RETURN_REG: Reg = Reg::Rax;

impl Reg {
    pub fn name(self) -> &'static str {
        match self {
            Reg::Rax => "rax",
            Reg::Rbx => "rbx",
            Reg::Rcx => "rcx",
            Reg::Rdx => "rdx",
            Reg::Rsi => "rsi",
            Reg::Rdi => "rdi",
            Reg::R8 => "r8",
            Reg::R9 => "r9",
        }
    }

    /// The name of the lowest byte of the register.
    pub fn byte_name(self) -> &'static str {
        match self {
            Reg::Rax => "al",
            Reg::Rbx => "bl",
            Reg::Rcx => "cl",
            Reg::Rdx => "dl",
            Reg::Rsi => "sil",
            Reg::Rdi => "dil",
            Reg::R8 => "r8b",
            Reg::R9 => "r9b",
        }
    }
}

impl fmt::Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A byte range of the current frame, below the frame base.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Slot {
    pub offset: usize,
    pub size: usize,
}

impl Slot {
    pub fn width(self) -> &'static str {
        if self.size == 1 {
            "byte"
        } else {
            "qword"
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [rbp-{}]", self.width(), self.offset)
    }
}

/// Where the value of a lowered expression lives.
///
/// A [`Operand::Reg`] is only valid until the next instruction that may
/// clobber it, so consumers must use it right away.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Operand {
    Imm(u64),
    Slot(Slot),
    Reg(Reg),
    /// The address of a data section entry.
    Label(String),
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Imm(value) => write!(f, "{value}"),
            Operand::Slot(slot) => slot.fmt(f),
            Operand::Reg(reg) => reg.fmt(f),
            Operand::Label(label) => f.write_str(label),
        }
    }
}

/// A function symbol. Written with NASM's `$` prefix so that names such as
/// `add` or `syscall` are never read as mnemonics.
#[derive(Copy, Clone)]
pub struct Symbol<'a>(pub &'a str);

impl fmt::Display for Symbol<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}", self.0)
    }
}

/// Turns a file name into something usable as a label prefix.
pub fn sanitize_label(name: &str) -> String {
    let mut label: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    if !label.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_') {
        label.insert(0, '_');
    }
    label
}

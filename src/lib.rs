/// The lexer takes the source input, mapping it into a sequence of tokens.
pub mod lexer;

/// The parser takes a sequence of tokens, mapping it into an AST.
pub mod parser;

/// The code generator lowers an AST into NASM assembly, compiling the units
/// it depends on along the way.
pub mod codegen;

/// The link orchestrator gathers the object files of a compiled program and
/// hands them to the linker.
pub mod link;

/// The driver runs the whole pipeline for a root source file.
pub mod driver;

pub mod ast;
pub mod config;
pub mod token;
pub mod toolchain;
pub mod types;
pub mod util;

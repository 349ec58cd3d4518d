use std::{
    collections::HashSet,
    fs, io,
    path::{Path, PathBuf},
};

use tracing::{debug, info};

use crate::{
    ast::Unit,
    codegen::{
        asm::{sanitize_label, Symbol, ARG_REGS},
        x86_64::Generator,
    },
    config::{Config, ASSEMBLY_EXTENSION, OBJECT_EXTENSION},
    lexer, parser,
    toolchain::{Toolchain, ToolchainError},
};

pub mod asm;
pub mod data;
mod x86_64;

pub use x86_64::RETURN_SENTINEL;

/// The runtime routine every unit may call. It forwards its arguments to the
/// `syscall` instruction (the first one being the system call number) and is
/// emitted by the root unit only.
pub const RUNTIME_SYSCALL: &str = "syscall";

const SYSCALL_ROUTINE: &[&str] = &[
    "mov rax, rdi",
    "mov rdi, rsi",
    "mov rsi, rdx",
    "mov rdx, rcx",
    "mov r10, r8",
    "mov r8, r9",
    "syscall",
    "ret",
];

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Mode {
    /// The root unit, which also carries the process entry point.
    Standalone,
    /// A unit compiled because of a `use` declaration.
    Dependency,
}

/// The output of compiling one source file: an assembly file, its object file,
/// the exported symbols, and the compiled dependencies.
#[derive(Debug)]
pub struct CompiledUnit {
    source: PathBuf,
    asm_path: PathBuf,
    object_path: PathBuf,
    mode: Mode,
    exports: Vec<Box<str>>,
    dependencies: Vec<CompiledUnit>,
}

impl CompiledUnit {
    /// Output files are placed next to `source`, with the same stem.
    pub fn new(source: impl Into<PathBuf>) -> CompiledUnit {
        let source = source.into();
        CompiledUnit {
            asm_path: source.with_extension(ASSEMBLY_EXTENSION),
            object_path: source.with_extension(OBJECT_EXTENSION),
            source,
            mode: Mode::Standalone,
            exports: Vec::new(),
            dependencies: Vec::new(),
        }
    }

    /// Compiles the dependencies of `unit`, then `unit` itself, and assembles
    /// the result.
    ///
    /// Nothing is written for this unit if one of its dependencies fails.
    pub fn compile(
        &mut self,
        config: &Config,
        unit: &Unit,
        mode: Mode,
        toolchain: &dyn Toolchain,
    ) -> Result<(), CompileError> {
        let mut in_progress = vec![canonical(&self.source)];
        self.compile_nested(config, unit, mode, toolchain, &mut in_progress)
    }

    /// Reads, lexes and parses `path` before compiling it.
    pub fn compile_file(
        config: &Config,
        path: &Path,
        mode: Mode,
        toolchain: &dyn Toolchain,
    ) -> Result<CompiledUnit, CompileError> {
        Self::compile_file_nested(config, path, mode, toolchain, &mut Vec::new())
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn asm_path(&self) -> &Path {
        &self.asm_path
    }

    pub fn object_path(&self) -> &Path {
        &self.object_path
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Symbols defined by this unit, in definition order.
    pub fn exports(&self) -> &[Box<str>] {
        &self.exports
    }

    pub fn dependencies(&self) -> &[CompiledUnit] {
        &self.dependencies
    }

    /// Symbols exported by every transitive dependency, depth first,
    /// without duplicates.
    pub fn dependency_exports(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        let mut exports = Vec::new();
        let mut stack: Vec<&CompiledUnit> = self.dependencies.iter().rev().collect();
        while let Some(unit) = stack.pop() {
            for export in &unit.exports {
                if seen.insert(&**export) {
                    exports.push(&**export);
                }
            }
            stack.extend(unit.dependencies.iter().rev());
        }
        exports
    }

    fn compile_file_nested(
        config: &Config,
        path: &Path,
        mode: Mode,
        toolchain: &dyn Toolchain,
        in_progress: &mut Vec<PathBuf>,
    ) -> Result<CompiledUnit, CompileError> {
        let src = fs::read(path).map_err(|source| CompileError::Io {
            path: path.to_owned(),
            source,
        })?;
        let (tokens, _) = lexer::lex_in_new(&src, config);
        let unit = parser::parse_unit(&tokens).map_err(|(_, errors)| CompileError::Syntax {
            path: path.to_owned(),
            count: errors.len(),
        })?;

        let mut compiled = CompiledUnit::new(path);
        in_progress.push(canonical(path));
        let result = compiled.compile_nested(config, &unit, mode, toolchain, in_progress);
        in_progress.pop();
        result.map(|()| compiled)
    }

    fn compile_nested(
        &mut self,
        config: &Config,
        unit: &Unit,
        mode: Mode,
        toolchain: &dyn Toolchain,
        in_progress: &mut Vec<PathBuf>,
    ) -> Result<(), CompileError> {
        info!("compiling {}", self.source.display());
        self.mode = mode;
        self.exports.clear();
        self.dependencies.clear();

        for use_decl in &unit.uses {
            let module = String::from_utf8_lossy(&use_decl.path);
            let path = config.module_path(&self.source, &module);
            if in_progress.contains(&canonical(&path)) {
                return Err(CompileError::DependencyCycle { path });
            }
            debug!("compiling dependency {}", path.display());
            let dependency =
                Self::compile_file_nested(config, &path, Mode::Dependency, toolchain, in_progress)
                    .map_err(|source| CompileError::Dependency {
                        path: path.clone(),
                        line: use_decl.line,
                        source: Box::new(source),
                    })?;
            self.dependencies.push(dependency);
        }

        let reserved = [RUNTIME_SYSCALL, config.entry_symbol];
        let mut own = HashSet::with_capacity(unit.functions.len());
        for function in &unit.functions {
            let name = &*function.name.name;
            if reserved.contains(&name) || !own.insert(name) {
                return Err(CompileError::Redeclared {
                    name: function.name.name.clone(),
                    line: function.name.line,
                });
            }
        }
        let externs: Vec<Box<str>> = self
            .dependency_exports()
            .into_iter()
            .filter(|name| !own.contains(name))
            .map(Box::from)
            .collect();

        let entry = config.entry_function;
        if mode == Mode::Standalone
            && !own.contains(entry)
            && !externs.iter().any(|name| &**name == entry)
        {
            return Err(CompileError::MissingEntryFunction {
                name: entry.into(),
            });
        }

        let mut callable = own.clone();
        callable.extend(externs.iter().map(|name| &**name));
        callable.insert(RUNTIME_SYSCALL);

        let asm_name = self.asm_path.file_name().unwrap_or_default();
        let label_prefix = sanitize_label(&asm_name.to_string_lossy());
        let mut generator = Generator::new(config, &callable, &label_prefix);
        for function in &unit.functions {
            generator.function(function)?;
        }
        let (text, data) = generator.finish();

        self.exports = unit
            .functions
            .iter()
            .map(|function| function.name.name.clone())
            .collect();

        let asm = self.render(config, &externs, &text, data.lines());
        fs::write(&self.asm_path, asm).map_err(|source| CompileError::Io {
            path: self.asm_path.clone(),
            source,
        })?;
        debug!("wrote {}", self.asm_path.display());

        let include_dir = self.source.parent().unwrap_or_else(|| Path::new(""));
        toolchain.assemble(&self.asm_path, &self.object_path, include_dir)?;
        info!("assembled {}", self.object_path.display());
        Ok(())
    }

    fn render(
        &self,
        config: &Config,
        externs: &[Box<str>],
        text: &[String],
        data: &[String],
    ) -> String {
        let mut lines = Vec::with_capacity(text.len() + data.len() + 32);
        lines.push(format!("; {}", self.source.display()));
        for export in &self.exports {
            lines.push(format!("global {}", Symbol(export)));
        }
        for name in externs {
            lines.push(format!("extern {}", Symbol(name)));
        }
        match self.mode {
            Mode::Standalone => {
                lines.push(format!("global {}", config.entry_symbol));
                lines.push(format!("global {}", Symbol(RUNTIME_SYSCALL)));
            }
            Mode::Dependency => lines.push(format!("extern {}", Symbol(RUNTIME_SYSCALL))),
        }

        lines.push(String::new());
        lines.push("section .data".into());
        lines.extend(data.iter().cloned());

        lines.push(String::new());
        lines.push("section .text".into());
        lines.extend(text.iter().cloned());

        match self.mode {
            Mode::Standalone => {
                lines.push(format!("{}:", Symbol(RUNTIME_SYSCALL)));
                lines.extend(SYSCALL_ROUTINE.iter().map(|ins| format!("    {ins}")));
                lines.push(String::new());
                lines.push(format!("{}:", config.entry_symbol));
                lines.push(format!("    call {}", Symbol(config.entry_function)));
                lines.push("    mov rdi, rax".into());
                lines.push("    mov rax, 60".into());
                lines.push("    syscall".into());
            }
            Mode::Dependency => {
                lines.push(format!(
                    "; {} and {} are supplied by the root unit",
                    config.entry_symbol,
                    Symbol(RUNTIME_SYSCALL)
                ));
            }
        }
        lines.push(String::new());
        lines.join("\n")
    }
}

fn canonical(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("line {line}: unknown type `{name}`")]
    UnknownType { name: Box<str>, line: u32 },
    #[error("line {line}: undeclared identifier `{name}`")]
    UndeclaredIdentifier { name: Box<str>, line: u32 },
    #[error("line {line}: call to undefined function `{name}`")]
    UndefinedFunction { name: Box<str>, line: u32 },
    #[error("line {line}: `{name}` is already declared")]
    Redeclared { name: Box<str>, line: u32 },
    #[error("line {line}: `{name}` takes at most {} arguments", ARG_REGS.len())]
    TooManyArguments { name: Box<str>, line: u32 },
    #[error("no `{name}` function to start the program from")]
    MissingEntryFunction { name: Box<str> },
    #[error("unsupported {construct} in function `{function}`")]
    Unsupported {
        construct: &'static str,
        function: Box<str>,
    },
    #[error("{}: {count} syntax errors", .path.display())]
    Syntax { path: PathBuf, count: usize },
    #[error("line {line}: failed to compile dependency {}", .path.display())]
    Dependency {
        path: PathBuf,
        line: u32,
        #[source]
        source: Box<CompileError>,
    },
    #[error("{} is already being compiled (dependency cycle)", .path.display())]
    DependencyCycle { path: PathBuf },
    #[error("failed to access {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Toolchain(#[from] ToolchainError),
}

impl CompileError {
    /// Follows dependency failures down to the error that caused them.
    pub fn root_cause(&self) -> &CompileError {
        match self {
            CompileError::Dependency { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

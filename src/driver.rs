use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};

use tracing::info;

use crate::{
    codegen::{CompileError, CompiledUnit, Mode},
    config::Config,
    lexer, link, parser,
    toolchain::{Toolchain, ToolchainError},
    token,
    util::fmt::tree,
};

#[derive(Copy, Clone, Debug, Default)]
pub struct Options {
    /// Print the tokens of the root file, rendered back as source text.
    pub emit_tokens: bool,
    /// Print the syntax tree of the root file.
    pub emit_ast: bool,
    /// Stop after assembling, without linking.
    pub assemble_only: bool,
}

#[derive(Debug)]
pub struct Output {
    pub unit: CompiledUnit,
    /// Absent when only assembling.
    pub executable: Option<PathBuf>,
}

/// Compiles the program rooted at `path`. Requested dumps are written to
/// `emit` as soon as they're available, even if a later stage fails.
pub fn build(
    config: &Config,
    path: &Path,
    options: &Options,
    toolchain: &dyn Toolchain,
    emit: &mut impl Write,
) -> Result<Output, DriverError> {
    let src = fs::read(path).map_err(|source| DriverError::Read {
        path: path.to_owned(),
        source,
    })?;
    info!("loaded source of size {} bytes", src.len());

    let mut tokens = Vec::with_capacity(lexer::SUGGESTED_TOKENS_CAPACITY);
    let summary = lexer::lex(&src, config, &mut tokens);
    info!("counted {} lines", summary.lines);
    info!("parsed {} tokens", tokens.len());
    if options.emit_tokens {
        writeln!(emit, "{}", token::render_tokens(&tokens))?;
    }

    let (unit, errors) = match parser::parse_unit(&tokens) {
        Ok(unit) => (unit, Vec::new()),
        Err((unit, errors)) => (unit, errors),
    };
    info!("syntax parser had {} errors", errors.len());
    if options.emit_ast {
        tree::print_unit(emit, &unit)?;
    }
    if !errors.is_empty() {
        return Err(DriverError::Syntax {
            count: errors.len(),
        });
    }

    let mut compiled = CompiledUnit::new(path);
    compiled.compile(config, &unit, Mode::Standalone, toolchain)?;
    if options.assemble_only {
        return Ok(Output {
            unit: compiled,
            executable: None,
        });
    }

    let executable = link::link(&compiled, toolchain).map_err(DriverError::Link)?;
    Ok(Output {
        unit: compiled,
        executable: Some(executable),
    })
}

#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("failed to read {}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("found {count} syntax errors")]
    Syntax { count: usize },
    #[error("compilation failed")]
    Compile(#[from] CompileError),
    #[error("linking failed")]
    Link(#[source] ToolchainError),
    #[error("failed to write output")]
    Emit(#[from] io::Error),
}

impl DriverError {
    /// The process exit code for this failure. A syntax failure exits with
    /// its error count.
    pub fn exit_code(&self) -> u8 {
        match self {
            DriverError::Syntax { count } => u8::try_from(*count).unwrap_or(u8::MAX).clamp(1, 99),
            DriverError::Compile(error)
                if matches!(error.root_cause(), CompileError::Toolchain(_)) =>
            {
                101
            }
            DriverError::Link(_) => 101,
            DriverError::Compile(_) => 100,
            DriverError::Read { .. } | DriverError::Emit(_) => 102,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::test_utils::{RecordingToolchain, TempDir};

    fn build_in(
        dir: &TempDir,
        name: &str,
        options: &Options,
        toolchain: &RecordingToolchain,
    ) -> (Result<Output, DriverError>, String) {
        let mut emitted = Vec::new();
        let result = build(&Config::default(), &dir.join(name), options, toolchain, &mut emitted);
        (result, String::from_utf8(emitted).unwrap())
    }

    #[test]
    fn builds_and_links() {
        let dir = TempDir::new("driver-ok");
        dir.write("arith.fn", include_str!("../demos/arith.fn"));
        let toolchain = RecordingToolchain::default();
        let (result, emitted) = build_in(&dir, "arith.fn", &Options::default(), &toolchain);

        let output = result.unwrap();
        assert_eq!(output.executable, Some(dir.join("arith")));
        assert_eq!(output.unit.exports().len(), 3);
        assert!(emitted.is_empty());
        assert_eq!(toolchain.assembled_names(), ["arith.asm"]);
        assert_eq!(toolchain.linked.borrow().len(), 1);
    }

    #[test]
    fn assemble_only_skips_linking() {
        let dir = TempDir::new("driver-c");
        dir.write("main.fn", "fn main() {}");
        let toolchain = RecordingToolchain::default();
        let options = Options {
            assemble_only: true,
            ..Options::default()
        };
        let (result, _) = build_in(&dir, "main.fn", &options, &toolchain);
        assert_eq!(result.unwrap().executable, None);
        assert!(toolchain.linked.borrow().is_empty());
    }

    #[test]
    fn emits_tokens_and_tree() {
        let dir = TempDir::new("driver-emit");
        dir.write("main.fn", "fn main() -> i64 r {\n    r = 1;\n}\n");
        let options = Options {
            emit_tokens: true,
            emit_ast: true,
            assemble_only: true,
        };
        let (result, emitted) =
            build_in(&dir, "main.fn", &options, &RecordingToolchain::default());
        result.unwrap();
        pretty_assertions::assert_eq!(
            emitted,
            indoc::indoc! {"
                fn main ( ) -> i64 r { r = 1 ; }
                unit
                  fn main() -> i64 r
                    assign r
                      int 1
            "}
        );
    }

    #[test]
    fn syntax_errors_exit_with_their_count() {
        let dir = TempDir::new("driver-syntax");
        dir.write("main.fn", "fn f(x) {}");
        let toolchain = RecordingToolchain::default();
        let options = Options {
            emit_ast: true,
            ..Options::default()
        };
        let (result, emitted) = build_in(&dir, "main.fn", &options, &toolchain);
        let error = result.unwrap_err();
        assert!(matches!(error, DriverError::Syntax { count: 3 }));
        assert_eq!(error.exit_code(), 3);
        assert_eq!(emitted, "unit\n");
        assert!(toolchain.assembled.borrow().is_empty());
        assert!(!dir.join("main.asm").exists());
    }

    #[test]
    fn exit_codes() {
        let syntax = |count| DriverError::Syntax { count }.exit_code();
        assert_eq!(syntax(1), 1);
        assert_eq!(syntax(99), 99);
        assert_eq!(syntax(250), 99);
        assert_eq!(syntax(100_000), 99);

        let dir = TempDir::new("driver-codes");
        dir.write("div.fn", "fn main() -> i64 r { r = 4 / 2; }");
        let (result, _) = build_in(&dir, "div.fn", &Options::default(), &RecordingToolchain::default());
        assert_eq!(result.unwrap_err().exit_code(), 100);

        dir.write("main.fn", "fn main() {}");
        let failing = RecordingToolchain::failing_assembler();
        let (result, _) = build_in(&dir, "main.fn", &Options::default(), &failing);
        assert_eq!(result.unwrap_err().exit_code(), 101);

        let failing = RecordingToolchain::failing_linker();
        let (result, _) = build_in(&dir, "main.fn", &Options::default(), &failing);
        let error = result.unwrap_err();
        assert!(matches!(error, DriverError::Link(_)));
        assert_eq!(error.exit_code(), 101);

        let (result, _) = build_in(&dir, "missing.fn", &Options::default(), &failing);
        assert_eq!(result.unwrap_err().exit_code(), 102);
    }
}

use std::{
    cell::RefCell,
    fs, io,
    path::{Path, PathBuf},
    sync::atomic::{AtomicUsize, Ordering},
};

use crate::{
    config::Config,
    lexer, parser,
    toolchain::{Toolchain, ToolchainError},
    util::fmt::tree,
};

pub fn format_errors(e: &[parser::Error]) -> Vec<String> {
    e.iter().map(ToString::to_string).collect()
}

/// Each variant contains the input.
pub enum Test {
    ParserUnit(&'static str),
    ParserExpr(&'static str),
}

pub enum Assertion {
    TreeOk(&'static str),
    TreeError(&'static str),
    ExpectedErrors(&'static [&'static str]),
}

#[track_caller]
pub fn run_pipeline(test: Test) -> (String, Vec<String>) {
    let config = Config::default();

    match test {
        Test::ParserUnit(input) => {
            let (tokens, _) = lexer::lex_in_new(input.as_bytes(), &config);
            let (unit, errors) = match parser::parse_unit(&tokens) {
                Ok(unit) => (unit, vec![]),
                Err((unit, errors)) => (unit, errors),
            };
            let tree = tree::print_unit_string(&unit);
            (tree, format_errors(&errors))
        }
        Test::ParserExpr(input) => {
            let (tokens, _) = lexer::lex_in_new(input.as_bytes(), &config);
            let (expr, errors) = match parser::parse_expr(&tokens) {
                Ok(expr) => (Some(expr), vec![]),
                Err((expr, errors)) => (expr, errors),
            };
            let tree = expr.map(|e| tree::print_expr_string(&e)).unwrap_or_default();
            (tree, format_errors(&errors))
        }
    }
}

#[track_caller]
pub fn run_assertion(
    assertion: Assertion,
    formatted_actual_tree: &str,
    formatted_actual_errors: &[String],
) {
    match assertion {
        Assertion::TreeOk(expected_tree) => {
            let expected_errors: &[&str] = &[];
            ::pretty_assertions::assert_eq!(formatted_actual_errors, expected_errors);
            ::pretty_assertions::assert_eq!(formatted_actual_tree.trim(), expected_tree.trim());
        }
        Assertion::TreeError(expected_tree) => {
            ::pretty_assertions::assert_eq!(formatted_actual_tree.trim(), expected_tree.trim())
        }
        Assertion::ExpectedErrors(expected_errors) => {
            ::pretty_assertions::assert_eq!(formatted_actual_errors, expected_errors)
        }
    }
}

macro_rules! tree_tests {
    (
        use $test_kind:ident;

        $(
            fn $test_name:ident() {
                let $source_kind:ident = $source:expr;
                $($assertions_tt:tt)*
            }
        )*
    ) => {
        $(
            #[test]
            fn $test_name() {
                let test: crate::util::test_utils::Test =
                    tree_tests!(@@get_test($test_kind, $source_kind), $source);
                let (formatted_actual_tree, formatted_actual_errors) =
                    crate::util::test_utils::run_pipeline(test);
                let ctx = (&formatted_actual_tree, &formatted_actual_errors);
                tree_tests!(@@expand_assertions, ctx, [$($assertions_tt)*]);
            }
        )*
    };

    (@@expand_assertions, $ctx:expr, []) => {};
    (@@expand_assertions, $ctx:expr, [
        let $assertion:ident = $assertion_expected:expr;
        $($rest_assertions_tt:tt)*
    ]) => {
        crate::util::test_utils::run_assertion(
            tree_tests!(@@assertion, $assertion, $assertion_expected),
            $ctx.0,
            $ctx.1,
        );
        tree_tests!(@@expand_assertions, $ctx, [$($rest_assertions_tt)*]);
    };

    (@@assertion, tree_ok, $expected:expr) => {
        crate::util::test_utils::Assertion::TreeOk(::indoc::indoc! { $expected })
    };
    (@@assertion, tree_error, $expected:expr) => {
        crate::util::test_utils::Assertion::TreeError(::indoc::indoc! { $expected })
    };
    (@@assertion, expected_errors, $expected:expr) => {
        crate::util::test_utils::Assertion::ExpectedErrors($expected)
    };

    (@@get_test(parser, unit), $source:expr) => {
        crate::util::test_utils::Test::ParserUnit(::indoc::indoc! { $source })
    };
    (@@get_test(parser, expr), $source:expr) => {
        crate::util::test_utils::Test::ParserExpr($source)
    };
}
pub(crate) use tree_tests;

/// A fresh directory under the system temp dir, removed on drop.
pub struct TempDir {
    path: PathBuf,
}

impl TempDir {
    pub fn new(name: &str) -> TempDir {
        static COUNTER: AtomicUsize = AtomicUsize::new(0);
        let n = COUNTER.fetch_add(1, Ordering::Relaxed);
        let path = std::env::temp_dir().join(format!("fnc-{}-{name}-{n}", std::process::id()));
        _ = fs::remove_dir_all(&path);
        fs::create_dir_all(&path).unwrap();
        TempDir { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn join(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }

    /// Writes `contents` to `name`, creating parent directories.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, contents).unwrap();
        path
    }

    pub fn read(&self, name: &str) -> String {
        fs::read_to_string(self.join(name)).unwrap()
    }
}

impl Drop for TempDir {
    fn drop(&mut self) {
        _ = fs::remove_dir_all(&self.path);
    }
}

/// Records every invocation instead of running external programs.
#[derive(Default)]
pub struct RecordingToolchain {
    pub assembled: RefCell<Vec<(PathBuf, PathBuf, PathBuf)>>,
    pub linked: RefCell<Vec<(Vec<PathBuf>, PathBuf)>>,
    pub fail_assemble: bool,
    pub fail_link: bool,
}

impl RecordingToolchain {
    pub fn failing_assembler() -> RecordingToolchain {
        RecordingToolchain {
            fail_assemble: true,
            ..RecordingToolchain::default()
        }
    }

    pub fn failing_linker() -> RecordingToolchain {
        RecordingToolchain {
            fail_link: true,
            ..RecordingToolchain::default()
        }
    }

    /// File names of the assembled sources, in order.
    pub fn assembled_names(&self) -> Vec<String> {
        self.assembled
            .borrow()
            .iter()
            .map(|(asm, _, _)| asm.file_name().unwrap().to_string_lossy().into_owned())
            .collect()
    }
}

impl Toolchain for RecordingToolchain {
    fn assemble(&self, asm: &Path, obj: &Path, include_dir: &Path) -> Result<(), ToolchainError> {
        if self.fail_assemble {
            return Err(fake_failure("fake-nasm"));
        }
        self.assembled
            .borrow_mut()
            .push((asm.to_owned(), obj.to_owned(), include_dir.to_owned()));
        Ok(())
    }

    fn link(&self, objects: &[PathBuf], output: &Path) -> Result<(), ToolchainError> {
        if self.fail_link {
            return Err(fake_failure("fake-ld"));
        }
        self.linked
            .borrow_mut()
            .push((objects.to_vec(), output.to_owned()));
        Ok(())
    }
}

fn fake_failure(program: &str) -> ToolchainError {
    ToolchainError::Spawn {
        program: program.into(),
        source: io::Error::other("fake failure"),
    }
}

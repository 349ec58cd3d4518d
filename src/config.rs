use std::path::{Path, PathBuf};

use crate::types::TypeRegistry;

/// Extension of source files, also appended to `use` module paths.
pub const SOURCE_EXTENSION: &str = "fn";
pub const ASSEMBLY_EXTENSION: &str = "asm";
pub const OBJECT_EXTENSION: &str = "o";

/// Compilation settings, built once at startup and shared (by reference) by
/// every stage of every unit.
#[derive(Clone, Debug)]
pub struct Config {
    pub types: TypeRegistry,
    pub source_extension: &'static str,
    /// The function the process entry point calls.
    pub entry_function: &'static str,
    /// The symbol of the process entry point, only emitted by the root unit.
    pub entry_symbol: &'static str,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            types: TypeRegistry::with_builtins(),
            source_extension: SOURCE_EXTENSION,
            entry_function: "main",
            entry_symbol: "_start",
        }
    }
}

impl Config {
    pub fn is_typename(&self, name: &str) -> bool {
        self.types.has(name)
    }

    /// Resolves the module path of a `use` declaration, relative to the
    /// directory of the importing file.
    pub fn module_path(&self, importer: &Path, module: &str) -> PathBuf {
        let dir = importer.parent().unwrap_or_else(|| Path::new(""));
        let mut path = dir.join(module);
        path.as_mut_os_string().push(".");
        path.as_mut_os_string().push(self.source_extension);
        path
    }
}

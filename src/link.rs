use std::{collections::HashSet, path::PathBuf};

use tracing::info;

use crate::{
    codegen::CompiledUnit,
    toolchain::{Toolchain, ToolchainError},
};

/// Object files of `root` and all of its transitive dependencies: the root
/// first, then dependencies depth first. A unit reached through several
/// paths is only listed once.
pub fn collect_objects(root: &CompiledUnit) -> Vec<PathBuf> {
    let mut seen = HashSet::new();
    let mut objects = Vec::new();
    let mut stack = vec![root];
    while let Some(unit) = stack.pop() {
        if seen.insert(unit.object_path()) {
            objects.push(unit.object_path().to_owned());
        }
        stack.extend(unit.dependencies().iter().rev());
    }
    objects
}

/// The executable is named after the root source file, without extension,
/// in the same directory.
pub fn executable_path(root: &CompiledUnit) -> PathBuf {
    root.source().with_extension("")
}

/// Links `root` and its dependencies, returning the executable path.
pub fn link(root: &CompiledUnit, toolchain: &dyn Toolchain) -> Result<PathBuf, ToolchainError> {
    let objects = collect_objects(root);
    let output = executable_path(root);
    info!("linking {} object files", objects.len());
    toolchain.link(&objects, &output)?;
    info!("linked {}", output.display());
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        codegen::Mode,
        config::Config,
        util::test_utils::{RecordingToolchain, TempDir},
    };

    fn compile(dir: &TempDir, name: &str) -> CompiledUnit {
        let toolchain = RecordingToolchain::default();
        CompiledUnit::compile_file(&Config::default(), &dir.join(name), Mode::Standalone, &toolchain)
            .unwrap()
    }

    #[test]
    fn objects_are_collected_once() {
        let dir = TempDir::new("link-diamond");
        dir.write("main.fn", "use \"b\";\nuse \"c\";\nfn main() {}");
        dir.write("b.fn", "use \"d\";\nfn b() {}");
        dir.write("c.fn", "use \"d\";\nfn c() {}");
        dir.write("d.fn", "fn d() {}");
        let unit = compile(&dir, "main.fn");

        assert_eq!(
            collect_objects(&unit),
            [
                dir.join("main.o"),
                dir.join("b.o"),
                dir.join("d.o"),
                dir.join("c.o"),
            ]
        );
    }

    #[test]
    fn single_unit() {
        let dir = TempDir::new("link-single");
        dir.write("hello.fn", include_str!("../demos/hello.fn"));
        let unit = compile(&dir, "hello.fn");
        assert_eq!(collect_objects(&unit), [dir.join("hello.o")]);
        assert_eq!(executable_path(&unit), dir.join("hello"));
    }

    #[test]
    fn links_into_executable_named_after_root() {
        let dir = TempDir::new("link-run");
        dir.write("uses.fn", include_str!("../demos/uses.fn"));
        dir.write("math.fn", include_str!("../demos/math.fn"));
        let unit = compile(&dir, "uses.fn");

        let toolchain = RecordingToolchain::default();
        let output = link(&unit, &toolchain).unwrap();
        assert_eq!(output, dir.join("uses"));
        assert_eq!(
            *toolchain.linked.borrow(),
            [(vec![dir.join("uses.o"), dir.join("math.o")], dir.join("uses"))]
        );
    }

    #[test]
    fn linker_failure() {
        let dir = TempDir::new("link-fail");
        dir.write("main.fn", "fn main() {}");
        let unit = compile(&dir, "main.fn");
        let error = link(&unit, &RecordingToolchain::failing_linker()).unwrap_err();
        assert_eq!(error.to_string(), "failed to run `fake-ld`");
    }
}

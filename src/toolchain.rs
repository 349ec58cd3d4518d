use std::{
    ffi::OsString,
    io,
    path::{Path, PathBuf},
    process::{Command, ExitStatus},
};

use tracing::debug;

/// The external programs turning generated assembly into an executable.
pub trait Toolchain {
    /// Assembles `asm` into the object file `obj`, searching includes in
    /// `include_dir`.
    fn assemble(&self, asm: &Path, obj: &Path, include_dir: &Path) -> Result<(), ToolchainError>;

    /// Links `objects` into the executable `output`.
    fn link(&self, objects: &[PathBuf], output: &Path) -> Result<(), ToolchainError>;
}

/// Runs `nasm` and `ld` (or replacements with the same command line).
#[derive(Clone, Debug)]
pub struct SystemToolchain {
    pub assembler: OsString,
    pub linker: OsString,
}

impl Default for SystemToolchain {
    fn default() -> Self {
        SystemToolchain {
            assembler: "nasm".into(),
            linker: "ld".into(),
        }
    }
}

impl SystemToolchain {
    pub fn assemble_command(&self, asm: &Path, obj: &Path, include_dir: &Path) -> Command {
        // nasm concatenates the prefix and the file name as is
        let mut include = include_dir.as_os_str().to_owned();
        if include.is_empty() {
            include.push(".");
        }
        include.push("/");
        let mut command = Command::new(&self.assembler);
        command
            .args(["-g", "-f", "elf64", "-i"])
            .arg(include)
            .arg(asm)
            .arg("-o")
            .arg(obj);
        command
    }

    pub fn link_command(&self, objects: &[PathBuf], output: &Path) -> Command {
        let mut command = Command::new(&self.linker);
        command.arg("-o").arg(output).args(objects);
        command
    }
}

impl Toolchain for SystemToolchain {
    fn assemble(&self, asm: &Path, obj: &Path, include_dir: &Path) -> Result<(), ToolchainError> {
        run(self.assemble_command(asm, obj, include_dir))
    }

    fn link(&self, objects: &[PathBuf], output: &Path) -> Result<(), ToolchainError> {
        run(self.link_command(objects, output))
    }
}

fn run(mut command: Command) -> Result<(), ToolchainError> {
    let program = command.get_program().to_string_lossy().into_owned();
    debug!(?command, "running {program}");

    let output = command
        .output()
        .map_err(|source| ToolchainError::Spawn {
            program: program.clone(),
            source,
        })?;
    if output.status.success() {
        return Ok(());
    }
    Err(ToolchainError::Failed {
        program,
        status: output.status,
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
    })
}

#[derive(Debug, thiserror::Error)]
pub enum ToolchainError {
    #[error("failed to run `{program}`")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("`{program}` failed ({status}): {stderr}")]
    Failed {
        program: String,
        status: ExitStatus,
        stderr: String,
    },
}

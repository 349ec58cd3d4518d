use std::{
    error::Error,
    ffi::OsString,
    fs::File,
    io,
    path::PathBuf,
    process::ExitCode,
    sync::Mutex,
};

use clap::Parser;
use fnc::{
    config::Config,
    driver::{self, Options},
    toolchain::SystemToolchain,
};
use tracing::{error, info, level_filters::LevelFilter};
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// Compiles a program into an x86-64 Linux executable.
#[derive(Parser)]
#[command(version)]
struct Cli {
    /// The root source file.
    file: PathBuf,

    /// Print the tokens of the root file.
    #[arg(long)]
    emit_tokens: bool,

    /// Print the syntax tree of the root file.
    #[arg(long)]
    emit_ast: bool,

    /// Assemble only, don't link.
    #[arg(short = 'c', long)]
    no_link: bool,

    /// The assembler to run.
    #[arg(long, value_name = "PROGRAM", default_value = "nasm")]
    nasm: OsString,

    /// The linker to run.
    #[arg(long, value_name = "PROGRAM", default_value = "ld")]
    ld: OsString,

    /// Log file, written in addition to stderr.
    #[arg(long, value_name = "PATH", default_value = "fnc.log")]
    log_file: PathBuf,

    /// Also log debug messages.
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(error) = init_logging(&cli) {
        eprintln!("failed to open log file {}: {error}", cli.log_file.display());
        return ExitCode::from(102);
    }

    let config = Config::default();
    let options = Options {
        emit_tokens: cli.emit_tokens,
        emit_ast: cli.emit_ast,
        assemble_only: cli.no_link,
    };
    let toolchain = SystemToolchain {
        assembler: cli.nasm,
        linker: cli.ld,
    };

    let mut stdout = io::stdout().lock();
    match driver::build(&config, &cli.file, &options, &toolchain, &mut stdout) {
        Ok(output) => {
            match output.executable {
                Some(executable) => info!("built {}", executable.display()),
                None => info!("assembled {}", output.unit.object_path().display()),
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            let mut message = e.to_string();
            let mut source = e.source();
            while let Some(cause) = source {
                message.push_str(": ");
                message.push_str(&cause.to_string());
                source = cause.source();
            }
            error!("{message}");
            ExitCode::from(e.exit_code())
        }
    }
}

fn init_logging(cli: &Cli) -> io::Result<()> {
    let level = if cli.verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    let file = File::create(&cli.log_file)?;
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_ansi(false)
        .with_target(false)
        .with_writer(io::stderr.and(Mutex::new(file)))
        .init();
    Ok(())
}

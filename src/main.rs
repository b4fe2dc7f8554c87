//! Command-line entry point: `asm [options] <source-file>`.

use std::fs;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;

/// Assembler and ELF64 linker core for the Viua VM bytecode format.
#[derive(Parser, Debug)]
#[command(name = "viua-asm", version, about)]
struct Cli {
    /// Source file to assemble.
    source: PathBuf,

    /// Override the output path (default: source path with extension
    /// replaced by `.o`).
    #[arg(short = 'o', value_name = "PATH")]
    output: Option<PathBuf>,

    /// Increase verbosity. May be repeated.
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    verbose: u8,

    /// Explicit tracing filter, e.g. `viua_asm=debug`. Overrides `-v`.
    #[arg(long = "log", env = "VIUA_ASM_LOG", value_name = "FILTER")]
    log: Option<String>,

    /// Disable colored diagnostic output, as does setting `NO_COLOR`.
    #[arg(long = "no-color")]
    no_color: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(cli: &Cli) {
    let default_level = match cli.verbose {
        0 => "viua_asm=warn",
        1 => "viua_asm=info",
        2 => "viua_asm=debug",
        _ => "viua_asm=trace",
    };
    let filter = cli
        .log
        .as_deref()
        .map(tracing_subscriber::EnvFilter::new)
        .unwrap_or_else(|| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// `NO_COLOR` (https://no-color.org) is a presence check, not a boolean value,
/// so it is read directly rather than through clap's env-to-bool parsing.
fn should_colorize(cli: &Cli) -> bool {
    !cli.no_color && std::env::var_os("NO_COLOR").is_none() && std::io::stderr().is_terminal()
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    colored::control::set_override(should_colorize(cli));

    let source = fs::read_to_string(&cli.source)
        .with_context(|| format!("failed to read `{}`", cli.source.display()))?;

    let bytes = viua_asm::assemble(&source).map_err(|err| {
        anyhow::anyhow!(err.render(&source, &cli.source.display().to_string()))
    })?;

    let output_path = cli
        .output
        .clone()
        .unwrap_or_else(|| cli.source.with_extension("o"));
    fs::write(&output_path, &bytes)
        .with_context(|| format!("failed to write `{}`", output_path.display()))?;

    tracing::info!(path = %output_path.display(), bytes = bytes.len(), "wrote object file");
    Ok(())
}

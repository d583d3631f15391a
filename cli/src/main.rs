mod cli;
mod commands;

use cli::{Cli, Commands};
use commands::{interpolate, mapping, validate};
use tracing_subscriber::EnvFilter;

/// Logs go to stderr; `RUST_LOG` overrides the level picked by `-v`.
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

pub fn run() -> anyhow::Result<()> {
    use clap::Parser;

    let cli = Cli::parse();
    init_logging(cli.verbose);

    match &cli.command {
        Commands::Mapping(args) => mapping::run(&cli, args),
        Commands::Interpolate(args) => interpolate::run(&cli, args),
        Commands::Validate(args) => validate::run(&cli, args),
    }
}

fn main() -> anyhow::Result<()> { run() }

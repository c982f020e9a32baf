use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use domc_cli::{Cli, Commands, inspect_cmd, render_cmd};

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let out = match cli.command {
        Commands::Inspect { input, format } => inspect_cmd(&input, format)?,
        Commands::Render {
            input,
            scope,
            then,
            format,
        } => render_cmd(&input, scope.as_deref(), &then, format)?,
    };
    print!("{out}");
    Ok(())
}

mod commands;
mod util;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

pub use commands::eval::{EvalArgs, ResultType};

#[derive(Parser, Debug)]
#[command(name = "xpath-provider", version, about = "Evaluate XPath 1.0 expressions against XML")]
pub struct Cli {
    /// Log filter such as `debug` or `xpath_provider=trace`; falls back to `RUST_LOG`.
    #[arg(long = "log-level", value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Evaluate an expression against an XML file.
    Eval(EvalArgs),
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

pub fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_deref());

    let output = match &cli.command {
        Command::Eval(args) => commands::eval::run(args),
    }
    .map_err(|error| anyhow::anyhow!("{error}"))?;

    println!("{output}");
    Ok(())
}

fn init_tracing(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

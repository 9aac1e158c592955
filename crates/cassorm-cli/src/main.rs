//! cassorm command-line tool
//!
//! Compiles a model definition and prints the statements the adapter would
//! send, without connecting to a store.

mod commands;
mod formatter;

use clap::Parser;
use commands::Command;
use formatter::OutputFormat;
use tracing_subscriber::EnvFilter;

/// cassorm statement preview
#[derive(Parser, Debug)]
#[command(name = "cassorm")]
#[command(version, about = "Preview the CQL cassorm compiles for a model")]
pub struct Args {
    /// Output format
    #[arg(long, global = true, default_value = "json", value_enum)]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Command,
}

fn main() {
    // Logs go to stderr so previews can be piped.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("cassorm=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    if let Err(e) = run(&args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<(), commands::CliError> {
    let path = args.command.model_path();
    let schema = commands::load_schema(path)?;
    tracing::debug!(model = %path.display(), table = %schema.table_name(), "model compiled");

    let preview = commands::preview(&args.command, &schema)?;
    println!("{}", formatter::render(&preview, args.format));
    Ok(())
}

//! dds CLI - Resilient bulk retrieval of EODMS DDS catalog items.

use anyhow::Result;
use clap::{Args, CommandFactory, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod display;
mod targets;

#[derive(Parser)]
#[command(name = "dds")]
#[command(about = "Poll and download EODMS DDS catalog items", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Quiet mode (suppress progress output)
    #[arg(short, long, global = true)]
    quiet: bool,
}

/// Options shared by every command that polls the catalog.
#[derive(Args)]
pub(crate) struct PollArgs {
    /// Items to poll as COLLECTION:ARCHIVE
    pub(crate) items: Vec<String>,

    /// JSON file holding an array of search results
    #[arg(short, long)]
    pub(crate) input: Option<PathBuf>,

    /// Access token
    #[arg(long, env = "DDS_TOKEN", hide_env_values = true)]
    pub(crate) token: Option<String>,

    /// Use the staging service (domain from the DOMAIN environment variable)
    #[arg(long)]
    pub(crate) staging: bool,

    /// Maximum item requests per second (0 for unlimited)
    #[arg(long, default_value = "0")]
    pub(crate) rate_limit: f64,

    /// Print results as JSON
    #[arg(long)]
    pub(crate) json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll item status and report how many are ready, queued or unknown
    Items {
        #[command(flatten)]
        poll: PollArgs,
    },

    /// Poll item status and download every ready item
    Download {
        #[command(flatten)]
        poll: PollArgs,

        /// Output directory (files land in <out>/completed)
        #[arg(short, long, default_value = ".")]
        out: PathBuf,

        /// Expand downloaded zip archives
        #[arg(long)]
        unzip: bool,

        /// Delete archives after expanding them
        #[arg(long)]
        no_keep_zip: bool,

        /// Maximum concurrent downloads
        #[arg(short, long, default_value = "3")]
        workers: usize,

        /// Existing SQLite database to record queries and downloads in
        #[arg(long, env = "DDS_DB")]
        db: Option<PathBuf>,

        /// JSON file describing the query (constellation, dates, geometry)
        #[arg(long)]
        query: Option<PathBuf>,
    },
}

fn init_tracing(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => "warn",
        (false, 0) => "info",
        (false, 1) => "debug",
        (false, _) => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Show help if no command provided
    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        return Ok(());
    };

    init_tracing(cli.verbose, cli.quiet);

    match command {
        Commands::Items { poll } => commands::items::items(&poll, cli.quiet).await,
        Commands::Download {
            poll,
            out,
            unzip,
            no_keep_zip,
            workers,
            db,
            query,
        } => {
            let options = commands::download::DownloadArgs {
                out,
                unzip,
                keep_zip: !no_keep_zip,
                workers,
                db,
                query,
            };
            commands::download::download(&poll, options, cli.quiet).await
        }
    }
}

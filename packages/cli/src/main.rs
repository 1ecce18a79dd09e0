mod commands;
mod config;
mod hooks;
mod script;

use clap::{Parser, Subcommand};
use colored::Colorize;
use commands::{apply, init, inspect, pages, ApplyArgs, InitArgs, InspectArgs, PagesCommand};
use puck_common::{FileSystem, RealFileSystem};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Puck CLI - edit pages from the terminal
#[derive(Parser, Debug)]
#[command(name = "puck")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log debug output (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Initialize a new Puck project
    Init(InitArgs),

    /// Manage pages
    Pages {
        #[command(subcommand)]
        command: PagesCommand,
    },

    /// Replay an edit script against a page and publish it
    Apply(ApplyArgs),

    /// Show the component index, permissions and integrity problems of a page
    Inspect(InspectArgs),
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let cwd = match std::env::current_dir() {
        Ok(cwd) => cwd,
        Err(err) => fail(err.into()),
    };
    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);

    let result = run(cli.command, fs, cwd).await;

    if let Err(err) = result {
        fail(err);
    }
}

async fn run(command: Command, fs: Arc<dyn FileSystem>, cwd: PathBuf) -> anyhow::Result<()> {
    match command {
        Command::Init(args) => init(args, fs.as_ref(), &cwd),
        Command::Pages { command } => pages(command, fs.as_ref(), &cwd),
        Command::Apply(args) => apply(args, fs, &cwd).await,
        Command::Inspect(args) => inspect(args, fs.as_ref(), &cwd),
    }
}

fn fail(err: anyhow::Error) -> ! {
    eprintln!();
    eprintln!("{} {:#}", "Error:".red().bold(), err);
    eprintln!();
    std::process::exit(1);
}

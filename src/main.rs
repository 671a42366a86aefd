mod api;
mod batch;
mod classifier;
mod cli;
mod commands;
mod config;
mod dataset;
mod diagnostics;
mod error;
mod model;
mod orchestrator;
mod store;
mod util;

use anyhow::Result;
use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};

fn main() {
    init_tracing();

    if let Err(err) = run() {
        error!(error = %err, "command failed");
        for cause in err.chain().skip(1) {
            error!(cause = %cause, "caused by");
        }
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Import(args) => commands::import::run(args),
        Commands::Classify(args) => commands::classify::run(args),
        Commands::Evaluate(args) => commands::evaluate::run(args),
        Commands::Report(args) => commands::report::run(args),
        Commands::Prepare(args) => commands::prepare::run(args),
        Commands::Submit(args) => commands::submit::run(args),
        Commands::Reconcile(args) => commands::reconcile::run(args),
        Commands::Status(args) => commands::status::run(args),
        Commands::Reset(args) => commands::reset::run(args),
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

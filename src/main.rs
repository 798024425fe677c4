mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use tracing::Level;

use cli::{Cli, Commands};
use commands::{cluster, run, vectorize};

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        _ => Level::DEBUG,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match &cli.command {
        Commands::Run(args) => run::run(&cli, args),
        Commands::Vectorize(args) => vectorize::run(&cli, args),
        Commands::Cluster(args) => cluster::run(&cli, args),
    }
}

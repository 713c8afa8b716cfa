//! Telar CLI - compile and run signal-processing graphs.

mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "telar")]
#[command(author, version, about = "Telar synth graph compiler", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a graph into a realtime engine binary
    Compile(commands::compile::CompileArgs),

    /// Compile a graph and run it until interrupted
    Run(commands::run::RunArgs),

    /// List the node type catalog
    Nodes(commands::nodes::NodesArgs),
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Compile(args) => commands::compile::run(args),
        Commands::Run(args) => commands::run::run(args),
        Commands::Nodes(args) => commands::nodes::run(args),
    }
}

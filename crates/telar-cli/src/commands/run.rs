//! Compile-and-play command.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use clap::Args;
use telar_engine::{Controller, Session};
use telar_nodes::NodeRegistry;

/// Arguments for `telar run`.
#[derive(Args)]
pub struct RunArgs {
    /// Graph file (editor JSON format)
    graph: PathBuf,
}

/// Compiles a graph and plays it until interrupted.
pub fn run(args: RunArgs) -> anyhow::Result<()> {
    let registry = NodeRegistry::new();
    let graph = super::load_graph(&args.graph)?;

    println!("Compiling {}...", args.graph.display());
    let instrument = telar_compiler::compile(&registry, &graph)?;
    tracing::debug!(binary = %instrument.executable.path().display(), "engine built");
    let mut controller = Controller::from_graph(&registry, &instrument.program.control)?;

    let mut session = Session::new(instrument.executable.path());
    session.start()?;
    println!("Engine running. Press Ctrl+C to stop...");

    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    ctrlc::set_handler(move || {
        println!("\nStopping...");
        r.store(false, Ordering::SeqCst);
    })?;

    while running.load(Ordering::SeqCst) {
        let Some(event) = session.wait_event(Duration::from_millis(100))? else {
            continue;
        };
        for command in controller.on_event(&event) {
            session.send(&command)?;
        }
    }

    session.stop()?;
    session.wait_for_exit()?;
    println!("Done!");
    Ok(())
}

//! Graph compilation command.

use std::path::PathBuf;

use clap::Args;
use telar_nodes::NodeRegistry;

/// Arguments for `telar compile`.
#[derive(Args)]
pub struct CompileArgs {
    /// Graph file (editor JSON format)
    graph: PathBuf,

    /// Write the generated C source to this path
    #[arg(long, value_name = "FILE")]
    emit_c: Option<PathBuf>,

    /// Stop after code generation, skip the C toolchain
    #[arg(long)]
    no_binary: bool,
}

/// Compiles a graph file and reports what came out.
pub fn run(args: CompileArgs) -> anyhow::Result<()> {
    let registry = NodeRegistry::new();
    let graph = super::load_graph(&args.graph)?;

    let (program, executable) = if args.no_binary {
        (telar_compiler::lower(&registry, &graph)?, None)
    } else {
        let instrument = telar_compiler::compile(&registry, &graph)?;
        (instrument.program, Some(instrument.executable))
    };

    println!("Compiled {}", args.graph.display());
    println!("  Control nodes:  {}", program.control.node_count());
    println!("  Realtime nodes: {}", program.model.nodes.len());
    println!("  Bridge vars:    {}", program.model.var_count);

    if let Some(path) = &args.emit_c {
        std::fs::write(path, &program.source)?;
        println!("  C source:       {}", path.display());
    }

    if let Some(executable) = &executable {
        println!("  Engine binary:  {}", executable.path().display());
        println!();
        println!("Note: the binary lives in a temp dir and is removed on exit.");
        println!("Use `telar run` to play it, or --emit-c to keep the source.");
    }

    Ok(())
}

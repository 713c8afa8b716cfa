//! Node catalog listing command.

use clap::Args;
use telar_nodes::{NodeRegistry, PortSpec};

/// Arguments for `telar nodes`.
#[derive(Args)]
pub struct NodesArgs {
    /// Print the catalog as JSON (the format served to editor tooling)
    #[arg(long)]
    json: bool,
}

/// Prints the node type catalog.
pub fn run(args: NodesArgs) -> anyhow::Result<()> {
    let registry = NodeRegistry::new();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&registry.catalog())?);
        return Ok(());
    }

    println!("  {:24}  {:20}  {:24}  {}", "Name", "Inputs", "Outputs", "Params");
    println!("  {:24}  {:20}  {:24}  {}", "----", "------", "-------", "------");
    for ty in registry.types() {
        let d = &ty.descriptor;
        println!(
            "  {:24}  {:20}  {:24}  {}",
            d.name,
            names(&d.inputs),
            names(&d.outputs),
            names(&d.params),
        );
    }
    Ok(())
}

fn names(ports: &[PortSpec]) -> String {
    if ports.is_empty() {
        "-".to_string()
    } else {
        ports.iter().map(|p| p.name).collect::<Vec<_>>().join(", ")
    }
}

#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line replay harness for the Voxel Battle action engine.
//!
//! Builds a seeded battlefield or imports a snapshot, replays a scripted
//! command list through the action controller, and prints every step's
//! result and effects as JSON lines followed by the final state fingerprint.

mod scenario;
mod script;
mod snapshot_transfer;

use std::{
    io::{self, BufWriter, Write},
    path::PathBuf,
};

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;
use voxel_battle_core::AbilityTable;
use voxel_battle_system_actions::ActionController;
use voxel_battle_world::{query, VoxelTree};

use crate::script::{result_label, Script, StepReport};

/// Replays scripted commands against a voxel battlefield.
#[derive(Debug, Parser)]
#[command(name = "voxel-battle", version, about)]
struct Cli {
    /// Depth of the generated tree.
    #[arg(long, default_value_t = 4)]
    weight: i32,
    /// Seed used to generate the battlefield.
    #[arg(long, default_value_t = 0)]
    seed: u64,
    /// TOML ability table replacing the built-in one.
    #[arg(long)]
    abilities: Option<PathBuf>,
    /// TOML command script to replay.
    #[arg(long)]
    script: Option<PathBuf>,
    /// Snapshot transfer string to start from instead of a generated battlefield.
    #[arg(long, conflicts_with_all = ["weight", "seed"])]
    import: Option<String>,
    /// Prints the final state as a snapshot transfer string.
    #[arg(long)]
    export: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    tracing::info!(
        target: "voxel_battle::cli",
        version = env!("CARGO_PKG_VERSION"),
        "cli.started"
    );

    let abilities = match &cli.abilities {
        Some(path) => AbilityTable::from_file(path)
            .with_context(|| format!("failed to load ability table {}", path.display()))?,
        None => AbilityTable::load_from_env(),
    };

    let mut tree = match &cli.import {
        Some(encoded) => {
            snapshot_transfer::decode(encoded).context("failed to import snapshot")?
        }
        None => scenario::generate(cli.weight, cli.seed, &abilities)?,
    };

    let script = match &cli.script {
        Some(path) => Script::from_file(path)?,
        None => Script::default(),
    };

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    replay(&mut tree, &abilities, &script, &mut out)?;

    let fingerprint = query::fingerprint(&tree)?;
    let hex: String = fingerprint.iter().map(|byte| format!("{byte:02x}")).collect();
    writeln!(out, "fingerprint {hex}")?;
    if cli.export {
        let encoded = snapshot_transfer::encode(&tree).context("failed to export snapshot")?;
        writeln!(out, "snapshot {encoded}")?;
    }
    out.flush()?;
    Ok(())
}

fn replay(
    tree: &mut VoxelTree,
    abilities: &AbilityTable,
    script: &Script,
    out: &mut impl Write,
) -> Result<()> {
    let mut effects = Vec::new();
    for (index, step) in script.step.iter().enumerate() {
        effects.clear();
        let mut controller = ActionController::new(step.entity, abilities);
        let code = controller.apply(tree, step.command.clone(), &mut effects);
        let report = StepReport {
            step: index,
            entity: step.entity,
            command: step.command.name(),
            result: result_label(code),
            bound: controller.entity(),
            effects: &effects,
        };
        serde_json::to_writer(&mut *out, &report).context("failed to write step report")?;
        writeln!(out)?;
    }
    tracing::info!(
        target: "voxel_battle::cli",
        steps = script.step.len(),
        live = query::live_count(tree),
        "replay.finished"
    );
    Ok(())
}

//! ring-links: build the RPC strip to PAC cone connection table
//!
//! Usage:
//!   ring-links --geometry rolls.json --output links.json
//!   ring-links --geometry rolls.json --config ring_config.toml --summary
//!   ring-links --print-config

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use rpc_ring_links::config::{self, RingConfig};
use rpc_ring_links::{ConnectionTableBuilder, JsonGeometry};

#[derive(Parser, Debug)]
#[command(name = "ring-links")]
#[command(about = "Build the RPC strip to PAC cone connection table")]
#[command(version)]
struct CliArgs {
    /// Roll geometry (JSON list of roll descriptors)
    #[arg(long, short, env = "RPC_RING_GEOMETRY", required_unless_present = "print_config")]
    geometry: Option<PathBuf>,

    /// Output path for the connection table. Printed to stdout when omitted.
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// Ring config TOML. Overrides RPC_RING_CONFIG and ./ring_config.toml.
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Log the per-ring summary and the build report as JSON
    #[arg(long)]
    summary: bool,

    /// Print the effective config as TOML and exit
    #[arg(long)]
    print_config: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args = CliArgs::parse();

    let ring_config = match &args.config {
        Some(path) => RingConfig::load_from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => RingConfig::load(),
    };
    config::init(ring_config.clone());

    if args.print_config {
        print!("{}", ring_config.to_toml()?);
        return Ok(());
    }

    let geometry_path = args
        .geometry
        .context("--geometry is required")?;
    info!(
        geometry = %geometry_path.display(),
        gap_tolerance = ring_config.virtual_strips.gap_tolerance,
        overflow = %ring_config.connections.overflow_policy,
        "Building connection table"
    );

    let source = JsonGeometry::new(&geometry_path);
    let builder = ConnectionTableBuilder::from_source(&source, ring_config.clone())
        .with_context(|| format!("reading geometry {}", geometry_path.display()))?;

    if args.summary {
        for (slot, ring) in builder.rings() {
            info!(ring = %slot.key, roll = slot.roll, "{}", serde_json::to_string(&ring.summary())?);
        }
    }

    let (table, report) = builder.build().context("building connection table")?;
    if args.summary {
        info!("{}", serde_json::to_string(&report)?);
    }

    let pretty = ring_config.output.pretty_json;
    match &args.output {
        Some(path) => table.write_json(path, pretty)?,
        None => println!("{}", table.to_json(pretty)?),
    }
    Ok(())
}

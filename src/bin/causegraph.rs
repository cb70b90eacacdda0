//! causegraph CLI - import facility incident payloads into a causal graph
//!
//! Runs the extract/transform/load pipeline against the in-memory graph
//! store and reports per-facility results.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;

use causegraph::config::MappingConfig;
use causegraph::pipeline::FacilityPipeline;
use causegraph::serialization::export_graph;
use causegraph::store::MemoryGraph;

#[derive(Parser)]
#[command(name = "causegraph")]
#[command(version, about = "Import facility incident records into a causal entity graph", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import one or more facility payloads
    Import {
        /// Facility payloads as FACILITY_ID=path/to/payload.json
        #[arg(short, long, required = true)]
        payload: Vec<String>,

        /// Path to a mapping YAML (defaults to the built-in incident mapping)
        #[arg(short, long)]
        mapping: Option<PathBuf>,

        /// Write the loaded graph as pretty JSON to this path
        #[arg(short, long)]
        export: Option<PathBuf>,
    },

    /// Validate a mapping YAML without importing anything
    ValidateMapping {
        /// Path to the mapping YAML
        #[arg(short, long)]
        mapping: PathBuf,
    },
}

fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Import {
            payload,
            mapping,
            export,
        } => import(payload, mapping, export),
        Commands::ValidateMapping { mapping } => validate_mapping(mapping),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Import facility payloads into a fresh in-memory graph
fn import(
    payloads: Vec<String>,
    mapping: Option<PathBuf>,
    export: Option<PathBuf>,
) -> Result<(), String> {
    let config = load_mapping(mapping)?;
    let pipeline = FacilityPipeline::new(&config);
    let mut store = MemoryGraph::new();

    for spec in &payloads {
        let (facility_id, path) = parse_payload_spec(spec)?;
        println!("Importing {} from {}...", facility_id, path.display());

        let report = pipeline
            .run_from_file(facility_id, &path, &mut store)
            .map_err(|e| format!("Import failed for {}: {}", facility_id, e))?;

        println!(
            "  ✓ {} records: {} transformed, {} failed, {} entities created",
            report.records_total,
            report.records_transformed,
            report.records_failed,
            report.load.total_created()
        );
        for (kind, skips) in &report.gate_skips {
            println!("  ℹ {} skipped {} time(s) by the creation gate", kind, skips);
        }
        for warning in &report.load.warnings {
            println!("  ⚠ {}", warning);
        }
    }

    if let Some(path) = export {
        let file = std::fs::File::create(&path)
            .map_err(|e| format!("Failed to create export file {}: {}", path.display(), e))?;
        export_graph(&store, file).map_err(|e| format!("Failed to export graph: {}", e))?;
        println!("  ✓ Graph exported to {}", path.display());
    }

    Ok(())
}

/// Validate a mapping YAML
fn validate_mapping(mapping: PathBuf) -> Result<(), String> {
    let config = MappingConfig::load_from_file(&mapping)?;
    println!(
        "  ✓ Mapping {} is valid ({} entity kinds configured)",
        mapping.display(),
        config.entities.len()
    );
    Ok(())
}

fn load_mapping(mapping: Option<PathBuf>) -> Result<MappingConfig, String> {
    match mapping {
        Some(path) => MappingConfig::load_from_file(path),
        None => Ok(MappingConfig::default_incident_mapping()),
    }
}

/// Split a FACILITY_ID=path payload argument
fn parse_payload_spec(spec: &str) -> Result<(&str, PathBuf), String> {
    match spec.split_once('=') {
        Some((facility_id, path)) if !facility_id.is_empty() && !path.is_empty() => {
            Ok((facility_id, PathBuf::from(path)))
        }
        _ => Err(format!(
            "Invalid payload spec '{}', expected FACILITY_ID=path/to/payload.json",
            spec
        )),
    }
}

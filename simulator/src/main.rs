mod distribution;
mod generator;
mod noise;
mod pulse;
mod scenario;

use anyhow::{Context, Result};
use clap::Parser;
use pulsecal_common::{init_tracer, tracer::TracerEngine};
use scenario::Scenario;
use std::{
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::PathBuf,
};
use tracing::{info, warn};

/// Generates synthetic waveform files for the template builder.
#[derive(Debug, Parser)]
#[clap(author, version, about)]
struct Cli {
    /// JSON file describing the simulated acquisition.
    #[clap(long)]
    scenario: PathBuf,

    /// File to write the waveforms to.
    #[clap(long)]
    output: PathBuf,

    /// Overrides the seed of the scenario. If neither is given, a random seed is used.
    #[clap(long)]
    seed: Option<u64>,
}

fn main() -> Result<()> {
    let args = Cli::parse();

    let _tracer = init_tracer!();

    let scenario: Scenario = serde_json::from_reader(BufReader::new(
        File::open(&args.scenario)
            .with_context(|| format!("Opening {0}", args.scenario.display()))?,
    ))
    .context("Parsing scenario")?;

    let seed = args
        .seed
        .or(scenario.seed)
        .unwrap_or_else(rand::random::<u64>);
    info!("Simulating {0} events with seed {seed}", scenario.num_events);

    let traces = generator::generate(&scenario, seed)?;

    let mut output = BufWriter::new(File::create(&args.output)?);
    for trace in &traces {
        trace.write(&mut output)?;
    }
    output.flush()?;
    info!("Wrote {0} traces to {1}", traces.len(), args.output.display());
    Ok(())
}

mod board;
mod config;
mod irq;
mod pipeline;
mod scheduler;
mod stats;
mod waveform;

use anyhow::Result;
use clap::{Parser, Subcommand};
use config::{PipelineConfig, RunArgs, WaveformKind};
use daq_common::pipeline::SINE_TABLE_LEN;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the acquisition pipeline against the simulated board.
    Run(RunArgs),

    /// Write a generated waveform table to disk.
    Table {
        #[arg(long, value_enum, default_value_t = WaveformKind::Sine)]
        kind: WaveformKind,
        /// Ramp length. Sine tables always use the standard length.
        #[arg(long, default_value_t = SINE_TABLE_LEN)]
        len: usize,
        #[arg(short, long)]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run(args) => {
            let config = PipelineConfig::from_args(&args)?;
            let records = pipeline::run(config)?;
            info!(records = records.len(), "done");
        }
        Commands::Table { kind, len, output } => {
            let table = config::generate_table(kind, len)?;
            let header = format!("{kind:?} waveform, {} samples", table.len());
            daq_io::write_table(&output, &header, &table)?;
            info!(path = %output.display(), samples = table.len(), "table written");
        }
    }
    Ok(())
}

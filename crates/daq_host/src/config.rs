//! Command-line options and the validated pipeline configuration.

use anyhow::{Context, Result, bail};
use clap::{Args, ValueEnum};
use daq_common::adc::FULL_SCALE_COUNT;
use daq_common::pipeline::{BUFFER_CAPACITY, RUN_LIMIT, SINE_TABLE_LEN};
use daq_common::timing::TICK_PERIOD_MS;
use std::path::PathBuf;
use std::time::Duration;

use crate::waveform;

/// Scheduling strategy, chosen at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// Producer only: drive the output channel with a blue heartbeat.
    SamplingOnly,

    /// Producer, consumer and analysis task, green heartbeat. Stops after
    /// the run limit.
    Analysis,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum WaveformKind {
    /// One period of a 1-3 V sine over the sine table length.
    Sine,

    /// Counts `0..capacity`, one window per period.
    Ramp,
}

#[derive(Debug, Args)]
pub struct RunArgs {
    #[arg(long, value_enum, default_value_t = Mode::Analysis)]
    pub mode: Mode,

    /// Samples per window.
    #[arg(long, default_value_t = BUFFER_CAPACITY)]
    pub capacity: usize,

    /// Completed windows before sampling stops.
    #[arg(long, default_value_t = RUN_LIMIT)]
    pub runs: u32,

    /// Wall-clock length of one tick.
    #[arg(long, default_value_t = TICK_PERIOD_MS)]
    pub tick_ms: u64,

    #[arg(long, value_enum, default_value_t = WaveformKind::Sine)]
    pub waveform: WaveformKind,

    /// Replay a waveform table file instead of a generated waveform.
    #[arg(long)]
    pub waveform_file: Option<PathBuf>,

    /// Delay between a transfer request and its completion interrupt.
    #[arg(long, default_value_t = 2)]
    pub transfer_latency_ms: u64,

    /// Fail every n-th transfer.
    #[arg(long)]
    pub fail_every: Option<u32>,

    /// Drop a transfer that has not completed after this many ticks.
    #[arg(long)]
    pub transfer_timeout_ticks: Option<u64>,

    /// Upper bound on ticks before the run is stopped regardless of mode.
    #[arg(long, default_value_t = 10_000)]
    pub max_ticks: u64,
}

/// Everything the pipeline needs, checked and resolved.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub mode: Mode,
    pub capacity: usize,
    pub run_limit: u32,
    pub tick: Duration,
    pub table: Vec<u32>,
    pub transfer_latency: Duration,
    pub fail_every: Option<u32>,
    pub transfer_timeout_ticks: Option<u64>,
    pub max_ticks: u64,
}

impl PipelineConfig {
    /// Validates the options and loads or generates the waveform table.
    pub fn from_args(args: &RunArgs) -> Result<Self> {
        if args.capacity == 0 {
            bail!("capacity must be at least 1");
        }
        if args.runs == 0 {
            bail!("runs must be at least 1");
        }
        if args.tick_ms == 0 {
            bail!("tick-ms must be at least 1");
        }
        if args.fail_every == Some(0) {
            bail!("fail-every must be at least 1");
        }
        if args.transfer_timeout_ticks == Some(0) {
            bail!("transfer-timeout-ticks must be at least 1");
        }

        let table = match &args.waveform_file {
            Some(path) => daq_io::load_table(path)
                .with_context(|| format!("Failed to load waveform {}", path.display()))?,
            None => generate_table(args.waveform, args.capacity)?,
        };

        Ok(Self {
            mode: args.mode,
            capacity: args.capacity,
            run_limit: args.runs,
            tick: Duration::from_millis(args.tick_ms),
            table,
            transfer_latency: Duration::from_millis(args.transfer_latency_ms),
            fail_every: args.fail_every,
            transfer_timeout_ticks: args.transfer_timeout_ticks,
            max_ticks: args.max_ticks,
        })
    }
}

/// Generates a table of `kind`. Ramps are `len` long, sines use the
/// standard table length.
pub fn generate_table(kind: WaveformKind, len: usize) -> Result<Vec<u32>> {
    match kind {
        WaveformKind::Sine => Ok(waveform::sine_table(SINE_TABLE_LEN)),
        WaveformKind::Ramp => {
            if len == 0 || len > FULL_SCALE_COUNT as usize {
                bail!("ramp length must be between 1 and {FULL_SCALE_COUNT}, got {len}");
            }
            Ok(waveform::ramp_table(len))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        run: RunArgs,
    }

    fn parse(args: &[&str]) -> RunArgs {
        Harness::parse_from(std::iter::once("daq").chain(args.iter().copied())).run
    }

    #[test]
    fn defaults_match_board_constants() {
        let config = PipelineConfig::from_args(&parse(&[])).unwrap();
        assert_eq!(config.mode, Mode::Analysis);
        assert_eq!(config.capacity, BUFFER_CAPACITY);
        assert_eq!(config.run_limit, RUN_LIMIT);
        assert_eq!(config.tick, Duration::from_millis(TICK_PERIOD_MS));
        assert_eq!(config.table.len(), SINE_TABLE_LEN);
    }

    #[test]
    fn ramp_follows_capacity() {
        let args = parse(&["--waveform", "ramp", "--capacity", "8", "--mode", "sampling-only"]);
        let config = PipelineConfig::from_args(&args).unwrap();
        assert_eq!(config.mode, Mode::SamplingOnly);
        assert_eq!(config.table, (0..8).collect::<Vec<u32>>());
    }

    #[test]
    fn rejects_degenerate_values() {
        for bad in [
            &["--capacity", "0"][..],
            &["--runs", "0"],
            &["--tick-ms", "0"],
            &["--fail-every", "0"],
            &["--transfer-timeout-ticks", "0"],
            &["--waveform", "ramp", "--capacity", "5000"],
        ] {
            assert!(PipelineConfig::from_args(&parse(bad)).is_err(), "{bad:?}");
        }
    }
}

//! Pipeline assembly and the analysis task.
//!
//! Wires the simulated board, the timer service, the swap coordinator and a
//! transfer engine together. The producer timer writes the next waveform
//! sample to the output channel and toggles the heartbeat LED. The consumer
//! timer samples the input channel into the coordinator, arms the busy-clear
//! one-shot whenever a transfer starts, and runs the transfer watchdog. The
//! analysis task turns each completed window into a [`StatisticsRecord`] and
//! stops both periodic timers once the run limit is reached.

use crate::board::{ConsoleIndicator, LoopbackChannel};
use crate::config::{Mode, PipelineConfig};
use crate::irq::{Doorbell, IrqEngine};
use crate::scheduler::{TimerHandle, TimerService};
use crate::stats::{StatisticsRecord, WindowStats, to_volts};
use crate::waveform::Waveform;
use anyhow::{Context, Result, anyhow};
use daq_common::Channel;
use daq_common::timing::{BUSY_INDICATOR_TICKS, CONSUMER_PERIOD_TICKS, PRODUCER_PERIOD_TICKS};
use daq_core::clock::{Clock, Timestamp};
use daq_core::peripheral::{Indicator, SampleSource};
use daq_core::swap::{SampleOutcome, SwapCoordinator, WindowEvent};
use daq_core::transfer::TransferEngine;
use std::sync::Arc;
use tracing::{info, trace, warn};

/// Deferred analysis of completed windows.
///
/// Owns the run counter. Each `Ready` event is drained from the standby
/// buffer into a fresh [`WindowStats`], reported and released.
pub struct AnalysisTask<E> {
    coordinator: SwapCoordinator<u32, E>,
    indicator: Arc<dyn Indicator>,
    timers: Vec<TimerHandle>,
    run_limit: u32,
    runs: u32,
}

impl<E: TransferEngine<u32> + 'static> AnalysisTask<E> {
    pub fn new(
        coordinator: SwapCoordinator<u32, E>,
        indicator: Arc<dyn Indicator>,
        timers: Vec<TimerHandle>,
        run_limit: u32,
    ) -> Self {
        Self {
            coordinator,
            indicator,
            timers,
            run_limit,
            runs: 0,
        }
    }

    pub fn runs(&self) -> u32 {
        self.runs
    }

    pub fn finished(&self) -> bool {
        self.runs >= self.run_limit
    }

    /// Handles every queued window event.
    pub fn run_pending(&mut self) -> Vec<StatisticsRecord> {
        let mut records = Vec::new();

        while let Some(event) = self.coordinator.next_event() {
            match event {
                WindowEvent::Ready {
                    window,
                    start,
                    end,
                    samples,
                } => {
                    if self.finished() {
                        self.coordinator.release_standby();
                        continue;
                    }
                    let mut stats = WindowStats::new();
                    while let Some(raw) = self.coordinator.pop_standby() {
                        stats.update(to_volts(raw));
                    }
                    self.coordinator.release_standby();
                    self.indicator.set(Channel::Red, false);

                    self.runs += 1;
                    let record = StatisticsRecord::new(
                        self.runs,
                        &stats,
                        Timestamp::from_ticks(start),
                        Timestamp::from_ticks(end),
                    );
                    info!(window, samples, "{record}");
                    records.push(record);

                    if self.finished() {
                        self.stop();
                    }
                }
                WindowEvent::Failed { window, start, end } => {
                    self.indicator.set(Channel::Red, true);
                    warn!(
                        window,
                        start = %Timestamp::from_ticks(start),
                        end = %Timestamp::from_ticks(end),
                        "transfer failed, window dropped"
                    );
                }
            }
        }
        records
    }

    fn stop(&self) {
        for timer in &self.timers {
            timer.stop();
        }
        self.coordinator.halt();
        info!(runs = self.runs, "run limit reached, sampling stopped");
    }
}

/// A fully wired analysis-mode pipeline.
pub struct Pipeline<E> {
    pub service: TimerService,
    pub task: AnalysisTask<E>,
    pub coordinator: SwapCoordinator<u32, E>,
    pub indicator: Arc<ConsoleIndicator>,
    pub producer: TimerHandle,
    pub consumer: TimerHandle,
}

/// Registers the producer timer on `service`.
fn producer_timer(
    service: &mut TimerService,
    table: Vec<u32>,
    channel: Arc<LoopbackChannel>,
    indicator: Arc<ConsoleIndicator>,
    heartbeat: Channel,
) -> Result<TimerHandle> {
    let mut wave = Waveform::new(table).context("waveform table is empty")?;
    let mut lit = false;
    Ok(service.periodic("producer", PRODUCER_PERIOD_TICKS, move || {
        let sample = wave.next_sample();
        trace!(sample, "writing output channel");
        channel.write(sample);
        lit = !lit;
        indicator.set(heartbeat, lit);
    }))
}

impl<E: TransferEngine<u32> + 'static> Pipeline<E> {
    /// Builds the analysis pipeline around `engine`. The coordinator is
    /// started; nothing runs until the service is stepped.
    pub fn analysis(config: &PipelineConfig, engine: E) -> Result<Self> {
        let clock = Arc::new(Clock::new());
        let indicator = Arc::new(ConsoleIndicator::new());
        let channel = Arc::new(LoopbackChannel::new());
        let mut service = TimerService::new(clock.clone());

        let coordinator = SwapCoordinator::new(config.capacity, engine, clock.clone(), indicator.clone())
            .context("Failed to allocate sample buffers")?;

        let producer = producer_timer(
            &mut service,
            config.table.clone(),
            channel.clone(),
            indicator.clone(),
            Channel::Green,
        )?;

        let led = indicator.clone();
        let busy = service.one_shot("busy-clear", BUSY_INDICATOR_TICKS, move || {
            led.set(Channel::Blue, false)
        });

        let consumer = {
            let coordinator = coordinator.clone();
            let clock = clock.clone();
            let timeout = config.transfer_timeout_ticks;
            service.periodic("consumer", CONSUMER_PERIOD_TICKS, move || {
                let sample = channel.read();
                if let SampleOutcome::TransferStarted { .. } = coordinator.on_sample(sample) {
                    busy.arm(clock.now());
                }
                if let Some(ticks) = timeout {
                    coordinator.check_watchdog(ticks);
                }
            })
        };

        coordinator.start();
        let task = AnalysisTask::new(
            coordinator.clone(),
            indicator.clone(),
            vec![producer.clone(), consumer.clone()],
            config.run_limit,
        );

        Ok(Self {
            service,
            task,
            coordinator,
            indicator,
            producer,
            consumer,
        })
    }

    /// One tick followed by one pass of the analysis task.
    pub fn step(&mut self) -> Vec<StatisticsRecord> {
        self.service.step();
        self.task.run_pending()
    }
}

/// Runs the pipeline described by `config` in real time.
///
/// Returns the statistics records produced, which is empty in sampling-only
/// mode.
pub fn run(config: PipelineConfig) -> Result<Vec<StatisticsRecord>> {
    info!(
        mode = ?config.mode,
        capacity = config.capacity,
        runs = config.run_limit,
        tick_ms = config.tick.as_millis() as u64,
        table = config.table.len(),
        "starting pipeline"
    );
    match config.mode {
        Mode::SamplingOnly => run_sampling_only(config),
        Mode::Analysis => run_analysis(config),
    }
}

fn run_sampling_only(config: PipelineConfig) -> Result<Vec<StatisticsRecord>> {
    let clock = Arc::new(Clock::new());
    let mut service = TimerService::new(clock);
    producer_timer(
        &mut service,
        config.table,
        Arc::new(LoopbackChannel::new()),
        Arc::new(ConsoleIndicator::new()),
        Channel::Blue,
    )?;

    let steps = service
        .spawn(config.tick, config.max_ticks)
        .context("Failed to start timer service")?
        .join()
        .map_err(|_| anyhow!("timer service panicked"))?;
    info!(steps, "sampling finished");
    Ok(Vec::new())
}

fn run_analysis(config: PipelineConfig) -> Result<Vec<StatisticsRecord>> {
    let doorbell = Arc::new(Doorbell::new());
    let engine = IrqEngine::spawn(config.transfer_latency, doorbell.clone(), config.fail_every);
    let Pipeline {
        service,
        mut task,
        coordinator,
        ..
    } = Pipeline::analysis(&config, engine)?;

    let timers = service
        .spawn(config.tick, config.max_ticks)
        .context("Failed to start timer service")?;

    let mut records = Vec::new();
    while !task.finished() && !timers.is_finished() {
        doorbell.wait(config.tick * 2);
        records.extend(task.run_pending());
    }

    let steps = timers
        .join()
        .map_err(|_| anyhow!("timer service panicked"))?;
    coordinator.halt();
    records.extend(task.run_pending());

    let stats = coordinator.stats();
    info!(
        steps,
        runs = task.runs(),
        completed = stats.completed_windows,
        dropped_windows = stats.dropped_windows,
        dropped_samples = stats.dropped_samples,
        failed = stats.failed_transfers,
        spurious = stats.spurious_completions,
        "pipeline finished"
    );
    if !task.finished() {
        warn!(
            runs = task.runs(),
            limit = config.run_limit,
            "tick budget exhausted before the run limit"
        );
    }
    Ok(records)
}

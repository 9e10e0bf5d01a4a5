//! The adaptive tuner: a single long-running control task that hill-climbs
//! the managed executor's parallelism to maximize measured throughput.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::TunerConfig;
use crate::executor::ManagedExecutor;
use crate::sensor::ThroughputSensor;

/// Two-step hill-climb memory of the last action taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TunerAction {
    None,
    Increment,
    Decrement,
}

/// Decides the next action from a measurement snapshot. Pure and
/// synchronous so it can be tested without any timing or async machinery.
pub fn decide_action(
    current_max: f64,
    avg_parallelism: f64,
    over_provision_margin: f64,
    last_action: TunerAction,
    relative_throughput_change: f64,
    threshold: f64,
) -> TunerAction {
    if avg_parallelism < current_max - over_provision_margin {
        return TunerAction::Decrement;
    }
    match last_action {
        TunerAction::None => TunerAction::Increment,
        TunerAction::Increment => {
            if relative_throughput_change > threshold {
                TunerAction::Increment
            } else {
                TunerAction::Decrement
            }
        }
        TunerAction::Decrement => {
            if relative_throughput_change > threshold {
                TunerAction::Decrement
            } else {
                TunerAction::Increment
            }
        }
    }
}

/// The running control loop. Holds no state beyond what's needed to decide
/// the next action; all measurement lives in the shared `ThroughputSensor`.
pub struct AdaptiveTuner {
    executor: Arc<ManagedExecutor>,
    sensor: Arc<ThroughputSensor>,
    config: TunerConfig,
    sensor_retention_multiple: f64,
    cancellation: CancellationToken,
}

impl AdaptiveTuner {
    pub fn new(
        executor: Arc<ManagedExecutor>,
        sensor: Arc<ThroughputSensor>,
        config: TunerConfig,
        sensor_retention_multiple: f64,
        cancellation: CancellationToken,
    ) -> Self {
        Self {
            executor,
            sensor,
            config,
            sensor_retention_multiple,
            cancellation,
        }
    }

    /// Runs until the cancellation token fires. Intended to be driven by a
    /// single `tokio::spawn` call from the owning engine.
    pub async fn run(&self) {
        let mut last_action = TunerAction::None;
        let mut last_throughput = 0.0_f64;
        let mut window_start = Instant::now();

        loop {
            if self.cancellation.is_cancelled() {
                break;
            }

            if !self.wait_for_first_completion(window_start).await {
                break;
            }

            let avg_duration = self.sensor.summary(window_start, Instant::now()).avg_duration_sec;
            let window_len = if avg_duration > 0.0 {
                Duration::from_secs_f64(self.config.window_multiple * avg_duration)
            } else {
                Duration::from_millis(self.config.poll_interval_ms)
            };

            tokio::select! {
                _ = self.cancellation.cancelled() => break,
                _ = tokio::time::sleep(window_len) => {}
            }

            let window_end = Instant::now();
            let summary = self.sensor.summary(window_start, window_end);
            let current_max = self.executor.max_parallelism() as f64;

            let dt = if last_throughput > 0.0 {
                (summary.boxed_throughput - last_throughput) / last_throughput
            } else {
                0.0
            };

            let action = decide_action(
                current_max,
                summary.avg_parallelism,
                self.config.over_provision_margin,
                last_action,
                dt,
                self.config.throughput_threshold,
            );

            self.apply_action(action, current_max as usize).await;

            debug!(
                ?action,
                avg_parallelism = summary.avg_parallelism,
                boxed_throughput = summary.boxed_throughput,
                "tuner measurement window"
            );

            last_action = action;
            last_throughput = summary.boxed_throughput;
            self.sensor
                .prune(window_end, window_len, self.sensor_retention_multiple);
            window_start = window_end;
        }
    }

    async fn apply_action(&self, action: TunerAction, current_max: usize) {
        match action {
            TunerAction::None => {}
            TunerAction::Increment => {
                self.executor.increment_parallelism(1);
                info!(new_max = current_max + 1, "tuner increased parallelism");
            }
            TunerAction::Decrement => {
                if current_max > self.config.decrement_floor {
                    if self.executor.decrement_parallelism(1).await.is_ok() {
                        info!(
                            new_max = current_max.saturating_sub(1),
                            "tuner decreased parallelism"
                        );
                    }
                }
            }
        }
    }

    /// Polls at `poll_interval_ms` until at least one job has completed
    /// since `window_start`, or cancellation fires. Returns `false` on
    /// cancellation.
    async fn wait_for_first_completion(&self, window_start: Instant) -> bool {
        loop {
            if self.cancellation.is_cancelled() {
                return false;
            }
            let summary = self.sensor.summary(window_start, Instant::now());
            if summary.avg_duration_sec > 0.0 {
                return true;
            }
            tokio::select! {
                _ = self.cancellation.cancelled() => return false,
                _ = tokio::time::sleep(Duration::from_millis(self.config.poll_interval_ms)) => {}
            }
        }
    }
}

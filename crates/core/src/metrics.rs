//! Optional, non-behavioral metrics hooks. Per the engine's contract,
//! missing metrics must never change behavior — every method has a no-op
//! default and no sink implementation may return a `Result` or block.

use std::time::Duration;

pub trait MetricsSink: Send + Sync {
    fn record_queue_depth(&self, _depth: usize) {}
    fn record_queue_wait(&self, _duration: Duration) {}
    fn record_inference_duration(&self, _duration: Duration) {}
    fn record_parallelism(&self, _current: usize, _max: usize) {}
    fn record_throughput(&self, _jobs_per_sec: f64) {}
}

/// The default sink: every recording call is a no-op.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetricsSink;

impl MetricsSink for NoopMetricsSink {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_sink_accepts_every_call_without_panicking() {
        let sink = NoopMetricsSink;
        sink.record_queue_depth(3);
        sink.record_queue_wait(Duration::from_millis(5));
        sink.record_inference_duration(Duration::from_millis(5));
        sink.record_parallelism(2, 4);
        sink.record_throughput(1.5);
    }
}

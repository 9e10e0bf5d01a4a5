//! Sliding-window throughput statistics over completed jobs: time-weighted
//! average parallelism, average job duration, and boxed throughput.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy)]
struct JobRecord {
    start: Instant,
    end: Instant,
}

/// A snapshot of throughput statistics over a measurement window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Summary {
    pub avg_parallelism: f64,
    pub avg_duration_sec: f64,
    pub boxed_throughput: f64,
}

/// Maintains a bounded time-indexed list of completed-job records behind a
/// single mutex, held only during insert and query.
pub struct ThroughputSensor {
    records: Mutex<VecDeque<JobRecord>>,
    next_job_id: AtomicU64,
}

impl ThroughputSensor {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(VecDeque::new()),
            next_job_id: AtomicU64::new(0),
        }
    }

    /// Allocates a fresh job id; purely a convenience for callers that want
    /// to correlate a record with tracing spans.
    pub fn next_job_id(&self) -> u64 {
        self.next_job_id.fetch_add(1, Ordering::SeqCst)
    }

    pub fn record_completion(&self, start: Instant, end: Instant) {
        let mut records = self.records.lock().expect("sensor mutex poisoned");
        records.push_back(JobRecord { start, end });
    }

    pub fn summary(&self, window_start: Instant, window_end: Instant) -> Summary {
        let records = self.records.lock().expect("sensor mutex poisoned");
        let window_duration = window_end.saturating_duration_since(window_start).as_secs_f64();
        if window_duration <= 0.0 {
            return Summary {
                avg_parallelism: 0.0,
                avg_duration_sec: 0.0,
                boxed_throughput: 0.0,
            };
        }

        let mut overlap_total = 0.0;
        let mut overlapping_durations = Vec::new();
        let mut boxed_count = 0u64;

        for record in records.iter() {
            let overlap = overlap_duration(record.start, record.end, window_start, window_end);
            if overlap > Duration::ZERO {
                overlap_total += overlap.as_secs_f64();
                overlapping_durations
                    .push(record.end.saturating_duration_since(record.start).as_secs_f64());
            }
            if record.start >= window_start && record.end <= window_end {
                boxed_count += 1;
            }
        }

        let avg_parallelism = overlap_total / window_duration;
        let avg_duration_sec = if overlapping_durations.is_empty() {
            0.0
        } else {
            overlapping_durations.iter().sum::<f64>() / overlapping_durations.len() as f64
        };
        let boxed_throughput = boxed_count as f64 / window_duration;

        Summary {
            avg_parallelism,
            avg_duration_sec,
            boxed_throughput,
        }
    }

    /// Discards records older than `retention_multiple * current_window`
    /// relative to `now`. Called by the tuner after each iteration.
    pub fn prune(&self, now: Instant, current_window: Duration, retention_multiple: f64) {
        let retention = current_window.mul_f64(retention_multiple.max(1.0));
        let mut records = self.records.lock().expect("sensor mutex poisoned");
        records.retain(|r| now.saturating_duration_since(r.end) <= retention);
    }

    pub fn len(&self) -> usize {
        self.records.lock().expect("sensor mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ThroughputSensor {
    fn default() -> Self {
        Self::new()
    }
}

fn overlap_duration(
    rec_start: Instant,
    rec_end: Instant,
    win_start: Instant,
    win_end: Instant,
) -> Duration {
    let start = rec_start.max(win_start);
    let end = rec_end.min(win_end);
    if end > start {
        end - start
    } else {
        Duration::ZERO
    }
}

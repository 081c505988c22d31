//! Run statistics shared across the requests of one invocation.

use crate::error::PipelineError;
use crate::summary::Summary;
use crate::types::result::Outcome;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::{Duration, Instant};
use tracing::info;

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Stage {
    Read,
    Columns,
    Values,
    Inference,
    Summary,
}

impl Stage {
    pub const ALL: [Stage; 5] = [
        Stage::Read,
        Stage::Columns,
        Stage::Values,
        Stage::Inference,
        Stage::Summary,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Stage::Read => "read",
            Stage::Columns => "columns",
            Stage::Values => "values",
            Stage::Inference => "inference",
            Stage::Summary => "summary",
        }
    }
}

/// Wall time spent in each stage of one run, in microseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StageTimings {
    pub read_us: u64,
    pub columns_us: u64,
    pub values_us: u64,
    pub inference_us: u64,
    pub summary_us: u64,
}

impl StageTimings {
    pub fn set(&mut self, stage: Stage, elapsed: Duration) {
        let us = elapsed.as_micros() as u64;
        match stage {
            Stage::Read => self.read_us = us,
            Stage::Columns => self.columns_us = us,
            Stage::Values => self.values_us = us,
            Stage::Inference => self.inference_us = us,
            Stage::Summary => self.summary_us = us,
        }
    }

    pub fn get(&self, stage: Stage) -> u64 {
        match stage {
            Stage::Read => self.read_us,
            Stage::Columns => self.columns_us,
            Stage::Values => self.values_us,
            Stage::Inference => self.inference_us,
            Stage::Summary => self.summary_us,
        }
    }

    pub fn total_us(&self) -> u64 {
        Stage::ALL.iter().map(|&s| self.get(s)).sum()
    }
}

/// Counters and latency samples for a batch of uploads
pub struct PipelineMetrics {
    /// Uploads that produced a result table
    pub files_processed: AtomicU64,
    /// Uploads rejected by any stage
    pub files_failed: AtomicU64,
    /// Rows scored across all uploads
    pub rows_predicted: AtomicU64,
    dropout_rows: AtomicU64,
    graduate_rows: AtomicU64,
    /// Failures by error kind
    failures_by_kind: RwLock<HashMap<&'static str, u64>>,
    /// Stage latencies (in microseconds)
    stage_times: RwLock<HashMap<Stage, Vec<u64>>>,
    start_time: Instant,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self {
            files_processed: AtomicU64::new(0),
            files_failed: AtomicU64::new(0),
            rows_predicted: AtomicU64::new(0),
            dropout_rows: AtomicU64::new(0),
            graduate_rows: AtomicU64::new(0),
            failures_by_kind: RwLock::new(HashMap::new()),
            stage_times: RwLock::new(HashMap::new()),
            start_time: Instant::now(),
        }
    }

    /// Record a successful upload.
    pub fn record_success(&self, summary: &Summary, timings: &StageTimings) {
        self.files_processed.fetch_add(1, Ordering::Relaxed);
        self.rows_predicted
            .fetch_add(summary.total() as u64, Ordering::Relaxed);
        self.dropout_rows
            .fetch_add(summary.get(Outcome::Dropout) as u64, Ordering::Relaxed);
        self.graduate_rows
            .fetch_add(summary.get(Outcome::Graduate) as u64, Ordering::Relaxed);

        if let Ok(mut times) = self.stage_times.write() {
            for stage in Stage::ALL {
                times.entry(stage).or_default().push(timings.get(stage));
            }
        }
    }

    /// Record a rejected upload.
    pub fn record_failure(&self, error: &PipelineError) {
        self.files_failed.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut by_kind) = self.failures_by_kind.write() {
            *by_kind.entry(error.kind()).or_insert(0) += 1;
        }
    }

    /// Latency statistics for one stage
    pub fn stage_stats(&self, stage: Stage) -> LatencyStats {
        let Ok(times) = self.stage_times.read() else {
            return LatencyStats::default();
        };
        match times.get(&stage) {
            Some(samples) => LatencyStats::from_samples(samples),
            None => LatencyStats::default(),
        }
    }

    pub fn failures_by_kind(&self) -> HashMap<&'static str, u64> {
        self.failures_by_kind
            .read()
            .map(|m| m.clone())
            .unwrap_or_default()
    }

    /// Rows per second since the metrics were created
    pub fn throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.rows_predicted.load(Ordering::Relaxed) as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Log summary statistics
    pub fn print_summary(&self) {
        let processed = self.files_processed.load(Ordering::Relaxed);
        let failed = self.files_failed.load(Ordering::Relaxed);
        let rows = self.rows_predicted.load(Ordering::Relaxed);
        let dropout = self.dropout_rows.load(Ordering::Relaxed);
        let graduate = self.graduate_rows.load(Ordering::Relaxed);
        let dropout_rate = if rows > 0 {
            (dropout as f64 / rows as f64) * 100.0
        } else {
            0.0
        };

        info!("╔══════════════════════════════════════════════════════════════╗");
        info!("║          STUDENT OUTCOME PIPELINE - RUN SUMMARY              ║");
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Files: {:>5} ok, {:>5} failed  │  Rows: {:>8} ({:>7.1} rows/s) ║",
            processed,
            failed,
            rows,
            self.throughput()
        );
        info!(
            "║ Dropout: {:>8} ({:>5.1}%)  │  Graduate: {:>8}              ║",
            dropout, dropout_rate, graduate
        );
        info!("╠══════════════════════════════════════════════════════════════╣");
        for stage in Stage::ALL {
            let stats = self.stage_stats(stage);
            info!(
                "║ {:<9} (μs): mean={:>6} p50={:>6} p95={:>6} max={:>6}       ║",
                stage.name(),
                stats.mean_us,
                stats.p50_us,
                stats.p95_us,
                stats.max_us
            );
        }

        let failures = self.failures_by_kind();
        if !failures.is_empty() {
            info!("╠══════════════════════════════════════════════════════════════╣");
            info!("║ Failures by kind:                                            ║");
            let mut kinds: Vec<_> = failures.into_iter().collect();
            kinds.sort();
            for (kind, count) in kinds {
                info!("║   {:<16}: {:>6}                                     ║", kind, count);
            }
        }
        info!("╚══════════════════════════════════════════════════════════════╝");
    }
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Latency statistics over a set of samples
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LatencyStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub max_us: u64,
}

impl LatencyStats {
    fn from_samples(samples: &[u64]) -> Self {
        if samples.is_empty() {
            return Self::default();
        }

        let mut sorted = samples.to_vec();
        sorted.sort_unstable();

        let count = sorted.len();
        let sum: u64 = sorted.iter().sum();
        let percentile = |q: f64| sorted[((count as f64 * q) as usize).min(count - 1)];

        Self {
            count: count as u64,
            mean_us: sum / count as u64,
            p50_us: percentile(0.5),
            p95_us: percentile(0.95),
            max_us: sorted[count - 1],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SchemaMismatch;

    #[test]
    fn test_stage_timings() {
        let mut timings = StageTimings::default();
        timings.set(Stage::Values, Duration::from_micros(120));
        timings.set(Stage::Inference, Duration::from_micros(80));

        assert_eq!(timings.get(Stage::Values), 120);
        assert_eq!(timings.total_us(), 200);
    }

    #[test]
    fn test_metrics_recording() {
        let metrics = PipelineMetrics::new();
        let summary = Summary::empty();
        let timings = StageTimings {
            inference_us: 100,
            ..StageTimings::default()
        };

        metrics.record_success(&summary, &timings);
        metrics.record_success(&summary, &StageTimings { inference_us: 300, ..timings });
        metrics.record_failure(&PipelineError::SchemaMismatch(SchemaMismatch::Count {
            expected: 36,
            actual: 35,
        }));

        assert_eq!(metrics.files_processed.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.files_failed.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.failures_by_kind().get("schema_mismatch"), Some(&1));

        let stats = metrics.stage_stats(Stage::Inference);
        assert_eq!(stats.count, 2);
        assert_eq!(stats.mean_us, 200);
        assert_eq!(stats.max_us, 300);
    }

    #[test]
    fn test_latency_percentiles() {
        let samples: Vec<u64> = (1..=100).collect();
        let stats = LatencyStats::from_samples(&samples);

        assert_eq!(stats.p50_us, 51);
        assert_eq!(stats.p95_us, 96);
        assert_eq!(stats.max_us, 100);
        assert_eq!(LatencyStats::from_samples(&[]), LatencyStats::default());
    }
}

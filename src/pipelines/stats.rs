use std::time::{Duration, Instant};

/// Timing of one pipeline operation.
#[derive(Debug, Clone)]
pub struct PipelineStats {
    /// Total execution time.
    pub total_time: Duration,
    /// Number of items processed (samples, or optimizer steps for training).
    pub items_processed: usize,
}

impl PipelineStats {
    /// Create a new stats tracker (call at start of operation).
    pub(crate) fn start() -> PipelineStatsBuilder {
        PipelineStatsBuilder {
            start_time: Instant::now(),
        }
    }
}

/// Tracks timing from creation to finish.
pub(crate) struct PipelineStatsBuilder {
    start_time: Instant,
}

impl PipelineStatsBuilder {
    /// Finalize stats and log them under `operation`.
    pub fn finish(self, operation: &'static str, items_processed: usize) -> PipelineStats {
        let stats = PipelineStats {
            total_time: self.start_time.elapsed(),
            items_processed,
        };
        tracing::info!(
            operation,
            items = items_processed,
            elapsed_ms = stats.total_time.as_secs_f64() * 1000.0,
            "finished"
        );
        stats
    }
}

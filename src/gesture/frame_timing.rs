//! Frame pipeline timing.
//!
//! Tracks the interval between incoming frames and the time spent
//! classifying and dispatching each one, with rolling percentiles
//! for IPC reporting.

use std::collections::VecDeque;

/// Rolling timing samples over a window of frames.
#[derive(Debug)]
pub struct FrameTiming {
    /// Interval between consecutive frame timestamps.
    pub interval_times: VecDeque<f64>,
    /// Engine plus sink time per frame.
    pub processing_times: VecDeque<f64>,
    /// Maximum number of samples to keep.
    pub window_size: usize,
    /// Total frames recorded.
    pub total_frames: u64,
    /// Frames whose processing exceeded the budget.
    pub slow_frames: u64,
    /// Processing budget in milliseconds (33.3 for a 30 fps camera).
    pub budget_ms: f64,
    last_timestamp_ms: Option<f64>,
}

impl Default for FrameTiming {
    fn default() -> Self {
        Self::new(300, 33.3)
    }
}

impl FrameTiming {
    pub fn new(window_size: usize, budget_ms: f64) -> Self {
        Self {
            interval_times: VecDeque::with_capacity(window_size),
            processing_times: VecDeque::with_capacity(window_size),
            window_size,
            total_frames: 0,
            slow_frames: 0,
            budget_ms,
            last_timestamp_ms: None,
        }
    }

    /// Record one processed frame.
    pub fn record_frame(&mut self, timestamp_ms: f64, processing_ms: f64) {
        if let Some(last) = self.last_timestamp_ms {
            let interval = timestamp_ms - last;
            if interval >= 0.0 {
                Self::push_sample(&mut self.interval_times, interval, self.window_size);
            }
        }
        self.last_timestamp_ms = Some(timestamp_ms);

        Self::push_sample(&mut self.processing_times, processing_ms, self.window_size);
        self.total_frames += 1;
        if processing_ms > self.budget_ms {
            self.slow_frames += 1;
        }
    }

    fn push_sample(samples: &mut VecDeque<f64>, value: f64, window_size: usize) {
        samples.push_back(value);
        while samples.len() > window_size {
            samples.pop_front();
        }
    }

    fn sorted(samples: &VecDeque<f64>) -> Vec<f64> {
        let mut v: Vec<f64> = samples.iter().copied().collect();
        v.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        v
    }

    /// Compute percentile from a sorted slice.
    fn percentile(sorted: &[f64], p: f64) -> f64 {
        if sorted.is_empty() {
            return 0.0;
        }
        let idx = ((sorted.len() as f64 - 1.0) * p / 100.0).round() as usize;
        sorted[idx.min(sorted.len() - 1)]
    }

    pub fn stats(&self) -> FrameTimingStats {
        let interval = Self::sorted(&self.interval_times);
        let processing = Self::sorted(&self.processing_times);
        let interval_p50 = Self::percentile(&interval, 50.0);

        FrameTimingStats {
            interval_p50,
            interval_p99: Self::percentile(&interval, 99.0),
            processing_p50: Self::percentile(&processing, 50.0),
            processing_p95: Self::percentile(&processing, 95.0),
            processing_p99: Self::percentile(&processing, 99.0),
            fps: if interval_p50 > 0.0 { 1000.0 / interval_p50 } else { 0.0 },
            slow_pct: if self.total_frames > 0 {
                (self.slow_frames as f64 / self.total_frames as f64) * 100.0
            } else {
                0.0
            },
            total_frames: self.total_frames,
            slow_frames: self.slow_frames,
        }
    }

    /// Format stats as an s-expression for IPC.
    pub fn stats_sexp(&self) -> String {
        let s = self.stats();
        format!(
            "(:interval-p50 {:.1} :interval-p99 {:.1} :processing-p50 {:.2} :processing-p99 {:.2} :slow-pct {:.1} :fps {:.0} :total-frames {} :slow-frames {})",
            s.interval_p50, s.interval_p99, s.processing_p50, s.processing_p99,
            s.slow_pct, s.fps, s.total_frames, s.slow_frames,
        )
    }
}

/// Computed timing statistics.
#[derive(Debug, Clone)]
pub struct FrameTimingStats {
    pub interval_p50: f64,
    pub interval_p99: f64,
    pub processing_p50: f64,
    pub processing_p95: f64,
    pub processing_p99: f64,
    pub fps: f64,
    pub slow_pct: f64,
    pub total_frames: u64,
    pub slow_frames: u64,
}

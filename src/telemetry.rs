//! Progress telemetry: delta-based speed/ETA estimation and publish smoothing
//!
//! Raw samples arrive from the engine far more often than a UI wants to redraw.
//! Each sample is turned into an instantaneous estimate by [`ProgressEstimator`],
//! buffered in a [`SmoothingBuffer`], and the buffer's mean is written to the
//! task once per publish interval.

use std::collections::VecDeque;
use std::time::Instant;

/// Capacity of the channel carrying raw samples from the engine to a task
pub(crate) const SAMPLE_CHANNEL_BUFFER: usize = 256;

const BYTES_PER_MIB: f64 = 1024.0 * 1024.0;

/// Raw progress report from the engine
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProgressSample {
    /// Bytes downloaded so far
    pub downloaded: u64,
    /// Total bytes, when the engine knows it
    pub total: Option<u64>,
    /// When the sample was taken
    pub at: Instant,
}

/// Instantaneous estimate derived from one sample
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProgressEstimate {
    /// Completed fraction in `[0, 1]`
    pub progress: f64,
    /// Completed percentage in `[0, 100]`
    pub percent: u8,
    /// Throughput against the previous sample
    pub bytes_per_sec: Option<f64>,
    /// Seconds remaining, -1 if unknown
    pub eta_secs: i64,
}

/// Turns cumulative byte counts into instantaneous throughput
#[derive(Debug, Default)]
pub struct ProgressEstimator {
    last: Option<(u64, Instant)>,
}

impl ProgressEstimator {
    /// Create an estimator with no history
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one sample and get the estimate for it
    ///
    /// Throughput is only computed when both the byte delta and the time delta
    /// against the previous sample are positive. The ETA needs both a known
    /// total and a throughput.
    pub fn sample(&mut self, sample: ProgressSample) -> ProgressEstimate {
        let bytes_per_sec = match self.last {
            Some((prev_bytes, prev_at)) if sample.downloaded > prev_bytes => {
                let elapsed = sample.at.saturating_duration_since(prev_at).as_secs_f64();
                (elapsed > 0.0).then(|| (sample.downloaded - prev_bytes) as f64 / elapsed)
            }
            _ => None,
        };
        self.last = Some((sample.downloaded, sample.at));

        let (progress, percent) = match sample.total {
            Some(total) if total > 0 => {
                let fraction = (sample.downloaded as f64 / total as f64).clamp(0.0, 1.0);
                let percent = (sample.downloaded.saturating_mul(100) / total).min(100) as u8;
                (fraction, percent)
            }
            // Unknown size: approximate by MiB so the bar never reads complete
            _ => {
                let mib = (sample.downloaded as f64 / BYTES_PER_MIB).floor().min(99.0) as u8;
                (f64::from(mib) / 100.0, mib)
            }
        };

        let eta_secs = match (sample.total, bytes_per_sec) {
            (Some(total), Some(bps)) if total > 0 && bps > 0.0 => {
                (total.saturating_sub(sample.downloaded) as f64 / bps).floor() as i64
            }
            _ => -1,
        };

        ProgressEstimate {
            progress,
            percent,
            bytes_per_sec,
            eta_secs,
        }
    }
}

/// Mean of the buffered samples
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Smoothed {
    /// Mean throughput over samples that had one
    pub bytes_per_sec: Option<f64>,
    /// Rounded mean percentage
    pub percent: u8,
}

/// Bounded ring buffer of `(speed, percent)` pairs
#[derive(Debug)]
pub struct SmoothingBuffer {
    samples: VecDeque<(Option<f64>, u8)>,
    capacity: usize,
}

impl SmoothingBuffer {
    /// Create a buffer holding at most `capacity` samples (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Add a sample, evicting the oldest when full
    pub fn push(&mut self, bytes_per_sec: Option<f64>, percent: u8) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back((bytes_per_sec, percent.min(100)));
    }

    /// Number of buffered samples
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the buffer is empty
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Compute the mean of every field and clear the buffer
    pub fn drain_mean(&mut self) -> Option<Smoothed> {
        if self.samples.is_empty() {
            return None;
        }

        let count = self.samples.len() as f64;
        let percent_sum: f64 = self.samples.iter().map(|(_, p)| f64::from(*p)).sum();

        let speeds: Vec<f64> = self.samples.iter().filter_map(|(s, _)| *s).collect();
        let bytes_per_sec = if speeds.is_empty() {
            None
        } else {
            Some(speeds.iter().sum::<f64>() / speeds.len() as f64)
        };

        self.samples.clear();

        Some(Smoothed {
            bytes_per_sec,
            percent: (percent_sum / count).round().clamp(0.0, 100.0) as u8,
        })
    }
}

/// Render a throughput as MiB/s with one decimal, e.g. `"1.8MB/s"`
pub fn format_speed(bytes_per_sec: f64) -> String {
    format!("{:.1}MB/s", bytes_per_sec / BYTES_PER_MIB)
}

/// Values written to a task on each publish tick
#[derive(Clone, Debug, PartialEq)]
pub struct Publication {
    /// Formatted mean speed, `None` if no sample carried a throughput
    pub speed: Option<String>,
    /// Mean percentage
    pub percent: u8,
    /// `percent / 100`
    pub progress: f64,
    /// Latest ETA in seconds, -1 if unknown
    pub eta_secs: i64,
    /// Latest total size reported by the engine
    pub total_bytes: Option<u64>,
}

/// Per-task telemetry state, owned by the task's running download
#[derive(Debug)]
pub struct TaskTelemetry {
    estimator: ProgressEstimator,
    buffer: SmoothingBuffer,
    eta_secs: i64,
    total_bytes: Option<u64>,
}

impl TaskTelemetry {
    /// Create telemetry with the given smoothing window
    pub fn new(window: usize) -> Self {
        Self {
            estimator: ProgressEstimator::new(),
            buffer: SmoothingBuffer::new(window),
            eta_secs: -1,
            total_bytes: None,
        }
    }

    /// Record a raw sample from the engine
    pub fn record(&mut self, sample: ProgressSample) {
        let estimate = self.estimator.sample(sample);
        if estimate.eta_secs >= 0 {
            self.eta_secs = estimate.eta_secs;
        }
        if sample.total.is_some() {
            self.total_bytes = sample.total;
        }
        self.buffer.push(estimate.bytes_per_sec, estimate.percent);
    }

    /// Drain the buffer into the values to publish, `None` if nothing arrived since the last tick
    pub fn publish(&mut self) -> Option<Publication> {
        let smoothed = self.buffer.drain_mean()?;
        Some(Publication {
            speed: smoothed.bytes_per_sec.map(format_speed),
            percent: smoothed.percent,
            progress: f64::from(smoothed.percent) / 100.0,
            eta_secs: self.eta_secs,
            total_bytes: self.total_bytes,
        })
    }
}

//! Poll statistics rendered by the `/health` endpoint.

use std::fmt::Write as FmtWrite;
use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Mutex,
};

/// Current, mean and range of a sampled value.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Summary {
    current: f64,
    mean: f64,
    max: f64,
    min: f64,
}

#[derive(Default)]
struct Samples {
    count: u64,
    sum: f64,
    last: f64,
    range: Option<(f64, f64)>,
}

impl Samples {
    fn record(&mut self, value: f64) {
        self.count += 1;
        self.sum += value;
        self.last = value;
        self.range = Some(match self.range {
            Some((min, max)) => (min.min(value), max.max(value)),
            None => (value, value),
        });
    }

    fn summary(&self) -> Summary {
        let (min, max) = self.range.unwrap_or_default();
        Summary {
            current: self.last,
            mean: if self.count == 0 {
                0.0
            } else {
                self.sum / self.count as f64
            },
            max,
            min,
        }
    }
}

/// Samples shared between the refresh task and `/health`.
#[derive(Default)]
struct SampleCell(Mutex<Samples>);

impl SampleCell {
    fn record(&self, value: f64) {
        if let Ok(mut samples) = self.0.lock() {
            samples.record(value);
        }
    }

    fn summary(&self) -> Summary {
        self.0
            .lock()
            .map(|samples| samples.summary())
            .unwrap_or_default()
    }
}

/// Running statistics about LoadMaster polls.
#[derive(Default)]
pub struct HealthStats {
    poll_duration_seconds: SampleCell,
    virtual_services: SampleCell,
    real_servers: SampleCell,
    total_polls: AtomicU64,
    failed_polls: AtomicU64,
    last_poll_ok: AtomicBool,
}

impl HealthStats {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn record_success(&self, duration_seconds: f64, virtual_services: usize, real_servers: usize) {
        self.poll_duration_seconds.record(duration_seconds);
        self.virtual_services.record(virtual_services as f64);
        self.real_servers.record(real_servers as f64);
        self.total_polls.fetch_add(1, Ordering::Relaxed);
        self.last_poll_ok.store(true, Ordering::Relaxed);
    }

    pub fn record_failure(&self, duration_seconds: f64) {
        self.poll_duration_seconds.record(duration_seconds);
        self.total_polls.fetch_add(1, Ordering::Relaxed);
        self.failed_polls.fetch_add(1, Ordering::Relaxed);
        self.last_poll_ok.store(false, Ordering::Relaxed);
    }

    pub fn last_poll_ok(&self) -> bool {
        self.last_poll_ok.load(Ordering::Relaxed)
    }

    pub fn total_polls(&self) -> u64 {
        self.total_polls.load(Ordering::Relaxed)
    }

    pub fn failed_polls(&self) -> u64 {
        self.failed_polls.load(Ordering::Relaxed)
    }

    pub fn render_table(&self) -> String {
        let duration = self.poll_duration_seconds.summary();

        let left_col = 22usize;
        let col_w = 12usize;

        let mut out = String::new();

        writeln!(
            out,
            "{:left$} | {:^col$} | {:^col$} | {:^col$} | {:^col$}",
            "metric",
            "current",
            "average",
            "max",
            "min",
            left = left_col,
            col = col_w
        )
        .ok();

        writeln!(out, "{}", "-".repeat(left_col + 3 + (col_w + 3) * 4)).ok();

        writeln!(
            out,
            "{:left$} | {:^col$} | {:^col$} | {:^col$} | {:^col$}",
            "poll duration (s)",
            format!("{:.3}", duration.current),
            format!("{:.3}", duration.mean),
            format!("{:.3}", duration.max),
            format!("{:.3}", duration.min),
            left = left_col,
            col = col_w
        )
        .ok();

        for (label, counts) in [
            ("virtual services", self.virtual_services.summary()),
            ("real servers", self.real_servers.summary()),
        ] {
            writeln!(
                out,
                "{:left$} | {:^col$} | {:^col$} | {:^col$} | {:^col$}",
                label,
                format!("{:.0}", counts.current),
                format!("{:.1}", counts.mean),
                format!("{:.0}", counts.max),
                format!("{:.0}", counts.min),
                left = left_col,
                col = col_w
            )
            .ok();
        }

        writeln!(out).ok();
        writeln!(out, "number of polls: {}", self.total_polls()).ok();
        writeln!(out, "number of failed polls: {}", self.failed_polls()).ok();

        out
    }
}

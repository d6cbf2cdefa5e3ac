//! Application state management for the exporter.
//!
//! This module defines the shared application state that is passed
//! to HTTP handlers and used by the background refresh task.

use prometheus::Registry;
use std::sync::Arc;

use crate::config::Config;
use crate::health_stats::HealthStats;
use crate::metrics::KempMetrics;

/// Type alias for shared application state.
pub type SharedState = Arc<AppState>;

/// Global application state shared across requests and background tasks.
pub struct AppState {
    pub registry: Registry,
    pub metrics: KempMetrics,
    pub health_stats: Arc<HealthStats>,
    pub config: Arc<Config>,
}

impl AppState {
    /// Creates a fresh registry and registers every gauge on it.
    pub fn new(config: Config) -> Result<Self, prometheus::Error> {
        let registry = Registry::new();
        let metrics = KempMetrics::new(&registry)?;

        Ok(Self {
            registry,
            metrics,
            health_stats: Arc::new(HealthStats::new()),
            config: Arc::new(config),
        })
    }
}

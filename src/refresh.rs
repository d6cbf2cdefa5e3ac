//! Background refresh of the gauge registry.
//!
//! Each cycle fetches statistics and the virtual service name list, then
//! overwrites every gauge. A failed cycle only flips `kemp_up` to 0; all
//! other gauges keep the values of the last successful cycle.

use ahash::AHashMap as HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, error, info, instrument};

use crate::client::{ClientError, Statistics, StatsClient, VirtualServiceName};
use crate::metrics::KempMetrics;
use crate::state::SharedState;

/// Virtual service address to display name, rebuilt every cycle.
#[derive(Debug, Default)]
pub struct NameLookup {
    names: HashMap<String, String>,
}

impl NameLookup {
    /// Later entries win when an address appears more than once.
    pub fn from_services(services: &[VirtualServiceName]) -> Self {
        let mut names = HashMap::with_capacity(services.len());
        for vs in services {
            names.insert(vs.address.clone(), vs.name.clone());
        }
        Self { names }
    }

    /// Returns the name for `address`, or an empty string if unknown.
    pub fn resolve(&self, address: &str) -> &str {
        self.names.get(address).map(String::as_str).unwrap_or("")
    }
}

/// Number of resources published by a successful poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSummary {
    pub virtual_services: usize,
    pub real_servers: usize,
}

/// Writes a fetched sample into the gauges.
pub fn publish(metrics: &KempMetrics, stats: &Statistics, names: &NameLookup) {
    metrics.set_totals(&stats.totals);

    for vs in &stats.virtual_services {
        metrics.set_virtual_service(names.resolve(&vs.address), &vs.address, vs.port, &vs.counters);
    }

    for rs in &stats.real_servers {
        metrics.set_real_server(rs);
    }
}

/// Runs one refresh cycle.
///
/// `kemp_up` is written before any other gauge. Nothing else is written
/// unless both client calls succeed.
#[instrument(skip(client, metrics))]
pub async fn poll_once(
    client: &dyn StatsClient,
    metrics: &KempMetrics,
) -> Result<PollSummary, ClientError> {
    let stats = match client.fetch_statistics().await {
        Ok(stats) => stats,
        Err(e) => {
            metrics.set_up(false);
            return Err(e);
        }
    };

    let services = match client.list_virtual_services().await {
        Ok(services) => services,
        Err(e) => {
            metrics.set_up(false);
            return Err(e);
        }
    };

    metrics.set_up(true);
    let names = NameLookup::from_services(&services);
    publish(metrics, &stats, &names);

    debug!(
        "Published {} virtual services ({} named), {} real servers",
        stats.virtual_services.len(),
        services.len(),
        stats.real_servers.len()
    );

    Ok(PollSummary {
        virtual_services: stats.virtual_services.len(),
        real_servers: stats.real_servers.len(),
    })
}

/// Polls forever at a fixed interval until `shutdown` turns true or its
/// sender is dropped.
pub async fn run_refresh_loop(
    state: SharedState,
    client: Arc<dyn StatsClient>,
    wait: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    info!("Refresh loop started with {}s interval", wait.as_secs_f64());

    while !*shutdown.borrow() {
        let start = Instant::now();

        let result = tokio::select! {
            result = poll_once(client.as_ref(), &state.metrics) => result,
            _ = shutdown.changed() => break,
        };

        let elapsed = start.elapsed().as_secs_f64();
        match result {
            Ok(summary) => {
                state.health_stats.record_success(
                    elapsed,
                    summary.virtual_services,
                    summary.real_servers,
                );
                debug!(
                    "Poll completed: {} virtual services, {} real servers, {:.2}ms",
                    summary.virtual_services,
                    summary.real_servers,
                    elapsed * 1000.0
                );
            }
            Err(e) => {
                state.health_stats.record_failure(elapsed);
                error!("Error getting statistics: {}", e);
            }
        }

        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            _ = shutdown.changed() => break,
        }
    }

    info!("Refresh loop stopped");
}

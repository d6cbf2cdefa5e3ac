//! Statistics client for the load balancer appliance.
//!
//! The refresh loop only depends on the [`StatsClient`] trait; the
//! [`LoadMasterClient`] implementation talks to a KEMP LoadMaster.

mod loadmaster;

pub use loadmaster::{ClientConfig, LoadMasterClient};

use async_trait::async_trait;
use thiserror::Error;

/// Errors returned by a statistics client.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Transport(String),
    #[error("unexpected HTTP status {0}")]
    Status(u16),
    #[error("appliance returned an error: {0}")]
    Api(String),
    #[error("failed to decode response: {0}")]
    Decode(String),
}

/// Appliance-wide traffic, CPU and memory figures.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregateTotals {
    pub connections_per_second: f64,
    pub bytes_per_second: f64,
    pub bits_per_second: f64,
    pub packets_per_second: f64,
    pub total_connections: f64,
    pub total_bytes: f64,
    pub total_bits: f64,
    pub total_packets: f64,
    pub cpu_user_percent: f64,
    pub cpu_system_percent: f64,
    pub cpu_idle_percent: f64,
    pub cpu_iowait_percent: f64,
    pub memory_used: f64,
    pub memory_free: f64,
    pub memory_used_percent: f64,
}

/// Counters shared by virtual services and real servers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceCounters {
    pub total_connections: f64,
    pub active_connections: f64,
    pub total_packets: f64,
    pub total_bytes: f64,
    pub bytes_read: f64,
    pub bytes_written: f64,
    pub connections_per_second: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VirtualServiceStat {
    pub address: String,
    pub port: u16,
    pub counters: ResourceCounters,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RealServerStat {
    pub address: String,
    pub port: u16,
    pub counters: ResourceCounters,
}

/// One poll's worth of statistics.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Statistics {
    pub totals: AggregateTotals,
    pub virtual_services: Vec<VirtualServiceStat>,
    pub real_servers: Vec<RealServerStat>,
}

/// Display name of a virtual service, keyed by its address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualServiceName {
    pub address: String,
    pub name: String,
}

/// Source of appliance statistics.
///
/// Both calls use the endpoint and credentials the client was built with.
#[async_trait]
pub trait StatsClient: Send + Sync {
    async fn fetch_statistics(&self) -> Result<Statistics, ClientError>;

    async fn list_virtual_services(&self) -> Result<Vec<VirtualServiceName>, ClientError>;
}

//! KEMP LoadMaster JSON API client.
//!
//! Every call is a `POST {endpoint}/accessv2` carrying the command name and
//! the configured credentials. Appliance firmware is inconsistent about
//! numeric encoding, so counters are accepted as numbers or numeric strings.

use async_trait::async_trait;
use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer};
use std::time::Duration;
use tracing::{debug, info, trace};

use super::{
    AggregateTotals, ClientError, RealServerStat, ResourceCounters, Statistics, StatsClient,
    VirtualServiceName, VirtualServiceStat,
};

const API_PATH: &str = "/accessv2";

/// Connection settings, fixed for the lifetime of the client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub endpoint: String,
    pub username: String,
    pub password: String,
    /// Log every command and raw response body at info level.
    pub debug: bool,
    pub timeout: Duration,
    /// Appliances usually ship with a self-signed certificate.
    pub accept_invalid_certs: bool,
}

pub struct LoadMasterClient {
    http: reqwest::Client,
    url: String,
    config: ClientConfig,
}

impl LoadMasterClient {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()
            .map_err(|e| ClientError::Transport(e.to_string()))?;
        let url = api_url(&config.endpoint);
        debug!("LoadMaster client targeting {}", url);

        Ok(Self { http, url, config })
    }

    async fn command<T: DeserializeOwned>(&self, cmd: &str) -> Result<T, ClientError> {
        let body = serde_json::json!({
            "cmd": cmd,
            "apiuser": self.config.username,
            "apipass": self.config.password,
        });

        if self.config.debug {
            info!("LoadMaster request: cmd={} url={}", cmd, self.url);
        }

        let response = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        if self.config.debug {
            info!("LoadMaster response: cmd={} status={} body={}", cmd, status, text);
        } else {
            trace!("LoadMaster response: cmd={} status={} body={}", cmd, status, text);
        }

        if !status.is_success() {
            return Err(ClientError::Status(status.as_u16()));
        }

        decode_reply(&text)
    }
}

#[async_trait]
impl StatsClient for LoadMasterClient {
    async fn fetch_statistics(&self) -> Result<Statistics, ClientError> {
        let reply: StatsReply = self.command("stats").await?;
        Ok(reply.into())
    }

    async fn list_virtual_services(&self) -> Result<Vec<VirtualServiceName>, ClientError> {
        let reply: ListVsReply = self.command("listvs").await?;
        Ok(reply
            .services
            .into_iter()
            .map(|vs| VirtualServiceName {
                address: vs.address,
                name: vs.nickname,
            })
            .collect())
    }
}

/// Builds the API URL, defaulting to https when the endpoint has no scheme.
fn api_url(endpoint: &str) -> String {
    let base = endpoint.trim().trim_end_matches('/');
    if base.starts_with("http://") || base.starts_with("https://") {
        format!("{base}{API_PATH}")
    } else {
        format!("https://{base}{API_PATH}")
    }
}

/// Checks the reply envelope and decodes the payload.
fn decode_reply<T: DeserializeOwned>(text: &str) -> Result<T, ClientError> {
    let value: serde_json::Value =
        serde_json::from_str(text).map_err(|e| ClientError::Decode(e.to_string()))?;

    if let Some(status) = value.get("status").and_then(|s| s.as_str()) {
        if !status.eq_ignore_ascii_case("ok") {
            let message = value
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or(status);
            return Err(ClientError::Api(message.to_string()));
        }
    }

    serde_json::from_value(value).map_err(|e| ClientError::Decode(e.to_string()))
}

fn number<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Num(f64),
        Text(String),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(0.0),
        Some(Raw::Num(n)) => Ok(n),
        Some(Raw::Text(s)) => {
            let s = s.trim();
            if s.is_empty() {
                Ok(0.0)
            } else {
                s.parse::<f64>().map_err(D::Error::custom)
            }
        }
    }
}

fn port<'de, D>(deserializer: D) -> Result<u16, D::Error>
where
    D: Deserializer<'de>,
{
    let n = number(deserializer)?;
    if n.fract() != 0.0 || !(0.0..=u16::MAX as f64).contains(&n) {
        return Err(D::Error::custom(format!("invalid port {n}")));
    }
    Ok(n as u16)
}

#[derive(Debug, Default, Deserialize)]
struct StatsReply {
    #[serde(rename = "CPU", default)]
    cpu: CpuSection,
    #[serde(rename = "Memory", default)]
    memory: MemorySection,
    #[serde(rename = "VStotals", default)]
    totals: TotalsSection,
    #[serde(rename = "Vs", default)]
    virtual_services: Vec<VsEntry>,
    #[serde(rename = "Rs", default)]
    real_servers: Vec<RsEntry>,
}

#[derive(Debug, Default, Deserialize)]
struct CpuSection {
    #[serde(default)]
    total: CpuTotal,
}

#[derive(Debug, Default, Deserialize)]
struct CpuTotal {
    #[serde(rename = "User", default, deserialize_with = "number")]
    user: f64,
    #[serde(rename = "System", default, deserialize_with = "number")]
    system: f64,
    #[serde(rename = "Idle", default, deserialize_with = "number")]
    idle: f64,
    #[serde(rename = "IOWaiting", default, deserialize_with = "number")]
    iowait: f64,
}

#[derive(Debug, Default, Deserialize)]
struct MemorySection {
    #[serde(rename = "memused", default, deserialize_with = "number")]
    used: f64,
    #[serde(rename = "memfree", default, deserialize_with = "number")]
    free: f64,
    #[serde(rename = "percentmemused", default, deserialize_with = "number")]
    used_percent: f64,
}

#[derive(Debug, Default, Deserialize)]
struct TotalsSection {
    #[serde(rename = "ConnsPerSec", default, deserialize_with = "number")]
    conns_per_sec: f64,
    #[serde(rename = "BytesPerSec", default, deserialize_with = "number")]
    bytes_per_sec: f64,
    #[serde(rename = "BitsPerSec", default, deserialize_with = "number")]
    bits_per_sec: f64,
    #[serde(rename = "PktsPerSec", alias = "PacketsPerSec", default, deserialize_with = "number")]
    packets_per_sec: f64,
    #[serde(rename = "TotalConns", default, deserialize_with = "number")]
    total_conns: f64,
    #[serde(rename = "TotalBytes", default, deserialize_with = "number")]
    total_bytes: f64,
    #[serde(rename = "TotalBits", default, deserialize_with = "number")]
    total_bits: f64,
    #[serde(rename = "TotalPackets", alias = "TotalPkts", default, deserialize_with = "number")]
    total_packets: f64,
}

#[derive(Debug, Default, Deserialize)]
struct Counters {
    #[serde(rename = "TotalConns", default, deserialize_with = "number")]
    total_conns: f64,
    #[serde(rename = "ActiveConns", default, deserialize_with = "number")]
    active_conns: f64,
    #[serde(rename = "TotalPkts", alias = "TotalPackets", default, deserialize_with = "number")]
    total_packets: f64,
    #[serde(rename = "TotalBytes", default, deserialize_with = "number")]
    total_bytes: f64,
    #[serde(rename = "BytesRead", default, deserialize_with = "number")]
    bytes_read: f64,
    #[serde(rename = "BytesWritten", default, deserialize_with = "number")]
    bytes_written: f64,
    #[serde(rename = "ConnsPerSec", default, deserialize_with = "number")]
    conns_per_sec: f64,
}

#[derive(Debug, Deserialize)]
struct VsEntry {
    #[serde(rename = "VSAddress")]
    address: String,
    #[serde(rename = "VSPort", deserialize_with = "port")]
    port: u16,
    #[serde(flatten)]
    counters: Counters,
}

#[derive(Debug, Deserialize)]
struct RsEntry {
    #[serde(rename = "Addr", alias = "RSIPAddress")]
    address: String,
    #[serde(rename = "Port", alias = "RsPort", deserialize_with = "port")]
    port: u16,
    #[serde(flatten)]
    counters: Counters,
}

#[derive(Debug, Default, Deserialize)]
struct ListVsReply {
    #[serde(rename = "VS", default)]
    services: Vec<ListVsEntry>,
}

#[derive(Debug, Deserialize)]
struct ListVsEntry {
    #[serde(rename = "VSAddress")]
    address: String,
    #[serde(rename = "NickName", default)]
    nickname: String,
}

impl From<Counters> for ResourceCounters {
    fn from(c: Counters) -> Self {
        ResourceCounters {
            total_connections: c.total_conns,
            active_connections: c.active_conns,
            total_packets: c.total_packets,
            total_bytes: c.total_bytes,
            bytes_read: c.bytes_read,
            bytes_written: c.bytes_written,
            connections_per_second: c.conns_per_sec,
        }
    }
}

impl From<StatsReply> for Statistics {
    fn from(reply: StatsReply) -> Self {
        let t = reply.totals;
        let cpu = reply.cpu.total;
        let mem = reply.memory;

        Statistics {
            totals: AggregateTotals {
                connections_per_second: t.conns_per_sec,
                bytes_per_second: t.bytes_per_sec,
                bits_per_second: t.bits_per_sec,
                packets_per_second: t.packets_per_sec,
                total_connections: t.total_conns,
                total_bytes: t.total_bytes,
                total_bits: t.total_bits,
                total_packets: t.total_packets,
                cpu_user_percent: cpu.user,
                cpu_system_percent: cpu.system,
                cpu_idle_percent: cpu.idle,
                cpu_iowait_percent: cpu.iowait,
                memory_used: mem.used,
                memory_free: mem.free,
                memory_used_percent: mem.used_percent,
            },
            virtual_services: reply
                .virtual_services
                .into_iter()
                .map(|vs| VirtualServiceStat {
                    address: vs.address,
                    port: vs.port,
                    counters: vs.counters.into(),
                })
                .collect(),
            real_servers: reply
                .real_servers
                .into_iter()
                .map(|rs| RealServerStat {
                    address: rs.address,
                    port: rs.port,
                    counters: rs.counters.into(),
                })
                .collect(),
        }
    }
}

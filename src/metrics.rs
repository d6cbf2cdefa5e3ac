//! Prometheus gauge definitions for kemp-exporter.
//!
//! All gauges are created and registered once at startup. The refresh loop
//! is the only writer; scrape requests read through the registry.

use prometheus::{Gauge, GaugeVec, Opts, Registry};

use crate::client::{AggregateTotals, RealServerStat, ResourceCounters};

/// Label names for virtual service gauges.
const VIRTUAL_SERVICE_LABELS: &[&str] = &["name", "address", "port"];
/// Label names for real server gauges.
const REAL_SERVER_LABELS: &[&str] = &["address", "port"];

/// One gauge per counter in [`ResourceCounters`], sharing a label set.
#[derive(Clone)]
pub struct ResourceGauges {
    pub total_connections: GaugeVec,
    pub active_connections: GaugeVec,
    pub total_packets: GaugeVec,
    pub total_bytes: GaugeVec,
    pub bytes_read: GaugeVec,
    pub bytes_written: GaugeVec,
    pub connections_per_second: GaugeVec,
}

impl ResourceGauges {
    /// Creates and registers the gauge family for one resource kind.
    ///
    /// `prefix` is e.g. `kemp_virtual_service`, `noun` is used in help texts.
    fn new(
        registry: &Registry,
        prefix: &str,
        noun: &str,
        labels: &[&str],
    ) -> Result<Self, prometheus::Error> {
        let gauge = |suffix: &str, help: &str| -> Result<GaugeVec, prometheus::Error> {
            let vec = GaugeVec::new(
                Opts::new(format!("{prefix}_{suffix}"), format!("{help} per {noun}.")),
                labels,
            )?;
            registry.register(Box::new(vec.clone()))?;
            Ok(vec)
        };

        Ok(Self {
            total_connections: gauge("total_connections", "The number of total connections")?,
            active_connections: gauge("active_connections", "The number of active connections")?,
            total_packets: gauge("total_packets", "The number of total packets")?,
            total_bytes: gauge("total_bytes", "The number of total bytes")?,
            bytes_read: gauge("bytes_read", "The number of bytes read")?,
            bytes_written: gauge("bytes_written", "The number of bytes written")?,
            connections_per_second: gauge(
                "connections_per_second",
                "The number of connections per second",
            )?,
        })
    }

    /// Overwrites every gauge of the series identified by `labels`.
    pub fn set(&self, labels: &[&str], c: &ResourceCounters) {
        self.total_connections
            .with_label_values(labels)
            .set(c.total_connections);
        self.active_connections
            .with_label_values(labels)
            .set(c.active_connections);
        self.total_packets
            .with_label_values(labels)
            .set(c.total_packets);
        self.total_bytes.with_label_values(labels).set(c.total_bytes);
        self.bytes_read.with_label_values(labels).set(c.bytes_read);
        self.bytes_written
            .with_label_values(labels)
            .set(c.bytes_written);
        self.connections_per_second
            .with_label_values(labels)
            .set(c.connections_per_second);
    }
}

/// Collection of Prometheus gauges for LoadMaster statistics.
#[derive(Clone)]
pub struct KempMetrics {
    /// Whether the last poll succeeded (1) or failed (0).
    pub up: Gauge,

    // Traffic totals
    pub connections_per_second: Gauge,
    pub bytes_per_second: Gauge,
    pub bits_per_second: Gauge,
    pub packets_per_second: Gauge,
    pub total_connections: Gauge,
    pub total_bytes: Gauge,
    pub total_bits: Gauge,
    pub total_packets: Gauge,

    // Appliance resources
    pub cpu_user_percent: Gauge,
    pub cpu_system_percent: Gauge,
    pub cpu_idle_percent: Gauge,
    pub cpu_iowait_percent: Gauge,
    pub memory_used: Gauge,
    pub memory_free: Gauge,
    pub memory_used_percent: Gauge,

    pub virtual_services: ResourceGauges,
    pub real_servers: ResourceGauges,
}

impl KempMetrics {
    /// Creates and registers all gauges with the registry.
    pub fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        let gauge = |name: &str, help: &str| -> Result<Gauge, prometheus::Error> {
            let g = Gauge::new(name, help)?;
            registry.register(Box::new(g.clone()))?;
            Ok(g)
        };

        Ok(Self {
            up: gauge(
                "kemp_up",
                "Whether the last poll of the LoadMaster API was successful (1) or not (0).",
            )?,
            connections_per_second: gauge(
                "kemp_totals_connections_per_second",
                "The number of connections per second.",
            )?,
            bytes_per_second: gauge(
                "kemp_totals_bytes_per_second",
                "The number of bytes per second.",
            )?,
            bits_per_second: gauge(
                "kemp_totals_bits_per_second",
                "The number of bits per second.",
            )?,
            packets_per_second: gauge(
                "kemp_totals_packets_per_second",
                "The number of packets per second.",
            )?,
            total_connections: gauge(
                "kemp_totals_connections",
                "The total number of connections.",
            )?,
            total_bytes: gauge("kemp_totals_bytes", "The total number of bytes.")?,
            total_bits: gauge("kemp_totals_bits", "The total number of bits.")?,
            total_packets: gauge("kemp_totals_packets", "The total number of packets.")?,
            cpu_user_percent: gauge(
                "kemp_cpu_user_percent",
                "Percentage of CPU time spent in user space.",
            )?,
            cpu_system_percent: gauge(
                "kemp_cpu_system_percent",
                "Percentage of CPU time spent in the kernel.",
            )?,
            cpu_idle_percent: gauge("kemp_cpu_idle_percent", "Percentage of idle CPU time.")?,
            cpu_iowait_percent: gauge(
                "kemp_cpu_iowait_percent",
                "Percentage of CPU time spent waiting for I/O.",
            )?,
            memory_used: gauge(
                "kemp_memory_used",
                "Memory in use, as reported by the appliance.",
            )?,
            memory_free: gauge(
                "kemp_memory_free",
                "Free memory, as reported by the appliance.",
            )?,
            memory_used_percent: gauge(
                "kemp_memory_used_percent",
                "Percentage of memory in use.",
            )?,
            virtual_services: ResourceGauges::new(
                registry,
                "kemp_virtual_service",
                "virtual service",
                VIRTUAL_SERVICE_LABELS,
            )?,
            real_servers: ResourceGauges::new(
                registry,
                "kemp_real_server",
                "real server",
                REAL_SERVER_LABELS,
            )?,
        })
    }

    pub fn set_up(&self, up: bool) {
        self.up.set(if up { 1.0 } else { 0.0 });
    }

    /// Overwrites every aggregate gauge from a fetched sample.
    pub fn set_totals(&self, t: &AggregateTotals) {
        self.connections_per_second.set(t.connections_per_second);
        self.bytes_per_second.set(t.bytes_per_second);
        self.bits_per_second.set(t.bits_per_second);
        self.packets_per_second.set(t.packets_per_second);
        self.total_connections.set(t.total_connections);
        self.total_bytes.set(t.total_bytes);
        self.total_bits.set(t.total_bits);
        self.total_packets.set(t.total_packets);

        self.cpu_user_percent.set(t.cpu_user_percent);
        self.cpu_system_percent.set(t.cpu_system_percent);
        self.cpu_idle_percent.set(t.cpu_idle_percent);
        self.cpu_iowait_percent.set(t.cpu_iowait_percent);

        self.memory_used.set(t.memory_used);
        self.memory_free.set(t.memory_free);
        self.memory_used_percent.set(t.memory_used_percent);
    }

    /// Sets gauges for a virtual service whose display name is already resolved.
    pub fn set_virtual_service(
        &self,
        name: &str,
        address: &str,
        port: u16,
        counters: &ResourceCounters,
    ) {
        let port = port.to_string();
        self.virtual_services
            .set(&[name, address, &port], counters);
    }

    pub fn set_real_server(&self, rs: &RealServerStat) {
        let port = rs.port.to_string();
        self.real_servers
            .set(&[&rs.address, &port], &rs.counters);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::metrics::encode_registry;

    #[test]
    fn test_register_all_families() {
        let registry = Registry::new();
        let metrics = KempMetrics::new(&registry).unwrap();
        metrics.set_up(true);

        let text = encode_registry(&registry).unwrap();
        assert!(text.contains("# TYPE kemp_up gauge"));
        assert!(text.contains("# TYPE kemp_totals_bits_per_second gauge"));
        assert!(text.contains("# TYPE kemp_memory_used_percent gauge"));
        // Labeled families only show up once a series exists.
        assert!(!text.contains("kemp_virtual_service_"));
        assert!(!text.contains("kemp_real_server_"));
    }

    #[test]
    fn test_double_registration_fails() {
        let registry = Registry::new();
        KempMetrics::new(&registry).unwrap();
        assert!(KempMetrics::new(&registry).is_err());
    }

    #[test]
    fn test_set_totals() {
        let registry = Registry::new();
        let metrics = KempMetrics::new(&registry).unwrap();
        let totals = AggregateTotals {
            connections_per_second: 12.5,
            total_bits: 64000.0,
            cpu_idle_percent: 94.0,
            memory_free: 1572864.0,
            ..Default::default()
        };
        metrics.set_totals(&totals);

        assert_eq!(metrics.connections_per_second.get(), 12.5);
        assert_eq!(metrics.total_bits.get(), 64000.0);
        assert_eq!(metrics.cpu_idle_percent.get(), 94.0);
        assert_eq!(metrics.memory_free.get(), 1572864.0);
        assert_eq!(metrics.bytes_per_second.get(), 0.0);
    }

    #[test]
    fn test_set_resources() {
        let registry = Registry::new();
        let metrics = KempMetrics::new(&registry).unwrap();
        let counters = ResourceCounters {
            total_connections: 4.0,
            bytes_read: 1024.0,
            ..Default::default()
        };

        metrics.set_virtual_service("web-vip", "10.0.0.1", 443, &counters);
        metrics.set_real_server(&RealServerStat {
            address: "10.0.1.10".into(),
            port: 8080,
            counters: counters.clone(),
        });

        assert_eq!(
            metrics
                .virtual_services
                .total_connections
                .with_label_values(&["web-vip", "10.0.0.1", "443"])
                .get(),
            4.0
        );
        assert_eq!(
            metrics
                .real_servers
                .bytes_read
                .with_label_values(&["10.0.1.10", "8080"])
                .get(),
            1024.0
        );
    }
}

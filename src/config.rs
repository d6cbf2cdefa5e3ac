//! Configuration loading, merging and validation.
//!
//! Precedence is CLI > config file > built-in defaults.

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::{fs, time::Duration};
use tracing::info;

use crate::cli::{Args, ConfigFormat, ServerArgs};

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_WAIT_SECONDS: u64 = 10;
pub const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 10;

const DEFAULT_CONFIG_PATHS: &[&str] = &[
    "/etc/kemp-exporter/kemp-exporter.yaml",
    "/etc/kemp-exporter/kemp-exporter.yml",
    "/etc/kemp-exporter/kemp-exporter.json",
    "/etc/kemp-exporter/kemp-exporter.toml",
    "./kemp-exporter.yaml",
    "./kemp-exporter.yml",
    "./kemp-exporter.json",
    "./kemp-exporter.toml",
];

const LOG_LEVELS: &[&str] = &["off", "error", "warn", "info", "debug", "trace"];

/// Exporter configuration. Every field is optional so that partial
/// config files merge over the defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    // Server configuration
    pub bind: Option<String>,
    pub port: Option<u16>,
    pub enable_health: Option<bool>,

    // Polling
    #[serde(alias = "wait")]
    pub wait_seconds: Option<u64>,
    pub request_timeout_seconds: Option<u64>,
    pub accept_invalid_certs: Option<bool>,
    pub debug: Option<bool>,

    // Logging
    pub log_level: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: Some(DEFAULT_BIND_ADDR.to_string()),
            port: Some(DEFAULT_PORT),
            enable_health: Some(true),
            wait_seconds: Some(DEFAULT_WAIT_SECONDS),
            request_timeout_seconds: Some(DEFAULT_REQUEST_TIMEOUT_SECONDS),
            accept_invalid_certs: Some(false),
            debug: Some(false),
            log_level: Some("info".into()),
        }
    }
}

impl Config {
    pub fn bind_addr(&self) -> &str {
        self.bind.as_deref().unwrap_or(DEFAULT_BIND_ADDR)
    }

    pub fn port(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_PORT)
    }

    /// Socket address for the HTTP listener. IPv6 binds need no brackets.
    pub fn listen_addr(&self) -> anyhow::Result<SocketAddr> {
        let ip: IpAddr = self
            .bind_addr()
            .parse()
            .with_context(|| format!("Invalid bind address '{}'", self.bind_addr()))?;
        Ok(SocketAddr::new(ip, self.port()))
    }

    pub fn wait(&self) -> Duration {
        Duration::from_secs(self.wait_seconds.unwrap_or(DEFAULT_WAIT_SECONDS))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(
            self.request_timeout_seconds
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECONDS),
        )
    }

    pub fn log_level(&self) -> &str {
        self.log_level.as_deref().unwrap_or("info")
    }
}

/// Resolves configuration from CLI args, config file, and defaults
pub fn resolve_config(args: &Args, server: Option<&ServerArgs>) -> anyhow::Result<Config> {
    let mut config = if args.no_config {
        Config::default()
    } else {
        load_config(args.config.as_deref())?
    };

    if let Some(bind_ip) = args.bind {
        config.bind = Some(bind_ip.to_string());
    }
    if let Some(level) = args.log_level {
        config.log_level = Some(level.as_str().to_string());
    }
    if args.disable_health {
        config.enable_health = Some(false);
    }
    if args.insecure {
        config.accept_invalid_certs = Some(true);
    }

    if let Some(server) = server {
        if let Some(port) = server.port {
            config.port = Some(port);
        }
        if let Some(wait) = server.wait {
            config.wait_seconds = Some(wait);
        }
        if server.debug {
            config.debug = Some(true);
        }
    }

    Ok(config)
}

/// Loads a config file, or the first existing default location.
///
/// An explicitly given path must exist; missing default files fall back
/// to [`Config::default`].
pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let path = match path {
        Some(p) => {
            if !p.exists() {
                bail!("Config file not found: {}", p.display());
            }
            p.to_path_buf()
        }
        None => match DEFAULT_CONFIG_PATHS
            .iter()
            .map(PathBuf::from)
            .find(|p| p.exists())
        {
            Some(p) => p,
            None => return Ok(Config::default()),
        },
    };

    let content = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;

    let config: Config = match path.extension().and_then(|s| s.to_str()) {
        Some("json") => serde_json::from_str(&content)
            .with_context(|| format!("Invalid JSON in {}", path.display()))?,
        Some("toml") => toml::from_str(&content)
            .with_context(|| format!("Invalid TOML in {}", path.display()))?,
        // Default to YAML
        _ => serde_yaml::from_str(&content)
            .with_context(|| format!("Invalid YAML in {}", path.display()))?,
    };
    info!("Loaded configuration from: {}", path.display());

    Ok(config)
}

/// Validate effective config (used by --check-config and at startup)
pub fn validate_effective_config(cfg: &Config) -> anyhow::Result<()> {
    if cfg.port == Some(0) {
        bail!("port must be between 1 and 65535");
    }
    if cfg.wait_seconds == Some(0) {
        bail!("wait_seconds must be at least 1");
    }
    if cfg.request_timeout_seconds == Some(0) {
        bail!("request_timeout_seconds must be at least 1");
    }
    if let Some(bind) = cfg.bind.as_deref() {
        if bind.parse::<IpAddr>().is_err() {
            bail!("Invalid bind address '{}'", bind);
        }
    }
    if let Some(level) = cfg.log_level.as_deref() {
        if !LOG_LEVELS.contains(&level.to_ascii_lowercase().as_str()) {
            bail!(
                "Invalid log_level '{}', expected one of {}",
                level,
                LOG_LEVELS.join(", ")
            );
        }
    }
    Ok(())
}

/// Renders configuration in the requested format
pub fn render_config(config: &Config, format: &ConfigFormat) -> anyhow::Result<String> {
    Ok(match format {
        ConfigFormat::Json => serde_json::to_string_pretty(config)?,
        ConfigFormat::Toml => toml::to_string_pretty(config)?,
        ConfigFormat::Yaml => serde_yaml::to_string(config)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Write;

    fn write_config(ext: &str, content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(&format!(".{ext}"))
            .tempfile()
            .unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults_are_valid() {
        let cfg = Config::default();
        assert!(validate_effective_config(&cfg).is_ok());
        assert_eq!(cfg.port(), 8000);
        assert_eq!(cfg.wait(), Duration::from_secs(10));
    }

    #[test]
    fn test_load_yaml_partial() {
        let file = write_config("yaml", "port: 9100\nwait_seconds: 30\n");
        let cfg = load_config(Some(file.path())).unwrap();
        assert_eq!(cfg.port, Some(9100));
        assert_eq!(cfg.wait_seconds, Some(30));
        // Unset fields keep their defaults
        assert_eq!(cfg.bind.as_deref(), Some(DEFAULT_BIND_ADDR));
        assert_eq!(cfg.request_timeout_seconds, Some(10));
    }

    #[test]
    fn test_load_json_and_toml() {
        let json = write_config("json", r#"{"accept_invalid_certs": true, "wait": 5}"#);
        let cfg = load_config(Some(json.path())).unwrap();
        assert_eq!(cfg.accept_invalid_certs, Some(true));
        assert_eq!(cfg.wait_seconds, Some(5));

        let toml = write_config("toml", "log_level = \"debug\"\nport = 9200\n");
        let cfg = load_config(Some(toml.path())).unwrap();
        assert_eq!(cfg.log_level(), "debug");
        assert_eq!(cfg.port(), 9200);
    }

    #[test]
    fn test_load_missing_explicit_file() {
        assert!(load_config(Some(Path::new("/nonexistent/kemp-exporter.yaml"))).is_err());
    }

    #[test]
    fn test_load_invalid_yaml() {
        let file = write_config("yaml", "port: [not a port\n");
        assert!(load_config(Some(file.path())).is_err());
    }

    #[test]
    fn test_cli_overrides_file() {
        let file = write_config("yaml", "port: 9100\nwait_seconds: 30\n");
        let path = file.path().to_str().unwrap().to_string();
        let args = Args::try_parse_from([
            "kemp-exporter",
            "--config",
            &path,
            "server",
            "lb",
            "u",
            "p",
            "--port",
            "9300",
            "--debug",
        ])
        .unwrap();
        let server = match &args.command {
            Some(crate::cli::Commands::Server(s)) => s.clone(),
            other => panic!("unexpected command: {other:?}"),
        };

        let cfg = resolve_config(&args, Some(&server)).unwrap();
        assert_eq!(cfg.port(), 9300);
        assert_eq!(cfg.wait_seconds, Some(30));
        assert_eq!(cfg.debug, Some(true));
    }

    #[test]
    fn test_validation_errors() {
        let cfg = Config {
            wait_seconds: Some(0),
            ..Default::default()
        };
        assert!(validate_effective_config(&cfg).is_err());

        let cfg = Config {
            bind: Some("not-an-ip".into()),
            ..Default::default()
        };
        assert!(validate_effective_config(&cfg).is_err());

        let cfg = Config {
            log_level: Some("verbose".into()),
            ..Default::default()
        };
        assert!(validate_effective_config(&cfg).is_err());

        let cfg = Config {
            port: Some(0),
            ..Default::default()
        };
        assert!(validate_effective_config(&cfg).is_err());
    }

    #[test]
    fn test_listen_addr_ipv4_and_ipv6() {
        let cfg = Config::default();
        assert_eq!(cfg.listen_addr().unwrap().to_string(), "0.0.0.0:8000");

        let cfg = Config {
            bind: Some("::".into()),
            port: Some(9100),
            ..Default::default()
        };
        assert!(validate_effective_config(&cfg).is_ok());
        let addr = cfg.listen_addr().unwrap();
        assert!(addr.is_ipv6());
        assert_eq!(addr.port(), 9100);
        assert_eq!(addr.to_string(), "[::]:9100");

        let cfg = Config {
            bind: Some("::1".into()),
            ..Default::default()
        };
        assert_eq!(cfg.listen_addr().unwrap().to_string(), "[::1]:8000");
    }

    #[test]
    fn test_render_config() {
        let cfg = Config::default();
        let yaml = render_config(&cfg, &ConfigFormat::Yaml).unwrap();
        assert!(yaml.contains("wait_seconds: 10"));
        let json = render_config(&cfg, &ConfigFormat::Json).unwrap();
        let back: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cfg);
    }
}

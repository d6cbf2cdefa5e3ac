//! CLI arguments and subcommands for kemp-exporter.
//!
//! This module defines the command-line interface structure using the clap library,
//! including all flags, options, and subcommands.

use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use std::net::IpAddr;
use std::path::PathBuf;

/// Log level options for CLI parsing
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Off => "off",
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// Configuration format options for output
#[derive(Debug, Clone, ValueEnum)]
pub enum ConfigFormat {
    Yaml,
    Json,
    Toml,
}

/// Main CLI arguments structure
#[derive(Parser, Debug)]
#[command(
    name = "kemp-exporter",
    about = "kemp-exporter exports Kemp statistics to Prometheus",
    long_about = "kemp-exporter exports Kemp statistics to Prometheus.\n\n\
                  Polls the statistics API of a KEMP LoadMaster on a fixed interval and \
                  serves aggregate totals, virtual service and real server counters as \
                  Prometheus gauges.",
    version = "0.1.0",
    propagate_version = true
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Bind to specific interface/IP
    #[arg(long, global = true)]
    pub bind: Option<IpAddr>,

    /// Log level [default: info]
    #[arg(long, value_enum, global = true)]
    pub log_level: Option<LogLevel>,

    /// Config file (YAML/JSON/TOML)
    #[arg(short = 'c', long, global = true)]
    pub config: Option<PathBuf>,

    /// Disable all config file loading
    #[arg(long, global = true)]
    pub no_config: bool,

    /// Print effective merged config and exit
    #[arg(long)]
    pub show_config: bool,

    /// Output format for --show-config
    #[arg(long, value_enum, default_value = "yaml")]
    pub config_format: ConfigFormat,

    /// Validate config and exit (return code 1 on error)
    #[arg(long)]
    pub check_config: bool,

    /// Disable /health endpoint
    #[arg(long, global = true)]
    pub disable_health: bool,

    /// Accept invalid TLS certificates from the appliance
    #[arg(long, global = true)]
    pub insecure: bool,
}

/// Arguments of the `server` subcommand.
#[derive(ClapArgs, Debug, Clone)]
pub struct ServerArgs {
    /// LoadMaster API endpoint, e.g. https://10.0.0.5
    pub endpoint: String,

    /// API username
    pub username: String,

    /// API password
    pub password: String,

    /// Port to listen on [default: 8000]
    #[arg(long)]
    pub port: Option<u16>,

    /// Time (in seconds) between accessing the Kemp API [default: 10]
    #[arg(long)]
    pub wait: Option<u64>,

    /// Enable debug output of the API client
    #[arg(long)]
    pub debug: bool,
}

/// Subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP server
    Server(ServerArgs),

    /// Generate configuration files
    Config {
        /// Output file path ("-" for stdout)
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value = "yaml")]
        format: ConfigFormat,

        /// Include comments and examples
        #[arg(long)]
        commented: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn test_parse_server() {
        let args = Args::try_parse_from([
            "kemp-exporter",
            "server",
            "https://10.0.0.5",
            "bal",
            "secret",
            "--port",
            "9100",
            "--debug",
        ])
        .unwrap();

        match args.command {
            Some(Commands::Server(server)) => {
                assert_eq!(server.endpoint, "https://10.0.0.5");
                assert_eq!(server.username, "bal");
                assert_eq!(server.password, "secret");
                assert_eq!(server.port, Some(9100));
                assert_eq!(server.wait, None);
                assert!(server.debug);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_missing_positional() {
        let err = Args::try_parse_from(["kemp-exporter", "server", "https://10.0.0.5", "bal"])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn test_extra_positional() {
        let err = Args::try_parse_from([
            "kemp-exporter",
            "server",
            "https://10.0.0.5",
            "bal",
            "secret",
            "extra",
        ])
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownArgument);
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let args = Args::try_parse_from([
            "kemp-exporter",
            "server",
            "lb",
            "u",
            "p",
            "--log-level",
            "debug",
            "--no-config",
        ])
        .unwrap();
        assert_eq!(args.log_level, Some(LogLevel::Debug));
        assert!(args.no_config);
    }
}

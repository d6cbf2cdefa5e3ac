//! Config command implementation.
//!
//! Writes a configuration file holding the built-in defaults.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::cli::ConfigFormat;
use crate::config::{render_config, Config};

const DEFAULT_OUTPUT: &str = "kemp-exporter.yaml";

/// Generates configuration files
pub fn command_config(
    output: Option<PathBuf>,
    format: ConfigFormat,
    commented: bool,
) -> anyhow::Result<()> {
    let output = output.unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT));
    let content = default_config_content(&format, commented)?;

    if output.as_path() == Path::new("-") {
        print!("{}", content);
    } else {
        fs::write(&output, content)?;
        println!("Configuration written to: {}", output.display());
    }
    debug!("Generated {:?} configuration", format);

    Ok(())
}

/// Renders the default configuration, optionally with a YAML comment header.
fn default_config_content(format: &ConfigFormat, commented: bool) -> anyhow::Result<String> {
    let content = render_config(&Config::default(), format)?;
    Ok(match format {
        ConfigFormat::Yaml if commented => add_config_comments(content),
        _ => content,
    })
}

/// Adds comments to YAML configuration
fn add_config_comments(yaml: String) -> String {
    let comments = r#"# KEMP LoadMaster Exporter Configuration
# =======================================
#
# The API endpoint, username and password are always given on the
# command line: kemp-exporter server <ENDPOINT> <USERNAME> <PASSWORD>
#
# Server Configuration
# --------------------
# bind: "0.0.0.0"               # Bind IP (0.0.0.0 = all interfaces)
# port: 8000                    # HTTP port
# enable_health: true           # Enable /health endpoint
#
# Polling
# -------
# wait_seconds: 10              # Seconds between polls of the LoadMaster API
# request_timeout_seconds: 10   # Timeout for a single API request
# accept_invalid_certs: false   # Accept self-signed appliance certificates
# debug: false                  # Log raw API requests and responses
#
# Logging
# -------
# log_level: "info"             # off, error, warn, info, debug, trace
"#;

    format!("{comments}\n{yaml}")
}

// kemp-exporter - version 0.1.0
// Prometheus exporter for KEMP LoadMaster statistics with tracing logging
use clap::{error::ErrorKind, CommandFactory, Parser};
use std::{process, sync::Arc};
use tokio::{net::TcpListener, sync::watch};
use tracing::{debug, error, info, level_filters::LevelFilter};

mod cli;
mod client;
mod commands;
mod config;
mod handlers;
mod health_stats;
mod metrics;
mod refresh;
mod shutdown;
mod state;

use cli::{Args, Commands, ServerArgs};
use client::{ClientConfig, LoadMasterClient, StatsClient};
use config::{render_config, resolve_config, validate_effective_config, Config};
use state::AppState;

/// Exit code for usage and configuration errors.
const EXIT_USAGE: i32 = 1;
/// Exit code when the metrics port cannot be bound.
const EXIT_BIND: i32 = 2;

/// Parses arguments, exiting with status 1 on any usage error.
fn parse_args() -> Args {
    match Args::try_parse() {
        Ok(args) => args,
        Err(e) => match e.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => e.exit(),
            _ => {
                let _ = e.print();
                process::exit(EXIT_USAGE);
            }
        },
    }
}

/// Resolves and validates configuration, exiting with status 1 on error.
fn effective_config(args: &Args, server: Option<&ServerArgs>) -> Config {
    let config = match resolve_config(args, server) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {:#}", e);
            process::exit(EXIT_USAGE);
        }
    };
    if let Err(e) = validate_effective_config(&config) {
        eprintln!("Configuration invalid: {}", e);
        process::exit(EXIT_USAGE);
    }
    config
}

/// Initializes tracing logging subsystem with configured log level
fn setup_logging(config: &Config) {
    let level = config
        .log_level()
        .to_ascii_lowercase()
        .parse::<LevelFilter>()
        .unwrap_or(LevelFilter::INFO);

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }

    info!("Logging initialized with level: {}", level);
}

/// -------------------------------------------------------------------
/// MAIN APPLICATION ENTRY POINT
/// -------------------------------------------------------------------
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut args = parse_args();
    let command = args.command.take();

    let server = match &command {
        Some(Commands::Server(server)) => Some(server.clone()),
        _ => None,
    };

    // Early config resolution for show/check modes
    if args.show_config || args.check_config {
        let config = effective_config(&args, server.as_ref());
        if args.check_config {
            println!("Configuration is valid");
        } else {
            println!("{}", render_config(&config, &args.config_format)?);
        }
        return Ok(());
    }

    let server = match command {
        Some(Commands::Server(server)) => server,
        Some(Commands::Config {
            output,
            format,
            commented,
        }) => return commands::command_config(output, format, commented),
        None => {
            let _ = Args::command().print_help();
            process::exit(EXIT_USAGE);
        }
    };

    // Load configuration for main server mode
    let config = effective_config(&args, Some(&server));

    // Setup logging subsystem first to enable proper logging
    setup_logging(&config);

    info!("Starting kemp-exporter");

    // Handlers go in before any slow startup step so an early SIGTERM is caught
    let signals = match shutdown::install_signal_handlers() {
        Ok(signals) => signals,
        Err(e) => {
            error!("Failed to install signal handlers: {}", e);
            return Err(e.into());
        }
    };

    let client = match LoadMasterClient::new(ClientConfig {
        endpoint: server.endpoint.clone(),
        username: server.username.clone(),
        password: server.password.clone(),
        debug: config.debug.unwrap_or(false),
        timeout: config.request_timeout(),
        accept_invalid_certs: config.accept_invalid_certs.unwrap_or(false),
    }) {
        Ok(client) => Arc::new(client) as Arc<dyn StatsClient>,
        Err(e) => {
            error!("Failed to create LoadMaster client: {}", e);
            process::exit(EXIT_USAGE);
        }
    };

    // Initialize Prometheus registry and gauges
    let state = Arc::new(AppState::new(config.clone())?);
    debug!("All metrics registered successfully");

    // Bind before polling so a busy port fails fast
    let addr = config.listen_addr()?;
    let listener = match TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind {}: {}", addr, e);
            process::exit(EXIT_BIND);
        }
    };

    // Start background refresh task
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let refresh_task = tokio::spawn(refresh::run_refresh_loop(
        state.clone(),
        client,
        config.wait(),
        shutdown_rx,
    ));

    let app = handlers::router(state);

    info!("Listening on port {}", config.port());
    debug!("kemp-exporter listening on http://{}", addr);

    // Start HTTP server; a termination signal ends the process without draining
    let server = axum::serve(listener, app);

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                error!("Server error: {}", e);
                return Err(e.into());
            }
        }
        _ = shutdown::supervise(signals, shutdown_tx) => {}
    }

    // The refresh loop observes the shutdown channel at every await point
    if let Err(e) = refresh_task.await {
        error!("Refresh task failed: {}", e);
    }

    info!("kemp-exporter stopped");
    Ok(())
}

//! uid-io-monitor
//!
//! Per-uid storage I/O accounting daemon with tracing logging.
//! This is the main entry point that initializes the monitor, the periodic
//! report task and the HTTP server, and handles subcommands.

mod cli;
mod commands;
mod config;
mod handlers;
mod metrics;
mod render;
mod startup_checks;
mod state;

use axum::{routing::get, Router};
use clap::Parser;
use prometheus::{Gauge, Registry};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::{net::TcpListener, signal, time::MissedTickBehavior};
use tracing::{debug, error, info, Level};
use uid_io_monitor::UidMonitor;

use cli::{Args, Commands, LogLevel};
use commands::{command_check, command_config, command_dump, command_generate_testdata};
use config::{
    resolve_config, show_config, validate_effective_config, Config, DEFAULT_BIND_ADDR, DEFAULT_PORT,
};
use handlers::{
    charger_get_handler, charger_set_handler, dump_handler, health_handler, metrics_handler,
    root_handler,
};
use metrics::MonitorMetrics;
use state::{AppState, SharedState};

/// Initializes tracing logging subsystem with configured log level.
fn setup_logging(config: &Config, args: &Args) {
    // An explicit CLI level wins; otherwise the config file may lower or raise it.
    let log_level = match (&args.log_level, config.log_level.as_deref()) {
        (LogLevel::Info, Some(level)) => level.parse::<Level>().unwrap_or(Level::INFO),
        (LogLevel::Off, _) | (LogLevel::Error, _) => Level::ERROR,
        (LogLevel::Warn, _) => Level::WARN,
        (LogLevel::Info, None) => Level::INFO,
        (LogLevel::Debug, _) => Level::DEBUG,
        (LogLevel::Trace, _) => Level::TRACE,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return;
    }

    info!("Logging initialized with level: {}", log_level);
}

/// Helper function to load and validate configuration.
/// Exits the process with error code 1 if validation fails.
fn load_validated_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    let config = resolve_config(args)?;
    if let Err(e) = validate_effective_config(&config) {
        eprintln!("❌ Configuration invalid: {}", e);
        std::process::exit(1);
    }
    Ok(config)
}

/// Runs a report cycle every `report_interval_seconds` until the process exits.
///
/// The first tick is skipped: `init` has just taken the baseline, so an
/// immediate report would only ever record an empty interval.
fn spawn_report_task(state: SharedState) -> tokio::task::JoinHandle<()> {
    let period = Duration::from_secs(state.config.monitor.report_interval_seconds);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let monitor = state.monitor.clone();
            let start = Instant::now();
            match tokio::task::spawn_blocking(move || monitor.report()).await {
                Ok(()) => debug!(
                    "Report cycle finished in {:.3}ms",
                    start.elapsed().as_secs_f64() * 1000.0
                ),
                Err(e) => error!("Report task failed: {}", e),
            }
        }
    })
}

/// Main application entry point.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Early config resolution for show/check modes
    if args.show_config || args.check_config {
        let config = resolve_config(&args)?;

        if args.check_config {
            if let Err(e) = validate_effective_config(&config) {
                eprintln!("❌ Configuration invalid: {}", e);
                std::process::exit(1);
            }
            println!("✅ Configuration is valid");
            return Ok(());
        }

        return show_config(&config, args.config_format.clone());
    }

    // Handle subcommands
    if let Some(command) = &args.command {
        // Generating config or test data does not depend on the effective config
        match command {
            Commands::Config {
                output,
                format,
                commented,
            } => return command_config(output.clone(), format.clone(), *commented),
            Commands::GenerateTestdata {
                output,
                uids,
                max_tasks,
                grow,
            } => return command_generate_testdata(output.clone(), *uids, *max_tasks, *grow),
            _ => {
                // Other commands need config validation
            }
        }

        let config = load_validated_config(&args)?;
        setup_logging(&config, &args);

        return match command {
            Commands::Check => command_check(&config),

            Commands::Dump {
                hours,
                threshold,
                samples,
                interval_ms,
                force,
                format,
            } => command_dump(
                commands::dump::DumpOptions {
                    hours: *hours,
                    threshold: *threshold,
                    samples: *samples,
                    interval_ms: *interval_ms,
                    force: *force,
                    format: *format,
                },
                &config,
            ),

            Commands::Config { .. } => unreachable!("Config handled above"),
            Commands::GenerateTestdata { .. } => unreachable!("GenerateTestdata handled above"),
        };
    }

    // Load configuration for main server mode
    let config = load_validated_config(&args)?;

    setup_logging(&config, &args);

    info!("Starting uid-io-monitor");

    if let Err(e) = startup_checks::validate_requirements(&config.monitor) {
        error!("❌ Startup validation failed: {}", e);
        error!("   The monitor will start but will record nothing until the source is readable!");
        // Continue anyway - don't fail hard
    }

    let bind_ip_str = config.bind.as_deref().unwrap_or(DEFAULT_BIND_ADDR);
    let port = config.port.unwrap_or(DEFAULT_PORT);

    // Initialize Prometheus metrics registry
    let registry = Registry::new();
    debug!("Prometheus registry initialized");

    let metrics = MonitorMetrics::new(&registry)?;
    let scrape_duration = Gauge::new(
        "uid_io_monitor_scrape_duration_seconds",
        "Time spent serving /metrics request",
    )?;
    registry.register(Box::new(scrape_duration.clone()))?;

    debug!("All metrics registered successfully");

    // Initialize the monitor and take the baseline snapshot
    let monitor = Arc::new(UidMonitor::from_config(&config.monitor));
    let charger = config.monitor.initial_charger_state;
    let init_monitor = monitor.clone();
    if tokio::task::spawn_blocking(move || init_monitor.init(charger)).await? {
        info!("✅ Baseline taken from {}", config.monitor.stats_path.display());
    } else {
        error!(
            "❌ Could not read {} - starting from an empty baseline",
            config.monitor.stats_path.display()
        );
    }

    let state = Arc::new(AppState {
        monitor,
        registry,
        metrics,
        scrape_duration,
        config: Arc::new(config.clone()),
        start_time: Instant::now(),
    });

    let report_task = spawn_report_task(state.clone());
    info!(
        "Report cycle every {}s, retention {}s, record cap {}",
        config.monitor.report_interval_seconds,
        config.monitor.retention_seconds,
        config.monitor.max_records
    );

    // Setup graceful shutdown signal handlers
    let shutdown_signal = async {
        let ctrl_c = async {
            if let Err(e) = signal::ctrl_c().await {
                error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut sig) => {
                    sig.recv().await;
                }
                Err(e) => {
                    error!("Failed to install signal handler: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                info!("Received SIGINT (Ctrl+C), shutting down gracefully...");
            }
            _ = terminate => {
                info!("Received SIGTERM, shutting down gracefully...");
            }
        }
    };

    // Configure HTTP server routes
    let addr: SocketAddr = format!("{}:{}", bind_ip_str, port).parse()?;

    let mut app = Router::new()
        .route("/", get(root_handler))
        .route("/metrics", get(metrics_handler))
        .route("/dump", get(dump_handler))
        .route("/charger", get(charger_get_handler).post(charger_set_handler));

    if config.enable_health.unwrap_or(true) {
        app = app.route("/health", get(health_handler));
    }

    let app = app.with_state(state.clone());

    let listener = TcpListener::bind(addr).await?;
    info!("uid-io-monitor listening on http://{}:{}", bind_ip_str, port);

    let server = axum::serve(listener, app);

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                error!("Server error: {}", e);
                report_task.abort();
                return Err(e.into());
            }
        }
        _ = shutdown_signal => {
            info!("Shutdown signal received, exiting...");
        }
    }

    report_task.abort();
    info!("uid-io-monitor stopped gracefully");
    Ok(())
}

//! Structured logging with tracing
//!
//! Configures the global subscriber and provides the lifecycle log helpers.
//! Every lifecycle line carries the `component`, `token`, `outcome` and
//! `status` fields.

use crate::constants::{DEFAULT_LOG_FILE_STEM, LOG_ENV_FILTER};
use notifyr_domain::build::{BuildOutcome, BuildReport};
use notifyr_domain::error::{Error, Result};

pub use crate::config::LoggingConfig;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::{EnvFilter, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize logging with the provided configuration
///
/// Fails with `Error::Configuration` when a global subscriber is already set.
pub fn init_logging(config: LoggingConfig) -> Result<()> {
    let level = parse_log_level(&config.level)?;
    let filter =
        EnvFilter::try_from_env(LOG_ENV_FILTER).unwrap_or_else(|_| EnvFilter::new(&config.level));

    let file_appender = config.file_output.as_ref().map(|path| {
        tracing_appender::rolling::daily(
            path.parent().unwrap_or_else(|| std::path::Path::new(".")),
            path.file_stem()
                .unwrap_or_else(|| std::ffi::OsStr::new(DEFAULT_LOG_FILE_STEM)),
        )
    });

    // The layer types differ per branch, so each one initializes on its own
    let installed = if config.json_format {
        let stdout = fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true);
        let registry = Registry::default().with(filter);
        if let Some(appender) = file_appender {
            let file = fmt::layer()
                .json()
                .with_writer(appender)
                .with_ansi(false)
                .with_target(true);
            registry.with(stdout).with(file).try_init()
        } else {
            registry.with(stdout).try_init()
        }
    } else {
        let stdout = fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true);
        let registry = Registry::default().with(filter);
        if let Some(appender) = file_appender {
            let file = fmt::layer()
                .with_writer(appender)
                .with_ansi(false)
                .with_target(true);
            registry.with(stdout).with(file).try_init()
        } else {
            registry.with(stdout).try_init()
        }
    };

    installed.map_err(|e| Error::configuration_with_source("Logging already initialized", e))?;

    info!("Logging initialized with level: {}", level);
    Ok(())
}

/// Parse log level string to tracing Level
pub fn parse_log_level(level: &str) -> Result<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" | "warning" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => Err(Error::configuration(format!(
            "Invalid log level: {}. Use trace, debug, info, warn, or error",
            level
        ))),
    }
}

/// Log the result of one build pass at the level its outcome calls for
pub fn log_build_report(report: &BuildReport, not_implemented: bool) {
    let detail = report.message.as_deref().unwrap_or("");
    let component = report.component.as_str();

    if not_implemented {
        warn!(
            component,
            token = %report.token,
            status = %report.status,
            "Build not implemented"
        );
        return;
    }

    match report.outcome {
        BuildOutcome::Ok => info!(
            component,
            token = %report.token,
            outcome = %report.outcome,
            status = %report.status,
            elapsed_ms = report.elapsed_ms,
            "Component built"
        ),
        BuildOutcome::Warning | BuildOutcome::Skip => warn!(
            component,
            token = %report.token,
            outcome = %report.outcome,
            status = %report.status,
            detail,
            "Component built in degraded state"
        ),
        BuildOutcome::Failure => error!(
            component,
            token = %report.token,
            outcome = %report.outcome,
            status = %report.status,
            detail,
            "Component build failed"
        ),
        BuildOutcome::Abort => error!(
            component,
            token = %report.token,
            outcome = %report.outcome,
            status = %report.status,
            detail,
            "Component build aborted"
        ),
    }
}

/// Log configuration loading status
pub fn log_config_loaded(config_path: &std::path::Path, success: bool) {
    if success {
        info!("Configuration loaded from {}", config_path.display());
    } else {
        warn!("Configuration file not found: {}", config_path.display());
    }
}

/// Log health check result
pub fn log_health_check(component: &str, healthy: bool, details: Option<&str>) {
    if healthy {
        debug!(component = component, "Health check passed");
    } else {
        error!(
            component = component,
            details = details.unwrap_or("Unknown failure"),
            "Health check failed"
        );
    }
}

use crate::errors::DbError;
use log::LevelFilter;
use log4rs::append::console::ConsoleAppender;
use log4rs::append::rolling_file::RollingFileAppender;
use log4rs::append::rolling_file::policy::compound::{
    CompoundPolicy, roll::fixed_window::FixedWindowRoller, trigger::size::SizeTrigger,
};
use log4rs::config::{Appender, Config, Logger, Root};
use log4rs::encode::pattern::PatternEncoder;
use std::path::{Path, PathBuf};

/// Target of the one-line-per-write audit trail.
pub const AUDIT_TARGET: &str = "nexus_odm::audit";

const PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S%.3f)} [{l}] {t} - {m}{n}";
const ROLL_SIZE: u64 = 10 * 1024 * 1024;

/// Initializes the logging system from `log4rs.yaml` in the working directory, if present.
/// Prefer [`configure_logging`] for programmatic control.
pub fn init() -> Result<(), Box<dyn std::error::Error>> {
    init_path(Path::new("log4rs.yaml"))
}

/// Initializes the logging system from a specific config file path.
pub fn init_path(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    if path.exists() {
        log4rs::init_file(path, log4rs::config::Deserializers::default())?;
    }
    Ok(())
}

#[must_use]
pub fn parse_level(level: &str) -> LevelFilter {
    match level.to_ascii_lowercase().as_str() {
        "off" => LevelFilter::Off,
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        _ => LevelFilter::Info,
    }
}

fn rolling(base: &Path, stem: &str, keep: u32) -> Result<RollingFileAppender, DbError> {
    let roller = FixedWindowRoller::builder()
        .build(&format!("{}", base.join(format!("{stem}.{{}}.log")).display()), keep)
        .map_err(|e| DbError::Config(e.to_string()))?;
    let policy = CompoundPolicy::new(Box::new(SizeTrigger::new(ROLL_SIZE)), Box::new(roller));
    RollingFileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(PATTERN)))
        .build(base.join(format!("{stem}.log")), Box::new(policy))
        .map_err(DbError::from)
}

/// Builds the logging configuration: rolling `app.log` for the root logger and a
/// separate rolling `audit.log` for [`AUDIT_TARGET`]. Without a directory, everything
/// goes to the console.
///
/// # Errors
/// Returns an error if the directory or appenders cannot be created.
pub fn build_config(
    dir: Option<&Path>,
    level: Option<&str>,
    retention: Option<usize>,
) -> Result<Config, DbError> {
    let lvl = level.map_or(LevelFilter::Info, parse_level);
    let keep = u32::try_from(retention.unwrap_or(7)).unwrap_or(7);
    let builder = match dir {
        Some(base) => {
            std::fs::create_dir_all(base)?;
            Config::builder()
                .appender(Appender::builder().build("app", Box::new(rolling(base, "app", keep)?)))
                .appender(
                    Appender::builder().build("audit", Box::new(rolling(base, "audit", keep)?)),
                )
                .logger(Logger::builder().appender("audit").additive(false).build(AUDIT_TARGET, lvl))
        }
        None => {
            let console =
                ConsoleAppender::builder().encoder(Box::new(PatternEncoder::new(PATTERN))).build();
            Config::builder().appender(Appender::builder().build("app", Box::new(console)))
        }
    };
    builder
        .build(Root::builder().appender("app").build(lvl))
        .map_err(|e| DbError::Config(e.to_string()))
}

/// Configure logging globally for the process. A second call is ignored by `log4rs`.
/// - dir: base directory for log files; console output when `None`
/// - level: off|error|warn|info|debug|trace
/// - retention: number of rolled files to keep (default 7)
///
/// # Errors
/// Returns an error if the configuration cannot be built.
pub fn configure_logging(
    dir: Option<&Path>,
    level: Option<&str>,
    retention: Option<usize>,
) -> Result<(), DbError> {
    let config = build_config(dir, level, retention)?;
    if log4rs::init_config(config).is_err() {
        log::debug!("logger already initialized; keeping existing configuration");
    }
    Ok(())
}

/// Configure logging from environment variables if present:
/// - `NEXUS_ODM_LOG_DIR`
/// - `NEXUS_ODM_LOG_LEVEL`
/// - `NEXUS_ODM_LOG_RETENTION`
///
/// # Errors
/// Returns an error if the configuration cannot be built.
pub fn configure_from_env() -> Result<(), DbError> {
    let dir = std::env::var("NEXUS_ODM_LOG_DIR").ok().map(PathBuf::from);
    let level = std::env::var("NEXUS_ODM_LOG_LEVEL").ok();
    let retention =
        std::env::var("NEXUS_ODM_LOG_RETENTION").ok().and_then(|s| s.parse::<usize>().ok());
    configure_logging(dir.as_deref(), level.as_deref(), retention)
}

/// Emits one JSON audit line for a store write.
pub fn log_audit(op: &str, model: &str, doc_id: &str) {
    let line = serde_json::json!({
        "ts": chrono::Utc::now().to_rfc3339(),
        "op": op,
        "model": model,
        "doc_id": doc_id,
    });
    log::info!(target: AUDIT_TARGET, "{line}");
}

//! Logger initialisation
//!
//! Log lines go to stdout with coloured level tags and to the session log file with plain ones.
//! Every line is stamped with the seconds elapsed since the session started, which is the time
//! base used in the archives too.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use colored::{ColoredString, Colorize};
use log::{info, Level, Record};
use thiserror::Error;

use crate::session::{self, Session};

pub use log::LevelFilter;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum LoggerInitError {
    #[error("The minimum log level must include `INFO`, found `{0}`")]
    InvalidMinLogLevel(LevelFilter),

    #[error("Could not open the log file: {0}")]
    LogFileInitError(std::io::Error),

    #[error("A logger has already been set: {0}")]
    FernInitError(log::SetLoggerError),
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Initialise logging for this execution. Must be called once only.
///
/// `min_level` applies to every target unless `module_levels` caps it, e.g.
/// `&[("teleop_lib::teleop_ctrl", LevelFilter::Debug)]`. `zmq` is always capped at `Info`.
pub fn logger_init(
    min_level: LevelFilter,
    module_levels: &[(&'static str, LevelFilter)],
    session: &Session
) -> Result<(), LoggerInitError> {

    if min_level < Level::Info {
        return Err(LoggerInitError::InvalidMinLogLevel(min_level))
    }

    let log_file = fern::log_file(&session.log_file_path)
        .map_err(LoggerInitError::LogFileInitError)?;

    let terminal = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!("{}", line(record, coloured_tag(record.level()), message)))
        })
        .chain(std::io::stdout());

    let file = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!("{}", line(record, plain_tag(record.level()), message)))
        })
        .chain(log_file);

    module_levels
        .iter()
        .fold(
            fern::Dispatch::new()
                .level(min_level)
                .level_for("zmq", LevelFilter::Info),
            |d, (target, level)| d.level_for(*target, *level)
        )
        .chain(terminal)
        .chain(file)
        .apply()
        .map_err(LoggerInitError::FernInitError)?;

    info!("Logging initialised");
    info!("    Session epoch: {}", session::get_epoch());
    info!("    Log level: {:?}", min_level);
    for (target, level) in module_levels {
        info!("    Log level for {}: {:?}", target, level);
    }
    info!("    Log file: {:?}", session.log_file_path);

    Ok(())
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Format one log line. Debug and trace lines name their target.
fn line<T: std::fmt::Display>(record: &Record, tag: T, message: &std::fmt::Arguments) -> String {
    let elapsed = session::get_elapsed_seconds();

    match record.level() {
        Level::Debug | Level::Trace => format!(
            "[{:10.6} {}] {}: {}", elapsed, tag, record.target(), message
        ),
        _ => format!("[{:10.6} {}] {}", elapsed, tag, message),
    }
}

fn plain_tag(level: Level) -> &'static str {
    match level {
        Level::Trace => "TRC",
        Level::Debug => "DBG",
        Level::Info => "INF",
        Level::Warn => "WRN",
        Level::Error => "ERR",
    }
}

fn coloured_tag(level: Level) -> ColoredString {
    let tag = plain_tag(level);

    match level {
        Level::Trace => tag.dimmed().italic(),
        Level::Debug => tag.dimmed(),
        Level::Info => tag.normal(),
        Level::Warn => tag.yellow(),
        Level::Error => tag.red().bold(),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_tags() {
        assert_eq!(plain_tag(Level::Warn), "WRN");
        assert!(coloured_tag(Level::Error).to_string().contains("ERR"));
    }

    #[test]
    fn test_line_target_only_below_info() {
        let info = Record::builder()
            .level(Level::Info)
            .target("teleop_lib::teleop_ctrl")
            .build();
        let s = line(&info, "INF", &format_args!("Control active"));
        assert!(s.ends_with("INF] Control active"));

        let debug = Record::builder()
            .level(Level::Debug)
            .target("teleop_lib::teleop_ctrl")
            .build();
        let s = line(&debug, "DBG", &format_args!("status"));
        assert!(s.ends_with("DBG] teleop_lib::teleop_ctrl: status"));
    }
}

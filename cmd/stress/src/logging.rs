use stderrlog::{LogLevelNum, Timestamp};

/// Initialize stderr logging.
///
/// `verbose` counts `-v` flags; with none given, `RKS_LOG_LEVEL`
/// (0 = off .. 5 = trace) is used, then `default`.
pub fn setup_logging(verbose: u8, default: u8) -> Result<(), log::SetLoggerError> {
    let level = if verbose > 0 {
        verbose
    } else {
        rksync::env::env_get("RKS_LOG_LEVEL", default)
    };

    let log_level = match level {
        0 => LogLevelNum::Off,
        1 => LogLevelNum::Error,
        2 => LogLevelNum::Warn,
        3 => LogLevelNum::Info,
        4 => LogLevelNum::Debug,
        _ => LogLevelNum::Trace,
    };

    stderrlog::new()
        .verbosity(log_level)
        .timestamp(Timestamp::Millisecond)
        .init()
}

//! Per-module switchable logging for the hot loops (the gate ticker and the
//! storage watcher). A module opts in with `const ENABLE_LOGS: bool = true;`
//! and imports the `log_*` macros it needs.

#[doc(hidden)]
#[macro_export]
macro_rules! gated_log {
    ($level:ident, $($arg:tt)*) => {
        if ENABLE_LOGS {
            log::$level!($($arg)*);
        }
    };
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => { $crate::gated_log!(info, $($arg)*) };
}

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => { $crate::gated_log!(error, $($arg)*) };
}

#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => { $crate::gated_log!(debug, $($arg)*) };
}

/// Builds the process logger: `Info` by default, `Debug` when
/// `VOTEGATE_DEBUG` is `1`/`true`, and `RUST_LOG` still wins per module.
pub fn init_logging() {
    let debug_mode = std::env::var("VOTEGATE_DEBUG")
        .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
        .unwrap_or(false);

    let level = if debug_mode {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    let _ = env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .try_init();
}

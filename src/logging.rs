//! stderr logging via fern. Info lines print as `==> message`; other levels carry a prefix.

use log::{Level, LevelFilter};

/// Level for the --quiet / --verbose flags. Quiet wins.
pub fn level_for(quiet: bool, verbose: bool) -> LevelFilter {
    if quiet {
        LevelFilter::Warn
    } else if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    }
}

fn prefix(level: Level) -> &'static str {
    match level {
        Level::Info => "==>",
        Level::Error => "error:",
        Level::Warn => "warning:",
        Level::Debug => "debug:",
        Level::Trace => "trace:",
    }
}

/// Install the global logger. Fails if a logger is already set.
pub fn init(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    fern::Dispatch::new()
        .format(|out, message, record| out.finish(format_args!("{} {}", prefix(record.level()), message)))
        .level(level)
        // reqwest/hyper internals are noise even at debug
        .level_for("reqwest", LevelFilter::Warn)
        .level_for("hyper", LevelFilter::Warn)
        .level_for("hyper_util", LevelFilter::Warn)
        .chain(std::io::stderr())
        .apply()
}

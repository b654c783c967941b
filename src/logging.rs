//! Console logging setup for the binaries.

use std::io::Write;

use log::LevelFilter;

/// Console verbosity chosen on the command line. The most quiet flag wins.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LogConfig {
    pub verbose: bool,
    pub debug: bool,
    pub quiet_console: bool,
    pub silent_console: bool,
}

impl LogConfig {
    pub fn level(&self) -> LevelFilter {
        if self.silent_console {
            LevelFilter::Off
        } else if self.quiet_console {
            LevelFilter::Warn
        } else if self.debug {
            LevelFilter::Debug
        } else if self.verbose {
            LevelFilter::Info
        } else {
            LevelFilter::Warn
        }
    }

    /// Install the global logger. `RUST_LOG`, when set, overrides the level.
    pub fn init(&self) -> Result<(), log::SetLoggerError> {
        env_logger::Builder::new()
            .filter_level(self.level())
            .parse_default_env()
            .format(|buf, record| {
                writeln!(buf, "{:<8}{} [{}]", record.level(), record.args(), record.target())
            })
            .try_init()
    }
}

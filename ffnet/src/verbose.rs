//! `-v` / `-q` counting flags mapped onto a tracing level.

use tracing::{level_filters::LevelFilter, Level};

#[derive(clap::Args, Debug, Clone)]
pub struct Verbosity {
    /// More log output per occurrence
    #[clap(long, short = 'v', parse(from_occurrences), global = true)]
    verbose: i8,

    /// Less log output per occurrence
    #[clap(
        long,
        short = 'q',
        parse(from_occurrences),
        global = true,
        conflicts_with = "verbose"
    )]
    quiet: i8,
}

impl Verbosity {
    /// Warnings are shown by default, recovered parse problems log at that level.
    pub fn log_level_filter(&self) -> LevelFilter {
        match 1i8.saturating_add(self.verbose).saturating_sub(self.quiet) {
            i8::MIN..=-1 => LevelFilter::OFF,
            0 => LevelFilter::from_level(Level::ERROR),
            1 => LevelFilter::from_level(Level::WARN),
            2 => LevelFilter::from_level(Level::INFO),
            3 => LevelFilter::from_level(Level::DEBUG),
            _ => LevelFilter::from_level(Level::TRACE),
        }
    }
}

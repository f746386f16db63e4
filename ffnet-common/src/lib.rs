pub mod fetch;
pub mod models;

use std::{path::PathBuf, time::Duration};

pub use color_eyre::{
    eyre::{Context, Report},
    install,
};
pub use crossbeam_channel as channel;
pub use http::Uri;

pub const DEFAULT_BASE_URL: &str = "https://www.fanfiction.net";
pub const DEFAULT_THRESHOLD: f64 = 15.0;
pub const DEFAULT_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_DELAY_MS: u64 = 500;
pub const DEFAULT_WORKERS: usize = 4;

#[twelf::config]
pub struct Conf {
    /// Site root every story, user and review URL is built from
    pub base_url: Option<String>,

    /// Minimum follows per chapter a story needs to be recommended
    pub threshold: Option<f64>,

    /// How many times a failed request is retried
    pub retries: Option<u32>,

    /// Base delay in milliseconds for the exponential retry backoff
    pub retry_delay_ms: Option<u64>,

    /// Upper bound in milliseconds of the random pause before each request
    pub politeness_ms: Option<u64>,

    /// Number of worker threads used when fetching many stories
    pub workers: Option<usize>,

    /// Directory holding already converted `<story id>.epub` files
    pub library: Option<String>,
}

impl Conf {
    pub fn base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/')
    }

    pub fn threshold(&self) -> f64 {
        self.threshold.unwrap_or(DEFAULT_THRESHOLD)
    }

    pub fn retries(&self) -> u32 {
        self.retries.unwrap_or(DEFAULT_RETRIES)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms.unwrap_or(DEFAULT_RETRY_DELAY_MS))
    }

    pub fn politeness(&self) -> Option<Duration> {
        self.politeness_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }

    pub fn workers(&self) -> usize {
        self.workers.unwrap_or(DEFAULT_WORKERS).max(1)
    }

    /// Path an already converted story would live at, if a library is configured.
    pub fn library_entry(&self, story_id: u64) -> Option<PathBuf> {
        self.library
            .as_ref()
            .map(|dir| PathBuf::from(dir).join(format!("{}.epub", story_id)))
    }
}

use std::time::Duration;

use isahc::{
    config::{Configurable as _, RedirectPolicy},
    HttpClient, ReadResponseExt as _, Request,
};
use rand::Rng;

use crate::{Conf, Uri};

#[cfg(all(target_os = "linux", target_arch = "x86_64"))]
const USER_AGENT: &str = concat!(
    "Mozilla/5.0 (X11; Linux x86_64; rv:109.0) Gecko/20100101 Firefox/115.0 ffnet/",
    env!("CARGO_PKG_VERSION")
);
#[cfg(all(target_os = "windows", target_arch = "x86_64"))]
const USER_AGENT: &str = concat!(
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:109.0) Gecko/20100101 Firefox/115.0 ffnet/",
    env!("CARGO_PKG_VERSION")
);
#[cfg(not(any(
    all(target_os = "linux", target_arch = "x86_64"),
    all(target_os = "windows", target_arch = "x86_64")
)))]
const USER_AGENT: &str = concat!(
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:109.0) Gecko/20100101 Firefox/115.0 ffnet/",
    env!("CARGO_PKG_VERSION")
);

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("unable to build the http client")]
    Client(#[source] isahc::Error),

    #[error("invalid request for `{url}`")]
    Request {
        url: String,
        #[source]
        source: isahc::http::Error,
    },

    #[error("request to `{url}` failed")]
    Http {
        url: String,
        #[source]
        source: isahc::Error,
    },

    #[error("`{url}` answered with status {status}")]
    Status { url: String, status: u16 },

    #[error("unable to read the body of `{url}`")]
    Body {
        url: String,
        #[source]
        source: std::io::Error,
    },
}

impl FetchError {
    /// Whether another attempt at the same request could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Client(_) | FetchError::Request { .. } => false,
            FetchError::Http { .. } | FetchError::Body { .. } => true,
            FetchError::Status { status, .. } => *status == 429 || *status >= 500,
        }
    }
}

/// Retrieves the raw body behind a URL.
///
/// The extraction engine never talks to the network itself, everything goes
/// through an implementation of this trait.
pub trait Fetch {
    fn fetch(&self, url: &Uri) -> Result<String, FetchError>;
}

impl<F> Fetch for F
where
    F: Fn(&Uri) -> Result<String, FetchError>,
{
    fn fetch(&self, url: &Uri) -> Result<String, FetchError> {
        self(url)
    }
}

#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    pub retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (starting at 0): `base * 2^attempt`
    /// plus up to one `base` of random jitter.
    pub fn delay(&self, attempt: u32) -> Duration {
        let base = self.base_delay.as_millis() as u64;
        let backoff = base.saturating_mul(1u64 << attempt.min(16));
        let jitter = if base == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..base)
        };

        Duration::from_millis(backoff.saturating_add(jitter))
    }
}

/// Blocking HTTP fetcher with bounded retry.
pub struct HttpFetcher {
    client: HttpClient,
    retry: RetryPolicy,
    politeness: Option<Duration>,
}

impl HttpFetcher {
    pub fn new(conf: &Conf) -> Result<Self, FetchError> {
        let client = HttpClient::builder()
            .default_header("User-Agent", USER_AGENT)
            .redirect_policy(RedirectPolicy::Follow)
            .build()
            .map_err(FetchError::Client)?;

        Ok(Self {
            client,
            retry: RetryPolicy {
                retries: conf.retries(),
                base_delay: conf.retry_delay(),
            },
            politeness: conf.politeness(),
        })
    }

    fn attempt(&self, url: &Uri) -> Result<String, FetchError> {
        let req = Request::builder()
            .uri(url.clone())
            .body(())
            .map_err(|source| FetchError::Request {
                url: url.to_string(),
                source,
            })?;

        let mut res = self.client.send(req).map_err(|source| FetchError::Http {
            url: url.to_string(),
            source,
        })?;

        let status = res.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        res.text().map_err(|source| FetchError::Body {
            url: url.to_string(),
            source,
        })
    }

    fn pause(&self) {
        if let Some(limit) = self.politeness {
            let length = rand::thread_rng().gen_range(0..=limit.as_millis() as u64);

            tracing::debug!("sleeping for {} ms", length);

            std::thread::sleep(Duration::from_millis(length));
        }
    }
}

impl Fetch for HttpFetcher {
    #[tracing::instrument(err, skip(self, url), fields(url = %url))]
    fn fetch(&self, url: &Uri) -> Result<String, FetchError> {
        self.pause();

        let mut attempt = 0;

        loop {
            tracing::info!(attempt, "fetching");

            match self.attempt(url) {
                Ok(body) => return Ok(body),
                Err(err) if err.is_transient() && attempt < self.retry.retries => {
                    let delay = self.retry.delay(attempt);

                    tracing::warn!(error = %err, delay_ms = delay.as_millis() as u64, "retrying");

                    std::thread::sleep(delay);
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_and_stays_within_jitter() {
        let policy = RetryPolicy {
            retries: 3,
            base_delay: Duration::from_millis(100),
        };

        for attempt in 0..3u32 {
            let delay = policy.delay(attempt).as_millis() as u64;
            let floor = 100 * (1 << attempt);

            assert!(delay >= floor, "{} < {}", delay, floor);
            assert!(delay < floor + 100, "{} too large", delay);
        }
    }

    #[test]
    fn only_transient_statuses_are_retried() {
        let status = |status| FetchError::Status {
            url: "https://www.fanfiction.net/s/1".into(),
            status,
        };

        assert!(status(503).is_transient());
        assert!(status(429).is_transient());
        assert!(!status(404).is_transient());
    }

    #[test]
    fn closures_are_fetchers() {
        let stub = |url: &Uri| -> Result<String, FetchError> { Ok(format!("body of {}", url.path())) };
        let url = Uri::from_static("https://www.fanfiction.net/s/7");

        assert_eq!(stub.fetch(&url).unwrap(), "body of /s/7");
    }
}

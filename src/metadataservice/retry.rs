use std::fmt::{Debug, Formatter};
use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tracing::{debug, instrument, warn};

use crate::errors::{Error, ResultExt};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Why a single attempt did not produce a usable response.
#[derive(Debug)]
pub enum AttemptFailure {
    Status(StatusCode),
    Transport(reqwest::Error),
}

impl From<AttemptFailure> for Error {
    fn from(failure: AttemptFailure) -> Self {
        match failure {
            AttemptFailure::Status(status) => Error::RequestFailed {
                status_code: status.as_u16(),
                status: status.to_string(),
            },
            AttemptFailure::Transport(e) => Error::Transport(e),
        }
    }
}

pub type RetryPredicate = Arc<dyn Fn(&AttemptFailure) -> bool + Send + Sync>;

/// Metadata endpoints hand out 5xx and 404 alike while the instance is still
/// booting, so every failure is worth another attempt.
pub fn any_failure_is_retryable(_failure: &AttemptFailure) -> bool {
    true
}

#[derive(Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
    timeout: Option<Duration>,
    retryable: RetryPredicate,
}

impl RetryPolicy {
    pub fn new(delay: Duration) -> Self {
        RetryPolicy {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay,
            timeout: None,
            retryable: Arc::new(any_failure_is_retryable),
        }
    }

    /// Bound the whole logical request, sleeps included.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_retry_predicate<F>(mut self, retryable: F) -> Self
    where
        F: Fn(&AttemptFailure) -> bool + Send + Sync + 'static,
    {
        self.retryable = Arc::new(retryable);
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn is_retryable(&self, failure: &AttemptFailure) -> bool {
        (self.retryable)(failure)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::new(DEFAULT_RETRY_DELAY)
    }
}

impl Debug for RetryPolicy {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("delay", &self.delay)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

pub fn build_header_map<'a, I>(headers: I) -> Result<HeaderMap, Error>
where
    I: IntoIterator<Item = (&'a String, &'a String)>,
{
    let mut header_map = HeaderMap::new();
    for (name, value) in headers {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| Error::InvalidHeader(name.clone(), e.to_string()))?;
        let header_value = HeaderValue::from_str(value)
            .map_err(|e| Error::InvalidHeader(name.clone(), e.to_string()))?;
        header_map.insert(header_name, header_value);
    }
    Ok(header_map)
}

/// GETs paths below a base URL, retrying failed exchanges according to a
/// [`RetryPolicy`].
#[derive(Debug, Clone)]
pub struct RetryableHttpClient {
    client: reqwest::Client,
    base_url: String,
    headers: HeaderMap,
    policy: RetryPolicy,
}

impl RetryableHttpClient {
    pub fn new(
        base_url: &str,
        headers: HeaderMap,
        policy: RetryPolicy,
        request_timeout: Duration,
    ) -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .pool_max_idle_per_host(0)
            .build()?;
        Ok(RetryableHttpClient {
            client,
            base_url: base_url.to_string(),
            headers,
            policy,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url_for(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Fetch `base_url + path` and return the body of the first 2xx response.
    pub async fn get(&self, path: &str) -> Result<String, Error> {
        let url = self.url_for(path);
        let result = match self.policy.timeout() {
            Some(timeout) => tokio::time::timeout(timeout, self.get_with_retries(&url))
                .await
                .map_err(|_| Error::Timeout(format!("GET {url}")))
                .and_then(|result| result),
            None => self.get_with_retries(&url).await,
        };
        result
            .and_then(|body| Ok(String::from_utf8(body)?))
            .wrap_err("Performing GET request")
    }

    #[instrument(skip(self))]
    async fn get_with_retries(&self, url: &str) -> Result<Vec<u8>, Error> {
        let mut attempts = 0;
        loop {
            attempts += 1;
            let failure = match self.attempt(url).await {
                Ok(body) => {
                    debug!("GET succeeded after {} attempt(s)", attempts);
                    return Ok(body);
                }
                Err(failure) => failure,
            };

            warn!("GET attempt {} of {} failed: {:?}", attempts, self.policy.max_attempts(), failure);
            if attempts >= self.policy.max_attempts() || !self.policy.is_retryable(&failure) {
                return Err(failure.into());
            }
            tokio::time::sleep(self.policy.delay()).await;
        }
    }

    async fn attempt(&self, url: &str) -> Result<Vec<u8>, AttemptFailure> {
        let response = self
            .client
            .get(url)
            .headers(self.headers.clone())
            .send()
            .await
            .map_err(AttemptFailure::Transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(AttemptFailure::Status(status));
        }
        let body = response.bytes().await.map_err(AttemptFailure::Transport)?;
        Ok(body.to_vec())
    }
}

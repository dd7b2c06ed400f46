use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};

use crate::config::LOCALE;
use crate::http_client::{GetRequest, RawResponse, Transport};

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Extra attempts after the first one for transport errors and non-404/429 statuses.
    pub retries: u32,
    pub base_delay: Duration,
    pub default_retry_after: Duration,
    /// Upper bound on a single server-requested wait.
    pub max_retry_after: Duration,
    /// 429 waits do not count against `retries`; this only stops a server
    /// that never lets up from pinning a worker forever.
    pub max_rate_limit_waits: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 2,
            base_delay: Duration::from_secs(1),
            default_retry_after: Duration::from_secs(5),
            max_retry_after: Duration::from_secs(120),
            max_rate_limit_waits: 30,
        }
    }
}

/// Result of one upstream read after retries. `Missing` is an answer from
/// the server (404); `Failed` means no answer was obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fetched<T> {
    Found(T),
    Missing,
    Failed,
}

impl<T> Fetched<T> {
    pub fn found(self) -> Option<T> {
        match self {
            Fetched::Found(value) => Some(value),
            Fetched::Missing | Fetched::Failed => None,
        }
    }

    pub fn and_then<U>(self, f: impl FnOnce(T) -> Fetched<U>) -> Fetched<U> {
        match self {
            Fetched::Found(value) => f(value),
            Fetched::Missing => Fetched::Missing,
            Fetched::Failed => Fetched::Failed,
        }
    }
}

type Sleeper = Box<dyn Fn(Duration) + Send + Sync>;

/// Every upstream read goes through here so retry, backoff and 404/429
/// handling stay identical for all callers.
pub struct ApiClient<'a> {
    transport: &'a dyn Transport,
    locale: String,
    policy: RetryPolicy,
    sleep: Sleeper,
}

impl<'a> ApiClient<'a> {
    pub fn new(transport: &'a dyn Transport) -> Self {
        Self {
            transport,
            locale: LOCALE.to_string(),
            policy: RetryPolicy::default(),
            sleep: Box::new(std::thread::sleep),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_sleeper(mut self, sleep: impl Fn(Duration) + Send + Sync + 'static) -> Self {
        self.sleep = Box::new(sleep);
        self
    }

    /// Authenticated read against the game data API. `None` covers both
    /// "does not exist" (404) and "gave up after retries".
    pub fn get(&self, token: &str, url: &str, namespace: &str) -> Option<Value> {
        self.lookup(token, url, namespace).found()
    }

    /// Like [`ApiClient::get`] but keeps a 404 apart from a failed call.
    pub fn lookup(&self, token: &str, url: &str, namespace: &str) -> Fetched<Value> {
        let query = [("namespace", namespace), ("locale", self.locale.as_str())];
        let req = GetRequest {
            url,
            query: &query,
            bearer: Some(token),
        };
        self.fetch(&req).and_then(|body| decode_json(url, &body))
    }

    /// Unauthenticated JSON read, used for third-party lookup services.
    pub fn lookup_public(&self, url: &str) -> Fetched<Value> {
        self.fetch(&GetRequest::public(url))
            .and_then(|body| decode_json(url, &body))
    }

    pub fn get_bytes(&self, url: &str) -> Option<Vec<u8>> {
        self.fetch(&GetRequest::public(url))
            .found()
            .filter(|body| !body.is_empty())
    }

    fn fetch(&self, req: &GetRequest<'_>) -> Fetched<Vec<u8>> {
        let mut attempt = 0u32;
        let mut rate_limit_waits = 0u32;
        loop {
            let failure = match self.transport.get(req) {
                Ok(resp) if resp.status == 404 => return Fetched::Missing,
                Ok(resp) if resp.status == 429 => {
                    if rate_limit_waits >= self.policy.max_rate_limit_waits {
                        warn!(url = req.url, "still rate limited, giving up");
                        return Fetched::Failed;
                    }
                    rate_limit_waits += 1;
                    let wait = self.retry_after(&resp);
                    warn!(url = req.url, wait_secs = wait.as_secs(), "rate limited");
                    (self.sleep)(wait);
                    continue;
                }
                Ok(resp) if resp.is_success() => return Fetched::Found(resp.body),
                Ok(resp) => format!("http {}", resp.status),
                Err(err) => format!("{err:#}"),
            };

            if attempt < self.policy.retries {
                let delay = self.policy.base_delay * 2u32.saturating_pow(attempt);
                debug!(url = req.url, attempt, error = %failure, "retrying");
                (self.sleep)(delay);
                attempt += 1;
                continue;
            }
            warn!(url = req.url, error = %failure, "request failed");
            return Fetched::Failed;
        }
    }

    fn retry_after(&self, resp: &RawResponse) -> Duration {
        resp.retry_after
            .as_deref()
            .and_then(parse_retry_after)
            .unwrap_or(self.policy.default_retry_after)
            .min(self.policy.max_retry_after)
    }
}

fn parse_retry_after(raw: &str) -> Option<Duration> {
    let trimmed = raw.trim();
    if let Ok(secs) = trimmed.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    trimmed
        .parse::<f64>()
        .ok()
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
}

fn decode_json(url: &str, body: &[u8]) -> Fetched<Value> {
    match serde_json::from_slice::<Value>(body) {
        Ok(value) => Fetched::Found(value),
        Err(err) => {
            warn!(url, error = %err, "invalid json body");
            Fetched::Failed
        }
    }
}

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::Result;
use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::header::{ETAG, IF_MODIFIED_SINCE, IF_NONE_MATCH, LAST_MODIFIED, USER_AGENT};
use tracing::debug;

use crate::error::FetchError;

pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Validators {
    pub etag: Option<String>,
    pub last_modified: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportResponse {
    NotModified,
    Body {
        body: String,
        validators: Validators,
    },
}

/// Raw request/response seam. The cache owns freshness; transports only talk HTTP.
pub trait Transport: Send + Sync {
    fn get(&self, url: &str, validators: &Validators) -> Result<TransportResponse, FetchError>;
}

pub struct ReqwestTransport {
    client: &'static Client,
}

impl ReqwestTransport {
    pub fn new(client: &'static Client) -> Self {
        Self { client }
    }
}

impl Transport for ReqwestTransport {
    fn get(&self, url: &str, validators: &Validators) -> Result<TransportResponse, FetchError> {
        let mut req = self.client.get(url).header(USER_AGENT, "Mozilla/5.0");
        if let Some(etag) = validators.etag.as_ref() {
            req = req.header(IF_NONE_MATCH, etag);
        }
        if let Some(last_modified) = validators.last_modified.as_ref() {
            req = req.header(IF_MODIFIED_SINCE, last_modified);
        }

        let resp = req.send().map_err(|err| FetchError::Request {
            url: url.to_string(),
            message: err.to_string(),
        })?;
        let status = resp.status();
        if status == StatusCode::NOT_MODIFIED {
            return Ok(TransportResponse::NotModified);
        }
        if !status.is_success() {
            return Err(FetchError::Http {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let headers = resp.headers().clone();
        let body = resp.text().map_err(|err| FetchError::Request {
            url: url.to_string(),
            message: format!("failed reading body: {err}"),
        })?;
        let etag = headers
            .get(ETAG)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());
        let last_modified = headers
            .get(LAST_MODIFIED)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());
        Ok(TransportResponse::Body {
            body,
            validators: Validators {
                etag,
                last_modified,
            },
        })
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    body: String,
    validators: Validators,
    fetched_at: Instant,
}

/// Per-URL response cache with a fixed TTL and conditional revalidation.
///
/// Owned by whoever builds the feed; nothing here is process-global. Within the
/// TTL a cached body is returned without touching the network. After it, the
/// stored ETag / Last-Modified validators are sent and a 304 refreshes the entry.
pub struct HttpCache {
    transport: Box<dyn Transport>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl HttpCache {
    pub fn new(transport: Box<dyn Transport>, clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self {
            transport,
            clock,
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let now = self.clock.now();
        let cached = {
            let guard = self.entries.lock().expect("http cache lock poisoned");
            guard.get(url).cloned()
        };

        if let Some(entry) = cached.as_ref()
            && now.saturating_duration_since(entry.fetched_at) < self.ttl
        {
            debug!(url, "http cache hit");
            return Ok(entry.body.clone());
        }

        let validators = cached
            .as_ref()
            .map(|entry| entry.validators.clone())
            .unwrap_or_default();
        match self.transport.get(url, &validators)? {
            TransportResponse::NotModified => {
                let Some(mut entry) = cached else {
                    return Err(FetchError::NotModifiedWithoutBody {
                        url: url.to_string(),
                    });
                };
                debug!(url, "http cache revalidated");
                entry.fetched_at = now;
                let body = entry.body.clone();
                self.store(url, entry);
                Ok(body)
            }
            TransportResponse::Body { body, validators } => {
                self.store(
                    url,
                    CacheEntry {
                        body: body.clone(),
                        validators,
                        fetched_at: now,
                    },
                );
                Ok(body)
            }
        }
    }

    pub fn clear(&self) {
        let mut guard = self.entries.lock().expect("http cache lock poisoned");
        guard.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("http cache lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn store(&self, url: &str, entry: CacheEntry) {
        let mut guard = self.entries.lock().expect("http cache lock poisoned");
        guard.insert(url.to_string(), entry);
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    struct ManualClock {
        now: Mutex<Instant>,
    }

    impl ManualClock {
        fn new() -> Self {
            Self {
                now: Mutex::new(Instant::now()),
            }
        }

        fn advance(&self, by: Duration) {
            let mut guard = self.now.lock().unwrap();
            *guard += by;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> Instant {
            *self.now.lock().unwrap()
        }
    }

    struct ScriptedTransport {
        responses: Mutex<VecDeque<Result<TransportResponse, FetchError>>>,
        seen: Arc<Mutex<Vec<Validators>>>,
        calls: Arc<AtomicUsize>,
    }

    impl Transport for ScriptedTransport {
        fn get(
            &self,
            _url: &str,
            validators: &Validators,
        ) -> Result<TransportResponse, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push(validators.clone());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(FetchError::Request {
                    url: "test".to_string(),
                    message: "script exhausted".to_string(),
                }))
        }
    }

    fn body(text: &str, etag: Option<&str>) -> Result<TransportResponse, FetchError> {
        Ok(TransportResponse::Body {
            body: text.to_string(),
            validators: Validators {
                etag: etag.map(|s| s.to_string()),
                last_modified: None,
            },
        })
    }

    fn cache_with(
        script: Vec<Result<TransportResponse, FetchError>>,
    ) -> (
        HttpCache,
        Arc<ManualClock>,
        Arc<AtomicUsize>,
        Arc<Mutex<Vec<Validators>>>,
    ) {
        let clock = Arc::new(ManualClock::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let transport = ScriptedTransport {
            responses: Mutex::new(script.into_iter().collect()),
            seen: seen.clone(),
            calls: calls.clone(),
        };
        let cache = HttpCache::new(
            Box::new(transport),
            clock.clone(),
            Duration::from_millis(2000),
        );
        (cache, clock, calls, seen)
    }

    #[test]
    fn fresh_entry_skips_network() {
        let (cache, clock, calls, _) = cache_with(vec![body("a", None)]);
        assert_eq!(cache.fetch("u").unwrap(), "a");
        clock.advance(Duration::from_millis(1500));
        assert_eq!(cache.fetch("u").unwrap(), "a");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn expired_entry_revalidates_with_etag() {
        let (cache, clock, calls, seen) = cache_with(vec![
            body("a", Some("\"v1\"")),
            Ok(TransportResponse::NotModified),
        ]);
        assert_eq!(cache.fetch("u").unwrap(), "a");
        clock.advance(Duration::from_millis(2500));
        assert_eq!(cache.fetch("u").unwrap(), "a");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        let seen = seen.lock().unwrap();
        assert_eq!(seen[1].etag.as_deref(), Some("\"v1\""));
    }

    #[test]
    fn not_modified_without_entry_is_an_error() {
        let (cache, _, _, _) = cache_with(vec![Ok(TransportResponse::NotModified)]);
        assert!(matches!(
            cache.fetch("u"),
            Err(FetchError::NotModifiedWithoutBody { .. })
        ));
    }

    #[test]
    fn refresh_failure_propagates() {
        let (cache, clock, _, _) = cache_with(vec![
            body("a", None),
            Err(FetchError::Http {
                status: 503,
                url: "u".to_string(),
            }),
        ]);
        cache.fetch("u").unwrap();
        clock.advance(Duration::from_secs(3));
        assert!(matches!(
            cache.fetch("u"),
            Err(FetchError::Http { status: 503, .. })
        ));
    }

    #[test]
    fn clear_drops_entries() {
        let (cache, _, calls, _) = cache_with(vec![body("a", None), body("b", None)]);
        cache.fetch("u").unwrap();
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.fetch("u").unwrap(), "b");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}

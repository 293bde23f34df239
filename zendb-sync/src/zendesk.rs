//! Zendesk REST source: blocking HTTP client over `ureq`.
//!
//! Cursor feeds use the time-based incremental export endpoints
//! (`incremental/<collection>.json?start_time=<unix>`); lookup feeds use the
//! plain list endpoints. Both follow `next_page` links.

use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::Deserialize;
use serde_json::{Map, Value};

use zendb_core::{Resource, ZendeskConfig};

use crate::error::SourceError;
use crate::source::Source;

/// Incremental pages hold at most this many records; a shorter page is the last.
pub const INCREMENTAL_PAGE_LIMIT: usize = 1000;

const MAX_RATE_LIMIT_RETRIES: u32 = 3;
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(60);

pub struct ZendeskSource {
    agent: ureq::Agent,
    base_url: String,
    authorization: String,
}

#[derive(Debug, Deserialize)]
struct Page {
    #[serde(default)]
    next_page: Option<String>,
    #[serde(default)]
    end_time: Option<i64>,
    #[serde(default)]
    end_of_stream: Option<bool>,
    #[serde(flatten)]
    rest: Map<String, Value>,
}

impl Page {
    /// Decode the page's collection record by record.
    ///
    /// Records that fail to decode are logged and dropped; the rest are
    /// returned along with the raw record count, which drives paging.
    fn take<R: Resource>(&mut self, url: &str) -> Result<(Vec<R>, usize), SourceError> {
        let raw = self
            .rest
            .remove(R::COLLECTION)
            .ok_or_else(|| SourceError::MissingCollection {
                url: url.to_string(),
                collection: R::COLLECTION.to_string(),
            })?;
        let items: Vec<Value> =
            serde_json::from_value(raw).map_err(|source| SourceError::Decode {
                url: url.to_string(),
                source,
            })?;

        let total = items.len();
        let mut records = Vec::with_capacity(total);
        for item in items {
            let id = item.get("id").cloned().unwrap_or(Value::Null);
            match serde_json::from_value::<R>(item) {
                Ok(record) => records.push(record),
                Err(err) => tracing::warn!(
                    "skipping malformed {} record {id} from {url}: {err}",
                    R::COLLECTION
                ),
            }
        }
        Ok((records, total))
    }
}

impl ZendeskSource {
    pub fn new(config: &ZendeskConfig) -> Result<Self, SourceError> {
        let base_url = config.base_url().ok_or_else(|| {
            SourceError::Other("zendesk config needs either `subdomain` or `url`".to_string())
        })?;
        let credentials = STANDARD.encode(format!("{}/token:{}", config.user, config.token));
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_secs(10))
            .timeout_read(Duration::from_secs(120))
            .build();
        Ok(Self {
            agent,
            base_url,
            authorization: format!("Basic {credentials}"),
        })
    }

    fn get_page(&self, url: &str) -> Result<Page, SourceError> {
        let mut attempts = 0;
        loop {
            attempts += 1;
            let request = self
                .agent
                .get(url)
                .set("Authorization", &self.authorization)
                .set("Accept", "application/json");
            match request.call() {
                Ok(response) => {
                    return serde_json::from_reader(response.into_reader()).map_err(|source| {
                        SourceError::Decode {
                            url: url.to_string(),
                            source,
                        }
                    });
                }
                Err(ureq::Error::Status(429, response)) if attempts <= MAX_RATE_LIMIT_RETRIES => {
                    let wait = retry_after(&response);
                    tracing::warn!("rate limited by {url}, retrying in {}s", wait.as_secs());
                    std::thread::sleep(wait);
                }
                Err(ureq::Error::Status(429, _)) => {
                    return Err(SourceError::RateLimited {
                        url: url.to_string(),
                        attempts,
                    });
                }
                Err(ureq::Error::Status(status, _)) => {
                    return Err(SourceError::Status {
                        url: url.to_string(),
                        status,
                    });
                }
                Err(ureq::Error::Transport(transport)) => {
                    return Err(SourceError::Transport {
                        url: url.to_string(),
                        message: transport.to_string(),
                    });
                }
            }
        }
    }
}

fn retry_after(response: &ureq::Response) -> Duration {
    response
        .header("Retry-After")
        .and_then(|value| value.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_RETRY_AFTER)
}

impl Source for ZendeskSource {
    fn export_since<R: Resource>(
        &mut self,
        since: i64,
        on_batch: &mut dyn FnMut(Vec<R>),
    ) -> Result<i64, SourceError> {
        let mut url = format!(
            "{}incremental/{}.json?start_time={since}",
            self.base_url,
            R::COLLECTION
        );
        let mut cursor = since;

        loop {
            let mut page = self.get_page(&url)?;
            let (records, count) = page.take::<R>(&url)?;
            tracing::debug!("{url}: {count} {}", R::COLLECTION);
            if !records.is_empty() {
                on_batch(records);
            }

            let previous = cursor;
            if let Some(end_time) = page.end_time {
                cursor = cursor.max(end_time);
            }
            let exhausted = page.end_of_stream.unwrap_or(false)
                || count < INCREMENTAL_PAGE_LIMIT
                || cursor == previous;
            match page.next_page {
                Some(next) if !exhausted => url = next,
                _ => break,
            }
        }
        Ok(cursor)
    }

    fn list_all<R: Resource>(
        &mut self,
        on_batch: &mut dyn FnMut(Vec<R>),
    ) -> Result<(), SourceError> {
        let mut url = format!("{}{}.json", self.base_url, R::COLLECTION);
        loop {
            let mut page = self.get_page(&url)?;
            let (records, _) = page.take::<R>(&url)?;
            if !records.is_empty() {
                on_batch(records);
            }
            match page.next_page {
                Some(next) if next != url => url = next,
                _ => break,
            }
        }
        Ok(())
    }
}

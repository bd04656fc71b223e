//! HTTP-backed [`TextExtractor`].
//!
//! Downloads the referenced file's text over HTTP with a short retry loop.
//! Transient failures (connect errors, 5xx) are retried; client errors are
//! not, since the file reference itself is wrong.

use std::time::Duration;

use tracing::{debug, warn};

use recall_core::message::FileRef;
use recall_core::{Error, Result, TextExtractor};

const FETCH_MAX_ATTEMPTS: u32 = 5;
const FETCH_RETRY_DELAY: Duration = Duration::from_secs(1);

pub struct HttpTextExtractor {
    client: reqwest::Client,
}

impl HttpTextExtractor {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpTextExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl TextExtractor for HttpTextExtractor {
    async fn extract(&self, file: &FileRef) -> Result<String> {
        let mut last_error = String::new();

        for attempt in 0..FETCH_MAX_ATTEMPTS {
            if attempt > 0 {
                tokio::time::sleep(FETCH_RETRY_DELAY).await;
            }

            match self.client.get(&file.url).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        debug!(url = %file.url, attempt, "File fetched");
                        return Ok(response.text().await?);
                    }
                    if status.is_client_error() {
                        return Err(Error::InvalidInput(format!(
                            "file fetch returned {} for {}",
                            status, file.url
                        )));
                    }
                    last_error = format!("file fetch returned {}", status);
                }
                Err(e) => last_error = e.to_string(),
            }

            warn!(url = %file.url, attempt, error = %last_error, "File fetch failed, retrying");
        }

        Err(Error::Generation(format!(
            "file fetch failed after {} attempts: {}",
            FETCH_MAX_ATTEMPTS, last_error
        )))
    }
}

// URL shortener collaborator
// Shortening is best-effort: any failure falls back to the original URL and
// never fails a dispatch.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{instrument, warn};

#[async_trait]
pub trait UrlShortener: Send + Sync {
    /// Shorten `url`, returning the original on any failure
    async fn shorten(&self, url: &str) -> String;
}

/// HTTP shortener client posting to an external shortening service
pub struct HttpUrlShortener {
    client: Client,
    api_url: String,
}

#[derive(Serialize)]
struct ShortenRequest<'a> {
    #[serde(rename = "longUrl")]
    long_url: &'a str,
}

#[derive(Deserialize)]
struct ShortenResponse {
    #[serde(rename = "shortUrl")]
    short_url: String,
}

impl HttpUrlShortener {
    pub fn new(api_url: String, timeout: Duration) -> Self {
        Self {
            client: Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_else(|_| Client::new()),
            api_url,
        }
    }
}

#[async_trait]
impl UrlShortener for HttpUrlShortener {
    #[instrument(skip(self))]
    async fn shorten(&self, url: &str) -> String {
        if self.api_url.is_empty() {
            return url.to_string();
        }

        let response = self
            .client
            .post(&self.api_url)
            .json(&ShortenRequest { long_url: url })
            .send()
            .await;

        match response {
            Ok(res) if res.status().is_success() => match res.json::<ShortenResponse>().await {
                Ok(body) => body.short_url,
                Err(e) => {
                    warn!("Shortener returned unparseable body: {}", e);
                    url.to_string()
                }
            },
            Ok(res) => {
                warn!("Shortener returned status {}", res.status());
                url.to_string()
            }
            Err(e) => {
                warn!("Shortener request failed: {}", e);
                url.to_string()
            }
        }
    }
}

/// Pass-through shortener for deployments without a shortening service
pub struct NoopShortener;

#[async_trait]
impl UrlShortener for NoopShortener {
    async fn shorten(&self, url: &str) -> String {
        url.to_string()
    }
}

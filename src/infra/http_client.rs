use crate::app::ports::{HttpClientPort, HttpGetResult};
use crate::config::HttpConfig;
use crate::error::{Result, ScraperError};
use crate::types::RequestSpec;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Bounded retry with exponential backoff. Transport errors and 5xx
/// responses are retried; anything else is returned as-is.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    /// Delay before retry number `attempt + 1`
    pub fn delay(&self, attempt: u32) -> Duration {
        self.backoff
            .saturating_mul(2u32.saturating_pow(attempt))
    }
}

pub async fn retry_get<F, Fut, E>(policy: RetryPolicy, label: &str, mut op: F) -> Result<HttpGetResult>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<HttpGetResult, E>>,
    E: Into<ScraperError> + std::fmt::Display,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(resp) if resp.status >= 500 && attempt < policy.max_retries => {
                warn!(
                    "GET {} returned {}, retry {}/{}",
                    label,
                    resp.status,
                    attempt + 1,
                    policy.max_retries
                );
            }
            Ok(resp) => return Ok(resp),
            Err(e) if attempt < policy.max_retries => {
                warn!(
                    "GET {} failed: {}, retry {}/{}",
                    label,
                    e,
                    attempt + 1,
                    policy.max_retries
                );
            }
            Err(e) => return Err(e.into()),
        }
        tokio::time::sleep(policy.delay(attempt)).await;
        attempt += 1;
    }
}

pub struct ReqwestHttp {
    client: reqwest::Client,
    policy: RetryPolicy,
}

impl ReqwestHttp {
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(concat!("election_scraper/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            policy: RetryPolicy {
                max_retries: config.max_retries,
                backoff: config.backoff(),
            },
        })
    }

    async fn get_once(
        &self,
        request: &RequestSpec,
    ) -> std::result::Result<HttpGetResult, reqwest::Error> {
        let resp = self
            .client
            .get(&request.url)
            .query(&request.query)
            .send()
            .await?;
        let status = resp.status().as_u16();
        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = resp.bytes().await?.to_vec();
        Ok(HttpGetResult {
            status,
            bytes,
            content_type,
        })
    }
}

#[async_trait]
impl HttpClientPort for ReqwestHttp {
    async fn get(&self, request: &RequestSpec) -> Result<HttpGetResult> {
        let label = request.display_url();
        debug!("GET {}", label);
        retry_get(self.policy, &label, || self.get_once(request)).await
    }
}

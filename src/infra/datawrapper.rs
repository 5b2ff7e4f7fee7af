use crate::app::ports::PublisherPort;
use crate::config::{HttpConfig, PublisherConfig};
use crate::constants::DATAWRAPPER;
use crate::error::{Result, ScraperError};
use crate::pipeline::storage::ResultTable;
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, info};

/// Datawrapper v3 API client: replace chart data, set the notes line, republish.
pub struct DatawrapperPublisher {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl DatawrapperPublisher {
    pub fn new(config: &PublisherConfig, http: &HttpConfig) -> Result<Self> {
        let token = config.api_key()?;
        let client = reqwest::Client::builder().timeout(http.timeout()).build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    fn chart_url(&self, destination: &str, suffix: &str) -> String {
        format!("{}/charts/{}{}", self.base_url, destination, suffix)
    }

    async fn check(resp: reqwest::Response, url: &str) -> Result<()> {
        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        let body = resp.text().await.unwrap_or_default();
        debug!("{} error body: {}", DATAWRAPPER, body);
        Err(ScraperError::Upstream {
            service: DATAWRAPPER.to_string(),
            url: url.to_string(),
            status: status.as_u16(),
        })
    }
}

/// Chart metadata patch that replaces the notes line under the chart
pub fn annotation_body(note: &str) -> Value {
    json!({ "metadata": { "annotate": { "notes": note } } })
}

#[async_trait]
impl PublisherPort for DatawrapperPublisher {
    async fn upload_table(&self, destination: &str, table: &ResultTable) -> Result<()> {
        let url = self.chart_url(destination, "/data");
        let body = table.to_csv()?;
        let resp = self
            .client
            .put(&url)
            .bearer_auth(&self.token)
            .header(reqwest::header::CONTENT_TYPE, "text/csv")
            .body(body)
            .send()
            .await?;
        Self::check(resp, &url).await?;
        info!("Uploaded {} rows to chart {}", table.len(), destination);
        Ok(())
    }

    async fn annotate(&self, destination: &str, note: &str) -> Result<()> {
        let url = self.chart_url(destination, "");
        let resp = self
            .client
            .patch(&url)
            .bearer_auth(&self.token)
            .json(&annotation_body(note))
            .send()
            .await?;
        Self::check(resp, &url).await
    }

    async fn publish(&self, destination: &str) -> Result<()> {
        let url = self.chart_url(destination, "/publish");
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .send()
            .await?;
        Self::check(resp, &url).await?;
        info!("Republished chart {}", destination);
        Ok(())
    }
}

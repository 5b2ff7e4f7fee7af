pub mod california;
pub mod oregon;

use crate::app::ports::HttpClientPort;
use crate::config::{ContestGroup, EndpointConfig, SourceConfig};
use crate::error::{Result, ScraperError};
use crate::types::{RawDocument, RawResultRecord, RequestSpec};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

pub use california::{CaliforniaContests, CaliforniaMeasures};
pub use oregon::OregonSource;

/// Core trait that every election-results data source implements
#[async_trait::async_trait]
pub trait RecordSource: Send + Sync {
    /// Service name used in logs and `Upstream` errors
    fn source_name(&self) -> &'static str;

    /// Requests needed to cover the contest group, in fetch order
    fn requests(&self) -> Result<Vec<RequestSpec>>;

    /// Fetch one raw document. Persisting it is the caller's job.
    async fn fetch(&self, request: &RequestSpec) -> Result<RawDocument>;

    /// Flatten one document into per-option records
    fn extract_records(&self, document: &RawDocument) -> Result<Vec<RawResultRecord>>;
}

/// GET through the port and parse JSON; non-2xx becomes `Upstream`.
pub async fn fetch_json(
    http: &dyn HttpClientPort,
    service: &str,
    request: &RequestSpec,
) -> Result<RawDocument> {
    let resp = http.get(request).await?;
    if !resp.is_success() {
        return Err(ScraperError::Upstream {
            service: service.to_string(),
            url: request.display_url(),
            status: resp.status,
        });
    }
    debug!(
        "{} answered {} bytes ({})",
        service,
        resp.bytes.len(),
        resp.content_type
    );
    Ok(serde_json::from_slice(&resp.bytes)?)
}

/// Pick the source implementation configured for a contest group.
pub fn build_source(
    group: &ContestGroup,
    endpoints: &EndpointConfig,
    http: Arc<dyn HttpClientPort>,
) -> Box<dyn RecordSource> {
    match &group.source {
        SourceConfig::CaliforniaMeasures => Box::new(CaliforniaMeasures::new(
            http,
            endpoints.california_measures_url.clone(),
        )),
        SourceConfig::CaliforniaContests { race_ids } => Box::new(CaliforniaContests::new(
            http,
            endpoints.california_query_url.clone(),
            race_ids.clone(),
        )),
        SourceConfig::Oregon(oregon) => Box::new(OregonSource::new(
            http,
            endpoints.oregon_map_data_url.clone(),
            oregon.clone(),
        )),
    }
}

/// Identifier fields arrive as either JSON strings or numbers.
pub(crate) fn id_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Deserialize one array element, reporting shape problems as malformed records.
pub(crate) fn parse_entry<T: serde::de::DeserializeOwned>(
    entry: &Value,
    what: &str,
    index: usize,
) -> Result<T> {
    serde_json::from_value(entry.clone())
        .map_err(|e| ScraperError::malformed(format!("{} #{}: {}", what, index, e)))
}

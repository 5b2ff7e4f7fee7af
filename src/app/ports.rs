use crate::error::Result;
use crate::pipeline::storage::ResultTable;
use crate::types::RequestSpec;
use async_trait::async_trait;

// Fetch-side port
#[async_trait]
pub trait HttpClientPort: Send + Sync {
    async fn get(&self, request: &RequestSpec) -> Result<HttpGetResult>;
}

#[derive(Clone, Debug)]
pub struct HttpGetResult {
    pub status: u16,
    pub bytes: Vec<u8>,
    pub content_type: String,
}

impl HttpGetResult {
    pub fn is_success(&self) -> bool {
        (200..=299).contains(&self.status)
    }
}

/// Charting service boundary. A run calls all three, in order, per destination.
#[async_trait]
pub trait PublisherPort: Send + Sync {
    async fn upload_table(&self, destination: &str, table: &ResultTable) -> Result<()>;
    async fn annotate(&self, destination: &str, note: &str) -> Result<()>;
    async fn publish(&self, destination: &str) -> Result<()>;
}

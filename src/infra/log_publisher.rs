use crate::app::ports::PublisherPort;
use crate::error::Result;
use crate::pipeline::storage::ResultTable;
use async_trait::async_trait;
use tracing::info;

/// Dry-run publisher: logs what would be sent and touches nothing remote.
pub struct LogPublisher;

#[async_trait]
impl PublisherPort for LogPublisher {
    async fn upload_table(&self, destination: &str, table: &ResultTable) -> Result<()> {
        info!(
            "[dry-run] would upload {} rows ({} columns) to chart {}",
            table.len(),
            table.schema().columns().len(),
            destination
        );
        Ok(())
    }

    async fn annotate(&self, destination: &str, note: &str) -> Result<()> {
        info!("[dry-run] would annotate chart {} with \"{}\"", destination, note);
        Ok(())
    }

    async fn publish(&self, destination: &str) -> Result<()> {
        info!("[dry-run] would republish chart {}", destination);
        Ok(())
    }
}

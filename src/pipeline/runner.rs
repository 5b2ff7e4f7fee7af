use crate::apis::build_source;
use crate::app::ports::{HttpClientPort, PublisherPort};
use crate::config::{ContestGroup, EndpointConfig};
use crate::pipeline::orchestrator::{Pipeline, PipelineFailure, PipelineResult, PipelineSettings};
use std::sync::Arc;
use tracing::{info, warn};

/// Outcome of one pass over the selected contest groups
#[derive(Debug, Default)]
pub struct RunSummary {
    pub completed: Vec<PipelineResult>,
    pub failed: Vec<PipelineFailure>,
}

impl RunSummary {
    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn exit_code(&self) -> i32 {
        if self.all_succeeded() {
            0
        } else {
            1
        }
    }
}

/// Run every group in order. A failed group is recorded and the next one
/// still runs.
pub async fn run_groups(
    groups: &[&ContestGroup],
    endpoints: &EndpointConfig,
    http: Arc<dyn HttpClientPort>,
    publisher: Arc<dyn PublisherPort>,
    settings: &PipelineSettings,
) -> RunSummary {
    let mut summary = RunSummary::default();

    for group in groups {
        let source = build_source(group, endpoints, http.clone());
        match Pipeline::new(group, source, publisher.clone(), settings)
            .run()
            .await
        {
            Ok(result) => summary.completed.push(result),
            Err(failure) => summary.failed.push(failure),
        }
    }

    info!(
        "Run finished: {} contest groups published, {} failed",
        summary.completed.len(),
        summary.failed.len()
    );
    for failure in &summary.failed {
        warn!("{}", failure);
    }
    summary
}

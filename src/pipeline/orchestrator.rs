use crate::apis::RecordSource;
use crate::app::ports::PublisherPort;
use crate::clock::RunClock;
use crate::config::{Config, ContestGroup};
use crate::error::{Result, ScraperError};
use crate::metrics::PipelineMetrics;
use crate::pipeline::processing::{CandidateNormalizer, MeasurePairer};
use crate::pipeline::storage::{KeyedAccumulator, ResultTable, Snapshot};
use crate::types::RawResultRecord;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Where a contest-group run currently is. `Failed` is reachable from every
/// non-terminal stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Fetching,
    Transforming,
    Accumulating,
    Tabulating,
    Publishing,
    Done,
    Failed,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Fetching => "fetching",
            PipelineStage::Transforming => "transforming",
            PipelineStage::Accumulating => "accumulating",
            PipelineStage::Tabulating => "tabulating",
            PipelineStage::Publishing => "publishing",
            PipelineStage::Done => "done",
            PipelineStage::Failed => "failed",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Run-wide settings every pipeline shares
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub output_dir: PathBuf,
    pub snapshot_dir: PathBuf,
    pub note_prefix: String,
    pub clock: RunClock,
}

impl PipelineSettings {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            output_dir: config.output_dir.clone(),
            snapshot_dir: config.snapshots.dir.clone(),
            note_prefix: config.publisher.note_prefix.clone(),
            clock: RunClock::new(config.timezone()?),
        })
    }
}

/// Result of a complete pipeline run
#[derive(Debug, Serialize)]
pub struct PipelineResult {
    pub group: String,
    pub run_id: String,
    pub rows: usize,
    pub csv_path: PathBuf,
    pub snapshot_path: PathBuf,
    /// Every stage entered, in order, ending with `Done`
    pub stages: Vec<PipelineStage>,
}

/// A contest group that did not reach `Done`
#[derive(Debug, thiserror::Error)]
#[error("contest group {group} failed while {stage}: {error}")]
pub struct PipelineFailure {
    pub group: String,
    pub stage: PipelineStage,
    #[source]
    pub error: ScraperError,
}

/// Drives one contest group from fetch to publish. Each instance is used
/// for a single run; nothing carries over between groups.
pub struct Pipeline<'a> {
    group: &'a ContestGroup,
    source: Box<dyn RecordSource>,
    publisher: Arc<dyn PublisherPort>,
    settings: &'a PipelineSettings,
    stage: PipelineStage,
    stages: Vec<PipelineStage>,
    snapshot: Snapshot,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        group: &'a ContestGroup,
        source: Box<dyn RecordSource>,
        publisher: Arc<dyn PublisherPort>,
        settings: &'a PipelineSettings,
    ) -> Self {
        let snapshot = Snapshot::new(group.key.clone(), settings.clock.snapshot_stamp());
        Self {
            group,
            source,
            publisher,
            settings,
            stage: PipelineStage::Fetching,
            stages: Vec::new(),
            snapshot,
        }
    }

    pub async fn run(mut self) -> std::result::Result<PipelineResult, PipelineFailure> {
        let run_id = Uuid::new_v4().to_string();
        let span = info_span!("pipeline", group = %self.group.key, run_id = %run_id);
        async move {
            PipelineMetrics::record_run(&self.group.key);
            info!("Starting {} ({})", self.group.title, self.source.source_name());

            match self.execute(&run_id).await {
                Ok(result) => {
                    info!(
                        "Published {} rows to chart {}",
                        result.rows, self.group.destination
                    );
                    Ok(result)
                }
                Err(error) => Err(self.fail(error)),
            }
        }
        .instrument(span)
        .await
    }

    fn enter(&mut self, stage: PipelineStage) {
        debug!("{} -> {}", self.stage, stage);
        self.stage = stage;
        self.stages.push(stage);
    }

    fn fail(&mut self, error: ScraperError) -> PipelineFailure {
        let stage = self.stage;
        self.stage = PipelineStage::Failed;
        self.stages.push(PipelineStage::Failed);
        PipelineMetrics::record_failure(&self.group.key, stage.as_str());
        error!("Contest group {} failed while {}: {}", self.group.key, stage, error);

        // Keep whatever was fetched so the failure can be inspected later
        let before_persist = matches!(
            stage,
            PipelineStage::Fetching | PipelineStage::Transforming | PipelineStage::Accumulating
        );
        if before_persist && !self.snapshot.documents().is_empty() {
            if let Err(e) = self.snapshot.persist(&self.settings.snapshot_dir) {
                warn!("Could not save snapshot for failed run: {}", e);
            }
        }

        PipelineFailure {
            group: self.group.key.clone(),
            stage,
            error,
        }
    }

    async fn execute(&mut self, run_id: &str) -> Result<PipelineResult> {
        self.enter(PipelineStage::Fetching);
        let requests = self.source.requests()?;
        let accumulate = requests.len() > 1;
        let mut records_by_key: KeyedAccumulator<Vec<RawResultRecord>> = KeyedAccumulator::new();

        for (i, request) in requests.iter().enumerate() {
            if i > 0 {
                self.enter(PipelineStage::Fetching);
            }
            let started = Instant::now();
            let document = self.source.fetch(request).await?;
            PipelineMetrics::record_fetch_duration(
                self.source.source_name(),
                started.elapsed().as_secs_f64(),
            );
            self.snapshot.merge(&request.key, document.clone());

            self.enter(PipelineStage::Transforming);
            let records = self.source.extract_records(&document)?;
            debug!("{}: {} records", request.key, records.len());

            if accumulate {
                self.enter(PipelineStage::Accumulating);
            }
            records_by_key.merge(request.key.clone(), records);
        }
        let snapshot_path = self.snapshot.persist(&self.settings.snapshot_dir)?;

        self.enter(PipelineStage::Tabulating);
        let records: Vec<RawResultRecord> = records_by_key.into_values().flatten().collect();
        let table = self.tabulate(&records)?;
        if table.is_empty() {
            warn!("Contest group {} produced no rows", self.group.key);
        }
        let csv_path = self.settings.output_dir.join(&self.group.output_file);
        table.write_csv(&csv_path)?;
        info!("Wrote {} rows to {}", table.len(), csv_path.display());

        self.enter(PipelineStage::Publishing);
        let destination = self.group.destination.as_str();
        let note = self.settings.clock.freshness_note(&self.settings.note_prefix);
        self.publisher.upload_table(destination, &table).await?;
        self.publisher.annotate(destination, &note).await?;
        self.publisher.publish(destination).await?;
        PipelineMetrics::record_rows_published(&self.group.key, table.len());

        self.enter(PipelineStage::Done);
        Ok(PipelineResult {
            group: self.group.key.clone(),
            run_id: run_id.to_string(),
            rows: table.len(),
            csv_path,
            snapshot_path,
            stages: self.stages.clone(),
        })
    }

    /// Route records through the transform the schema calls for. Measures
    /// are always ordered by label unless the group names another column.
    fn tabulate(&self, records: &[RawResultRecord]) -> Result<ResultTable> {
        let group = self.group;
        let schema = group.output_schema();
        let rows = if schema.is_measures() {
            MeasurePairer::new(
                group.percent_scale,
                group.measure_label.clone(),
                group.on_pairing_gap,
            )
            .pair(records)?
        } else {
            CandidateNormalizer::new(group.percent_scale, group.expand_party_codes)
                .normalize(records, schema.includes_party())?
        };

        let sort_column = match &group.sort_by {
            Some(column) => Some(column.clone()),
            None if schema.is_measures() => Some(schema.label_column().to_string()),
            None => None,
        };

        let mut table = ResultTable::new(schema);
        table.extend(rows);
        if let Some(column) = sort_column {
            table.sort_by(&column, true)?;
        }
        Ok(table)
    }
}

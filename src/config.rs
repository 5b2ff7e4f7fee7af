use crate::clock::parse_timezone;
use crate::constants::{
    CALIFORNIA_MEASURES_URL, CALIFORNIA_QUERY_URL, COL_MEASURE, DATAWRAPPER_API_URL,
    DATAWRAPPER_KEY_ENV, OREGON_MAP_DATA_URL,
};
use crate::error::{Result, ScraperError};
use crate::pipeline::processing::measure_pairer::{GapPolicy, MeasureLabelRule};
use crate::types::{OutputSchema, PercentScale, SchemaKind};
use chrono_tz::Tz;
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "config/elections.toml";

/// Whole-run configuration: every contest group plus the shared HTTP,
/// publisher and snapshot settings.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub publisher: PublisherConfig,
    #[serde(default)]
    pub snapshots: SnapshotConfig,
    #[serde(default)]
    pub endpoints: EndpointConfig,
    #[serde(default)]
    pub groups: Vec<ContestGroup>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_seconds: u64,
    pub max_retries: u32,
    pub backoff_ms: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            max_retries: 2,
            backoff_ms: 500,
        }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PublisherConfig {
    pub base_url: String,
    /// Name of the environment variable holding the API token
    pub api_key_env: String,
    pub note_prefix: String,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            base_url: DATAWRAPPER_API_URL.to_string(),
            api_key_env: DATAWRAPPER_KEY_ENV.to_string(),
            note_prefix: "Last updated:".to_string(),
        }
    }
}

impl PublisherConfig {
    pub fn api_key(&self) -> Result<String> {
        match std::env::var(&self.api_key_env) {
            Ok(key) if !key.trim().is_empty() => Ok(key),
            _ => Err(ScraperError::config(format!(
                "charting credential not set: export {}",
                self.api_key_env
            ))),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SnapshotConfig {
    pub dir: PathBuf,
    pub retention_hours: u64,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("jsons"),
            retention_hours: 24,
        }
    }
}

impl SnapshotConfig {
    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_hours * 3600)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    pub california_measures_url: String,
    pub california_query_url: String,
    pub oregon_map_data_url: String,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            california_measures_url: CALIFORNIA_MEASURES_URL.to_string(),
            california_query_url: CALIFORNIA_QUERY_URL.to_string(),
            oregon_map_data_url: OREGON_MAP_DATA_URL.to_string(),
        }
    }
}

/// One set of races sharing an output table and a chart.
#[derive(Debug, Clone, Deserialize)]
pub struct ContestGroup {
    pub key: String,
    pub title: String,
    /// Datawrapper chart id
    pub destination: String,
    pub output_file: String,
    pub schema: SchemaKind,
    #[serde(default = "default_label_header")]
    pub label_header: String,
    pub percent_scale: PercentScale,
    #[serde(default)]
    pub expand_party_codes: bool,
    #[serde(default)]
    pub on_pairing_gap: GapPolicy,
    #[serde(default)]
    pub measure_label: MeasureLabelRule,
    #[serde(default)]
    pub sort_by: Option<String>,
    pub source: SourceConfig,
}

impl ContestGroup {
    pub fn output_schema(&self) -> OutputSchema {
        OutputSchema::new(self.schema, self.label_header.clone())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceConfig {
    /// Pre-paired proposition results
    CaliforniaMeasures,
    /// Candidate contests queried by race id
    CaliforniaContests { race_ids: Vec<String> },
    Oregon(OregonSourceConfig),
}

#[derive(Debug, Clone, Deserialize)]
pub struct OregonSourceConfig {
    pub race_type: RaceTypeRule,
    pub category: String,
    #[serde(default)]
    pub race_ids: Vec<String>,
    /// One race id per line, merged into `race_ids` at load time
    #[serde(default)]
    pub race_ids_file: Option<PathBuf>,
    /// Overrides/additions to the default auxiliary query parameters
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

/// Selects the Oregon `type` parameter for a race id.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum RaceTypeRule {
    Fixed(String),
    /// Numeric ids at or above `threshold` use `at_or_above`, the rest `below`
    Threshold {
        threshold: u64,
        at_or_above: String,
        below: String,
    },
}

impl RaceTypeRule {
    pub fn race_type_for(&self, race_id: &str) -> Result<&str> {
        match self {
            RaceTypeRule::Fixed(race_type) => Ok(race_type),
            RaceTypeRule::Threshold {
                threshold,
                at_or_above,
                below,
            } => {
                let id: u64 = race_id.trim().parse().map_err(|_| {
                    ScraperError::config(format!(
                        "race id '{}' must be numeric for a threshold race_type",
                        race_id
                    ))
                })?;
                Ok(if id >= *threshold { at_or_above } else { below })
            }
        }
    }
}

fn default_timezone() -> String {
    "US/Pacific".to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_label_header() -> String {
    COL_MEASURE.to_string()
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            ScraperError::config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        Self::from_toml_str(&content, base_dir)
    }

    /// Parse and validate; `base_dir` anchors relative `race_ids_file` paths.
    pub fn from_toml_str(content: &str, base_dir: &Path) -> Result<Self> {
        let mut config: Config = toml::from_str(content)?;
        config.resolve_race_id_files(base_dir)?;
        config.validate()?;
        Ok(config)
    }

    pub fn timezone(&self) -> Result<Tz> {
        parse_timezone(&self.timezone)
    }

    /// Groups in configuration order, optionally restricted to `keys`.
    pub fn select_groups(&self, keys: Option<&[String]>) -> Result<Vec<&ContestGroup>> {
        let Some(keys) = keys else {
            return Ok(self.groups.iter().collect());
        };
        for key in keys {
            if !self.groups.iter().any(|g| &g.key == key) {
                return Err(ScraperError::config(format!(
                    "unknown contest group '{}'",
                    key
                )));
            }
        }
        Ok(self
            .groups
            .iter()
            .filter(|g| keys.contains(&g.key))
            .collect())
    }

    fn resolve_race_id_files(&mut self, base_dir: &Path) -> Result<()> {
        for group in &mut self.groups {
            let SourceConfig::Oregon(oregon) = &mut group.source else {
                continue;
            };
            let Some(file) = &oregon.race_ids_file else {
                continue;
            };
            let path = if file.is_absolute() {
                file.clone()
            } else {
                base_dir.join(file)
            };
            let content = fs::read_to_string(&path).map_err(|e| {
                ScraperError::config(format!(
                    "group {}: failed to read race id file '{}': {}",
                    group.key,
                    path.display(),
                    e
                ))
            })?;
            oregon.race_ids.extend(
                content
                    .lines()
                    .map(str::trim)
                    .filter(|line| !line.is_empty() && !line.starts_with('#'))
                    .map(str::to_string),
            );
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        self.timezone()?;
        if self.groups.is_empty() {
            return Err(ScraperError::config("no contest groups configured"));
        }

        let mut seen = HashSet::new();
        for group in &self.groups {
            if !seen.insert(group.key.as_str()) {
                return Err(ScraperError::config(format!(
                    "duplicate contest group key '{}'",
                    group.key
                )));
            }
            validate_group(group)?;
        }
        Ok(())
    }
}

fn validate_group(group: &ContestGroup) -> Result<()> {
    let fail = |msg: String| Err(ScraperError::config(format!("group {}: {}", group.key, msg)));

    if group.destination.trim().is_empty() {
        return fail("destination is empty".into());
    }
    if group.output_file.trim().is_empty() {
        return fail("output_file is empty".into());
    }

    let measures = group.schema == SchemaKind::Measures;
    match &group.source {
        SourceConfig::CaliforniaMeasures if !measures => {
            return fail("california_measures only feeds a measures schema".into());
        }
        SourceConfig::CaliforniaContests { .. } if measures => {
            return fail("california_contests cannot feed a measures schema".into());
        }
        SourceConfig::CaliforniaContests { race_ids } if race_ids.is_empty() => {
            return fail("no race ids".into());
        }
        SourceConfig::Oregon(oregon) => {
            if oregon.race_ids.is_empty() {
                return fail("no race ids".into());
            }
            for id in &oregon.race_ids {
                oregon.race_type.race_type_for(id)?;
            }
        }
        _ => {}
    }

    if let MeasureLabelRule::Prefix { prefix } = &group.measure_label {
        if prefix.is_empty() {
            return fail("measure_label prefix is empty".into());
        }
    }

    if let Some(column) = &group.sort_by {
        let columns = group.output_schema().columns();
        if !columns.contains(column) {
            return fail(format!(
                "sort_by '{}' is not one of {:?}",
                column, columns
            ));
        }
    }
    Ok(())
}

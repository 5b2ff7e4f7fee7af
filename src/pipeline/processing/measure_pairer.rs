use crate::constants::{NO_OPTION, YES_OPTION};
use crate::error::{Result, ScraperError};
use crate::types::{MeasureRow, NormalizedRow, PercentScale, RawResultRecord};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Measure numbers are embedded in race names as "Measure" plus a short number.
static MEASURE_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Measure \S{1,3}").expect("measure number pattern"));

/// What to do when only one side of a Yes/No measure is in the batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapPolicy {
    /// Fail the contest group with `PairingGap`
    #[default]
    Error,
    /// Emit the row with the missing side left empty
    Blank,
}

/// How the measure label is derived from the upstream race name.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum MeasureLabelRule {
    /// First "Measure NNN" substring of the race name
    #[default]
    Extract,
    /// Race name is a zero-padded number ("001" -> "1")
    Number,
    /// Fixed prefix + race name ("Measure " + "15-123")
    Prefix { prefix: String },
}

impl MeasureLabelRule {
    pub fn label(&self, race_name: &str) -> String {
        let name = race_name.trim();
        match self {
            MeasureLabelRule::Extract => match MEASURE_NUMBER.find(name) {
                Some(m) => m.as_str().trim_end().to_string(),
                None => {
                    warn!("No measure number in race name '{}', using it verbatim", name);
                    name.to_string()
                }
            },
            MeasureLabelRule::Number => {
                let stripped = name.trim_start_matches('0');
                if stripped.is_empty() && !name.is_empty() {
                    "0".to_string()
                } else {
                    stripped.to_string()
                }
            }
            MeasureLabelRule::Prefix { prefix } => format!("{}{}", prefix, name),
        }
    }
}

/// Rebuilds Yes/No ballot-measure outcomes from per-option records.
#[derive(Debug, Clone)]
pub struct MeasurePairer {
    scale: PercentScale,
    label_rule: MeasureLabelRule,
    on_gap: GapPolicy,
}

impl MeasurePairer {
    pub fn new(scale: PercentScale, label_rule: MeasureLabelRule, on_gap: GapPolicy) -> Self {
        Self {
            scale,
            label_rule,
            on_gap,
        }
    }

    /// One row per race id, in first-seen order. Callers sort before publishing.
    pub fn pair(&self, records: &[RawResultRecord]) -> Result<Vec<NormalizedRow>> {
        let groups = group_by_race(records);
        debug!(
            "Pairing {} records into {} measures",
            records.len(),
            groups.len()
        );
        groups
            .into_iter()
            .map(|(race_id, group)| self.pair_group(race_id, &group).map(NormalizedRow::Measure))
            .collect()
    }

    fn pair_group(&self, race_id: &str, group: &[&RawResultRecord]) -> Result<MeasureRow> {
        let race_name = group
            .iter()
            .find_map(|r| r.race_name.as_deref())
            .ok_or_else(|| {
                ScraperError::malformed(format!("race {}: missing race name", race_id))
            })?;

        let (yes_votes, yes_percent) = self.side(race_id, find_option(group, YES_OPTION), YES_OPTION)?;
        let (no_votes, no_percent) = self.side(race_id, find_option(group, NO_OPTION), NO_OPTION)?;

        Ok(MeasureRow {
            measure: self.label_rule.label(race_name),
            yes_votes,
            yes_percent,
            no_votes,
            no_percent,
        })
    }

    fn side(
        &self,
        race_id: &str,
        record: Option<&RawResultRecord>,
        option: &'static str,
    ) -> Result<(Option<u64>, Option<f64>)> {
        match record {
            Some(record) => Ok((
                Some(record.require_votes()?),
                Some(record.require_percent(self.scale)?),
            )),
            None => match self.on_gap {
                GapPolicy::Error => Err(ScraperError::PairingGap {
                    race_id: race_id.to_string(),
                    missing: option,
                }),
                GapPolicy::Blank => {
                    warn!("Measure {} has no \"{}\" record, leaving it blank", race_id, option);
                    Ok((None, None))
                }
            },
        }
    }
}

/// First record whose option label is exactly `option`.
fn find_option<'a>(group: &[&'a RawResultRecord], option: &str) -> Option<&'a RawResultRecord> {
    group
        .iter()
        .copied()
        .find(|r| r.option_label.as_deref() == Some(option))
}

fn group_by_race(records: &[RawResultRecord]) -> Vec<(&str, Vec<&RawResultRecord>)> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<(&str, Vec<&RawResultRecord>)> = Vec::new();
    for record in records {
        let race_id = record.race_id.as_str();
        match index.get(race_id) {
            Some(&i) => groups[i].1.push(record),
            None => {
                index.insert(race_id, groups.len());
                groups.push((race_id, vec![record]));
            }
        }
    }
    groups
}

use super::{fetch_json, id_text, parse_entry, RecordSource};
use crate::app::ports::HttpClientPort;
use crate::constants::{CALIFORNIA_SOS, NO_OPTION, YES_OPTION};
use crate::error::{Result, ScraperError};
use crate::types::{RawDocument, RawPercent, RawResultRecord, RequestSpec, VoteCount};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, instrument};

/// Statewide propositions. The feed already pairs Yes and No per
/// proposition; entries are split back into two option records so every
/// measures group goes through the same pairing step.
pub struct CaliforniaMeasures {
    http: Arc<dyn HttpClientPort>,
    url: String,
}

impl CaliforniaMeasures {
    pub fn new(http: Arc<dyn HttpClientPort>, url: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct BallotMeasure {
    #[serde(rename = "Number", default)]
    number: Value,
    #[serde(rename = "yesVotes")]
    yes_votes: Option<VoteCount>,
    #[serde(rename = "yesPercent")]
    yes_percent: Option<RawPercent>,
    #[serde(rename = "noVotes")]
    no_votes: Option<VoteCount>,
    #[serde(rename = "noPercent")]
    no_percent: Option<RawPercent>,
}

#[async_trait::async_trait]
impl RecordSource for CaliforniaMeasures {
    fn source_name(&self) -> &'static str {
        CALIFORNIA_SOS
    }

    fn requests(&self) -> Result<Vec<RequestSpec>> {
        Ok(vec![RequestSpec::new("ballot-measures", self.url.clone())])
    }

    #[instrument(skip(self))]
    async fn fetch(&self, request: &RequestSpec) -> Result<RawDocument> {
        fetch_json(self.http.as_ref(), CALIFORNIA_SOS, request).await
    }

    fn extract_records(&self, document: &RawDocument) -> Result<Vec<RawResultRecord>> {
        let measures = document
            .get("ballot-measures")
            .and_then(Value::as_array)
            .ok_or_else(|| ScraperError::malformed("response has no \"ballot-measures\" array"))?;

        let mut records = Vec::with_capacity(measures.len() * 2);
        for (i, entry) in measures.iter().enumerate() {
            let measure: BallotMeasure = parse_entry(entry, "ballot measure", i)?;
            let number = id_text(&measure.number).ok_or_else(|| {
                ScraperError::malformed(format!("ballot measure #{}: missing Number", i))
            })?;
            let side = |option: &str, votes: Option<VoteCount>, percent: Option<RawPercent>| {
                RawResultRecord {
                    race_id: number.clone(),
                    race_name: Some(number.clone()),
                    option_label: Some(option.to_string()),
                    votes,
                    percent,
                    ..Default::default()
                }
            };
            records.push(side(YES_OPTION, measure.yes_votes, measure.yes_percent));
            records.push(side(NO_OPTION, measure.no_votes, measure.no_percent));
        }
        info!("Extracted {} propositions", measures.len());
        Ok(records)
    }
}

/// Candidate contests (state assembly, state senate) queried by race id.
pub struct CaliforniaContests {
    http: Arc<dyn HttpClientPort>,
    url: String,
    race_ids: Vec<String>,
}

impl CaliforniaContests {
    pub fn new(http: Arc<dyn HttpClientPort>, url: impl Into<String>, race_ids: Vec<String>) -> Self {
        Self {
            http,
            url: url.into(),
            race_ids,
        }
    }
}

#[derive(Debug, Deserialize)]
struct Contest {
    #[serde(rename = "raceTitle")]
    race_title: Option<String>,
    #[serde(default)]
    candidates: Vec<ContestCandidate>,
}

#[derive(Debug, Deserialize)]
struct ContestCandidate {
    #[serde(rename = "Name")]
    name: Option<String>,
    #[serde(rename = "Party")]
    party: Option<String>,
    #[serde(rename = "Votes")]
    votes: Option<VoteCount>,
    #[serde(rename = "Percent")]
    percent: Option<RawPercent>,
    incumbent: Option<bool>,
}

#[async_trait::async_trait]
impl RecordSource for CaliforniaContests {
    fn source_name(&self) -> &'static str {
        CALIFORNIA_SOS
    }

    /// A single query carrying every race id as a JSON array in `r`.
    fn requests(&self) -> Result<Vec<RequestSpec>> {
        let ids = serde_json::to_string(&self.race_ids)?;
        Ok(vec![RequestSpec::new("query", self.url.clone()).with_param("r", ids)])
    }

    #[instrument(skip(self))]
    async fn fetch(&self, request: &RequestSpec) -> Result<RawDocument> {
        fetch_json(self.http.as_ref(), CALIFORNIA_SOS, request).await
    }

    fn extract_records(&self, document: &RawDocument) -> Result<Vec<RawResultRecord>> {
        let contests = document
            .as_array()
            .ok_or_else(|| ScraperError::malformed("contest query did not return an array"))?;

        let mut records = Vec::new();
        for (i, entry) in contests.iter().enumerate() {
            let contest: Contest = parse_entry(entry, "contest", i)?;
            let race_id = contest
                .race_title
                .clone()
                .unwrap_or_else(|| format!("contest-{}", i));
            for candidate in contest.candidates {
                records.push(RawResultRecord {
                    race_id: race_id.clone(),
                    race_name: contest.race_title.clone(),
                    option_label: candidate.name,
                    party: candidate.party,
                    votes: candidate.votes,
                    percent: candidate.percent,
                    incumbent: candidate.incumbent,
                });
            }
        }
        info!(
            "Extracted {} candidates across {} contests",
            records.len(),
            contests.len()
        );
        Ok(records)
    }
}

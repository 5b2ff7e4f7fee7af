use crate::constants::{
    COL_CANDIDATE, COL_MEASURE, COL_NO_PERCENT, COL_NO_VOTES, COL_PARTY, COL_PERCENT, COL_RACE,
    COL_VOTES, COL_YES_PERCENT, COL_YES_VOTES,
};
use crate::error::{Result, ScraperError};
use serde::{Deserialize, Serialize};

/// Raw JSON document as returned by an upstream API
pub type RawDocument = serde_json::Value;

/// How a source reports percentages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PercentScale {
    /// 0..=1, scaled by 100 on normalization
    Fraction,
    /// Already 0..=100
    Percent,
}

impl PercentScale {
    pub fn to_percent(self, value: f64) -> f64 {
        match self {
            PercentScale::Fraction => value * 100.0,
            PercentScale::Percent => value,
        }
    }
}

/// Vote count as it arrives on the wire: a JSON integer or a string such as `"12,345"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VoteCount {
    Count(u64),
    Text(String),
}

impl VoteCount {
    pub fn value(&self) -> Result<u64> {
        match self {
            VoteCount::Count(n) => Ok(*n),
            VoteCount::Text(text) => parse_vote_text(text),
        }
    }
}

/// Strip thousands separators and whitespace, then parse.
pub fn parse_vote_text(text: &str) -> Result<u64> {
    let cleaned: String = text
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .collect();
    cleaned.parse::<u64>().map_err(|_| {
        ScraperError::malformed(format!("vote count '{}' is not a whole number", text))
    })
}

/// Percentage as it arrives on the wire, before any scaling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawPercent {
    Value(f64),
    Text(String),
}

impl RawPercent {
    pub fn value(&self) -> Result<f64> {
        match self {
            RawPercent::Value(v) => Ok(*v),
            RawPercent::Text(text) => {
                let trimmed = text.trim().trim_end_matches('%').trim();
                trimmed.parse::<f64>().map_err(|_| {
                    ScraperError::malformed(format!("percentage '{}' is not a number", text))
                })
            }
        }
    }
}

/// One election-option outcome as reported upstream. Everything but the race
/// identifier is optional here; the normalizers decide what is mandatory.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RawResultRecord {
    pub race_id: String,
    pub race_name: Option<String>,
    pub option_label: Option<String>,
    pub party: Option<String>,
    pub votes: Option<VoteCount>,
    pub percent: Option<RawPercent>,
    pub incumbent: Option<bool>,
}

impl RawResultRecord {
    pub fn new(race_id: impl Into<String>) -> Self {
        Self {
            race_id: race_id.into(),
            ..Default::default()
        }
    }

    pub fn with_race_name(mut self, name: impl Into<String>) -> Self {
        self.race_name = Some(name.into());
        self
    }

    pub fn with_option(mut self, label: impl Into<String>) -> Self {
        self.option_label = Some(label.into());
        self
    }

    pub fn with_party(mut self, party: impl Into<String>) -> Self {
        self.party = Some(party.into());
        self
    }

    pub fn with_votes(mut self, votes: u64) -> Self {
        self.votes = Some(VoteCount::Count(votes));
        self
    }

    /// Vote count as the upstream text, e.g. `"12,345"`
    pub fn with_vote_text(mut self, votes: impl Into<String>) -> Self {
        self.votes = Some(VoteCount::Text(votes.into()));
        self
    }

    pub fn with_percent(mut self, percent: f64) -> Self {
        self.percent = Some(RawPercent::Value(percent));
        self
    }

    pub fn with_incumbent(mut self, incumbent: bool) -> Self {
        self.incumbent = Some(incumbent);
        self
    }

    pub fn require_race_name(&self) -> Result<&str> {
        self.race_name
            .as_deref()
            .ok_or_else(|| self.missing("race name"))
    }

    pub fn require_option_label(&self) -> Result<&str> {
        self.option_label
            .as_deref()
            .ok_or_else(|| self.missing("candidate/option name"))
    }

    pub fn require_votes(&self) -> Result<u64> {
        self.votes
            .as_ref()
            .ok_or_else(|| self.missing("vote count"))?
            .value()
    }

    /// Percent scaled into 0..=100 according to `scale`.
    pub fn require_percent(&self, scale: PercentScale) -> Result<f64> {
        let raw = self
            .percent
            .as_ref()
            .ok_or_else(|| self.missing("percentage"))?
            .value()?;
        let percent = scale.to_percent(raw);
        if !(0.0..=100.0).contains(&percent) {
            return Err(ScraperError::malformed(format!(
                "race {}: percentage {} is outside 0-100 after {:?} scaling",
                self.race_id, raw, scale
            )));
        }
        Ok(percent)
    }

    fn missing(&self, field: &str) -> ScraperError {
        ScraperError::malformed(format!("race {}: missing {}", self.race_id, field))
    }
}

/// Yes/No outcome of one ballot measure. A side is `None` only when the
/// pairing gap policy allows blank cells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasureRow {
    pub measure: String,
    pub yes_votes: Option<u64>,
    pub yes_percent: Option<f64>,
    pub no_votes: Option<u64>,
    pub no_percent: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateRow {
    pub race: String,
    pub candidate: String,
    pub party: Option<String>,
    pub votes: u64,
    pub percent: f64,
}

/// One output row of a contest group's table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NormalizedRow {
    Measure(MeasureRow),
    Candidate(CandidateRow),
}

impl NormalizedRow {
    pub fn contest_label(&self) -> &str {
        match self {
            NormalizedRow::Measure(row) => &row.measure,
            NormalizedRow::Candidate(row) => &row.race,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaKind {
    /// `{<label>, Yes Votes, Yes %, No Votes, No %}`
    Measures,
    /// `{Race, Candidate, Votes, Percent}`
    Candidates,
    /// `{Race, Candidate, Party, Votes, Percent}`
    CandidatesWithParty,
}

/// Column layout of a contest group's output table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputSchema {
    pub kind: SchemaKind,
    /// Header of the first column of a measures table ("Measure", "Proposition")
    pub label_header: String,
}

impl OutputSchema {
    pub fn new(kind: SchemaKind, label_header: impl Into<String>) -> Self {
        Self {
            kind,
            label_header: label_header.into(),
        }
    }

    pub fn measures(label_header: impl Into<String>) -> Self {
        Self::new(SchemaKind::Measures, label_header)
    }

    pub fn candidates() -> Self {
        Self::new(SchemaKind::Candidates, COL_MEASURE)
    }

    pub fn candidates_with_party() -> Self {
        Self::new(SchemaKind::CandidatesWithParty, COL_MEASURE)
    }

    pub fn columns(&self) -> Vec<String> {
        let cols: Vec<&str> = match self.kind {
            SchemaKind::Measures => vec![
                self.label_header.as_str(),
                COL_YES_VOTES,
                COL_YES_PERCENT,
                COL_NO_VOTES,
                COL_NO_PERCENT,
            ],
            SchemaKind::Candidates => vec![COL_RACE, COL_CANDIDATE, COL_VOTES, COL_PERCENT],
            SchemaKind::CandidatesWithParty => {
                vec![COL_RACE, COL_CANDIDATE, COL_PARTY, COL_VOTES, COL_PERCENT]
            }
        };
        cols.into_iter().map(str::to_string).collect()
    }

    /// Column holding the contest label
    pub fn label_column(&self) -> &str {
        match self.kind {
            SchemaKind::Measures => &self.label_header,
            _ => COL_RACE,
        }
    }

    pub fn includes_party(&self) -> bool {
        self.kind == SchemaKind::CandidatesWithParty
    }

    pub fn is_measures(&self) -> bool {
        self.kind == SchemaKind::Measures
    }
}

/// Parameterized upstream request. `key` identifies the request within a
/// contest group (race id for per-race calls) and keys snapshot accumulation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestSpec {
    pub key: String,
    pub url: String,
    pub query: Vec<(String, String)>,
}

impl RequestSpec {
    pub fn new(key: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            url: url.into(),
            query: Vec::new(),
        }
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Unencoded URL, for logs and error messages
    pub fn display_url(&self) -> String {
        if self.query.is_empty() {
            return self.url.clone();
        }
        let params: Vec<String> = self
            .query
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        format!("{}?{}", self.url, params.join("&"))
    }
}

use crate::constants::{
    COL_CANDIDATE, COL_NO_PERCENT, COL_NO_VOTES, COL_PARTY, COL_PERCENT, COL_RACE, COL_VOTES,
    COL_YES_PERCENT, COL_YES_VOTES,
};
use crate::error::{Result, ScraperError};
use crate::types::{CandidateRow, MeasureRow, NormalizedRow, OutputSchema, SchemaKind};
use std::cmp::Ordering;
use std::fs;
use std::path::Path;

/// Ordered output rows of one contest group with a fixed column schema.
/// Built fresh on every run and written out once.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultTable {
    schema: OutputSchema,
    rows: Vec<NormalizedRow>,
}

impl ResultTable {
    pub fn new(schema: OutputSchema) -> Self {
        Self {
            schema,
            rows: Vec::new(),
        }
    }

    pub fn schema(&self) -> &OutputSchema {
        &self.schema
    }

    pub fn rows(&self) -> &[NormalizedRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn append(&mut self, row: NormalizedRow) {
        self.rows.push(row);
    }

    pub fn extend(&mut self, rows: impl IntoIterator<Item = NormalizedRow>) {
        self.rows.extend(rows);
    }

    /// Stable reorder by one column. Numeric cells come first in numeric
    /// order, then the rest in natural order ("Measure 2" before "Measure 10").
    pub fn sort_by(&mut self, column: &str, ascending: bool) -> Result<()> {
        let keys = self
            .rows
            .iter()
            .map(|row| cell(&self.schema, row, column))
            .collect::<Result<Vec<_>>>()?;
        let mut keyed: Vec<(String, NormalizedRow)> =
            keys.into_iter().zip(self.rows.drain(..)).collect();
        keyed.sort_by(|(a, _), (b, _)| {
            let ord = compare_cells(a, b);
            if ascending {
                ord
            } else {
                ord.reverse()
            }
        });
        self.rows = keyed.into_iter().map(|(_, row)| row).collect();
        Ok(())
    }

    /// Header line naming `columns`, then one line per row in that column order.
    pub fn to_delimited_text(&self, columns: &[String]) -> Result<String> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(columns)?;
        for row in &self.rows {
            let record = columns
                .iter()
                .map(|column| cell(&self.schema, row, column))
                .collect::<Result<Vec<_>>>()?;
            writer.write_record(&record)?;
        }
        let bytes = writer.into_inner().map_err(|e| ScraperError::Io(e.into_error()))?;
        String::from_utf8(bytes).map_err(|e| ScraperError::malformed(e.to_string()))
    }

    /// Delimited text using the schema's own column list
    pub fn to_csv(&self) -> Result<String> {
        self.to_delimited_text(&self.schema.columns())
    }

    pub fn write_csv(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, self.to_csv()?)?;
        Ok(())
    }

    /// Re-read text produced by [`ResultTable::to_csv`]. The header must match
    /// the schema exactly.
    pub fn from_delimited_text(schema: OutputSchema, text: &str) -> Result<Self> {
        let mut reader = csv::Reader::from_reader(text.as_bytes());
        let expected = schema.columns();
        let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        if headers != expected {
            return Err(ScraperError::malformed(format!(
                "header {:?} does not match {:?}",
                headers, expected
            )));
        }

        let mut table = ResultTable::new(schema);
        for record in reader.records() {
            let record = record?;
            let field = |i: usize| record.get(i).unwrap_or("");
            let row = match table.schema.kind {
                SchemaKind::Measures => NormalizedRow::Measure(MeasureRow {
                    measure: field(0).to_string(),
                    yes_votes: parse_optional(field(1))?,
                    yes_percent: parse_optional(field(2))?,
                    no_votes: parse_optional(field(3))?,
                    no_percent: parse_optional(field(4))?,
                }),
                SchemaKind::Candidates => NormalizedRow::Candidate(CandidateRow {
                    race: field(0).to_string(),
                    candidate: field(1).to_string(),
                    party: None,
                    votes: parse_required(field(2))?,
                    percent: parse_required(field(3))?,
                }),
                SchemaKind::CandidatesWithParty => NormalizedRow::Candidate(CandidateRow {
                    race: field(0).to_string(),
                    candidate: field(1).to_string(),
                    party: Some(field(2))
                        .filter(|p| !p.is_empty())
                        .map(str::to_string),
                    votes: parse_required(field(3))?,
                    percent: parse_required(field(4))?,
                }),
            };
            table.append(row);
        }
        Ok(table)
    }
}

fn cell(schema: &OutputSchema, row: &NormalizedRow, column: &str) -> Result<String> {
    let value = match (schema.kind, row) {
        (SchemaKind::Measures, NormalizedRow::Measure(m)) => match column {
            c if c == schema.label_header => Some(m.measure.clone()),
            COL_YES_VOTES => Some(optional(m.yes_votes)),
            COL_YES_PERCENT => Some(optional(m.yes_percent.map(percent_text))),
            COL_NO_VOTES => Some(optional(m.no_votes)),
            COL_NO_PERCENT => Some(optional(m.no_percent.map(percent_text))),
            _ => None,
        },
        (SchemaKind::Candidates | SchemaKind::CandidatesWithParty, NormalizedRow::Candidate(c)) => {
            match column {
                COL_RACE => Some(c.race.clone()),
                COL_CANDIDATE => Some(c.candidate.clone()),
                COL_PARTY if schema.includes_party() => {
                    Some(c.party.clone().unwrap_or_default())
                }
                COL_VOTES => Some(c.votes.to_string()),
                COL_PERCENT => Some(percent_text(c.percent)),
                _ => None,
            }
        }
        _ => {
            return Err(ScraperError::malformed(format!(
                "row for '{}' does not fit a {:?} table",
                row.contest_label(),
                schema.kind
            )))
        }
    };
    value.ok_or_else(|| {
        ScraperError::config(format!(
            "unknown column '{}' for a {:?} table",
            column, schema.kind
        ))
    })
}

fn optional<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// One run of digits or of anything else. Digit runs sort before text and
/// compare by value: leading zeros are dropped, then shorter is smaller.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Chunk<'a> {
    Digits(usize, &'a str),
    Text(&'a str),
}

fn chunks(text: &str) -> Vec<Chunk<'_>> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut in_digits = false;
    for (i, c) in text.char_indices() {
        let digit = c.is_ascii_digit();
        if i > start && digit != in_digits {
            out.push(chunk(&text[start..i], in_digits));
            start = i;
        }
        in_digits = digit;
    }
    if start < text.len() {
        out.push(chunk(&text[start..], in_digits));
    }
    out
}

fn chunk(part: &str, digits: bool) -> Chunk<'_> {
    if digits {
        let value = part.trim_start_matches('0');
        Chunk::Digits(value.len(), value)
    } else {
        Chunk::Text(part)
    }
}

// Must stay a total order for every mix of cells, or the sorted table
// would depend on upstream row order.
fn compare_cells(a: &str, b: &str) -> Ordering {
    match (a.parse::<f64>(), b.parse::<f64>()) {
        (Ok(x), Ok(y)) => x.total_cmp(&y),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => chunks(a).cmp(&chunks(b)),
    }
}

/// Percent cell rounded to two decimals, written without trailing zeros
fn percent_text(percent: f64) -> String {
    ((percent * 100.0).round() / 100.0).to_string()
}

fn parse_optional<T: std::str::FromStr>(text: &str) -> Result<Option<T>> {
    if text.is_empty() {
        return Ok(None);
    }
    parse_required(text).map(Some)
}

fn parse_required<T: std::str::FromStr>(text: &str) -> Result<T> {
    text.parse::<T>()
        .map_err(|_| ScraperError::malformed(format!("'{}' is not a number", text)))
}

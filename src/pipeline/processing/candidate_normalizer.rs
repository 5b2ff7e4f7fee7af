use crate::constants::{DISTRICTWIDE_SUFFIX, INCUMBENT_SUFFIX, PARTY_CODES};
use crate::error::Result;
use crate::types::{CandidateRow, NormalizedRow, PercentScale, RawResultRecord};
use tracing::debug;

/// Turns per-candidate records into display-ready rows.
#[derive(Debug, Clone)]
pub struct CandidateNormalizer {
    scale: PercentScale,
    expand_party_codes: bool,
}

impl CandidateNormalizer {
    pub fn new(scale: PercentScale, expand_party_codes: bool) -> Self {
        Self {
            scale,
            expand_party_codes,
        }
    }

    /// Normalize every record, failing on the first one missing a mandatory
    /// field. With `include_party` false the party column is dropped entirely.
    pub fn normalize(
        &self,
        records: &[RawResultRecord],
        include_party: bool,
    ) -> Result<Vec<NormalizedRow>> {
        let rows = records
            .iter()
            .map(|record| self.normalize_one(record, include_party))
            .collect::<Result<Vec<_>>>()?;
        debug!("Normalized {} candidate rows", rows.len());
        Ok(rows)
    }

    fn normalize_one(&self, record: &RawResultRecord, include_party: bool) -> Result<NormalizedRow> {
        let race = strip_districtwide_suffix(record.require_race_name()?);
        let candidate = display_name(record.require_option_label()?, record.incumbent == Some(true));
        let party = if include_party {
            record
                .party
                .as_deref()
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(|p| self.party_label(p))
        } else {
            None
        };

        Ok(NormalizedRow::Candidate(CandidateRow {
            race: race.to_string(),
            candidate,
            party,
            votes: record.require_votes()?,
            percent: record.require_percent(self.scale)?,
        }))
    }

    fn party_label(&self, party: &str) -> String {
        if self.expand_party_codes {
            expand_party_code(party).to_string()
        } else {
            party.to_string()
        }
    }
}

pub fn strip_districtwide_suffix(race_name: &str) -> &str {
    race_name
        .strip_suffix(DISTRICTWIDE_SUFFIX)
        .unwrap_or(race_name)
}

pub fn display_name(name: &str, incumbent: bool) -> String {
    if incumbent {
        format!("{}{}", name, INCUMBENT_SUFFIX)
    } else {
        name.to_string()
    }
}

/// "Dem" -> "Democratic", "Rep" -> "Republican"; anything else unchanged.
pub fn expand_party_code(code: &str) -> &str {
    PARTY_CODES
        .iter()
        .find(|(short, _)| *short == code)
        .map(|(_, long)| *long)
        .unwrap_or(code)
}

use super::{fetch_json, id_text, parse_entry, RecordSource};
use crate::app::ports::HttpClientPort;
use crate::config::OregonSourceConfig;
use crate::constants::{OREGON_DEFAULT_PARAMS, OREGON_SOS};
use crate::error::{Result, ScraperError};
use crate::types::{RawDocument, RawPercent, RawResultRecord, RequestSpec, VoteCount};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Oregon SoS map-data endpoint. One request per race id; every response
/// carries its per-option rows under `"d"`.
pub struct OregonSource {
    http: Arc<dyn HttpClientPort>,
    url: String,
    config: OregonSourceConfig,
}

impl OregonSource {
    pub fn new(http: Arc<dyn HttpClientPort>, url: impl Into<String>, config: OregonSourceConfig) -> Self {
        Self {
            http,
            url: url.into(),
            config,
        }
    }

    fn request_for(&self, race_id: &str) -> Result<RequestSpec> {
        let race_type = self.config.race_type.race_type_for(race_id)?;
        let mut request = RequestSpec::new(race_id, self.url.clone())
            .with_param("type", race_type)
            .with_param("category", self.config.category.clone())
            .with_param("raceID", race_id);

        for (name, default) in OREGON_DEFAULT_PARAMS {
            let value = self
                .config
                .params
                .get(*name)
                .map(String::as_str)
                .unwrap_or(*default);
            request = request.with_param(*name, value);
        }
        for (name, value) in &self.config.params {
            if !OREGON_DEFAULT_PARAMS.iter().any(|(n, _)| *n == name.as_str()) {
                request = request.with_param(name.clone(), value.clone());
            }
        }
        Ok(request)
    }
}

#[derive(Debug, Deserialize)]
struct MapDataRow {
    #[serde(rename = "RaceID", default)]
    race_id: Value,
    #[serde(rename = "RaceName")]
    race_name: Option<String>,
    #[serde(rename = "calcCandidate")]
    candidate: Option<String>,
    #[serde(rename = "calcCandidateVotes")]
    votes: Option<VoteCount>,
    #[serde(rename = "calcCandidatePercentage")]
    percent: Option<RawPercent>,
    #[serde(rename = "PartyName")]
    party: Option<String>,
}

#[async_trait::async_trait]
impl RecordSource for OregonSource {
    fn source_name(&self) -> &'static str {
        OREGON_SOS
    }

    fn requests(&self) -> Result<Vec<RequestSpec>> {
        self.config
            .race_ids
            .iter()
            .map(|id| self.request_for(id))
            .collect()
    }

    #[instrument(skip(self), fields(race_id = %request.key))]
    async fn fetch(&self, request: &RequestSpec) -> Result<RawDocument> {
        fetch_json(self.http.as_ref(), OREGON_SOS, request).await
    }

    fn extract_records(&self, document: &RawDocument) -> Result<Vec<RawResultRecord>> {
        let rows = document
            .get("d")
            .and_then(Value::as_array)
            .ok_or_else(|| ScraperError::malformed("map data response has no \"d\" array"))?;

        let mut records = Vec::with_capacity(rows.len());
        for (i, entry) in rows.iter().enumerate() {
            let row: MapDataRow = parse_entry(entry, "map data row", i)?;
            let race_id = id_text(&row.race_id).ok_or_else(|| {
                ScraperError::malformed(format!("map data row #{}: missing RaceID", i))
            })?;
            records.push(RawResultRecord {
                race_id,
                race_name: row.race_name,
                option_label: row.candidate,
                party: row.party.filter(|p| !p.trim().is_empty()),
                votes: row.votes,
                percent: row.percent,
                incumbent: None,
            });
        }
        debug!("Extracted {} option rows", records.len());
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::ports::HttpGetResult;
    use crate::config::RaceTypeRule;
    use serde_json::json;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    /// Replays canned bodies and remembers every request it saw
    struct CannedHttp {
        status: u16,
        body: Value,
        seen: Mutex<Vec<String>>,
    }

    #[async_trait::async_trait]
    impl HttpClientPort for CannedHttp {
        async fn get(&self, request: &RequestSpec) -> Result<HttpGetResult> {
            self.seen.lock().unwrap().push(request.display_url());
            Ok(HttpGetResult {
                status: self.status,
                bytes: serde_json::to_vec(&self.body).unwrap(),
                content_type: "application/json".into(),
            })
        }
    }

    fn config(race_type: RaceTypeRule, race_ids: &[&str]) -> OregonSourceConfig {
        OregonSourceConfig {
            race_type,
            category: "SW".into(),
            race_ids: race_ids.iter().map(|s| s.to_string()).collect(),
            race_ids_file: None,
            params: BTreeMap::new(),
        }
    }

    fn source(http: Arc<CannedHttp>, config: OregonSourceConfig) -> OregonSource {
        OregonSource::new(http, "https://or.test/GetMapData", config)
    }

    fn canned(status: u16, body: Value) -> Arc<CannedHttp> {
        Arc::new(CannedHttp {
            status,
            body,
            seen: Mutex::new(Vec::new()),
        })
    }

    #[test]
    fn test_request_parameters_in_order() {
        let src = source(canned(200, json!({})), config(RaceTypeRule::Fixed("MEASURE".into()), &["0"]));
        let requests = src.requests().unwrap();
        assert_eq!(
            requests[0].display_url(),
            "https://or.test/GetMapData?type=MEASURE&category=SW&raceID=0&osn=0&county=0&party=0"
        );
        assert_eq!(requests[0].key, "0");
    }

    #[test]
    fn test_threshold_rule_and_extra_params() {
        let mut cfg = config(
            RaceTypeRule::Threshold {
                threshold: 300031536,
                at_or_above: "HOUSE".into(),
                below: "SENATE".into(),
            },
            &["300031536", "300031500"],
        );
        cfg.params.insert("map".into(), "CTY".into());
        cfg.params.insert("county".into(), "15".into());
        let requests = source(canned(200, json!({})), cfg).requests().unwrap();
        assert_eq!(requests[0].param("type"), Some("HOUSE"));
        assert_eq!(requests[1].param("type"), Some("SENATE"));
        assert_eq!(requests[0].param("county"), Some("15"));
        assert_eq!(requests[0].param("map"), Some("CTY"));
        assert!(requests[0].display_url().ends_with("party=0&map=CTY"));
    }

    #[test]
    fn test_extract_map_rows() {
        let src = source(canned(200, json!({})), config(RaceTypeRule::Fixed("CTYALL".into()), &["1"]));
        let doc = json!({"d": [
            {"RaceID": 300032824, "RaceName": "Jackson County Commissioner, Position 1",
             "calcCandidate": "Dave Dotterrer", "calcCandidateVotes": 40210,
             "calcCandidatePercentage": 0.5412, "PartyName": ""},
            {"RaceID": "300032824", "RaceName": "Jackson County Commissioner, Position 1",
             "calcCandidate": "Write-in", "calcCandidateVotes": "1,002",
             "calcCandidatePercentage": 0.0135, "PartyName": "Nonpartisan"}
        ]});
        let records = src.extract_records(&doc).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].race_id, "300032824");
        assert_eq!(records[1].race_id, "300032824");
        assert_eq!(records[0].party, None);
        assert_eq!(records[1].party.as_deref(), Some("Nonpartisan"));
        assert_eq!(records[1].require_votes().unwrap(), 1002);
    }

    #[test]
    fn test_missing_race_id_is_malformed() {
        let src = source(canned(200, json!({})), config(RaceTypeRule::Fixed("MEASURE".into()), &["0"]));
        let doc = json!({"d": [{"RaceName": "Measure 114", "calcCandidate": "Yes"}]});
        assert!(matches!(
            src.extract_records(&doc),
            Err(ScraperError::MalformedRecord(_))
        ));
        assert!(src.extract_records(&json!({"rows": []})).is_err());
    }

    #[tokio::test]
    async fn test_non_success_status_is_upstream_error() {
        let http = canned(503, json!({}));
        let src = source(http.clone(), config(RaceTypeRule::Fixed("MEASURE".into()), &["0"]));
        let request = src.requests().unwrap().remove(0);
        match src.fetch(&request).await {
            Err(ScraperError::Upstream { service, status, .. }) => {
                assert_eq!(service, OREGON_SOS);
                assert_eq!(status, 503);
            }
            other => panic!("expected upstream error, got {:?}", other),
        }
        assert_eq!(http.seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_fetch_parses_document() {
        let http = canned(200, json!({"d": []}));
        let src = source(http, config(RaceTypeRule::Fixed("MEASURE".into()), &["0"]));
        let request = src.requests().unwrap().remove(0);
        let doc = src.fetch(&request).await.unwrap();
        assert!(src.extract_records(&doc).unwrap().is_empty());
    }
}

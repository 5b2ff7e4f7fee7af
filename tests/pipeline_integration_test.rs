use anyhow::Result;
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use election_scraper::app::ports::{HttpClientPort, HttpGetResult, PublisherPort};
use election_scraper::config::Config;
use election_scraper::error::ScraperError;
use election_scraper::infra::LogPublisher;
use election_scraper::pipeline::storage::ResultTable;
use election_scraper::pipeline::{run_groups, PipelineSettings, PipelineStage};
use election_scraper::clock::RunClock;
use election_scraper::types::RequestSpec;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::tempdir;

const CONFIG: &str = r#"
    timezone = "US/Pacific"

    [endpoints]
    california_measures_url = "https://ca.test/ballot-measures"
    california_query_url = "https://ca.test/query"
    oregon_map_data_url = "https://or.test/GetMapData"

    [[groups]]
    key = "oregon_measures"
    title = "Oregon statewide measures"
    destination = "1uvst"
    output_file = "oregon_measure_results.csv"
    schema = "measures"
    percent_scale = "fraction"
    [groups.source]
    kind = "oregon"
    race_type = "MEASURE"
    category = "SW"
    race_ids = ["0"]

    [[groups]]
    key = "oregon_leg"
    title = "Oregon legislature"
    destination = "2pT4G"
    output_file = "oregon_leg_results.csv"
    schema = "candidates_with_party"
    percent_scale = "fraction"
    [groups.source]
    kind = "oregon"
    category = "SW"
    race_type = { threshold = 300031536, at_or_above = "HOUSE", below = "SENATE" }
    race_ids = ["300031502", "300031999"]

    [[groups]]
    key = "california_cand"
    title = "California legislature"
    destination = "lyV8E"
    output_file = "california_cand_results.csv"
    schema = "candidates_with_party"
    percent_scale = "percent"
    expand_party_codes = true
    [groups.source]
    kind = "california_contests"
    race_ids = ["13000001000059"]
"#;

/// Canned government APIs. Oregon race 300031999 is down.
struct FakeElectionApis {
    requests: Mutex<Vec<String>>,
}

impl FakeElectionApis {
    fn new() -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
        }
    }

    fn respond(request: &RequestSpec) -> (u16, Value) {
        match (request.url.as_str(), request.param("raceID")) {
            ("https://or.test/GetMapData", Some("0")) => (
                200,
                json!({"d": [
                    {"RaceID": 1, "RaceName": "Measure 118 Amends Constitution", "calcCandidate": "No",
                     "calcCandidateVotes": 1500000, "calcCandidatePercentage": 0.78, "PartyName": ""},
                    {"RaceID": 2, "RaceName": "Measure 117 Ranked Choice", "calcCandidate": "Yes",
                     "calcCandidateVotes": 900000, "calcCandidatePercentage": 0.42, "PartyName": ""},
                    {"RaceID": 1, "RaceName": "Measure 118 Amends Constitution", "calcCandidate": "Yes",
                     "calcCandidateVotes": 420000, "calcCandidatePercentage": 0.22, "PartyName": ""},
                    {"RaceID": 2, "RaceName": "Measure 117 Ranked Choice", "calcCandidate": "No",
                     "calcCandidateVotes": 1250000, "calcCandidatePercentage": 0.58, "PartyName": ""}
                ]}),
            ),
            ("https://or.test/GetMapData", Some("300031502")) => (
                200,
                json!({"d": [
                    {"RaceID": 300031502, "RaceName": "State Senator, 2nd District", "calcCandidate": "Noah Robinson",
                     "calcCandidateVotes": 41000, "calcCandidatePercentage": 0.61, "PartyName": "Republican"}
                ]}),
            ),
            ("https://or.test/GetMapData", Some(_)) => (503, json!({})),
            ("https://ca.test/query", _) => (
                200,
                json!([
                    {"raceTitle": "State Assembly District 1 - Districtwide Results",
                     "candidates": [
                        {"Name": "Heather Hadwick", "Party": "Rep", "Votes": "120,431", "Percent": "61.2", "incumbent": false},
                        {"Name": "Jamie Hanson", "Party": "Dem", "Votes": "76,310", "Percent": "38.8", "incumbent": true}
                     ]}
                ]),
            ),
            _ => (404, json!({})),
        }
    }
}

#[async_trait]
impl HttpClientPort for FakeElectionApis {
    async fn get(&self, request: &RequestSpec) -> election_scraper::error::Result<HttpGetResult> {
        self.requests.lock().unwrap().push(request.display_url());
        let (status, body) = Self::respond(request);
        Ok(HttpGetResult {
            status,
            bytes: serde_json::to_vec(&body)?,
            content_type: "application/json".to_string(),
        })
    }
}

#[derive(Default)]
struct RecordingPublisher {
    calls: Mutex<Vec<(String, String)>>,
    // (destination, step) that the charting service rejects
    rejects: Option<(&'static str, &'static str)>,
}

impl RecordingPublisher {
    fn rejecting(destination: &'static str, step: &'static str) -> Self {
        Self {
            rejects: Some((destination, step)),
            ..Default::default()
        }
    }

    fn record(
        &self,
        destination: &str,
        step: &str,
        call: String,
    ) -> election_scraper::error::Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push((destination.to_string(), call));
        match self.rejects {
            Some((d, s)) if d == destination && s == step => Err(ScraperError::Upstream {
                service: "Datawrapper".to_string(),
                url: format!("https://charts.test/{}/{}", destination, step),
                status: 502,
            }),
            _ => Ok(()),
        }
    }

    fn calls_for(&self, destination: &str) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(d, _)| d == destination)
            .map(|(_, call)| call.clone())
            .collect()
    }
}

#[async_trait]
impl PublisherPort for RecordingPublisher {
    async fn upload_table(&self, destination: &str, table: &ResultTable) -> election_scraper::error::Result<()> {
        self.record(destination, "upload", format!("upload:{}", table.len()))
    }

    async fn annotate(&self, destination: &str, note: &str) -> election_scraper::error::Result<()> {
        self.record(destination, "annotate", format!("annotate:{}", note))
    }

    async fn publish(&self, destination: &str) -> election_scraper::error::Result<()> {
        self.record(destination, "publish", "publish".to_string())
    }
}

fn settings(root: &Path) -> PipelineSettings {
    PipelineSettings {
        output_dir: root.join("out"),
        snapshot_dir: root.join("jsons"),
        note_prefix: "Last updated:".to_string(),
        clock: RunClock::fixed(
            chrono_tz::US::Pacific,
            Utc.with_ymd_and_hms(2024, 11, 6, 4, 30, 0).unwrap(),
        ),
    }
}

#[tokio::test]
async fn test_failed_group_does_not_block_others() -> Result<()> {
    let temp_dir = tempdir()?;
    let config = Config::from_toml_str(CONFIG, temp_dir.path())?;
    let groups = config.select_groups(None)?;
    let settings = settings(temp_dir.path());
    let http = Arc::new(FakeElectionApis::new());
    let publisher = Arc::new(RecordingPublisher::default());

    let summary = run_groups(
        &groups,
        &config.endpoints,
        http.clone(),
        publisher.clone(),
        &settings,
    )
    .await;

    assert_eq!(summary.completed.len(), 2);
    assert_eq!(summary.failed.len(), 1);
    assert_eq!(summary.exit_code(), 1);

    let failure = &summary.failed[0];
    assert_eq!(failure.group, "oregon_leg");
    assert_eq!(failure.stage, PipelineStage::Fetching);
    assert!(matches!(
        failure.error,
        ScraperError::Upstream { status: 503, .. }
    ));

    // Nothing written or published for the failed group
    assert!(!settings.output_dir.join("oregon_leg_results.csv").exists());
    assert!(publisher.calls_for("2pT4G").is_empty());

    // The group after the failure still ran
    assert_eq!(
        publisher.calls_for("lyV8E"),
        vec![
            "upload:2".to_string(),
            "annotate:Last updated: 11/05/2024, 08:30 PM PST".to_string(),
            "publish".to_string(),
        ]
    );

    // Both Oregon legislature requests went out with the right race type
    let requests = http.requests.lock().unwrap().clone();
    assert!(requests.iter().any(|r| r.contains("type=SENATE") && r.contains("raceID=300031502")));
    assert!(requests.iter().any(|r| r.contains("type=HOUSE") && r.contains("raceID=300031999")));
    Ok(())
}

#[tokio::test]
async fn test_measure_and_candidate_tables() -> Result<()> {
    let temp_dir = tempdir()?;
    let config = Config::from_toml_str(CONFIG, temp_dir.path())?;
    let keys = vec!["oregon_measures".to_string(), "california_cand".to_string()];
    let groups = config.select_groups(Some(keys.as_slice()))?;
    let settings = settings(temp_dir.path());

    let summary = run_groups(
        &groups,
        &config.endpoints,
        Arc::new(FakeElectionApis::new()),
        Arc::new(RecordingPublisher::default()),
        &settings,
    )
    .await;
    assert!(summary.all_succeeded());

    let measures = std::fs::read_to_string(settings.output_dir.join("oregon_measure_results.csv"))?;
    let lines: Vec<&str> = measures.lines().collect();
    assert_eq!(lines[0], "Measure,Yes Votes,Yes %,No Votes,No %");
    // Sorted by label, not upstream order
    assert_eq!(lines[1], "Measure 117,900000,42,1250000,58");
    assert_eq!(lines[2], "Measure 118,420000,22,1500000,78");
    assert_eq!(lines.len(), 3);

    let candidates =
        std::fs::read_to_string(settings.output_dir.join("california_cand_results.csv"))?;
    let lines: Vec<&str> = candidates.lines().collect();
    assert_eq!(lines[0], "Race,Candidate,Party,Votes,Percent");
    assert_eq!(lines[1], "State Assembly District 1,Heather Hadwick,Republican,120431,61.2");
    assert_eq!(
        lines[2],
        "State Assembly District 1,Jamie Hanson (Incumbent),Democratic,76310,38.8"
    );

    let snapshot = settings
        .snapshot_dir
        .join("oregon_measures_2024-11-05_20-30.json");
    let saved: Value = serde_json::from_str(&std::fs::read_to_string(snapshot)?)?;
    assert_eq!(saved["0"]["d"].as_array().map(Vec::len), Some(4));
    Ok(())
}

#[tokio::test]
async fn test_rejected_upload_fails_only_its_group() -> Result<()> {
    let temp_dir = tempdir()?;
    let config = Config::from_toml_str(CONFIG, temp_dir.path())?;
    let keys = vec!["oregon_measures".to_string(), "california_cand".to_string()];
    let groups = config.select_groups(Some(keys.as_slice()))?;
    let settings = settings(temp_dir.path());
    let publisher = Arc::new(RecordingPublisher::rejecting("1uvst", "upload"));

    let summary = run_groups(
        &groups,
        &config.endpoints,
        Arc::new(FakeElectionApis::new()),
        publisher.clone(),
        &settings,
    )
    .await;

    assert_eq!(summary.failed.len(), 1);
    let failure = &summary.failed[0];
    assert_eq!(failure.group, "oregon_measures");
    assert_eq!(failure.stage, PipelineStage::Publishing);
    assert!(matches!(
        failure.error,
        ScraperError::Upstream { status: 502, .. }
    ));

    // No annotate or publish after the rejected upload
    assert_eq!(publisher.calls_for("1uvst"), vec!["upload:2".to_string()]);

    assert_eq!(summary.completed.len(), 1);
    assert_eq!(summary.completed[0].group, "california_cand");
    assert_eq!(
        publisher.calls_for("lyV8E"),
        vec![
            "upload:2".to_string(),
            "annotate:Last updated: 11/05/2024, 08:30 PM PST".to_string(),
            "publish".to_string(),
        ]
    );
    Ok(())
}

#[tokio::test]
async fn test_dry_run_publisher_completes() -> Result<()> {
    let temp_dir = tempdir()?;
    let config = Config::from_toml_str(CONFIG, temp_dir.path())?;
    let keys = vec!["oregon_measures".to_string()];
    let groups = config.select_groups(Some(keys.as_slice()))?;

    let summary = run_groups(
        &groups,
        &config.endpoints,
        Arc::new(FakeElectionApis::new()),
        Arc::new(LogPublisher),
        &settings(temp_dir.path()),
    )
    .await;
    assert_eq!(summary.completed.len(), 1);
    assert_eq!(summary.completed[0].rows, 2);
    Ok(())
}

#[test]
fn test_shipped_config_loads() -> Result<()> {
    let config = Config::load("config/elections.toml")?;
    assert_eq!(config.groups.len(), 7);

    let keys: Vec<&str> = config.groups.iter().map(|g| g.key.as_str()).collect();
    assert_eq!(
        keys,
        vec![
            "california_props",
            "california_cand",
            "oregon_measures",
            "oregon_leg",
            "oregon_local_measures",
            "oregon_jacksoncand",
            "oregon_grants",
        ]
    );

    let leg = config
        .groups
        .iter()
        .find(|g| g.key == "oregon_leg")
        .expect("oregon_leg group");
    match &leg.source {
        election_scraper::config::SourceConfig::Oregon(oregon) => {
            assert_eq!(oregon.race_ids.len(), 7);
            assert_eq!(oregon.race_type.race_type_for("300031502")?, "SENATE");
            assert_eq!(oregon.race_type.race_type_for("300031536")?, "HOUSE");
        }
        other => panic!("unexpected source {:?}", other),
    }
    Ok(())
}

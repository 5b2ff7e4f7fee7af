use election_scraper::pipeline::processing::{GapPolicy, MeasureLabelRule, MeasurePairer};
use election_scraper::pipeline::storage::ResultTable;
use election_scraper::types::{
    parse_vote_text, MeasureRow, NormalizedRow, OutputSchema, PercentScale, RawResultRecord,
};
use proptest::prelude::*;

/// `1234567` -> `"1,234,567"`
fn with_separators(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::new();
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

fn measure_records(outcomes: &[(u64, u64)]) -> Vec<RawResultRecord> {
    let mut records = Vec::new();
    for (i, (yes, no)) in outcomes.iter().enumerate() {
        let total = (*yes + *no).max(1) as f64;
        let name = format!("Measure {} Statewide", 100 + i);
        let id = format!("R{}", i);
        records.push(
            RawResultRecord::new(id.clone())
                .with_race_name(name.clone())
                .with_option("Yes")
                .with_votes(*yes)
                .with_percent(*yes as f64 / total),
        );
        records.push(
            RawResultRecord::new(id)
                .with_race_name(name)
                .with_option("No")
                .with_votes(*no)
                .with_percent(*no as f64 / total),
        );
    }
    records
}

fn sorted_labels(labels: &[String]) -> Vec<String> {
    let mut table = ResultTable::new(OutputSchema::measures("Proposition"));
    table.extend(labels.iter().map(|label| {
        NormalizedRow::Measure(MeasureRow {
            measure: label.clone(),
            yes_votes: Some(1),
            yes_percent: Some(50.0),
            no_votes: Some(1),
            no_percent: Some(50.0),
        })
    }));
    table.sort_by("Proposition", true).unwrap();
    table.rows().iter().map(|r| r.contest_label().to_string()).collect()
}

fn paired_and_sorted(records: &[RawResultRecord]) -> Vec<NormalizedRow> {
    let pairer = MeasurePairer::new(
        PercentScale::Fraction,
        MeasureLabelRule::Extract,
        GapPolicy::Error,
    );
    let mut table = ResultTable::new(OutputSchema::measures("Measure"));
    table.extend(pairer.pair(records).unwrap());
    table.sort_by("Measure", true).unwrap();
    table.rows().to_vec()
}

proptest! {
    #[test]
    fn separators_do_not_change_vote_counts(n in 0u64..10_000_000_000) {
        prop_assert_eq!(parse_vote_text(&with_separators(n)).unwrap(), n);
        prop_assert_eq!(parse_vote_text(&n.to_string()).unwrap(), n);
    }

    #[test]
    fn fraction_scales_by_one_hundred(x in 0.0f64..=1.0) {
        prop_assert_eq!(PercentScale::Fraction.to_percent(x), x * 100.0);
    }

    #[test]
    fn percent_scale_is_identity(x in 0.0f64..=100.0) {
        prop_assert_eq!(PercentScale::Percent.to_percent(x), x);
    }

    #[test]
    fn pairing_ignores_input_order(
        (records, shuffled) in prop::collection::vec((0u64..5_000_000, 0u64..5_000_000), 1..8)
            .prop_flat_map(|outcomes| {
                let records = measure_records(&outcomes);
                (Just(records.clone()), Just(records).prop_shuffle())
            })
    ) {
        prop_assert_eq!(paired_and_sorted(&records), paired_and_sorted(&shuffled));
    }

    #[test]
    fn label_sort_ignores_input_order(
        (labels, shuffled) in prop::collection::vec("(Measure )?[1-9][0-9]{0,2}[A-C]?", 1..12)
            .prop_flat_map(|labels| (Just(labels.clone()), Just(labels).prop_shuffle()))
    ) {
        prop_assert_eq!(sorted_labels(&labels), sorted_labels(&shuffled));
    }
}

#[test]
fn sort_keeps_ties_in_original_order() {
    let records = vec![
        RawResultRecord::new("a").with_race_name("Measure 5 first").with_option("Yes").with_votes(1).with_percent(0.1),
        RawResultRecord::new("a").with_race_name("Measure 5 first").with_option("No").with_votes(9).with_percent(0.9),
        RawResultRecord::new("b").with_race_name("Measure 5 second").with_option("Yes").with_votes(2).with_percent(0.2),
        RawResultRecord::new("b").with_race_name("Measure 5 second").with_option("No").with_votes(8).with_percent(0.8),
    ];
    let rows = paired_and_sorted(&records);
    match (&rows[0], &rows[1]) {
        (NormalizedRow::Measure(first), NormalizedRow::Measure(second)) => {
            assert_eq!(first.yes_votes, Some(1));
            assert_eq!(second.yes_votes, Some(2));
        }
        other => panic!("unexpected rows {:?}", other),
    }
}

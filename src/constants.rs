//! Upstream literals shared across sources and transforms.

/// Service names used in logs, metrics and `Upstream` errors
pub const CALIFORNIA_SOS: &str = "california_sos";
pub const OREGON_SOS: &str = "oregon_sos";
pub const DATAWRAPPER: &str = "datawrapper";

// Default endpoints (overridable in [endpoints])
pub const CALIFORNIA_MEASURES_URL: &str = "https://api.sos.ca.gov/returns/ballot-measures";
pub const CALIFORNIA_QUERY_URL: &str = "https://api.sos.ca.gov/returns/query";
pub const OREGON_MAP_DATA_URL: &str =
    "https://orresultswebservices.azureedge.us/ResultsAjax.svc/GetMapData";
pub const DATAWRAPPER_API_URL: &str = "https://api.datawrapper.de/v3";
pub const DATAWRAPPER_KEY_ENV: &str = "DATAWRAPPER_API_KEY";

// Option labels the Oregon feed uses for the two sides of a measure
pub const YES_OPTION: &str = "Yes";
pub const NO_OPTION: &str = "No";

pub const DISTRICTWIDE_SUFFIX: &str = " - Districtwide Results";
pub const INCUMBENT_SUFFIX: &str = " (Incumbent)";

/// Short party codes used by the California feed and their display names
pub const PARTY_CODES: &[(&str, &str)] = &[("Dem", "Democratic"), ("Rep", "Republican")];

// Column headers
pub const COL_MEASURE: &str = "Measure";
pub const COL_YES_VOTES: &str = "Yes Votes";
pub const COL_YES_PERCENT: &str = "Yes %";
pub const COL_NO_VOTES: &str = "No Votes";
pub const COL_NO_PERCENT: &str = "No %";
pub const COL_RACE: &str = "Race";
pub const COL_CANDIDATE: &str = "Candidate";
pub const COL_PARTY: &str = "Party";
pub const COL_VOTES: &str = "Votes";
pub const COL_PERCENT: &str = "Percent";

/// Auxiliary Oregon query parameters; the feed returns nothing without them
pub const OREGON_DEFAULT_PARAMS: &[(&str, &str)] = &[("osn", "0"), ("county", "0"), ("party", "0")];

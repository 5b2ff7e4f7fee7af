// Pipeline processing: reshaping raw upstream records into output rows

pub mod candidate_normalizer;
pub mod measure_pairer;

pub use candidate_normalizer::CandidateNormalizer;
pub use measure_pairer::{GapPolicy, MeasureLabelRule, MeasurePairer};

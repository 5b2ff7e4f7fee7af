// Per-run storage: output tables and raw snapshots

pub mod result_table;
pub mod snapshot;

pub use result_table::ResultTable;
pub use snapshot::{sweep_expired, KeyedAccumulator, Snapshot};

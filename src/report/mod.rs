//! The durable report artifact and its feedback ledger.

mod markdown;
mod store;

pub use markdown::{extract_delta, merge_delta, normalize_body};
pub use store::{FsReportStore, MemoryReportStore, ReportId, ReportStore};

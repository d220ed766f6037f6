// Extractor module - metadata extraction with strategy fallback
//
// The orchestrator walks an ordered list of strategies (client identity,
// credentials, error tolerance) against an InfoExtractor until one
// produces metadata. Diagnostics classify engine failures.

mod diagnostics;
mod orchestrator;
mod traits;

pub use diagnostics::{diagnose_error, is_name_resolution_error, BlockingReason};
pub use orchestrator::{
    StrategyOutcome, StrategyRunner, StrategySummary, AUTHENTICATED_CLIENTS, UNAUTHENTICATED_CLIENT,
};
pub use traits::{ExtendedFormat, InfoExtractor, MediaInfo, Strategy};

pub mod check_in;
pub mod passes;
pub mod settlement;
pub mod trips;

pub use check_in::{CheckInOrchestrator, ScanOutcome, ScannerRegistry};
pub use passes::{PassService, PassValidation};
pub use settlement::SettlementOutcome;
pub use trips::{EndTripResult, RideDetails, TripService};

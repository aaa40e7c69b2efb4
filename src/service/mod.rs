pub mod driver;
pub mod outcomes;
pub mod trip;

pub use driver::DriverService;
pub use outcomes::TripOutcomeRecorder;
pub use trip::{TripPreview, TripService};

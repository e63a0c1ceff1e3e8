pub mod types;
pub mod classification;
pub mod retry;

pub use types::ProdGuardError;
pub use classification::ErrorClassification;
pub use retry::{RetryPolicy, RetryOutcome, with_retry};

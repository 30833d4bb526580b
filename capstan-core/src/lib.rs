pub mod backoff;
pub mod classify;
pub mod outcome;

pub use backoff::{BackoffPolicy, Decision, RetryState};
pub use classify::{Classify, PatternClassifier, PatternRule};
pub use outcome::{ApplyOutput, Outcome};

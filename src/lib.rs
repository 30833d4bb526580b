pub mod config;
pub mod controller;
pub mod deploy;
pub mod error;
pub mod observer;
pub mod probe;
pub mod report;
pub mod runner;
pub mod utils;

pub use capstan_core::{
    ApplyOutput, BackoffPolicy, Classify, Decision, Outcome, PatternClassifier, PatternRule,
    RetryState,
};
pub use config::Config;
pub use controller::{RetryController, RetryLimits};
pub use deploy::Deployment;
pub use error::CapstanError;
pub use report::DeploymentReport;
pub use runner::{CommandRunner, ShellRunner};

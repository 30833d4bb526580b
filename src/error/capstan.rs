use capstan_core::ApplyOutput;
use thiserror::Error as ThisError;

use super::IsRetryable;

/// Terraform prints this while another process holds the state lock.
pub const STATE_LOCK_MARKER: &str = "Error acquiring the state lock";

#[derive(Debug, ThisError)]
pub enum CapstanError {
    #[error("Initialization failed with exit code {}", .output.exit_code)]
    Initialization { output: ApplyOutput },

    #[error("Apply failed with an unrecognized error on attempt {attempt} (exit code {})", .output.exit_code)]
    Fatal { attempt: u32, output: ApplyOutput },

    #[error("Apply still failing after {attempts} attempts; retry limit reached")]
    RetriesExhausted { attempts: u32, output: ApplyOutput },

    #[error("Output command failed with exit code {}", .output.exit_code)]
    Outputs { output: ApplyOutput },

    #[error("Run cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(Box<figment::Error>),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl From<figment::Error> for CapstanError {
    fn from(err: figment::Error) -> Self {
        Self::Config(Box::new(err))
    }
}

impl CapstanError {
    /// Process exit code reported to the invoking environment.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Initialization { .. } | Self::Fatal { .. } => 1,
            Self::RetriesExhausted { .. } => 2,
            Self::Outputs { .. } | Self::Io(_) | Self::Config(_) | Self::InvalidConfig(_) => 3,
            Self::Cancelled => 130,
        }
    }

    /// Captured command output carried by the error, if any.
    pub fn diagnostics(&self) -> Option<&ApplyOutput> {
        match self {
            Self::Initialization { output }
            | Self::Fatal { output, .. }
            | Self::RetriesExhausted { output, .. }
            | Self::Outputs { output } => Some(output),
            _ => None,
        }
    }
}

impl IsRetryable for CapstanError {
    fn is_retryable(&self) -> bool {
        match self {
            CapstanError::Io(_) => true,
            CapstanError::Outputs { output } => output.combined().contains(STATE_LOCK_MARKER),
            _ => false,
        }
    }
}

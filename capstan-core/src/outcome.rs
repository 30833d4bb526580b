use serde::{Deserialize, Serialize};
use std::fmt;

/// Captured result of one external command invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl ApplyOutput {
    pub fn new(exit_code: i32, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: stderr.into(),
            exit_code,
        }
    }

    #[inline]
    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }

    /// Stdout followed by stderr, the text classification rules match against.
    pub fn combined(&self) -> String {
        let mut text = String::with_capacity(self.stdout.len() + self.stderr.len() + 1);
        text.push_str(&self.stdout);
        if !self.stdout.is_empty() && !self.stderr.is_empty() {
            text.push('\n');
        }
        text.push_str(&self.stderr);
        text
    }
}

/// Category an apply attempt falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    RetryableCapacity,
    RetryableRateLimit,
    Fatal,
}

impl Outcome {
    #[inline]
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::RetryableCapacity | Self::RetryableRateLimit)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Success => "success",
            Self::RetryableCapacity => "capacity",
            Self::RetryableRateLimit => "rate_limit",
            Self::Fatal => "fatal",
        };
        f.write_str(name)
    }
}

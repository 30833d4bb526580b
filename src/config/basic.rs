use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Basic (process-level) configuration managed by Figment.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BasicConfig {
    /// Log level for tracing subscriber initialization (e.g., "error", "warn", "info", "debug", "trace").
    /// `RUST_LOG` wins when set.
    /// TOML: `basic.loglevel`. Default: `info`.
    #[serde(default = "default_loglevel")]
    pub loglevel: String,

    /// Directory holding the Terraform configuration; every command runs there.
    /// TOML: `basic.working_dir`. Default: unset (the current directory).
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
}

impl Default for BasicConfig {
    fn default() -> Self {
        Self {
            loglevel: default_loglevel(),
            working_dir: None,
        }
    }
}

fn default_loglevel() -> String {
    "info".to_string()
}

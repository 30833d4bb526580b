use serde::{Deserialize, Serialize};

/// External provisioning tool commands. Each value is a shell command string.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ToolConfig {
    /// Prints the tool version; used to confirm the binary is on `PATH`.
    /// TOML: `tool.version_command`. Default: `terraform version`.
    #[serde(default = "default_version_command")]
    pub version_command: String,

    /// Text the version output must contain for the tool to count as installed.
    /// TOML: `tool.version_banner`. Default: `Terraform v`.
    #[serde(default = "default_version_banner")]
    pub version_banner: String,

    /// TOML: `tool.init_command`. Default: `terraform init`.
    #[serde(default = "default_init_command")]
    pub init_command: String,

    /// Retried until it succeeds or fails with an unrecognized error.
    /// TOML: `tool.apply_command`. Default: `terraform apply -auto-approve`.
    #[serde(default = "default_apply_command")]
    pub apply_command: String,

    /// Run once after a successful apply to show the created resources.
    /// TOML: `tool.output_command`. Default: `terraform output`.
    #[serde(default = "default_output_command")]
    pub output_command: String,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            version_command: default_version_command(),
            version_banner: default_version_banner(),
            init_command: default_init_command(),
            apply_command: default_apply_command(),
            output_command: default_output_command(),
        }
    }
}

fn default_version_command() -> String {
    "terraform version".to_string()
}

fn default_version_banner() -> String {
    "Terraform v".to_string()
}

fn default_init_command() -> String {
    "terraform init".to_string()
}

fn default_apply_command() -> String {
    "terraform apply -auto-approve".to_string()
}

fn default_output_command() -> String {
    "terraform output".to_string()
}

mod basic;
mod retry;
mod tool;

pub use basic::BasicConfig;
pub use retry::{ClassifierConfig, RetryConfig};
pub use tool::ToolConfig;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::CapstanError;

/// Application configuration managed by Figment.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    /// Process-level settings (see `basic` table in capstan.toml).
    #[serde(default)]
    pub basic: BasicConfig,

    /// Provisioning tool commands (see `tool` table in capstan.toml).
    #[serde(default)]
    pub tool: ToolConfig,

    /// Apply retry timing (see `retry` table in capstan.toml).
    #[serde(default)]
    pub retry: RetryConfig,

    /// Failure signatures (see `classifier` table in capstan.toml).
    #[serde(default)]
    pub classifier: ClassifierConfig,
}

const DEFAULT_CONFIG_FILE: &str = "capstan.toml";
const CONFIG_PATH_ENV: &str = "CAPSTAN_CONFIG";
const ENV_PREFIX: &str = "CAPSTAN_";

impl Config {
    /// Config file location: `CAPSTAN_CONFIG` if set, else `capstan.toml`.
    pub fn config_path() -> PathBuf {
        std::env::var_os(CONFIG_PATH_ENV)
            .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE), PathBuf::from)
    }

    /// Builds a Figment that merges defaults, the config TOML file (if present)
    /// and `CAPSTAN_*` environment variables, in that order.
    pub fn figment() -> Figment {
        let path = Self::config_path();
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));
        if path.is_file() {
            figment = figment.merge(Toml::file(path));
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Loads and validates configuration.
    ///
    /// A missing config file is not an error; an explicitly named one is.
    pub fn load() -> Result<Self, CapstanError> {
        if std::env::var_os(CONFIG_PATH_ENV).is_some() {
            let path = Self::config_path();
            if !path.is_file() {
                return Err(CapstanError::InvalidConfig(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
        }
        let cfg: Self = Self::figment().extract()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), CapstanError> {
        self.retry.validate()?;
        let commands = [
            ("tool.init_command", &self.tool.init_command),
            ("tool.apply_command", &self.tool.apply_command),
        ];
        for (key, value) in commands {
            if value.trim().is_empty() {
                return Err(CapstanError::InvalidConfig(format!(
                    "{key} must be set and non-empty"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;
    use std::time::Duration;

    #[test]
    fn loads_defaults_without_file() {
        Jail::expect_with(|_jail| {
            let cfg = Config::load().map_err(|e| e.to_string())?;
            assert_eq!(cfg.basic.loglevel, "info");
            assert_eq!(cfg.basic.working_dir, None);
            assert_eq!(cfg.tool.apply_command, "terraform apply -auto-approve");
            assert_eq!(cfg.retry.policy().initial_wait, Duration::from_secs(1));
            assert_eq!(cfg.retry.max_attempts, None);
            Ok(())
        });
    }

    #[test]
    fn toml_overrides_defaults() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "capstan.toml",
                r#"
                [basic]
                working_dir = "infra/arm"

                [tool]
                apply_command = "tofu apply -auto-approve"

                [retry]
                max_wait_secs = 30
                max_attempts = 500

                [classifier]
                capacity = ["Out of host capacity", "InsufficientInstanceCapacity"]
                "#,
            )?;
            let cfg = Config::load().map_err(|e| e.to_string())?;
            assert_eq!(cfg.basic.working_dir, Some(PathBuf::from("infra/arm")));
            assert_eq!(cfg.tool.apply_command, "tofu apply -auto-approve");
            assert_eq!(cfg.tool.init_command, "terraform init");
            assert_eq!(cfg.retry.policy().max_wait, Duration::from_secs(30));
            assert_eq!(cfg.retry.max_attempts, Some(500));
            assert_eq!(cfg.classifier.capacity.len(), 2);
            assert_eq!(cfg.classifier.rate_limit, vec!["429", "Too Many Requests"]);
            Ok(())
        });
    }

    #[test]
    fn env_overrides_toml() {
        Jail::expect_with(|jail| {
            jail.create_file("capstan.toml", "[retry]\nmax_attempts = 3\n")?;
            jail.set_env("CAPSTAN_RETRY__MAX_ATTEMPTS", "7");
            jail.set_env("CAPSTAN_BASIC__LOGLEVEL", "debug");
            let cfg = Config::load().map_err(|e| e.to_string())?;
            assert_eq!(cfg.retry.max_attempts, Some(7));
            assert_eq!(cfg.basic.loglevel, "debug");
            Ok(())
        });
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        Jail::expect_with(|jail| {
            jail.set_env("CAPSTAN_CONFIG", "nope.toml");
            let err = Config::load().expect_err("missing explicit config must fail");
            assert!(matches!(err, CapstanError::InvalidConfig(_)));
            Ok(())
        });
    }

    #[test]
    fn unknown_tool_key_is_rejected() {
        Jail::expect_with(|jail| {
            jail.create_file("capstan.toml", "[tool]\nplan_command = \"terraform plan\"\n")?;
            assert!(matches!(Config::load(), Err(CapstanError::Config(_))));
            Ok(())
        });
    }

    #[test]
    fn oversized_wait_is_rejected_before_building_a_policy() {
        Jail::expect_with(|jail| {
            jail.create_file("capstan.toml", "[retry]\nmax_wait_secs = 1e20\n")?;
            let err = Config::load().expect_err("1e20 seconds does not fit a Duration");
            assert!(matches!(err, CapstanError::InvalidConfig(_)));
            assert_eq!(err.exit_code(), 3);
            Ok(())
        });
    }

    #[test]
    fn invalid_retry_values_are_rejected() {
        Jail::expect_with(|jail| {
            jail.create_file("capstan.toml", "[retry]\nbackoff_factor = 0.9\n")?;
            assert!(matches!(
                Config::load(),
                Err(CapstanError::InvalidConfig(_))
            ));
            Ok(())
        });
    }
}

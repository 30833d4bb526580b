use tracing::{info, warn};

use crate::config::ToolConfig;
use crate::runner::CommandRunner;

/// Checks that the provisioning tool answers its version command.
///
/// Only reports: a missing tool is logged and the deployment carries on, the
/// init step will then fail with the real diagnostics. Returns the version
/// line when the banner is found.
pub async fn probe_tool(runner: &dyn CommandRunner, tool: &ToolConfig) -> Option<String> {
    if tool.version_command.trim().is_empty() || tool.version_banner.trim().is_empty() {
        return None;
    }

    let output = match runner.run(&tool.version_command).await {
        Ok(output) => output,
        Err(e) => {
            warn!(
                command = %tool.version_command,
                error = %e,
                "Could not run tool version check"
            );
            return None;
        }
    };

    if !output.stdout.contains(&tool.version_banner) {
        warn!(
            command = %tool.version_command,
            exit_code = output.exit_code,
            stderr = %output.stderr.trim_end(),
            "Provisioning tool not detected, please check the installation"
        );
        return None;
    }

    let version = output
        .stdout
        .lines()
        .find(|line| line.contains(&tool.version_banner))
        .unwrap_or_default()
        .trim()
        .to_string();
    info!(version = %version, "Provisioning tool detected");
    Some(version)
}

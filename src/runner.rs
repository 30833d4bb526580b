use async_trait::async_trait;
use capstan_core::ApplyOutput;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Executes one external command and captures its result.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, command: &str) -> std::io::Result<ApplyOutput>;
}

/// Runs command strings through the platform shell in a fixed working directory.
#[derive(Debug, Clone, Default)]
pub struct ShellRunner {
    working_dir: Option<PathBuf>,
}

impl ShellRunner {
    pub fn new(working_dir: Option<PathBuf>) -> Self {
        Self { working_dir }
    }

    pub fn working_dir(&self) -> Option<&Path> {
        self.working_dir.as_deref()
    }
}

#[cfg(windows)]
fn shell_command(command: &str) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.arg("/C").arg(command);
    cmd
}

#[cfg(not(windows))]
fn shell_command(command: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command);
    cmd
}

#[async_trait]
impl CommandRunner for ShellRunner {
    async fn run(&self, command: &str) -> std::io::Result<ApplyOutput> {
        let mut cmd = shell_command(command);
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }
        // Once started the command runs to completion even if the caller goes away.
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(false);

        debug!(command, working_dir = ?self.working_dir, "Spawning command");
        let output = cmd.output().await?;

        let result = ApplyOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            // Killed by a signal.
            exit_code: output.status.code().unwrap_or(-1),
        };
        debug!(
            command,
            exit_code = result.exit_code,
            stdout_len = result.stdout.len(),
            stderr_len = result.stderr.len(),
            "Command finished"
        );
        Ok(result)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn captures_streams_and_exit_code() {
        let runner = ShellRunner::default();
        let out = runner
            .run("echo out; echo err 1>&2; exit 3")
            .await
            .expect("sh must spawn");
        assert_eq!(out.stdout, "out\n");
        assert_eq!(out.stderr, "err\n");
        assert_eq!(out.exit_code, 3);
    }

    #[tokio::test]
    async fn runs_in_configured_working_dir() {
        let dir = std::env::temp_dir();
        let runner = ShellRunner::new(Some(dir.clone()));
        let out = runner.run("pwd -P").await.expect("sh must spawn");
        let expected = std::fs::canonicalize(&dir).expect("temp dir exists");
        assert_eq!(out.stdout.trim_end(), expected.to_string_lossy());
        assert_eq!(out.exit_code, 0);
    }

    #[tokio::test]
    async fn invalid_utf8_is_replaced() {
        let runner = ShellRunner::default();
        let out = runner
            .run(r"printf 'ok\377'")
            .await
            .expect("sh must spawn");
        assert!(out.stdout.starts_with("ok"));
        assert!(out.stdout.contains('\u{FFFD}'));
    }

    #[tokio::test]
    async fn missing_working_dir_is_an_io_error() {
        let runner = ShellRunner::new(Some(PathBuf::from("/nonexistent/capstan/dir")));
        assert!(runner.run("true").await.is_err());
    }
}

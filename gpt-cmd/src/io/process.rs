//! Shell command execution for model-proposed commands.
//!
//! The [`CommandExecutor`] trait decouples the loop from actually spawning
//! processes. Tests use scripted executors that return predetermined results.

use std::process::{Command, Stdio};

use anyhow::Result;
use tracing::{debug, instrument, warn};

use crate::core::types::CommandResult;

/// Exit code reported when the shell itself could not be started.
pub const SPAWN_FAILED_EXIT_CODE: i32 = 127;
/// Exit code reported when the command was terminated by a signal.
pub const SIGNALED_EXIT_CODE: i32 = -1;

/// Runs one shell command to completion.
pub trait CommandExecutor {
    fn run(&self, command: &str) -> Result<CommandResult>;
}

/// Executor that runs commands through `sh -c`.
///
/// stderr is merged into stdout inside the shell so the captured text keeps
/// the order the command wrote it in. stdin is `/dev/null`.
pub struct ShellExecutor {
    shell: String,
}

impl ShellExecutor {
    pub fn new() -> Self {
        Self {
            shell: "sh".to_string(),
        }
    }
}

impl Default for ShellExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandExecutor for ShellExecutor {
    #[instrument(skip_all, fields(command = %command))]
    fn run(&self, command: &str) -> Result<CommandResult> {
        debug!("spawning shell");
        let output = Command::new(&self.shell)
            .arg("-c")
            .arg(format!("exec 2>&1\n{command}"))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output();

        let output = match output {
            Ok(output) => output,
            Err(err) => {
                warn!(err = %err, "failed to spawn shell");
                return Ok(CommandResult {
                    command: command.to_string(),
                    stdout: format!("failed to start {}: {err}", self.shell),
                    exit_code: SPAWN_FAILED_EXIT_CODE,
                });
            }
        };

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        if !output.stderr.is_empty() {
            combined.push_str(&String::from_utf8_lossy(&output.stderr));
        }
        let exit_code = output.status.code().unwrap_or(SIGNALED_EXIT_CODE);

        debug!(exit_code, "command finished");
        Ok(CommandResult {
            command: command.to_string(),
            stdout: combined.trim().to_string(),
            exit_code,
        })
    }
}

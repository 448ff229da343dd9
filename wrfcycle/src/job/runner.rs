//! Command runner backed by `tokio::process`.

use std::process::Stdio;

use tokio::process::Command;
use tracing::debug;

use super::{CommandOutput, CommandRunner, CommandSpec, JobError};

/// Runs commands as child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCommandRunner;

impl CommandRunner for SystemCommandRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, JobError> {
        let mut command = Command::new(&spec.program);
        command.args(&spec.args).stdin(Stdio::null());
        if let Some(dir) = &spec.workdir {
            command.current_dir(dir);
        }

        debug!(
            program = %spec.program.display(),
            args = ?spec.args,
            workdir = ?spec.workdir,
            "Running command"
        );

        let spawn_error = |source| JobError::Spawn {
            program: spec.program.display().to_string(),
            source,
        };

        if spec.capture {
            let output = command.output().await.map_err(spawn_error)?;
            Ok(CommandOutput {
                status: output.status.code(),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            })
        } else {
            let status = command
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .await
                .map_err(spawn_error)?;
            Ok(CommandOutput {
                status: status.code(),
                ..CommandOutput::default()
            })
        }
    }
}

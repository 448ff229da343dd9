//! Canned-output command runner for backend tests.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use super::{CommandOutput, CommandRunner, CommandSpec, JobError};

/// Answers commands from per-program queues. A program with nothing queued
/// exits 0 with empty output.
#[derive(Debug, Clone, Default)]
pub(crate) struct FakeRunner {
    responses: Arc<Mutex<HashMap<String, VecDeque<CommandOutput>>>>,
    calls: Arc<Mutex<Vec<CommandSpec>>>,
}

impl FakeRunner {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn respond(&self, program: &str, status: i32, stdout: &str) {
        self.push(
            program,
            CommandOutput {
                status: Some(status),
                stdout: stdout.to_string(),
                stderr: String::new(),
            },
        );
    }

    pub(crate) fn respond_err(&self, program: &str, status: i32, stderr: &str) {
        self.push(
            program,
            CommandOutput {
                status: Some(status),
                stdout: String::new(),
                stderr: stderr.to_string(),
            },
        );
    }

    fn push(&self, program: &str, output: CommandOutput) {
        self.responses
            .lock()
            .unwrap()
            .entry(program.to_string())
            .or_default()
            .push_back(output);
    }

    pub(crate) fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn count(&self, program: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.program_name() == program)
            .count()
    }
}

impl CommandRunner for FakeRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, JobError> {
        self.calls.lock().unwrap().push(spec.clone());
        let next = self
            .responses
            .lock()
            .unwrap()
            .get_mut(&spec.program_name())
            .and_then(VecDeque::pop_front);
        Ok(next.unwrap_or(CommandOutput {
            status: Some(0),
            ..CommandOutput::default()
        }))
    }
}

//! Scripted command runner for unit tests

use crate::process::{CommandRunner, ProbeResult, Timeouts};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Answers by full command line; anything unscripted fails to start.
#[derive(Default)]
pub struct ScriptedRunner {
    responses: HashMap<String, (i32, String, String)>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(
        mut self,
        command_line: &str,
        exit_code: i32,
        stdout: &str,
        stderr: &str,
    ) -> Self {
        self.responses.insert(
            command_line.to_string(),
            (exit_code, stdout.to_string(), stderr.to_string()),
        );
        self
    }

    /// Command lines seen so far, in call order
    pub fn calls(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.calls)
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, program: &str, args: &[String], _timeouts: Timeouts) -> ProbeResult {
        let mut line = program.to_string();
        for arg in args {
            line.push(' ');
            line.push_str(arg);
        }
        self.calls.lock().push(line.clone());

        match self.responses.get(&line) {
            Some((code, stdout, stderr)) => {
                ProbeResult::completed(program, args, *code, stdout.as_str(), stderr.as_str())
            }
            None => ProbeResult::not_started(program, args),
        }
    }
}

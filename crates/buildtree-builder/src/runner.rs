use std::io;
use std::process::{Command, Output};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            success: true,
            code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            success: false,
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }
}

impl From<Output> for CommandOutput {
    fn from(output: Output) -> Self {
        Self {
            success: output.status.success(),
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
    }
}

/// Runs one external command to completion.
pub trait CommandRunner {
    fn run(&mut self, command: &mut Command) -> io::Result<CommandOutput>;
}

impl<F> CommandRunner for F
where
    F: FnMut(&mut Command) -> io::Result<CommandOutput>,
{
    fn run(&mut self, command: &mut Command) -> io::Result<CommandOutput> {
        self(command)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&mut self, command: &mut Command) -> io::Result<CommandOutput> {
        command.output().map(CommandOutput::from)
    }
}

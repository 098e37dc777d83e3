// External process runner
//
// Every ffmpeg invocation goes through here. Output is captured, never
// streamed; on failure the label, exit status and stderr are handed back
// verbatim so the caller can report them.

use std::fmt;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use crate::error::Result;

/// Program plus arguments, built before anything is spawned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

#[cfg(test)]
impl CommandSpec {
    /// True when `needle` appears as a whole argument.
    pub fn has_arg(&self, needle: &str) -> bool {
        self.args.iter().any(|a| a == needle)
    }

    /// Value following `flag`, e.g. `value_of("-i")`.
    pub fn value_of(&self, flag: &str) -> Option<&str> {
        self.args
            .iter()
            .position(|a| a == flag)
            .and_then(|i| self.args.get(i + 1))
            .map(String::as_str)
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            if arg.contains(' ') {
                write!(f, " \"{}\"", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

/// Outcome of one external invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessResult {
    pub success: bool,
    /// None when the process was killed by a signal
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessResult {
    pub fn ok() -> Self {
        Self {
            success: true,
            exit_code: Some(0),
            stdout: String::new(),
            stderr: String::new(),
        }
    }

    pub fn failed(exit_code: Option<i32>, stderr: impl Into<String>) -> Self {
        Self {
            success: false,
            exit_code,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn exit_description(&self) -> String {
        match self.exit_code {
            Some(code) => format!("exit code {}", code),
            None => "terminated by signal".to_string(),
        }
    }

    /// Operator-facing failure report: label, exit status, captured stderr.
    pub fn failure_detail(&self, label: &str) -> String {
        let stderr = self.stderr.trim_end();
        if stderr.is_empty() {
            format!("{} ({}, no diagnostic output)", label, self.exit_description())
        } else {
            format!("{} ({}):\n{}", label, self.exit_description(), stderr)
        }
    }
}

/// Runs external commands. `SystemRunner` is the real one; tests swap in fakes.
pub trait ProcessRunner {
    fn execute(&self, spec: &CommandSpec, label: &str) -> Result<ProcessResult>;
}

/// Blocking std::process runner.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl ProcessRunner for SystemRunner {
    fn execute(&self, spec: &CommandSpec, label: &str) -> Result<ProcessResult> {
        log::debug!("[{}] {}", label, spec);

        let output = Command::new(&spec.program)
            .args(&spec.args)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| {
                std::io::Error::new(
                    e.kind(),
                    format!("{}: failed to launch {}: {}", label, spec.program.display(), e),
                )
            })?;

        let result = ProcessResult {
            success: output.status.success(),
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        if !result.success {
            log::debug!("[{}] exited with {}", label, result.exit_description());
        }

        Ok(result)
    }
}

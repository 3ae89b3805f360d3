use crate::error::{BuildError, Result};
use crate::tools::{ToolInvocation, ToolOutput, ToolRunner};
use std::process::Command;
use tracing::debug;

/// Maximum number of trailing output lines kept in a failure message
const FAILURE_TAIL_LINES: usize = 20;

/// Runs tools as child processes and waits for them
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    pub fn new() -> Self {
        ProcessRunner
    }
}

impl ToolRunner for ProcessRunner {
    fn run(&self, invocation: &ToolInvocation) -> Result<ToolOutput> {
        debug!(command = %invocation, "running external tool");

        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args);
        for (key, value) in &invocation.env {
            cmd.env(key, value);
        }
        if let Some(dir) = &invocation.cwd {
            cmd.current_dir(dir);
        }

        let output = cmd.output().map_err(|e| {
            BuildError::tool_failure(&invocation.program, "could not be started", e.to_string())
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            // pdflatex reports errors on stdout, most other tools on stderr
            let detail = if stderr.trim().is_empty() {
                tail(&stdout, FAILURE_TAIL_LINES)
            } else {
                tail(&stderr, FAILURE_TAIL_LINES)
            };
            return Err(BuildError::tool_failure(
                &invocation.program,
                output.status.to_string(),
                detail,
            ));
        }

        Ok(ToolOutput { stdout, stderr })
    }
}

fn tail(text: &str, lines: usize) -> String {
    let all: Vec<&str> = text.lines().collect();
    let start = all.len().saturating_sub(lines);
    all[start..].join("\n")
}

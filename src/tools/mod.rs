//! External tool invocation
//!
//! Every external executable (git, inkscape, pdflatex) is called through the
//! [ToolRunner] trait so the build can be driven by a mock in tests.
//!
//! - [process::ProcessRunner]: runs real processes with `std::process::Command`
//! - [mock::MockRunner]: records invocations and delegates to a closure

pub mod mock;
pub mod process;

pub use mock::MockRunner;
pub use process::ProcessRunner;

use crate::error::Result;
use std::ffi::OsString;
use std::fmt;
use std::path::PathBuf;

/// A single command line to execute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocation {
    /// Executable name or path, resolved via `PATH`
    pub program: String,
    /// Arguments, in order
    pub args: Vec<OsString>,
    /// Additional environment variables
    pub env: Vec<(String, OsString)>,
    /// Working directory; inherited when `None`
    pub cwd: Option<PathBuf>,
}

impl ToolInvocation {
    /// Create an invocation of `program` without arguments
    pub fn new(program: impl Into<String>) -> Self {
        ToolInvocation {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            cwd: None,
        }
    }

    /// Append one argument
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set an environment variable for the child
    pub fn env(mut self, key: impl Into<String>, value: impl Into<OsString>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Run the child in `dir`
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Arguments as lossy UTF-8, convenient for matching in tests
    pub fn args_lossy(&self) -> Vec<String> {
        self.args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }
}

impl fmt::Display for ToolInvocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg.to_string_lossy())?;
        }
        Ok(())
    }
}

/// Captured output of a successful invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Runs external tools
///
/// Implementations must map a missing executable or a non-zero exit status to
/// [crate::error::BuildError::ExternalToolFailure].
pub trait ToolRunner: Send + Sync {
    fn run(&self, invocation: &ToolInvocation) -> Result<ToolOutput>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invocation_builder() {
        let inv = ToolInvocation::new("inkscape")
            .arg("--export-pdf")
            .args(["out.pdf", "in.svg"])
            .env("LANG", "C");

        assert_eq!(inv.args_lossy(), vec!["--export-pdf", "out.pdf", "in.svg"]);
        assert_eq!(inv.env.len(), 1);
        assert_eq!(inv.to_string(), "inkscape --export-pdf out.pdf in.svg");
    }
}

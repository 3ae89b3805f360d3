use crate::error::Result;
use crate::tools::{ToolInvocation, ToolOutput, ToolRunner};
use std::sync::Mutex;

type Handler = dyn Fn(&ToolInvocation) -> Result<ToolOutput> + Send + Sync;

/// Mock tool runner for testing without external executables
///
/// Every invocation is recorded; the handler decides what happens (typically
/// writing the files the real tool would produce).
pub struct MockRunner {
    handler: Box<Handler>,
    calls: Mutex<Vec<ToolInvocation>>,
}

impl MockRunner {
    /// Create a runner that answers every invocation with `handler`
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&ToolInvocation) -> Result<ToolOutput> + Send + Sync + 'static,
    {
        MockRunner {
            handler: Box::new(handler),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Create a runner where every invocation succeeds without doing anything
    pub fn succeeding() -> Self {
        Self::new(|_| Ok(ToolOutput::default()))
    }

    /// All invocations so far, in call order
    pub fn calls(&self) -> Vec<ToolInvocation> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    /// Number of invocations of `program`
    pub fn count(&self, program: &str) -> usize {
        self.calls()
            .iter()
            .filter(|inv| inv.program == program)
            .count()
    }
}

impl Default for MockRunner {
    fn default() -> Self {
        Self::succeeding()
    }
}

impl ToolRunner for MockRunner {
    fn run(&self, invocation: &ToolInvocation) -> Result<ToolOutput> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(invocation.clone());
        }
        (self.handler)(invocation)
    }
}

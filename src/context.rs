//! Incremental execution of tool invocations.
//!
//! A [Task] declares the files it reads and writes; [BuildContext] redoes it
//! only when something it depends on changed since its last successful redo.

use crate::error::{BuildError, Result};
use crate::graph::TaskGraph;
use crate::state::{hash_file, BuildState, TaskRecord};
use crate::tools::ToolRunner;
use std::collections::HashSet;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::thread;
use tracing::debug;

/// What a running task may use
pub struct RedoContext<'a> {
    pub runner: &'a dyn ToolRunner,
    pub root: &'a Path,
}

/// Result of a successful redo
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RedoOutcome {
    /// Files the tool turned out to read, beyond the declared inputs
    pub discovered_inputs: Vec<PathBuf>,
}

/// One tool invocation with file dependencies
pub trait Task: Send + Sync {
    /// Human-readable name used in messages
    fn name(&self) -> String;

    /// Files that must exist before the redo; a content change triggers a redo
    fn inputs(&self) -> Vec<PathBuf>;

    /// Files the redo produces; a missing output triggers a redo
    fn outputs(&self) -> Vec<PathBuf>;

    /// Files both read and written; the task is stable once a redo leaves
    /// them unchanged
    fn state_files(&self) -> Vec<PathBuf> {
        Vec::new()
    }

    /// Everything besides file content that determines the result, typically
    /// the command line
    fn fingerprint(&self) -> String;

    fn redo(&self, ctx: &RedoContext<'_>) -> Result<RedoOutcome>;
}

/// Why a task has to be redone
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedoReason {
    NeverRun,
    FingerprintChanged,
    OutputMissing(PathBuf),
    StateFileMissing(PathBuf),
    StateFileChanged(PathBuf),
    InputChanged(PathBuf),
}

impl fmt::Display for RedoReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RedoReason::NeverRun => write!(f, "never run before"),
            RedoReason::FingerprintChanged => write!(f, "command changed"),
            RedoReason::OutputMissing(p) => write!(f, "output missing: {}", p.display()),
            RedoReason::StateFileMissing(p) => write!(f, "state file missing: {}", p.display()),
            RedoReason::StateFileChanged(p) => write!(f, "state file changed: {}", p.display()),
            RedoReason::InputChanged(p) => write!(f, "input changed: {}", p.display()),
        }
    }
}

/// Counts of one [BuildContext::run_all]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub redone: usize,
    pub up_to_date: usize,
}

/// Decides which tasks to redo and records their state
pub struct BuildContext<'r> {
    root: PathBuf,
    runner: &'r dyn ToolRunner,
    state: BuildState,
    jobs: usize,
}

impl<'r> BuildContext<'r> {
    /// Open a context for the project at `root`, keeping records in `state_file`
    pub fn open(
        root: impl Into<PathBuf>,
        state_file: impl Into<PathBuf>,
        runner: &'r dyn ToolRunner,
    ) -> Result<Self> {
        let root = root.into();
        let state = BuildState::load(state_file, &root)?;
        Ok(BuildContext {
            root,
            runner,
            state,
            jobs: 1,
        })
    }

    /// Run up to `jobs` independent tasks at the same time in [BuildContext::run_all]
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn redo_context(&self) -> RedoContext<'_> {
        RedoContext {
            runner: self.runner,
            root: &self.root,
        }
    }

    fn task_key(&self, task: &dyn Task) -> String {
        task.outputs()
            .first()
            .map(|path| self.state.path_key(path))
            .unwrap_or_else(|| task.name())
    }

    fn hash_input(&self, task: &dyn Task, input: &Path) -> Result<String> {
        hash_file(input)?.ok_or_else(|| {
            BuildError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("input of '{}' does not exist: {}", task.name(), input.display()),
            ))
        })
    }

    /// Why `task` needs a redo, or `None` if it is up to date.
    ///
    /// # Errors
    /// If a declared input does not exist.
    pub fn redo_reason(&self, task: &dyn Task) -> Result<Option<RedoReason>> {
        let Some(record) = self.state.get(&self.task_key(task)) else {
            return Ok(Some(RedoReason::NeverRun));
        };

        if record.fingerprint != task.fingerprint() {
            return Ok(Some(RedoReason::FingerprintChanged));
        }

        if let Some(missing) = task.outputs().into_iter().find(|p| !p.exists()) {
            return Ok(Some(RedoReason::OutputMissing(missing)));
        }

        for state_file in task.state_files() {
            match hash_file(&state_file)? {
                None => return Ok(Some(RedoReason::StateFileMissing(state_file))),
                Some(hash) => {
                    if record.state.get(&self.state.path_key(&state_file)) != Some(&hash) {
                        return Ok(Some(RedoReason::StateFileChanged(state_file)));
                    }
                }
            }
        }

        let mut explicit = HashSet::new();
        for input in task.inputs() {
            let key = self.state.path_key(&input);
            let hash = self.hash_input(task, &input)?;
            if record.inputs.get(&key) != Some(&hash) {
                return Ok(Some(RedoReason::InputChanged(input)));
            }
            explicit.insert(key);
        }

        for (key, hash) in &record.inputs {
            if explicit.contains(key) {
                continue;
            }
            let path = self.state.key_path(key);
            if hash_file(&path)?.as_ref() != Some(hash) {
                return Ok(Some(RedoReason::InputChanged(path)));
            }
        }

        Ok(None)
    }

    /// Hashes of inputs and state files as they are before a redo.
    ///
    /// Inputs discovered by the previous redo are hashed here as well, so an
    /// edit made while the tool runs is seen by the next build.
    fn snapshot(&self, task: &dyn Task) -> Result<TaskRecord> {
        let mut record = TaskRecord {
            fingerprint: task.fingerprint(),
            ..TaskRecord::default()
        };
        for input in task.inputs() {
            let hash = self.hash_input(task, &input)?;
            record.inputs.insert(self.state.path_key(&input), hash);
        }
        if let Some(previous) = self.state.get(&self.task_key(task)) {
            for key in previous.inputs.keys() {
                if record.inputs.contains_key(key) {
                    continue;
                }
                if let Some(hash) = hash_file(&self.state.key_path(key))? {
                    record.inputs.insert(key.clone(), hash);
                }
            }
        }
        for state_file in task.state_files() {
            if let Some(hash) = hash_file(&state_file)? {
                record.state.insert(self.state.path_key(&state_file), hash);
            }
        }
        Ok(record)
    }

    /// Store `record` with the inputs the redo actually read.
    ///
    /// Discovered inputs keep their hash from [BuildContext::snapshot]. Only an
    /// input seen for the first time is hashed after the redo; files the redo
    /// no longer read are dropped from the record.
    fn finish(&mut self, task: &dyn Task, mut record: TaskRecord, outcome: RedoOutcome) -> Result<()> {
        let produced: HashSet<PathBuf> = task
            .outputs()
            .into_iter()
            .chain(task.state_files())
            .collect();
        let explicit: HashSet<String> = task
            .inputs()
            .iter()
            .map(|input| self.state.path_key(input))
            .collect();

        let mut before = std::mem::take(&mut record.inputs);
        record.inputs = before
            .iter()
            .filter(|(key, _)| explicit.contains(*key))
            .map(|(key, hash)| (key.clone(), hash.clone()))
            .collect();

        for input in outcome.discovered_inputs {
            if produced.contains(&input) {
                continue;
            }
            let key = self.state.path_key(&input);
            if record.inputs.contains_key(&key) {
                continue;
            }
            let hash = match before.remove(&key) {
                Some(hash) => Some(hash),
                None => hash_file(&input)?,
            };
            if let Some(hash) = hash {
                record.inputs.insert(key, hash);
            }
        }

        let key = self.task_key(task);
        self.state.update(key, record)
    }

    /// Redo `task` if needed.
    ///
    /// Returns `true` if the task was redone. A failed redo keeps the previous
    /// record, so the task is redone next time.
    pub fn run(&mut self, task: &dyn Task) -> Result<bool> {
        let Some(reason) = self.redo_reason(task)? else {
            debug!(task = %task.name(), "up to date");
            return Ok(false);
        };

        debug!(task = %task.name(), %reason, "redo");
        let record = self.snapshot(task)?;
        let outcome = task.redo(&self.redo_context())?;
        self.finish(task, record, outcome)?;
        Ok(true)
    }

    /// Run a set of tasks in dependency order.
    ///
    /// Tasks of one dependency level run concurrently when more than one job
    /// is configured. The first failure is returned once its level finished;
    /// later levels are not started.
    pub fn run_all(&mut self, tasks: &[&dyn Task]) -> Result<RunSummary> {
        let graph = TaskGraph::new(tasks.to_vec())?;
        let mut summary = RunSummary::default();

        for level in graph.levels()? {
            let mut pending = Vec::new();
            for task in level {
                match self.redo_reason(task)? {
                    Some(reason) => {
                        debug!(task = %task.name(), %reason, "redo");
                        pending.push((task, self.snapshot(task)?));
                    }
                    None => {
                        debug!(task = %task.name(), "up to date");
                        summary.up_to_date += 1;
                    }
                }
            }

            let results = self.redo_level(&pending);
            let mut first_error = None;
            for ((task, record), result) in pending.into_iter().zip(results) {
                match result {
                    Ok(outcome) => {
                        self.finish(task, record, outcome)?;
                        summary.redone += 1;
                    }
                    Err(e) => {
                        first_error.get_or_insert(e);
                    }
                }
            }
            if let Some(e) = first_error {
                return Err(e);
            }
        }

        Ok(summary)
    }

    fn redo_level(&self, pending: &[(&dyn Task, TaskRecord)]) -> Vec<Result<RedoOutcome>> {
        let ctx = self.redo_context();
        if self.jobs <= 1 || pending.len() <= 1 {
            return pending.iter().map(|(task, _)| task.redo(&ctx)).collect();
        }

        let next = AtomicUsize::new(0);
        let slots: Mutex<Vec<Option<Result<RedoOutcome>>>> =
            Mutex::new(pending.iter().map(|_| None).collect());

        thread::scope(|scope| {
            for _ in 0..self.jobs.min(pending.len()) {
                scope.spawn(|| loop {
                    let index = next.fetch_add(1, Ordering::Relaxed);
                    let Some((task, _)) = pending.get(index) else {
                        break;
                    };
                    let result = task.redo(&ctx);
                    if let Ok(mut slots) = slots.lock() {
                        slots[index] = Some(result);
                    }
                });
            }
        });

        slots
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .into_iter()
            .zip(pending)
            .map(|(slot, (task, _))| {
                slot.unwrap_or_else(|| {
                    Err(BuildError::graph(format!("'{}' did not complete", task.name())))
                })
            })
            .collect()
    }
}

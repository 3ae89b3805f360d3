use crate::domain::describe::{DescribeFacts, FULL_HASH_LENGTH};
use crate::error::Result;
use crate::git::tag_match_pattern;
use crate::tools::{ToolInvocation, ToolRunner};
use std::path::PathBuf;

/// Describer running the `git` executable
pub struct CommandDescriber<'a> {
    runner: &'a dyn ToolRunner,
    git: String,
    work_tree: PathBuf,
    tag_prefix: String,
}

impl<'a> CommandDescriber<'a> {
    pub fn new(
        runner: &'a dyn ToolRunner,
        git: impl Into<String>,
        work_tree: impl Into<PathBuf>,
        tag_prefix: impl Into<String>,
    ) -> Self {
        CommandDescriber {
            runner,
            git: git.into(),
            work_tree: work_tree.into(),
            tag_prefix: tag_prefix.into(),
        }
    }

    fn git(&self) -> ToolInvocation {
        ToolInvocation::new(&self.git).current_dir(&self.work_tree)
    }
}

impl super::Describe for CommandDescriber<'_> {
    fn describe(&self) -> Result<DescribeFacts> {
        let describe = self.runner.run(&self.git().args([
            "describe".to_string(),
            "--long".to_string(),
            format!("--abbrev={}", FULL_HASH_LENGTH),
            "--match".to_string(),
            tag_match_pattern(&self.tag_prefix),
        ]))?;

        let status = self
            .runner
            .run(&self.git().args(["status", "--porcelain", "--untracked-files=no"]))?;
        let dirty = status.stdout.lines().any(|line| !line.trim().is_empty());

        DescribeFacts::from_long_describe(&describe.stdout, dirty)
    }
}

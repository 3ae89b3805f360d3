use crate::domain::describe::{DescribeFacts, FULL_HASH_LENGTH};
use crate::error::{BuildError, Result};
use crate::git::tag_match_pattern;
use git2::{DescribeFormatOptions, DescribeOptions, Repository as Git2Repo, Status, StatusOptions};
use std::path::Path;
use tracing::debug;

/// Describer backed by an in-process `git2::Repository`
pub struct Git2Describer {
    repo: Git2Repo,
    tag_prefix: String,
}

impl Git2Describer {
    /// Open or discover a git repository
    pub fn open<P: AsRef<Path>>(path: P, tag_prefix: impl Into<String>) -> Result<Self> {
        let repo = Git2Repo::discover(path)?;

        Ok(Git2Describer {
            repo,
            tag_prefix: tag_prefix.into(),
        })
    }

    /// Create from existing git2::Repository
    pub fn from_git2(repo: Git2Repo, tag_prefix: impl Into<String>) -> Self {
        Git2Describer {
            repo,
            tag_prefix: tag_prefix.into(),
        }
    }

    /// Whether any tracked file differs from HEAD in the index or worktree.
    ///
    /// Untracked and ignored files do not count.
    pub fn has_changes_in_tracked_files(&self) -> Result<bool> {
        let mut opts = StatusOptions::new();
        opts.include_untracked(false)
            .include_ignored(false)
            .exclude_submodules(true);

        let statuses = self.repo.statuses(Some(&mut opts))?;
        Ok(statuses
            .iter()
            .any(|entry| entry.status() != Status::CURRENT))
    }
}

impl super::Describe for Git2Describer {
    fn describe(&self) -> Result<DescribeFacts> {
        let pattern = tag_match_pattern(&self.tag_prefix);

        // Annotated tags only: describe_tags() is left unset.
        let mut opts = DescribeOptions::new();
        opts.pattern(&pattern);

        let describe = self.repo.describe(&opts).map_err(|e| {
            BuildError::describe(format!(
                "no annotated tag matching '{}' reachable from HEAD: {}",
                pattern,
                e.message()
            ))
        })?;

        let mut format = DescribeFormatOptions::new();
        format
            .abbreviated_size(FULL_HASH_LENGTH as u32)
            .always_use_long_format(true);
        let text = describe.format(Some(&format))?;
        debug!(describe = %text, "described HEAD");

        DescribeFacts::from_long_describe(&text, self.has_changes_in_tracked_files()?)
    }
}

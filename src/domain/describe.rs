//! Working-directory version derived from `git describe` style facts

use crate::domain::version::{VersionComponents, VersionTag};
use crate::error::{BuildError, Result};
use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

/// Default number of commit hash characters in a working-directory version
pub const DEFAULT_HASH_LENGTH: usize = 8;

/// Length of a full SHA-1 commit hash in hex
pub const FULL_HASH_LENGTH: usize = 40;

/// Repository state relative to the latest reachable annotated version tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescribeFacts {
    /// Name of the latest annotated tag reachable from HEAD, e.g. `v1.2.3`
    pub tag_name: String,
    /// Number of commits from the tag to HEAD
    pub commits_since_tag: u64,
    /// Full hash of HEAD
    pub latest_commit_hash: String,
    /// Whether tracked files differ from HEAD (index or worktree)
    pub has_changes_in_tracked_files: bool,
}

impl DescribeFacts {
    /// Build facts from long describe output (`<tag>-<count>-g<hash>`).
    ///
    /// Dirtiness is not part of the describe output and is passed separately.
    pub fn from_long_describe(output: &str, has_changes_in_tracked_files: bool) -> Result<Self> {
        static RE: OnceLock<Regex> = OnceLock::new();
        let re = RE.get_or_init(|| {
            Regex::new(r"^(?P<tag>.+)-(?P<count>0|[1-9][0-9]*)-g(?P<hash>[0-9a-f]{40})$")
                .expect("describe pattern is valid")
        });

        let trimmed = output.trim();
        let caps = re.captures(trimmed).ok_or_else(|| {
            BuildError::describe(format!("unexpected describe output: '{}'", trimmed))
        })?;

        let commits_since_tag = caps["count"].parse::<u64>().map_err(|_| {
            BuildError::describe(format!("commit count out of range: '{}'", &caps["count"]))
        })?;

        Ok(DescribeFacts {
            tag_name: caps["tag"].to_string(),
            commits_since_tag,
            latest_commit_hash: caps["hash"].to_string(),
            has_changes_in_tracked_files,
        })
    }
}

/// Clamp a configured hash length into `1..=40`.
pub fn clamp_hash_length(configured: usize) -> usize {
    configured.clamp(1, FULL_HASH_LENGTH)
}

/// Version of the working directory, e.g. `1.2.3` or `1.2.3c4-dev5+deadbeef@`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkingDirectoryVersion {
    pub wd_version: String,
    pub components: VersionComponents,
}

impl WorkingDirectoryVersion {
    /// Derive the working-directory version from describe facts.
    ///
    /// # Arguments
    /// * `facts` - Repository state relative to the latest version tag
    /// * `tag_prefix` - Prefix stripped from the tag name (usually `v`)
    /// * `hash_length` - Commit hash characters to keep, clamped to `1..=40`
    ///
    /// # Errors
    /// `BuildError::InvalidVersionTag` when the tag does not match the version grammar.
    pub fn resolve(facts: &DescribeFacts, tag_prefix: &str, hash_length: usize) -> Result<Self> {
        let tag = VersionTag::parse(&facts.tag_name, tag_prefix)?;

        let mut wd_version = tag.version();
        if facts.commits_since_tag > 0 {
            let hash_length = clamp_hash_length(hash_length);
            let prefix: String = facts.latest_commit_hash.chars().take(hash_length).collect();
            wd_version.push_str(&format!("-dev{}+{}", facts.commits_since_tag, prefix));
        }
        if facts.has_changes_in_tracked_files {
            wd_version.push('@');
        }

        Ok(WorkingDirectoryVersion {
            wd_version,
            components: tag.components,
        })
    }
}

impl fmt::Display for WorkingDirectoryVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.wd_version)
    }
}

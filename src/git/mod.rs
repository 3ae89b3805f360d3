//! Repository introspection for the working-directory version
//!
//! The build only needs one fact set from version control: the latest
//! annotated version tag reachable from HEAD, the commits since, the HEAD hash
//! and whether tracked files are modified. The [Describe] trait provides it;
//! implementations are:
//!
//! - [repository::Git2Describer]: in-process using the `git2` crate
//! - [command::CommandDescriber]: the `git` executable through a [crate::tools::ToolRunner]
//! - [mock::MockDescriber]: fixed facts for testing
//!
//! ```rust
//! # use doc_build::git::{Describe, MockDescriber};
//! # use doc_build::domain::DescribeFacts;
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let describer = MockDescriber::new(DescribeFacts {
//!     tag_name: "v1.0.0".to_string(),
//!     commits_since_tag: 0,
//!     latest_commit_hash: "0".repeat(40),
//!     has_changes_in_tracked_files: false,
//! });
//! assert_eq!(describer.describe()?.tag_name, "v1.0.0");
//! # Ok(())
//! # }
//! ```

pub mod command;
pub mod mock;
pub mod repository;

pub use command::CommandDescriber;
pub use mock::MockDescriber;
pub use repository::Git2Describer;

use crate::config::{DescribeBackend, VersionConfig};
use crate::domain::DescribeFacts;
use crate::error::Result;
use crate::tools::ToolRunner;
use std::path::Path;

/// `git describe`-style introspection of a working directory
///
/// ## Error Handling
///
/// A repository without a reachable annotated version tag is an error, as is
/// any failure of the underlying git access. Both are fatal for a build.
pub trait Describe {
    /// Describe HEAD relative to the latest reachable annotated version tag
    fn describe(&self) -> Result<DescribeFacts>;
}

/// Create the describer selected by `version.backend` for the work tree at `root`
pub fn describer_for<'a>(
    version: &VersionConfig,
    git: &str,
    root: &Path,
    runner: &'a dyn ToolRunner,
) -> Result<Box<dyn Describe + 'a>> {
    let describer: Box<dyn Describe + 'a> = match version.backend {
        DescribeBackend::Libgit2 => Box::new(Git2Describer::open(root, &version.tag_prefix)?),
        DescribeBackend::Command => Box::new(CommandDescriber::new(
            runner,
            git,
            root,
            &version.tag_prefix,
        )),
    };
    Ok(describer)
}

/// Glob matching tags `<prefix><digit>...`
pub(crate) fn tag_match_pattern(tag_prefix: &str) -> String {
    format!("{}[0-9]*", tag_prefix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_match_pattern() {
        assert_eq!(tag_match_pattern("v"), "v[0-9]*");
        assert_eq!(tag_match_pattern("release-"), "release-[0-9]*");
    }
}

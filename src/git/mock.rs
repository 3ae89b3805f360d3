use crate::domain::DescribeFacts;
use crate::error::{BuildError, Result};
use crate::git::Describe;
use std::cell::Cell;

/// Mock describer for testing without a repository
pub struct MockDescriber {
    facts: Option<DescribeFacts>,
    calls: Cell<usize>,
}

impl MockDescriber {
    /// Create a describer that always returns `facts`
    pub fn new(facts: DescribeFacts) -> Self {
        MockDescriber {
            facts: Some(facts),
            calls: Cell::new(0),
        }
    }

    /// Create a describer for a repository without any version tag
    pub fn without_tag() -> Self {
        MockDescriber {
            facts: None,
            calls: Cell::new(0),
        }
    }

    /// Number of `describe` calls so far
    pub fn calls(&self) -> usize {
        self.calls.get()
    }
}

impl Describe for MockDescriber {
    fn describe(&self) -> Result<DescribeFacts> {
        self.calls.set(self.calls.get() + 1);
        self.facts
            .clone()
            .ok_or_else(|| BuildError::describe("no annotated tag reachable from HEAD"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_describer_returns_facts() {
        let facts = DescribeFacts {
            tag_name: "v1.0.0".to_string(),
            commits_since_tag: 2,
            latest_commit_hash: "a".repeat(40),
            has_changes_in_tracked_files: true,
        };
        let describer = MockDescriber::new(facts.clone());

        assert_eq!(describer.describe().unwrap(), facts);
        assert_eq!(describer.calls(), 1);
    }

    #[test]
    fn test_mock_describer_without_tag() {
        let err = MockDescriber::without_tag().describe().unwrap_err();
        assert!(err.to_string().contains("no annotated tag"));
    }
}

use crate::error::{BuildError, Result};
use regex::Regex;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// Grammar every version tag must match after its prefix is removed.
///
/// No numeric run may carry a leading zero; `0` itself is fine.
const VERSION_PATTERN: &str = concat!(
    r"^(?P<major>0|[1-9][0-9]*)\.(?P<minor>0|[1-9][0-9]*)\.(?P<micro>0|[1-9][0-9]*)",
    r"((?P<pre>[abc])(?P<pre_number>0|[1-9][0-9]*))?$",
);

fn version_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(VERSION_PATTERN).expect("version pattern is valid"))
}

/// Pre-release letter of a version tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PreReleaseLetter {
    A,
    B,
    C,
}

impl PreReleaseLetter {
    /// The letter as it appears in a tag
    pub fn as_char(&self) -> char {
        match self {
            PreReleaseLetter::A => 'a',
            PreReleaseLetter::B => 'b',
            PreReleaseLetter::C => 'c',
        }
    }

    fn from_char(c: char) -> Option<Self> {
        match c {
            'a' => Some(PreReleaseLetter::A),
            'b' => Some(PreReleaseLetter::B),
            'c' => Some(PreReleaseLetter::C),
            _ => None,
        }
    }
}

impl fmt::Display for PreReleaseLetter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// Structured form of a version tag: `(major, minor, micro, letter, number)`
///
/// `pre_letter` and `pre_number` are either both present or both absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VersionComponents {
    pub major: u64,
    pub minor: u64,
    pub micro: u64,
    pub pre_letter: Option<PreReleaseLetter>,
    pub pre_number: Option<u64>,
}

impl VersionComponents {
    /// Create a release version without pre-release part
    pub fn new(major: u64, minor: u64, micro: u64) -> Self {
        VersionComponents {
            major,
            minor,
            micro,
            pre_letter: None,
            pre_number: None,
        }
    }

    /// Create a pre-release version such as `1.2.3b4`
    pub fn pre_release(
        major: u64,
        minor: u64,
        micro: u64,
        letter: PreReleaseLetter,
        number: u64,
    ) -> Self {
        VersionComponents {
            major,
            minor,
            micro,
            pre_letter: Some(letter),
            pre_number: Some(number),
        }
    }

    /// Parse a bare version (no tag prefix).
    ///
    /// # Errors
    /// `BuildError::InvalidVersionTag` if `version` does not match the grammar.
    pub fn parse(version: &str) -> Result<Self> {
        let caps = version_regex()
            .captures(version)
            .ok_or_else(|| BuildError::InvalidVersionTag(version.to_string()))?;

        // Runs are bounded by the regex but may still overflow u64.
        let number = |name: &str| -> Result<u64> {
            caps[name]
                .parse::<u64>()
                .map_err(|_| BuildError::InvalidVersionTag(version.to_string()))
        };

        let pre_letter = caps
            .name("pre")
            .and_then(|m| m.as_str().chars().next())
            .and_then(PreReleaseLetter::from_char);
        let pre_number = match caps.name("pre_number") {
            Some(_) => Some(number("pre_number")?),
            None => None,
        };

        Ok(VersionComponents {
            major: number("major")?,
            minor: number("minor")?,
            micro: number("micro")?,
            pre_letter,
            pre_number,
        })
    }

    /// Whether this version carries a pre-release part
    pub fn is_pre_release(&self) -> bool {
        self.pre_letter.is_some()
    }

    /// Convert to a semantic version; `1.2.3a4` becomes `1.2.3-a.4`.
    pub fn to_semver(&self) -> semver::Version {
        let mut version = semver::Version::new(self.major, self.minor, self.micro);
        if let (Some(letter), Some(number)) = (self.pre_letter, self.pre_number) {
            // "<letter>.<number>" is always a valid pre-release identifier
            if let Ok(pre) = semver::Prerelease::new(&format!("{}.{}", letter, number)) {
                version.pre = pre;
            }
        }
        version
    }
}

impl FromStr for VersionComponents {
    type Err = BuildError;

    fn from_str(s: &str) -> Result<Self> {
        VersionComponents::parse(s)
    }
}

impl fmt::Display for VersionComponents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.micro)?;
        if let (Some(letter), Some(number)) = (self.pre_letter, self.pre_number) {
            write!(f, "{}{}", letter, number)?;
        }
        Ok(())
    }
}

/// A validated version tag, e.g. `v1.2.3c4`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionTag {
    pub name: String,
    pub components: VersionComponents,
}

impl VersionTag {
    /// Validate `tag_name` by stripping `prefix` and parsing the rest.
    ///
    /// The whole tag name is reported in the error, not just the remainder.
    pub fn parse(tag_name: &str, prefix: &str) -> Result<Self> {
        let version = tag_name
            .strip_prefix(prefix)
            .ok_or_else(|| BuildError::InvalidVersionTag(tag_name.to_string()))?;

        let components = VersionComponents::parse(version)
            .map_err(|_| BuildError::InvalidVersionTag(tag_name.to_string()))?;

        Ok(VersionTag {
            name: tag_name.to_string(),
            components,
        })
    }

    /// The version part of the tag, without prefix
    pub fn version(&self) -> String {
        self.components.to_string()
    }
}

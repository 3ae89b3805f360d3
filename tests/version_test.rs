// tests/version_test.rs
use doc_build::domain::{clamp_hash_length, DescribeFacts, VersionComponents, WorkingDirectoryVersion};
use doc_build::BuildError;

const HASH: &str = "0123456789abcdef0123456789abcdef01234567";

fn facts(tag: &str, commits: u64, dirty: bool) -> DescribeFacts {
    DescribeFacts {
        tag_name: tag.to_string(),
        commits_since_tag: commits,
        latest_commit_hash: HASH.to_string(),
        has_changes_in_tracked_files: dirty,
    }
}

fn wd(tag: &str, commits: u64, dirty: bool) -> String {
    WorkingDirectoryVersion::resolve(&facts(tag, commits, dirty), "v", 8)
        .unwrap()
        .wd_version
}

#[test]
fn test_clean_tagged_commit() {
    assert_eq!(wd("v1.2.3", 0, false), "1.2.3");
}

#[test]
fn test_dirty_tagged_commit() {
    assert_eq!(wd("v1.2.3", 0, true), "1.2.3@");
}

#[test]
fn test_commits_after_tag() {
    assert_eq!(wd("v1.2.3", 5, false), "1.2.3-dev5+01234567");
}

#[test]
fn test_commits_after_tag_and_dirty() {
    assert_eq!(wd("v1.2.3c4", 5, true), "1.2.3c4-dev5+01234567@");
}

#[test]
fn test_components_of_pre_release() {
    let version = WorkingDirectoryVersion::resolve(&facts("v1.2.3c4", 0, false), "v", 8).unwrap();
    let c = version.components;
    assert_eq!((c.major, c.minor, c.micro), (1, 2, 3));
    assert_eq!(c.pre_letter.map(|l| l.as_char()), Some('c'));
    assert_eq!(c.pre_number, Some(4));

    let version = WorkingDirectoryVersion::resolve(&facts("v0.10.0", 3, false), "v", 8).unwrap();
    assert_eq!(version.components, VersionComponents::new(0, 10, 0));
    assert!(!version.components.is_pre_release());
}

#[test]
fn test_hash_length_is_clamped() {
    assert_eq!(clamp_hash_length(0), 1);
    assert_eq!(clamp_hash_length(8), 8);
    assert_eq!(clamp_hash_length(100), 40);

    let short = WorkingDirectoryVersion::resolve(&facts("v1.0.0", 1, false), "v", 0).unwrap();
    assert_eq!(short.wd_version, "1.0.0-dev1+0");

    let full = WorkingDirectoryVersion::resolve(&facts("v1.0.0", 1, false), "v", 100).unwrap();
    assert_eq!(full.wd_version, format!("1.0.0-dev1+{}", HASH));
}

#[test]
fn test_leading_zeros_rejected() {
    for tag in ["v01.2.3", "v1.02.3", "v1.2.03", "v1.2.3a01"] {
        let err = WorkingDirectoryVersion::resolve(&facts(tag, 0, false), "v", 8).unwrap_err();
        assert!(
            matches!(err, BuildError::InvalidVersionTag(ref name) if name == tag),
            "{} should be rejected, got {:?}",
            tag,
            err
        );
    }
}

#[test]
fn test_malformed_tags_rejected() {
    for tag in ["v1.2", "v1.2.3d1", "v1.2.3a", "v1.2.3-rc1", "1.2.3", "v1.2.3 "] {
        assert!(
            WorkingDirectoryVersion::resolve(&facts(tag, 0, false), "v", 8).is_err(),
            "{} should be rejected",
            tag
        );
    }
}

#[test]
fn test_zero_components_allowed() {
    assert_eq!(wd("v0.0.0", 0, false), "0.0.0");
    assert_eq!(wd("v1.0.0a0", 0, false), "1.0.0a0");
}

#[test]
fn test_long_describe_output() {
    let parsed =
        DescribeFacts::from_long_describe(&format!("v1.2.3-2-g{}\n", HASH), true).unwrap();
    assert_eq!(parsed, facts("v1.2.3", 2, true));

    // Tag names may contain dashes themselves
    let parsed =
        DescribeFacts::from_long_describe(&format!("v1.2.3-x-0-g{}", HASH), false).unwrap();
    assert_eq!(parsed.tag_name, "v1.2.3-x");
    assert_eq!(parsed.commits_since_tag, 0);

    assert!(DescribeFacts::from_long_describe("v1.2.3", false).is_err());
    assert!(DescribeFacts::from_long_describe("v1.2.3-1-gdeadbeef", false).is_err());
}

//! Build artifacts: scoped temporaries promoted atomically on success.
//!
//! A temporary is created next to its final path so the promotion is a rename
//! within one filesystem. Dropping a temporary without promoting it removes
//! it, so a failed step leaves the previous artifact untouched.

use crate::error::{BuildError, Result};
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::{Builder, NamedTempFile, TempDir};

/// What to do when a new artifact has the same content as the existing one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReplacePolicy {
    /// Keep the existing file (and its modification time)
    #[default]
    KeepIfUnchanged,
    /// Always replace the existing file
    Always,
}

fn parent_dir(dest: &Path) -> Result<&Path> {
    let parent = dest.parent().unwrap_or_else(|| Path::new("."));
    let parent = if parent.as_os_str().is_empty() {
        Path::new(".")
    } else {
        parent
    };
    fs::create_dir_all(parent)?;
    Ok(parent)
}

/// Create an empty scoped temporary file next to `dest`.
///
/// The file keeps the extension of `dest`; some tools pick their output format
/// from it.
pub fn temporary_file_for(dest: &Path) -> Result<NamedTempFile> {
    let dir = parent_dir(dest)?;
    let suffix = dest
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default();
    Ok(Builder::new()
        .prefix(".doc-build-")
        .suffix(&suffix)
        .tempfile_in(dir)?)
}

/// Create a scoped temporary directory inside `dir`
pub fn temporary_dir_in(dir: &Path) -> Result<TempDir> {
    fs::create_dir_all(dir)?;
    Ok(Builder::new().prefix(".doc-build-").tempdir_in(dir)?)
}

fn same_content(a: &Path, b: &Path) -> Result<bool> {
    if !b.is_file() {
        return Ok(false);
    }
    let a_meta = fs::metadata(a)?;
    let b_meta = fs::metadata(b)?;
    if a_meta.len() != b_meta.len() {
        return Ok(false);
    }
    Ok(fs::read(a)? == fs::read(b)?)
}

/// Promote a temporary file to `dest`.
///
/// Returns `true` if `dest` was replaced.
pub fn replace_output(temp: NamedTempFile, dest: &Path, policy: ReplacePolicy) -> Result<bool> {
    if policy == ReplacePolicy::KeepIfUnchanged && same_content(temp.path(), dest)? {
        return Ok(false);
    }
    parent_dir(dest)?;
    temp.persist(dest).map_err(|e| BuildError::Io(e.error))?;
    Ok(true)
}

/// Promote a file produced inside a scoped temporary directory to `dest`.
///
/// `source` must be on the same filesystem as `dest`.
pub fn replace_output_from_path(source: &Path, dest: &Path, policy: ReplacePolicy) -> Result<bool> {
    if policy == ReplacePolicy::KeepIfUnchanged && same_content(source, dest)? {
        return Ok(false);
    }
    parent_dir(dest)?;
    fs::rename(source, dest)?;
    Ok(true)
}

/// Write `contents` to `dest` through a scoped temporary file
pub fn write_atomically(dest: &Path, contents: &[u8], policy: ReplacePolicy) -> Result<bool> {
    let mut temp = temporary_file_for(dest)?;
    temp.write_all(contents)?;
    temp.as_file().sync_all()?;
    replace_output(temp, dest, policy)
}

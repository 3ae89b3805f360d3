//! Discovery of vector images and their conversion to PDF.

use crate::artifact::{replace_output, temporary_file_for, ReplacePolicy};
use crate::context::{RedoContext, RedoOutcome, Task};
use crate::error::{BuildError, Result};
use crate::tools::ToolInvocation;
use regex::Regex;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Name filters for image discovery; both must match a whole file name
#[derive(Debug, Clone)]
pub struct ImageFilter {
    name: Regex,
    recurse: Regex,
}

impl ImageFilter {
    /// # Arguments
    /// * `name_filter` - Regex selecting image files, e.g. `[^.]+\.svg`
    /// * `recurse_filter` - Regex selecting directories to descend into, e.g. `[^.]+`
    pub fn new(name_filter: &str, recurse_filter: &str) -> Result<Self> {
        let full = |pattern: &str, what: &str| {
            Regex::new(&format!("^(?:{})$", pattern)).map_err(|e| {
                BuildError::config(format!("invalid {} '{}': {}", what, pattern, e))
            })
        };
        Ok(ImageFilter {
            name: full(name_filter, "images.name_filter")?,
            recurse: full(recurse_filter, "images.recurse_filter")?,
        })
    }

    pub fn matches_file(&self, name: &str) -> bool {
        self.name.is_match(name)
    }

    pub fn matches_dir(&self, name: &str) -> bool {
        self.recurse.is_match(name)
    }
}

/// Find images below `dir`, returned relative to `dir` and sorted.
///
/// A missing `dir` yields no images.
pub fn discover_images(dir: &Path, filter: &ImageFilter) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    if dir.is_dir() {
        collect(dir, Path::new(""), filter, &mut found)?;
    } else {
        debug!(dir = %dir.display(), "image directory does not exist");
    }
    found.sort();
    Ok(found)
}

fn collect(base: &Path, rel: &Path, filter: &ImageFilter, out: &mut Vec<PathBuf>) -> Result<()> {
    for entry in fs::read_dir(base.join(rel))? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };

        if file_type.is_dir() {
            if filter.matches_dir(name) {
                collect(base, &rel.join(name), filter, out)?;
            }
        } else if file_type.is_file() && filter.matches_file(name) {
            out.push(rel.join(name));
        }
    }
    Ok(())
}

/// Path of the converted image mirroring `relative` below `output_dir`
pub fn converted_path(output_dir: &Path, relative: &Path) -> PathBuf {
    output_dir.join(relative).with_extension("pdf")
}

/// Converts one vector image to PDF with an external converter
#[derive(Debug, Clone)]
pub struct ConvertImageTask {
    pub converter: String,
    /// Arguments with `{input}` and `{output}` placeholders
    pub args: Vec<String>,
    pub input: PathBuf,
    pub output: PathBuf,
}

impl ConvertImageTask {
    pub fn new(
        converter: impl Into<String>,
        args: Vec<String>,
        input: impl Into<PathBuf>,
        output: impl Into<PathBuf>,
    ) -> Self {
        ConvertImageTask {
            converter: converter.into(),
            args,
            input: input.into(),
            output: output.into(),
        }
    }

    /// Command line writing to `output`
    pub fn invocation(&self, output: &Path) -> ToolInvocation {
        let args = self
            .args
            .iter()
            .map(|arg| substitute(arg, &self.input, output));
        ToolInvocation::new(&self.converter).args(args)
    }
}

fn substitute(arg: &str, input: &Path, output: &Path) -> OsString {
    match arg {
        "{input}" => input.as_os_str().to_owned(),
        "{output}" => output.as_os_str().to_owned(),
        _ => arg
            .replace("{input}", &input.to_string_lossy())
            .replace("{output}", &output.to_string_lossy())
            .into(),
    }
}

impl Task for ConvertImageTask {
    fn name(&self) -> String {
        format!("convert {}", self.input.display())
    }

    fn inputs(&self) -> Vec<PathBuf> {
        vec![self.input.clone()]
    }

    fn outputs(&self) -> Vec<PathBuf> {
        vec![self.output.clone()]
    }

    fn fingerprint(&self) -> String {
        format!("{} {}", self.converter, self.args.join(" "))
    }

    fn redo(&self, ctx: &RedoContext<'_>) -> Result<RedoOutcome> {
        let temp = temporary_file_for(&self.output)?;
        ctx.runner
            .run(&self.invocation(temp.path()).current_dir(ctx.root))?;
        replace_output(temp, &self.output, ReplacePolicy::KeepIfUnchanged)?;
        Ok(RedoOutcome::default())
    }
}

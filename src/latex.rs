//! LaTeX compilation until the auxiliary files reach a fixed point.

use crate::artifact::{replace_output_from_path, temporary_dir_in, write_atomically, ReplacePolicy};
use crate::context::{BuildContext, RedoContext, RedoOutcome, Task};
use crate::error::{BuildError, Result};
use crate::tools::ToolInvocation;
use std::ffi::OsString;
use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::debug;

#[cfg(windows)]
const SEARCH_PATH_SEPARATOR: &str = ";";
#[cfg(not(windows))]
const SEARCH_PATH_SEPARATOR: &str = ":";

/// Compiles a toplevel `.tex` file to PDF with pdflatex (or a compatible engine)
#[derive(Debug, Clone)]
pub struct LatexTask {
    pub executable: String,
    pub toplevel_file: PathBuf,
    pub output_file: PathBuf,
    pub log_file: PathBuf,
    /// Auxiliary files carried from one run to the next (`.aux`, `.toc`, ...)
    pub state_files: Vec<PathBuf>,
    /// Directories searched for `\input` and `\includegraphics`, in order
    pub input_search_directories: Vec<PathBuf>,
    /// Generated files the document includes
    pub extra_inputs: Vec<PathBuf>,
}

impl LatexTask {
    fn job_name(&self) -> String {
        self.toplevel_file
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string())
    }

    fn scratch_parent(&self) -> PathBuf {
        self.output_file
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Value of `TEXINPUTS`: the search directories followed by the engine's
    /// default path (the trailing empty entry)
    fn texinputs(&self) -> Result<OsString> {
        let mut value = std::env::join_paths(&self.input_search_directories)
            .map_err(|e| BuildError::config(format!("invalid input search directory: {}", e)))?;
        value.push(SEARCH_PATH_SEPARATOR);
        Ok(value)
    }

    /// Command line for one run with all output going to `scratch`
    pub fn invocation(&self, scratch: &Path) -> Result<ToolInvocation> {
        let mut output_directory = OsString::from("-output-directory=");
        output_directory.push(scratch);

        Ok(ToolInvocation::new(&self.executable)
            .args([
                "-interaction=nonstopmode",
                "-halt-on-error",
                "-file-line-error",
                "-recorder",
            ])
            .arg(output_directory)
            .arg(format!("-jobname={}", self.job_name()))
            .arg(&self.toplevel_file)
            .env("TEXINPUTS", self.texinputs()?))
    }

    fn promote(&self, scratch: &Path, extension: &str, dest: &Path, required: bool) -> Result<()> {
        let produced = scratch.join(format!("{}.{}", self.job_name(), extension));
        if produced.is_file() {
            replace_output_from_path(&produced, dest, ReplacePolicy::KeepIfUnchanged)?;
        } else if required {
            return Err(BuildError::tool_failure(
                &self.executable,
                "exit status: 0",
                format!("no {} file produced", extension),
            ));
        } else {
            // Absent state files are recorded as empty so stability can be observed
            write_atomically(dest, b"", ReplacePolicy::KeepIfUnchanged)?;
        }
        Ok(())
    }
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_default()
}

impl Task for LatexTask {
    fn name(&self) -> String {
        format!("compile {}", self.toplevel_file.display())
    }

    fn inputs(&self) -> Vec<PathBuf> {
        let mut inputs = vec![self.toplevel_file.clone()];
        inputs.extend(self.extra_inputs.iter().cloned());
        inputs
    }

    fn outputs(&self) -> Vec<PathBuf> {
        vec![self.output_file.clone(), self.log_file.clone()]
    }

    fn state_files(&self) -> Vec<PathBuf> {
        self.state_files.clone()
    }

    fn fingerprint(&self) -> String {
        let dirs: Vec<String> = self
            .input_search_directories
            .iter()
            .map(|d| d.display().to_string())
            .collect();
        format!(
            "{} -interaction=nonstopmode -halt-on-error -file-line-error -recorder TEXINPUTS={}",
            self.executable,
            dirs.join(SEARCH_PATH_SEPARATOR)
        )
    }

    fn redo(&self, ctx: &RedoContext<'_>) -> Result<RedoOutcome> {
        let scratch = temporary_dir_in(&self.scratch_parent())?;

        for state_file in &self.state_files {
            if state_file.is_file() {
                let ext = extension_of(state_file);
                fs::copy(state_file, scratch.path().join(format!("{}.{}", self.job_name(), ext)))?;
            }
        }

        ctx.runner
            .run(&self.invocation(scratch.path())?.current_dir(ctx.root))?;

        self.promote(scratch.path(), "pdf", &self.output_file, true)?;
        self.promote(scratch.path(), "log", &self.log_file, true)?;
        for state_file in &self.state_files {
            self.promote(scratch.path(), &extension_of(state_file), state_file, false)?;
        }

        let recorder = scratch.path().join(format!("{}.fls", self.job_name()));
        let discovered_inputs = if recorder.is_file() {
            recorded_inputs(&fs::read_to_string(&recorder)?, ctx.root, scratch.path())
        } else {
            Vec::new()
        };
        debug!(count = discovered_inputs.len(), "inputs recorded by LaTeX");

        Ok(RedoOutcome { discovered_inputs })
    }
}

/// Files listed as `INPUT` in a LaTeX recorder (`.fls`) file that lie inside
/// `root` but not inside `scratch`.
///
/// Relative entries are resolved against the recorded `PWD`, or `root` when
/// there is none.
pub fn recorded_inputs(fls: &str, root: &Path, scratch: &Path) -> Vec<PathBuf> {
    let mut pwd = root.to_path_buf();
    let mut inputs = Vec::new();

    for line in fls.lines() {
        if let Some(dir) = line.strip_prefix("PWD ") {
            pwd = PathBuf::from(dir);
        } else if let Some(file) = line.strip_prefix("INPUT ") {
            let path = pwd.join(file);
            let path = normalize(&path);
            if path.starts_with(root) && !path.starts_with(scratch) && !inputs.contains(&path) {
                inputs.push(path);
            }
        }
    }
    inputs
}

/// Remove `.` components and fold `..` without touching the filesystem
fn normalize(path: &Path) -> PathBuf {
    use std::path::Component;

    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Result of [compile_to_fixed_point]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompileOutcome {
    /// Compiler invocations in this build
    pub runs: usize,
    /// Whether the state files settled
    pub stabilized: bool,
}

/// Run `task` until the context reports it up to date, at most `max_runs` times.
///
/// When the limit is reached the last output is accepted, unless
/// `fail_on_unstable` is set.
pub fn compile_to_fixed_point(
    ctx: &mut BuildContext<'_>,
    task: &dyn Task,
    max_runs: usize,
    fail_on_unstable: bool,
) -> Result<CompileOutcome> {
    let mut runs = 0;
    while runs < max_runs {
        if !ctx.run(task)? {
            return Ok(CompileOutcome {
                runs,
                stabilized: true,
            });
        }
        runs += 1;
    }

    let stabilized = ctx.redo_reason(task)?.is_none();
    if !stabilized && fail_on_unstable {
        return Err(BuildError::StabilizationLimitReached { runs });
    }
    Ok(CompileOutcome { runs, stabilized })
}

/// Count lines starting with `prefix`, compared byte-wise.
///
/// LaTeX logs are not necessarily UTF-8, so lines are not decoded.
pub fn count_lines_with_prefix<R: BufRead>(reader: R, prefix: &str) -> Result<usize> {
    let mut count = 0;
    for line in reader.split(b'\n') {
        if line?.starts_with(prefix.as_bytes()) {
            count += 1;
        }
    }
    Ok(count)
}

/// Count warnings in the log file at `path`
pub fn count_log_warnings(path: &Path, prefix: &str) -> Result<usize> {
    count_lines_with_prefix(BufReader::new(fs::File::open(path)?), prefix)
}

#[cfg(test)]
mod tests {
    use super::*;

    const OVERFULL: &str = r"Overfull \hbox ";

    #[test]
    fn test_count_overfull_lines() {
        let log = concat!(
            "This is pdfTeX\n",
            "Overfull \\hbox (1.2pt too wide) in paragraph at lines 3--4\n",
            " Overfull \\hbox (indented, not counted)\n",
            "overfull \\hbox (lower case, not counted)\n",
            "Overfull \\vbox (vertical, not counted)\n",
            "Underfull \\hbox (badness 10000)\n",
            "Overfull \\hbox (3.0pt too wide) detected at line 9\n",
            "Overfull \\hbox",
        );
        assert_eq!(count_lines_with_prefix(log.as_bytes(), OVERFULL).unwrap(), 2);
    }

    #[test]
    fn test_count_handles_non_utf8() {
        let log: &[u8] = b"caf\xe9\nOverfull \\hbox (x)\n\xff\xfe\n";
        assert_eq!(count_lines_with_prefix(log, OVERFULL).unwrap(), 1);
    }

    #[test]
    fn test_count_crlf_lines() {
        let log = "Overfull \\hbox (a)\r\nOverfull \\hbox (b)\r\n";
        assert_eq!(count_lines_with_prefix(log.as_bytes(), OVERFULL).unwrap(), 2);
    }

    #[test]
    fn test_recorded_inputs_filters_system_and_scratch() {
        let fls = concat!(
            "PWD /proj\n",
            "INPUT /usr/share/texmf/tex/latex/base/article.cls\n",
            "INPUT ./doc/dbor.tex\n",
            "INPUT /proj/build/out/.doc-build-x/dbor.aux\n",
            "OUTPUT /proj/build/out/.doc-build-x/dbor.log\n",
            "INPUT doc/chapter/../intro.tex\n",
            "INPUT ./doc/dbor.tex\n",
        );
        let inputs = recorded_inputs(fls, Path::new("/proj"), Path::new("/proj/build/out/.doc-build-x"));
        assert_eq!(
            inputs,
            vec![
                PathBuf::from("/proj/doc/dbor.tex"),
                PathBuf::from("/proj/doc/intro.tex"),
            ]
        );
    }

    #[test]
    fn test_invocation_shape() {
        let task = LatexTask {
            executable: "pdflatex".to_string(),
            toplevel_file: PathBuf::from("/p/doc/dbor.tex"),
            output_file: PathBuf::from("/p/out/dbor.pdf"),
            log_file: PathBuf::from("/p/out/dbor.log"),
            state_files: vec![PathBuf::from("/p/out/dbor.aux")],
            input_search_directories: vec![PathBuf::from("/p/doc"), PathBuf::from("/p/out/generated")],
            extra_inputs: Vec::new(),
        };

        let inv = task.invocation(Path::new("/p/out/tmp")).unwrap();
        let args = inv.args_lossy();
        assert_eq!(args.last().unwrap(), "/p/doc/dbor.tex");
        assert!(args.contains(&"-output-directory=/p/out/tmp".to_string()));
        assert!(args.contains(&"-jobname=dbor".to_string()));

        let (key, value) = &inv.env[0];
        assert_eq!(key, "TEXINPUTS");
        let value = value.to_string_lossy();
        assert!(value.starts_with("/p/doc"));
        assert!(value.ends_with(SEARCH_PATH_SEPARATOR));
    }
}

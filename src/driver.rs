//! The build sequence: version → version file → images → document → log scan.

use crate::artifact::{write_atomically, ReplacePolicy};
use crate::config::{Config, Layout};
use crate::context::{BuildContext, RedoContext, RedoOutcome, RunSummary, Task};
use crate::domain::WorkingDirectoryVersion;
use crate::error::{BuildError, Result};
use crate::git::Describe;
use crate::images::{converted_path, discover_images, ConvertImageTask, ImageFilter};
use crate::latex::{compile_to_fixed_point, count_log_warnings, CompileOutcome, LatexTask};
use crate::report::Reporter;
use crate::state::STATE_FILE_NAME;
use crate::tools::ToolRunner;
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info};

/// Writes the working-directory version as a one-line include file
#[derive(Debug, Clone)]
pub struct VersionFileTask {
    pub output: PathBuf,
    pub wd_version: String,
}

impl VersionFileTask {
    pub fn new(output: impl Into<PathBuf>, wd_version: impl Into<String>) -> Self {
        VersionFileTask {
            output: output.into(),
            wd_version: wd_version.into(),
        }
    }
}

impl Task for VersionFileTask {
    fn name(&self) -> String {
        format!("write {}", self.output.display())
    }

    fn inputs(&self) -> Vec<PathBuf> {
        Vec::new()
    }

    fn outputs(&self) -> Vec<PathBuf> {
        vec![self.output.clone()]
    }

    fn fingerprint(&self) -> String {
        format!("wd_version={}", self.wd_version)
    }

    fn redo(&self, _ctx: &RedoContext<'_>) -> Result<RedoOutcome> {
        let contents = format!("{}\n", self.wd_version);
        write_atomically(&self.output, contents.as_bytes(), ReplacePolicy::KeepIfUnchanged)?;
        Ok(RedoOutcome::default())
    }
}

/// What a build did
#[derive(Debug, Clone, PartialEq)]
pub struct BuildSummary {
    pub version: WorkingDirectoryVersion,
    pub version_file_written: bool,
    pub images: RunSummary,
    pub latex: CompileOutcome,
    pub overfull_warnings: usize,
}

/// Sequences one build of the document
pub struct Driver<'a> {
    config: &'a Config,
    layout: Layout,
    runner: &'a dyn ToolRunner,
    reporter: &'a Reporter,
}

impl<'a> Driver<'a> {
    pub fn new(
        config: &'a Config,
        root: &Path,
        runner: &'a dyn ToolRunner,
        reporter: &'a Reporter,
    ) -> Self {
        Driver {
            config,
            layout: config.layout(root),
            runner,
            reporter,
        }
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Derive the working-directory version from the repository
    pub fn resolve_version(&self, describer: &dyn Describe) -> Result<WorkingDirectoryVersion> {
        let facts = describer.describe()?;
        debug!(?facts, "describe facts");
        WorkingDirectoryVersion::resolve(
            &facts,
            &self.config.version.tag_prefix,
            self.config.version.hash_length,
        )
    }

    fn image_tasks(&self) -> Result<Vec<ConvertImageTask>> {
        let filter = ImageFilter::new(
            &self.config.images.name_filter,
            &self.config.images.recurse_filter,
        )?;
        let images = discover_images(&self.layout.image_dir, &filter)?;

        Ok(images
            .iter()
            .map(|relative| {
                ConvertImageTask::new(
                    &self.config.tools.inkscape,
                    self.config.tools.inkscape_args.clone(),
                    self.layout.image_dir.join(relative),
                    converted_path(&self.layout.generated_image_dir, relative),
                )
            })
            .collect())
    }

    fn latex_task(&self, image_tasks: &[ConvertImageTask]) -> LatexTask {
        let mut extra_inputs = vec![self.layout.version_file.clone()];
        extra_inputs.extend(image_tasks.iter().map(|t| t.output.clone()));

        LatexTask {
            executable: self.config.tools.pdflatex.clone(),
            toplevel_file: self.layout.toplevel_file.clone(),
            output_file: self.layout.pdf_file.clone(),
            log_file: self.layout.log_file.clone(),
            state_files: self.layout.state_files.clone(),
            input_search_directories: vec![
                self.layout.source_dir.clone(),
                self.layout.generated_dir.clone(),
                self.layout.generated_image_dir.clone(),
            ],
            extra_inputs,
        }
    }

    /// Run the whole build.
    ///
    /// Any failure aborts the remaining steps; artifacts of completed steps
    /// stay in place.
    pub fn build(&self, describer: &dyn Describe) -> Result<BuildSummary> {
        let version = self.resolve_version(describer)?;
        self.reporter
            .info(format!("working directory version: {}", version));

        let state_file = self.layout.output_dir.join(STATE_FILE_NAME);
        let mut ctx = BuildContext::open(&self.layout.root, state_file, self.runner)?
            .with_jobs(self.config.images.jobs);

        let version_task = VersionFileTask::new(&self.layout.version_file, &version.wd_version);
        let version_file_written = ctx.run(&version_task)?;

        let image_tasks = self.image_tasks()?;
        let images = {
            let _cluster = self.reporter.cluster("convert images");
            let tasks: Vec<&dyn Task> = image_tasks.iter().map(|t| t as &dyn Task).collect();
            let summary = ctx.run_all(&tasks)?;
            self.reporter.info(format!(
                "{} converted, {} up to date",
                summary.redone, summary.up_to_date
            ));
            summary
        };

        let latex = {
            let _cluster = self.reporter.cluster("compile document");
            let task = self.latex_task(&image_tasks);
            let outcome = compile_to_fixed_point(
                &mut ctx,
                &task,
                self.config.latex.max_runs,
                self.config.latex.fail_on_unstable,
            )?;
            if outcome.stabilized {
                self.reporter
                    .info(format!("{} run(s) until stable", outcome.runs));
            } else {
                self.reporter.warning(format!(
                    "auxiliary files still changing after {} runs; output accepted",
                    outcome.runs
                ));
            }
            outcome
        };

        let overfull_warnings =
            count_log_warnings(&self.layout.log_file, &self.config.latex.warning_prefix)?;
        if overfull_warnings > 0 {
            self.reporter.warning(format!(
                "number of overfull warnings: {}",
                overfull_warnings
            ));
        }

        info!(version = %version, runs = latex.runs, "build finished");
        self.reporter.info("finished successfully");

        Ok(BuildSummary {
            version,
            version_file_written,
            images,
            latex,
            overfull_warnings,
        })
    }

    /// Remove the output directory. Returns `false` if there was none.
    ///
    /// # Errors
    /// `BuildError::Config` unless the output directory lies strictly below
    /// the project root and outside the source directory.
    pub fn clean(&self) -> Result<bool> {
        let dir = &self.layout.output_dir;
        let inside_root = dir
            .strip_prefix(&self.layout.root)
            .map(|rel| {
                rel.components().next().is_some()
                    && rel.components().all(|c| matches!(c, Component::Normal(_)))
            })
            .unwrap_or(false);
        if !inside_root || self.layout.source_dir.starts_with(dir) {
            return Err(BuildError::config(format!(
                "refusing to remove {}: not an output directory below {}",
                dir.display(),
                self.layout.root.display()
            )));
        }
        if !dir.exists() {
            return Ok(false);
        }
        fs::remove_dir_all(dir)?;
        self.reporter.info(format!("removed {}", dir.display()));
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::MockRunner;

    #[test]
    fn test_clean_refuses_project_root() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("doc/dbor.tex");
        fs::create_dir_all(source.parent().unwrap()).unwrap();
        fs::write(&source, "\\documentclass{article}").unwrap();

        let runner = MockRunner::succeeding();
        let reporter = Reporter::silent();
        for output_dir in ["", ".", "doc", ".."] {
            // Bypasses validation, as a hand-built config would
            let mut config = Config::default();
            config.paths.output_dir = PathBuf::from(output_dir);
            let driver = Driver::new(&config, dir.path(), &runner, &reporter);

            let err = driver.clean().unwrap_err();
            assert!(matches!(err, BuildError::Config(_)), "{:?}: {}", output_dir, err);
            assert!(source.is_file());
        }
    }

    #[test]
    fn test_version_file_task_writes_line() {
        let dir = tempfile::tempdir().unwrap();
        let runner = MockRunner::succeeding();
        let output = dir.path().join("out/generated/repo_wd_version.tex");
        let task = VersionFileTask::new(&output, "1.2.3-dev5+deadbeef@");

        let mut ctx = BuildContext::open(dir.path(), dir.path().join("out/.state.toml"), &runner)
            .unwrap();
        assert!(ctx.run(&task).unwrap());
        assert_eq!(
            fs::read_to_string(&output).unwrap(),
            "1.2.3-dev5+deadbeef@\n"
        );
        assert!(!ctx.run(&task).unwrap());

        let changed = VersionFileTask::new(&output, "1.2.4");
        assert!(ctx.run(&changed).unwrap());
        assert_eq!(fs::read_to_string(&output).unwrap(), "1.2.4\n");
    }
}

use crate::error::{BuildError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Component, Path, PathBuf};

/// File name looked up in the project root and the user config directory
pub const CONFIG_FILE_NAME: &str = "doc-build.toml";

/// Environment variable naming a configuration file
pub const CONFIG_ENV_VAR: &str = "DOC_BUILD_CONFIG";

/// Represents the complete configuration for doc-build.
///
/// Every section has defaults matching the conventional project layout, so an
/// empty file (or none at all) is a valid configuration.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
pub struct Config {
    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub version: VersionConfig,

    #[serde(default)]
    pub tools: ToolsConfig,

    #[serde(default)]
    pub images: ImagesConfig,

    #[serde(default)]
    pub latex: LatexConfig,
}

fn default_source_dir() -> PathBuf {
    PathBuf::from("doc")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("build/out")
}

fn default_image_subdir() -> PathBuf {
    PathBuf::from("g")
}

fn default_generated_subdir() -> PathBuf {
    PathBuf::from("generated")
}

fn default_document() -> String {
    "dbor".to_string()
}

/// Project layout, relative to the project root.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct PathsConfig {
    /// Document sources (toplevel `.tex` and images)
    #[serde(default = "default_source_dir")]
    pub source_dir: PathBuf,

    /// Everything the build produces
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Image directory inside `source_dir`, mirrored inside the generated directory
    #[serde(default = "default_image_subdir")]
    pub image_subdir: PathBuf,

    /// Generated include files inside `output_dir`
    #[serde(default = "default_generated_subdir")]
    pub generated_subdir: PathBuf,

    /// Stem of the toplevel document (`<source_dir>/<document>.tex`)
    #[serde(default = "default_document")]
    pub document: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        PathsConfig {
            source_dir: default_source_dir(),
            output_dir: default_output_dir(),
            image_subdir: default_image_subdir(),
            generated_subdir: default_generated_subdir(),
            document: default_document(),
        }
    }
}

/// Source of the describe facts
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DescribeBackend {
    /// In-process via libgit2
    #[default]
    Libgit2,
    /// The `git` executable
    Command,
}

fn default_tag_prefix() -> String {
    "v".to_string()
}

fn default_hash_length() -> usize {
    crate::domain::describe::DEFAULT_HASH_LENGTH
}

fn default_version_file() -> String {
    "repo_wd_version.tex".to_string()
}

/// Configuration of the working-directory version.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct VersionConfig {
    /// Prefix of version tags; only tags `<prefix><digit>...` are considered
    #[serde(default = "default_tag_prefix")]
    pub tag_prefix: String,

    /// Commit hash characters in the version, clamped to 1..=40
    #[serde(default = "default_hash_length")]
    pub hash_length: usize,

    #[serde(default)]
    pub backend: DescribeBackend,

    /// Name of the generated include file inside the generated directory
    #[serde(default = "default_version_file")]
    pub file_name: String,
}

impl Default for VersionConfig {
    fn default() -> Self {
        VersionConfig {
            tag_prefix: default_tag_prefix(),
            hash_length: default_hash_length(),
            backend: DescribeBackend::default(),
            file_name: default_version_file(),
        }
    }
}

fn default_git() -> String {
    "git".to_string()
}

fn default_inkscape() -> String {
    "inkscape".to_string()
}

fn default_pdflatex() -> String {
    "pdflatex".to_string()
}

fn default_inkscape_args() -> Vec<String> {
    vec![
        "--export-pdf".to_string(),
        "{output}".to_string(),
        "{input}".to_string(),
    ]
}

/// External executables, resolved via `PATH` unless given as paths.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ToolsConfig {
    #[serde(default = "default_git")]
    pub git: String,

    #[serde(default = "default_inkscape")]
    pub inkscape: String,

    #[serde(default = "default_pdflatex")]
    pub pdflatex: String,

    /// Converter arguments; `{input}` and `{output}` are substituted
    #[serde(default = "default_inkscape_args")]
    pub inkscape_args: Vec<String>,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        ToolsConfig {
            git: default_git(),
            inkscape: default_inkscape(),
            pdflatex: default_pdflatex(),
            inkscape_args: default_inkscape_args(),
        }
    }
}

fn default_name_filter() -> String {
    r"[^.]+\.svg".to_string()
}

fn default_recurse_filter() -> String {
    r"[^.]+".to_string()
}

fn default_jobs() -> usize {
    1
}

/// Image discovery and conversion.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ImagesConfig {
    /// Regex a file name must fully match to be converted
    #[serde(default = "default_name_filter")]
    pub name_filter: String,

    /// Regex a directory name must fully match to be descended into
    #[serde(default = "default_recurse_filter")]
    pub recurse_filter: String,

    /// Conversions run concurrently
    #[serde(default = "default_jobs")]
    pub jobs: usize,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        ImagesConfig {
            name_filter: default_name_filter(),
            recurse_filter: default_recurse_filter(),
            jobs: default_jobs(),
        }
    }
}

fn default_max_runs() -> usize {
    10
}

fn default_state_extensions() -> Vec<String> {
    vec!["aux".to_string(), "toc".to_string(), "out".to_string()]
}

fn default_warning_prefix() -> String {
    r"Overfull \hbox ".to_string()
}

/// LaTeX compilation.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct LatexConfig {
    /// Upper bound on compiler runs while waiting for the state files to settle
    #[serde(default = "default_max_runs")]
    pub max_runs: usize,

    /// Fail instead of warning when `max_runs` is reached without a fixed point
    #[serde(default)]
    pub fail_on_unstable: bool,

    /// Extensions of the auxiliary files whose stability ends the iteration
    #[serde(default = "default_state_extensions")]
    pub state_extensions: Vec<String>,

    /// Log lines starting with this prefix are counted as warnings
    #[serde(default = "default_warning_prefix")]
    pub warning_prefix: String,
}

impl Default for LatexConfig {
    fn default() -> Self {
        LatexConfig {
            max_runs: default_max_runs(),
            fail_on_unstable: false,
            state_extensions: default_state_extensions(),
            warning_prefix: default_warning_prefix(),
        }
    }
}

/// Absolute paths of everything the build reads and writes
#[derive(Debug, Clone, PartialEq)]
pub struct Layout {
    pub root: PathBuf,
    pub source_dir: PathBuf,
    pub output_dir: PathBuf,
    pub image_dir: PathBuf,
    pub generated_dir: PathBuf,
    pub generated_image_dir: PathBuf,
    pub version_file: PathBuf,
    pub toplevel_file: PathBuf,
    pub pdf_file: PathBuf,
    pub log_file: PathBuf,
    pub state_files: Vec<PathBuf>,
}

impl Config {
    /// Resolve the configured layout against the project `root`.
    ///
    /// The root is made absolute first: tools report the files they read with
    /// absolute paths, which only match an absolute root.
    pub fn layout(&self, root: &Path) -> Layout {
        let root = absolute_root(root);
        let root = root.as_path();
        let p = &self.paths;
        let source_dir = root.join(&p.source_dir);
        let output_dir = root.join(&p.output_dir);
        let generated_dir = output_dir.join(&p.generated_subdir);

        Layout {
            root: root.to_path_buf(),
            image_dir: source_dir.join(&p.image_subdir),
            generated_image_dir: generated_dir.join(&p.image_subdir),
            version_file: generated_dir.join(&self.version.file_name),
            toplevel_file: source_dir.join(format!("{}.tex", p.document)),
            pdf_file: output_dir.join(format!("{}.pdf", p.document)),
            log_file: output_dir.join(format!("{}.log", p.document)),
            state_files: self
                .latex
                .state_extensions
                .iter()
                .map(|ext| output_dir.join(format!("{}.{}", p.document, ext)))
                .collect(),
            source_dir,
            output_dir,
            generated_dir,
        }
    }

    /// Reject values no build could work with
    pub fn validate(&self) -> Result<()> {
        if self.paths.document.is_empty() {
            return Err(BuildError::config("paths.document must not be empty"));
        }
        if self.version.tag_prefix.is_empty() {
            return Err(BuildError::config("version.tag_prefix must not be empty"));
        }
        if self.latex.max_runs == 0 {
            return Err(BuildError::config("latex.max_runs must be at least 1"));
        }
        if self.images.jobs == 0 {
            return Err(BuildError::config("images.jobs must be at least 1"));
        }
        if self.latex.warning_prefix.is_empty() {
            return Err(BuildError::config("latex.warning_prefix must not be empty"));
        }
        let output_dir = normalized(&self.paths.output_dir).ok_or_else(|| {
            BuildError::config("paths.output_dir must be a relative path inside the project")
        })?;
        if output_dir.as_os_str().is_empty() {
            return Err(BuildError::config(
                "paths.output_dir must not be the project root",
            ));
        }
        let source_dir = normalized(&self.paths.source_dir).ok_or_else(|| {
            BuildError::config("paths.source_dir must be a relative path inside the project")
        })?;
        if source_dir.starts_with(&output_dir) {
            return Err(BuildError::config(format!(
                "paths.output_dir '{}' must not contain paths.source_dir '{}'",
                self.paths.output_dir.display(),
                self.paths.source_dir.display()
            )));
        }
        for placeholder in ["{input}", "{output}"] {
            if !self.tools.inkscape_args.iter().any(|a| a.contains(placeholder)) {
                return Err(BuildError::config(format!(
                    "tools.inkscape_args must contain {}",
                    placeholder
                )));
            }
        }
        Ok(())
    }
}

/// `path` without `.` components; `None` unless it is relative and free of `..`
fn normalized(path: &Path) -> Option<PathBuf> {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::Normal(name) => out.push(name),
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(out)
}

fn absolute_root(root: &Path) -> PathBuf {
    fs::canonicalize(root)
        .or_else(|_| std::env::current_dir().map(|cwd| cwd.join(root)))
        .unwrap_or_else(|_| root.to_path_buf())
}

fn find_config_file(config_path: Option<&Path>, root: &Path) -> Option<PathBuf> {
    if let Some(path) = config_path {
        return Some(path.to_path_buf());
    }
    if let Some(path) = std::env::var_os(CONFIG_ENV_VAR).filter(|v| !v.is_empty()) {
        return Some(PathBuf::from(path));
    }
    let local = root.join(CONFIG_FILE_NAME);
    if local.exists() {
        return Some(local);
    }
    dirs::config_dir()
        .map(|dir| dir.join(CONFIG_FILE_NAME))
        .filter(|path| path.exists())
}

/// Loads configuration from file or returns defaults.
///
/// Attempts to load configuration in the following order:
/// 1. Custom path provided as parameter
/// 2. Path named by `DOC_BUILD_CONFIG`
/// 3. `doc-build.toml` in the project root
/// 4. `doc-build.toml` in the user config directory
/// 5. Default configuration if no file found
///
/// # Returns
/// * `Ok(Config)` - Loaded and validated (or default) configuration
/// * `Err` - If a file was found but cannot be read, parsed, or validated
pub fn load_config(config_path: Option<&Path>, root: &Path) -> Result<Config> {
    let config = match find_config_file(config_path, root) {
        Some(path) => {
            let text = fs::read_to_string(&path).map_err(|e| {
                BuildError::config(format!("cannot read {}: {}", path.display(), e))
            })?;
            toml::from_str(&text).map_err(|e| {
                BuildError::config(format!("cannot parse {}: {}", path.display(), e))
            })?
        }
        None => Config::default(),
    };

    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_layout() {
        let layout = Config::default().layout(Path::new("/p"));
        assert_eq!(layout.image_dir, PathBuf::from("/p/doc/g"));
        assert_eq!(layout.generated_image_dir, PathBuf::from("/p/build/out/generated/g"));
        assert_eq!(
            layout.version_file,
            PathBuf::from("/p/build/out/generated/repo_wd_version.tex")
        );
        assert_eq!(layout.toplevel_file, PathBuf::from("/p/doc/dbor.tex"));
        assert_eq!(layout.pdf_file, PathBuf::from("/p/build/out/dbor.pdf"));
        assert_eq!(layout.log_file, PathBuf::from("/p/build/out/dbor.log"));
        assert_eq!(
            layout.state_files,
            vec![
                PathBuf::from("/p/build/out/dbor.aux"),
                PathBuf::from("/p/build/out/dbor.toc"),
                PathBuf::from("/p/build/out/dbor.out"),
            ]
        );
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
[latex]
fail_on_unstable = true

[version]
hash_length = 12
backend = "command"
"#,
        )
        .unwrap();

        assert!(config.latex.fail_on_unstable);
        assert_eq!(config.latex.max_runs, 10);
        assert_eq!(config.version.hash_length, 12);
        assert_eq!(config.version.backend, DescribeBackend::Command);
        assert_eq!(config.version.tag_prefix, "v");
        assert_eq!(config.paths, PathsConfig::default());
    }

    #[test]
    fn test_validate_rejects_zero_runs() {
        let mut config = Config::default();
        config.latex.max_runs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_output_dir_at_or_above_sources() {
        for output_dir in ["", ".", "./", "doc", "../elsewhere", "/tmp/out"] {
            let mut config = Config::default();
            config.paths.output_dir = PathBuf::from(output_dir);
            let err = config.validate().unwrap_err();
            assert!(
                matches!(err, BuildError::Config(ref m) if m.contains("paths.output_dir")),
                "{:?} accepted: {}",
                output_dir,
                err
            );
        }

        let mut config = Config::default();
        config.paths.source_dir = PathBuf::from("doc/src");
        config.paths.output_dir = PathBuf::from("./doc");
        assert!(config.validate().is_err());

        config.paths.output_dir = PathBuf::from("./out");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_layout_root_is_absolute() {
        let layout = Config::default().layout(Path::new("."));
        assert!(layout.root.is_absolute());
        assert!(layout.output_dir.starts_with(&layout.root));
    }

    #[test]
    fn test_validate_requires_placeholders() {
        let mut config = Config::default();
        config.tools.inkscape_args = vec!["{input}".to_string()];
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("{output}"));
    }
}

// tests/config_test.rs
use doc_build::config::{load_config, Config, DescribeBackend, CONFIG_ENV_VAR, CONFIG_FILE_NAME};
use doc_build::BuildError;
use serial_test::serial;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use tempfile::NamedTempFile;

#[test]
fn test_default_config() {
    let config = Config::default();
    assert_eq!(config.paths.source_dir, PathBuf::from("doc"));
    assert_eq!(config.paths.output_dir, PathBuf::from("build/out"));
    assert_eq!(config.paths.document, "dbor");
    assert_eq!(config.version.tag_prefix, "v");
    assert_eq!(config.version.hash_length, 8);
    assert_eq!(config.version.backend, DescribeBackend::Libgit2);
    assert_eq!(config.tools.inkscape, "inkscape");
    assert_eq!(config.tools.pdflatex, "pdflatex");
    assert_eq!(config.latex.max_runs, 10);
    assert!(!config.latex.fail_on_unstable);
    assert_eq!(config.latex.warning_prefix, "Overfull \\hbox ");
    assert!(config.validate().is_ok());
}

#[test]
#[serial]
fn test_load_from_file() {
    let mut temp_file = NamedTempFile::new().unwrap();
    let toml_content = r#"
[paths]
document = "manual"

[version]
hash_length = 12
backend = "command"

[latex]
max_runs = 4
fail_on_unstable = true
"#;
    temp_file.write_all(toml_content.as_bytes()).unwrap();
    temp_file.flush().unwrap();

    let root = tempfile::tempdir().unwrap();
    let config = load_config(Some(temp_file.path()), root.path()).unwrap();
    assert_eq!(config.paths.document, "manual");
    assert_eq!(config.version.hash_length, 12);
    assert_eq!(config.version.backend, DescribeBackend::Command);
    assert_eq!(config.latex.max_runs, 4);
    assert!(config.latex.fail_on_unstable);
    // Untouched sections keep their defaults
    assert_eq!(config.tools.inkscape, "inkscape");
    assert_eq!(config.images.name_filter, "[^.]+\\.svg");
}

#[test]
#[serial]
fn test_project_file_found_in_root() {
    let root = tempfile::tempdir().unwrap();
    fs::write(
        root.path().join(CONFIG_FILE_NAME),
        "[tools]\npdflatex = \"lualatex\"\n",
    )
    .unwrap();

    std::env::remove_var(CONFIG_ENV_VAR);
    let config = load_config(None, root.path()).unwrap();
    assert_eq!(config.tools.pdflatex, "lualatex");
}

#[test]
#[serial]
fn test_env_var_takes_precedence_over_project_file() {
    let root = tempfile::tempdir().unwrap();
    fs::write(
        root.path().join(CONFIG_FILE_NAME),
        "[tools]\npdflatex = \"lualatex\"\n",
    )
    .unwrap();

    let mut env_file = NamedTempFile::new().unwrap();
    env_file
        .write_all(b"[tools]\npdflatex = \"xelatex\"\n")
        .unwrap();
    env_file.flush().unwrap();

    std::env::set_var(CONFIG_ENV_VAR, env_file.path());
    let result = load_config(None, root.path());
    std::env::remove_var(CONFIG_ENV_VAR);

    assert_eq!(result.unwrap().tools.pdflatex, "xelatex");
}

#[test]
#[serial]
fn test_invalid_toml_is_config_error() {
    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file.write_all(b"[latex\nmax_runs = ").unwrap();
    temp_file.flush().unwrap();

    let root = tempfile::tempdir().unwrap();
    let err = load_config(Some(temp_file.path()), root.path()).unwrap_err();
    assert!(matches!(err, BuildError::Config(_)));
}

#[test]
#[serial]
fn test_zero_max_runs_rejected() {
    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file.write_all(b"[latex]\nmax_runs = 0\n").unwrap();
    temp_file.flush().unwrap();

    let root = tempfile::tempdir().unwrap();
    let err = load_config(Some(temp_file.path()), root.path()).unwrap_err();
    assert!(err.to_string().contains("max_runs"));
}

#[test]
#[serial]
fn test_inkscape_args_need_placeholders() {
    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file
        .write_all(b"[tools]\ninkscape_args = [\"--export-pdf\", \"out.pdf\"]\n")
        .unwrap();
    temp_file.flush().unwrap();

    let root = tempfile::tempdir().unwrap();
    let err = load_config(Some(temp_file.path()), root.path()).unwrap_err();
    assert!(err.to_string().contains("{input}"));
}

#[test]
#[serial]
fn test_missing_explicit_file_is_error() {
    let root = tempfile::tempdir().unwrap();
    let missing = root.path().join("nope.toml");
    assert!(load_config(Some(&missing), root.path()).is_err());
}

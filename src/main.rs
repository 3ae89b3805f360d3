use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use doc_build::config::{self, Config};
use doc_build::driver::Driver;
use doc_build::git;
use doc_build::report::{ColorChoice, Level, Reporter};
use doc_build::tools::ProcessRunner;

#[derive(Parser)]
#[command(
    name = "doc-build",
    version,
    about = "Build a LaTeX document to PDF, converting its SVG images first"
)]
struct Cli {
    #[arg(short, long, global = true, help = "Custom configuration file path")]
    config: Option<PathBuf>,

    #[arg(
        short = 'C',
        long,
        global = true,
        default_value = ".",
        help = "Project root directory"
    )]
    directory: PathBuf,

    #[arg(short, long, global = true, action = clap::ArgAction::Count, help = "More diagnostic output (repeatable)")]
    verbose: u8,

    #[arg(long, global = true, value_enum, default_value_t = Color::Auto, help = "Colour messages")]
    color: Color,

    #[command(subcommand)]
    cmd: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Build the document (default)
    Build,
    /// Print the working-directory version
    Version {
        #[arg(long, value_enum, default_value_t = VersionFormat::Plain)]
        format: VersionFormat,
    },
    /// Remove the output directory
    Clean,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Color {
    Auto,
    Always,
    Never,
}

impl From<Color> for ColorChoice {
    fn from(color: Color) -> Self {
        match color {
            Color::Auto => ColorChoice::Auto,
            Color::Always => ColorChoice::Always,
            Color::Never => ColorChoice::Never,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum VersionFormat {
    /// Working-directory version, e.g. 1.2.3-dev5+deadbeef@
    Plain,
    /// The version tag as (major, minor, micro, letter, number)
    Components,
    /// The version tag as semantic version
    Semver,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let min_level = if cli.verbose > 0 {
        Level::Debug
    } else {
        Level::Info
    };
    let reporter = Reporter::stderr(cli.color.into(), min_level);

    if let Err(e) = run(&cli, &reporter) {
        debug!("{:?}", e);
        reporter.error(format!("{:#}", e));
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn run(cli: &Cli, reporter: &Reporter) -> Result<()> {
    let root = cli.directory.as_path();
    let config = config::load_config(cli.config.as_deref(), root).context("load configuration")?;

    match cli.cmd.as_ref().unwrap_or(&Command::Build) {
        Command::Build => build(&config, root, reporter),
        Command::Version { format } => print_version(&config, root, reporter, *format),
        Command::Clean => {
            let runner = ProcessRunner::new();
            let driver = Driver::new(&config, root, &runner, reporter);
            if !driver.clean().context("clean output directory")? {
                reporter.info("nothing to clean");
            }
            Ok(())
        }
    }
}

fn build(config: &Config, root: &Path, reporter: &Reporter) -> Result<()> {
    let runner = ProcessRunner::new();
    let describer = git::describer_for(&config.version, &config.tools.git, root, &runner)
        .context("open repository")?;

    let driver = Driver::new(config, root, &runner, reporter);
    driver.build(describer.as_ref()).context("build document")?;
    Ok(())
}

fn print_version(
    config: &Config,
    root: &Path,
    reporter: &Reporter,
    format: VersionFormat,
) -> Result<()> {
    let runner = ProcessRunner::new();
    let describer = git::describer_for(&config.version, &config.tools.git, root, &runner)
        .context("open repository")?;

    let driver = Driver::new(config, root, &runner, reporter);
    let version = driver
        .resolve_version(describer.as_ref())
        .context("resolve version")?;

    match format {
        VersionFormat::Plain => println!("{}", version),
        VersionFormat::Components => {
            let c = version.components;
            let letter = c
                .pre_letter
                .map(|l| format!("'{}'", l))
                .unwrap_or_else(|| "None".to_string());
            let number = c
                .pre_number
                .map(|n| n.to_string())
                .unwrap_or_else(|| "None".to_string());
            println!("({}, {}, {}, {}, {})", c.major, c.minor, c.micro, letter, number);
        }
        VersionFormat::Semver => println!("{}", version.components.to_semver()),
    }
    Ok(())
}

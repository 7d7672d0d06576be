mod cmd;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use buildpy_lib::consts::DEFAULT_PYTHON_VERSION;
use buildpy_lib::pipeline::PipelineFailure;
use buildpy_lib::{Error, ErrorKind};

use crate::output::{OutputFormat, print_error};

#[derive(Parser)]
#[command(name = "buildpy", author, version, about = "Build customised CPython interpreters", long_about = None)]
struct Cli {
  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  /// Project directory holding build/
  #[arg(long, global = true, default_value = ".")]
  project_dir: PathBuf,

  #[command(subcommand)]
  command: Commands,
}

/// Which interpreter to build or inspect.
#[derive(Args, Debug, Clone)]
pub struct TargetArgs {
  /// Python version, X.Y or X.Y.Z
  #[arg(short = 'p', long = "python", default_value = DEFAULT_PYTHON_VERSION)]
  pub python: String,

  /// Build configuration, e.g. static_mid or shared_max
  #[arg(short, long, default_value = "shared_mid")]
  pub config: String,

  /// Number of build jobs (default: available parallelism)
  #[arg(short, long)]
  pub jobs: Option<usize>,

  /// Enable optimisations (PGO) during the build
  #[arg(long)]
  pub optimize: bool,

  /// Build a debug interpreter
  #[arg(short, long)]
  pub debug: bool,

  /// Extra configure options, e.g. with-lto
  #[arg(short = 'a', long = "cfg-opts", num_args = 1.., value_name = "OPT")]
  pub cfg_opts: Vec<String>,

  /// Install directory (default: build/install/python-<linkage>)
  #[arg(long, value_name = "DIR")]
  pub install_dir: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct BuildArgs {
  #[command(flatten)]
  pub target: TargetArgs,

  /// Remove sources and the install prefix first, ignoring the cache
  #[arg(short, long)]
  pub reset: bool,

  /// Precompile the stdlib to bytecode
  #[arg(long)]
  pub precompile: bool,

  /// Bytecode optimisation level, -1 .. 2
  #[arg(short = 'b', long, default_value_t = -1, allow_negative_numbers = true)]
  pub optimize_bytecode: i8,

  /// Leave the stdlib unzipped
  #[arg(long)]
  pub skip_ziplib: bool,

  /// Packages to pip install after the build
  #[arg(short = 'i', long = "install", num_args = 1.., value_name = "PKG")]
  pub packages: Vec<String>,

  /// Directory of the embedding binary, for loader-relative install names
  #[arg(long, value_name = "DIR")]
  pub loader_dir: Option<PathBuf>,

  /// Install name used verbatim on macOS
  #[arg(long)]
  pub install_name: Option<String>,

  /// Expected checksum of the source tarball, <algorithm>:<hex>
  #[arg(long)]
  pub checksum: Option<String>,

  /// Source tarball URL override
  #[arg(long)]
  pub source_url: Option<String>,

  /// Print a size breakdown of the finished build
  #[arg(short = 'S', long)]
  pub size_report: bool,
}

#[derive(Subcommand)]
enum Commands {
  /// Build an interpreter
  Build(BuildArgs),

  /// Show what a build would do without running anything
  Plan {
    #[command(flatten)]
    target: TargetArgs,

    #[arg(long, value_enum, default_value_t)]
    format: OutputFormat,
  },

  /// Analyze the stdlib dependencies of packages
  Analyze {
    /// Package directories, wheels or sdists
    sources: Vec<PathBuf>,

    /// Download these packages with pip first
    #[arg(long, num_args = 1.., value_name = "PKG")]
    download: Vec<String>,

    /// Interpreter used for pip download
    #[arg(long, default_value = "python3")]
    python_exe: PathBuf,

    /// Follow intra-package imports from each package root only
    #[arg(long)]
    reachable: bool,

    /// Compare against this configuration
    #[arg(short, long)]
    config: Option<String>,

    /// Python version for --config
    #[arg(short = 'p', long = "python", default_value = DEFAULT_PYTHON_VERSION)]
    python: String,

    #[arg(long, value_enum, default_value_t)]
    format: OutputFormat,
  },

  /// Analyze packages and write a reduction manifest
  Reduce {
    /// Package directories, wheels or sdists
    sources: Vec<PathBuf>,

    /// Build configuration the manifest targets
    #[arg(short, long, default_value = "shared_mid")]
    config: String,

    #[arg(short = 'p', long = "python", default_value = DEFAULT_PYTHON_VERSION)]
    python: String,

    /// Manifest path (default: build/reduction-manifest.json)
    #[arg(long, value_name = "PATH")]
    output: Option<PathBuf>,
  },

  /// Delete what a reduction manifest lists from an installed interpreter
  ApplyReductions {
    manifest: PathBuf,

    #[command(flatten)]
    target: TargetArgs,

    /// Copy the install here and reduce the copy instead
    #[arg(long, value_name = "DIR")]
    copy_to: Option<PathBuf>,
  },

  /// Show the size of an installed interpreter by component
  SizeReport {
    #[command(flatten)]
    target: TargetArgs,

    #[arg(long, value_enum, default_value_t)]
    format: OutputFormat,
  },
}

fn main() -> ExitCode {
  let cli = Cli::parse();

  let default_level = if cli.verbose { "debug" } else { "info" };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  let project = cli.project_dir.as_path();
  let result = match cli.command {
    Commands::Build(args) => cmd::cmd_build(project, &args, cli.verbose),
    Commands::Plan { target, format } => cmd::cmd_plan(project, &target, format),
    Commands::Analyze {
      sources,
      download,
      python_exe,
      reachable,
      config,
      python,
      format,
    } => cmd::cmd_analyze(
      project,
      &cmd::AnalyzeArgs {
        sources,
        download,
        python_exe,
        reachable,
        config,
        python,
      },
      format,
    ),
    Commands::Reduce {
      sources,
      config,
      python,
      output,
    } => cmd::cmd_reduce(project, &sources, &config, &python, output),
    Commands::ApplyReductions {
      manifest,
      target,
      copy_to,
    } => cmd::cmd_apply_reductions(project, &manifest, &target, copy_to.as_deref()),
    Commands::SizeReport { target, format } => cmd::cmd_size_report(project, &target, format),
  };

  match result {
    Ok(()) => ExitCode::SUCCESS,
    Err(err) => {
      print_error(&format!("{err:#}"));
      ExitCode::from(exit_code(&err))
    }
  }
}

/// 2 download, 3 validation, 4 extraction, 5 command, 6 build, 1 anything else.
fn exit_code(err: &anyhow::Error) -> u8 {
  let kind = err.chain().find_map(|cause| {
    if let Some(failure) = cause.downcast_ref::<PipelineFailure>() {
      Some(failure.kind())
    } else {
      cause.downcast_ref::<Error>().map(Error::kind)
    }
  });
  match kind {
    Some(ErrorKind::Download) => 2,
    Some(ErrorKind::Validation) => 3,
    Some(ErrorKind::Extraction) => 4,
    Some(ErrorKind::Command) => 5,
    Some(ErrorKind::Build) => 6,
    None => 1,
  }
}

mod error;

use crate::error::{ErrorKind, Result};
use clap::Parser;
use datum_config::Config;
use datum_library::organize::run;
use datum_library::{Context, Options, Resolver, RunStatistics};
use datum_metadata::ExifTool;
use datum_storage::BackendHandle;
use datum_storage::backend::LocalBackend;
use exn::ResultExt;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "datum=info";

/// Organize photos, videos and documents by their capture timestamp.
///
/// Files end up at `<directory pattern>/<file pattern><extension>` below the
/// working directory. Files without a usable timestamp go to `invalid/`,
/// same-name files with different content to `duplicates/`.
#[derive(Debug, Parser)]
#[command(name = "datum", version, about)]
struct Cli {
    /// Directory to organize (relative to the working directory, or absolute
    /// inside it).
    path: PathBuf,
    /// Root of the organized tree.
    #[arg(short, long, default_value = ".")]
    working_dir: PathBuf,
    /// Configuration file (TOML, YAML or JSON).
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Log every decision without touching any file.
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    simulate: Option<bool>,
    /// Move files into their dated directory instead of renaming in place.
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    subdirectories: Option<bool>,
    #[arg(short, long, num_args = 0..=1, default_missing_value = "true")]
    recursive: Option<bool>,
    /// Remove directories left empty afterwards.
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    delete_empty: Option<bool>,
    /// Name files without a capture date after their modification time.
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    fallback_file_time: Option<bool>,
    /// Add one hour to bare QuickTime creation dates.
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    dst: Option<bool>,
    /// Files processed at once.
    #[arg(short = 'j', long)]
    concurrency: Option<usize>,
}
impl Cli {
    /// Flags given on the command line win over configuration.
    fn apply(&self, options: &mut Options) {
        let overrides = [
            (self.simulate, &mut options.simulate),
            (self.subdirectories, &mut options.create_subdirectories),
            (self.recursive, &mut options.recursive),
            (self.delete_empty, &mut options.delete_empty_directories),
            (self.fallback_file_time, &mut options.treat_unresolved_as_file_time),
            (self.dst, &mut options.apply_dst_adjustment),
        ];
        for (flag, option) in overrides {
            if let Some(value) = flag {
                *option = value;
            }
        }
        if let Some(concurrency) = self.concurrency {
            options.concurrency = concurrency;
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match organize(Cli::parse()).await {
        Ok(stats) => {
            print!("{stats}");
            ExitCode::SUCCESS
        },
        Err(e) => {
            tracing::error!("{e:?}");
            eprintln!("datum: {}", *e);
            ExitCode::FAILURE
        },
    }
}

async fn organize(cli: Cli) -> Result<RunStatistics> {
    let config = Config::load(cli.config.as_deref()).or_raise(|| ErrorKind::Config)?;
    let working_dir = std::fs::canonicalize(&cli.working_dir)
        .or_raise(|| ErrorKind::WorkingDirectory(cli.working_dir.clone()))?;
    let root = relative_root(&working_dir, &cli.path)?;

    let mut options = config.options();
    cli.apply(&mut options);
    let rules = config.rule_set(&working_dir).or_raise(|| ErrorKind::Config)?;
    let exiftool = match &config.exiftool {
        Some(executable) => ExifTool::new(executable, &working_dir),
        None => ExifTool::discover(&working_dir).or_raise(|| ErrorKind::ExifTool)?,
    };
    let backend: BackendHandle = Arc::new(
        LocalBackend::new("local", &working_dir).or_raise(|| ErrorKind::WorkingDirectory(working_dir.clone()))?,
    );

    tracing::info!(
        working_dir = %working_dir.display(),
        root = %root.display(),
        exiftool = %exiftool.executable().display(),
        simulate = options.simulate,
        "Organizing"
    );
    let ctx = Context::new(rules, options, Resolver::new(Arc::new(exiftool)));
    run(&backend, &root, &ctx).await.or_raise(|| ErrorKind::Organize)
}

/// `path` relative to `working_dir`. Relative paths are taken as given.
fn relative_root(working_dir: &Path, path: &Path) -> Result<PathBuf> {
    if !path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let absolute = std::fs::canonicalize(path).or_raise(|| ErrorKind::OutsideWorkingDirectory(path.to_path_buf()))?;
    match absolute.strip_prefix(working_dir) {
        Ok(relative) => Ok(relative.to_path_buf()),
        Err(_) => exn::bail!(ErrorKind::OutsideWorkingDirectory(path.to_path_buf())),
    }
}

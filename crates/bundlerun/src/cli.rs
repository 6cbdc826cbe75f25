//! Command-line entry point.

use std::env;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

use crate::app::pack::{PackOptions, pack_directory, serialize};
use crate::app::pipeline::{BuildLayout, PipelineDriver, PipelineOptions};
use crate::app::recorder::{RequestRecorder, UrlFilter};
use crate::domain::errors::PipelineError;
use crate::domain::model::RunMode;
use crate::infra::config::Config;
use crate::infra::store::JsonFileStore;
use crate::infra::toolchain::ProcessToolchain;

#[derive(Parser, Debug)]
#[command(name = "bundlerun")]
#[command(version, about = "Unpack a source bundle, compile it, and launch the program")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// `build` extracts and compiles before launching; `r` launches the existing build
    #[arg(value_enum, value_name = "MODE")]
    pub mode: Option<ModeArg>,

    /// Directory to extract and compile in (defaults to the bundle's directory)
    #[arg(long, value_name = "DIR")]
    pub dir: Option<PathBuf>,

    /// Bundle file to extract
    #[arg(long, value_name = "FILE")]
    pub bundle: Option<PathBuf>,

    /// Dotted entry point name, e.g. `com.acme.Main`
    #[arg(long)]
    pub entry: Option<String>,

    /// Search subdirectories for sources and stale artifacts
    #[arg(long)]
    pub recursive: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    /// Extract, clean, compile, verify, then launch
    #[value(name = "build", alias = "b")]
    Build,
    /// Launch the existing build only
    #[value(name = "r", alias = "run")]
    Run,
}

impl From<ModeArg> for RunMode {
    fn from(value: ModeArg) -> Self {
        match value {
            ModeArg::Build => RunMode::Full,
            ModeArg::Run => RunMode::RunOnly,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Write the source files of a directory as a bundle
    Pack {
        #[arg(value_name = "DIR")]
        dir: PathBuf,
        /// Output file (stdout when omitted)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
        /// Include sources from subdirectories
        #[arg(long)]
        recursive: bool,
        /// Source file suffix (defaults to the configured one)
        #[arg(long)]
        suffix: Option<String>,
        /// Glob of paths to leave out; may be repeated
        #[arg(long = "exclude", value_name = "GLOB")]
        exclude: Vec<String>,
    },
    /// Inspect or clear captured HTTP requests
    Requests {
        #[command(subcommand)]
        action: RequestsAction,
        /// Request store file (defaults to the configured one)
        #[arg(long, value_name = "FILE")]
        store: Option<PathBuf>,
    },
    /// Print shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand, Debug, Clone, Copy)]
pub enum RequestsAction {
    /// Print captured requests as JSON
    List,
    /// Remove every captured request
    Clear,
}

/// Parse arguments, run, and map failures to an exit code.
pub fn main() -> ExitCode {
    let cli = Cli::parse();
    crate::init(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => match err.downcast_ref::<PipelineError>() {
            Some(pipeline) => {
                eprintln!("error[{}]: {pipeline}", pipeline.kind());
                ExitCode::from(pipeline.exit_code())
            }
            None => {
                eprintln!("Error: {err:#}");
                ExitCode::FAILURE
            }
        },
    }
}

pub fn run(cli: Cli) -> Result<()> {
    let invocation_dir = env::current_dir().context("failed to determine current directory")?;
    let config = Config::load()?;

    match &cli.command {
        Some(Command::Pack {
            dir,
            output,
            recursive,
            suffix,
            exclude,
        }) => {
            let suffix = suffix.clone().unwrap_or_else(|| config.build.source_suffix());
            let options = PackOptions::new(absolutize(dir, &invocation_dir), suffix)
                .recursive(*recursive || config.build.recursive())
                .exclude(exclude.clone());
            run_pack(&options, output.as_deref(), &config.bundle.delimiter())
        }
        Some(Command::Requests { action, store }) => {
            let store_path = store
                .clone()
                .unwrap_or_else(|| PathBuf::from(config.recorder.store()));
            run_requests(*action, &absolutize(&store_path, &invocation_dir), &config)
        }
        Some(Command::Completions { shell }) => {
            clap_complete::generate(*shell, &mut Cli::command(), "bundlerun", &mut io::stdout());
            Ok(())
        }
        None => run_pipeline(&cli, config, invocation_dir),
    }
}

fn run_pipeline(cli: &Cli, mut config: Config, invocation_dir: PathBuf) -> Result<()> {
    if let Some(entry) = &cli.entry {
        config.set_entry(entry.clone());
    }
    if cli.recursive {
        config.set_recursive(true);
    }

    let (build_dir, bundle_path) = resolve_locations(cli, &config, &invocation_dir);
    let mode = cli.mode.map(RunMode::from).unwrap_or_default();

    tracing::info!(path = %invocation_dir.display(), "invocation directory");
    tracing::info!(path = %build_dir.display(), "build directory");
    if mode == RunMode::Full {
        tracing::info!(path = %bundle_path.display(), "bundle file");
    }

    let options = PipelineOptions {
        mode,
        build_dir,
        bundle_path,
        invocation_dir,
        layout: BuildLayout::from_config(&config),
    };
    let toolchain = ProcessToolchain::from_config(&config.toolchain);
    PipelineDriver::new(toolchain, options).run()?;
    Ok(())
}

/// Build directory and bundle path from flags, falling back to config and the current dir.
fn resolve_locations(cli: &Cli, config: &Config, invocation_dir: &Path) -> (PathBuf, PathBuf) {
    let bundle_flag = cli.bundle.as_ref().map(|p| absolutize(p, invocation_dir));
    let build_dir = match (&cli.dir, &bundle_flag) {
        (Some(dir), _) => absolutize(dir, invocation_dir),
        (None, Some(bundle)) => bundle
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| invocation_dir.to_path_buf()),
        (None, None) => invocation_dir.to_path_buf(),
    };
    let bundle_path = bundle_flag.unwrap_or_else(|| build_dir.join(config.bundle.file()));
    (build_dir, bundle_path)
}

fn run_pack(options: &PackOptions, output: Option<&Path>, delimiter: &str) -> Result<()> {
    let document = pack_directory(options)?;
    anyhow::ensure!(
        !document.is_empty(),
        "no .{} files found in {}",
        options.source_suffix.trim_start_matches('.'),
        options.root.display()
    );
    let text = serialize(&document, delimiter)?;

    match output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent).with_context(|| {
                    format!("failed to create output directory {}", parent.display())
                })?;
            }
            fs::write(path, &text)
                .with_context(|| format!("failed to write bundle to {}", path.display()))?;
            tracing::info!(path = %path.display(), files = document.len(), "bundle written");
        }
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(text.as_bytes())?;
            stdout.flush()?;
        }
    }
    Ok(())
}

fn run_requests(action: RequestsAction, store_path: &Path, config: &Config) -> Result<()> {
    let store = JsonFileStore::new(store_path);
    tracing::debug!(path = %store.path().display(), "request store");
    let mut recorder = RequestRecorder::new(store, UrlFilter::from_config(&config.recorder)?)
        .with_delay(Duration::from_millis(config.recorder.delay_ms()));

    match action {
        RequestsAction::List => {
            let requests = recorder.list()?;
            let rendered = serde_json::to_string_pretty(&requests)
                .context("failed to render captured requests")?;
            println!("{rendered}");
            tracing::info!(count = requests.len(), "captured requests");
        }
        RequestsAction::Clear => recorder.clear()?,
    }
    Ok(())
}

fn absolutize(path: &Path, base: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

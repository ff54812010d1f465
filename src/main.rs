//! jsbridge CLI entry point.
//!
//! Runs a classic script or loads a module graph on a fresh engine, after
//! evaluating any configured preload scripts.

use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use jsbridge_common::{ConfigFile, LoggingConfig};
use jsbridge_core::{Engine, FileResolver};

#[derive(Parser)]
#[command(author, version, about = "Run scripts and modules through jsbridge", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(long, env = "JSBRIDGE_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Log filter directive, overriding the configured one
    #[arg(long, env = "JSBRIDGE_LOG", global = true)]
    log: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate a classic script and print its completion value
    Run {
        /// Script file, or `-` for stdin
        file: String,
    },
    /// Load a module graph, resolving imports from the filesystem
    Module {
        /// Entry module file
        file: PathBuf,

        /// Directory bare specifiers resolve against
        #[arg(long)]
        root: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => ConfigFile::from_file(path)?,
        None => ConfigFile::default(),
    };
    if let Some(filter) = cli.log {
        config.bridge.logging.filter = filter;
    }
    if cli.json_logs {
        config.bridge.logging.json = true;
    }
    init_tracing(&config.bridge.logging);

    let mut engine = Engine::new().context("Failed to create engine")?;
    preload(&mut engine, &config)?;

    match cli.command {
        Commands::Run { file } => {
            let (source, origin) = if file == "-" {
                let mut source = String::new();
                std::io::stdin()
                    .read_to_string(&mut source)
                    .context("Failed to read script from stdin")?;
                (source, config.bridge.engine.default_origin.clone())
            } else {
                (read_source(Path::new(&file))?, file)
            };

            let value = engine.run(&source, &origin).map_err(|err| match err.as_script() {
                Some(script) => anyhow::anyhow!("{}", script.stack_trace),
                None => anyhow::Error::new(err),
            })?;
            println!("{value}");
        }
        Commands::Module { file, root } => {
            if let Some(root) = root {
                config.bridge.resolver.root_dir = root.to_string_lossy().into_owned();
            }
            let origin = std::path::absolute(&file)
                .with_context(|| format!("Invalid module path '{}'", file.display()))?;
            let source = read_source(&origin)?;
            let resolver = FileResolver::from_config(&config.bridge.resolver);

            let code = engine.load_module(
                &source,
                &origin.to_string_lossy(),
                resolver.into_callback(),
            )?;
            if code != 0 {
                bail!("Module '{}' failed with status {code}", file.display());
            }
            info!(module = %file.display(), "Module evaluated");
        }
    }

    engine.dispose();
    Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| logging.filter.as_str().into());
    let registry = tracing_subscriber::registry().with(filter);

    if logging.json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn preload(engine: &mut Engine, config: &ConfigFile) -> anyhow::Result<()> {
    for entry in &config.preload {
        let source = read_source(Path::new(&entry.path))?;
        engine
            .run(&source, entry.origin())
            .with_context(|| format!("Preload script '{}' failed", entry.path))?;
        debug!(path = %entry.path, "Preload script evaluated");
    }
    Ok(())
}

fn read_source(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read '{}'", path.display()))
}

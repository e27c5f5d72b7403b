use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use prometheus::{Encoder, Registry, TextEncoder};
use sha2::{Digest, Sha256};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use archivist_core::metrics::register_metrics;
use archivist_core::{
    build_routes, load_config, validate_config, Config, ConversionRun, ConverterRegistry,
    ProgressMode,
};

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Config file used when neither `--config` nor `ARCHIVIST_CONFIG` is given.
const DEFAULT_CONFIG: &str = "archivist.toml";

#[derive(Parser)]
#[command(name = "archivist")]
#[command(version, about = "Convert file collections into archival formats", long_about = None)]
struct Cli {
    /// Path to config TOML
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Diagnostic log format on stderr
    #[arg(long, value_enum, global = true, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert the input folder into the output folder
    Run {
        /// Override run.input_folder
        #[arg(long)]
        input: Option<PathBuf>,
        /// Override run.output_folder
        #[arg(long)]
        output: Option<PathBuf>,
        /// Write a Prometheus text dump of the run metrics to this file
        #[arg(long)]
        metrics: Option<PathBuf>,
        /// Progress display on stderr
        #[arg(long, value_enum)]
        progress: Option<Progress>,
    },
    /// List the converters available on this host and their capabilities
    Check,
    /// Print the route table for the configured formats
    Routes,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Progress {
    Off,
    Human,
    Json,
}

impl From<Progress> for ProgressMode {
    fn from(progress: Progress) -> Self {
        match progress {
            Progress::Off => ProgressMode::Off,
            Progress::Human => ProgressMode::Human,
            Progress::Json => ProgressMode::Json,
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    if let Err(e) = run(cli).await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Text => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init(),
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config_path = config_path(cli.config);
    info!("Loading configuration from {:?}", config_path);
    let mut config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    match cli.command {
        Commands::Run {
            input,
            output,
            metrics,
            progress,
        } => {
            if let Some(input) = input {
                config.run.input_folder = input;
            }
            if let Some(output) = output {
                config.run.output_folder = output;
            }
            if let Some(progress) = progress {
                config.orchestrator.progress = progress.into();
            }
            run_conversion(config, metrics.as_deref()).await
        }
        Commands::Check => check_converters(&config).await,
        Commands::Routes => print_routes(&config).await,
    }
}

fn config_path(flag: Option<PathBuf>) -> PathBuf {
    flag.or_else(|| std::env::var("ARCHIVIST_CONFIG").ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG))
}

fn config_hash(config: &Config) -> String {
    let config_json = serde_json::to_string(config).unwrap_or_default();
    let hash = format!("{:x}", Sha256::digest(config_json.as_bytes()));
    hash[..16].to_string()
}

async fn run_conversion(config: Config, metrics_path: Option<&Path>) -> Result<()> {
    validate_config(&config).context("Configuration validation failed")?;
    info!(
        version = VERSION,
        config_hash = %config_hash(&config),
        input = %config.run.input_folder.display(),
        output = %config.run.output_folder.display(),
        "Starting conversion run"
    );

    let registry = Registry::new();
    register_metrics(&registry).context("Failed to register metrics")?;

    let outcome = ConversionRun::new(config)
        .execute()
        .await
        .context("Conversion run could not start")?;

    if let Some(path) = metrics_path {
        write_metrics(&registry, path)
            .with_context(|| format!("Failed to write metrics to {:?}", path))?;
    }

    let summary = &outcome.summary;
    println!(
        "{} files: {} converted, {} unconverted, {} failed, {} not supported, {} without target, {} merged",
        summary.files_total,
        summary.converted,
        summary.unconverted,
        summary.failed,
        summary.not_supported,
        summary.output_not_set,
        summary.merged,
    );
    println!("documentation: {}", outcome.documentation_path.display());
    if outcome.is_clean() {
        println!("clean run");
    } else {
        println!("errors occurred — inspect {}", outcome.log_path.display());
    }
    Ok(())
}

fn write_metrics(registry: &Registry, path: &Path) -> Result<()> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&registry.gather(), &mut buffer)?;
    std::fs::write(path, buffer)?;
    Ok(())
}

async fn check_converters(config: &Config) -> Result<()> {
    validate_config(config).context("Configuration validation failed")?;
    let converters = ConverterRegistry::from_config(
        &config.converters,
        config.run.worker_threads(),
        &config.run.temp_dir,
    )
    .await;
    if converters.is_empty() {
        anyhow::bail!("no converters available on this host");
    }

    for registered in converters.iter() {
        let capability = registered.converter().capability();
        println!("{}", registered.name());
        println!("  platforms: {:?}", capability.platforms());

        let mut sources: Vec<_> = capability.supported().keys().collect();
        sources.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        for source in sources {
            let targets: Vec<String> = capability
                .targets_from(source)
                .iter()
                .map(|target| {
                    if capability.is_blocking(source, target) {
                        format!("{} (blocking)", target)
                    } else {
                        target.to_string()
                    }
                })
                .collect();
            println!("  {} -> {}", source, targets.join(", "));
        }
        for chain in capability.fixed_chains() {
            let hops: Vec<String> = chain.hops.iter().map(|h| h.to_string()).collect();
            println!("  chain {} -> {}", chain.source, hops.join(" -> "));
        }
        if let Some(output) = capability.merge_output() {
            println!("  merges into {}", output);
        }
    }
    Ok(())
}

async fn print_routes(config: &Config) -> Result<()> {
    validate_config(config).context("Configuration validation failed")?;
    let converters = ConverterRegistry::from_config(
        &config.converters,
        config.run.worker_threads(),
        &config.run.temp_dir,
    )
    .await;
    let targets = archivist_core::registry::TargetResolver::new(
        config.formats.clone(),
        config.folders.clone(),
    );

    let pairs = targets.declared_pairs();
    let table = build_routes(pairs.clone(), &converters, config.run.max_route_hops);
    for (from, to) in pairs {
        match table.get(&from, &to) {
            Some(hops) => {
                let hops: Vec<String> = hops.iter().map(|h| h.to_string()).collect();
                println!("{} -> {}: {}", from, to, hops.join(" -> "));
            }
            None => println!("{} -> {}: unsupported", from, to),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use archivist_core::load_config_from_str;

    #[test]
    fn test_parse_run_overrides() {
        let cli = Cli::try_parse_from([
            "archivist",
            "--config",
            "site.toml",
            "run",
            "--input",
            "/data/in",
            "--progress",
            "json",
        ])
        .unwrap();
        assert_eq!(cli.config.as_deref(), Some(Path::new("site.toml")));
        match cli.command {
            Commands::Run {
                input, progress, ..
            } => {
                assert_eq!(input.as_deref(), Some(Path::new("/data/in")));
                assert_eq!(progress, Some(Progress::Json));
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_parse_global_config_after_subcommand() {
        let cli = Cli::try_parse_from(["archivist", "routes", "-c", "a.toml"]).unwrap();
        assert!(matches!(cli.command, Commands::Routes));
        assert_eq!(cli.log_format, LogFormat::Text);
        assert_eq!(config_path(cli.config), PathBuf::from("a.toml"));
    }

    #[test]
    fn test_progress_maps_to_core_mode() {
        assert_eq!(ProgressMode::from(Progress::Off), ProgressMode::Off);
        assert_eq!(ProgressMode::from(Progress::Human), ProgressMode::Human);
    }

    #[test]
    fn test_config_hash_is_stable() {
        let config = load_config_from_str("[run]\nmax_threads = 2\n").unwrap();
        let first = config_hash(&config);
        assert_eq!(first.len(), 16);
        assert_eq!(first, config_hash(&config));

        let other = load_config_from_str("[run]\nmax_threads = 3\n").unwrap();
        assert_ne!(first, config_hash(&other));
    }

    #[test]
    fn test_write_metrics_dump() {
        let dir = tempfile::TempDir::new().unwrap();
        let registry = Registry::new();
        register_metrics(&registry).unwrap();
        archivist_core::metrics::GENERATIONS_TOTAL.inc();

        let path = dir.path().join("metrics.prom");
        write_metrics(&registry, &path).unwrap();
        let text = std::fs::read_to_string(path).unwrap();
        assert!(text.contains("archivist_generations_total"));
    }
}

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use mongo_topology::cluster::monitor;
use mongo_topology::config::{Config, ConfigError};
use mongo_topology::{ReadMode, ServerDescription, ServerSelector, TagSet};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mongo-topology")]
#[command(about = "Classify MongoDB cluster topologies and preview server selection")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify the topology described by a servers file
    Classify {
        /// TOML file with [[servers]] descriptions
        #[arg(short, long)]
        input: PathBuf,
        /// Optional configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Show which servers an operation would be routed to
    Select {
        /// TOML file with [[servers]] descriptions
        #[arg(short, long)]
        input: PathBuf,
        /// Optional configuration file supplying default criteria
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Read mode override
        #[arg(short, long)]
        mode: Option<ReadMode>,
        /// Required tag (key=value), repeatable; forms a single tag set
        #[arg(short, long = "tag", value_parser = parse_tag)]
        tags: Vec<(String, String)>,
        /// Maximum staleness override in seconds
        #[arg(long)]
        max_staleness_sec: Option<u64>,
    },
    /// Generate example configuration files
    Config {
        /// Deployment shape (standalone, replica_set or sharded)
        #[arg(short, long)]
        mode: String,
        /// Output file path
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Validate configuration file
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Show version information
    Version,
}

/// Input file layout for `classify` and `select`
#[derive(Debug, Deserialize)]
struct ServersFile {
    #[serde(default)]
    servers: Vec<ServerDescription>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Classify { input, config } => {
            classify_servers(&input, config.as_deref()).await?;
        }
        Commands::Select {
            input,
            config,
            mode,
            tags,
            max_staleness_sec,
        } => {
            select_servers(&input, config.as_deref(), mode, tags, max_staleness_sec).await?;
        }
        Commands::Config { mode, output } => {
            generate_config(&mode, &output)?;
        }
        Commands::Validate { config } => {
            validate_config(&config)?;
        }
        Commands::Version => {
            show_version();
        }
    }

    Ok(())
}

fn parse_tag(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("tag '{raw}' must be key=value")),
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = match path {
        Some(path) => Config::load_from_file(path)
            .with_context(|| format!("Failed to load config from {:?}", path))?,
        None => Config::default(),
    };
    init_logging(&config)?;
    Ok(config)
}

fn load_servers(path: &Path) -> Result<Vec<ServerDescription>> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;
    let file: ServersFile =
        toml::from_str(&content).with_context(|| format!("Failed to parse {:?}", path))?;
    Ok(file.servers)
}

/// Feed the servers file through the same path monitoring uses
async fn build_state(
    input: &Path,
    config: &Config,
) -> Result<(mongo_topology::ClusterState, monitor::MonitorStats)> {
    let servers = load_servers(input)?;
    info!("Loaded {} server descriptions from {:?}", servers.len(), input);

    let state = config.cluster_state();
    let stats = monitor::apply_updates(state.clone(), futures::stream::iter(servers)).await;
    Ok((state, stats))
}

async fn classify_servers(input: &Path, config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    let (state, stats) = build_state(input, &config).await?;
    let snapshot = state.snapshot();

    println!("Topology: {}", snapshot.topology);
    println!("  Kind: {}", snapshot.topology.kind());
    if let Some(rs) = snapshot.topology.as_replica_set() {
        match rs.primary() {
            Some(primary) => println!("  Primary: {}", primary),
            None => println!("  Primary: none"),
        }
    }
    let (max_set_version, max_election_id) = snapshot.topology.election_markers();
    if let Some(max_election_id) = max_election_id {
        println!("  Max election id: {}", max_election_id);
    }
    if let Some(max_set_version) = max_set_version {
        println!("  Max set version: {}", max_set_version);
    }
    println!(
        "  Servers: {} ({} applied, {} stale)",
        snapshot.descriptions.len(),
        stats.applied,
        stats.stale
    );
    for description in snapshot.descriptions.values() {
        match description.replica_set_name() {
            Some(set_name) => println!(
                "    {} {} set={}",
                description.address, description.role, set_name
            ),
            None => println!("    {} {}", description.address, description.role),
        }
    }

    if let Some(inconsistency) = &stats.inconsistency {
        println!("  Inconsistency: {}", inconsistency);
    }

    Ok(())
}

async fn select_servers(
    input: &Path,
    config_path: Option<&Path>,
    mode: Option<ReadMode>,
    tags: Vec<(String, String)>,
    max_staleness_sec: Option<u64>,
) -> Result<()> {
    let config = load_config(config_path)?;

    let mut criteria = config.selection.criteria();
    if let Some(mode) = mode {
        criteria.mode = mode;
    }
    if !tags.is_empty() {
        criteria.tag_sets = vec![tags.into_iter().collect::<TagSet>()];
    }
    if let Some(secs) = max_staleness_sec {
        criteria.max_staleness = Some(Duration::from_secs(secs));
    }
    let selector = ServerSelector::new(criteria, config.selection.timeout())?;

    let (state, _) = build_state(input, &config).await?;
    let topology = state.topology();
    println!("Topology: {}", topology);
    println!("Criteria: {}", selector.criteria());

    match selector.select(&state) {
        Ok(eligible) => {
            println!("Eligible servers: {}", eligible.len());
            for (i, description) in eligible.iter().enumerate() {
                println!("  {}: {} {}", i + 1, description.address, description.role);
            }
            Ok(())
        }
        Err(e) => Err(anyhow!(e).context("Server selection failed")),
    }
}

fn generate_config(mode: &str, output: &Path) -> Result<()> {
    println!("Generating {} configuration file: {:?}", mode, output);

    Config::create_example_config(output, mode).context("Failed to generate config")?;

    println!("Configuration file generated successfully!");
    println!("Edit the file to match your deployment and run:");
    println!("  mongo-topology validate --config {:?}", output);

    Ok(())
}

fn validate_config(config_path: &Path) -> Result<()> {
    println!("Validating configuration file: {:?}", config_path);

    match Config::load_from_file(config_path) {
        Ok(config) => {
            println!("✓ Configuration file is valid");
            let seeds = config.seed_addresses()?;
            println!("  Seeds: {} servers", seeds.len());
            for (i, seed) in seeds.iter().enumerate() {
                println!("    {}: {}", i + 1, seed);
            }
            if let Some(replica_set) = &config.cluster.replica_set {
                println!("  Replica set: {}", replica_set);
            }
            println!("  Default criteria: {}", config.selection.criteria());
            println!(
                "  Server selection timeout: {}ms",
                config.selection.server_selection_timeout_ms
            );
            Ok(())
        }
        Err(e) => {
            eprintln!("✗ Configuration file validation failed:");
            match &e {
                ConfigError::IoError(msg) => eprintln!("  File error: {}", msg),
                ConfigError::ParseError(msg) => eprintln!("  Parse error: {}", msg),
                ConfigError::ValidationError(msg) => eprintln!("  Validation error: {}", msg),
                ConfigError::SerializeError(msg) => eprintln!("  Serialization error: {}", msg),
            }
            bail!(e)
        }
    }
}

fn show_version() {
    println!("mongo-topology v{}", env!("CARGO_PKG_VERSION"));
    println!("Topology classification and server selection for MongoDB cluster clients");
    println!();
    println!("Target: {}", std::env::consts::ARCH);
    println!();
    println!("Features:");
    println!("  • Standalone, replica set and sharded topology classification");
    println!("  • Read preference selection with tag sets and max staleness");
    println!("  • Lock-free snapshot publishing between monitoring and operations");
}

fn init_logging(config: &Config) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let result = match config.logging.format.as_str() {
        "compact" => builder.compact().try_init(),
        _ => builder.try_init(),
    };
    result.map_err(|e| anyhow!("Failed to initialize logging: {e}"))?;

    info!("Logging initialized at level: {}", config.logging.level);
    Ok(())
}

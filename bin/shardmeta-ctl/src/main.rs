//! ShardMeta CLI - configuration store admin tool
//!
//! Inspects the versioned configuration tree shared by the cluster and
//! repairs active-version pointers by hand.

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use shardmeta_common::Config;
use shardmeta_common::config::RepositoryBackend;
use shardmeta_store::{
    MemoryRepository, MetaDataPersistFacade, MetaDataVersion, PersistRepository, RedbRepository,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "shardmeta-ctl")]
#[command(about = "ShardMeta configuration store admin CLI")]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "/etc/shardmeta/shardmeta.toml")]
    config: PathBuf,

    /// Repository backend (overrides the configuration file)
    #[arg(long, value_enum)]
    backend: Option<Backend>,

    /// Path of the redb file (overrides the configuration file)
    #[arg(long, env = "SHARDMETA_STORE")]
    store: Option<PathBuf>,

    /// Log level
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Backend {
    Memory,
    Redb,
}

impl From<Backend> for RepositoryBackend {
    fn from(backend: Backend) -> Self {
        match backend {
            Backend::Memory => Self::Memory,
            Backend::Redb => Self::Redb,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List the children of a node
    Ls {
        /// Node path
        path: String,
    },
    /// Print the raw value of a node
    Get {
        /// Node path
        path: String,
    },
    /// List the revisions of a versioned item
    Versions {
        /// Item path
        path: String,
    },
    /// Show the active revision of a versioned item and its value
    Active {
        /// Item path
        path: String,
    },
    /// Point a versioned item at an existing revision and prune older ones
    Activate {
        /// Item path
        path: String,
        /// Revision to make active
        version: u32,
    },
    /// List databases
    Databases,
    /// Show the storage units of a database
    Units {
        /// Database name
        database: String,
    },
}

fn load_config(args: &Args) -> Result<Config> {
    let mut config: Config = config::Config::builder()
        .add_source(config::File::from(args.config.clone()).required(false))
        .add_source(config::Environment::with_prefix("SHARDMETA").separator("__"))
        .build()
        .context("failed to read configuration")?
        .try_deserialize()
        .context("invalid configuration")?;
    if let Some(backend) = args.backend {
        config.repository.backend = backend.into();
    }
    if let Some(store) = &args.store {
        config.repository.path.clone_from(store);
    }
    if let Some(level) = &args.log_level {
        config.log.level.clone_from(level);
    }
    Ok(config)
}

fn init_tracing(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.log.level.clone().into());
    let registry = tracing_subscriber::registry().with(filter);
    if config.log.json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn open_repository(config: &Config) -> Result<Arc<dyn PersistRepository>> {
    match config.repository.backend {
        RepositoryBackend::Memory => Ok(Arc::new(MemoryRepository::new())),
        RepositoryBackend::Redb => {
            let path = &config.repository.path;
            debug!("Opening redb repository at {}", path.display());
            let repository = RedbRepository::open(path)
                .with_context(|| format!("failed to open {}", path.display()))?;
            Ok(Arc::new(repository))
        }
    }
}

/// Run one command, returning the lines to print
fn run(facade: &MetaDataPersistFacade, command: &Commands) -> Result<Vec<String>> {
    let repository = facade.repository();
    let versions = facade.version_service();
    match command {
        Commands::Ls { path } => Ok(repository.get_children_keys(path)?),
        Commands::Get { path } => match repository.query(path)? {
            Some(value) => Ok(vec![value]),
            None => bail!("{path} does not exist"),
        },
        Commands::Versions { path } => Ok(versions
            .get_versions(path)?
            .into_iter()
            .map(|each| each.to_string())
            .collect()),
        Commands::Active { path } => {
            let Some(active) = versions.get_active_version(path)? else {
                bail!("{path} has no active version");
            };
            let value = versions
                .get_version_path_by_active_version(path, active)?
                .unwrap_or_default();
            Ok(vec![format!("{active}: {value}")])
        }
        Commands::Activate { path, version } => {
            if versions
                .get_version_path_by_active_version(path, *version)?
                .is_none()
            {
                bail!("{path} has no revision {version}");
            }
            let current = versions.get_active_version(path)?.unwrap_or(*version);
            versions.switch_active_version(&[MetaDataVersion::new(path.as_str(), current, *version)])?;
            info!("Activated revision {} of {} (was {})", version, path, current);
            Ok(vec![format!("{path}: {current} -> {version}")])
        }
        Commands::Databases => Ok(facade.database_service().load_all_names()?),
        Commands::Units { database } => facade
            .data_source_unit_service()
            .load(database)?
            .into_iter()
            .map(|(name, props)| -> Result<String> {
                Ok(format!("{name}: {}", serde_json::to_string(&props)?))
            })
            .collect(),
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;
    init_tracing(&config);

    let facade = MetaDataPersistFacade::new(open_repository(&config)?);
    for line in run(&facade, &args.command)? {
        println!("{line}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use shardmeta_common::DataSourcePoolProperties;
    use std::collections::BTreeMap;
    use std::io::Write;

    fn facade() -> MetaDataPersistFacade {
        MetaDataPersistFacade::new(Arc::new(MemoryRepository::new()))
    }

    #[test]
    fn test_activate_switches_to_existing_revision() {
        let facade = facade();
        let versions = facade.version_service();
        versions.persist_next_version("/rules/transaction", "LOCAL").unwrap();
        versions.persist_next_version("/rules/transaction", "XA").unwrap();

        let out = run(
            &facade,
            &Commands::Activate {
                path: "/rules/transaction".to_string(),
                version: 1,
            },
        )
        .unwrap();
        assert_eq!(out, vec!["/rules/transaction: 0 -> 1"]);

        let active = run(&facade, &Commands::Active { path: "/rules/transaction".to_string() }).unwrap();
        assert_eq!(active, vec!["1: XA"]);
        let listed = run(&facade, &Commands::Versions { path: "/rules/transaction".to_string() }).unwrap();
        assert_eq!(listed, vec!["1"]);
    }

    #[test]
    fn test_activate_missing_revision() {
        let facade = facade();
        facade
            .version_service()
            .persist_next_version("/props", "{}")
            .unwrap();
        let err = run(
            &facade,
            &Commands::Activate {
                path: "/props".to_string(),
                version: 5,
            },
        )
        .unwrap_err();
        assert!(err.to_string().contains("no revision 5"));
    }

    #[test]
    fn test_databases_and_units() {
        let facade = facade();
        facade.database_service().add("foo_db").unwrap();
        let props = DataSourcePoolProperties::new("jdbc:mysql://127.0.0.1:3306/ds_0", "root", "");
        facade
            .data_source_unit_service()
            .persist("foo_db", &BTreeMap::from([("ds_0".to_string(), props)]))
            .unwrap();

        assert_eq!(run(&facade, &Commands::Databases).unwrap(), vec!["foo_db"]);
        let units = run(&facade, &Commands::Units { database: "foo_db".to_string() }).unwrap();
        assert_eq!(units.len(), 1);
        assert!(units[0].starts_with("ds_0: "));
        assert!(units[0].contains("jdbc:mysql://127.0.0.1:3306/ds_0"));
    }

    #[test]
    fn test_config_file_and_overrides() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[repository]\nbackend = \"memory\"\n\n[cluster]\nreload_timeout_ms = 1500").unwrap();

        let args = Args::parse_from([
            "shardmeta-ctl",
            "--config",
            file.path().to_str().unwrap(),
            "--log-level",
            "debug",
            "databases",
        ]);
        let config = load_config(&args).unwrap();
        assert_eq!(config.repository.backend, RepositoryBackend::Memory);
        assert_eq!(config.cluster.reload_timeout_ms, 1500);
        assert_eq!(config.log.level, "debug");
        assert_eq!(config.pool.drain_poll_interval_ms, 10);
    }

    #[test]
    fn test_redb_repository_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.repository.path = dir.path().join("meta.redb");

        let facade = MetaDataPersistFacade::new(open_repository(&config).unwrap());
        facade.database_service().add("foo_db").unwrap();
        drop(facade);

        let reopened = MetaDataPersistFacade::new(open_repository(&config).unwrap());
        assert_eq!(run(&reopened, &Commands::Databases).unwrap(), vec!["foo_db"]);
    }
}

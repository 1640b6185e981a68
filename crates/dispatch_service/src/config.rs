//! Command line, engine configuration loading and the shared service context.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use clap::{Parser, Subcommand};
use dispatch_core::fleet::{FleetFileError, FleetSnapshot};
use dispatch_core::{DispatchConfig, DispatchError, Dispatcher};
use thiserror::Error;
use tracing::{info, warn};

pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:7878";

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("failed to read config {path}: {source}")]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed config {path}: {source}")]
    ConfigJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Fleet(#[from] FleetFileError),
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Parser)]
#[command(
    name = "dispatchd",
    about = "Long-lived taxi dispatch service",
    long_about = "Holds one shared taxi fleet in memory and answers nearest-taxi\n\
                  queries and relocations as newline-delimited JSON."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
    /// JSON engine configuration; omitted fields keep their defaults
    #[arg(long, env = "DISPATCH_CONFIG", global = true)]
    pub config: Option<PathBuf>,
    /// Fleet snapshot loaded at start and rewritten after every relocation
    #[arg(long, env = "DISPATCH_FLEET_FILE", global = true)]
    pub fleet_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Serve over TCP, one JSON request per line
    Serve {
        /// Address to bind
        #[arg(long, env = "DISPATCH_LISTEN", default_value = DEFAULT_LISTEN_ADDR)]
        listen: String,
    },
    /// Serve a single session over stdin/stdout
    Stdio,
}

/// Read `path` as a [`DispatchConfig`], or use the defaults when absent.
pub fn load_config(path: Option<&Path>) -> Result<DispatchConfig, ServiceError> {
    let config = match path {
        None => DispatchConfig::default(),
        Some(path) => {
            let raw = fs::read_to_string(path).map_err(|source| ServiceError::ConfigIo {
                path: path.to_path_buf(),
                source,
            })?;
            serde_json::from_str(&raw).map_err(|source| ServiceError::ConfigJson {
                path: path.to_path_buf(),
                source,
            })?
        }
    };
    config.validate()?;
    Ok(config)
}

/// Everything a request handler needs: the dispatcher and where to persist the
/// fleet.
#[derive(Debug, Clone)]
pub struct ServiceContext {
    dispatcher: Dispatcher,
    fleet_file: Option<PathBuf>,
    persist_lock: Arc<Mutex<()>>,
}

impl ServiceContext {
    pub fn new(dispatcher: Dispatcher, fleet_file: Option<PathBuf>) -> Self {
        Self {
            dispatcher,
            fleet_file,
            persist_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Build the fleet from the snapshot file (generating and writing it when
    /// missing) or, without a file, from the configured seed.
    pub fn from_options(
        config: DispatchConfig,
        fleet_file: Option<PathBuf>,
    ) -> Result<Self, ServiceError> {
        let taxis = match &fleet_file {
            Some(path) => FleetSnapshot::load_or_generate(path, &config.fleet)?.taxis,
            None => config.fleet.generate(),
        };
        info!(taxis = taxis.len(), "starting with fleet");
        let dispatcher = Dispatcher::with_fleet(config, &taxis)?;
        Ok(Self::new(dispatcher, fleet_file))
    }

    pub fn from_cli(cli: &Cli) -> Result<Self, ServiceError> {
        let config = load_config(cli.config.as_deref())?;
        Self::from_options(config, cli.fleet_file.clone())
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn fleet_file(&self) -> Option<&Path> {
        self.fleet_file.as_deref()
    }

    /// Write the current fleet to the snapshot file, if one is configured.
    /// Failures are logged; the in-memory fleet stays authoritative.
    pub fn persist(&self) {
        let Some(path) = &self.fleet_file else {
            return;
        };
        let _guard = match self.persist_lock.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let taxis = match self.dispatcher.state().taxis() {
            Ok(taxis) => taxis,
            Err(err) => {
                warn!(%err, "skipping fleet snapshot");
                return;
            }
        };
        if let Err(err) = FleetSnapshot::new(taxis).save(path) {
            warn!(%err, "failed to write fleet snapshot");
        }
    }
}

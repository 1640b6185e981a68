//! Initial fleet generation and JSON fleet snapshots.
//!
//! A fresh process seeds its fleet from [`FleetConfig`]: `size` taxis on integer
//! coordinates drawn uniformly from `[min_coord, max_coord)`. A snapshot file
//! (`{"taxis": [{"x":..,"y":..}, ..]}`) takes precedence when present.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::error::DispatchError;
use crate::point::Point;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FleetConfig {
    pub size: usize,
    pub seed: u64,
    /// Inclusive lower bound for both coordinates.
    pub min_coord: i64,
    /// Exclusive upper bound for both coordinates.
    pub max_coord: i64,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            size: 50,
            seed: 42,
            min_coord: 0,
            max_coord: 100,
        }
    }
}

impl FleetConfig {
    pub fn validate(&self) -> Result<(), DispatchError> {
        if self.min_coord >= self.max_coord {
            return Err(DispatchError::InvalidInput(format!(
                "fleet coordinate range [{}, {}) is empty",
                self.min_coord, self.max_coord
            )));
        }
        Ok(())
    }

    /// Seeded taxi positions; the same config always yields the same fleet.
    pub fn generate(&self) -> Vec<Point> {
        if self.size == 0 || self.min_coord >= self.max_coord {
            return Vec::new();
        }
        let mut rng = StdRng::seed_from_u64(self.seed);
        (0..self.size)
            .map(|_| {
                let x = rng.gen_range(self.min_coord..self.max_coord);
                let y = rng.gen_range(self.min_coord..self.max_coord);
                Point::new(x as f64, y as f64)
            })
            .collect()
    }
}

#[derive(Debug, Error)]
pub enum FleetFileError {
    #[error("failed to access fleet file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed fleet file {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("fleet file {path} contains a taxi position outside the coordinate range")]
    OutOfRange { path: PathBuf },
}

/// On-disk fleet shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FleetSnapshot {
    pub taxis: Vec<Point>,
}

impl FleetSnapshot {
    pub fn new(taxis: Vec<Point>) -> Self {
        Self { taxis }
    }

    pub fn load(path: &Path) -> Result<Self, FleetFileError> {
        let raw = fs::read_to_string(path).map_err(|source| FleetFileError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let snapshot: FleetSnapshot =
            serde_json::from_str(&raw).map_err(|source| FleetFileError::Json {
                path: path.to_path_buf(),
                source,
            })?;
        if snapshot.taxis.iter().any(|p| !p.is_valid()) {
            return Err(FleetFileError::OutOfRange {
                path: path.to_path_buf(),
            });
        }
        Ok(snapshot)
    }

    /// Write the snapshot through a sibling temp file and rename it into place,
    /// so readers never see a half-written fleet.
    pub fn save(&self, path: &Path) -> Result<(), FleetFileError> {
        let io_err = |source| FleetFileError::Io {
            path: path.to_path_buf(),
            source,
        };
        let json = serde_json::to_string_pretty(self).map_err(|source| FleetFileError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, json).map_err(io_err)?;
        fs::rename(&tmp, path).map_err(io_err)?;
        Ok(())
    }

    /// Load `path` if it exists; otherwise generate a fleet from `config` and
    /// write it to `path` so the next start sees the same taxis.
    pub fn load_or_generate(path: &Path, config: &FleetConfig) -> Result<Self, FleetFileError> {
        if path.exists() {
            let snapshot = Self::load(path)?;
            info!(path = %path.display(), taxis = snapshot.taxis.len(), "loaded fleet snapshot");
            return Ok(snapshot);
        }
        let snapshot = Self::new(config.generate());
        snapshot.save(path)?;
        info!(path = %path.display(), taxis = snapshot.taxis.len(), "generated fleet snapshot");
        Ok(snapshot)
    }
}

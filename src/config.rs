use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of iterations used when none is given.
pub const DEFAULT_ITERATIONS: usize = 10;
/// Damping factor used when none is given.
pub const DEFAULT_DAMPING_FACTOR: f64 = 0.85;
/// Number of emissions buffered for a reduce worker before they are shipped.
pub const DEFAULT_BATCH_SIZE: usize = 1024;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("num_pages must be at least 1")]
    NumPagesZero,
    #[error("damping factor must be in (0, 1), got {0}")]
    InvalidDamping(f64),
    #[error("at least one iteration is required")]
    NoIterations,
    #[error("parallelism and batch size must be at least 1")]
    InvalidParallelism,
    #[error("cannot read configuration file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed configuration file: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Parameters of the PageRank computation, fixed for the whole run.
///
/// `num_pages` is trusted: it is used both for the uniform initial rank and for the teleport term
/// of the damping formula, and it is never compared against the pages actually present in the
/// input.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankConfig {
    pub num_pages: usize,
    pub iterations: usize,
    pub damping_factor: f64,
}

impl Default for RankConfig {
    fn default() -> Self {
        Self {
            num_pages: 0,
            iterations: DEFAULT_ITERATIONS,
            damping_factor: DEFAULT_DAMPING_FACTOR,
        }
    }
}

impl RankConfig {
    pub fn new(num_pages: usize) -> Self {
        Self {
            num_pages,
            ..Default::default()
        }
    }

    pub fn iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    pub fn damping_factor(mut self, damping_factor: f64) -> Self {
        self.damping_factor = damping_factor;
        self
    }

    /// Rank every page starts from in the first round.
    #[inline]
    pub fn initial_rank(&self) -> f64 {
        1.0 / self.num_pages as f64
    }

    /// Rank a page gets even if nobody links to it: `(1 - d) / num_pages`.
    #[inline]
    pub fn teleport(&self) -> f64 {
        (1.0 - self.damping_factor) / self.num_pages as f64
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_pages == 0 {
            return Err(ConfigError::NumPagesZero);
        }
        if !(self.damping_factor > 0.0 && self.damping_factor < 1.0) {
            return Err(ConfigError::InvalidDamping(self.damping_factor));
        }
        if self.iterations == 0 {
            return Err(ConfigError::NoIterations);
        }
        Ok(())
    }
}

/// How the rounds are executed on this machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Number of map workers and of reduce workers spawned for each round.
    pub parallelism: usize,
    /// Maximum number of emissions in a batch sent to a reduce worker.
    pub batch_size: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            parallelism: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl RuntimeConfig {
    pub fn local(parallelism: usize) -> Self {
        Self {
            parallelism,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.parallelism == 0 || self.batch_size == 0 {
            return Err(ConfigError::InvalidParallelism);
        }
        Ok(())
    }
}

/// Full configuration of a run, as found in a TOML file:
///
/// ```toml
/// [rank]
/// num_pages = 3
/// iterations = 20
///
/// [runtime]
/// parallelism = 4
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobConfig {
    pub rank: RankConfig,
    pub runtime: RuntimeConfig,
}

impl JobConfig {
    pub fn new(rank: RankConfig, runtime: RuntimeConfig) -> Self {
        Self { rank, runtime }
    }

    /// Load the configuration from a TOML file. Missing fields take their default value.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.rank.validate()?;
        self.runtime.validate()
    }
}

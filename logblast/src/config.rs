//! This module controls configuration parsing from the end user, providing a
//! convenience mechanism for the rest of the program. Crashes are most likely
//! to originate from this code, intentionally.
use std::{
    env, fs, io,
    net::SocketAddr,
    path::{Path, PathBuf},
};

use http::{HeaderMap, Uri};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::transport;

/// Environment variable holding the full YAML configuration. When set it takes
/// priority over any configuration path.
pub const CONFIG_ENV: &str = "LOGBLAST_CONFIG";

/// Errors produced by [`Config`]
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Error for a serde [`serde_yaml`].
    #[error("Failed to deserialize yaml: {0}")]
    SerdeYaml(#[from] serde_yaml::Error),
    /// Error reading config file
    #[error("Failed to read config file {path:?}: {source}")]
    ReadFile {
        /// File path
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: Box<io::Error>,
    },
    /// A run must make at least one attempt
    #[error("iterations cannot be zero")]
    ZeroIterations,
    /// The target must be an absolute URI
    #[error("target_uri must have a scheme and authority: {0}")]
    RelativeUri(String),
    /// A zero timeout would fail every request
    #[error("timeout_seconds cannot be zero")]
    ZeroTimeout,
}

/// Main configuration struct for this program
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
#[serde(deny_unknown_fields, default)]
pub struct Config {
    /// The seed for random operations. When unset a seed is drawn from the
    /// operating system.
    pub seed: Option<[u8; 32]>,
    /// The URI log batches are posted to
    #[serde(with = "http_serde::uri")]
    pub target_uri: Uri,
    /// Headers to include in each request in addition to the JSON content
    /// type
    #[serde(with = "http_serde::header_map")]
    pub headers: HeaderMap,
    /// The number of batches to send
    pub iterations: u32,
    /// The shape of each batch
    pub payload: logblast_payload::Config,
    /// How batches are delivered to `target_uri`
    #[serde(with = "serde_yaml::with::singleton_map_recursive")]
    pub transport: transport::Config,
    /// Address to bind a prometheus exporter to, if any
    pub prometheus_addr: Option<SocketAddr>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            seed: None,
            target_uri: Uri::from_static("http://localhost:4318/v1/logs"),
            headers: HeaderMap::new(),
            iterations: 1000,
            payload: logblast_payload::Config::default(),
            transport: transport::Config::default(),
            prometheus_addr: None,
        }
    }
}

impl Config {
    /// Parse a YAML document. Fields not present keep their defaults.
    ///
    /// # Errors
    ///
    /// Function will error if the document is not valid YAML or carries unknown
    /// fields.
    pub fn from_yaml(contents: &str) -> Result<Self, Error> {
        Ok(serde_yaml::from_str(contents)?)
    }

    /// Determine whether the configuration obeys validation criteria.
    ///
    /// # Errors
    ///
    /// Function will error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), Error> {
        if self.iterations == 0 {
            return Err(Error::ZeroIterations);
        }
        if self.target_uri.scheme().is_none() || self.target_uri.authority().is_none() {
            return Err(Error::RelativeUri(self.target_uri.to_string()));
        }
        if let transport::Config::Native(native) = &self.transport
            && native.timeout_seconds == Some(0)
        {
            return Err(Error::ZeroTimeout);
        }
        Ok(())
    }
}

/// Read the raw configuration, preferring [`CONFIG_ENV`] over `path`. Returns
/// `None` when neither is present.
///
/// # Errors
///
/// Function will error if `path` is given but cannot be read.
pub fn load_contents(path: Option<&Path>) -> Result<Option<String>, Error> {
    if let Ok(contents) = env::var(CONFIG_ENV) {
        debug!("Using config from env var '{CONFIG_ENV}'");
        return Ok(Some(contents));
    }
    let Some(path) = path else {
        return Ok(None);
    };
    debug!("Attempting to open configuration file at: {}", path.display());
    fs::read_to_string(path)
        .map(Some)
        .map_err(|source| Error::ReadFile {
            path: path.to_path_buf(),
            source: Box::new(source),
        })
}

/// Load the configuration, falling back to [`Config::default`] when there is
/// nothing to read. The result is not validated.
///
/// # Errors
///
/// See [`load_contents`] and [`Config::from_yaml`].
pub fn load(path: Option<&Path>) -> Result<Config, Error> {
    match load_contents(path)? {
        Some(contents) => Config::from_yaml(&contents),
        None => Ok(Config::default()),
    }
}

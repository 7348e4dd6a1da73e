//! Configuration loaded from `config/config.toml` or `DBCTL__DBCTL__<KEY>` environment variables.

use crate::migration::HashAlgorithm;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

const CONFIG_FILE: &str = "config/config.toml";
const ENV_PREFIX: &str = "DBCTL";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DbCtlConfig {
    /// Directory scanned for `.ddl`, `.dml` and `.dcl` scripts
    #[serde(default = "default_scripts_dir")]
    pub scripts_dir: PathBuf,
    /// Digest used for new change-log entries
    #[serde(default)]
    pub hash_algorithm: HashAlgorithm,
    /// Identity recorded as `applied_by`; the process user when unset
    #[serde(default)]
    pub applied_by: Option<String>,
}

fn default_scripts_dir() -> PathBuf {
    PathBuf::from("migrations")
}

impl Default for DbCtlConfig {
    fn default() -> Self {
        Self {
            scripts_dir: default_scripts_dir(),
            hash_algorithm: HashAlgorithm::default(),
            applied_by: None,
        }
    }
}

impl DbCtlConfig {
    /// Load the configuration from `config/config.toml`, falling back to env vars.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(Path::new(CONFIG_FILE))
    }

    /// Load the `[dbctl]` table from `path` (optional) layered under `DBCTL__DBCTL__<KEY>` env vars.
    ///
    /// `__` separates both the prefix and the table, so `applied_by` is set with
    /// `DBCTL__DBCTL__APPLIED_BY`.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .add_source(File::from(path).required(false))
            .add_source(env_source());

        let settings = match builder.build() {
            Ok(cfg) => cfg,
            Err(err) => {
                // The file exists but could not be read or parsed; retry with env only
                log::warn!(
                    "Failed to load config file {}, falling back to env: {}",
                    path.display(),
                    err
                );
                Config::builder()
                    .add_source(env_source())
                    .build()
                    .map_err(|env_err| {
                        ConfigError::Message(format!(
                            "Failed to load configuration from file and env: {err}, then env-only error: {env_err}"
                        ))
                    })?
            }
        };

        match settings.get::<DbCtlConfig>("dbctl") {
            Ok(cfg) => Ok(cfg),
            Err(ConfigError::NotFound(_)) => Ok(DbCtlConfig::default()),
            Err(e) => Err(ConfigError::Message(format!(
                "dbctl configuration could not be loaded from file or environment: {e}"
            ))),
        }
    }
}

fn env_source() -> Environment {
    Environment::with_prefix(ENV_PREFIX).separator("__")
}

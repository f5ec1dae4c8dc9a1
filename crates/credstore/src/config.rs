use crate::error::{CredentialError, Result};
use crate::hasher::{BcryptHasher, DEFAULT_COST};
use crate::store::CredentialStore;
use std::env;
use std::path::PathBuf;

pub const DATA_DIR_ENV: &str = "PWSTORE_DATA_DIR";
pub const HASH_COST_ENV: &str = "PWSTORE_HASH_COST";
pub const DEFAULT_DATA_DIR: &str = "./data/passwords";

/// Where the store lives and how new hashes are computed.
///
/// `authorize_init` is never read from the environment: it has to be set by
/// the caller, normally from a command-line switch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub data_dir: PathBuf,
    pub hash_cost: u32,
    pub authorize_init: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            hash_cost: DEFAULT_COST,
            authorize_init: false,
        }
    }
}

impl StoreConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(dir) = lookup(DATA_DIR_ENV).filter(|d| !d.is_empty()) {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(cost) = lookup(HASH_COST_ENV) {
            config.hash_cost = cost.trim().parse().map_err(|_| {
                CredentialError::InvalidConfig(format!("{}={} is not a number", HASH_COST_ENV, cost))
            })?;
        }
        Ok(config)
    }

    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    pub fn with_hash_cost(mut self, cost: u32) -> Self {
        self.hash_cost = cost;
        self
    }

    pub fn with_authorize_init(mut self, authorize: bool) -> Self {
        self.authorize_init = authorize;
        self
    }

    pub fn open(&self) -> Result<CredentialStore> {
        let hasher = BcryptHasher::new(self.hash_cost)?;
        CredentialStore::open_with(&self.data_dir, self.authorize_init, hasher)
    }
}

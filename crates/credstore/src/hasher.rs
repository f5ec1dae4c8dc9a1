//! One-way password hashing.

use crate::error::{CredentialError, Result};

pub use bcrypt::DEFAULT_COST;

const MIN_COST: u32 = 4;
const MAX_COST: u32 = 31;

/// A salted one-way hash whose output carries everything `verify` needs.
pub trait PasswordHasher {
    fn hash(&self, password: &str) -> Result<String>;

    /// Constant-time comparison of `password` against a stored hash.
    fn verify(&self, password: &str, hash: &str) -> Result<bool>;

    /// Work factor used by `hash`.
    fn cost(&self) -> u32;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BcryptHasher {
    cost: u32,
}

impl BcryptHasher {
    pub fn new(cost: u32) -> Result<Self> {
        if !(MIN_COST..=MAX_COST).contains(&cost) {
            return Err(CredentialError::InvalidCost(cost));
        }
        Ok(Self { cost })
    }
}

impl Default for BcryptHasher {
    fn default() -> Self {
        Self { cost: DEFAULT_COST }
    }
}

impl PasswordHasher for BcryptHasher {
    fn hash(&self, password: &str) -> Result<String> {
        bcrypt::hash(password, self.cost)
            .map_err(|e| CredentialError::HashComputationFailed(e.to_string()))
    }

    fn verify(&self, password: &str, hash: &str) -> Result<bool> {
        bcrypt::verify(password, hash)
            .map_err(|e| CredentialError::HashComputationFailed(e.to_string()))
    }

    fn cost(&self) -> u32 {
        self.cost
    }
}

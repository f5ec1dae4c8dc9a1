//! Accounts written when a new password store is initialized.

use crate::error::Result;
use crate::hasher::PasswordHasher;
use crate::record::CredentialRecord;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedAccount {
    pub username: &'static str,
    pub password: &'static str,
    pub role: &'static str,
    pub display_name: &'static str,
}

pub const SEED_ACCOUNTS: [SeedAccount; 2] = [
    SeedAccount {
        username: "admin",
        password: "sesame",
        role: "admin",
        display_name: "Pokemon Guardian",
    },
    SeedAccount {
        username: "volunteer",
        password: "open",
        role: "volunteer",
        display_name: "Pikachu Helper",
    },
];

/// Hashes every seed password. Fails before anything is written if the
/// hasher does.
pub(crate) fn records<H: PasswordHasher + ?Sized>(hasher: &H) -> Result<Vec<CredentialRecord>> {
    SEED_ACCOUNTS
        .iter()
        .map(|account| {
            debug!("Hashing seed password for {}", account.username);
            Ok(CredentialRecord {
                username: account.username.to_string(),
                password_hash: hasher.hash(account.password)?,
                hash_cost: hasher.cost(),
                role: account.role.to_string(),
                display_name: account.display_name.to_string(),
            })
        })
        .collect()
}

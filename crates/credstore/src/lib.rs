//! Password store with gated initialization.
//!
//! Accounts live in a [`storage::DocStore`] index. Passwords are kept only as
//! bcrypt hashes. A missing index is created, and seeded with the default
//! accounts, only when the caller explicitly authorizes it:
//!
//! ```no_run
//! use credstore::{CredentialStore, Field};
//!
//! let store = CredentialStore::open("./data/passwords", false)?;
//! let admin = store.find_by_username("admin", &[Field::Role, Field::DisplayName])?;
//! println!("{:?}", admin.role);
//! # Ok::<(), credstore::CredentialError>(())
//! ```

mod config;
mod error;
mod hasher;
mod record;
mod seed;
mod store;

pub use config::{StoreConfig, DATA_DIR_ENV, DEFAULT_DATA_DIR, HASH_COST_ENV};
pub use error::{CredentialError, Result};
pub use hasher::{BcryptHasher, PasswordHasher, DEFAULT_COST};
pub use record::{CredentialRecord, CredentialView, Field, ParseFieldError};
pub use seed::{SeedAccount, SEED_ACCOUNTS};
pub use store::CredentialStore;

use crate::error::{CredentialError, Result};
use crate::hasher::{BcryptHasher, PasswordHasher};
use crate::record::{self, CredentialRecord, CredentialView, Field};
use crate::seed;
use std::path::{Path, PathBuf};
use storage::{DocStore, StorageError, Value};
use tracing::{error, info, warn};

/// Password index rooted at a directory.
///
/// Opening an existing index is always allowed. Creating one writes the
/// default seed accounts, so it only happens when the caller passes
/// `authorize_init = true`.
#[derive(Debug)]
pub struct CredentialStore<H = BcryptHasher> {
    docs: DocStore,
    hasher: H,
}

impl CredentialStore {
    pub fn open(path: impl Into<PathBuf>, authorize_init: bool) -> Result<Self> {
        Self::open_with(path, authorize_init, BcryptHasher::default())
    }
}

impl<H: PasswordHasher> CredentialStore<H> {
    pub fn open_with(path: impl Into<PathBuf>, authorize_init: bool, hasher: H) -> Result<Self> {
        let path = path.into();

        if DocStore::exists(&path) {
            let docs = DocStore::open(path)?;
            return Ok(Self { docs, hasher });
        }

        if !authorize_init {
            warn!(
                "No password store at {} and creation was not authorized",
                path.display()
            );
            return Err(CredentialError::CreationNotAuthorized(path));
        }

        let docs = Self::create_seeded(&path, &hasher)?;
        Ok(Self { docs, hasher })
    }

    fn create_seeded(path: &Path, hasher: &H) -> Result<DocStore> {
        let records = seed::records(hasher)?;
        let initial = records.iter().map(CredentialRecord::to_document).collect();

        match DocStore::create(path, record::schema(), initial) {
            Ok(docs) => {
                info!(
                    "Initialized password store at {} with {} seed accounts",
                    path.display(),
                    docs.count()
                );
                Ok(docs)
            }
            Err(StorageError::IndexExists(_)) => {
                info!(
                    "Password store at {} was created concurrently, opening it",
                    path.display()
                );
                Ok(DocStore::open(path)?)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Exact-match lookup on the username.
    ///
    /// Returns `NotFound` for no match and `DuplicateRecord` when the index
    /// holds the name more than once.
    pub fn find_by_username(&self, username: &str, fields: &[Field]) -> Result<CredentialView> {
        let projection: Vec<&str> = fields.iter().map(|f| f.as_str()).collect();
        let hits = self
            .docs
            .query(Field::Name.as_str(), &Value::from(username), &projection)?;

        match hits.as_slice() {
            [] => Err(CredentialError::NotFound(username.to_string())),
            [hit] => CredentialView::from_hit(username, hit, fields),
            _ => {
                error!(
                    "Password store at {} holds {} records for {}",
                    self.docs.path().display(),
                    hits.len(),
                    username
                );
                Err(CredentialError::DuplicateRecord {
                    username: username.to_string(),
                    count: hits.len(),
                })
            }
        }
    }

    /// Checks `password` for `username`, returning the account's role and
    /// display name. The hash is not included in the result.
    pub fn authenticate(&self, username: &str, password: &str) -> Result<CredentialView> {
        let mut view = self.find_by_username(
            username,
            &[
                Field::Name,
                Field::PasswordHash,
                Field::Role,
                Field::DisplayName,
            ],
        )?;

        let hash = view.password_hash.take().ok_or_else(|| CredentialError::CorruptRecord {
            username: username.to_string(),
            field: Field::PasswordHash.as_str(),
        })?;

        if !self.hasher.verify(password, &hash)? {
            warn!("Rejected password for {}", username);
            return Err(CredentialError::InvalidPassword(username.to_string()));
        }
        Ok(view)
    }

    /// Whether the stored hash was computed with a lower cost than the
    /// hasher is configured for.
    pub fn needs_rehash(&self, username: &str) -> Result<bool> {
        let view = self.find_by_username(username, &[Field::Cost])?;
        let cost = view.cost.ok_or_else(|| CredentialError::CorruptRecord {
            username: username.to_string(),
            field: Field::Cost.as_str(),
        })?;
        Ok(cost < self.hasher.cost())
    }

    pub fn count(&self) -> usize {
        self.docs.count()
    }

    pub fn path(&self) -> &Path {
        self.docs.path()
    }

    pub fn hasher(&self) -> &H {
        &self.hasher
    }
}

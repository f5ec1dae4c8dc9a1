use crate::lock::InitLock;
use crate::page::{Page, PAGE_SIZE};
use crate::types::{DocId, Document, FieldType, Hit, Schema, Value};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

const CATALOG_FILE: &str = "catalog.bin";
const CATALOG_TMP_FILE: &str = "catalog.bin.tmp";
const DATA_FILE: &str = "documents.bin";
const FORMAT_VERSION: u32 = 1;
const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// How long `create` waits for a concurrent creator before giving up.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),
    #[error("No index at {0}")]
    IndexNotFound(PathBuf),
    #[error("Index already exists at {0}")]
    IndexExists(PathBuf),
    #[error("Index creation at {0} is locked by another process")]
    Locked(PathBuf),
    #[error("Unknown field: {0}")]
    UnknownField(String),
    #[error("Field {field} expects {expected}")]
    TypeMismatch { field: String, expected: FieldType },
    #[error("Duplicate value {value} for unique field {field}")]
    UniqueViolation { field: String, value: String },
    #[error("Document of {0} bytes does not fit in a page")]
    DocumentTooLarge(u64),
    #[error("Unsupported index format version {0}")]
    UnsupportedVersion(u32),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Catalog {
    version: u32,
    created_at: DateTime<Utc>,
    schema: Schema,
    doc_count: usize,
    page_count: usize,
    next_id: DocId,
}

impl Catalog {
    fn new(schema: Schema) -> Self {
        Self {
            version: FORMAT_VERSION,
            created_at: Utc::now(),
            schema,
            doc_count: 0,
            page_count: 0,
            next_id: 0,
        }
    }
}

/// A directory-backed document store with exact-match lookup on any field.
///
/// The catalog file is the commit point: documents written to the data file
/// only become visible once a catalog referencing them has been renamed into
/// place. A directory without a catalog holds no index.
#[derive(Debug)]
pub struct DocStore {
    path: PathBuf,
    catalog: Catalog,
    docs: HashMap<DocId, Document>,
    index: HashMap<(String, Value), Vec<DocId>>,
    tail: Page,
}

impl DocStore {
    /// Whether `path` holds a committed index. Never touches the filesystem
    /// beyond a metadata lookup.
    pub fn exists(path: &Path) -> bool {
        path.join(CATALOG_FILE).is_file()
    }

    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let catalog_path = path.join(CATALOG_FILE);

        let catalog: Catalog = match File::open(&catalog_path) {
            Ok(mut file) => {
                let mut bytes = Vec::new();
                file.read_to_end(&mut bytes)?;
                bincode::deserialize(&bytes)?
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StorageError::IndexNotFound(path));
            }
            Err(e) => return Err(e.into()),
        };

        if catalog.version != FORMAT_VERSION {
            return Err(StorageError::UnsupportedVersion(catalog.version));
        }

        let mut store = Self {
            path,
            catalog,
            docs: HashMap::new(),
            index: HashMap::new(),
            tail: Page::new(),
        };
        store.load()?;

        info!(
            "Opened index at {} ({} documents)",
            store.path.display(),
            store.count()
        );
        Ok(store)
    }

    pub fn create(
        path: impl Into<PathBuf>,
        schema: Schema,
        initial: Vec<Document>,
    ) -> Result<Self, StorageError> {
        Self::create_with_timeout(path, schema, initial, DEFAULT_LOCK_TIMEOUT)
    }

    /// Creates a new index and writes `initial` in the same commit.
    ///
    /// Either the whole initial set is committed or the directory is left
    /// without an index. If another creator holds the lock, waits up to
    /// `timeout` for it to finish and then reports `IndexExists`.
    pub fn create_with_timeout(
        path: impl Into<PathBuf>,
        schema: Schema,
        initial: Vec<Document>,
        timeout: Duration,
    ) -> Result<Self, StorageError> {
        let path = path.into();
        fs::create_dir_all(&path)?;

        let _lock = match InitLock::try_acquire(&path)? {
            Some(lock) => lock,
            None => return Err(Self::wait_for_creator(&path, timeout)),
        };

        if Self::exists(&path) {
            return Err(StorageError::IndexExists(path));
        }

        // Leftovers from an earlier failed creation were never committed.
        remove_if_present(&path.join(DATA_FILE))?;

        let mut store = Self {
            path,
            catalog: Catalog::new(schema),
            docs: HashMap::new(),
            index: HashMap::new(),
            tail: Page::new(),
        };

        if let Err(e) = store.put_batch(initial) {
            remove_if_present(&store.path.join(DATA_FILE)).ok();
            remove_if_present(&store.path.join(CATALOG_TMP_FILE)).ok();
            return Err(e);
        }

        info!(
            "Created index at {} with {} documents",
            store.path.display(),
            store.count()
        );
        Ok(store)
    }

    fn wait_for_creator(path: &Path, timeout: Duration) -> StorageError {
        warn!(
            "Index creation at {} already in progress, waiting",
            path.display()
        );
        let deadline = Instant::now() + timeout;
        loop {
            if Self::exists(path) {
                return StorageError::IndexExists(path.to_path_buf());
            }
            if Instant::now() >= deadline {
                return StorageError::Locked(path.to_path_buf());
            }
            std::thread::sleep(LOCK_POLL_INTERVAL);
        }
    }

    pub fn put(&mut self, doc: Document) -> Result<DocId, StorageError> {
        let ids = self.put_batch(vec![doc])?;
        Ok(ids[0])
    }

    /// Validates every document, writes the pages, then commits the catalog.
    /// Nothing becomes visible unless the whole batch is accepted.
    pub fn put_batch(&mut self, docs: Vec<Document>) -> Result<Vec<DocId>, StorageError> {
        self.validate(&docs)?;

        let first_page = self.catalog.page_count.saturating_sub(1);
        let mut pages = Vec::new();
        let mut current = self.tail.clone();
        let mut ids = Vec::with_capacity(docs.len());

        for (offset, doc) in docs.iter().enumerate() {
            let id = self.catalog.next_id + offset as DocId;
            if let Err((id, doc)) = current.try_add(id, doc.clone())? {
                let mut fresh = Page::new();
                if fresh.try_add(id, doc)?.is_err() {
                    let size = bincode::serialized_size(&docs[offset])?;
                    return Err(StorageError::DocumentTooLarge(size));
                }
                pages.push(std::mem::replace(&mut current, fresh));
            }
            ids.push(id);
        }
        pages.push(current);

        self.write_pages(first_page, &pages)?;

        let mut catalog = self.catalog.clone();
        catalog.page_count = first_page + pages.len();
        catalog.doc_count += docs.len();
        catalog.next_id += docs.len() as DocId;
        self.save_catalog(&catalog)?;
        self.catalog = catalog;

        if let Some(last) = pages.pop() {
            self.tail = last;
        }
        for (id, doc) in ids.iter().zip(docs) {
            self.insert_indexed(*id, doc);
        }

        debug!("Committed {} documents to {}", ids.len(), self.path.display());
        Ok(ids)
    }

    /// Exact-match lookup of `value` in `field`, returning only `projection`.
    pub fn query(
        &self,
        field: &str,
        value: &Value,
        projection: &[&str],
    ) -> Result<Vec<Hit>, StorageError> {
        for name in std::iter::once(&field).chain(projection) {
            if self.catalog.schema.field_type(name).is_none() {
                return Err(StorageError::UnknownField(name.to_string()));
            }
        }

        let ids = self
            .index
            .get(&(field.to_string(), value.clone()))
            .map(Vec::as_slice)
            .unwrap_or_default();

        let hits: Vec<Hit> = ids
            .iter()
            .filter_map(|id| self.docs.get(id).map(|doc| (id, doc)))
            .map(|(id, doc)| Hit {
                id: *id,
                fields: projection
                    .iter()
                    .filter_map(|name| doc.get(name).map(|v| (name.to_string(), v.clone())))
                    .collect(),
            })
            .collect();

        debug!("Query {}={} matched {} documents", field, value, hits.len());
        Ok(hits)
    }

    pub fn count(&self) -> usize {
        self.catalog.doc_count
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn schema(&self) -> &Schema {
        &self.catalog.schema
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.catalog.created_at
    }

    fn validate(&self, docs: &[Document]) -> Result<(), StorageError> {
        let schema = &self.catalog.schema;
        let mut seen: HashSet<(&str, &Value)> = HashSet::new();

        for doc in docs {
            schema.check(doc)?;
            for field in schema.unique_fields() {
                let value = match doc.get(field) {
                    Some(Value::Null) | None => continue,
                    Some(v) => v,
                };
                let stored = self
                    .index
                    .get(&(field.clone(), value.clone()))
                    .is_some_and(|ids| !ids.is_empty());
                if stored || !seen.insert((field.as_str(), value)) {
                    return Err(StorageError::UniqueViolation {
                        field: field.clone(),
                        value: value.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    fn insert_indexed(&mut self, id: DocId, doc: Document) {
        for (field, value) in &doc.data {
            self.index
                .entry((field.clone(), value.clone()))
                .or_default()
                .push(id);
        }
        self.docs.insert(id, doc);
    }

    fn load(&mut self) -> Result<(), StorageError> {
        if self.catalog.page_count == 0 {
            return Ok(());
        }

        let mut file = File::open(self.path.join(DATA_FILE))?;
        let mut buffer = vec![0u8; PAGE_SIZE];
        let mut loaded = 0;

        for page_id in 0..self.catalog.page_count {
            file.seek(SeekFrom::Start((page_id * PAGE_SIZE) as u64))?;
            file.read_exact(&mut buffer)?;
            let mut page = Page::from_bytes(&buffer)?;

            // Entries past `next_id` belong to a batch that never committed.
            page.entries.retain(|(id, _)| *id < self.catalog.next_id);
            for (id, doc) in page.entries.iter().cloned() {
                self.insert_indexed(id, doc);
                loaded += 1;
            }
            self.tail = page;
        }

        if loaded != self.catalog.doc_count {
            warn!(
                "Catalog at {} lists {} documents but {} were found",
                self.path.display(),
                self.catalog.doc_count,
                loaded
            );
            self.catalog.doc_count = loaded;
        }
        Ok(())
    }

    fn write_pages(&self, first_page: usize, pages: &[Page]) -> Result<(), StorageError> {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .read(true)
            .truncate(false)
            .open(self.path.join(DATA_FILE))?;

        for (i, page) in pages.iter().enumerate() {
            let offset = (first_page + i) * PAGE_SIZE;
            file.seek(SeekFrom::Start(offset as u64))?;
            file.write_all(&page.to_bytes()?)?;
        }
        file.sync_data()?;
        Ok(())
    }

    fn save_catalog(&self, catalog: &Catalog) -> Result<(), StorageError> {
        let tmp_path = self.path.join(CATALOG_TMP_FILE);
        let bytes = bincode::serialize(catalog)?;
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&tmp_path)?;
        file.write_all(&bytes)?;
        file.sync_all()?;
        fs::rename(&tmp_path, self.path.join(CATALOG_FILE))?;
        Ok(())
    }
}

fn remove_if_present(path: &Path) -> std::io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Barrier};

    fn schema() -> Schema {
        Schema::new()
            .unique_field("name", FieldType::Text)
            .field("role", FieldType::Text)
            .field("cost", FieldType::Int)
    }

    fn user(name: &str, role: &str) -> Document {
        Document::new()
            .with("name", name)
            .with("role", role)
            .with("cost", 10i64)
    }

    #[test]
    fn test_open_missing_index_creates_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("idx");

        assert!(!DocStore::exists(&path));
        assert!(matches!(
            DocStore::open(&path),
            Err(StorageError::IndexNotFound(_))
        ));
        assert!(!path.exists());
    }

    #[test]
    fn test_create_then_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let store = DocStore::create(
            dir.path(),
            schema(),
            vec![user("admin", "admin"), user("volunteer", "volunteer")],
        )
        .unwrap();
        assert_eq!(store.count(), 2);
        let created = store.created_at();
        drop(store);

        let reopened = DocStore::open(dir.path()).unwrap();
        assert_eq!(reopened.count(), 2);
        assert_eq!(reopened.created_at(), created);
        assert_eq!(reopened.schema(), &schema());
        assert!(!dir.path().join(crate::lock::LOCK_FILE).exists());
    }

    #[test]
    fn test_create_twice_fails() {
        let dir = tempfile::tempdir().unwrap();
        DocStore::create(dir.path(), schema(), vec![]).unwrap();

        assert!(matches!(
            DocStore::create(dir.path(), schema(), vec![]),
            Err(StorageError::IndexExists(_))
        ));
    }

    #[test]
    fn test_query_projects_requested_fields() {
        let dir = tempfile::tempdir().unwrap();
        let store = DocStore::create(
            dir.path(),
            schema(),
            vec![user("admin", "admin"), user("volunteer", "volunteer")],
        )
        .unwrap();

        let hits = store
            .query("name", &Value::from("volunteer"), &["role"])
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].get("role"), Some(&Value::from("volunteer")));
        assert_eq!(hits[0].get("name"), None);
        assert_eq!(hits[0].get("cost"), None);

        let hits = store.query("role", &Value::from("nobody"), &[]).unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn test_query_is_exact_match() {
        let dir = tempfile::tempdir().unwrap();
        let store =
            DocStore::create(dir.path(), schema(), vec![user("admin", "admin")]).unwrap();

        for probe in ["Admin", "adm", "admin ", ""] {
            let hits = store.query("name", &Value::from(probe), &["name"]).unwrap();
            assert!(hits.is_empty(), "{:?} should not match", probe);
        }
    }

    #[test]
    fn test_query_unknown_field() {
        let dir = tempfile::tempdir().unwrap();
        let store = DocStore::create(dir.path(), schema(), vec![]).unwrap();

        assert!(matches!(
            store.query("email", &Value::from("a@b"), &[]),
            Err(StorageError::UnknownField(f)) if f == "email"
        ));
        assert!(matches!(
            store.query("name", &Value::from("admin"), &["email"]),
            Err(StorageError::UnknownField(_))
        ));
    }

    #[test]
    fn test_unique_violation_against_stored() {
        let dir = tempfile::tempdir().unwrap();
        let mut store =
            DocStore::create(dir.path(), schema(), vec![user("admin", "admin")]).unwrap();

        assert!(matches!(
            store.put(user("admin", "volunteer")),
            Err(StorageError::UniqueViolation { field, .. }) if field == "name"
        ));
        assert_eq!(store.count(), 1);
    }

    #[test]
    fn test_unique_violation_within_batch_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = DocStore::create(dir.path(), schema(), vec![]).unwrap();

        let result = store.put_batch(vec![user("a", "x"), user("b", "x"), user("a", "y")]);
        assert!(matches!(result, Err(StorageError::UniqueViolation { .. })));
        assert_eq!(store.count(), 0);

        drop(store);
        assert_eq!(DocStore::open(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_failed_create_leaves_no_index() {
        let dir = tempfile::tempdir().unwrap();
        let result = DocStore::create(
            dir.path(),
            schema(),
            vec![user("admin", "admin"), user("admin", "admin")],
        );

        assert!(matches!(result, Err(StorageError::UniqueViolation { .. })));
        assert!(!DocStore::exists(dir.path()));
        assert!(!dir.path().join(DATA_FILE).exists());
        assert!(!dir.path().join(crate::lock::LOCK_FILE).exists());
    }

    #[test]
    fn test_document_too_large() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = DocStore::create(dir.path(), schema(), vec![]).unwrap();

        let big = Document::new().with("name", "x".repeat(PAGE_SIZE * 2));
        assert!(matches!(
            store.put(big),
            Err(StorageError::DocumentTooLarge(_))
        ));
    }

    #[test]
    fn test_many_documents_span_pages() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = DocStore::create(dir.path(), schema(), vec![]).unwrap();

        for i in 0..300 {
            store.put(user(&format!("user-{:04}", i), "volunteer")).unwrap();
        }
        assert!(store.catalog.page_count > 1);
        drop(store);

        let store = DocStore::open(dir.path()).unwrap();
        assert_eq!(store.count(), 300);
        assert_eq!(
            store.query("role", &Value::from("volunteer"), &[]).unwrap().len(),
            300
        );
        let hits = store
            .query("name", &Value::from("user-0299"), &["name"])
            .unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn test_uncommitted_entries_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let mut store =
            DocStore::create(dir.path(), schema(), vec![user("admin", "admin")]).unwrap();

        // Simulate a crash between writing pages and committing the catalog.
        let mut tail = store.tail.clone();
        tail.try_add(store.catalog.next_id, user("ghost", "admin"))
            .unwrap()
            .unwrap();
        store.write_pages(0, &[tail]).unwrap();
        drop(store);

        let store = DocStore::open(dir.path()).unwrap();
        assert_eq!(store.count(), 1);
        assert!(store
            .query("name", &Value::from("ghost"), &[])
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_concurrent_create_has_one_winner() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().to_path_buf();
        let barrier = Arc::new(Barrier::new(4));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let path = path.clone();
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    DocStore::create(&path, schema(), vec![user("admin", "admin")]).is_ok()
                })
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(winners, 1);
        assert_eq!(DocStore::open(&path).unwrap().count(), 1);
    }

    #[test]
    fn test_stale_lock_reports_locked() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(crate::lock::LOCK_FILE), b"1").unwrap();

        let result = DocStore::create_with_timeout(
            dir.path(),
            schema(),
            vec![],
            Duration::from_millis(50),
        );
        assert!(matches!(result, Err(StorageError::Locked(_))));
    }
}

//! In-process document store.
//!
//! All collections live behind one `RwLock`. Queries take the read side through
//! [`LabStore::read`]; every mutation goes through [`LabStore::transaction`], which holds the
//! write side for the whole closure and records an undo entry for each write. If the closure
//! fails, or committed documents cannot be persisted, every write is undone and the store is
//! left exactly as it was.
//!
//! Unique indexes (patient MRN, test code, user email, one result per order and test) are
//! enforced on every put and are the only duplicate check services rely on.

mod documents;
mod persistence;

pub use documents::{EMAIL_INDEX, MRN_INDEX, RESULT_PAIR_INDEX, TEST_CODE_INDEX};
pub use persistence::YamlPersistence;

use crate::config::CoreConfig;
use crate::models::{LabResult, LabTest, Order, Patient, Report, Sample, User};
use crate::{LisError, LisResult};
use lis_uuid::EntityId;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

pub type Table<T> = BTreeMap<EntityId, T>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Collection {
    Patients,
    Tests,
    Users,
    Orders,
    Samples,
    Results,
    Reports,
}

impl Collection {
    pub const ALL: [Collection; 7] = [
        Collection::Patients,
        Collection::Tests,
        Collection::Users,
        Collection::Orders,
        Collection::Samples,
        Collection::Results,
        Collection::Reports,
    ];

    pub fn dir_name(self) -> &'static str {
        match self {
            Collection::Patients => "patients",
            Collection::Tests => "tests",
            Collection::Users => "users",
            Collection::Orders => "orders",
            Collection::Samples => "samples",
            Collection::Results => "results",
            Collection::Reports => "reports",
        }
    }
}

/// A document type stored in one collection of [`Tables`].
pub trait Document: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    const COLLECTION: Collection;
    /// Entity name used in `NotFound` errors.
    const ENTITY: &'static str;

    fn id(&self) -> EntityId;

    /// `(index name, key)` pairs that must be unique across the collection.
    fn unique_keys(&self) -> Vec<(&'static str, String)> {
        Vec::new()
    }

    fn table(tables: &Tables) -> &Table<Self>;
    fn table_mut(tables: &mut Tables) -> &mut Table<Self>;
    fn into_any(self) -> AnyDocument;
}

/// Owned snapshot of any document, kept in the undo log.
#[derive(Clone, Debug)]
pub enum AnyDocument {
    Patient(Patient),
    Test(LabTest),
    User(User),
    Order(Order),
    Sample(Sample),
    Result(LabResult),
    Report(Report),
}

impl AnyDocument {
    fn restore(self, tables: &mut Tables) {
        match self {
            AnyDocument::Patient(doc) => {
                tables.put_raw(doc);
            }
            AnyDocument::Test(doc) => {
                tables.put_raw(doc);
            }
            AnyDocument::User(doc) => {
                tables.put_raw(doc);
            }
            AnyDocument::Order(doc) => {
                tables.put_raw(doc);
            }
            AnyDocument::Sample(doc) => {
                tables.put_raw(doc);
            }
            AnyDocument::Result(doc) => {
                tables.put_raw(doc);
            }
            AnyDocument::Report(doc) => {
                tables.put_raw(doc);
            }
        }
    }
}

// ============================================================================
// TABLES
// ============================================================================

#[derive(Debug, Default)]
pub struct Tables {
    patients: Table<Patient>,
    tests: Table<LabTest>,
    users: Table<User>,
    orders: Table<Order>,
    samples: Table<Sample>,
    results: Table<LabResult>,
    reports: Table<Report>,
    indexes: HashMap<(&'static str, String), EntityId>,
}

impl Tables {
    pub fn get<T: Document>(&self, id: EntityId) -> Option<&T> {
        T::table(self).get(&id)
    }

    /// # Errors
    ///
    /// Returns [`LisError::NotFound`] naming the entity when `id` is absent.
    pub fn require<T: Document>(&self, id: EntityId) -> LisResult<&T> {
        self.get(id).ok_or_else(|| LisError::not_found(T::ENTITY, id))
    }

    pub fn iter<T: Document>(&self) -> impl Iterator<Item = &T> {
        T::table(self).values()
    }

    pub fn count<T: Document>(&self) -> usize {
        T::table(self).len()
    }

    /// Resolves a unique index entry to the owning document id.
    pub fn lookup(&self, index: &'static str, key: &str) -> Option<EntityId> {
        self.indexes.get(&(index, key.to_string())).copied()
    }

    fn check_unique<T: Document>(&self, doc: &T) -> LisResult<()> {
        for (index, key) in doc.unique_keys() {
            match self.indexes.get(&(index, key.clone())) {
                Some(owner) if *owner != doc.id() => {
                    return Err(LisError::Conflict { index, value: key });
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn put_raw<T: Document>(&mut self, doc: T) -> Option<T> {
        let id = doc.id();
        let previous = self.remove_raw::<T>(id);
        for key in doc.unique_keys() {
            self.indexes.insert(key, id);
        }
        T::table_mut(self).insert(id, doc);
        previous
    }

    fn remove_raw<T: Document>(&mut self, id: EntityId) -> Option<T> {
        let previous = T::table_mut(self).remove(&id)?;
        for key in previous.unique_keys() {
            if self.indexes.get(&key) == Some(&id) {
                self.indexes.remove(&key);
            }
        }
        Some(previous)
    }

    fn remove_any(&mut self, collection: Collection, id: EntityId) {
        match collection {
            Collection::Patients => {
                self.remove_raw::<Patient>(id);
            }
            Collection::Tests => {
                self.remove_raw::<LabTest>(id);
            }
            Collection::Users => {
                self.remove_raw::<User>(id);
            }
            Collection::Orders => {
                self.remove_raw::<Order>(id);
            }
            Collection::Samples => {
                self.remove_raw::<Sample>(id);
            }
            Collection::Results => {
                self.remove_raw::<LabResult>(id);
            }
            Collection::Reports => {
                self.remove_raw::<Report>(id);
            }
        }
    }

    fn persist(
        &self,
        store: &YamlPersistence,
        collection: Collection,
        id: EntityId,
    ) -> LisResult<()> {
        match collection {
            Collection::Patients => persist_one::<Patient>(self, store, id),
            Collection::Tests => persist_one::<LabTest>(self, store, id),
            Collection::Users => persist_one::<User>(self, store, id),
            Collection::Orders => persist_one::<Order>(self, store, id),
            Collection::Samples => persist_one::<Sample>(self, store, id),
            Collection::Results => persist_one::<LabResult>(self, store, id),
            Collection::Reports => persist_one::<Report>(self, store, id),
        }
    }

    fn load<T: Document>(&mut self, store: &YamlPersistence) -> LisResult<usize> {
        let mut loaded = 0;
        for doc in store.load_all::<T>()? {
            if let Err(e) = self.check_unique(&doc) {
                tracing::warn!(id = %doc.id(), error = %e, "skipping document with duplicate key");
                continue;
            }
            self.put_raw(doc);
            loaded += 1;
        }
        Ok(loaded)
    }
}

fn persist_one<T: Document>(
    tables: &Tables,
    store: &YamlPersistence,
    id: EntityId,
) -> LisResult<()> {
    match tables.get::<T>(id) {
        Some(doc) => store.write(doc),
        None => store.remove(T::COLLECTION, id),
    }
}

// ============================================================================
// TRANSACTION
// ============================================================================

struct UndoEntry {
    collection: Collection,
    id: EntityId,
    previous: Option<AnyDocument>,
}

/// Exclusive write access to the store for the duration of one [`LabStore::transaction`].
pub struct Transaction<'a> {
    tables: &'a mut Tables,
    undo: Vec<UndoEntry>,
    dirty: BTreeSet<(Collection, EntityId)>,
}

impl Transaction<'_> {
    /// Read-only view of the tables including this transaction's uncommitted writes.
    pub fn view(&self) -> &Tables {
        &*self.tables
    }

    pub fn get<T: Document>(&self, id: EntityId) -> Option<&T> {
        self.tables.get(id)
    }

    /// Clones a document out, or fails with `NotFound`.
    pub fn fetch<T: Document>(&self, id: EntityId) -> LisResult<T> {
        self.tables.require::<T>(id).cloned()
    }

    /// Inserts or replaces a document.
    ///
    /// # Errors
    ///
    /// Returns [`LisError::Conflict`] if any of the document's unique keys is owned by another
    /// document. Nothing is written in that case.
    pub fn put<T: Document>(&mut self, doc: T) -> LisResult<()> {
        self.tables.check_unique(&doc)?;
        let id = doc.id();
        let previous = self.tables.put_raw(doc);
        self.undo.push(UndoEntry {
            collection: T::COLLECTION,
            id,
            previous: previous.map(Document::into_any),
        });
        self.dirty.insert((T::COLLECTION, id));
        Ok(())
    }

    /// Loads a document, applies `f` to it and writes it back. Returns the updated copy.
    pub fn update<T, F>(&mut self, id: EntityId, f: F) -> LisResult<T>
    where
        T: Document,
        F: FnOnce(&mut T) -> LisResult<()>,
    {
        let mut doc = self.fetch::<T>(id)?;
        f(&mut doc)?;
        self.put(doc.clone())?;
        Ok(doc)
    }

    /// Removes a document, returning it if it existed.
    pub fn remove<T: Document>(&mut self, id: EntityId) -> Option<T> {
        let previous = self.tables.remove_raw::<T>(id)?;
        self.undo.push(UndoEntry {
            collection: T::COLLECTION,
            id,
            previous: Some(previous.clone().into_any()),
        });
        self.dirty.insert((T::COLLECTION, id));
        Some(previous)
    }

    fn rollback(mut self) {
        while let Some(entry) = self.undo.pop() {
            match entry.previous {
                Some(doc) => doc.restore(self.tables),
                None => self.tables.remove_any(entry.collection, entry.id),
            }
        }
    }
}

// ============================================================================
// STORE
// ============================================================================

/// Shared handle to the document store. Cloning is cheap; clones see the same data.
#[derive(Clone, Default)]
pub struct LabStore {
    inner: Arc<RwLock<Tables>>,
    persistence: Option<Arc<YamlPersistence>>,
}

impl LabStore {
    /// A store that keeps everything in memory.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Opens the store described by `cfg`.
    ///
    /// With a data directory configured, every persisted document is loaded and later commits
    /// are written back. Without one, this is [`LabStore::in_memory`].
    ///
    /// # Errors
    ///
    /// Returns a storage error if the data directory cannot be created or listed.
    pub fn open(cfg: &CoreConfig) -> LisResult<Self> {
        let Some(dir) = cfg.data_dir() else {
            return Ok(Self::in_memory());
        };

        let persistence = YamlPersistence::new(dir)?;
        let mut tables = Tables::default();
        let loaded = tables.load::<Patient>(&persistence)?
            + tables.load::<LabTest>(&persistence)?
            + tables.load::<User>(&persistence)?
            + tables.load::<Order>(&persistence)?
            + tables.load::<Sample>(&persistence)?
            + tables.load::<LabResult>(&persistence)?
            + tables.load::<Report>(&persistence)?;
        tracing::info!(dir = %dir.display(), documents = loaded, "lab store opened");

        Ok(Self {
            inner: Arc::new(RwLock::new(tables)),
            persistence: Some(Arc::new(persistence)),
        })
    }

    pub fn is_persistent(&self) -> bool {
        self.persistence.is_some()
    }

    /// Runs a query against a consistent snapshot of the tables.
    pub fn read<R>(&self, f: impl FnOnce(&Tables) -> R) -> R {
        let tables = self.inner.read();
        f(&tables)
    }

    /// Runs `f` with exclusive write access.
    ///
    /// # Errors
    ///
    /// Returns whatever `f` returns, or a storage error if committed documents cannot be
    /// written. In both cases every write made by `f` is undone.
    pub fn transaction<R>(
        &self,
        f: impl FnOnce(&mut Transaction<'_>) -> LisResult<R>,
    ) -> LisResult<R> {
        let mut tables = self.inner.write();
        let mut tx = Transaction {
            tables: &mut *tables,
            undo: Vec::new(),
            dirty: BTreeSet::new(),
        };

        let value = match f(&mut tx) {
            Ok(value) => value,
            Err(e) => {
                tx.rollback();
                return Err(e);
            }
        };

        if let Some(persistence) = &self.persistence {
            let dirty = std::mem::take(&mut tx.dirty);
            for (collection, id) in dirty {
                if let Err(e) = tx.tables.persist(persistence, collection, id) {
                    tracing::error!(
                        collection = collection.dir_name(),
                        %id,
                        error = %e,
                        "commit failed, rolling back"
                    );
                    tx.rollback();
                    return Err(e);
                }
            }
        }

        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::TransitionPolicy;
    use crate::models::UserRole;
    use chrono::Utc;
    use lis_types::EmailAddress;
    use tempfile::TempDir;

    fn user(email: &str) -> User {
        User {
            id: EntityId::new(),
            name: "Grace Hopper".into(),
            email: EmailAddress::parse(email).expect("valid email"),
            role: UserRole::LabTechnician,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    fn persistent_cfg(dir: &TempDir) -> CoreConfig {
        CoreConfig::new(
            Some(dir.path().to_path_buf()),
            TransitionPolicy::Permissive,
            7,
        )
        .expect("valid config")
    }

    #[test]
    fn duplicate_unique_key_is_a_conflict() {
        let store = LabStore::in_memory();
        store
            .transaction(|tx| tx.put(user("a@lab.example")))
            .expect("first insert");

        let err = store
            .transaction(|tx| tx.put(user("A@lab.example")))
            .expect_err("second insert should clash");
        assert!(matches!(err, LisError::Conflict { index: EMAIL_INDEX, .. }));
        assert_eq!(store.read(|t| t.count::<User>()), 1);
    }

    #[test]
    fn failed_transaction_rolls_back_every_write() {
        let store = LabStore::in_memory();
        let existing = user("keep@lab.example");
        let existing_id = existing.id;
        store
            .transaction(|tx| tx.put(existing))
            .expect("seed");

        let result: LisResult<()> = store.transaction(|tx| {
            tx.put(user("new@lab.example"))?;
            tx.update::<User, _>(existing_id, |u| {
                u.is_active = false;
                Ok(())
            })?;
            Err(LisError::InvalidInput("abort".into()))
        });
        assert!(result.is_err());

        store.read(|t| {
            assert_eq!(t.count::<User>(), 1);
            let kept = t.require::<User>(existing_id).expect("still present");
            assert!(kept.is_active);
            assert!(t.lookup(EMAIL_INDEX, "new@lab.example").is_none());
            assert_eq!(t.lookup(EMAIL_INDEX, "keep@lab.example"), Some(existing_id));
        });
    }

    #[test]
    fn removal_frees_unique_key() {
        let store = LabStore::in_memory();
        let first = user("dup@lab.example");
        let first_id = first.id;
        store.transaction(|tx| tx.put(first)).expect("insert");
        store
            .transaction(|tx| {
                tx.remove::<User>(first_id);
                Ok(())
            })
            .expect("remove");
        store
            .transaction(|tx| tx.put(user("dup@lab.example")))
            .expect("key is free again");
    }

    #[test]
    fn committed_documents_reload_from_disk() {
        let dir = TempDir::new().expect("temp dir");
        let cfg = persistent_cfg(&dir);
        let doc = user("persist@lab.example");
        let id = doc.id;

        {
            let store = LabStore::open(&cfg).expect("open store");
            store.transaction(|tx| tx.put(doc)).expect("insert");
        }

        let path = id.sharded_path(&dir.path().join("users"), "yaml");
        assert!(path.exists(), "document written to sharded path");

        let reopened = LabStore::open(&cfg).expect("reopen store");
        reopened.read(|t| {
            let loaded = t.require::<User>(id).expect("reloaded");
            assert_eq!(loaded.email.as_str(), "persist@lab.example");
            assert_eq!(t.lookup(EMAIL_INDEX, "persist@lab.example"), Some(id));
        });
    }

    #[test]
    fn unreadable_documents_are_skipped_on_open() {
        let dir = TempDir::new().expect("temp dir");
        let cfg = persistent_cfg(&dir);
        {
            let store = LabStore::open(&cfg).expect("open store");
            store
                .transaction(|tx| tx.put(user("ok@lab.example")))
                .expect("insert");
        }

        let bogus = EntityId::new().sharded_path(&dir.path().join("users"), "yaml");
        std::fs::create_dir_all(bogus.parent().expect("parent")).expect("mkdir");
        std::fs::write(&bogus, "id: not-an-id\nname: 3\n").expect("write bogus");

        let reopened = LabStore::open(&cfg).expect("reopen despite bad file");
        assert_eq!(reopened.read(|t| t.count::<User>()), 1);
    }

    #[test]
    fn removed_documents_are_deleted_from_disk() {
        let dir = TempDir::new().expect("temp dir");
        let store = LabStore::open(&persistent_cfg(&dir)).expect("open store");
        let doc = user("gone@lab.example");
        let id = doc.id;
        store.transaction(|tx| tx.put(doc)).expect("insert");
        store
            .transaction(|tx| {
                tx.remove::<User>(id);
                Ok(())
            })
            .expect("remove");

        assert!(!id.sharded_path(&dir.path().join("users"), "yaml").exists());
    }
}

//! Embedded JSON document store.
//!
//! All bot state lives in a single JSON file: a top-level object of named collections, each
//! mapping an entity id (a Discord snowflake) to an arbitrary JSON document.  The whole file is
//! read once at startup and rewritten on every save.
//!
//! Callers follow a "mutate then save" convention: fetch a document with
//! [`DocumentStore::get_or_create`], change it in place, then call [`DocumentStore::save`].  The
//! store never watches for changes on its own.  [`DocumentStore::with_document`] bundles the
//! three steps for callers who would rather not remember the last one.

use crate::{log_error, log_internal};
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    ffi::OsString,
    io::ErrorKind,
    path::{Path, PathBuf},
};
use tokio::sync::Mutex;

/// A single entity's state.  The shape is owned by whichever feature reads it.
pub type Document = serde_json::Value;

/// Entity id to document.
pub type Collection = serde_json::Map<String, Document>;

/// Collections every freshly created store file starts with.
pub const BUILTIN_COLLECTIONS: [&str; 3] = ["users", "guilds", "reactionRoles"];

/// Everything the store holds: collection name to collection.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RootDocument(BTreeMap<String, Collection>);

impl RootDocument {
    /// The shape written when no store file exists yet.
    pub fn with_builtin_collections() -> Self {
        Self(
            BUILTIN_COLLECTIONS
                .iter()
                .map(|name| (name.to_string(), Collection::new()))
                .collect(),
        )
    }

    pub fn collection(&self, name: &str) -> Option<&Collection> {
        self.0.get(name)
    }

    pub fn collection_names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// True when there are no collections at all, not merely empty ones.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("`{}` does not contain a valid store: {source}", path.display())]
    LoadCorruption {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("could not read `{}`: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not write `{}`: {source}", path.display())]
    WriteFailure {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not serialize document: {0}")]
    Serialize(serde_json::Error),
    #[error("collection and id must both be non-empty (got `{collection}` / `{id}`)")]
    CallerMisuse { collection: String, id: String },
    #[error("document `{collection}/{id}` does not have the expected shape: {source}")]
    InvalidDocument {
        collection: String,
        id: String,
        source: serde_json::Error,
    },
}

/// In-memory document cache backed by one JSON file.
///
/// Construct exactly one per backing file and share it; two stores writing the same file will
/// overwrite each other.
pub struct DocumentStore {
    path: PathBuf,
    backups: usize,
    root: RootDocument,
    /// Held for the duration of a file write so saves never interleave.
    write_lock: Mutex<()>,
}

impl DocumentStore {
    /// Load the store at `path`, keeping up to `backups` previous versions of the file on every
    /// save.  Never fails; see [`load`] for how a missing or unreadable file is handled.
    pub async fn open(path: impl Into<PathBuf>, backups: usize) -> Self {
        let path = path.into();
        let root = load(&path).await;
        Self {
            path,
            backups,
            root,
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn root(&self) -> &RootDocument {
        &self.root
    }

    pub fn collection(&self, name: &str) -> Option<&Collection> {
        self.root.collection(name)
    }

    /// Read a document without creating it.
    pub fn get(&self, collection: &str, id: &str) -> Option<&Document> {
        self.root.0.get(collection)?.get(id)
    }

    /// Write the whole store to disk.  Returns `false` if the write failed, in which case the
    /// in-memory state is kept as is and the next successful save will persist it.
    pub async fn save(&self) -> bool {
        match self.try_save().await {
            Ok(()) => true,
            Err(err) => {
                log_error!("Could not save store: {}", err);
                false
            }
        }
    }

    pub async fn try_save(&self) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let contents = serde_json::to_vec_pretty(&self.root).map_err(StoreError::Serialize)?;
        write_atomic(&self.path, &contents, self.backups).await
    }

    /// Fetch the document for `(collection, id)`, inserting `defaults` and saving first if it
    /// does not exist yet.  Returns `None` if either key is empty.
    pub async fn get_or_create(
        &mut self,
        collection: &str,
        id: &str,
        defaults: Document,
    ) -> Option<&mut Document> {
        if let Err(err) = check_keys(collection, id) {
            log_error!("Ignoring document request: {}", err);
            return None;
        }

        use serde_json::map::Entry::*;
        let inserted = match self
            .root
            .0
            .entry(collection.to_owned())
            .or_default()
            .entry(id)
        {
            Vacant(vacant_entry) => {
                vacant_entry.insert(defaults);
                true
            }
            Occupied(_) => false,
        };

        if inserted {
            self.save().await;
        }

        self.root.0.get_mut(collection)?.get_mut(id)
    }

    /// Remove a document.  Returns whether anything was removed.  Does not save.
    pub fn delete(&mut self, collection: &str, id: &str) -> bool {
        if let Err(err) = check_keys(collection, id) {
            log_error!("Ignoring delete request: {}", err);
            return false;
        }

        self.root
            .0
            .get_mut(collection)
            .and_then(|documents| documents.remove(id))
            .is_some()
    }

    /// Fetch or create a document, hand it to `f`, then save.
    pub async fn with_document<F, R>(
        &mut self,
        collection: &str,
        id: &str,
        defaults: Document,
        f: F,
    ) -> Option<R>
    where
        F: FnOnce(&mut Document) -> R,
    {
        let document = self.get_or_create(collection, id, defaults).await?;
        let result = f(document);
        self.save().await;
        Some(result)
    }
}

fn check_keys(collection: &str, id: &str) -> Result<(), StoreError> {
    if collection.is_empty() || id.is_empty() {
        return Err(StoreError::CallerMisuse {
            collection: collection.to_owned(),
            id: id.to_owned(),
        });
    }
    Ok(())
}

/// Read the store file at `path`.
///
/// - Missing: the built-in empty shape is written to disk (creating parent directories) and
///   returned.
/// - Not valid JSON: the file is copied aside to `<path>.corrupt` and an empty store with no
///   collections is returned.  The next save overwrites the original.
/// - Unreadable for any other reason: an empty store is returned.
pub async fn load(path: &Path) -> RootDocument {
    match try_load(path).await {
        Ok(Some(root)) => {
            log_internal!(
                "Loaded {} collection(s) from `{}`",
                root.collection_names().count(),
                path.display(),
            );
            root
        }
        Ok(None) => {
            let root = RootDocument::with_builtin_collections();
            let created = match serde_json::to_vec_pretty(&root) {
                Ok(contents) => write_atomic(path, &contents, 0).await,
                Err(err) => Err(StoreError::Serialize(err)),
            };
            match created {
                Ok(()) => log_internal!("Created new store at `{}`", path.display()),
                Err(err) => log_error!("Could not create store: {}", err),
            }
            root
        }
        Err(err @ StoreError::LoadCorruption { .. }) => {
            log_error!("{}; starting with an empty store", err);
            quarantine(path).await;
            RootDocument::default()
        }
        Err(err) => {
            log_error!("{}; starting with an empty store", err);
            RootDocument::default()
        }
    }
}

/// `Ok(None)` if there is no file at `path`.
async fn try_load(path: &Path) -> Result<Option<RootDocument>, StoreError> {
    let contents = match tokio::fs::read(path).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(StoreError::Read {
                path: path.to_owned(),
                source,
            })
        }
    };

    serde_json::from_slice(&contents)
        .map(Some)
        .map_err(|source| StoreError::LoadCorruption {
            path: path.to_owned(),
            source,
        })
}

async fn quarantine(path: &Path) {
    let corrupt_path = sibling(path, ".corrupt");
    match tokio::fs::copy(path, &corrupt_path).await {
        Ok(_) => log_internal!("Kept unreadable store as `{}`", corrupt_path.display()),
        Err(err) => log_error!(
            "Could not copy unreadable store to `{}`: {}",
            corrupt_path.display(),
            err
        ),
    }
}

/// Write to a temporary sibling, rotate backups, then rename over `path`.
async fn write_atomic(path: &Path, contents: &[u8], backups: usize) -> Result<(), StoreError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(write_failure(parent))?;
    }

    let tmp_path = sibling(path, ".new");
    tokio::fs::write(&tmp_path, contents)
        .await
        .map_err(write_failure(&tmp_path))?;

    if backups > 0 {
        rotate_backups(path, backups).await;
    }

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(write_failure(path))
}

/// `<path>.1` is the newest backup, `<path>.{backups}` the oldest.  Failures here only cost a
/// backup, so they are logged rather than failing the save.
async fn rotate_backups(path: &Path, backups: usize) {
    for n in (1..backups).rev() {
        let from = sibling(path, &format!(".{}", n));
        let to = sibling(path, &format!(".{}", n + 1));
        match tokio::fs::rename(&from, &to).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => log_error!("Could not rotate backup `{}`: {}", from.display(), e),
        }
    }

    let newest = sibling(path, ".1");
    match tokio::fs::copy(path, &newest).await {
        Ok(_) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => log_error!("Could not back up `{}`: {}", path.display(), e),
    }
}

fn write_failure(path: &Path) -> impl FnOnce(std::io::Error) -> StoreError {
    let path = path.to_owned();
    move |source| StoreError::WriteFailure { path, source }
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;
    use tokio::sync::RwLock;

    fn store_path(dir: &tempfile::TempDir) -> PathBuf {
        dir.path().join("data").join("database.json")
    }

    fn read_json(path: &Path) -> serde_json::Value {
        let contents = std::fs::read(path).unwrap();
        serde_json::from_slice(&contents).unwrap()
    }

    #[tokio::test]
    async fn missing_file_is_created_with_builtin_collections() {
        let dir = tempfile::tempdir().unwrap();
        let path = store_path(&dir);

        let store = DocumentStore::open(&path, 0).await;

        assert_eq!(store.root(), &RootDocument::with_builtin_collections());
        assert_eq!(
            read_json(&path),
            json!({ "users": {}, "guilds": {}, "reactionRoles": {} })
        );
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = store_path(&dir);
        let mut store = DocumentStore::open(&path, 0).await;

        store
            .get_or_create("users", "1", json!({ "balance": 10, "tags": ["a", "b"] }))
            .await
            .unwrap();
        store
            .get_or_create("reactionRoles", "99", json!([{ "roleId": "5", "emoji": "👍" }]))
            .await
            .unwrap();
        store.get_or_create("custom", "x", json!(null)).await.unwrap();
        assert!(store.save().await);

        assert_eq!(&load(&path).await, store.root());
    }

    #[tokio::test]
    async fn defaults_only_apply_on_first_creation() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = DocumentStore::open(store_path(&dir), 0).await;

        let first = store
            .get_or_create("guilds", "7", json!({ "enabled": false }))
            .await
            .unwrap();
        assert_eq!(first, &json!({ "enabled": false }));

        let second = store
            .get_or_create("guilds", "7", json!({ "enabled": true }))
            .await
            .unwrap();
        assert_eq!(second, &json!({ "enabled": false }));
    }

    #[tokio::test]
    async fn mutations_are_visible_to_later_fetches() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = DocumentStore::open(store_path(&dir), 0).await;

        let doc = store
            .get_or_create("users", "1", json!({ "xp": 0 }))
            .await
            .unwrap();
        doc["xp"] = json!(30);

        let doc = store
            .get_or_create("users", "1", json!({ "xp": 0 }))
            .await
            .unwrap();
        assert_eq!(doc["xp"], 30);
    }

    #[tokio::test]
    async fn documents_are_isolated_by_id() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = DocumentStore::open(store_path(&dir), 0).await;

        store
            .get_or_create("users", "1", json!({ "balance": 0 }))
            .await
            .unwrap()["balance"] = json!(100);
        let other = store
            .get_or_create("users", "2", json!({ "balance": 0 }))
            .await
            .unwrap();

        assert_eq!(other, &json!({ "balance": 0 }));
        assert_eq!(store.get("users", "1"), Some(&json!({ "balance": 100 })));
    }

    #[tokio::test]
    async fn defaults_are_durable_without_explicit_save() {
        let dir = tempfile::tempdir().unwrap();
        let path = store_path(&dir);
        let mut store = DocumentStore::open(&path, 0).await;

        store
            .get_or_create("guilds", "3", json!({ "prefix": "!" }))
            .await
            .unwrap();

        assert_eq!(read_json(&path)["guilds"]["3"], json!({ "prefix": "!" }));
    }

    #[tokio::test]
    async fn mutations_survive_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = store_path(&dir);

        let mut store = DocumentStore::open(&path, 0).await;
        let doc = store
            .get_or_create("users", "42", json!({ "balance": 0 }))
            .await
            .unwrap();
        assert_eq!(doc, &json!({ "balance": 0 }));
        doc["balance"] = json!(500);
        assert!(store.save().await);
        drop(store);

        let mut store = DocumentStore::open(&path, 0).await;
        let doc = store
            .get_or_create("users", "42", json!({ "balance": 0 }))
            .await
            .unwrap();
        assert_eq!(doc, &json!({ "balance": 500 }));
    }

    #[tokio::test]
    async fn corrupt_file_yields_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = store_path(&dir);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{ invalid json").unwrap();

        let mut store = DocumentStore::open(&path, 0).await;
        assert!(store.root().is_empty());
        assert_eq!(
            std::fs::read_to_string(sibling(&path, ".corrupt")).unwrap(),
            "{ invalid json"
        );

        store
            .get_or_create("users", "1", json!({ "balance": 0 }))
            .await
            .unwrap();
        assert!(store.save().await);
        assert_eq!(read_json(&path), json!({ "users": { "1": { "balance": 0 } } }));
    }

    #[tokio::test]
    async fn wrong_top_level_shape_counts_as_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = store_path(&dir);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "[1, 2, 3]").unwrap();

        let store = DocumentStore::open(&path, 0).await;
        assert!(store.root().is_empty());
    }

    #[tokio::test]
    async fn delete_allows_fresh_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = store_path(&dir);
        let mut store = DocumentStore::open(&path, 0).await;

        store
            .get_or_create("users", "42", json!({ "balance": 0 }))
            .await
            .unwrap()["balance"] = json!(500);
        assert!(store.save().await);

        assert!(store.delete("users", "42"));
        assert!(!store.delete("users", "42"));
        assert!(store.get("users", "42").is_none());
        // Not persisted until the caller saves.
        assert_eq!(read_json(&path)["users"]["42"]["balance"], 500);

        let doc = store
            .get_or_create("users", "42", json!({ "balance": 0 }))
            .await
            .unwrap();
        assert_eq!(doc, &json!({ "balance": 0 }));
    }

    #[tokio::test]
    async fn empty_keys_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = DocumentStore::open(store_path(&dir), 0).await;

        assert!(store.get_or_create("users", "", json!({})).await.is_none());
        assert!(store.get_or_create("", "1", json!({})).await.is_none());
        assert!(!store.delete("", "1"));
        assert!(store.collection("users").unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_save_keeps_memory() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-directory");
        std::fs::write(&blocker, "").unwrap();
        let path = blocker.join("database.json");

        let mut store = DocumentStore::open(&path, 0).await;
        assert!(store.root().is_empty());

        let doc = store
            .get_or_create("users", "1", json!({ "balance": 0 }))
            .await
            .unwrap();
        doc["balance"] = json!(5);

        assert!(!store.save().await);
        assert!(matches!(
            store.try_save().await,
            Err(StoreError::WriteFailure { .. })
        ));
        assert_eq!(store.get("users", "1"), Some(&json!({ "balance": 5 })));
    }

    #[tokio::test]
    async fn with_document_saves_after_mutation() {
        let dir = tempfile::tempdir().unwrap();
        let path = store_path(&dir);
        let mut store = DocumentStore::open(&path, 0).await;

        let level = store
            .with_document("users", "1", json!({ "level": 1 }), |doc| {
                doc["level"] = json!(2);
                doc["level"].as_u64()
            })
            .await;

        assert_eq!(level, Some(Some(2)));
        assert_eq!(read_json(&path)["users"]["1"]["level"], 2);
        assert!(store
            .with_document("users", "", json!({}), |_| ())
            .await
            .is_none());
    }

    #[tokio::test]
    async fn backups_rotate_previous_versions() {
        let dir = tempfile::tempdir().unwrap();
        let path = store_path(&dir);
        let mut store = DocumentStore::open(&path, 2).await;

        for balance in 1..=3 {
            store
                .get_or_create("users", "1", json!({ "balance": 0 }))
                .await
                .unwrap()["balance"] = json!(balance);
            assert!(store.save().await);
        }

        assert_eq!(read_json(&path)["users"]["1"]["balance"], 3);
        assert_eq!(read_json(&sibling(&path, ".1"))["users"]["1"]["balance"], 2);
        assert_eq!(read_json(&sibling(&path, ".2"))["users"]["1"]["balance"], 1);
        assert!(!sibling(&path, ".3").exists());
        assert!(!sibling(&path, ".new").exists());
    }

    #[tokio::test]
    async fn concurrent_saves_never_interleave() {
        let dir = tempfile::tempdir().unwrap();
        let path = store_path(&dir);
        let store = Arc::new(RwLock::new(DocumentStore::open(&path, 0).await));

        let tasks: Vec<_> = (0..16)
            .map(|n| {
                let store = Arc::clone(&store);
                tokio::spawn(async move {
                    {
                        let mut store = store.write().await;
                        let id = n.to_string();
                        store
                            .get_or_create("users", &id, json!({ "padding": "x".repeat(4096) }))
                            .await
                            .unwrap()["n"] = json!(n);
                    }
                    let store = store.read().await;
                    let (a, b) = tokio::join!(store.save(), store.save());
                    a && b
                })
            })
            .collect();

        for task in tasks {
            assert!(task.await.unwrap());
        }

        let on_disk: RootDocument = serde_json::from_value(read_json(&path)).unwrap();
        assert_eq!(&on_disk, store.read().await.root());
        assert_eq!(on_disk.collection("users").unwrap().len(), 16);
    }
}

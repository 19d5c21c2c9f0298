//! Sharded YAML persistence for committed documents.
//!
//! Layout: `<root>/<collection>/<s1>/<s2>/<id>.yaml`, where `s1`/`s2` are the first two pairs of
//! hex characters of the document id. Each write goes to a sibling temp file that is then
//! renamed over the target.

use super::{Collection, Document};
use crate::constants::DOCUMENT_EXTENSION;
use crate::{LisError, LisResult};
use lis_uuid::EntityId;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub struct YamlPersistence {
    root: PathBuf,
}

impl YamlPersistence {
    /// Creates the data directory (and one directory per collection) if missing.
    ///
    /// # Errors
    ///
    /// Returns [`LisError::StorageDirCreation`] if a directory cannot be created.
    pub fn new(root: &Path) -> LisResult<Self> {
        for collection in Collection::ALL {
            fs::create_dir_all(root.join(collection.dir_name()))
                .map_err(LisError::StorageDirCreation)?;
        }
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn document_path(&self, collection: Collection, id: EntityId) -> PathBuf {
        id.sharded_path(&self.root.join(collection.dir_name()), DOCUMENT_EXTENSION)
    }

    /// Writes one document to its sharded path.
    ///
    /// # Errors
    ///
    /// Returns [`LisError::YamlSerialization`] if the document cannot be serialised, or a
    /// storage error if the shard directory or file cannot be written.
    pub fn write<T: Document>(&self, doc: &T) -> LisResult<()> {
        let path = self.document_path(T::COLLECTION, doc.id());
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(LisError::StorageDirCreation)?;
        }

        let yaml = serde_yaml::to_string(doc).map_err(LisError::YamlSerialization)?;
        let tmp = path.with_extension(format!("{DOCUMENT_EXTENSION}.tmp"));
        fs::write(&tmp, yaml).map_err(LisError::FileWrite)?;
        fs::rename(&tmp, &path).map_err(LisError::FileWrite)?;
        Ok(())
    }

    /// Removes a document file. A missing file is not an error.
    pub fn remove(&self, collection: Collection, id: EntityId) -> LisResult<()> {
        match fs::remove_file(self.document_path(collection, id)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(LisError::FileRemove(e)),
        }
    }

    /// Reads every document of one collection.
    ///
    /// Files that fail to parse are skipped with a warning naming the offending field.
    ///
    /// # Errors
    ///
    /// Returns [`LisError::FileRead`] if a shard directory cannot be listed.
    pub fn load_all<T: Document>(&self) -> LisResult<Vec<T>> {
        let base = self.root.join(T::COLLECTION.dir_name());
        let mut docs = Vec::new();

        for path in document_files(&base)? {
            match read_document::<T>(&path) {
                Ok(doc) => docs.push(doc),
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "skipping unreadable document"
                    );
                }
            }
        }

        Ok(docs)
    }
}

/// Lists `*.yaml` files two shard levels below `base`.
fn document_files(base: &Path) -> LisResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    if !base.exists() {
        return Ok(files);
    }

    for s1 in fs::read_dir(base).map_err(LisError::FileRead)? {
        let s1 = s1.map_err(LisError::FileRead)?.path();
        if !s1.is_dir() {
            continue;
        }
        for s2 in fs::read_dir(&s1).map_err(LisError::FileRead)? {
            let s2 = s2.map_err(LisError::FileRead)?.path();
            if !s2.is_dir() {
                continue;
            }
            for entry in fs::read_dir(&s2).map_err(LisError::FileRead)? {
                let path = entry.map_err(LisError::FileRead)?.path();
                if path.extension().and_then(|e| e.to_str()) == Some(DOCUMENT_EXTENSION) {
                    files.push(path);
                }
            }
        }
    }

    files.sort();
    Ok(files)
}

fn read_document<T: Document>(path: &Path) -> LisResult<T> {
    let contents = fs::read_to_string(path).map_err(LisError::FileRead)?;
    let deserializer = serde_yaml::Deserializer::from_str(&contents);
    serde_path_to_error::deserialize(deserializer).map_err(|e| LisError::Deserialization {
        path: path.to_path_buf(),
        field: e.path().to_string(),
        message: e.inner().to_string(),
    })
}

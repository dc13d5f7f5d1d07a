//! Content-hash-keyed document persistence.
//!
//! One JSON file per document, named by the content hash of its raw text.
//! The store is deliberately dumb: no locking, no versioning. Each
//! document's review state is mutated by one interactive session at a
//! time, and last-writer-wins is acceptable.

use std::fs;
use std::path::{Path, PathBuf};

use crate::document::{content_hash, Document};
use crate::Result;

/// Hash-keyed persistence for [`Document`] records.
pub trait DocumentStore {
    /// Load a document by content hash. `Ok(None)` when absent.
    fn load(&self, hash: &str) -> Result<Option<Document>>;

    /// Persist a document under its content hash.
    fn save(&self, document: &Document) -> Result<()>;
}

/// Directory of per-document JSON files.
#[derive(Debug, Clone)]
pub struct JsonStore {
    dir: PathBuf,
}

impl JsonStore {
    /// Create a store rooted at `dir`. The directory is created on first save.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path of the record for a given hash.
    #[must_use]
    pub fn path_for(&self, hash: &str) -> PathBuf {
        self.dir.join(format!("{hash}.json"))
    }

    /// Load an existing record for `text`, or create and persist a fresh
    /// untagged one. An existing record always wins so prior review work
    /// is never overwritten by re-submitting the same text.
    pub fn load_or_create(&self, text: &str, filename: &str) -> Result<Document> {
        let hash = content_hash(text);
        if let Some(existing) = self.load(&hash)? {
            log::debug!("loaded existing document {hash}");
            return Ok(existing);
        }
        let document = Document::new(text, filename);
        self.save(&document)?;
        log::info!("created new document {hash} for {filename}");
        Ok(document)
    }

    /// Content hashes of all stored documents.
    pub fn list(&self) -> Result<Vec<String>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let mut hashes = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().is_some_and(|e| e == "json") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    hashes.push(stem.to_string());
                }
            }
        }
        hashes.sort();
        Ok(hashes)
    }

    /// Load every stored document.
    pub fn load_all(&self) -> Result<Vec<Document>> {
        let mut documents = Vec::new();
        for hash in self.list()? {
            if let Some(doc) = self.load(&hash)? {
                documents.push(doc);
            }
        }
        Ok(documents)
    }
}

impl DocumentStore for JsonStore {
    fn load(&self, hash: &str) -> Result<Option<Document>> {
        let path = self.path_for(hash);
        if !path.exists() {
            return Ok(None);
        }
        let data = fs::read_to_string(&path)?;
        let document = serde_json::from_str(&data)?;
        Ok(Some(document))
    }

    fn save(&self, document: &Document) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(&document.hash());
        let json = serde_json::to_string_pretty(document)?;
        write_atomic(&path, &json)?;
        log::debug!("saved document {} ({} lines)", document.hash(), document.lines.len());
        Ok(())
    }
}

/// Write via a sibling temp file and rename, so a crash mid-write cannot
/// leave a truncated record behind.
fn write_atomic(path: &Path, contents: &str) -> std::io::Result<()> {
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, contents)?;
    fs::rename(&tmp, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::line::Line;

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path());

        let mut doc = Document::new("احمد نے کہا", "marsiya.txt");
        doc.lines.push(Line::new("احمد نے کہا", "<PERSON>احمد</PERSON> نے کہا", ""));
        doc.ensure_ledgers();
        store.save(&doc).unwrap();

        let loaded = store.load(&doc.hash()).unwrap().unwrap();
        assert_eq!(loaded, doc);
    }

    #[test]
    fn test_load_absent_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path());
        assert!(store.load("deadbeef").unwrap().is_none());
    }

    #[test]
    fn test_load_or_create_prefers_existing() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path());

        let mut doc = store.load_or_create("متن", "a.txt").unwrap();
        doc.lines.push(Line::new("متن", "متن", ""));
        store.save(&doc).unwrap();

        // Re-submitting the same text must return the tagged record, not a
        // fresh untagged one.
        let again = store.load_or_create("متن", "b.txt").unwrap();
        assert_eq!(again.lines.len(), 1);
        assert_eq!(again.filename, "a.txt");
    }

    #[test]
    fn test_list_and_load_all() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path());
        assert!(store.list().unwrap().is_empty());

        store.save(&Document::new("a", "a.txt")).unwrap();
        store.save(&Document::new("b", "b.txt")).unwrap();

        assert_eq!(store.list().unwrap().len(), 2);
        assert_eq!(store.load_all().unwrap().len(), 2);
    }
}

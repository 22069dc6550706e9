use chrono::{DateTime, Utc};
use dirs::home_dir;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::ops::Bound;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::document::Document;
use crate::error::{Error, Result};
use crate::{DocId, TermCount, TermPos};

/// Name of the index file inside a database directory.
pub const INDEX_FILE: &str = "index.json";

/// On-disk format version written by this crate.
pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct IndexFile {
    format_version: u32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    documents: Vec<Option<Document>>,
}

#[derive(Debug, Default, Clone)]
struct TermEntry {
    postings: BTreeMap<DocId, TermCount>,
    collection_freq: u64,
}

/// A read-only handle on a search index.
///
/// The index file stores documents only; postlists, document lengths and the
/// collection statistics are rebuilt in memory when the database is opened.
#[derive(Debug, Clone)]
pub struct Database {
    path: Option<PathBuf>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    documents: Vec<Option<Document>>,
    postlists: BTreeMap<String, TermEntry>,
    doc_lengths: Vec<u64>,
    total_length: u64,
    doc_count: u32,
}

pub fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Some(home) = home_dir() {
            return home.join(stripped);
        }
    }
    path.to_path_buf()
}

/// Resolve a user supplied database path to the index file it names.
///
/// Directories hold an `index.json`; a plain file is taken to be the index itself.
fn index_file_path(path: &Path) -> PathBuf {
    if path.is_file() {
        path.to_path_buf()
    } else {
        path.join(INDEX_FILE)
    }
}

impl Database {
    /// An empty database that lives only in memory.
    pub fn in_memory() -> Self {
        let now = Utc::now();
        Self {
            path: None,
            created_at: now,
            updated_at: now,
            documents: Vec::new(),
            postlists: BTreeMap::new(),
            doc_lengths: Vec::new(),
            total_length: 0,
            doc_count: 0,
        }
    }

    /// Open an existing database for searching.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = expand_tilde(path.as_ref());
        if !path.exists() {
            return Err(Error::opening(
                &path,
                format!("Couldn't detect type of database: {}", path.display()),
            ));
        }

        let index_path = index_file_path(&path);
        let file = File::open(&index_path).map_err(|e| {
            Error::opening(
                &path,
                format!("Couldn't open database {}: {e}", path.display()),
            )
        })?;

        let stored: IndexFile = serde_json::from_reader(BufReader::new(file)).map_err(|e| {
            Error::DatabaseCorrupt {
                message: format!("Failed to decode {}", index_path.display()),
                source: Some(e),
            }
        })?;

        if stored.format_version != FORMAT_VERSION {
            return Err(Error::DatabaseVersion {
                message: format!(
                    "{} has format version {}, only version {FORMAT_VERSION} is supported",
                    index_path.display(),
                    stored.format_version
                ),
            });
        }

        let mut db = Self {
            path: Some(path),
            created_at: stored.created_at,
            updated_at: stored.updated_at,
            documents: Vec::with_capacity(stored.documents.len()),
            postlists: BTreeMap::new(),
            doc_lengths: Vec::with_capacity(stored.documents.len()),
            total_length: 0,
            doc_count: 0,
        };
        for (idx, slot) in stored.documents.into_iter().enumerate() {
            let did = docid_for_index(idx)?;
            db.documents.push(None);
            db.doc_lengths.push(0);
            if let Some(doc) = slot {
                db.index_document(did, doc);
            }
        }

        debug!(
            path = %index_path.display(),
            doc_count = db.doc_count,
            terms = db.postlists.len(),
            "Opened database"
        );
        Ok(db)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Number of live documents.
    pub fn doc_count(&self) -> u32 {
        self.doc_count
    }

    /// Highest docid ever allocated (deleted documents included).
    pub fn last_docid(&self) -> DocId {
        self.documents.len() as DocId
    }

    pub fn total_length(&self) -> u64 {
        self.total_length
    }

    pub fn average_length(&self) -> f64 {
        if self.doc_count == 0 {
            0.0
        } else {
            self.total_length as f64 / f64::from(self.doc_count)
        }
    }

    pub fn doc_length(&self, did: DocId) -> Result<u64> {
        self.check_docid(did)?;
        Ok(self.doc_lengths[slot_index(did)])
    }

    /// Number of documents indexed by `term`.
    pub fn term_freq(&self, term: &str) -> u32 {
        self.postlists
            .get(term)
            .map(|entry| entry.postings.len() as u32)
            .unwrap_or(0)
    }

    /// Total number of occurrences of `term` across the collection.
    pub fn collection_freq(&self, term: &str) -> u64 {
        self.postlists
            .get(term)
            .map(|entry| entry.collection_freq)
            .unwrap_or(0)
    }

    pub fn term_exists(&self, term: &str) -> bool {
        !term.is_empty() && self.postlists.contains_key(term)
    }

    /// `(docid, wdf)` pairs for `term`, in ascending docid order.
    pub fn postlist<'a>(&'a self, term: &str) -> impl Iterator<Item = (DocId, TermCount)> + 'a {
        self.postlists
            .get(term)
            .into_iter()
            .flat_map(|entry| entry.postings.iter().map(|(did, wdf)| (*did, *wdf)))
    }

    /// Positions of `term` in document `did`, empty if it has none.
    pub fn positions(&self, did: DocId, term: &str) -> &[TermPos] {
        self.documents
            .get(slot_index(did))
            .and_then(Option::as_ref)
            .and_then(|doc| doc.term(term))
            .map(|t| t.positions())
            .unwrap_or(&[])
    }

    pub fn document(&self, did: DocId) -> Result<&Document> {
        self.check_docid(did)?;
        self.documents[slot_index(did)]
            .as_ref()
            .ok_or(Error::DocNotFound { docid: did })
    }

    /// All terms starting with `prefix`, in sorted order.
    pub fn all_terms<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.postlists
            .range::<str, _>((Bound::Included(prefix), Bound::Unbounded))
            .map(|(name, _)| name.as_str())
            .take_while(move |name| name.starts_with(prefix))
    }

    /// Docids of every live document.
    pub fn docids(&self) -> impl Iterator<Item = DocId> + '_ {
        self.documents
            .iter()
            .enumerate()
            .filter(|(_, doc)| doc.is_some())
            .map(|(idx, _)| idx as DocId + 1)
    }

    fn check_docid(&self, did: DocId) -> Result<()> {
        if did == 0 || did as usize > self.documents.len() {
            return Err(Error::DocNotFound { docid: did });
        }
        Ok(())
    }

    fn index_document(&mut self, did: DocId, doc: Document) {
        let idx = slot_index(did);
        while self.documents.len() <= idx {
            self.documents.push(None);
            self.doc_lengths.push(0);
        }

        let mut length = 0u64;
        for (name, term) in doc.terms() {
            let entry = self.postlists.entry(name.to_string()).or_default();
            entry.postings.insert(did, term.wdf);
            entry.collection_freq += u64::from(term.wdf);
            length += u64::from(term.wdf);
        }

        self.doc_lengths[idx] = length;
        self.total_length += length;
        self.documents[idx] = Some(doc);
        self.doc_count += 1;
    }

    fn unindex_document(&mut self, did: DocId) -> Result<Document> {
        self.check_docid(did)?;
        let idx = slot_index(did);
        let doc = self.documents[idx]
            .take()
            .ok_or(Error::DocNotFound { docid: did })?;

        for (name, term) in doc.terms() {
            let now_empty = match self.postlists.get_mut(name) {
                Some(entry) => {
                    entry.postings.remove(&did);
                    entry.collection_freq = entry.collection_freq.saturating_sub(u64::from(term.wdf));
                    entry.postings.is_empty()
                }
                None => false,
            };
            if now_empty {
                self.postlists.remove(name);
            }
        }

        self.total_length -= self.doc_lengths[idx];
        self.doc_lengths[idx] = 0;
        self.doc_count -= 1;
        Ok(doc)
    }
}

fn slot_index(did: DocId) -> usize {
    (did as usize).wrapping_sub(1)
}

fn docid_for_index(idx: usize) -> Result<DocId> {
    DocId::try_from(idx + 1).map_err(|_| Error::DatabaseCorrupt {
        message: "Too many documents for a 32-bit docid".to_string(),
        source: None,
    })
}

/// A database opened for updating.
///
/// Changes stay in memory until [`WritableDatabase::commit`] is called.
#[derive(Debug)]
pub struct WritableDatabase {
    db: Database,
    path: PathBuf,
    modified: bool,
}

impl WritableDatabase {
    /// Open the database at `path`, creating an empty one if none exists.
    pub fn create_or_open(path: impl AsRef<Path>) -> Result<Self> {
        let path = expand_tilde(path.as_ref());
        let index_path = index_file_path(&path);

        let db = if index_path.exists() {
            Database::open(&path)?
        } else {
            fs::create_dir_all(&path).map_err(|e| {
                Error::opening(
                    &path,
                    format!("Couldn't create directory {}: {e}", path.display()),
                )
            })?;
            info!(path = %path.display(), "Creating new database");
            Database {
                path: Some(path.clone()),
                ..Database::in_memory()
            }
        };

        Ok(Self {
            db,
            path,
            modified: false,
        })
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn doc_count(&self) -> u32 {
        self.db.doc_count()
    }

    pub fn add_document(&mut self, doc: Document) -> Result<DocId> {
        let did = docid_for_index(self.db.documents.len())?;
        self.db.index_document(did, doc);
        self.modified = true;
        Ok(did)
    }

    /// Replace document `did`, adding it if that docid is unused.
    pub fn replace_document(&mut self, did: DocId, doc: Document) -> Result<()> {
        if did == 0 {
            return Err(Error::InvalidArgument(
                "Document ID 0 is invalid".to_string(),
            ));
        }
        if self.db.document(did).is_ok() {
            self.db.unindex_document(did)?;
        }
        self.db.index_document(did, doc);
        self.modified = true;
        Ok(())
    }

    pub fn delete_document(&mut self, did: DocId) -> Result<()> {
        self.db.unindex_document(did)?;
        self.modified = true;
        Ok(())
    }

    /// Persist pending changes. The index file is replaced atomically.
    pub fn commit(&mut self) -> Result<()> {
        if !self.modified && index_file_path(&self.path).exists() {
            return Ok(());
        }

        self.db.updated_at = Utc::now();
        let index_path = index_file_path(&self.path);
        let tmp_path = index_path.with_extension("json.tmp");

        let stored = IndexFile {
            format_version: FORMAT_VERSION,
            created_at: self.db.created_at,
            updated_at: self.db.updated_at,
            documents: self.db.documents.clone(),
        };

        let file = File::create(&tmp_path)
            .map_err(|e| Error::io(format!("Couldn't create {}", tmp_path.display()), e))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, &stored).map_err(|e| {
            Error::io(
                format!("Couldn't write {}", tmp_path.display()),
                std::io::Error::other(e),
            )
        })?;
        writer
            .flush()
            .map_err(|e| Error::io(format!("Couldn't flush {}", tmp_path.display()), e))?;
        drop(writer);

        fs::rename(&tmp_path, &index_path)
            .map_err(|e| Error::io(format!("Couldn't replace {}", index_path.display()), e))?;

        debug!(
            path = %index_path.display(),
            doc_count = self.db.doc_count,
            "Committed database"
        );
        self.modified = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use tempfile::tempdir;

    fn doc(data: &str, terms: &[&str]) -> Document {
        let mut doc = Document::with_data(data);
        for (pos, term) in terms.iter().enumerate() {
            doc.add_posting(term, pos as TermPos + 1, 1)
                .expect("non-empty term");
        }
        doc
    }

    #[test]
    fn test_open_missing_database() {
        let err = Database::open("/definitely/not/a/database").unwrap_err();
        assert_eq!(err.kind(), "DatabaseOpeningError");
    }

    #[test]
    fn test_open_directory_without_index() -> Result<()> {
        let dir = tempdir()?;
        let err = Database::open(dir.path()).unwrap_err();
        assert_eq!(err.kind(), "DatabaseOpeningError");
        Ok(())
    }

    #[test]
    fn test_corrupt_database() -> Result<()> {
        let dir = tempdir()?;
        fs::write(dir.path().join(INDEX_FILE), b"{not json")?;
        let err = Database::open(dir.path()).unwrap_err();
        assert_eq!(err.kind(), "DatabaseCorruptError");
        Ok(())
    }

    #[test]
    fn test_unsupported_version() -> Result<()> {
        let dir = tempdir()?;
        fs::write(
            dir.path().join(INDEX_FILE),
            br#"{"format_version":99,"created_at":"2024-01-01T00:00:00Z","updated_at":"2024-01-01T00:00:00Z","documents":[]}"#,
        )?;
        let err = Database::open(dir.path()).unwrap_err();
        assert_eq!(err.kind(), "DatabaseVersionError");
        Ok(())
    }

    #[test]
    fn test_commit_and_reopen() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("db");

        let mut wdb = WritableDatabase::create_or_open(&path)?;
        wdb.add_document(doc("first", &["apple", "banana"]))?;
        wdb.add_document(doc("second", &["banana", "banana", "cherry"]))?;
        wdb.commit()?;

        let db = Database::open(&path)?;
        assert_eq!(db.doc_count(), 2);
        assert_eq!(db.term_freq("banana"), 2);
        assert_eq!(db.collection_freq("banana"), 3);
        assert_eq!(db.doc_length(2)?, 3);
        assert_eq!(db.total_length(), 5);
        assert!((db.average_length() - 2.5).abs() < f64::EPSILON);
        assert_eq!(db.document(1)?.data(), "first");
        assert_eq!(db.positions(2, "banana"), &[1, 2]);
        Ok(())
    }

    #[test]
    fn test_open_index_file_directly() -> Result<()> {
        let dir = tempdir()?;
        let mut wdb = WritableDatabase::create_or_open(dir.path())?;
        wdb.add_document(doc("only", &["one"]))?;
        wdb.commit()?;

        let db = Database::open(dir.path().join(INDEX_FILE))?;
        assert_eq!(db.doc_count(), 1);
        Ok(())
    }

    #[test]
    fn test_delete_and_replace() -> Result<()> {
        let dir = tempdir()?;
        let mut wdb = WritableDatabase::create_or_open(dir.path())?;
        wdb.add_document(doc("a", &["x", "y"]))?;
        wdb.add_document(doc("b", &["y"]))?;

        wdb.delete_document(1)?;
        assert_eq!(wdb.doc_count(), 1);
        assert!(!wdb.database().term_exists("x"));
        assert_eq!(wdb.database().term_freq("y"), 1);
        assert!(matches!(
            wdb.delete_document(1),
            Err(Error::DocNotFound { docid: 1 })
        ));

        wdb.replace_document(2, doc("b2", &["z"]))?;
        assert_eq!(wdb.database().document(2)?.data(), "b2");
        assert!(!wdb.database().term_exists("y"));

        wdb.replace_document(5, doc("e", &["z"]))?;
        assert_eq!(wdb.database().last_docid(), 5);
        assert_eq!(wdb.database().term_freq("z"), 2);
        assert!(wdb.database().document(4).is_err());

        wdb.commit()?;
        let db = Database::open(dir.path())?;
        assert_eq!(db.docids().collect::<Vec<_>>(), vec![2, 5]);
        Ok(())
    }

    #[test]
    fn test_document_lookup_errors() {
        let db = Database::in_memory();
        assert!(matches!(db.document(0), Err(Error::DocNotFound { docid: 0 })));
        assert!(matches!(db.document(3), Err(Error::DocNotFound { docid: 3 })));
    }

    #[test]
    fn test_all_terms_with_prefix() -> Result<()> {
        let dir = tempdir()?;
        let mut wdb = WritableDatabase::create_or_open(dir.path())?;
        wdb.add_document(doc("", &["walk", "walked", "water", "wall"]))?;
        let terms: Vec<_> = wdb.database().all_terms("wal").collect();
        assert_eq!(terms, vec!["walk", "walked", "wall"]);
        Ok(())
    }

    #[test]
    fn test_expand_tilde() {
        let home = home_dir().unwrap();
        assert_eq!(expand_tilde(Path::new("~/db")), home.join("db"));
        assert_eq!(
            expand_tilde(Path::new("/absolute/db")),
            PathBuf::from("/absolute/db")
        );
    }
}

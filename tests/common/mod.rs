#![allow(dead_code)]

use simplesearch::{Document, Stem, TermGenerator, WritableDatabase};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Documents in the sample database, with the value stored in slot 0.
pub const SAMPLE_DOCUMENTS: &[(&str, &str)] = &[
    ("The quick brown fox jumps over the lazy dog", "animal"),
    ("A lazy afternoon in the sun", "weather"),
    ("Foxes are quick and clever animals", "animal"),
    ("Dogs and cats living together", "animal"),
];

/// A database in a temporary directory.
pub struct TestDatabase {
    pub dir: TempDir,
}

impl TestDatabase {
    /// An empty directory; the database itself is created on first write.
    pub fn new() -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        Self { dir }
    }

    /// Path of the database directory inside the temp dir.
    pub fn path(&self) -> PathBuf {
        self.dir.path().join("db")
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Index `(text, value)` pairs with English stemming and commit.
    pub fn with_documents(documents: &[(&str, &str)]) -> Self {
        let db = Self::new();
        let mut wdb = WritableDatabase::create_or_open(db.path()).expect("failed to create db");
        let mut indexer = TermGenerator::new();
        indexer.set_stemmer(Stem::new("english").expect("english stemmer"));
        for (text, value) in documents {
            let mut doc = Document::with_data(*text);
            indexer.set_termpos(0);
            indexer
                .index_text(&mut doc, text, 1, "")
                .expect("failed to index text");
            doc.add_value(0, *value);
            wdb.add_document(doc).expect("failed to add document");
        }
        wdb.commit().expect("failed to commit");
        db
    }

    pub fn search_bin() -> PathBuf {
        PathBuf::from(env!("CARGO_BIN_EXE_simplesearch"))
    }

    pub fn index_bin() -> PathBuf {
        PathBuf::from(env!("CARGO_BIN_EXE_simpleindex"))
    }
}

pub fn sample_database() -> TestDatabase {
    TestDatabase::with_documents(SAMPLE_DOCUMENTS)
}

/// Lines of text output which describe a single match.
pub fn match_lines(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .filter(|line| line.contains("% docid="))
        .map(str::to_string)
        .collect()
}

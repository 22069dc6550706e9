pub mod config;
pub mod database;
pub mod document;
pub mod enquire;
pub mod error;
pub mod logging;
pub mod matchspy;
pub mod output;
pub mod query;
pub mod stem;
pub mod termgen;
pub mod weight;

/// Document identifier. Docids start at 1.
pub type DocId = u32;
/// Position of a word within a document, starting at 1.
pub type TermPos = u32;
/// Within-document (or within-query) frequency of a term.
pub type TermCount = u32;
/// Number identifying a value slot.
pub type ValueSlot = u32;
pub type DocCount = u32;

pub use config::SearchOptions;
pub use database::{Database, WritableDatabase, expand_tilde};
pub use document::Document;
pub use enquire::{DocidOrder, Enquire, MSet, MSetItem};
pub use error::{Error, Result};
pub use matchspy::{ItemFrequency, MatchSpy, TermCountMatchSpy, ValueCountMatchSpy};
pub use output::OutputFormat;
pub use query::{DefaultOp, ParseFlags, Query, QueryParser, StemStrategy};
pub use stem::Stem;
pub use termgen::TermGenerator;
pub use weight::{Bm25Weight, BoolWeight, TfIdfWeight, Weight};

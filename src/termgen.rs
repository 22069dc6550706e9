use regex::Regex;
use std::sync::OnceLock;

use crate::document::Document;
use crate::error::Result;
use crate::stem::Stem;
use crate::TermPos;

/// Words longer than this (in bytes) are not indexed.
pub const MAX_WORD_LENGTH: usize = 64;

/// Prefix marking stemmed terms.
pub const STEM_PREFIX: &str = "Z";

static WORD_RE: OnceLock<Regex> = OnceLock::new();

fn word_regex() -> &'static Regex {
    WORD_RE.get_or_init(|| {
        Regex::new(r"[\p{L}\p{N}]+(?:['\u{2019}][\p{L}\p{N}]+)*")
            .expect("word pattern is a valid regex")
    })
}

/// Lowercase a raw word and drop embedded apostrophes.
pub fn normalize_word(word: &str) -> String {
    word.chars()
        .filter(|c| *c != '\'' && *c != '\u{2019}')
        .flat_map(char::to_lowercase)
        .collect()
}

/// Split `text` into raw (unnormalized) words.
pub fn raw_words(text: &str) -> impl Iterator<Item = &str> {
    word_regex().find_iter(text).map(|m| m.as_str())
}

/// Whether a word should get a stemmed form at index time.
pub(crate) fn should_stem(word: &str) -> bool {
    word.chars().next().is_some_and(|c| !c.is_numeric())
}

/// Turns free text into the terms of a document.
#[derive(Debug, Clone, Default)]
pub struct TermGenerator {
    stemmer: Stem,
    termpos: TermPos,
}

impl TermGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_stemmer(&mut self, stemmer: Stem) {
        self.stemmer = stemmer;
    }

    pub fn termpos(&self) -> TermPos {
        self.termpos
    }

    pub fn set_termpos(&mut self, pos: TermPos) {
        self.termpos = pos;
    }

    /// Leave a gap in positions so phrases don't match across sections.
    pub fn increase_termpos(&mut self, delta: TermPos) {
        self.termpos += delta;
    }

    /// Index `text` into `doc`.
    ///
    /// Each word adds a positional posting for the unstemmed term. With a
    /// stemmer set, words also add a stemmed `Z` term without positions.
    pub fn index_text(
        &mut self,
        doc: &mut Document,
        text: &str,
        wdf_inc: u32,
        prefix: &str,
    ) -> Result<()> {
        for raw in raw_words(text) {
            let word = normalize_word(raw);
            if word.is_empty() || word.len() > MAX_WORD_LENGTH {
                continue;
            }

            self.termpos += 1;
            doc.add_posting(&format!("{prefix}{word}"), self.termpos, wdf_inc)?;

            if !self.stemmer.is_none() && should_stem(&word) {
                let stemmed = self.stemmer.stem(&word);
                doc.add_term(&format!("{STEM_PREFIX}{prefix}{stemmed}"), wdf_inc)?;
            }
        }
        Ok(())
    }

    /// Index `text` without positional information.
    pub fn index_text_without_positions(
        &mut self,
        doc: &mut Document,
        text: &str,
        wdf_inc: u32,
        prefix: &str,
    ) -> Result<()> {
        for raw in raw_words(text) {
            let word = normalize_word(raw);
            if word.is_empty() || word.len() > MAX_WORD_LENGTH {
                continue;
            }
            doc.add_term(&format!("{prefix}{word}"), wdf_inc)?;
            if !self.stemmer.is_none() && should_stem(&word) {
                let stemmed = self.stemmer.stem(&word);
                doc.add_term(&format!("{STEM_PREFIX}{prefix}{stemmed}"), wdf_inc)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_words() {
        let words: Vec<_> = raw_words("Hello, world! It's 2024-ish.").collect();
        assert_eq!(words, vec!["Hello", "world", "It's", "2024", "ish"]);
    }

    #[test]
    fn test_normalize_word() {
        assert_eq!(normalize_word("It's"), "its");
        assert_eq!(normalize_word("ÉCOLE"), "école");
    }

    #[test]
    fn test_index_text_with_stemmer() -> Result<()> {
        let mut tg = TermGenerator::new();
        tg.set_stemmer(Stem::new("english")?);
        let mut doc = Document::new();
        tg.index_text(&mut doc, "Running dogs run", 1, "")?;

        assert_eq!(doc.term("running").unwrap().positions(), &[1]);
        assert_eq!(doc.term("dogs").unwrap().positions(), &[2]);
        assert_eq!(doc.term("run").unwrap().positions(), &[3]);
        let zrun = doc.term("Zrun").unwrap();
        assert_eq!(zrun.wdf, 2);
        assert!(zrun.positions().is_empty());
        assert!(doc.term("Zdog").is_some());
        assert_eq!(tg.termpos(), 3);
        Ok(())
    }

    #[test]
    fn test_numbers_are_not_stemmed() -> Result<()> {
        let mut tg = TermGenerator::new();
        tg.set_stemmer(Stem::new("english")?);
        let mut doc = Document::new();
        tg.index_text(&mut doc, "1990s", 1, "")?;
        assert!(doc.term("1990s").is_some());
        assert_eq!(doc.term_count(), 1);
        Ok(())
    }

    #[test]
    fn test_prefix_and_positions_continue() -> Result<()> {
        let mut tg = TermGenerator::new();
        let mut doc = Document::new();
        tg.index_text(&mut doc, "title words", 1, "S")?;
        tg.increase_termpos(100);
        tg.index_text(&mut doc, "body", 1, "")?;

        assert_eq!(doc.term("Stitle").unwrap().positions(), &[1]);
        assert_eq!(doc.term("body").unwrap().positions(), &[103]);
        Ok(())
    }

    #[test]
    fn test_overlong_words_skipped() -> Result<()> {
        let mut tg = TermGenerator::new();
        let mut doc = Document::new();
        let long = "a".repeat(MAX_WORD_LENGTH + 1);
        tg.index_text(&mut doc, &format!("short {long}"), 1, "")?;
        assert_eq!(doc.term_count(), 1);
        Ok(())
    }

    #[test]
    fn test_without_positions() -> Result<()> {
        let mut tg = TermGenerator::new();
        let mut doc = Document::new();
        tg.index_text_without_positions(&mut doc, "cat cat", 1, "")?;
        let cat = doc.term("cat").unwrap();
        assert_eq!(cat.wdf, 2);
        assert!(cat.positions().is_empty());
        Ok(())
    }
}

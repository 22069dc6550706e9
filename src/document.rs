use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::{TermCount, TermPos, ValueSlot};

/// Positional and frequency information for one term in one document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentTerm {
    pub wdf: TermCount,
    #[serde(default, skip_serializing_if = "SmallVec::is_empty")]
    positions: SmallVec<[TermPos; 4]>,
}

impl DocumentTerm {
    pub fn positions(&self) -> &[TermPos] {
        &self.positions
    }

    /// Insert keeping positions sorted and unique.
    fn add_position(&mut self, pos: TermPos) {
        if let Err(idx) = self.positions.binary_search(&pos) {
            self.positions.insert(idx, pos);
        }
    }

    fn remove_position(&mut self, pos: TermPos) -> bool {
        match self.positions.binary_search(&pos) {
            Ok(idx) => {
                self.positions.remove(idx);
                true
            }
            Err(_) => false,
        }
    }
}

/// A document: an opaque data payload, a set of terms and numbered value slots.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    #[serde(default)]
    data: String,
    #[serde(default)]
    terms: BTreeMap<String, DocumentTerm>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    values: BTreeMap<ValueSlot, String>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_data(data: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            ..Self::default()
        }
    }

    pub fn data(&self) -> &str {
        &self.data
    }

    pub fn set_data(&mut self, data: impl Into<String>) {
        self.data = data.into();
    }

    /// Add an occurrence of `term` at `pos`, increasing its wdf by `wdf_inc`.
    pub fn add_posting(&mut self, term: &str, pos: TermPos, wdf_inc: TermCount) -> Result<()> {
        check_term_name(term)?;
        let entry = self.terms.entry(term.to_string()).or_default();
        entry.add_position(pos);
        entry.wdf += wdf_inc;
        Ok(())
    }

    /// Add `term` without positional information.
    pub fn add_term(&mut self, term: &str, wdf_inc: TermCount) -> Result<()> {
        check_term_name(term)?;
        self.terms.entry(term.to_string()).or_default().wdf += wdf_inc;
        Ok(())
    }

    /// Add a filtering term which doesn't contribute to document length.
    pub fn add_boolean_term(&mut self, term: &str) -> Result<()> {
        self.add_term(term, 0)
    }

    pub fn remove_posting(&mut self, term: &str, pos: TermPos, wdf_dec: TermCount) -> Result<()> {
        check_term_name(term)?;
        let entry = self.terms.get_mut(term).ok_or_else(|| {
            Error::InvalidArgument(format!(
                "Term '{term}' is not present in document, in Document::remove_posting()"
            ))
        })?;
        if !entry.remove_position(pos) {
            return Err(Error::Range(format!(
                "Position {pos} not in list for term '{term}'"
            )));
        }
        entry.wdf = entry.wdf.saturating_sub(wdf_dec);
        Ok(())
    }

    pub fn remove_term(&mut self, term: &str) -> Result<()> {
        self.terms.remove(term).map(|_| ()).ok_or_else(|| {
            Error::InvalidArgument(format!(
                "Term '{term}' is not present in document, in Document::remove_term()"
            ))
        })
    }

    pub fn clear_terms(&mut self) {
        self.terms.clear();
    }

    pub fn terms(&self) -> impl Iterator<Item = (&str, &DocumentTerm)> {
        self.terms.iter().map(|(name, term)| (name.as_str(), term))
    }

    pub fn term(&self, name: &str) -> Option<&DocumentTerm> {
        self.terms.get(name)
    }

    pub fn term_count(&self) -> usize {
        self.terms.len()
    }

    /// Sum of wdf over all terms.
    pub fn length(&self) -> u64 {
        self.terms.values().map(|t| u64::from(t.wdf)).sum()
    }

    /// Value in `slot`, or the empty string if unset.
    pub fn value(&self, slot: ValueSlot) -> &str {
        self.values.get(&slot).map(String::as_str).unwrap_or("")
    }

    /// Set the value in `slot`. Setting an empty value clears the slot.
    pub fn add_value(&mut self, slot: ValueSlot, value: impl Into<String>) {
        let value = value.into();
        if value.is_empty() {
            self.values.remove(&slot);
        } else {
            self.values.insert(slot, value);
        }
    }

    pub fn remove_value(&mut self, slot: ValueSlot) {
        self.values.remove(&slot);
    }

    pub fn clear_values(&mut self) {
        self.values.clear();
    }

    pub fn values(&self) -> impl Iterator<Item = (ValueSlot, &str)> {
        self.values.iter().map(|(slot, v)| (*slot, v.as_str()))
    }

    pub fn description(&self) -> String {
        format!(
            "Document(data='{}' values={} terms={})",
            self.data,
            self.values.len(),
            self.terms.len()
        )
    }
}

fn check_term_name(term: &str) -> Result<()> {
    if term.is_empty() {
        return Err(Error::InvalidArgument(
            "Empty termnames aren't allowed.".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_posting_accumulates_wdf_and_positions() -> Result<()> {
        let mut doc = Document::new();
        doc.add_posting("cat", 3, 1)?;
        doc.add_posting("cat", 1, 1)?;
        doc.add_posting("cat", 3, 1)?;

        let term = doc.term("cat").expect("term present");
        assert_eq!(term.wdf, 3);
        assert_eq!(term.positions(), &[1, 3]);
        assert_eq!(doc.length(), 3);
        Ok(())
    }

    #[test]
    fn test_empty_term_rejected() {
        let mut doc = Document::new();
        assert!(matches!(
            doc.add_posting("", 1, 1),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(doc.add_term("", 1), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_remove_posting() -> Result<()> {
        let mut doc = Document::new();
        doc.add_posting("dog", 1, 2)?;
        doc.add_posting("dog", 2, 1)?;

        doc.remove_posting("dog", 1, 5)?;
        let term = doc.term("dog").expect("term present");
        assert_eq!(term.wdf, 0);
        assert_eq!(term.positions(), &[2]);

        assert!(matches!(
            doc.remove_posting("dog", 9, 1),
            Err(Error::Range(_))
        ));
        assert!(matches!(
            doc.remove_posting("cat", 1, 1),
            Err(Error::InvalidArgument(_))
        ));
        Ok(())
    }

    #[test]
    fn test_remove_term() -> Result<()> {
        let mut doc = Document::new();
        doc.add_term("a", 1)?;
        doc.remove_term("a")?;
        assert_eq!(doc.term_count(), 0);
        assert!(doc.remove_term("a").is_err());
        Ok(())
    }

    #[test]
    fn test_boolean_term_has_no_length() -> Result<()> {
        let mut doc = Document::new();
        doc.add_boolean_term("XTYPEpdf")?;
        doc.add_term("report", 2)?;
        assert_eq!(doc.term_count(), 2);
        assert_eq!(doc.length(), 2);
        Ok(())
    }

    #[test]
    fn test_values() {
        let mut doc = Document::new();
        doc.add_value(0, "red");
        doc.add_value(3, "large");
        assert_eq!(doc.value(0), "red");
        assert_eq!(doc.value(1), "");

        doc.add_value(0, "");
        assert_eq!(doc.value(0), "");
        assert_eq!(doc.values().count(), 1);

        doc.clear_values();
        assert_eq!(doc.values().count(), 0);
    }

    #[test]
    fn test_description() -> Result<()> {
        let mut doc = Document::with_data("hello");
        doc.add_term("hello", 1)?;
        doc.add_value(1, "x");
        assert_eq!(doc.description(), "Document(data='hello' values=1 terms=1)");
        Ok(())
    }
}

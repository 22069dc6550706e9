use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Debug;

use crate::document::Document;
use crate::{DocCount, ValueSlot};

/// An item and the number of matching documents it occurred in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemFrequency {
    pub item: String,
    pub frequency: DocCount,
}

/// Observes every document matched by a query, along with its weight.
pub trait MatchSpy: Debug {
    fn observe(&mut self, doc: &Document, weight: f64);

    fn name(&self) -> &'static str;

    fn description(&self) -> String;

    /// Number of documents observed.
    fn total(&self) -> DocCount;

    /// The `max_items` most frequent items, most frequent first.
    fn top_values(&self, max_items: usize) -> Vec<ItemFrequency>;
}

fn most_frequent(counts: &BTreeMap<String, DocCount>, max_items: usize) -> Vec<ItemFrequency> {
    let mut items: Vec<ItemFrequency> = counts
        .iter()
        .map(|(item, frequency)| ItemFrequency {
            item: item.clone(),
            frequency: *frequency,
        })
        .collect();
    // Ties go to the lexicographically smaller item.
    items.sort_by(|a, b| b.frequency.cmp(&a.frequency).then_with(|| a.item.cmp(&b.item)));
    items.truncate(max_items);
    items
}

/// Counts the values stored in one value slot across the matches.
#[derive(Debug, Clone, Default)]
pub struct ValueCountMatchSpy {
    slot: ValueSlot,
    total: DocCount,
    counts: BTreeMap<String, DocCount>,
}

impl ValueCountMatchSpy {
    pub fn new(slot: ValueSlot) -> Self {
        Self {
            slot,
            ..Self::default()
        }
    }

    pub fn slot(&self) -> ValueSlot {
        self.slot
    }

    pub fn counts(&self) -> &BTreeMap<String, DocCount> {
        &self.counts
    }
}

impl MatchSpy for ValueCountMatchSpy {
    fn observe(&mut self, doc: &Document, _weight: f64) {
        self.total += 1;
        let value = doc.value(self.slot);
        if !value.is_empty() {
            *self.counts.entry(value.to_string()).or_insert(0) += 1;
        }
    }

    fn name(&self) -> &'static str {
        "ValueCountMatchSpy"
    }

    fn description(&self) -> String {
        format!(
            "ValueCountMatchSpy({} docs seen, looking in slot {})",
            self.total, self.slot
        )
    }

    fn total(&self) -> DocCount {
        self.total
    }

    fn top_values(&self, max_items: usize) -> Vec<ItemFrequency> {
        most_frequent(&self.counts, max_items)
    }
}

/// Counts terms with a given prefix across the matches.
#[derive(Debug, Clone, Default)]
pub struct TermCountMatchSpy {
    prefix: String,
    total: DocCount,
    counts: BTreeMap<String, DocCount>,
}

impl TermCountMatchSpy {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            ..Self::default()
        }
    }
}

impl MatchSpy for TermCountMatchSpy {
    fn observe(&mut self, doc: &Document, _weight: f64) {
        self.total += 1;
        for (name, _) in doc.terms() {
            if let Some(rest) = name.strip_prefix(self.prefix.as_str()) {
                if !rest.is_empty() {
                    *self.counts.entry(rest.to_string()).or_insert(0) += 1;
                }
            }
        }
    }

    fn name(&self) -> &'static str {
        "TermCountMatchSpy"
    }

    fn description(&self) -> String {
        format!(
            "TermCountMatchSpy({} docs seen, looking for prefix '{}')",
            self.total, self.prefix
        )
    }

    fn total(&self) -> DocCount {
        self.total
    }

    fn top_values(&self, max_items: usize) -> Vec<ItemFrequency> {
        most_frequent(&self.counts, max_items)
    }
}

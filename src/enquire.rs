use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::database::Database;
use crate::document::Document;
use crate::error::{Error, Result};
use crate::matchspy::MatchSpy;
use crate::query::Query;
use crate::weight::{Bm25Weight, TermStats, Weight};
use crate::{DocCount, DocId, TermCount, TermPos};

/// Order of documents which have equal weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DocidOrder {
    #[default]
    Ascending,
    Descending,
}

/// One entry in a match set.
#[derive(Debug, Clone)]
pub struct MSetItem<'db> {
    /// Zero-based rank in the full result list.
    pub rank: DocCount,
    pub weight: f64,
    pub percent: u8,
    pub docid: DocId,
    pub document: &'db Document,
}

/// A ranked page of results.
#[derive(Debug, Clone, Default)]
pub struct MSet<'db> {
    items: Vec<MSetItem<'db>>,
    first: DocCount,
    matches_estimated: DocCount,
    max_attained: f64,
    max_possible: f64,
    elapsed: Duration,
}

impl<'db> MSet<'db> {
    pub fn size(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Rank of the first item in this page.
    pub fn first(&self) -> DocCount {
        self.first
    }

    pub fn matches_estimated(&self) -> DocCount {
        self.matches_estimated
    }

    /// Matching is exhaustive, so both bounds equal the estimate.
    pub fn matches_lower_bound(&self) -> DocCount {
        self.matches_estimated
    }

    pub fn matches_upper_bound(&self) -> DocCount {
        self.matches_estimated
    }

    /// Highest weight of any match, whether or not it's in this page.
    pub fn max_attained(&self) -> f64 {
        self.max_attained
    }

    pub fn max_possible(&self) -> f64 {
        self.max_possible
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MSetItem<'db>> {
        self.items.iter()
    }

    pub fn get(&self, index: usize) -> Option<&MSetItem<'db>> {
        self.items.get(index)
    }
}

impl<'a, 'db> IntoIterator for &'a MSet<'db> {
    type Item = &'a MSetItem<'db>;
    type IntoIter = std::slice::Iter<'a, MSetItem<'db>>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

type Matches = BTreeMap<DocId, f64>;

/// Per-query statistics shared by every leaf.
struct MatchContext {
    collection_size: DocCount,
    average_length: f64,
    query_length: TermCount,
}

/// Runs queries against a database.
#[derive(Debug)]
pub struct Enquire<'db> {
    db: &'db Database,
    query: Option<Query>,
    weight: Box<dyn Weight>,
    docid_order: DocidOrder,
    spies: Vec<Box<dyn MatchSpy>>,
}

impl<'db> Enquire<'db> {
    pub fn new(db: &'db Database) -> Self {
        Self {
            db,
            query: None,
            weight: Box::new(Bm25Weight::default()),
            docid_order: DocidOrder::default(),
            spies: Vec::new(),
        }
    }

    pub fn set_query(&mut self, query: Query) {
        self.query = Some(query);
    }

    pub fn query(&self) -> Option<&Query> {
        self.query.as_ref()
    }

    pub fn set_weighting_scheme(&mut self, weight: Box<dyn Weight>) {
        self.weight = weight;
    }

    pub fn set_docid_order(&mut self, order: DocidOrder) {
        self.docid_order = order;
    }

    /// Register a spy to see every matching document on the next `get_mset`.
    pub fn add_matchspy(&mut self, spy: Box<dyn MatchSpy>) {
        self.spies.push(spy);
    }

    pub fn matchspies(&self) -> &[Box<dyn MatchSpy>] {
        &self.spies
    }

    pub fn clear_matchspies(&mut self) {
        self.spies.clear();
    }

    /// Run the query and return up to `max_items` results starting at rank `first`.
    pub fn get_mset(&mut self, first: DocCount, max_items: DocCount) -> Result<MSet<'db>> {
        let started = Instant::now();
        let query = self.query.as_ref().ok_or_else(|| {
            Error::InvalidOperation("You must set a query before calling get_mset()".to_string())
        })?;

        let leaves = query.weighted_leaves();
        let ctx = MatchContext {
            collection_size: self.db.doc_count(),
            average_length: self.db.average_length(),
            query_length: leaves.iter().map(|leaf| leaf_wqf(leaf)).sum(),
        };

        let matches = self.evaluate(query, &ctx)?;
        let mut ranked: Vec<(DocId, f64)> = matches.into_iter().collect();
        let order = self.docid_order;
        ranked.sort_by(|a, b| {
            b.1.total_cmp(&a.1).then_with(|| match order {
                DocidOrder::Ascending => a.0.cmp(&b.0),
                DocidOrder::Descending => b.0.cmp(&a.0),
            })
        });

        for (did, weight) in &ranked {
            let doc = self.db.document(*did)?;
            for spy in &mut self.spies {
                spy.observe(doc, *weight);
            }
        }

        let max_attained = ranked.first().map(|(_, w)| *w).unwrap_or(0.0);
        let percent_factor = match ranked.first() {
            Some((top, weight)) if *weight > 0.0 => {
                let matched = leaves
                    .iter()
                    .filter(|leaf| self.leaf_matches(leaf, *top))
                    .count();
                let fraction = matched as f64 / leaves.len().max(1) as f64;
                fraction / weight * 100.0
            }
            _ => 0.0,
        };
        let max_possible = leaves
            .iter()
            .map(|leaf| self.leaf_max_part(leaf, &ctx))
            .sum();

        let matches_estimated = ranked.len() as DocCount;
        let mut items = Vec::with_capacity((max_items as usize).min(ranked.len()));
        for (rank, (did, weight)) in ranked
            .into_iter()
            .enumerate()
            .skip(first as usize)
            .take(max_items as usize)
        {
            items.push(MSetItem {
                rank: rank as DocCount,
                weight,
                percent: to_percent(weight, percent_factor),
                docid: did,
                document: self.db.document(did)?,
            });
        }

        let elapsed = started.elapsed();
        debug!(
            query = %query.description(),
            matches = matches_estimated,
            returned = items.len(),
            elapsed_us = elapsed.as_micros() as u64,
            "Matched query"
        );

        Ok(MSet {
            items,
            first,
            matches_estimated,
            max_attained,
            max_possible,
            elapsed,
        })
    }

    /// Query terms (and wildcard prefixes) which match document `did`.
    pub fn matching_terms(&self, did: DocId) -> Vec<String> {
        let Some(query) = self.query.as_ref() else {
            return Vec::new();
        };
        let mut terms = Vec::new();
        for leaf in query.weighted_leaves() {
            if !self.leaf_matches(leaf, did) {
                continue;
            }
            match leaf {
                Query::Term { name, .. } => terms.push(name.clone()),
                Query::Wildcard { prefix } => terms.push(format!("{prefix}*")),
                _ => {}
            }
        }
        terms
    }

    fn evaluate(&self, query: &Query, ctx: &MatchContext) -> Result<Matches> {
        match query {
            Query::MatchNothing => Ok(Matches::new()),
            Query::MatchAll => Ok(self.db.docids().map(|did| (did, 0.0)).collect()),
            Query::Term { name, wqf, .. } => {
                let postings: BTreeMap<DocId, TermCount> = self.db.postlist(name).collect();
                self.weigh_postings(&postings, *wqf, ctx)
            }
            Query::Wildcard { prefix } => {
                // Expanded terms act as one synonym: wdfs are summed per document.
                let mut postings: BTreeMap<DocId, TermCount> = BTreeMap::new();
                for term in self.db.all_terms(prefix) {
                    for (did, wdf) in self.db.postlist(term) {
                        *postings.entry(did).or_insert(0) += wdf;
                    }
                }
                self.weigh_postings(&postings, 1, ctx)
            }
            Query::And { subqueries } => {
                let mut iter = subqueries.iter();
                let Some(first) = iter.next() else {
                    return Ok(Matches::new());
                };
                let mut acc = self.evaluate(first, ctx)?;
                for sub in iter {
                    if acc.is_empty() {
                        break;
                    }
                    let other = self.evaluate(sub, ctx)?;
                    acc = intersect(acc, &other);
                }
                Ok(acc)
            }
            Query::Or { subqueries } => {
                let mut acc = Matches::new();
                for sub in subqueries {
                    for (did, weight) in self.evaluate(sub, ctx)? {
                        *acc.entry(did).or_insert(0.0) += weight;
                    }
                }
                Ok(acc)
            }
            Query::Xor { subqueries } => {
                let mut acc: BTreeMap<DocId, (usize, f64)> = BTreeMap::new();
                for sub in subqueries {
                    for (did, weight) in self.evaluate(sub, ctx)? {
                        let entry = acc.entry(did).or_insert((0, 0.0));
                        entry.0 += 1;
                        entry.1 += weight;
                    }
                }
                Ok(acc
                    .into_iter()
                    .filter(|(_, (count, _))| count % 2 == 1)
                    .map(|(did, (_, weight))| (did, weight))
                    .collect())
            }
            Query::AndNot { left, right } => {
                let mut acc = self.evaluate(left, ctx)?;
                if !acc.is_empty() {
                    let excluded = self.evaluate(right, ctx)?;
                    acc.retain(|did, _| !excluded.contains_key(did));
                }
                Ok(acc)
            }
            Query::AndMaybe { left, right } => {
                let mut acc = self.evaluate(left, ctx)?;
                if !acc.is_empty() {
                    for (did, weight) in self.evaluate(right, ctx)? {
                        if let Some(existing) = acc.get_mut(&did) {
                            *existing += weight;
                        }
                    }
                }
                Ok(acc)
            }
            Query::Filter { left, right } => {
                let mut acc = self.evaluate(left, ctx)?;
                if !acc.is_empty() {
                    let filter = self.evaluate(right, ctx)?;
                    acc.retain(|did, _| filter.contains_key(did));
                }
                Ok(acc)
            }
            Query::Phrase { subqueries, window } => {
                self.evaluate_positional(subqueries, *window, true, ctx)
            }
            Query::Near { subqueries, window } => {
                self.evaluate_positional(subqueries, *window, false, ctx)
            }
            Query::ScaleWeight { factor, query } => {
                if *factor < 0.0 {
                    return Err(Error::InvalidArgument(
                        "ScaleWeight factor must be >= 0".to_string(),
                    ));
                }
                let mut acc = self.evaluate(query, ctx)?;
                for weight in acc.values_mut() {
                    *weight *= factor;
                }
                Ok(acc)
            }
        }
    }

    fn weigh_postings(
        &self,
        postings: &BTreeMap<DocId, TermCount>,
        wqf: TermCount,
        ctx: &MatchContext,
    ) -> Result<Matches> {
        let stats = TermStats {
            collection_size: ctx.collection_size,
            average_length: ctx.average_length,
            term_freq: postings.len() as DocCount,
            wqf,
            query_length: ctx.query_length,
        };
        postings
            .iter()
            .map(|(did, wdf)| {
                let doc_length = self.db.doc_length(*did)?;
                let weight = self.weight.sum_part(&stats, *wdf, doc_length)
                    + self.weight.sum_extra(&stats, doc_length);
                Ok((*did, weight))
            })
            .collect()
    }

    fn evaluate_positional(
        &self,
        subqueries: &[Query],
        window: u32,
        ordered: bool,
        ctx: &MatchContext,
    ) -> Result<Matches> {
        let mut names = Vec::with_capacity(subqueries.len());
        for sub in subqueries {
            match sub {
                Query::Term { name, .. } => names.push(name.as_str()),
                _ => {
                    return Err(Error::InvalidArgument(
                        "PHRASE and NEAR only support term subqueries".to_string(),
                    ));
                }
            }
        }

        // A term repeated in a NEAR needs that many distinct occurrences.
        let mut needed: Vec<(&str, usize)> = Vec::new();
        for name in &names {
            match needed.iter_mut().find(|(n, _)| *n == *name) {
                Some(entry) => entry.1 += 1,
                None => needed.push((*name, 1)),
            }
        }

        let mut candidates = self.evaluate(
            &Query::And {
                subqueries: subqueries.to_vec(),
            },
            ctx,
        )?;
        candidates.retain(|did, _| {
            if ordered {
                let positions: Vec<&[TermPos]> =
                    names.iter().map(|name| self.db.positions(*did, name)).collect();
                phrase_matches(&positions, window)
            } else {
                let positions: Vec<(&[TermPos], usize)> = needed
                    .iter()
                    .map(|(name, count)| (self.db.positions(*did, name), *count))
                    .collect();
                near_matches(&positions, window)
            }
        });
        Ok(candidates)
    }

    fn leaf_matches(&self, leaf: &Query, did: DocId) -> bool {
        let Ok(doc) = self.db.document(did) else {
            return false;
        };
        match leaf {
            Query::Term { name, .. } => doc.term(name).is_some(),
            Query::Wildcard { prefix } => doc.terms().any(|(name, _)| name.starts_with(prefix.as_str())),
            _ => false,
        }
    }

    fn leaf_max_part(&self, leaf: &Query, ctx: &MatchContext) -> f64 {
        let (term_freq, wqf) = match leaf {
            Query::Term { name, wqf, .. } => (self.db.term_freq(name), *wqf),
            Query::Wildcard { prefix } => {
                let mut docs = std::collections::BTreeSet::new();
                for term in self.db.all_terms(prefix) {
                    docs.extend(self.db.postlist(term).map(|(did, _)| did));
                }
                (docs.len() as DocCount, 1)
            }
            _ => return 0.0,
        };
        if term_freq == 0 {
            return 0.0;
        }
        self.weight.max_part(&TermStats {
            collection_size: ctx.collection_size,
            average_length: ctx.average_length,
            term_freq,
            wqf,
            query_length: ctx.query_length,
        })
    }
}

fn leaf_wqf(leaf: &Query) -> TermCount {
    match leaf {
        Query::Term { wqf, .. } => *wqf,
        _ => 1,
    }
}

fn intersect(acc: Matches, other: &Matches) -> Matches {
    acc.into_iter()
        .filter_map(|(did, weight)| other.get(&did).map(|w| (did, weight + w)))
        .collect()
}

/// Percentage score for `weight`, given the factor derived from the top match.
fn to_percent(weight: f64, percent_factor: f64) -> u8 {
    if percent_factor == 0.0 {
        return 100;
    }
    let pct = (weight * percent_factor + 100.0 * f64::EPSILON).floor();
    let pct = pct.clamp(0.0, 100.0) as u8;
    if pct == 0 && weight > 0.0 { 1 } else { pct }
}

/// Terms appear in order, the whole phrase spanning fewer than `window` positions.
fn phrase_matches(positions: &[&[TermPos]], window: u32) -> bool {
    let Some((first, rest)) = positions.split_first() else {
        return false;
    };
    'start: for &start in first.iter() {
        let mut prev = start;
        for list in rest {
            // Earliest occurrence after the previous term keeps the span smallest.
            let idx = list.partition_point(|&p| p <= prev);
            match list.get(idx) {
                Some(&p) => prev = p,
                None => break 'start,
            }
        }
        if prev - start < window {
            return true;
        }
    }
    false
}

/// Every term occurs, in any order, within a span of fewer than `window` positions.
///
/// Each entry is a term's positions and how many distinct occurrences of it are needed.
fn near_matches(terms: &[(&[TermPos], usize)], window: u32) -> bool {
    let wanted = terms.len();
    if wanted == 0 || terms.iter().any(|(list, need)| list.len() < *need) {
        return false;
    }

    let mut merged: Vec<(TermPos, usize)> = terms
        .iter()
        .enumerate()
        .flat_map(|(idx, (list, _))| list.iter().map(move |&p| (p, idx)))
        .collect();
    merged.sort_unstable();

    let mut counts = vec![0usize; wanted];
    let mut covered = 0;
    let mut lo = 0;
    for hi in 0..merged.len() {
        let (_, idx) = merged[hi];
        counts[idx] += 1;
        if counts[idx] == terms[idx].1 {
            covered += 1;
        }

        while covered == wanted {
            let span = merged[hi].0 - merged[lo].0;
            if span < window {
                return true;
            }
            let (_, lo_idx) = merged[lo];
            if counts[lo_idx] == terms[lo_idx].1 {
                covered -= 1;
            }
            counts[lo_idx] -= 1;
            lo += 1;
        }
    }
    false
}

use std::fmt::Debug;

use crate::error::{Error, Result};
use crate::{DocCount, TermCount};

/// Collection-wide statistics for one query term.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TermStats {
    pub collection_size: DocCount,
    pub average_length: f64,
    pub term_freq: DocCount,
    pub wqf: TermCount,
    /// Sum of wqf over every term in the query.
    pub query_length: TermCount,
}

/// A document weighting scheme.
pub trait Weight: Debug + Send + Sync {
    fn name(&self) -> &'static str;

    /// Weight contributed by one query term matching a document.
    fn sum_part(&self, stats: &TermStats, wdf: TermCount, doc_length: u64) -> f64;

    /// Per-document weight which doesn't depend on any one term.
    fn sum_extra(&self, _stats: &TermStats, _doc_length: u64) -> f64 {
        0.0
    }

    /// Upper bound on `sum_part` for any wdf and document length.
    fn max_part(&self, stats: &TermStats) -> f64;
}

/// Look up a weighting scheme by name: `bm25`, `tfidf` or `bool`.
pub fn from_name(name: &str) -> Result<Box<dyn Weight>> {
    match name.to_ascii_lowercase().as_str() {
        "bm25" => Ok(Box::new(Bm25Weight::default())),
        "tfidf" => Ok(Box::new(TfIdfWeight)),
        "bool" | "boolean" => Ok(Box::new(BoolWeight)),
        other => Err(Error::InvalidArgument(format!(
            "Unknown weighting scheme '{other}'"
        ))),
    }
}

/// The probabilistic BM25 scheme.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bm25Weight {
    pub k1: f64,
    pub k2: f64,
    pub k3: f64,
    pub b: f64,
    pub min_normlen: f64,
}

impl Default for Bm25Weight {
    fn default() -> Self {
        Self {
            k1: 1.0,
            k2: 0.0,
            k3: 1.0,
            b: 0.5,
            min_normlen: 0.5,
        }
    }
}

impl Bm25Weight {
    /// idf combined with the query-frequency factor and the (k1 + 1) scale.
    fn term_weight(&self, stats: &TermStats) -> f64 {
        let n = f64::from(stats.collection_size);
        let tf = f64::from(stats.term_freq);
        let mut tw = (n - tf + 0.5) / (tf + 0.5);
        // Keep very common terms from getting a negative weight.
        if tw < 2.0 {
            tw = tw * 0.5 + 1.0;
        }
        let wqf = f64::from(stats.wqf);
        let wqf_factor = if self.k3 == 0.0 {
            1.0
        } else {
            (self.k3 + 1.0) * wqf / (self.k3 + wqf)
        };
        tw.ln() * wqf_factor * (self.k1 + 1.0)
    }

    fn norm_length(&self, stats: &TermStats, doc_length: u64) -> f64 {
        if stats.average_length <= 0.0 {
            return 1.0;
        }
        (doc_length as f64 / stats.average_length).max(self.min_normlen)
    }
}

impl Weight for Bm25Weight {
    fn name(&self) -> &'static str {
        "bm25"
    }

    fn sum_part(&self, stats: &TermStats, wdf: TermCount, doc_length: u64) -> f64 {
        if wdf == 0 {
            return 0.0;
        }
        let wdf = f64::from(wdf);
        let normlen = self.norm_length(stats, doc_length);
        let denom = self.k1 * (normlen * self.b + (1.0 - self.b)) + wdf;
        self.term_weight(stats) * (wdf / denom)
    }

    fn sum_extra(&self, stats: &TermStats, doc_length: u64) -> f64 {
        if self.k2 == 0.0 {
            return 0.0;
        }
        let normlen = self.norm_length(stats, doc_length);
        2.0 * self.k2 * f64::from(stats.query_length) / (1.0 + normlen)
    }

    fn max_part(&self, stats: &TermStats) -> f64 {
        self.term_weight(stats)
    }
}

/// wdf * log(N / termfreq).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TfIdfWeight;

impl TfIdfWeight {
    fn idf(stats: &TermStats) -> f64 {
        if stats.term_freq == 0 {
            return 0.0;
        }
        (f64::from(stats.collection_size) / f64::from(stats.term_freq)).ln()
    }
}

impl Weight for TfIdfWeight {
    fn name(&self) -> &'static str {
        "tfidf"
    }

    fn sum_part(&self, stats: &TermStats, wdf: TermCount, _doc_length: u64) -> f64 {
        f64::from(wdf) * Self::idf(stats) * f64::from(stats.wqf)
    }

    fn max_part(&self, stats: &TermStats) -> f64 {
        f64::from(TermCount::MAX) * Self::idf(stats) * f64::from(stats.wqf)
    }
}

/// Every match gets weight zero, so results come back in docid order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BoolWeight;

impl Weight for BoolWeight {
    fn name(&self) -> &'static str {
        "bool"
    }

    fn sum_part(&self, _stats: &TermStats, _wdf: TermCount, _doc_length: u64) -> f64 {
        0.0
    }

    fn max_part(&self, _stats: &TermStats) -> f64 {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(term_freq: DocCount) -> TermStats {
        TermStats {
            collection_size: 100,
            average_length: 10.0,
            term_freq,
            wqf: 1,
            query_length: 1,
        }
    }

    #[test]
    fn test_bm25_rarer_terms_weigh_more() {
        let w = Bm25Weight::default();
        let rare = w.sum_part(&stats(1), 1, 10);
        let common = w.sum_part(&stats(50), 1, 10);
        assert!(rare > common);
        assert!(common > 0.0);
    }

    #[test]
    fn test_bm25_wdf_saturates() {
        let w = Bm25Weight::default();
        let s = stats(5);
        let one = w.sum_part(&s, 1, 10);
        let two = w.sum_part(&s, 2, 10);
        let many = w.sum_part(&s, 1000, 10);
        assert!(two > one);
        assert!(many < w.max_part(&s));
        assert!(many > two);
    }

    #[test]
    fn test_bm25_shorter_documents_score_higher() {
        let w = Bm25Weight::default();
        let s = stats(5);
        assert!(w.sum_part(&s, 1, 5) > w.sum_part(&s, 1, 40));
    }

    #[test]
    fn test_bm25_very_common_term_stays_positive() {
        let w = Bm25Weight::default();
        assert!(w.sum_part(&stats(100), 1, 10) > 0.0);
    }

    #[test]
    fn test_bm25_zero_wdf() {
        assert_eq!(Bm25Weight::default().sum_part(&stats(5), 0, 10), 0.0);
    }

    #[test]
    fn test_bm25_no_extra_by_default() {
        assert_eq!(Bm25Weight::default().sum_extra(&stats(5), 10), 0.0);
        let w = Bm25Weight {
            k2: 1.0,
            ..Bm25Weight::default()
        };
        assert!(w.sum_extra(&stats(5), 10) > 0.0);
    }

    #[test]
    fn test_tfidf() {
        let w = TfIdfWeight;
        let s = stats(10);
        let expected = 2.0 * (10.0f64).ln();
        assert!((w.sum_part(&s, 2, 10) - expected).abs() < 1e-9);
    }

    #[test]
    fn test_bool_weight() {
        assert_eq!(BoolWeight.sum_part(&stats(1), 5, 10), 0.0);
    }

    #[test]
    fn test_from_name() -> Result<()> {
        assert_eq!(from_name("BM25")?.name(), "bm25");
        assert_eq!(from_name("tfidf")?.name(), "tfidf");
        assert_eq!(from_name("bool")?.name(), "bool");
        assert!(from_name("magic").is_err());
        Ok(())
    }
}

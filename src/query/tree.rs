use serde::{Deserialize, Serialize};

use crate::{TermCount, TermPos};

/// A structured, executable query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Query {
    /// Matches no documents. This is what an empty query string parses to.
    #[default]
    MatchNothing,
    /// Matches every document with zero weight.
    MatchAll,
    Term {
        name: String,
        wqf: TermCount,
        pos: TermPos,
    },
    #[serde(rename = "AND")]
    And { subqueries: Vec<Query> },
    #[serde(rename = "OR")]
    Or { subqueries: Vec<Query> },
    #[serde(rename = "XOR")]
    Xor { subqueries: Vec<Query> },
    /// Documents matching `left` but not `right`; weight from `left` only.
    AndNot { left: Box<Query>, right: Box<Query> },
    /// Documents matching `left`; `right` only adds weight.
    AndMaybe { left: Box<Query>, right: Box<Query> },
    /// Documents matching both; weight from `left` only.
    Filter { left: Box<Query>, right: Box<Query> },
    /// Terms in order within `window` positions.
    Phrase { subqueries: Vec<Query>, window: u32 },
    /// Terms in any order within `window` positions.
    Near { subqueries: Vec<Query>, window: u32 },
    /// Every term in the database starting with `prefix`.
    Wildcard { prefix: String },
    ScaleWeight { factor: f64, query: Box<Query> },
}

impl Query {
    pub fn term(name: impl Into<String>) -> Self {
        Self::term_at(name, 0)
    }

    pub fn term_at(name: impl Into<String>, pos: TermPos) -> Self {
        Query::Term {
            name: name.into(),
            wqf: 1,
            pos,
        }
    }

    /// Combine subqueries with AND, flattening nested ANDs.
    pub fn and(subqueries: impl IntoIterator<Item = Query>) -> Self {
        combine(subqueries, Op::And)
    }

    /// Combine subqueries with OR, flattening nested ORs.
    pub fn or(subqueries: impl IntoIterator<Item = Query>) -> Self {
        combine(subqueries, Op::Or)
    }

    pub fn xor(subqueries: impl IntoIterator<Item = Query>) -> Self {
        combine(subqueries, Op::Xor)
    }

    pub fn and_not(left: Query, right: Query) -> Self {
        match (left, right) {
            (Query::MatchNothing, _) => Query::MatchNothing,
            (left, Query::MatchNothing) => left,
            (left, right) => Query::AndNot {
                left: Box::new(left),
                right: Box::new(right),
            },
        }
    }

    pub fn and_maybe(left: Query, right: Query) -> Self {
        match (left, right) {
            (Query::MatchNothing, _) => Query::MatchNothing,
            (left, Query::MatchNothing) => left,
            (left, right) => Query::AndMaybe {
                left: Box::new(left),
                right: Box::new(right),
            },
        }
    }

    pub fn filter(left: Query, right: Query) -> Self {
        match (left, right) {
            (Query::MatchNothing, _) | (_, Query::MatchNothing) => Query::MatchNothing,
            (left, right) => Query::Filter {
                left: Box::new(left),
                right: Box::new(right),
            },
        }
    }

    pub fn scale_weight(query: Query, factor: f64) -> Self {
        Query::ScaleWeight {
            factor,
            query: Box::new(query),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Query::MatchNothing)
    }

    /// The description in the engine's traditional `Query(...)` format.
    pub fn description(&self) -> String {
        match self {
            Query::MatchNothing => "Query()".to_string(),
            other => format!("Query({})", other.describe()),
        }
    }

    fn describe(&self) -> String {
        match self {
            Query::MatchNothing => String::new(),
            Query::MatchAll => "<alldocuments>".to_string(),
            Query::Term { name, wqf, pos } => {
                let mut out = name.clone();
                if *wqf != 1 {
                    out.push_str(&format!("#{wqf}"));
                }
                if *pos != 0 {
                    out.push_str(&format!("@{pos}"));
                }
                out
            }
            Query::And { subqueries } => describe_list(subqueries, " AND "),
            Query::Or { subqueries } => describe_list(subqueries, " OR "),
            Query::Xor { subqueries } => describe_list(subqueries, " XOR "),
            Query::AndNot { left, right } => {
                format!("({} AND_NOT {})", left.describe(), right.describe())
            }
            Query::AndMaybe { left, right } => {
                format!("({} AND_MAYBE {})", left.describe(), right.describe())
            }
            Query::Filter { left, right } => {
                format!("({} FILTER {})", left.describe(), right.describe())
            }
            Query::Phrase { subqueries, window } => {
                describe_list(subqueries, &format!(" PHRASE {window} "))
            }
            Query::Near { subqueries, window } => {
                describe_list(subqueries, &format!(" NEAR {window} "))
            }
            Query::Wildcard { prefix } => format!("WILDCARD SYNONYM {prefix}"),
            Query::ScaleWeight { factor, query } => format!("{factor} * {}", query.describe()),
        }
    }

    /// Unique term names in the query, in position order.
    pub fn terms(&self) -> Vec<String> {
        let mut found = Vec::new();
        self.collect_terms(&mut found, true);
        found.sort_by_key(|(_, pos)| *pos);
        let mut names: Vec<String> = Vec::with_capacity(found.len());
        for (name, _) in found {
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }

    /// Leaves which can contribute weight (terms and wildcards), deduplicated.
    ///
    /// Terms only reachable through the right-hand side of AND_NOT or FILTER
    /// are left out.
    pub fn weighted_leaves(&self) -> Vec<&Query> {
        let mut leaves = Vec::new();
        self.collect_leaves(&mut leaves);
        leaves
    }

    fn collect_terms(&self, out: &mut Vec<(String, TermPos)>, include_negative: bool) {
        match self {
            Query::Term { name, pos, .. } => out.push((name.clone(), *pos)),
            Query::And { subqueries }
            | Query::Or { subqueries }
            | Query::Xor { subqueries }
            | Query::Phrase { subqueries, .. }
            | Query::Near { subqueries, .. } => {
                for q in subqueries {
                    q.collect_terms(out, include_negative);
                }
            }
            Query::AndNot { left, right }
            | Query::AndMaybe { left, right }
            | Query::Filter { left, right } => {
                left.collect_terms(out, include_negative);
                if include_negative {
                    right.collect_terms(out, include_negative);
                }
            }
            Query::ScaleWeight { query, .. } => query.collect_terms(out, include_negative),
            Query::MatchNothing | Query::MatchAll | Query::Wildcard { .. } => {}
        }
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a Query>) {
        match self {
            Query::Term { name, .. } => {
                let seen = out
                    .iter()
                    .any(|q| matches!(q, Query::Term { name: n, .. } if n == name));
                if !seen {
                    out.push(self);
                }
            }
            Query::Wildcard { prefix } => {
                let seen = out
                    .iter()
                    .any(|q| matches!(q, Query::Wildcard { prefix: p } if p == prefix));
                if !seen {
                    out.push(self);
                }
            }
            Query::And { subqueries }
            | Query::Or { subqueries }
            | Query::Xor { subqueries }
            | Query::Phrase { subqueries, .. }
            | Query::Near { subqueries, .. } => {
                for q in subqueries {
                    q.collect_leaves(out);
                }
            }
            Query::AndNot { left, .. } | Query::Filter { left, .. } => left.collect_leaves(out),
            Query::AndMaybe { left, right } => {
                left.collect_leaves(out);
                right.collect_leaves(out);
            }
            Query::ScaleWeight { query, .. } => query.collect_leaves(out),
            Query::MatchNothing | Query::MatchAll => {}
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Op {
    And,
    Or,
    Xor,
}

fn combine(subqueries: impl IntoIterator<Item = Query>, op: Op) -> Query {
    let mut flat = Vec::new();
    for q in subqueries {
        match (op, q) {
            (Op::And, Query::And { subqueries }) | (Op::Or, Query::Or { subqueries }) => {
                flat.extend(subqueries);
            }
            // OR and XOR ignore empty operands; AND with an empty operand matches nothing.
            (Op::Or | Op::Xor, Query::MatchNothing) => {}
            (Op::And, Query::MatchNothing) => return Query::MatchNothing,
            (_, q) => flat.push(q),
        }
    }

    match flat.len() {
        0 => Query::MatchNothing,
        1 => flat.pop().unwrap_or_default(),
        _ => match op {
            Op::And => Query::And { subqueries: flat },
            Op::Or => Query::Or { subqueries: flat },
            Op::Xor => Query::Xor { subqueries: flat },
        },
    }
}

fn describe_list(subqueries: &[Query], sep: &str) -> String {
    let parts: Vec<String> = subqueries.iter().map(Query::describe).collect();
    format!("({})", parts.join(sep))
}

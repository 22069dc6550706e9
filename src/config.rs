use serde::{Deserialize, Serialize};

use crate::database::Database;
use crate::enquire::Enquire;
use crate::error::Result;
use crate::matchspy::ValueCountMatchSpy;
use crate::query::{DefaultOp, Query, QueryParser, StemStrategy};
use crate::stem::Stem;
use crate::weight::{self, Weight};
use crate::{DocCount, ValueSlot};

/// Results per page when none is given.
pub const DEFAULT_MAX_RESULTS: DocCount = 10;

/// Settings for one search, filled in from the command line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchOptions {
    pub max_results: DocCount,
    pub offset: DocCount,
    pub stem_language: String,
    pub stem_strategy: StemStrategy,
    pub default_op: DefaultOp,
    pub weighting: String,
    /// Value slot to count facets in.
    pub facet_slot: Option<ValueSlot>,
    pub verbose: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            max_results: DEFAULT_MAX_RESULTS,
            offset: 0,
            stem_language: "english".to_string(),
            stem_strategy: StemStrategy::Some,
            default_op: DefaultOp::Or,
            weighting: "bm25".to_string(),
            facet_slot: None,
            verbose: false,
        }
    }
}

impl SearchOptions {
    pub fn stemmer(&self) -> Result<Stem> {
        Stem::new(&self.stem_language)
    }

    /// A parser configured with these options, using `db` for wildcards.
    pub fn query_parser<'db>(&self, db: &'db Database) -> Result<QueryParser<'db>> {
        let mut parser = QueryParser::new();
        parser.set_stemmer(self.stemmer()?);
        parser.set_stemming_strategy(self.stem_strategy);
        parser.set_default_op(self.default_op);
        parser.set_database(db);
        Ok(parser)
    }

    pub fn weighting_scheme(&self) -> Result<Box<dyn Weight>> {
        weight::from_name(&self.weighting)
    }

    /// An enquire session running `query` with these options.
    pub fn enquire<'db>(&self, db: &'db Database, query: Query) -> Result<Enquire<'db>> {
        let mut enquire = Enquire::new(db);
        enquire.set_weighting_scheme(self.weighting_scheme()?);
        if let Some(slot) = self.facet_slot {
            enquire.add_matchspy(Box::new(ValueCountMatchSpy::new(slot)));
        }
        enquire.set_query(query);
        Ok(enquire)
    }
}

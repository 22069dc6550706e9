pub mod parser;
pub mod tree;

pub use parser::{DEFAULT_NEAR_GAP, DefaultOp, ParseFlags, QueryParser, StemStrategy};
pub use tree::Query;

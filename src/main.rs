use anyhow::{Context, Result};
use clap::Parser;
use clap::error::ErrorKind;
use simplesearch::config::{DEFAULT_MAX_RESULTS, SearchOptions};
use simplesearch::output::{Facets, SearchReport, write_report};
use simplesearch::{Database, DefaultOp, OutputFormat, StemStrategy, ValueSlot, logging};
use std::io::{self, Write};
use std::path::PathBuf;
use std::process;
use tracing::debug;

const USAGE: &str = "Usage: simplesearch PATH_TO_DATABASE QUERY";

#[derive(Parser)]
#[command(
    name = "simplesearch",
    version,
    about = "Search a simplesearch database and print the ranked matches",
    override_usage = "simplesearch [OPTIONS] PATH_TO_DATABASE QUERY...",
    long_about = None
)]
struct Cli {
    /// Database directory (or its index.json)
    #[arg(value_name = "PATH_TO_DATABASE", required_unless_present = "help_query")]
    database: Option<PathBuf>,

    /// Query words, joined with single spaces
    #[arg(
        value_name = "QUERY",
        required_unless_present = "help_query",
        num_args = 1..,
        trailing_var_arg = true,
        allow_hyphen_values = true
    )]
    query: Vec<String>,

    /// Maximum number of results to return
    #[arg(short = 'n', long, default_value_t = DEFAULT_MAX_RESULTS, env = "SIMPLESEARCH_MAX_RESULTS")]
    max_results: u32,

    /// Number of top-ranked results to skip
    #[arg(long, default_value_t = 0, env = "SIMPLESEARCH_OFFSET")]
    offset: u32,

    /// Output format
    #[arg(short = 'f', long, value_enum, default_value = "text", env = "SIMPLESEARCH_FORMAT")]
    format: OutputFormat,

    /// Stemming language ("english" or "none")
    #[arg(long, default_value = "english", env = "SIMPLESEARCH_STEM")]
    stem: String,

    /// Which query words get stemmed
    #[arg(long, value_enum, default_value = "some", env = "SIMPLESEARCH_STEM_STRATEGY")]
    stem_strategy: StemStrategy,

    /// Operator between words with no explicit operator
    #[arg(long, value_enum, default_value = "or", env = "SIMPLESEARCH_DEFAULT_OP")]
    default_op: DefaultOp,

    /// Weighting scheme (bm25, tfidf, bool)
    #[arg(long, default_value = "bm25", env = "SIMPLESEARCH_WEIGHTING")]
    weighting: String,

    /// Count the values in this slot across all matches
    #[arg(long, value_name = "SLOT", env = "SIMPLESEARCH_FACET")]
    facet: Option<ValueSlot>,

    /// Number of facet values to show
    #[arg(long, default_value_t = 10, env = "SIMPLESEARCH_FACET_COUNT")]
    facet_count: usize,

    /// Enable verbose output
    #[arg(short, long, env = "SIMPLESEARCH_VERBOSE")]
    verbose: bool,

    /// Show query syntax help
    #[arg(long)]
    help_query: bool,
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => match e.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                let _ = e.print();
                process::exit(0);
            }
            ErrorKind::MissingRequiredArgument | ErrorKind::TooFewValues => {
                eprintln!("{USAGE}");
                process::exit(1);
            }
            _ => {
                let _ = e.print();
                process::exit(1);
            }
        },
    };

    logging::init_tracing(cli.verbose);

    if cli.help_query {
        print_query_help();
        return;
    }

    if let Err(e) = run(cli) {
        eprintln!("Exception: {e:#}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let db_path = cli.database.context("no database path given")?;

    let options = SearchOptions {
        max_results: cli.max_results,
        offset: cli.offset,
        stem_language: cli.stem,
        stem_strategy: cli.stem_strategy,
        default_op: cli.default_op,
        weighting: cli.weighting,
        facet_slot: cli.facet,
        verbose: cli.verbose,
    };

    let db = Database::open(&db_path)?;
    let query_string = cli.query.join(" ");
    let parser = options.query_parser(&db)?;
    let query = parser.parse_query(&query_string)?;
    debug!(query = %query_string, parser = %parser.description(), "Parsed query");

    let mut enquire = options.enquire(&db, query.clone())?;
    let mset = enquire.get_mset(options.offset, options.max_results)?;

    let facets = options.facet_slot.and_then(|slot| {
        enquire.matchspies().first().map(|spy| Facets {
            slot,
            total: spy.total(),
            values: spy.top_values(cli.facet_count),
        })
    });

    let report = SearchReport {
        query: &query,
        mset: &mset,
        facets,
    };
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    write_report(&mut handle, cli.format, &report)?;
    handle.flush()?;
    Ok(())
}

fn print_query_help() {
    println!(r#"simplesearch Query Syntax Help

BASIC QUERIES:
  apple                   Matches "apple" and its stemmed forms
  apple banana            Either word (see --default-op)
  "red apple"             Exact phrase
  e-mail                  Hyphenated words are matched as a phrase
  Apple                   Capitalised words aren't stemmed

OPERATORS:
  apple AND banana        Both words must be present
  apple OR banana         Either word must be present
  apple XOR banana        Exactly one of the words
  apple NOT banana        First word without the second
  apple AND NOT banana    Same as NOT
  apple NEAR banana       Within 10 words of each other, any order
  apple NEAR/3 banana     Within 3 words of each other
  (apple OR pear) AND pie Parentheses for grouping

PREFIXES:
  +apple                  Word must be present
  -apple                  Word must not be present

PRECEDENCE (loosest first):
  OR, XOR, AND / NOT, NEAR, phrases and words

TIPS:
  - Operators must be written in capitals
  - Matching is case-insensitive
  - Words after the database path are joined with spaces"#);
}

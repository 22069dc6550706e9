use anyhow::{Context, Result};
use clap::Parser;
use clap::error::ErrorKind;
use serde::Deserialize;
use simplesearch::{Document, Stem, TermGenerator, ValueSlot, WritableDatabase, logging};
use std::collections::BTreeMap;
use std::io::{self, BufRead, Read};
use std::path::PathBuf;
use std::process;
use tracing::{debug, info};

const USAGE: &str = "Usage: simpleindex PATH_TO_DATABASE";

#[derive(Parser)]
#[command(
    name = "simpleindex",
    version,
    about = "Index text read from stdin into a simplesearch database",
    long_about = None
)]
struct Cli {
    /// Database directory, created if it doesn't exist
    #[arg(value_name = "PATH_TO_DATABASE")]
    database: PathBuf,

    /// Read one JSON object per line instead of blank-line separated paragraphs
    #[arg(long)]
    jsonl: bool,

    /// Stemming language ("english" or "none")
    #[arg(long, default_value = "english", env = "SIMPLESEARCH_STEM")]
    stem: String,

    /// Enable verbose output
    #[arg(short, long, env = "SIMPLESEARCH_VERBOSE")]
    verbose: bool,
}

/// One line of `--jsonl` input.
#[derive(Debug, Deserialize)]
struct Record {
    text: String,
    /// Stored document data; defaults to `text`.
    #[serde(default)]
    data: Option<String>,
    #[serde(default)]
    values: BTreeMap<ValueSlot, String>,
    /// Extra boolean terms, e.g. for filtering.
    #[serde(default)]
    terms: Vec<String>,
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => match e.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                let _ = e.print();
                process::exit(0);
            }
            ErrorKind::MissingRequiredArgument => {
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

    if let Err(e) = run(cli) {
        eprintln!("Exception: {e:#}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut db = WritableDatabase::create_or_open(&cli.database)?;
    let mut indexer = TermGenerator::new();
    indexer.set_stemmer(Stem::new(&cli.stem)?);

    let stdin = io::stdin();
    let documents = if cli.jsonl {
        read_records(stdin.lock(), &mut indexer)?
    } else {
        let mut input = String::new();
        stdin.lock().read_to_string(&mut input)?;
        paragraphs(&input)
            .into_iter()
            .map(|text| index_text(&mut indexer, &text, text.clone()))
            .collect::<Result<Vec<_>>>()?
    };

    let added = documents.len();
    for doc in documents {
        let did = db.add_document(doc)?;
        debug!(did, "Added document");
    }
    db.commit()?;
    info!(added, path = %cli.database.display(), "Indexed documents");

    println!(
        "Indexed {added} documents; database now contains {} documents.",
        db.doc_count()
    );
    Ok(())
}

fn index_text(indexer: &mut TermGenerator, text: &str, data: String) -> Result<Document> {
    let mut doc = Document::with_data(data);
    indexer.set_termpos(0);
    indexer.index_text(&mut doc, text, 1, "")?;
    Ok(doc)
}

fn read_records(input: impl BufRead, indexer: &mut TermGenerator) -> Result<Vec<Document>> {
    let mut documents = Vec::new();
    for (idx, line) in input.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record: Record = serde_json::from_str(&line)
            .with_context(|| format!("Invalid JSON on line {}", idx + 1))?;

        let data = record.data.unwrap_or_else(|| record.text.clone());
        let mut doc = index_text(indexer, &record.text, data)?;
        for (slot, value) in record.values {
            doc.add_value(slot, value);
        }
        for term in &record.terms {
            doc.add_boolean_term(term)?;
        }
        documents.push(doc);
    }
    Ok(documents)
}

/// Splits `input` on blank lines, dropping trailing whitespace from each line.
fn paragraphs(input: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for line in input.lines() {
        let line = line.trim_end();
        if line.trim().is_empty() {
            if !current.is_empty() {
                out.push(current.join("\n"));
                current.clear();
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        out.push(current.join("\n"));
    }
    out
}

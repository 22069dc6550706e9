use clap::ValueEnum;
use serde::Serialize;
use std::io::{self, Write};

use crate::enquire::{MSet, MSetItem};
use crate::matchspy::ItemFrequency;
use crate::query::Query;
use crate::{DocCount, DocId, ValueSlot};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    #[value(name = "jsonl")]
    JsonL,
}

/// Value counts collected while matching.
#[derive(Debug, Clone, Serialize)]
pub struct Facets {
    pub slot: ValueSlot,
    /// Documents examined.
    pub total: DocCount,
    pub values: Vec<ItemFrequency>,
}

/// Everything printed for one search.
#[derive(Debug)]
pub struct SearchReport<'a, 'db> {
    pub query: &'a Query,
    pub mset: &'a MSet<'db>,
    pub facets: Option<Facets>,
}

#[derive(Serialize)]
struct MatchRecord<'a> {
    rank: DocCount,
    percent: u8,
    weight: f64,
    docid: DocId,
    data: &'a str,
}

impl<'a> From<&'a MSetItem<'_>> for MatchRecord<'a> {
    fn from(item: &'a MSetItem<'_>) -> Self {
        Self {
            rank: item.rank + 1,
            percent: item.percent,
            weight: item.weight,
            docid: item.docid,
            data: item.document.data(),
        }
    }
}

#[derive(Serialize)]
struct JsonReport<'a> {
    query: String,
    estimated: DocCount,
    size: usize,
    first: DocCount,
    duration_ms: u128,
    matches: Vec<MatchRecord<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    facets: Option<&'a Facets>,
}

/// `rank: percent% docid=id [data]`, with a 1-based rank.
pub fn format_match(item: &MSetItem<'_>) -> String {
    format!(
        "{}: {}% docid={} [{}]",
        item.rank + 1,
        item.percent,
        item.docid,
        item.document.data()
    )
}

pub fn write_report<W: Write>(
    out: &mut W,
    format: OutputFormat,
    report: &SearchReport<'_, '_>,
) -> io::Result<()> {
    match format {
        OutputFormat::Text => write_text(out, report),
        OutputFormat::Json => write_json(out, report),
        OutputFormat::JsonL => write_jsonl(out, report),
    }
}

fn write_text<W: Write>(out: &mut W, report: &SearchReport<'_, '_>) -> io::Result<()> {
    let mset = report.mset;
    writeln!(out, "Parsed query is: {}", report.query.description())?;
    writeln!(out, "{} results found.", mset.matches_estimated())?;
    writeln!(
        out,
        "Matches {}-{}:",
        mset.first() + 1,
        mset.first() as usize + mset.size()
    )?;
    for item in mset {
        writeln!(out, "{}", format_match(item))?;
    }

    if let Some(facets) = &report.facets {
        writeln!(out, "Facets for slot {} ({} documents):", facets.slot, facets.total)?;
        for value in &facets.values {
            writeln!(out, "  {}: {}", value.item, value.frequency)?;
        }
    }
    Ok(())
}

fn write_json<W: Write>(out: &mut W, report: &SearchReport<'_, '_>) -> io::Result<()> {
    let mset = report.mset;
    let output = JsonReport {
        query: report.query.description(),
        estimated: mset.matches_estimated(),
        size: mset.size(),
        first: mset.first(),
        duration_ms: mset.elapsed().as_millis(),
        matches: mset.iter().map(MatchRecord::from).collect(),
        facets: report.facets.as_ref(),
    };
    serde_json::to_writer_pretty(&mut *out, &output)?;
    writeln!(out)
}

fn write_jsonl<W: Write>(out: &mut W, report: &SearchReport<'_, '_>) -> io::Result<()> {
    let mset = report.mset;
    for item in mset {
        serde_json::to_writer(&mut *out, &MatchRecord::from(item))?;
        writeln!(out)?;
    }
    // Metadata goes on the last line
    let metadata = serde_json::json!({
        "_metadata": {
            "query": report.query.description(),
            "estimated": mset.matches_estimated(),
            "size": mset.size(),
            "duration_ms": mset.elapsed().as_millis(),
            "facets": report.facets,
        }
    });
    serde_json::to_writer(&mut *out, &metadata)?;
    writeln!(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::WritableDatabase;
    use crate::document::Document;
    use crate::enquire::Enquire;
    use crate::termgen::TermGenerator;
    use anyhow::Result;

    fn database() -> Result<crate::database::Database> {
        let dir = tempfile::tempdir()?;
        let mut wdb = WritableDatabase::create_or_open(dir.path())?;
        for text in ["red apple", "green apple", "red cherry"] {
            let mut doc = Document::with_data(text);
            TermGenerator::new().index_text(&mut doc, text, 1, "")?;
            wdb.add_document(doc)?;
        }
        Ok(wdb.database().clone())
    }

    fn render(format: OutputFormat, query: &Query, facets: Option<Facets>) -> Result<String> {
        let db = database()?;
        let mut enquire = Enquire::new(&db);
        enquire.set_query(query.clone());
        let mset = enquire.get_mset(0, 10)?;
        let report = SearchReport {
            query,
            mset: &mset,
            facets,
        };
        let mut buf = Vec::new();
        write_report(&mut buf, format, &report)?;
        Ok(String::from_utf8(buf)?)
    }

    #[test]
    fn test_text_output() -> Result<()> {
        let text = render(OutputFormat::Text, &Query::term_at("cherry", 1), None)?;
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                "Parsed query is: Query(cherry@1)",
                "1 results found.",
                "Matches 1-1:",
                "1: 100% docid=3 [red cherry]",
            ]
        );
        Ok(())
    }

    #[test]
    fn test_text_output_no_matches() -> Result<()> {
        let text = render(OutputFormat::Text, &Query::term_at("banana", 1), None)?;
        assert_eq!(
            text,
            "Parsed query is: Query(banana@1)\n0 results found.\nMatches 1-0:\n"
        );
        Ok(())
    }

    #[test]
    fn test_text_output_with_facets() -> Result<()> {
        let facets = Facets {
            slot: 0,
            total: 2,
            values: vec![ItemFrequency {
                item: "fruit".to_string(),
                frequency: 2,
            }],
        };
        let text = render(OutputFormat::Text, &Query::term_at("apple", 1), Some(facets))?;
        assert!(text.contains("Facets for slot 0 (2 documents):\n  fruit: 2\n"));
        Ok(())
    }

    #[test]
    fn test_json_output() -> Result<()> {
        let text = render(OutputFormat::Json, &Query::term_at("apple", 1), None)?;
        let value: serde_json::Value = serde_json::from_str(&text)?;
        assert_eq!(value["estimated"], 2);
        assert_eq!(value["size"], 2);
        assert_eq!(value["query"], "Query(apple@1)");
        assert_eq!(value["matches"][0]["rank"], 1);
        assert!(value["matches"][0]["data"].as_str().unwrap().ends_with("apple"));
        assert!(value.get("facets").is_none());
        Ok(())
    }

    #[test]
    fn test_jsonl_output() -> Result<()> {
        let text = render(OutputFormat::JsonL, &Query::term_at("red", 1), None)?;
        let lines: Vec<serde_json::Value> = text
            .lines()
            .map(serde_json::from_str)
            .collect::<std::result::Result<_, _>>()?;
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0]["rank"], 1);
        assert_eq!(lines[2]["_metadata"]["estimated"], 2);
        Ok(())
    }
}

//! Markdown views over stored topics, as returned by resource reads.

use std::cmp::Reverse;
use std::fmt::Write;

use chrono::NaiveDate;
use serde_json::Value;

use crate::domain::{Source, TopicStore};
use crate::topic::TopicKey;

const SUMMARY_PREVIEW_CHARS: usize = 500;

pub fn papers_markdown(key: &TopicKey, store: &TopicStore) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Papers on {}\n", key.title());
    let _ = writeln!(out, "Total papers: {}\n", store.len());

    for (id, paper) in store {
        let authors = paper
            .get("authors")
            .and_then(Value::as_array)
            .map(|authors| {
                authors
                    .iter()
                    .filter_map(Value::as_str)
                    .collect::<Vec<_>>()
                    .join(", ")
            })
            .unwrap_or_default();
        let pdf_url = field(paper, "pdf_url");

        let _ = writeln!(out, "## {}", field_or(paper, "title", "Untitled"));
        let _ = writeln!(out, "- **Paper ID**: {id}");
        let _ = writeln!(out, "- **Authors**: {authors}");
        let _ = writeln!(out, "- **Published**: {}", field(paper, "published"));
        let _ = writeln!(out, "- **PDF URL**: [{pdf_url}]({pdf_url})\n");
        let _ = writeln!(out, "### Summary\n{}\n", preview(field(paper, "summary")));
        out.push_str("---\n\n");
    }
    out
}

pub fn fda_markdown(key: &TopicKey, store: &TopicStore) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# FDA {} Information\n", key.title());
    let _ = writeln!(out, "Total entries: {}\n", store.len());

    let mut entries = store.iter().collect::<Vec<_>>();
    entries.sort_by_key(|(_, doc)| Reverse(parse_date(field(doc, "date"))));

    for (id, doc) in entries {
        let doc_type = field(doc, "type");
        match doc_type {
            "recall" | "food" => {
                let info = doc.get("product_info").unwrap_or(&Value::Null);
                let _ = writeln!(
                    out,
                    "## {} by {}",
                    field_or(info, "product_name", "Unknown Product"),
                    field_or(info, "company_name", "Unknown Company")
                );
                let _ = writeln!(out, "- **Recall Date**: {}", field(doc, "date"));
                let _ = writeln!(
                    out,
                    "- **Recall Class**: {}",
                    field_or(info, "recall_classification", "Not specified")
                );
                let _ = writeln!(
                    out,
                    "- **Distribution**: {}",
                    field_or(info, "distribution_pattern", "Not specified")
                );
            }
            "drug" => {
                let info = doc.get("drug_info").unwrap_or(&Value::Null);
                let _ = writeln!(
                    out,
                    "## {}",
                    field_or(info, "drug_name", field_or(doc, "title", id))
                );
                let _ = writeln!(out, "- **Date**: {}", field(doc, "date"));
                let _ = writeln!(
                    out,
                    "- **Manufacturer**: {}",
                    field_or(info, "manufacturer", "Not specified")
                );
                let _ = writeln!(
                    out,
                    "- **Dosage Form**: {}",
                    field_or(info, "dosage_form", "Not specified")
                );
                let _ = writeln!(out, "- **Route**: {}", field_or(info, "route", "Not specified"));
            }
            "clinical" => {
                let info = doc.get("clinical_info").unwrap_or(&Value::Null);
                let _ = writeln!(out, "## {}", field_or(doc, "title", id));
                let _ = writeln!(out, "- **Date**: {}", field(doc, "date"));
                let _ = writeln!(out, "- **Serious**: {}", field_or(info, "serious", "Not specified"));
                let _ = writeln!(out, "- **Sponsor**: {}", field_or(info, "sponsor", "Not specified"));
            }
            _ => {
                let _ = writeln!(out, "## {}", field_or(doc, "title", id));
                let _ = writeln!(out, "- **Date**: {}", field_or(doc, "date", "Unknown"));
            }
        }
        let _ = writeln!(out, "- **Entry ID**: {id}");
        let url = field(doc, "url");
        if !url.is_empty() {
            let _ = writeln!(out, "- **URL**: [{url}]({url})");
        }
        out.push('\n');

        let summary = field(doc, "summary");
        if !summary.is_empty() {
            let _ = writeln!(out, "### Summary\n{summary}\n");
        }
        if doc_type == "clinical" {
            let info = doc.get("clinical_info").unwrap_or(&Value::Null);
            list_section(&mut out, "Conditions", info.get("conditions"));
            list_section(&mut out, "Interventions", info.get("interventions"));
        }
        out.push_str("---\n\n");
    }
    out
}

pub fn topics_markdown(source: Source, topics: &[TopicKey]) -> String {
    let heading = match source {
        Source::Papers => "# Available Topics",
        Source::Fda => "# Available FDA Topics",
    };
    let mut out = format!("{heading}\n\n");
    if topics.is_empty() {
        out.push_str(match source {
            Source::Papers => "No topics found.\n",
            Source::Fda => "No FDA topics found. Try searching for FDA information first.\n",
        });
        return out;
    }
    for topic in topics {
        let _ = writeln!(out, "- {topic}");
    }
    let _ = writeln!(
        out,
        "\nRead a topic with `{}://<topic>`.",
        source.scheme()
    );
    out
}

pub fn missing_markdown(source: Source, topic: &str) -> String {
    match source {
        Source::Papers => format!(
            "# No papers found for topic: {topic}\n\nTry searching for papers on this topic first."
        ),
        Source::Fda => format!(
            "# No FDA documents found for {topic}\n\nTry searching for FDA documents first using search_fda('{topic}')"
        ),
    }
}

pub fn unavailable_markdown(source: Source, topic: &str, reason: &str) -> String {
    match source {
        Source::Papers => format!("# Error reading papers data for {topic}\n\n{reason}"),
        Source::Fda => format!("# Error reading FDA data for {topic}\n\n{reason}"),
    }
}

fn list_section(out: &mut String, heading: &str, items: Option<&Value>) {
    let items = items
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_str).collect::<Vec<_>>())
        .unwrap_or_default();
    if items.is_empty() {
        return;
    }
    let _ = writeln!(out, "### {heading}");
    for item in items {
        let _ = writeln!(out, "- {item}");
    }
    out.push('\n');
}

fn field<'a>(value: &'a Value, name: &str) -> &'a str {
    value.get(name).and_then(Value::as_str).unwrap_or("")
}

fn field_or<'a>(value: &'a Value, name: &str, fallback: &'a str) -> &'a str {
    match field(value, name) {
        "" => fallback,
        text => text,
    }
}

fn preview(summary: &str) -> String {
    let mut chars = summary.chars();
    let head = chars.by_ref().take(SUMMARY_PREVIEW_CHARS).collect::<String>();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%m/%d/%Y"))
        .or_else(|_| NaiveDate::parse_from_str(raw, "%Y%m%d"))
        .ok()
}

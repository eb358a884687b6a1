use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use reqwest::blocking::Client;
use tracing::debug;

use crate::domain::{Paper, Record};
use crate::error::ResearchError;
use crate::http::{build_client, send_with_retries};

const ARXIV_QUERY_URL: &str = "https://export.arxiv.org/api/query";

static ENTRY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<entry\b[^>]*>(.*?)</entry>").unwrap());
static ID_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<id>(.*?)</id>").unwrap());
static TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<title\b[^>]*>(.*?)</title>").unwrap());
static SUMMARY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<summary\b[^>]*>(.*?)</summary>").unwrap());
static PUBLISHED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<published>(.*?)</published>").unwrap());
static AUTHOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<author\b[^>]*>.*?<name>(.*?)</name>.*?</author>").unwrap());
static LINK_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<link\b[^>]*>").unwrap());
static HREF_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"\bhref="([^"]*)""#).unwrap());

/// Fetches papers for a free-text query, most relevant first.
pub trait PaperSource: Send + Sync {
    fn search(&self, query: &str, max_results: usize) -> Result<Vec<Record>, ResearchError>;
}

#[derive(Clone)]
pub struct ArxivHttpClient {
    client: Client,
    base_url: String,
}

impl ArxivHttpClient {
    pub fn new(timeout: Duration) -> Result<Self, ResearchError> {
        let client = build_client("application/atom+xml", timeout)
            .map_err(|err| ResearchError::ArxivHttp(err.to_string()))?;
        Ok(Self {
            client,
            base_url: ARXIV_QUERY_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

impl PaperSource for ArxivHttpClient {
    fn search(&self, query: &str, max_results: usize) -> Result<Vec<Record>, ResearchError> {
        let max_results = max_results.to_string();
        let search_query = search_query(query);
        let response = send_with_retries(
            || {
                self.client.get(&self.base_url).query(&[
                    ("search_query", search_query.as_str()),
                    ("start", "0"),
                    ("max_results", max_results.as_str()),
                    ("sortBy", "relevance"),
                    ("sortOrder", "descending"),
                ])
            },
            "arxiv",
        )
        .map_err(|err| ResearchError::ArxivHttp(err.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "arXiv request failed".to_string());
            return Err(ResearchError::ArxivStatus { status, message });
        }
        let body = response
            .text()
            .map_err(|err| ResearchError::ArxivHttp(err.to_string()))?;
        let records = parse_feed(&body)?;
        debug!(query, found = records.len(), "arxiv feed parsed");
        Ok(records)
    }
}

/// Parses an arXiv Atom response into paper records in feed order.
pub fn parse_feed(xml: &str) -> Result<Vec<Record>, ResearchError> {
    if !xml.contains("<feed") {
        return Err(ResearchError::ArxivFeed(
            "response is not an Atom feed".to_string(),
        ));
    }

    let mut records = Vec::new();
    for entry in ENTRY_RE.captures_iter(xml) {
        let block = &entry[1];
        let id_url = capture_text(&ID_RE, block)
            .ok_or_else(|| ResearchError::ArxivFeed("entry without <id>".to_string()))?;
        if id_url.contains("/api/errors") {
            let message = capture_text(&SUMMARY_RE, block).unwrap_or(id_url);
            return Err(ResearchError::ArxivFeed(message));
        }

        let short_id = short_id(&id_url);
        let pdf_url = pdf_link(block).unwrap_or_else(|| id_url.replacen("/abs/", "/pdf/", 1));
        let published = capture_text(&PUBLISHED_RE, block)
            .map(|value| date_part(&value))
            .unwrap_or_default();
        let paper = Paper {
            title: capture_text(&TITLE_RE, block).unwrap_or_default(),
            authors: AUTHOR_RE
                .captures_iter(block)
                .map(|caps| collapse_whitespace(&decode_entities(&caps[1])))
                .collect(),
            summary: capture_text(&SUMMARY_RE, block).unwrap_or_default(),
            pdf_url,
            published,
        };
        records.push(Record::paper(short_id, paper));
    }
    Ok(records)
}

/// Plain text searches every field; queries that already name a field
/// (`ti:`, `au:`, `cat:`) pass through.
fn search_query(query: &str) -> String {
    if query.contains(':') {
        query.to_string()
    } else {
        format!("all:{query}")
    }
}

/// `http://arxiv.org/abs/2401.01234v2` becomes `2401.01234v2`; old-style
/// ids keep their archive prefix (`hep-th/9901001v1`).
pub fn short_id(id_url: &str) -> String {
    match id_url.split_once("arxiv.org/abs/") {
        Some((_, rest)) => rest.to_string(),
        None => id_url.rsplit('/').next().unwrap_or(id_url).to_string(),
    }
}

fn pdf_link(block: &str) -> Option<String> {
    LINK_RE
        .find_iter(block)
        .map(|link| link.as_str())
        .find(|link| link.contains(r#"title="pdf""#))
        .and_then(|link| HREF_RE.captures(link))
        .map(|caps| decode_entities(&caps[1]))
}

fn date_part(timestamp: &str) -> String {
    chrono::DateTime::parse_from_rfc3339(timestamp)
        .map(|value| value.date_naive().to_string())
        .unwrap_or_else(|_| timestamp.chars().take(10).collect())
}

fn capture_text(regex: &Regex, block: &str) -> Option<String> {
    regex
        .captures(block)
        .map(|caps| collapse_whitespace(&decode_entities(&caps[1])))
}

fn collapse_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn decode_entities(value: &str) -> String {
    value
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

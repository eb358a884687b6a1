use std::time::Duration;

use assert_matches::assert_matches;

use research_store::arxiv::{ArxivHttpClient, PaperSource, parse_feed};
use research_store::domain::RecordPayload;
use research_store::error::ResearchError;

const FEED: &str = include_str!("fixtures/arxiv_query.xml");

#[test]
fn parses_entries_in_feed_order() {
    let records = parse_feed(FEED).unwrap();
    let ids: Vec<&str> = records.iter().map(|record| record.id.as_str()).collect();
    assert_eq!(ids, vec!["2401.01234v2", "quant-ph/9901001v1"]);
}

#[test]
fn paper_attributes_are_cleaned() {
    let records = parse_feed(FEED).unwrap();
    let RecordPayload::Paper(paper) = &records[0].payload else {
        panic!("expected a paper payload");
    };
    assert_eq!(paper.title, "Error Mitigation for Near-Term Quantum Computing");
    assert_eq!(
        paper.summary,
        "We study error mitigation & noise suppression on near-term devices."
    );
    assert_eq!(paper.authors, vec!["Ada Lovelace", "Alan Turing"]);
    assert_eq!(paper.pdf_url, "http://arxiv.org/pdf/2401.01234v2");
    assert_eq!(paper.published, "2024-01-02");
}

#[test]
fn pdf_url_falls_back_to_abstract_link() {
    let records = parse_feed(FEED).unwrap();
    let RecordPayload::Paper(paper) = &records[1].payload else {
        panic!("expected a paper payload");
    };
    assert_eq!(paper.pdf_url, "http://arxiv.org/pdf/quant-ph/9901001v1");
    assert_eq!(paper.authors, vec!["Grace Hopper"]);
}

#[test]
fn feed_without_entries_is_empty() {
    let feed = r#"<?xml version="1.0"?><feed xmlns="http://www.w3.org/2005/Atom"><title>empty</title></feed>"#;
    assert!(parse_feed(feed).unwrap().is_empty());
}

#[test]
fn api_error_entries_fail() {
    let feed = r#"<feed xmlns="http://www.w3.org/2005/Atom">
      <entry>
        <id>http://arxiv.org/api/errors#incorrect_id_format_for_1234</id>
        <title>Error</title>
        <summary>incorrect id format for 1234</summary>
      </entry>
    </feed>"#;
    assert_matches!(
        parse_feed(feed),
        Err(ResearchError::ArxivFeed(message)) if message == "incorrect id format for 1234"
    );
}

#[test]
fn non_feed_bodies_fail() {
    assert_matches!(
        parse_feed("<html><body>Service Unavailable</body></html>"),
        Err(ResearchError::ArxivFeed(_))
    );
}

#[test]
#[ignore]
fn search_live_arxiv() {
    let client = ArxivHttpClient::new(Duration::from_secs(30)).unwrap();
    let records = client.search("quantum error correction", 2).unwrap();
    assert!(!records.is_empty());
    assert!(records.len() <= 2);
}

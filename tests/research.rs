use std::fs;
use std::sync::{Arc, Mutex};

use assert_matches::assert_matches;
use camino::Utf8PathBuf;
use serde_json::{Map, Value, json};

use research_store::app::{Research, ResultLimits, TopicRead};
use research_store::arxiv::PaperSource;
use research_store::domain::{FdaCategory, Paper, Record, Source};
use research_store::error::ResearchError;
use research_store::openfda::{FdaQuery, FdaSource};
use research_store::store::RecordStore;
use research_store::topic::TopicKey;

#[derive(Default)]
struct MockPapers {
    batches: Mutex<Vec<Vec<Record>>>,
    queries: Arc<Mutex<Vec<(String, usize)>>>,
    fail: bool,
}

impl MockPapers {
    fn with_batches(batches: Vec<Vec<Record>>) -> Self {
        Self {
            batches: Mutex::new(batches),
            ..Self::default()
        }
    }

    fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }
}

impl PaperSource for MockPapers {
    fn search(&self, query: &str, max_results: usize) -> Result<Vec<Record>, ResearchError> {
        self.queries
            .lock()
            .unwrap()
            .push((query.to_string(), max_results));
        if self.fail {
            return Err(ResearchError::ArxivStatus {
                status: 503,
                message: "unavailable".to_string(),
            });
        }
        let mut batches = self.batches.lock().unwrap();
        if batches.is_empty() {
            return Ok(Vec::new());
        }
        Ok(batches.remove(0))
    }
}

#[derive(Default)]
struct MockFda {
    records: Vec<Record>,
    calls: Arc<Mutex<Vec<(FdaCategory, FdaQuery)>>>,
    fail: bool,
}

impl FdaSource for MockFda {
    fn search(&self, category: FdaCategory, query: &FdaQuery) -> Result<Vec<Record>, ResearchError> {
        self.calls.lock().unwrap().push((category, query.clone()));
        if self.fail {
            return Err(ResearchError::OpenFdaHttp("connection reset".to_string()));
        }
        Ok(self.records.clone())
    }
}

fn paper(id: &str, title: &str) -> Record {
    Record::paper(
        id,
        Paper {
            title: title.to_string(),
            authors: vec!["Ada Lovelace".to_string()],
            summary: format!("About {title}."),
            pdf_url: format!("http://arxiv.org/pdf/{id}"),
            published: "2024-01-02".to_string(),
        },
    )
}

fn fda_entry(id: &str, name: &str) -> Record {
    let mut attributes = Map::new();
    attributes.insert("id".to_string(), json!(id));
    attributes.insert("title".to_string(), json!(name));
    attributes.insert("type".to_string(), json!("drug"));
    attributes.insert("date".to_string(), json!("2024-02-10"));
    Record::fda(id, Some(FdaCategory::Drugs), attributes)
}

fn research(
    temp: &tempfile::TempDir,
    papers: MockPapers,
    fda: MockFda,
) -> Research<MockPapers, MockFda> {
    let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
    Research::with_stores(
        RecordStore::new(root.join("papers"), Source::Papers.document_name()),
        RecordStore::new(root.join("fda_data"), Source::Fda.document_name()),
        papers,
        fda,
        ResultLimits {
            default_max_results: 5,
            max_results_limit: 20,
        },
    )
}

fn papers_document(temp: &tempfile::TempDir, key: &str) -> std::path::PathBuf {
    temp.path().join("papers").join(key).join("papers_info.json")
}

#[test]
fn search_papers_returns_only_the_current_batch() {
    let temp = tempfile::tempdir().unwrap();
    let papers = MockPapers::with_batches(vec![
        vec![paper("2401.00001v1", "One"), paper("2401.00002v1", "Two")],
        vec![paper("2401.00003v1", "Three")],
    ]);
    let app = research(&temp, papers, MockFda::default());

    let first = app.search_papers("Machine Learning", 2).unwrap();
    assert_eq!(first, vec!["2401.00001v1", "2401.00002v1"]);
    let second = app.search_papers("machine  learning", 2).unwrap();
    assert_eq!(second, vec!["2401.00003v1"]);

    let stored: Value =
        serde_json::from_str(&fs::read_to_string(papers_document(&temp, "machine_learning")).unwrap())
            .unwrap();
    let stored = stored.as_object().unwrap();
    assert_eq!(stored.len(), 3);
    assert_eq!(stored["2401.00003v1"]["title"], "Three");
    assert_eq!(
        stored["2401.00001v1"]["authors"],
        json!(["Ada Lovelace"])
    );
}

#[test]
fn search_papers_passes_trimmed_topic_and_limit() {
    let temp = tempfile::tempdir().unwrap();
    let papers = MockPapers::default();
    let queries = Arc::clone(&papers.queries);
    let app = research(&temp, papers, MockFda::default());

    app.search_papers("  quantum computing ", 7).unwrap();
    assert_eq!(
        *queries.lock().unwrap(),
        vec![("quantum computing".to_string(), 7)]
    );
}

#[test]
fn upstream_failure_writes_nothing() {
    let temp = tempfile::tempdir().unwrap();
    let app = research(&temp, MockPapers::failing(), MockFda::default());

    let result = app.search_papers("quantum computing", 5);
    assert_matches!(result, Err(ResearchError::ArxivStatus { status: 503, .. }));
    assert!(!papers_document(&temp, "quantum_computing").exists());
    assert!(!temp.path().join("papers").join("quantum_computing").exists());
}

#[test]
fn empty_batch_leaves_store_untouched() {
    let temp = tempfile::tempdir().unwrap();
    let app = research(&temp, MockPapers::default(), MockFda::default());

    let ids = app.search_papers("obscure topic", 5).unwrap();
    assert!(ids.is_empty());
    assert!(!papers_document(&temp, "obscure_topic").exists());
}

#[test]
fn invalid_inputs_fail_before_fetching() {
    let temp = tempfile::tempdir().unwrap();
    let app = research(&temp, MockPapers::failing(), MockFda::default());

    assert_matches!(
        app.search_papers("!!!", 5),
        Err(ResearchError::InvalidTopic(_))
    );
    assert_matches!(
        app.search_papers("topic", 0),
        Err(ResearchError::InvalidMaxResults { value: 0, limit: 20 })
    );
    assert_matches!(
        app.search_papers("topic", 21),
        Err(ResearchError::InvalidMaxResults { value: 21, .. })
    );
    assert_matches!(
        app.search_fda(FdaCategory::Drugs, FdaQuery::new(0)),
        Err(ResearchError::InvalidMaxResults { .. })
    );
}

#[test]
fn search_fda_stores_under_the_category() {
    let temp = tempfile::tempdir().unwrap();
    let fda = MockFda {
        records: vec![fda_entry("E001", "DrugA"), fda_entry("E002", "DrugB")],
        ..MockFda::default()
    };
    let calls = Arc::clone(&fda.calls);
    let app = research(&temp, MockPapers::default(), fda);

    let ids = app
        .search_fda(FdaCategory::Drugs, FdaQuery::new(2).with_query("aspirin"))
        .unwrap();
    assert_eq!(ids, vec!["E001", "E002"]);
    assert_eq!(
        *calls.lock().unwrap(),
        vec![(FdaCategory::Drugs, FdaQuery::new(2).with_query("aspirin"))]
    );

    match app.read_fda("drugs") {
        TopicRead::Found { topic, records } => {
            assert_eq!(topic.as_str(), "drugs");
            assert_eq!(records.len(), 2);
            assert_eq!(records["E002"]["title"], "DrugB");
        }
        other => panic!("unexpected read: {other:?}"),
    }
    // The singular alias reads the same store.
    assert_matches!(app.read_fda("Drug"), TopicRead::Found { .. });
}

#[test]
fn search_fda_failure_is_an_error() {
    let temp = tempfile::tempdir().unwrap();
    let fda = MockFda {
        fail: true,
        ..MockFda::default()
    };
    let app = research(&temp, MockPapers::default(), fda);

    assert_matches!(
        app.search_fda(FdaCategory::Recalls, FdaQuery::new(5)),
        Err(ResearchError::OpenFdaHttp(_))
    );
    assert!(!temp.path().join("fda_data").join("recalls").exists());
}

#[test]
fn read_reports_missing_topics() {
    let temp = tempfile::tempdir().unwrap();
    let app = research(&temp, MockPapers::default(), MockFda::default());

    assert_matches!(
        app.read_papers("Never Searched"),
        TopicRead::Missing { topic } if topic == "never_searched"
    );
    let text = app.read_fda("food").render(Source::Fda);
    assert!(text.contains("No FDA documents found for food"));
}

#[test]
fn read_reports_corrupt_topics_without_failing() {
    let temp = tempfile::tempdir().unwrap();
    let path = papers_document(&temp, "broken");
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, "not json").unwrap();
    let app = research(&temp, MockPapers::default(), MockFda::default());

    let read = app.read_papers("broken");
    assert_matches!(&read, TopicRead::Unavailable { reason, .. } if reason.contains("corrupted"));
    assert!(read.render(Source::Papers).starts_with("# Error reading papers data for broken"));
    assert_eq!(fs::read_to_string(&path).unwrap(), "not json");
}

#[test]
fn read_rejects_unusable_topic_names() {
    let temp = tempfile::tempdir().unwrap();
    let app = research(&temp, MockPapers::default(), MockFda::default());

    assert_matches!(app.read_papers("???"), TopicRead::Unavailable { .. });
}

#[test]
fn read_renders_stored_papers() {
    let temp = tempfile::tempdir().unwrap();
    let papers = MockPapers::with_batches(vec![vec![paper("2401.00001v1", "Sparse Attention")]]);
    let app = research(&temp, papers, MockFda::default());
    app.search_papers("transformers", 5).unwrap();

    let text = app.read_papers("Transformers").render(Source::Papers);
    assert!(text.starts_with("# Papers on Transformers"));
    assert!(text.contains("Total papers: 1"));
    assert!(text.contains("## Sparse Attention"));
    assert!(text.contains("- **Paper ID**: 2401.00001v1"));
}

#[test]
fn save_fda_data_derives_missing_ids() {
    let temp = tempfile::tempdir().unwrap();
    let app = research(&temp, MockPapers::default(), MockFda::default());

    let ids = app
        .save_fda_data(
            "Device Alerts",
            vec![
                json!({"id": "X-1", "title": "Pump"}),
                json!({"title": "Stent"}),
            ],
        )
        .unwrap();
    assert_eq!(ids.len(), 2);
    assert_eq!(ids[0], "X-1");
    assert!(ids[1].starts_with("device_alerts_2_"), "{}", ids[1]);

    let key = TopicKey::normalize("device alerts").unwrap();
    let stored = app.store(Source::Fda).load(&key).unwrap();
    assert_eq!(stored["X-1"]["type"], "device_alerts");
    assert_eq!(stored[&ids[1]]["id"], ids[1].as_str());
    assert!(stored[&ids[1]]["retrieved_date"].is_string());
}

#[test]
fn save_fda_data_into_a_category_uses_its_doc_type() {
    let temp = tempfile::tempdir().unwrap();
    let app = research(&temp, MockPapers::default(), MockFda::default());

    let ids = app
        .save_fda_data("recall", vec![json!({"id": "F-1", "type": "custom"}), json!({})])
        .unwrap();
    assert!(ids[1].starts_with("recalls_2_"));

    let stored = app
        .store(Source::Fda)
        .load(&FdaCategory::Recalls.topic_key())
        .unwrap();
    assert_eq!(stored["F-1"]["type"], "custom");
    assert_eq!(stored[&ids[1]]["type"], "recall");
}

#[test]
fn save_fda_data_rejects_non_objects() {
    let temp = tempfile::tempdir().unwrap();
    let app = research(&temp, MockPapers::default(), MockFda::default());

    assert_matches!(
        app.save_fda_data("food", vec![json!({"id": "A"}), json!("text")]),
        Err(ResearchError::InvalidDocument(_))
    );
    assert!(!temp.path().join("fda_data").join("food").exists());
    assert_eq!(app.save_fda_data("food", Vec::new()).unwrap(), Vec::<String>::new());
}

#[test]
fn extract_info_searches_every_topic() {
    let temp = tempfile::tempdir().unwrap();
    let papers = MockPapers::with_batches(vec![
        vec![paper("2401.00001v1", "One")],
        vec![paper("2401.00002v1", "Two")],
    ]);
    let app = research(&temp, papers, MockFda::default());
    app.search_papers("alpha", 5).unwrap();
    app.search_papers("beta", 5).unwrap();

    let corrupt = papers_document(&temp, "corrupt");
    fs::create_dir_all(corrupt.parent().unwrap()).unwrap();
    fs::write(&corrupt, "{").unwrap();

    let found = app.extract_info("2401.00002v1").unwrap().unwrap();
    assert_eq!(found["title"], "Two");
    assert!(app.extract_info("9999.99999v9").unwrap().is_none());
}

#[test]
fn list_topics_per_source() {
    let temp = tempfile::tempdir().unwrap();
    let papers = MockPapers::with_batches(vec![vec![paper("2401.00001v1", "One")]]);
    let fda = MockFda {
        records: vec![fda_entry("E001", "DrugA")],
        ..MockFda::default()
    };
    let app = research(&temp, papers, fda);
    app.search_papers("Graph Neural Networks", 5).unwrap();
    app.search_fda(FdaCategory::Drugs, FdaQuery::new(5)).unwrap();

    let paper_topics = app.list_topics(Source::Papers).unwrap();
    assert_eq!(paper_topics.len(), 1);
    assert_eq!(paper_topics[0].as_str(), "graph_neural_networks");
    let fda_topics = app.list_topics(Source::Fda).unwrap();
    assert_eq!(fda_topics, vec![FdaCategory::Drugs.topic_key()]);
}

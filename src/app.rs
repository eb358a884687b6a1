use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::arxiv::PaperSource;
use crate::config::ResolvedConfig;
use crate::domain::{FdaCategory, Record, Source, TopicStore};
use crate::error::ResearchError;
use crate::openfda::{FdaQuery, FdaSource, derived_id};
use crate::render;
use crate::store::RecordStore;
use crate::topic::TopicKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResultLimits {
    pub default_max_results: usize,
    pub max_results_limit: usize,
}

impl ResultLimits {
    pub fn check(&self, max_results: usize) -> Result<usize, ResearchError> {
        if max_results == 0 || max_results > self.max_results_limit {
            return Err(ResearchError::InvalidMaxResults {
                value: max_results,
                limit: self.max_results_limit,
            });
        }
        Ok(max_results)
    }
}

/// Outcome of reading a stored topic. Reads never fail: anything that keeps
/// the topic from being shown becomes `Unavailable` with a readable reason.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TopicRead {
    Found { topic: TopicKey, records: TopicStore },
    Missing { topic: String },
    Unavailable { topic: String, reason: String },
}

impl TopicRead {
    pub fn render(&self, source: Source) -> String {
        match self {
            TopicRead::Found { topic, records } => match source {
                Source::Papers => render::papers_markdown(topic, records),
                Source::Fda => render::fda_markdown(topic, records),
            },
            TopicRead::Missing { topic } => render::missing_markdown(source, topic),
            TopicRead::Unavailable { topic, reason } => {
                render::unavailable_markdown(source, topic, reason)
            }
        }
    }
}

/// Search and read operations over the paper and FDA stores.
pub struct Research<P: PaperSource, F: FdaSource> {
    papers: RecordStore,
    fda: RecordStore,
    paper_source: P,
    fda_source: F,
    limits: ResultLimits,
}

impl<P: PaperSource, F: FdaSource> Research<P, F> {
    pub fn new(config: &ResolvedConfig, paper_source: P, fda_source: F) -> Self {
        Self::with_stores(
            RecordStore::new(config.papers_dir.clone(), Source::Papers.document_name()),
            RecordStore::new(config.fda_dir.clone(), Source::Fda.document_name()),
            paper_source,
            fda_source,
            ResultLimits {
                default_max_results: config.default_max_results,
                max_results_limit: config.max_results_limit,
            },
        )
    }

    pub fn with_stores(
        papers: RecordStore,
        fda: RecordStore,
        paper_source: P,
        fda_source: F,
        limits: ResultLimits,
    ) -> Self {
        Self {
            papers,
            fda,
            paper_source,
            fda_source,
            limits,
        }
    }

    pub fn limits(&self) -> ResultLimits {
        self.limits
    }

    pub fn store(&self, source: Source) -> &RecordStore {
        match source {
            Source::Papers => &self.papers,
            Source::Fda => &self.fda,
        }
    }

    /// Fetches papers for `topic` and merges them into its store. Returns the
    /// identifiers of this batch only, in relevance order.
    pub fn search_papers(
        &self,
        topic: &str,
        max_results: usize,
    ) -> Result<Vec<String>, ResearchError> {
        let max_results = self.limits.check(max_results)?;
        let key = TopicKey::normalize(topic)?;
        let records = self.paper_source.search(topic.trim(), max_results)?;
        info!(topic = key.as_str(), fetched = records.len(), "paper search finished");
        persist_batch(&self.papers, &key, records)
    }

    /// Fetches the newest entries of an FDA category and merges them into the
    /// category's store.
    pub fn search_fda(
        &self,
        category: FdaCategory,
        query: FdaQuery,
    ) -> Result<Vec<String>, ResearchError> {
        self.limits.check(query.max_results)?;
        let key = category.topic_key();
        let records = self.fda_source.search(category, &query)?;
        info!(
            category = category.as_str(),
            fetched = records.len(),
            "fda search finished"
        );
        persist_batch(&self.fda, &key, records)
    }

    /// Merges caller-supplied FDA documents into `topic`. Documents without an
    /// `id` get `{topic}_{position}_{YYYYMMDD}`.
    pub fn save_fda_data(
        &self,
        topic: &str,
        documents: Vec<Value>,
    ) -> Result<Vec<String>, ResearchError> {
        let category = FdaCategory::from_alias(topic);
        let key = match category {
            Some(category) => category.topic_key(),
            None => TopicKey::normalize(topic)?,
        };
        let doc_type = category.map(|c| c.doc_type()).unwrap_or(key.as_str());
        let today = chrono::Local::now().date_naive();

        let mut records = Vec::with_capacity(documents.len());
        for (idx, document) in documents.into_iter().enumerate() {
            let Value::Object(mut attributes) = document else {
                return Err(ResearchError::InvalidDocument(format!(
                    "entry {} is not a JSON object",
                    idx + 1
                )));
            };
            let id = match attributes.get("id") {
                Some(Value::String(id)) if !id.trim().is_empty() => id.trim().to_string(),
                Some(Value::Number(id)) => id.to_string(),
                _ => derived_id(key.as_str(), idx + 1, today),
            };
            attributes.insert("id".to_string(), Value::String(id.clone()));
            attributes
                .entry("type")
                .or_insert_with(|| Value::String(doc_type.to_string()));
            attributes
                .entry("retrieved_date")
                .or_insert_with(|| Value::String(today.format("%Y-%m-%d").to_string()));
            records.push(Record::fda(id, category, attributes));
        }
        persist_batch(&self.fda, &key, records)
    }

    pub fn read_papers(&self, topic: &str) -> TopicRead {
        match TopicKey::normalize(topic) {
            Ok(key) => read_topic(&self.papers, key),
            Err(err) => TopicRead::Unavailable {
                topic: topic.to_string(),
                reason: err.to_string(),
            },
        }
    }

    /// Reads an FDA topic; category names and their singular forms
    /// ("drug", "recall") resolve to the category store.
    pub fn read_fda(&self, topic: &str) -> TopicRead {
        let key = match FdaCategory::from_alias(topic) {
            Some(category) => Ok(category.topic_key()),
            None => TopicKey::normalize(topic),
        };
        match key {
            Ok(key) => read_topic(&self.fda, key),
            Err(err) => TopicRead::Unavailable {
                topic: topic.to_string(),
                reason: err.to_string(),
            },
        }
    }

    /// Looks a paper up across every stored topic. Topics whose document
    /// cannot be read are skipped.
    pub fn extract_info(&self, paper_id: &str) -> Result<Option<Value>, ResearchError> {
        let paper_id = paper_id.trim();
        for key in self.papers.topics()? {
            match self.papers.load(&key) {
                Ok(mut store) => {
                    if let Some(paper) = store.remove(paper_id) {
                        return Ok(Some(paper));
                    }
                }
                Err(err) => warn!(topic = key.as_str(), error = %err, "skipping unreadable topic"),
            }
        }
        Ok(None)
    }

    pub fn list_topics(&self, source: Source) -> Result<Vec<TopicKey>, ResearchError> {
        self.store(source).topics()
    }
}

fn persist_batch(
    store: &RecordStore,
    key: &TopicKey,
    records: Vec<Record>,
) -> Result<Vec<String>, ResearchError> {
    if records.is_empty() {
        info!(topic = key.as_str(), "empty batch, store left unchanged");
        return Ok(Vec::new());
    }
    let mut ids = Vec::with_capacity(records.len());
    for record in &records {
        if !ids.contains(&record.id) {
            ids.push(record.id.clone());
        }
    }
    store.merge_and_save(key, records)?;
    Ok(ids)
}

fn read_topic(store: &RecordStore, key: TopicKey) -> TopicRead {
    if !store.exists(&key) {
        return TopicRead::Missing {
            topic: key.to_string(),
        };
    }
    match store.load(&key) {
        Ok(records) => TopicRead::Found {
            topic: key,
            records,
        },
        Err(err) => {
            warn!(topic = key.as_str(), error = %err, "topic store unavailable");
            let reason = match &err {
                ResearchError::CorruptStore { .. } => {
                    format!("The stored data file is corrupted and was left untouched ({err}).")
                }
                _ => err.to_string(),
            };
            TopicRead::Unavailable {
                topic: key.to_string(),
                reason,
            }
        }
    }
}

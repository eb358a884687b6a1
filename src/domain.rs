use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ResearchError;
use crate::topic::TopicKey;

/// Everything stored for one topic, keyed by record identifier.
pub type TopicStore = BTreeMap<String, Value>;

/// Attribute set of one arXiv paper as written to `papers_info.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paper {
    pub title: String,
    pub authors: Vec<String>,
    pub summary: String,
    pub pdf_url: String,
    pub published: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FdaCategory {
    Recalls,
    Drugs,
    Food,
    Clinical,
}

impl FdaCategory {
    pub const ALL: [FdaCategory; 4] = [
        FdaCategory::Recalls,
        FdaCategory::Drugs,
        FdaCategory::Food,
        FdaCategory::Clinical,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FdaCategory::Recalls => "recalls",
            FdaCategory::Drugs => "drugs",
            FdaCategory::Food => "food",
            FdaCategory::Clinical => "clinical",
        }
    }

    /// Singular document type recorded in each stored entry.
    pub fn doc_type(&self) -> &'static str {
        match self {
            FdaCategory::Recalls => "recall",
            FdaCategory::Drugs => "drug",
            FdaCategory::Food => "food",
            FdaCategory::Clinical => "clinical",
        }
    }

    pub fn topic_key(&self) -> TopicKey {
        TopicKey::from_normalized(self.as_str())
    }

    /// Accepts both the category name and its document type ("drugs", "drug").
    pub fn from_alias(value: &str) -> Option<Self> {
        let lowered = value.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|category| category.as_str() == lowered || category.doc_type() == lowered)
    }
}

impl fmt::Display for FdaCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for FdaCategory {
    type Err = ResearchError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::from_alias(value).ok_or_else(|| ResearchError::InvalidCategory(value.to_string()))
    }
}

/// Source-specific payload of a fetched record.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordPayload {
    Paper(Paper),
    Fda {
        category: Option<FdaCategory>,
        attributes: Map<String, Value>,
    },
}

/// One fetched item with its source-provided identifier.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub id: String,
    pub payload: RecordPayload,
}

impl Record {
    pub fn paper(id: impl Into<String>, paper: Paper) -> Self {
        Self {
            id: id.into(),
            payload: RecordPayload::Paper(paper),
        }
    }

    pub fn fda(
        id: impl Into<String>,
        category: Option<FdaCategory>,
        attributes: Map<String, Value>,
    ) -> Self {
        Self {
            id: id.into(),
            payload: RecordPayload::Fda {
                category,
                attributes,
            },
        }
    }

    /// The opaque attribute mapping the record store persists.
    pub fn attributes(&self) -> Result<Value, ResearchError> {
        match &self.payload {
            RecordPayload::Paper(paper) => serde_json::to_value(paper)
                .map_err(|err| ResearchError::Filesystem(err.to_string())),
            RecordPayload::Fda { attributes, .. } => Ok(Value::Object(attributes.clone())),
        }
    }
}

/// The two storage partitions, one per upstream source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Papers,
    Fda,
}

impl Source {
    pub fn scheme(&self) -> &'static str {
        match self {
            Source::Papers => "papers",
            Source::Fda => "fda",
        }
    }

    pub fn document_name(&self) -> &'static str {
        match self {
            Source::Papers => "papers_info.json",
            Source::Fda => "fda_info.json",
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;

    #[test]
    fn parse_category_aliases() {
        assert_eq!("drugs".parse::<FdaCategory>().unwrap(), FdaCategory::Drugs);
        assert_eq!("Recall".parse::<FdaCategory>().unwrap(), FdaCategory::Recalls);
        assert_matches!(
            "devices".parse::<FdaCategory>(),
            Err(ResearchError::InvalidCategory(_))
        );
    }

    #[test]
    fn paper_attributes_keep_author_order() {
        let record = Record::paper(
            "2401.00001v1",
            Paper {
                title: "T".to_string(),
                authors: vec!["B".to_string(), "A".to_string()],
                summary: "S".to_string(),
                pdf_url: "http://arxiv.org/pdf/2401.00001v1".to_string(),
                published: "2024-01-01".to_string(),
            },
        );
        let value = record.attributes().unwrap();
        assert_eq!(value["authors"], json!(["B", "A"]));
        assert_eq!(value["published"], json!("2024-01-01"));
    }
}

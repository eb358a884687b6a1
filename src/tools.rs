//! Named tools, resource URIs and prompts exposed to a chatbot orchestration
//! layer. Everything goes in and out as `serde_json` values or text; the
//! transport carrying them is up to the host.

use std::str::FromStr;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::app::Research;
use crate::arxiv::PaperSource;
use crate::domain::{FdaCategory, Source};
use crate::error::ResearchError;
use crate::openfda::{FdaQuery, FdaSource};
use crate::prompts;
use crate::render;

pub const SEARCH_PAPERS: &str = "search_papers";
pub const SEARCH_FDA: &str = "search_fda";
pub const SAVE_FDA_DATA: &str = "save_fda_data";
pub const EXTRACT_INFO: &str = "extract_info";

pub const PAPER_SEARCH_PROMPT: &str = "generate_search_prompt";
pub const FDA_SEARCH_PROMPT: &str = "generate_fda_search_prompt";

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ToolCall {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

#[derive(Debug, Deserialize)]
struct SearchPapersArgs {
    topic: String,
    #[serde(default)]
    max_results: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct SearchFdaArgs {
    #[serde(alias = "topic")]
    category: String,
    #[serde(default)]
    max_results: Option<usize>,
    #[serde(default)]
    query: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SaveFdaArgs {
    topic: String,
    data: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct ExtractInfoArgs {
    paper_id: String,
}

#[derive(Debug, Deserialize)]
struct PaperPromptArgs {
    topic: String,
    #[serde(default)]
    num_papers: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct FdaPromptArgs {
    topic: String,
    #[serde(default)]
    max_results: Option<usize>,
}

/// Runs one tool call. Search tools return the list of identifiers fetched
/// by that call; `extract_info` returns the stored paper or a message.
pub fn call_tool<P: PaperSource, F: FdaSource>(
    research: &Research<P, F>,
    call: &ToolCall,
) -> Result<Value, ResearchError> {
    let default_max = research.limits().default_max_results;
    match call.name.as_str() {
        SEARCH_PAPERS => {
            let args: SearchPapersArgs = arguments(call)?;
            let ids = research.search_papers(&args.topic, args.max_results.unwrap_or(default_max))?;
            Ok(json!(ids))
        }
        SEARCH_FDA => {
            let args: SearchFdaArgs = arguments(call)?;
            let category = FdaCategory::from_str(&args.category)?;
            let mut query = FdaQuery::new(args.max_results.unwrap_or(default_max));
            if let Some(text) = args.query {
                query = query.with_query(text);
            }
            let ids = research.search_fda(category, query)?;
            Ok(json!(ids))
        }
        SAVE_FDA_DATA => {
            let args: SaveFdaArgs = arguments(call)?;
            let ids = research.save_fda_data(&args.topic, args.data)?;
            Ok(json!(ids))
        }
        EXTRACT_INFO => {
            let args: ExtractInfoArgs = arguments(call)?;
            match research.extract_info(&args.paper_id)? {
                Some(paper) => Ok(paper),
                None => Ok(Value::String(format!(
                    "There's no saved information related to paper {}.",
                    args.paper_id
                ))),
            }
        }
        other => Err(ResearchError::UnknownTool(other.to_string())),
    }
}

/// Resource addresses: `papers://folders`, `papers://{topic}`,
/// `fda://folders`, `fda://{topic}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceUri {
    Folders(Source),
    Topic(Source, String),
}

impl FromStr for ResourceUri {
    type Err = ResearchError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (scheme, rest) = value
            .trim()
            .split_once("://")
            .ok_or_else(|| ResearchError::UnknownResource(value.to_string()))?;
        let source = match scheme {
            "papers" => Source::Papers,
            "fda" => Source::Fda,
            _ => return Err(ResearchError::UnknownResource(value.to_string())),
        };
        let topic = decode_topic(rest.trim_end_matches('/'));
        match topic.as_str() {
            "" => Err(ResearchError::UnknownResource(value.to_string())),
            "folders" => Ok(ResourceUri::Folders(source)),
            _ => Ok(ResourceUri::Topic(source, topic)),
        }
    }
}

/// Renders a resource as markdown. Missing or unreadable topics produce an
/// explanatory message rather than an error; only a malformed URI fails.
pub fn read_resource<P: PaperSource, F: FdaSource>(
    research: &Research<P, F>,
    uri: &str,
) -> Result<String, ResearchError> {
    let text = match uri.parse::<ResourceUri>()? {
        ResourceUri::Folders(source) => match research.list_topics(source) {
            Ok(topics) => render::topics_markdown(source, &topics),
            Err(err) => render::unavailable_markdown(source, "folders", &err.to_string()),
        },
        ResourceUri::Topic(Source::Papers, topic) => {
            research.read_papers(&topic).render(Source::Papers)
        }
        ResourceUri::Topic(Source::Fda, topic) => research.read_fda(&topic).render(Source::Fda),
    };
    Ok(text)
}

pub fn get_prompt(name: &str, arguments: &Value, default_max: usize) -> Result<String, ResearchError> {
    match name {
        PAPER_SEARCH_PROMPT => {
            let args: PaperPromptArgs = parse_arguments(name, arguments)?;
            Ok(prompts::paper_search_prompt(
                &args.topic,
                args.num_papers.unwrap_or(default_max),
            ))
        }
        FDA_SEARCH_PROMPT => {
            let args: FdaPromptArgs = parse_arguments(name, arguments)?;
            Ok(prompts::fda_search_prompt(
                &args.topic,
                args.max_results.unwrap_or(default_max),
            ))
        }
        other => Err(ResearchError::UnknownTool(other.to_string())),
    }
}

/// Tool listing with JSON-schema style argument descriptions.
pub fn tool_descriptions(default_max: usize) -> Value {
    json!([
        {
            "name": SEARCH_PAPERS,
            "description": "Search arXiv for papers on a topic and store their information.",
            "input_schema": {
                "type": "object",
                "properties": {
                    "topic": {"type": "string"},
                    "max_results": {"type": "integer", "default": default_max}
                },
                "required": ["topic"]
            }
        },
        {
            "name": SEARCH_FDA,
            "description": "Fetch recent openFDA entries for a category and store them.",
            "input_schema": {
                "type": "object",
                "properties": {
                    "category": {"type": "string", "enum": ["recalls", "drugs", "food", "clinical"]},
                    "max_results": {"type": "integer", "default": default_max},
                    "query": {"type": "string"}
                },
                "required": ["category"]
            }
        },
        {
            "name": SAVE_FDA_DATA,
            "description": "Store caller-supplied FDA documents under a topic.",
            "input_schema": {
                "type": "object",
                "properties": {
                    "topic": {"type": "string"},
                    "data": {"type": "array", "items": {"type": "object"}}
                },
                "required": ["topic", "data"]
            }
        },
        {
            "name": EXTRACT_INFO,
            "description": "Look up a stored paper by its arXiv id across all topics.",
            "input_schema": {
                "type": "object",
                "properties": {"paper_id": {"type": "string"}},
                "required": ["paper_id"]
            }
        }
    ])
}

fn arguments<T: DeserializeOwned>(call: &ToolCall) -> Result<T, ResearchError> {
    parse_arguments(&call.name, &call.arguments)
}

fn parse_arguments<T: DeserializeOwned>(tool: &str, arguments: &Value) -> Result<T, ResearchError> {
    let arguments = match arguments {
        Value::Null => Value::Object(Default::default()),
        other => other.clone(),
    };
    serde_json::from_value(arguments).map_err(|err| ResearchError::InvalidArguments {
        tool: tool.to_string(),
        message: err.to_string(),
    })
}

fn decode_topic(raw: &str) -> String {
    raw.replace("%20", " ").replace('+', " ")
}

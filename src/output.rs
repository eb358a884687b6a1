use std::io::{self, Write};

use serde::Serialize;

use crate::app::TopicRead;
use crate::domain::Source;
use crate::topic::TopicKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub source: Source,
    pub topic: String,
    pub ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TopicsResult {
    pub source: Source,
    pub topics: Vec<TopicKey>,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_search(result: &SearchResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_read(result: &TopicRead) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_topics(result: &TopicsResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_json<T: Serialize + ?Sized>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

pub struct TextOutput;

impl TextOutput {
    pub fn print_search(result: &SearchResult) -> io::Result<()> {
        let mut stdout = io::stdout();
        if result.ids.is_empty() {
            writeln!(stdout, "No {} results for {}", result.source.scheme(), result.topic)?;
            return Ok(());
        }
        writeln!(
            stdout,
            "Fetched {} {} result(s) for {}:",
            result.ids.len(),
            result.source.scheme(),
            result.topic
        )?;
        for id in &result.ids {
            writeln!(stdout, "- {id}")?;
        }
        Ok(())
    }

    pub fn print_markdown(text: &str) -> io::Result<()> {
        let mut stdout = io::stdout();
        stdout.write_all(text.as_bytes())?;
        if !text.ends_with('\n') {
            stdout.write_all(b"\n")?;
        }
        Ok(())
    }
}

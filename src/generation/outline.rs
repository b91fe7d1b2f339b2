//! Outline generation and normalization.

use serde_json::Value;
use std::collections::HashSet;
use tracing::{debug, info, warn};

use super::prompts;
use crate::ai::provider::SharedProvider;
use crate::ai::validation::extract_json_object;
use crate::types::{
    Content, ContentType, LessonError, Level, REFERENCES_TITLE, Result, Subtopic, Topic,
};

const MAX_FALLBACK_TITLE_CHARS: usize = 80;

pub struct OutlineGenerator {
    provider: SharedProvider,
}

impl OutlineGenerator {
    pub fn new(provider: SharedProvider) -> Self {
        Self { provider }
    }

    /// Ask the backend for an outline, then validate and normalize it
    pub async fn generate_outline(
        &self,
        refined_prompt: &str,
        level: Level,
        content_type: ContentType,
    ) -> Result<Content> {
        let prompt = prompts::outline(refined_prompt, level, content_type);
        let response = self.provider.generate(&prompt).await?;
        debug!("Outline response: {} chars", response.content.len());

        let value = extract_json_object(&response.content)
            .map_err(|e| LessonError::OutlineParse(e.to_string()))?;

        let mut content = parse_outline(&value, refined_prompt, level, content_type)?;
        normalize_outline(&mut content);

        info!(
            "Outline '{}' ready: {} topics, {} pages",
            content.title,
            content.topics.len(),
            content.total_pages
        );
        Ok(content)
    }
}

/// Build a [`Content`] from untrusted outline JSON
pub fn parse_outline(
    value: &Value,
    fallback_title: &str,
    level: Level,
    content_type: ContentType,
) -> Result<Content> {
    let topics = value
        .get("topics")
        .and_then(Value::as_array)
        .filter(|topics| !topics.is_empty())
        .ok_or_else(|| {
            LessonError::OutlineParse("'topics' is missing, empty or not an array".to_string())
        })?;

    let topics = topics
        .iter()
        .enumerate()
        .map(|(i, topic)| parse_topic(topic, i))
        .collect::<Result<Vec<_>>>()?;

    let title = value
        .get("title")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(String::from)
        .unwrap_or_else(|| {
            fallback_title
                .chars()
                .take(MAX_FALLBACK_TITLE_CHARS)
                .collect::<String>()
                .trim()
                .to_string()
        });

    Ok(Content {
        title,
        level,
        content_type,
        total_pages: topics.iter().map(|t| t.subtopics.len() as u32).sum(),
        topics,
    })
}

fn parse_topic(value: &Value, index: usize) -> Result<Topic> {
    let title = required_str(value, "title")
        .ok_or_else(|| LessonError::OutlineParse(format!("topic {} has no title", index + 1)))?;

    let subtopics = value
        .get("subtopics")
        .and_then(Value::as_array)
        .ok_or_else(|| {
            LessonError::OutlineParse(format!("topic '{}' has no subtopics array", title))
        })?;

    let subtopics = subtopics
        .iter()
        .map(|s| parse_subtopic(s, &title))
        .collect::<Result<Vec<_>>>()?;

    Ok(Topic { title, subtopics })
}

fn parse_subtopic(value: &Value, topic: &str) -> Result<Subtopic> {
    let title = required_str(value, "title").ok_or_else(|| {
        LessonError::OutlineParse(format!("a subtopic of '{}' has no title", topic))
    })?;

    let summary = required_str(value, "summary").ok_or_else(|| {
        LessonError::OutlineParse(format!("subtopic '{}' has no summary", title))
    })?;

    let page = value.get("page").and_then(page_number).ok_or_else(|| {
        LessonError::OutlineParse(format!("subtopic '{}' has no numeric page", title))
    })?;

    Ok(Subtopic {
        title,
        page,
        summary,
        requires: coerce_requires(value.get("requires")),
    })
}

fn required_str(value: &Value, field: &str) -> Option<String> {
    value
        .get(field)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

/// Integer page numbers, written as a number or a numeric string
fn page_number(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0 && *f >= 0.0).map(|f| f as u64))
            .and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Array of strings; a comma-separated string is split; anything else is empty
fn coerce_requires(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.trim().to_string()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .filter(|s| !s.is_empty())
            .collect(),
        Some(Value::String(s)) => s
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
        _ => Vec::new(),
    }
}

/// Enforce outline invariants in place
///
/// - the last topic is titled "References"
/// - pages run 1..=N in traversal order
/// - `total_pages` equals the subtopic count
pub fn normalize_outline(content: &mut Content) {
    if let Some(last) = content.topics.last_mut()
        && last.title != REFERENCES_TITLE
    {
        debug!("Renaming final topic '{}' to '{}'", last.title, REFERENCES_TITLE);
        last.title = REFERENCES_TITLE.to_string();
    }

    let mut seen = HashSet::new();
    let has_duplicates = content.subtopics().any(|s| !seen.insert(s.page));
    if has_duplicates {
        warn!("Outline has duplicate page numbers, renumbering sequentially");
    }

    let mut next_page = 1u32;
    for subtopic in content.topics.iter_mut().flat_map(|t| t.subtopics.iter_mut()) {
        if subtopic.page != next_page && !has_duplicates {
            debug!(
                "Page '{}' renumbered {} -> {}",
                subtopic.title, subtopic.page, next_page
            );
        }
        subtopic.page = next_page;
        next_page += 1;
    }

    content.total_pages = next_page - 1;
}

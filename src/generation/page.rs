//! Page content generation.

use dashmap::DashMap;
use regex::Regex;
use std::sync::LazyLock;
use tracing::{debug, warn};

use super::prompts;
use crate::ai::provider::SharedProvider;
use crate::ai::validation::strip_code_fences;
use crate::types::{ContentType, LessonError, Level, Result};

static DOCUMENT_WRAPPER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<!doctype[^>]*>|</?html[^>]*>|<head[^>]*>.*?</head>|</?body[^>]*>")
        .expect("valid wrapper regex")
});

/// Everything needed to write one page
#[derive(Debug, Clone, Copy)]
pub struct PageRequest<'a> {
    pub refined_prompt: &'a str,
    pub level: Level,
    pub content_type: ContentType,
    pub title: &'a str,
    pub summary: &'a str,
    pub page: u32,
    pub requires: &'a [String],
}

type MemoKey = (String, Level, ContentType);

pub struct PageGenerator {
    provider: SharedProvider,
    /// Session memo of successful pages by (title, level, content type)
    memo: DashMap<MemoKey, String>,
}

impl PageGenerator {
    pub fn new(provider: SharedProvider) -> Self {
        Self {
            provider,
            memo: DashMap::new(),
        }
    }

    /// Raw page HTML, or a tagged [`LessonError::PageGeneration`]
    pub async fn generate_page_content(&self, request: &PageRequest<'_>) -> Result<String> {
        let key = (
            request.title.to_string(),
            request.level,
            request.content_type,
        );
        if let Some(html) = self.memo.get(&key) {
            debug!("Page '{}' served from session memo", request.title);
            return Ok(html.clone());
        }

        let failed = |reason: String| LessonError::PageGeneration {
            page: request.page,
            title: request.title.to_string(),
            reason,
        };

        let prompt = prompts::page(request);
        let response = self.provider.generate(&prompt).await.map_err(|e| {
            warn!("Page {} ('{}') generation failed: {}", request.page, request.title, e);
            failed(e.to_string())
        })?;

        let html = clean_page_html(&response.content);
        if html.is_empty() {
            warn!("Page {} ('{}') came back empty", request.page, request.title);
            return Err(failed("empty response".to_string()));
        }

        self.memo.insert(key, html.clone());
        Ok(html)
    }
}

/// Strip markdown fences and any document wrapper around the fragment
pub fn clean_page_html(raw: &str) -> String {
    let unfenced = strip_code_fences(raw);
    DOCUMENT_WRAPPER.replace_all(&unfenced, "").trim().to_string()
}

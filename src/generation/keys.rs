//! Cache key layout for generated artifacts.

use crate::constants::cache::kind;
use crate::types::LessonRequest;

/// `refined-<prompt>-<level>-<type>`
pub fn refined_prompt_key(request: &LessonRequest) -> String {
    format!(
        "{}-{}-{}-{}",
        kind::REFINED_PROMPT,
        request.prompt,
        request.level,
        request.content_type
    )
}

/// `content-<prompt>-<level>-<type>`
pub fn content_key(request: &LessonRequest) -> String {
    format!(
        "{}-{}-{}-{}",
        kind::CONTENT,
        request.prompt,
        request.level,
        request.content_type
    )
}

/// `page-<prompt>-<level>-<type>-<page>-<title>`
pub fn page_key(request: &LessonRequest, page: u32, title: &str) -> String {
    format!(
        "{}-{}-{}-{}-{}-{}",
        kind::PAGE,
        request.prompt,
        request.level,
        request.content_type,
        page,
        title
    )
}

/// Prefix shared by every page key of a request
pub fn page_prefix(request: &LessonRequest) -> String {
    format!(
        "{}-{}-{}-{}-",
        kind::PAGE,
        request.prompt,
        request.level,
        request.content_type
    )
}

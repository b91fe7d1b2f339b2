pub mod content;
pub mod error;

pub use content::{
    Content, ContentType, Level, PageContent, Quiz, QuizQuestion, REFERENCES_TITLE, Subtopic,
    Topic,
};
pub use error::{
    ErrorCategory, ErrorClassifier, LessonError, LlmError, Result, ResultExt, ValidationError,
    ValidationErrorKind,
};

// =============================================================================
// Domain Newtypes
// =============================================================================

use std::fmt;

/// Type-safe wrapper for generation run IDs
///
/// Prevents accidental mixing of run IDs with other string types.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RunId(String);

impl RunId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh random run ID
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for RunId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// The (prompt, level, content type) triple that identifies a lesson
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LessonRequest {
    pub prompt: String,
    pub level: Level,
    pub content_type: ContentType,
}

impl LessonRequest {
    pub fn new(prompt: impl Into<String>, level: Level, content_type: ContentType) -> Self {
        Self {
            prompt: prompt.into(),
            level,
            content_type,
        }
    }

    /// Reject prompts that cannot produce a lesson
    pub fn validate(&self) -> Result<()> {
        if self.prompt.trim().is_empty() {
            return Err(ValidationError::new(
                ValidationErrorKind::MissingField,
                "prompt must not be empty",
            )
            .with_field("prompt")
            .into());
        }
        Ok(())
    }
}

impl fmt::Display for LessonRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' ({}, {})", self.prompt, self.level, self.content_type)
    }
}

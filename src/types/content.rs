//! Lesson Content Model
//!
//! Outline, page and quiz types shared by the generator stages, the cache
//! and the exporter. Field names serialize in camelCase to match the JSON
//! the backends are asked to produce.

use serde::{Deserialize, Deserializer, Serialize};

// =============================================================================
// Audience Settings
// =============================================================================

/// Target audience of a lesson
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Level {
    #[default]
    SchoolKid,
    HighSchool,
    Undergraduate,
    Expert,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::SchoolKid => "school-kid",
            Level::HighSchool => "high-school",
            Level::Undergraduate => "undergraduate",
            Level::Expert => "expert",
        }
    }

    /// Tone guidance injected into generation prompts
    pub fn guidance(&self) -> &'static str {
        match self {
            Level::SchoolKid => {
                "Use very simple words, short sentences, friendly tone and everyday examples a 10-year-old knows."
            }
            Level::HighSchool => {
                "Use clear language, define new terms on first use and connect ideas to familiar experiences."
            }
            Level::Undergraduate => {
                "Use precise academic language, introduce formal definitions and include worked examples."
            }
            Level::Expert => {
                "Assume strong background knowledge, be rigorous and dense, and reference advanced concepts freely."
            }
        }
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Level {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "school-kid" | "schoolkid" | "kid" => Ok(Level::SchoolKid),
            "high-school" | "highschool" => Ok(Level::HighSchool),
            "undergraduate" | "college" => Ok(Level::Undergraduate),
            "expert" => Ok(Level::Expert),
            _ => Err(format!(
                "Unknown level: {}. Valid values: school-kid, high-school, undergraduate, expert",
                s
            )),
        }
    }
}

/// Verbosity preference of a lesson
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ContentType {
    #[default]
    Concise,
    Detailed,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Concise => "concise",
            ContentType::Detailed => "detailed",
        }
    }

    /// Verbosity guidance injected into generation prompts
    pub fn guidance(&self) -> &'static str {
        match self {
            ContentType::Concise => {
                "Keep every page short and focused: a few tight paragraphs, key points only."
            }
            ContentType::Detailed => {
                "Be thorough: explain each idea in depth with examples, edge cases and context."
            }
        }
    }

    /// Suggested number of main topics (excluding References)
    pub fn topic_range(&self) -> (usize, usize) {
        match self {
            ContentType::Concise => (3, 4),
            ContentType::Detailed => (5, 7),
        }
    }
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ContentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "concise" | "short" => Ok(ContentType::Concise),
            "detailed" | "long" => Ok(ContentType::Detailed),
            _ => Err(format!(
                "Unknown content type: {}. Valid values: concise, detailed",
                s
            )),
        }
    }
}

// =============================================================================
// Outline
// =============================================================================

/// Title reserved for the final topic of every outline
pub const REFERENCES_TITLE: &str = "References";

/// A generated lesson outline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Content {
    pub title: String,
    pub level: Level,
    pub content_type: ContentType,
    pub topics: Vec<Topic>,
    pub total_pages: u32,
}

impl Content {
    /// All subtopics in traversal order (topic order, then subtopic order)
    pub fn subtopics(&self) -> impl Iterator<Item = &Subtopic> {
        self.topics.iter().flat_map(|t| t.subtopics.iter())
    }

    /// Subtopics paired with their owning topic and its index, sorted by page number
    pub fn pages_in_order(&self) -> Vec<(usize, &Topic, &Subtopic)> {
        let mut pages: Vec<_> = self
            .topics
            .iter()
            .enumerate()
            .flat_map(|(i, t)| t.subtopics.iter().map(move |s| (i, t, s)))
            .collect();
        pages.sort_by_key(|(_, _, s)| s.page);
        pages
    }

    /// Whether `index` is the trailing References topic
    pub fn is_references_topic(&self, index: usize) -> bool {
        index + 1 == self.topics.len()
    }

    pub fn subtopic_count(&self) -> usize {
        self.topics.iter().map(|t| t.subtopics.len()).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Topic {
    pub title: String,
    pub subtopics: Vec<Subtopic>,
}

impl Topic {
    /// Page number of the topic's final subtopic
    pub fn last_page(&self) -> Option<u32> {
        self.subtopics.last().map(|s| s.page)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subtopic {
    pub title: String,
    pub page: u32,
    pub summary: String,
    #[serde(default)]
    pub requires: Vec<String>,
}

impl Subtopic {
    /// Case-insensitive check for a capability tag
    pub fn requires(&self, tag: &str) -> bool {
        self.requires.iter().any(|r| r.eq_ignore_ascii_case(tag))
    }
}

// =============================================================================
// Pages
// =============================================================================

/// Generated content of one subtopic page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageContent {
    pub page: u32,
    pub title: String,
    pub raw_content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refined_content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quiz: Option<Quiz>,
}

impl PageContent {
    /// HTML to display: the refined version when present
    pub fn display_html(&self) -> &str {
        self.refined_content.as_deref().unwrap_or(&self.raw_content)
    }
}

// =============================================================================
// Quiz
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quiz {
    pub quiz_title: String,
    #[serde(default)]
    pub quiz_synopsis: String,
    #[serde(default = "default_progress_bar_color")]
    pub progress_bar_color: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub nr_of_questions: String,
    pub questions: Vec<QuizQuestion>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestion {
    pub question: String,
    #[serde(default = "default_question_type")]
    pub question_type: String,
    #[serde(default = "default_answer_selection_type")]
    pub answer_selection_type: String,
    pub answers: Vec<String>,
    /// 1-based index into `answers`, encoded as a string
    #[serde(deserialize_with = "string_or_number")]
    pub correct_answer: String,
    #[serde(default)]
    pub message_for_correct_answer: String,
    #[serde(default)]
    pub message_for_incorrect_answer: String,
    #[serde(default)]
    pub explanation: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub point: String,
}

fn default_progress_bar_color() -> String {
    "#9de1f6".to_string()
}

fn default_question_type() -> String {
    "text".to_string()
}

fn default_answer_selection_type() -> String {
    "single".to_string()
}

/// Accept `"3"` or `3` and keep the string form
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Str(String),
        Int(i64),
        Float(f64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Str(s) => s.trim().to_string(),
        Raw::Int(n) => n.to_string(),
        Raw::Float(n) => n.to_string(),
    })
}

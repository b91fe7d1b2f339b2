//! Scripted backends for pipeline tests.

use async_trait::async_trait;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::ai::image::{FoundImage, ImageGenerator, ImageSearch};
use crate::ai::provider::{LlmProvider, LlmResponse};
use crate::types::{LessonError, Result};

enum Reply {
    Text(String),
    Fail,
}

/// Provider that answers by matching a needle in the prompt
///
/// Rules are tried in insertion order; a prompt matching no rule fails.
#[derive(Default)]
pub struct ScriptedProvider {
    rules: Vec<(String, Reply)>,
    prompts: Mutex<Vec<String>>,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond_to(mut self, needle: &str, response: &str) -> Self {
        self.rules
            .push((needle.to_string(), Reply::Text(response.to_string())));
        self
    }

    pub fn fail_on(mut self, needle: &str) -> Self {
        self.rules.push((needle.to_string(), Reply::Fail));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of prompts received that contain `needle`
    pub fn calls_matching(&self, needle: &str) -> usize {
        self.prompts
            .lock()
            .map(|p| p.iter().filter(|prompt| prompt.contains(needle)).count())
            .unwrap_or(0)
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    async fn generate(&self, prompt: &str) -> Result<LlmResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }

        match self.rules.iter().find(|(needle, _)| prompt.contains(needle.as_str())) {
            Some((_, Reply::Text(text))) => Ok(LlmResponse::content_only(text.clone())),
            Some((needle, Reply::Fail)) => {
                Err(LessonError::LlmApi(format!("scripted failure for '{}'", needle)))
            }
            None => Err(LessonError::LlmApi("no scripted reply".to_string())),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted-model"
    }
}

/// Search backend with a fixed answer
pub struct StubSearch {
    pub result: Option<String>,
    pub fail: bool,
    pub calls: AtomicUsize,
}

impl StubSearch {
    pub fn hit(url: &str) -> Self {
        Self {
            result: Some(url.to_string()),
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn miss() -> Self {
        Self {
            result: None,
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            result: None,
            fail: true,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ImageSearch for StubSearch {
    async fn search(&self, query: &str) -> Result<Option<FoundImage>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(LessonError::ImageResolution {
                prompt: query.to_string(),
                reason: "search down".to_string(),
            });
        }
        Ok(self.result.as_ref().map(|url| FoundImage {
            url: url.clone(),
            alt: None,
            credit: None,
        }))
    }

    fn name(&self) -> &str {
        "stub-search"
    }
}

/// Generator backend with a fixed answer
pub struct StubGenerator {
    pub base64: Option<String>,
    pub calls: AtomicUsize,
}

impl StubGenerator {
    pub fn returning(base64: &str) -> Self {
        Self {
            base64: Some(base64.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            base64: None,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ImageGenerator for StubGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.base64.clone().ok_or_else(|| LessonError::ImageResolution {
            prompt: prompt.to_string(),
            reason: "generator down".to_string(),
        })
    }

    fn name(&self) -> &str {
        "stub-generator"
    }
}

/// Quiz JSON with the given question and answer counts
pub fn quiz_json(questions: usize, answers: usize) -> String {
    let questions: Vec<serde_json::Value> = (0..questions)
        .map(|i| {
            serde_json::json!({
                "question": format!("Question {}?", i + 1),
                "questionType": "text",
                "answerSelectionType": "single",
                "answers": (0..answers).map(|a| format!("Answer {}", a + 1)).collect::<Vec<_>>(),
                "correctAnswer": (i % 4 + 1),
                "messageForCorrectAnswer": "Correct!",
                "messageForIncorrectAnswer": "Not quite.",
                "explanation": "Because.",
                "point": 10
            })
        })
        .collect();

    serde_json::json!({
        "quizTitle": "Check your understanding",
        "quizSynopsis": "A short quiz",
        "progressBarColor": "#9de1f6",
        "nrOfQuestions": questions.len(),
        "questions": questions
    })
    .to_string()
}

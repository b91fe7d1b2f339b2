//! Quiz generation with a strict shape contract.

use tracing::{debug, info};

use super::prompts;
use crate::ai::provider::SharedProvider;
use crate::ai::validation::extract_json_object;
use crate::constants::quiz as quiz_shape;
use crate::types::{LessonError, Level, Quiz, Result, ValidationError, ValidationErrorKind};

pub struct QuizGenerator {
    provider: SharedProvider,
}

impl QuizGenerator {
    pub fn new(provider: SharedProvider) -> Self {
        Self { provider }
    }

    /// Six four-answer questions about `topic`, grounded in `content`
    pub async fn generate_quiz(&self, topic: &str, content: &str, level: Level) -> Result<Quiz> {
        let prompt = prompts::quiz(topic, content, level);
        let response = self
            .provider
            .generate(&prompt)
            .await
            .map_err(|e| quiz_error(topic, e))?;

        let value = extract_json_object(&response.content).map_err(|e| quiz_error(topic, e))?;
        let mut quiz: Quiz = serde_json::from_value(value).map_err(|e| quiz_error(topic, e))?;

        validate_quiz(&quiz)?;
        fill_defaults(&mut quiz);

        info!("Quiz ready for '{}': {}", topic, quiz.quiz_title);
        Ok(quiz)
    }
}

fn quiz_error(topic: &str, reason: impl std::fmt::Display) -> LessonError {
    LessonError::QuizGeneration {
        topic: topic.to_string(),
        reason: reason.to_string(),
    }
}

/// Exactly six questions, four answers each, `correctAnswer` in 1..=4
pub fn validate_quiz(quiz: &Quiz) -> Result<()> {
    if quiz.questions.len() != quiz_shape::QUESTION_COUNT {
        return Err(ValidationError::new(
            ValidationErrorKind::Count,
            "quiz must have the exact number of questions",
        )
        .with_field("questions")
        .with_comparison(
            quiz_shape::QUESTION_COUNT.to_string(),
            quiz.questions.len().to_string(),
        )
        .into());
    }

    for (i, question) in quiz.questions.iter().enumerate() {
        if question.answers.len() != quiz_shape::ANSWERS_PER_QUESTION {
            return Err(ValidationError::new(
                ValidationErrorKind::Count,
                "question must have the exact number of answers",
            )
            .with_field(format!("questions[{}].answers", i))
            .with_comparison(
                quiz_shape::ANSWERS_PER_QUESTION.to_string(),
                question.answers.len().to_string(),
            )
            .into());
        }

        let in_range = question
            .correct_answer
            .parse::<usize>()
            .is_ok_and(|n| (1..=quiz_shape::ANSWERS_PER_QUESTION).contains(&n));
        if !in_range {
            return Err(ValidationError::new(
                ValidationErrorKind::Range,
                "correctAnswer must be a 1-based answer index",
            )
            .with_field(format!("questions[{}].correctAnswer", i))
            .with_comparison(
                format!("1..={}", quiz_shape::ANSWERS_PER_QUESTION),
                question.correct_answer.clone(),
            )
            .into());
        }
    }

    Ok(())
}

fn fill_defaults(quiz: &mut Quiz) {
    quiz.nr_of_questions = quiz.questions.len().to_string();
    for question in &mut quiz.questions {
        if question.point.is_empty() {
            question.point = quiz_shape::POINTS_PER_QUESTION.to_string();
        }
    }
    debug!("Quiz normalized: {} questions", quiz.nr_of_questions);
}

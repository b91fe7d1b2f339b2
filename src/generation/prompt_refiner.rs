//! Prompt refinement: expands a raw topic into a lesson brief.

use tracing::{debug, warn};

use super::prompts;
use crate::ai::provider::SharedProvider;
use crate::ai::validation::strip_code_fences;
use crate::types::{ContentType, Level};

/// Outcome of a refinement call that degrades instead of failing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Refinement {
    Refined(String),
    /// The backend failed or answered empty; holds the unchanged input
    Fallback(String),
}

impl Refinement {
    pub fn is_refined(&self) -> bool {
        matches!(self, Self::Refined(_))
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Refined(text) | Self::Fallback(text) => text,
        }
    }

    pub fn into_inner(self) -> String {
        match self {
            Self::Refined(text) | Self::Fallback(text) => text,
        }
    }
}

pub struct PromptRefiner {
    provider: SharedProvider,
}

impl PromptRefiner {
    pub fn new(provider: SharedProvider) -> Self {
        Self { provider }
    }

    /// Detailed generation prompt, or the original prompt as a fallback
    pub async fn refine(
        &self,
        original: &str,
        level: Level,
        content_type: ContentType,
    ) -> Refinement {
        let prompt = prompts::refine_prompt(original, level, content_type);

        match self.provider.generate(&prompt).await {
            Ok(response) => {
                let refined = strip_code_fences(&response.content);
                if refined.is_empty() {
                    warn!("Prompt refinement returned nothing, using original prompt");
                    Refinement::Fallback(original.to_string())
                } else {
                    debug!(
                        "Refined prompt ({} tokens): {}",
                        response.usage.total(),
                        refined
                    );
                    Refinement::Refined(refined)
                }
            }
            Err(e) => {
                warn!("Prompt refinement failed, using original prompt: {}", e);
                Refinement::Fallback(original.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::testing::ScriptedProvider;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_refined_text_returned() {
        let provider = Arc::new(ScriptedProvider::new().respond_to(
            "curriculum designer",
            "A friendly lesson on how plants turn sunlight into food.",
        ));
        let refiner = PromptRefiner::new(provider);

        let refined = refiner
            .refine("Photosynthesis", Level::SchoolKid, ContentType::Concise)
            .await;
        assert_eq!(
            refined,
            Refinement::Refined(
                "A friendly lesson on how plants turn sunlight into food.".to_string()
            )
        );
    }

    #[tokio::test]
    async fn test_falls_back_on_error_or_empty() {
        let failing = PromptRefiner::new(Arc::new(ScriptedProvider::new()));
        assert_eq!(
            failing
                .refine("Photosynthesis", Level::SchoolKid, ContentType::Concise)
                .await,
            Refinement::Fallback("Photosynthesis".to_string())
        );

        let empty = PromptRefiner::new(Arc::new(
            ScriptedProvider::new().respond_to("curriculum designer", "   "),
        ));
        assert_eq!(
            empty.refine("Volcanoes", Level::Expert, ContentType::Detailed).await,
            Refinement::Fallback("Volcanoes".to_string())
        );
    }
}

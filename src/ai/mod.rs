//! AI Integration Layer
//!
//! Text and image backends plus the prompt and response tooling the
//! generation stages share.

pub mod image;
pub mod prompt;
pub mod provider;
pub mod validation;

pub use image::{
    FoundImage, ImageGenerator, ImageSearch, SharedImageGenerator, SharedImageSearch,
    create_image_generator, create_image_search,
};
pub use prompt::{PromptBuilder, PromptSection};
pub use provider::{
    LlmProvider, LlmResponse, OllamaProvider, OpenAiProvider, ProviderConfig, SharedProvider,
    TokenUsage, create_provider,
};
pub use validation::{JsonRepairer, extract_json_object, strip_code_fences};

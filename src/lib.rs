//! lessonloom - AI-Driven Educational Content Generator
//!
//! Turns a topic prompt, a learning level and a content type into a paginated
//! lesson: an outline of topics and subtopics plus one enriched HTML page per
//! subtopic, with a quiz closing each topic.
//!
//! ## Core Features
//!
//! - **Staged Pipeline**: prompt refinement, outline, pages, enrichment, quizzes
//! - **Size-Bounded Cache**: quota-aware eviction over SQLite or memory
//! - **Enrichment**: image search/generation and simulation embeds
//! - **Progress Streaming**: state snapshots and broadcast events
//!
//! ## Quick Start
//!
//! ```ignore
//! use lessonloom::{ConfigLoader, ContentCache, ContentFlow, FlowServices, LessonRequest};
//! use lessonloom::types::{ContentType, Level};
//!
//! let config = ConfigLoader::load()?;
//! let cache = Arc::new(ContentCache::open(&config.cache)?);
//! let flow = ContentFlow::new(FlowServices::from_config(&config)?, cache, config.pipeline);
//!
//! let request = LessonRequest::new("Photosynthesis", Level::SchoolKid, ContentType::Concise);
//! let snapshot = flow.run(&request).await?;
//! ```
//!
//! ## Modules
//!
//! - [`ai`]: LLM and image backends, prompt building, response repair
//! - [`generation`]: pipeline stages and the orchestrator
//! - [`storage`]: content cache and its backends
//! - [`config`]: layered configuration

pub mod ai;
pub mod cli;
pub mod config;
pub mod constants;
pub mod generation;
pub mod storage;
pub mod types;

// =============================================================================
// Core Re-exports
// =============================================================================

// Configuration
pub use config::{Config, ConfigLoader};

// Error Types
pub use types::error::{ErrorCategory, LessonError, Result, ResultExt};

// Domain
pub use types::{Content, LessonRequest, PageContent, Quiz, RunId};

// Storage
pub use storage::{ContentCache, SharedCache, StorageInfo};

// =============================================================================
// Pipeline Re-exports
// =============================================================================

pub use generation::{
    ContentFlow, FlowEvent, FlowServices, FlowSnapshot, FlowState, FlowTracker, export_lesson,
};

// =============================================================================
// AI Re-exports
// =============================================================================

pub use ai::{LlmProvider, LlmResponse, SharedProvider, create_provider};

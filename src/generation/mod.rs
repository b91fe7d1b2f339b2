//! Lesson Generation Pipeline
//!
//! Stages, leaf first:
//! - [`PromptRefiner`]: topic request to lesson brief
//! - [`OutlineGenerator`]: topics and numbered subtopic pages
//! - [`PageGenerator`]: raw HTML per page
//! - [`enrichment`]: images, animations, tone refinement
//! - [`QuizGenerator`]: six-question quiz for the last page of a topic
//! - [`ContentFlow`]: sequencing, caching and progress

pub mod enrichment;
mod export;
mod flow;
pub mod keys;
mod outline;
mod page;
mod progress;
mod prompt_refiner;
mod prompts;
mod quiz;

#[cfg(test)]
pub(crate) mod testing;

pub use export::{ExportSummary, export_lesson};
pub use flow::{ContentFlow, FlowServices};
pub use outline::{OutlineGenerator, normalize_outline, parse_outline};
pub use page::{PageGenerator, PageRequest, clean_page_html};
pub use progress::{FlowEvent, FlowSnapshot, FlowState, FlowTracker, page_progress};
pub use prompt_refiner::{PromptRefiner, Refinement};
pub use quiz::{QuizGenerator, validate_quiz};

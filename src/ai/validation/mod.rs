//! AI Response Validation
//!
//! Defensive parsing for backend output:
//! - JSON object extraction and repair for structured stages
//! - Markdown fence stripping for free-text stages

mod json_repair;

pub use json_repair::{JsonRepairer, extract_json_object, strip_code_fences};

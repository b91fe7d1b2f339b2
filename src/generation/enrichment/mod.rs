//! Page enrichment: images, animations and content refinement.

mod animation;
mod image;
mod refine;

pub use animation::{AnimationCatalog, AnimationResolver, CatalogEntry};
pub use image::{AI_GENERATED_LABEL, ImageResolver};
pub use refine::ContentRefiner;

/// Escape text for use in HTML content and attribute values
pub(crate) fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

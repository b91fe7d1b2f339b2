//! Image placeholder resolution.
//!
//! `[image:<short>:<detailed>]` becomes a searched photo when one exists,
//! otherwise an AI-generated image (badged), otherwise a visible failure block.

use dashmap::DashMap;
use regex::{Captures, Regex};
use std::sync::LazyLock;
use tracing::{debug, info, warn};

use super::escape_html;
use crate::ai::image::{FoundImage, SharedImageGenerator, SharedImageSearch};
use crate::types::{LessonError, Result};

static IMAGE_PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[image:([^:\]]+):([^\]]+)\]").expect("valid image placeholder regex")
});

pub const AI_GENERATED_LABEL: &str = "AI Generated";

/// How a placeholder was resolved
#[derive(Debug, Clone, PartialEq)]
enum ResolvedImage {
    Found(FoundImage),
    Generated { base64: String },
}

pub struct ImageResolver {
    search: Option<SharedImageSearch>,
    generator: Option<SharedImageGenerator>,
    /// Generated images by detailed prompt
    generated: DashMap<String, String>,
}

impl ImageResolver {
    pub fn new(search: Option<SharedImageSearch>, generator: Option<SharedImageGenerator>) -> Self {
        Self {
            search,
            generator,
            generated: DashMap::new(),
        }
    }

    /// Resolver with no backends; every placeholder becomes a failure block
    pub fn disabled() -> Self {
        Self::new(None, None)
    }

    /// Replace every image placeholder in `html`
    pub async fn process_content(&self, html: &str) -> String {
        let placeholders: Vec<(String, String)> = IMAGE_PLACEHOLDER
            .captures_iter(html)
            .map(|c| (c[1].trim().to_string(), c[2].trim().to_string()))
            .collect();

        if placeholders.is_empty() {
            return html.to_string();
        }
        debug!("Resolving {} image placeholders", placeholders.len());

        let mut replacements = Vec::with_capacity(placeholders.len());
        for (short, detailed) in &placeholders {
            let markup = match self.resolve(short, detailed).await {
                Ok(image) => render_image(&image, short, detailed),
                Err(e) => {
                    warn!("Image placeholder '{}' unresolved: {}", short, e);
                    render_failure(short, detailed)
                }
            };
            replacements.push(markup);
        }

        let mut replacements = replacements.into_iter();
        IMAGE_PLACEHOLDER
            .replace_all(html, |_: &Captures| replacements.next().unwrap_or_default())
            .into_owned()
    }

    async fn resolve(&self, short: &str, detailed: &str) -> Result<ResolvedImage> {
        if let Some(search) = &self.search {
            match search.search(short).await {
                Ok(Some(found)) => {
                    debug!("Image for '{}' found via {}", short, search.name());
                    return Ok(ResolvedImage::Found(found));
                }
                Ok(None) => debug!("No search results for '{}'", short),
                Err(e) => warn!("Image search for '{}' failed: {}", short, e),
            }
        }

        if let Some(base64) = self.generated.get(detailed) {
            return Ok(ResolvedImage::Generated {
                base64: base64.clone(),
            });
        }

        let generator = self.generator.as_ref().ok_or_else(|| LessonError::ImageResolution {
            prompt: short.to_string(),
            reason: "no search result and image generation is disabled".to_string(),
        })?;

        let base64 = generator.generate(detailed).await?;
        info!("Generated image for '{}' via {}", short, generator.name());
        self.generated.insert(detailed.to_string(), base64.clone());
        Ok(ResolvedImage::Generated { base64 })
    }
}

fn render_image(image: &ResolvedImage, short: &str, detailed: &str) -> String {
    let alt = escape_html(short);
    let caption = escape_html(detailed);

    match image {
        ResolvedImage::Found(found) => {
            let alt = found.alt.as_deref().map(escape_html).unwrap_or(alt);
            let credit = found
                .credit
                .as_deref()
                .map(|name| {
                    format!(
                        "<span class=\"lesson-image-credit\">Photo: {}</span>",
                        escape_html(name)
                    )
                })
                .unwrap_or_default();
            format!(
                "<figure class=\"lesson-figure\"><img src=\"{}\" alt=\"{}\" loading=\"lazy\"><figcaption>{}{}</figcaption></figure>",
                escape_html(&found.url),
                alt,
                caption,
                credit
            )
        }
        ResolvedImage::Generated { base64 } => format!(
            "<figure class=\"lesson-figure lesson-figure-generated\"><div class=\"lesson-image-frame\"><img src=\"data:image/png;base64,{}\" alt=\"{}\"><span class=\"lesson-ai-badge\">{}</span></div><figcaption>{}</figcaption></figure>",
            base64, alt, AI_GENERATED_LABEL, caption
        ),
    }
}

fn render_failure(short: &str, detailed: &str) -> String {
    format!(
        "<div class=\"lesson-image-error\" role=\"img\" aria-label=\"{}\">Image unavailable: {}</div>",
        escape_html(short),
        escape_html(detailed)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::testing::{StubGenerator, StubSearch};
    use std::sync::Arc;
    use std::sync::atomic::Ordering;

    const PAGE: &str = "<p>Before</p>\n[image:green leaf:A close-up of a green leaf in sunlight]\n<p>After</p>";

    #[tokio::test]
    async fn test_search_miss_uses_generated_image_with_badge() {
        let resolver = ImageResolver::new(
            Some(Arc::new(StubSearch::miss())),
            Some(Arc::new(StubGenerator::returning("iVBORw0KGgoAAA"))),
        );

        let html = resolver.process_content(PAGE).await;
        assert!(html.contains("src=\"data:image/png;base64,iVBORw0KGgoAAA\""));
        assert!(html.contains(AI_GENERATED_LABEL));
        assert!(html.contains("<figcaption>A close-up of a green leaf in sunlight</figcaption>"));
        assert!(!html.contains("[image:"));
        assert!(html.starts_with("<p>Before</p>"));
        assert!(html.ends_with("<p>After</p>"));
    }

    #[tokio::test]
    async fn test_search_hit_uses_url_without_badge() {
        let generator = Arc::new(StubGenerator::returning("unused"));
        let resolver = ImageResolver::new(
            Some(Arc::new(StubSearch::hit("https://images.example/leaf.jpg"))),
            Some(generator.clone()),
        );

        let html = resolver.process_content(PAGE).await;
        assert!(html.contains("src=\"https://images.example/leaf.jpg\""));
        assert!(!html.contains(AI_GENERATED_LABEL));
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_both_failing_renders_failure_block() {
        let resolver = ImageResolver::new(
            Some(Arc::new(StubSearch::failing())),
            Some(Arc::new(StubGenerator::failing())),
        );

        let html = resolver.process_content(PAGE).await;
        assert!(html.contains("lesson-image-error"));
        assert!(html.contains("Image unavailable: A close-up of a green leaf in sunlight"));
        assert!(!html.contains("<img"));
    }

    #[tokio::test]
    async fn test_generation_memoized_by_prompt() {
        let generator = Arc::new(StubGenerator::returning("QUJD"));
        let resolver = ImageResolver::new(None, Some(generator.clone()));

        let twice = format!("{}\n{}", PAGE, PAGE);
        let html = resolver.process_content(&twice).await;
        assert_eq!(html.matches("base64,QUJD").count(), 2);
        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_content_without_placeholders_untouched() {
        let resolver = ImageResolver::disabled();
        assert_eq!(resolver.process_content("<p>x</p>").await, "<p>x</p>");
    }

    #[test]
    fn test_caption_is_escaped() {
        let html = render_failure("a<b", "x & \"y\"");
        assert!(html.contains("a&lt;b"));
        assert!(html.contains("x &amp; &quot;y&quot;"));
    }
}

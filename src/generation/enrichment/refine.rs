//! Tone and verbosity refinement of finished pages.

use dashmap::DashMap;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::ai::provider::SharedProvider;
use crate::generation::page::clean_page_html;
use crate::generation::prompt_refiner::Refinement;
use crate::generation::prompts;
use crate::types::{ContentType, Level};

pub struct ContentRefiner {
    provider: SharedProvider,
    /// Refined HTML by digest of (input, level, content type)
    memo: DashMap<String, String>,
}

impl ContentRefiner {
    pub fn new(provider: SharedProvider) -> Self {
        Self {
            provider,
            memo: DashMap::new(),
        }
    }

    /// Refined HTML, or the input unchanged as a fallback
    pub async fn refine(&self, html: &str, level: Level, content_type: ContentType) -> Refinement {
        let key = memo_key(html, level, content_type);
        if let Some(refined) = self.memo.get(&key) {
            debug!("Refined content served from memo");
            return Refinement::Refined(refined.clone());
        }

        let prompt = prompts::refine_content(html, level, content_type);
        match self.provider.generate(&prompt).await {
            Ok(response) => {
                let refined = clean_page_html(&response.content);
                if refined.is_empty() {
                    warn!("Content refinement returned nothing, keeping original");
                    return Refinement::Fallback(html.to_string());
                }
                self.memo.insert(key, refined.clone());
                Refinement::Refined(refined)
            }
            Err(e) => {
                warn!("Content refinement failed, keeping original: {}", e);
                Refinement::Fallback(html.to_string())
            }
        }
    }
}

fn memo_key(html: &str, level: Level, content_type: ContentType) -> String {
    let mut hasher = Sha256::new();
    hasher.update(level.as_str().as_bytes());
    hasher.update([0]);
    hasher.update(content_type.as_str().as_bytes());
    hasher.update([0]);
    hasher.update(html.as_bytes());
    format!("{:x}", hasher.finalize())
}

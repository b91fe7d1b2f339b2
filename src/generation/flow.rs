//! Content flow orchestration.
//!
//! ```text
//! request ─► refine prompt ─► outline ─► pages (in page order)
//!                                          │
//!                                          ├─ raw HTML
//!                                          ├─ images ─► animations ─► refine
//!                                          ├─ quiz (last page of a topic)
//!                                          └─ cache + publish
//! ```
//!
//! Every stage reads the cache first. Outline and quiz failures end the run;
//! a failed page is recorded and the run continues.

use futures::StreamExt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::enrichment::{AnimationResolver, ContentRefiner, ImageResolver};
use super::keys;
use super::outline::OutlineGenerator;
use super::page::{PageGenerator, PageRequest};
use super::progress::{FlowSnapshot, FlowState, FlowTracker, page_progress};
use super::prompt_refiner::PromptRefiner;
use super::quiz::QuizGenerator;
use crate::ai::image::{
    SharedImageGenerator, SharedImageSearch, create_image_generator, create_image_search,
};
use crate::ai::provider::{SharedProvider, create_provider};
use crate::config::{Config, PipelineConfig};
use crate::constants::{pipeline as pipeline_constants, progress};
use crate::storage::SharedCache;
use crate::types::{Content, LessonError, LessonRequest, PageContent, Result, RunId, Subtopic};

/// Generation services shared by every run
#[derive(Clone)]
pub struct FlowServices {
    pub prompt_refiner: Arc<PromptRefiner>,
    pub outline: Arc<OutlineGenerator>,
    pub pages: Arc<PageGenerator>,
    pub images: Arc<ImageResolver>,
    pub animations: Arc<AnimationResolver>,
    pub content_refiner: Arc<ContentRefiner>,
    pub quiz: Arc<QuizGenerator>,
}

impl FlowServices {
    pub fn new(
        provider: SharedProvider,
        search: Option<SharedImageSearch>,
        generator: Option<SharedImageGenerator>,
    ) -> Self {
        Self {
            prompt_refiner: Arc::new(PromptRefiner::new(provider.clone())),
            outline: Arc::new(OutlineGenerator::new(provider.clone())),
            pages: Arc::new(PageGenerator::new(provider.clone())),
            images: Arc::new(ImageResolver::new(search, generator)),
            animations: Arc::new(AnimationResolver::default()),
            content_refiner: Arc::new(ContentRefiner::new(provider.clone())),
            quiz: Arc::new(QuizGenerator::new(provider)),
        }
    }

    /// Services wired to the configured backends
    pub fn from_config(config: &Config) -> Result<Self> {
        let provider = create_provider(&config.llm.provider_config())?;
        let search = create_image_search(&config.images)?;
        let generator = create_image_generator(&config.images, config.llm.api_key.as_deref())?;

        info!(
            "Backends: llm={} ({}), image search={}, image generator={}",
            provider.name(),
            provider.model(),
            search.as_ref().map(|s| s.name()).unwrap_or("none"),
            generator.as_ref().map(|g| g.name()).unwrap_or("none"),
        );
        Ok(Self::new(provider, search, generator))
    }
}

/// One subtopic to render, detached from the outline borrow
struct PageJob {
    topic: String,
    subtopic: Subtopic,
    wants_quiz: bool,
}

enum PageOutcome {
    Ready(PageContent),
    Failed { page: u32, title: String, error: String },
}

pub struct ContentFlow {
    services: FlowServices,
    cache: SharedCache,
    config: PipelineConfig,
    tracker: FlowTracker,
    /// Read previously cached artifacts; results are written either way
    use_cache: bool,
}

impl ContentFlow {
    pub fn new(services: FlowServices, cache: SharedCache, config: PipelineConfig) -> Self {
        Self {
            services,
            cache,
            config,
            tracker: FlowTracker::new(),
            use_cache: true,
        }
    }

    pub fn with_cache_reads(mut self, enabled: bool) -> Self {
        self.use_cache = enabled;
        self
    }

    pub fn tracker(&self) -> &FlowTracker {
        &self.tracker
    }

    /// Generate (or load) the whole lesson for `request`
    ///
    /// On failure the tracker is left in `FlowState::Error` and pages that
    /// completed before the failure stay cached.
    pub async fn run(&self, request: &LessonRequest) -> Result<FlowSnapshot> {
        self.tracker.reset();
        let run_id = RunId::generate();
        info!("Starting lesson [{}]: {}", run_id, request);

        match self.execute(request).await {
            Ok(()) => {
                self.tracker.transition(FlowState::Complete, progress::COMPLETE);
                let snapshot = self.tracker.snapshot();
                info!(
                    "Lesson [{}] complete: {} pages, {} failed",
                    run_id,
                    snapshot.pages.len(),
                    snapshot.failed_pages.len()
                );
                Ok(snapshot)
            }
            Err(e) => {
                error!("Lesson [{}] failed: {}", run_id, e);
                self.tracker.fail(e.to_string());
                Err(e)
            }
        }
    }

    async fn execute(&self, request: &LessonRequest) -> Result<()> {
        request.validate()?;

        self.tracker.transition(FlowState::RefiningPrompt, progress::REFINING);
        let refined = self.refined_prompt(request).await;
        self.tracker.transition(FlowState::GeneratingOutline, progress::REFINED);

        let content = self.outline(request, &refined).await?;
        self.tracker.set_content(&content);

        let jobs = self.plan_pages(&content);
        let total = jobs.len();
        self.tracker.transition(
            FlowState::GeneratingPages {
                completed: 0,
                total,
            },
            progress::OUTLINED,
        );

        let concurrency = self
            .config
            .page_concurrency
            .clamp(1, pipeline_constants::MAX_PAGE_CONCURRENCY);
        debug!("Generating {} pages, concurrency {}", total, concurrency);

        let mut stream = futures::stream::iter(jobs)
            .map(|job| self.produce_page(request, &refined, job))
            .buffer_unordered(concurrency);

        let mut completed = 0;
        while let Some(outcome) = stream.next().await {
            match outcome? {
                PageOutcome::Ready(page) => self.tracker.page_ready(&page),
                PageOutcome::Failed { page, title, error } => {
                    self.tracker.page_failed(page, &title, &error)
                }
            }
            completed += 1;
            self.tracker.transition(
                FlowState::GeneratingPages { completed, total },
                page_progress(completed, total),
            );
        }

        Ok(())
    }

    async fn refined_prompt(&self, request: &LessonRequest) -> String {
        let key = keys::refined_prompt_key(request);
        if self.use_cache
            && let Some(refined) = self.cache.get(&key)
        {
            debug!("Refined prompt cache hit");
            return refined;
        }

        let refinement = self
            .services
            .prompt_refiner
            .refine(&request.prompt, request.level, request.content_type)
            .await;
        if refinement.is_refined() && !self.cache.set(&key, refinement.as_str()) {
            warn!("Refined prompt not cached");
        }
        refinement.into_inner()
    }

    async fn outline(&self, request: &LessonRequest, refined: &str) -> Result<Content> {
        let key = keys::content_key(request);
        if self.use_cache
            && let Some(content) = self.cache.get_json::<Content>(&key)
        {
            debug!("Outline cache hit: {} pages", content.total_pages);
            return Ok(content);
        }

        let content = self
            .services
            .outline
            .generate_outline(refined, request.level, request.content_type)
            .await?;
        if !self.cache.set_json(&key, &content) {
            warn!("Outline not cached");
        }
        Ok(content)
    }

    fn plan_pages(&self, content: &Content) -> Vec<PageJob> {
        content
            .pages_in_order()
            .into_iter()
            .map(|(index, topic, subtopic)| {
                let closes_topic = topic.last_page() == Some(subtopic.page);
                let quiz_allowed =
                    !content.is_references_topic(index) || self.config.quiz_for_references;
                PageJob {
                    topic: topic.title.clone(),
                    subtopic: subtopic.clone(),
                    wants_quiz: closes_topic && quiz_allowed,
                }
            })
            .collect()
    }

    /// `Err` only for failures that end the run
    async fn produce_page(
        &self,
        request: &LessonRequest,
        refined: &str,
        job: PageJob,
    ) -> Result<PageOutcome> {
        let subtopic = &job.subtopic;
        let key = keys::page_key(request, subtopic.page, &subtopic.title);

        if self.use_cache
            && let Some(page) = self.cache.get_json::<PageContent>(&key)
        {
            debug!("Page {} cache hit", subtopic.page);
            return Ok(PageOutcome::Ready(page));
        }

        let page_request = PageRequest {
            refined_prompt: refined,
            level: request.level,
            content_type: request.content_type,
            title: &subtopic.title,
            summary: &subtopic.summary,
            page: subtopic.page,
            requires: &subtopic.requires,
        };

        let raw = match self.services.pages.generate_page_content(&page_request).await {
            Ok(raw) => raw,
            Err(e) => {
                return Ok(PageOutcome::Failed {
                    page: subtopic.page,
                    title: subtopic.title.clone(),
                    error: e.to_string(),
                });
            }
        };

        let with_images = self.services.images.process_content(&raw).await;
        let enriched = self
            .services
            .animations
            .process_animation_placeholders(&with_images);

        // Pages whose refinement fell back are not cached
        let (refined_content, cacheable) = if self.config.refine_content {
            let refinement = self
                .services
                .content_refiner
                .refine(&enriched, request.level, request.content_type)
                .await;
            if refinement.is_refined() {
                (Some(refinement.into_inner()), true)
            } else {
                (None, false)
            }
        } else {
            (None, true)
        };

        let quiz = if job.wants_quiz {
            let lesson_text = refined_content.as_deref().unwrap_or(&enriched);
            let quiz = self
                .services
                .quiz
                .generate_quiz(&job.topic, lesson_text, request.level)
                .await
                .map_err(|e| {
                    if matches!(e, LessonError::QuizGeneration { .. }) {
                        e
                    } else {
                        LessonError::QuizGeneration {
                            topic: job.topic.clone(),
                            reason: e.to_string(),
                        }
                    }
                })?;
            Some(quiz)
        } else {
            None
        };

        let page = PageContent {
            page: subtopic.page,
            title: subtopic.title.clone(),
            raw_content: enriched,
            refined_content,
            quiz,
        };

        if !cacheable {
            debug!("Page {} refinement fell back, not cached", page.page);
        } else if !self.cache.set_json(&key, &page) {
            warn!("Page {} not cached", page.page);
        }
        info!("Page {} ready: {}", page.page, page.title);
        Ok(PageOutcome::Ready(page))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;
    use crate::generation::progress::FlowEvent;
    use crate::generation::testing::{ScriptedProvider, StubGenerator, StubSearch, quiz_json};
    use crate::storage::ContentCache;
    use crate::types::{ContentType, Level, REFERENCES_TITLE};
    use std::collections::HashSet;

    const REFINED: &str = "A gentle lesson on how green plants make food from light.";

    fn outline_json() -> String {
        serde_json::json!({
            "title": "Photosynthesis",
            "topics": [
                {
                    "title": "How Plants Make Food",
                    "subtopics": [
                        { "title": "Sunlight", "page": 1, "summary": "Light is energy.", "requires": ["Image"] },
                        { "title": "Chlorophyll", "page": 2, "summary": "The green pigment.", "requires": ["Animation"] }
                    ]
                },
                {
                    "title": "Why It Matters",
                    "subtopics": [
                        { "title": "Oxygen", "page": 2, "summary": "Plants release oxygen.", "requires": [] }
                    ]
                },
                {
                    "title": "References",
                    "subtopics": [
                        { "title": "References", "page": 4, "summary": "Sources.", "requires": [] }
                    ]
                }
            ]
        })
        .to_string()
    }

    const PAGE_HTML: &str = "<h2 class=\"lesson-heading\">A page</h2>\n<p class=\"lesson-text\">Plants need light.</p>\n[image:green leaf:A green leaf in sunlight]\n[animation:molecule:a rotating pigment molecule]";

    fn provider() -> ScriptedProvider {
        ScriptedProvider::new()
            .respond_to("assessment designer", &quiz_json(6, 4))
            .respond_to("adapting lesson pages", "<p class=\"lesson-text\">Refined page.</p>")
            .respond_to("instructional designer", &outline_json())
            .respond_to("curriculum designer", REFINED)
            .respond_to("lesson pages in HTML", PAGE_HTML)
    }

    fn services(provider: Arc<ScriptedProvider>) -> FlowServices {
        FlowServices::new(
            provider,
            Some(Arc::new(StubSearch::miss())),
            Some(Arc::new(StubGenerator::returning("QUJD"))),
        )
    }

    fn cache() -> SharedCache {
        Arc::new(ContentCache::in_memory(&CacheConfig::default()))
    }

    fn request() -> LessonRequest {
        LessonRequest::new("Photosynthesis", Level::SchoolKid, ContentType::Concise)
    }

    #[tokio::test]
    async fn test_end_to_end_photosynthesis() {
        let provider = Arc::new(provider());
        let flow = ContentFlow::new(services(provider.clone()), cache(), PipelineConfig::default());

        let snapshot = flow.run(&request()).await.unwrap();

        assert_eq!(snapshot.state, FlowState::Complete);
        assert_eq!(snapshot.progress, 100.0);

        let content = snapshot.content.unwrap();
        assert_eq!(content.topics.last().unwrap().title, REFERENCES_TITLE);
        let pages: Vec<u32> = content.subtopics().map(|s| s.page).collect();
        assert_eq!(pages, vec![1, 2, 3, 4]);
        assert_eq!(content.total_pages, 4);
        assert_eq!(pages.iter().collect::<HashSet<_>>().len(), pages.len());

        assert_eq!(snapshot.pages.len(), 4);
        assert!(snapshot.failed_pages.is_empty());

        // Last page of each topic carries a quiz, References included
        let with_quiz: Vec<u32> = snapshot
            .pages
            .values()
            .filter(|p| p.quiz.is_some())
            .map(|p| p.page)
            .collect();
        assert_eq!(with_quiz, vec![2, 3, 4]);
        assert_eq!(provider.calls_matching("assessment designer"), 3);

        let first = &snapshot.pages[&1];
        assert!(first.raw_content.contains("data:image/png;base64,QUJD"));
        assert!(first.raw_content.contains("phet.colorado.edu"));
        assert_eq!(
            first.display_html(),
            "<p class=\"lesson-text\">Refined page.</p>"
        );
    }

    #[tokio::test]
    async fn test_progress_events_reach_one_hundred_in_order() {
        let flow = ContentFlow::new(
            services(Arc::new(provider())),
            cache(),
            PipelineConfig::default(),
        );
        let mut rx = flow.tracker().subscribe();

        flow.run(&request()).await.unwrap();

        let mut progress = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let FlowEvent::StateChanged { progress: p, .. } = event {
                progress.push(p);
            }
        }
        assert_eq!(progress.first(), Some(&0.0));
        assert_eq!(&progress[1..4], &[10.0, 20.0, 40.0]);
        assert_eq!(progress.last(), Some(&100.0));
        assert!(progress.windows(2).all(|w| w[0] <= w[1]));
    }

    #[tokio::test]
    async fn test_second_run_served_from_cache() {
        let cache = cache();
        let first = ContentFlow::new(
            services(Arc::new(provider())),
            cache.clone(),
            PipelineConfig::default(),
        );
        first.run(&request()).await.unwrap();

        // Fails every call: everything must come from the cache
        let offline = Arc::new(ScriptedProvider::new());
        let second = ContentFlow::new(services(offline.clone()), cache, PipelineConfig::default());
        let snapshot = second.run(&request()).await.unwrap();

        assert_eq!(snapshot.state, FlowState::Complete);
        assert_eq!(snapshot.pages.len(), 4);
        assert_eq!(offline.calls(), 0);
    }

    #[tokio::test]
    async fn test_cache_reads_disabled_regenerates() {
        let cache = cache();
        let provider = Arc::new(provider());
        ContentFlow::new(services(provider.clone()), cache.clone(), PipelineConfig::default())
            .run(&request())
            .await
            .unwrap();
        let calls_after_first = provider.calls();

        let fresh = Arc::new(self::provider());
        ContentFlow::new(services(fresh.clone()), cache, PipelineConfig::default())
            .with_cache_reads(false)
            .run(&request())
            .await
            .unwrap();
        assert!(fresh.calls() > 0);
        assert!(calls_after_first > 0);
    }

    #[tokio::test]
    async fn test_missing_page_regenerated_alone() {
        let cache = cache();
        ContentFlow::new(
            services(Arc::new(provider())),
            cache.clone(),
            PipelineConfig::default(),
        )
        .run(&request())
        .await
        .unwrap();

        cache.remove(&keys::page_key(&request(), 1, "Sunlight"));

        let provider = Arc::new(provider());
        let snapshot = ContentFlow::new(services(provider.clone()), cache, PipelineConfig::default())
            .run(&request())
            .await
            .unwrap();

        assert_eq!(snapshot.pages.len(), 4);
        assert_eq!(provider.calls_matching("lesson pages in HTML"), 1);
        assert_eq!(provider.calls_matching("instructional designer"), 0);
    }

    #[tokio::test]
    async fn test_outline_failure_is_error_state() {
        let provider = Arc::new(
            ScriptedProvider::new()
                .respond_to("curriculum designer", REFINED)
                .respond_to("instructional designer", "I cannot help with that."),
        );
        let flow = ContentFlow::new(services(provider), cache(), PipelineConfig::default());

        let result = flow.run(&request()).await;
        assert!(matches!(result, Err(LessonError::OutlineParse(_))));
        assert!(flow.tracker().state().is_error());
        assert_eq!(flow.tracker().snapshot().progress, 20.0);
    }

    #[tokio::test]
    async fn test_quiz_failure_halts_and_keeps_earlier_pages() {
        let provider = Arc::new(
            ScriptedProvider::new()
                .fail_on("assessment designer")
                .respond_to("adapting lesson pages", "<p>Refined.</p>")
                .respond_to("instructional designer", &outline_json())
                .respond_to("curriculum designer", REFINED)
                .respond_to("lesson pages in HTML", PAGE_HTML),
        );
        let cache = cache();
        let flow = ContentFlow::new(services(provider), cache.clone(), PipelineConfig::default());

        let result = flow.run(&request()).await;
        assert!(matches!(result, Err(LessonError::QuizGeneration { .. })));

        let snapshot = flow.tracker().snapshot();
        assert!(snapshot.state.is_error());
        assert_eq!(snapshot.pages.keys().copied().collect::<Vec<_>>(), vec![1]);
        assert!(cache.has_item(&keys::page_key(&request(), 1, "Sunlight")));
        assert!(!cache.has_item(&keys::page_key(&request(), 2, "Chlorophyll")));
    }

    #[tokio::test]
    async fn test_failed_page_recorded_and_not_cached() {
        let provider = Arc::new(
            ScriptedProvider::new()
                .respond_to("assessment designer", &quiz_json(6, 4))
                .respond_to("adapting lesson pages", "<p>Refined.</p>")
                .respond_to("instructional designer", &outline_json())
                .respond_to("curriculum designer", REFINED)
                .fail_on("**Page title**: Sunlight")
                .respond_to("lesson pages in HTML", PAGE_HTML),
        );
        let cache = cache();
        let flow = ContentFlow::new(services(provider), cache.clone(), PipelineConfig::default());

        let snapshot = flow.run(&request()).await.unwrap();
        assert_eq!(snapshot.state, FlowState::Complete);
        assert!(snapshot.failed_pages.contains_key(&1));
        assert_eq!(snapshot.pages.len(), 3);
        assert!(!cache.has_item(&keys::page_key(&request(), 1, "Sunlight")));
    }

    #[tokio::test]
    async fn test_refinement_fallbacks_not_cached_and_retried() {
        let degraded = Arc::new(
            ScriptedProvider::new()
                .respond_to("assessment designer", &quiz_json(6, 4))
                .fail_on("adapting lesson pages")
                .respond_to("instructional designer", &outline_json())
                .respond_to("lesson pages in HTML", PAGE_HTML),
        );
        let cache = cache();
        let snapshot = ContentFlow::new(services(degraded), cache.clone(), PipelineConfig::default())
            .run(&request())
            .await
            .unwrap();

        assert_eq!(snapshot.state, FlowState::Complete);
        assert!(snapshot.pages.values().all(|p| p.refined_content.is_none()));
        assert!(!cache.has_item(&keys::refined_prompt_key(&request())));
        assert!(!cache.has_item(&keys::page_key(&request(), 1, "Sunlight")));
        assert!(cache.has_item(&keys::content_key(&request())));

        let healthy = Arc::new(provider());
        let snapshot = ContentFlow::new(services(healthy.clone()), cache.clone(), PipelineConfig::default())
            .run(&request())
            .await
            .unwrap();

        assert_eq!(healthy.calls_matching("curriculum designer"), 1);
        assert_eq!(healthy.calls_matching("instructional designer"), 0);
        assert_eq!(
            cache.get(&keys::refined_prompt_key(&request())).as_deref(),
            Some(REFINED)
        );
        assert_eq!(
            snapshot.pages[&1].refined_content.as_deref(),
            Some("<p class=\"lesson-text\">Refined page.</p>")
        );
        assert!(cache.has_item(&keys::page_key(&request(), 1, "Sunlight")));
    }

    #[tokio::test]
    async fn test_references_quiz_can_be_disabled() {
        let config = PipelineConfig {
            quiz_for_references: false,
            refine_content: false,
            ..Default::default()
        };
        let provider = Arc::new(provider());
        let snapshot = ContentFlow::new(services(provider.clone()), cache(), config)
            .run(&request())
            .await
            .unwrap();

        assert!(snapshot.pages[&4].quiz.is_none());
        assert!(snapshot.pages[&3].quiz.is_some());
        assert!(snapshot.pages[&1].refined_content.is_none());
        assert_eq!(provider.calls_matching("adapting lesson pages"), 0);
    }

    #[tokio::test]
    async fn test_only_final_topic_counts_as_references() {
        let outline = serde_json::json!({
            "title": "Citing Sources",
            "topics": [
                { "title": "Basics", "subtopics": [
                    { "title": "Why cite", "page": 1, "summary": "Credit.", "requires": [] }
                ]},
                { "title": "References", "subtopics": [
                    { "title": "Formatting a reference", "page": 2, "summary": "Styles.", "requires": [] }
                ]},
                { "title": "Further Reading", "subtopics": [
                    { "title": "Sources", "page": 3, "summary": "Sources.", "requires": [] }
                ]}
            ]
        })
        .to_string();
        let provider = Arc::new(
            ScriptedProvider::new()
                .respond_to("assessment designer", &quiz_json(6, 4))
                .respond_to("instructional designer", &outline)
                .respond_to("curriculum designer", REFINED)
                .respond_to("lesson pages in HTML", PAGE_HTML),
        );
        let config = PipelineConfig {
            quiz_for_references: false,
            refine_content: false,
            ..Default::default()
        };
        let snapshot = ContentFlow::new(services(provider), cache(), config)
            .run(&request())
            .await
            .unwrap();

        assert!(snapshot.pages[&1].quiz.is_some());
        assert!(snapshot.pages[&2].quiz.is_some());
        assert!(snapshot.pages[&3].quiz.is_none());
    }

    #[tokio::test]
    async fn test_concurrent_pages_match_sequential() {
        let config = PipelineConfig {
            page_concurrency: 4,
            ..Default::default()
        };
        let snapshot = ContentFlow::new(services(Arc::new(provider())), cache(), config)
            .run(&request())
            .await
            .unwrap();

        assert_eq!(snapshot.state, FlowState::Complete);
        assert_eq!(snapshot.pages.keys().copied().collect::<Vec<_>>(), vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_empty_prompt_rejected() {
        let flow = ContentFlow::new(
            services(Arc::new(provider())),
            cache(),
            PipelineConfig::default(),
        );
        let request = LessonRequest::new("   ", Level::Expert, ContentType::Detailed);
        assert!(matches!(
            flow.run(&request).await,
            Err(LessonError::Validation(_))
        ));
    }
}

//! Generate Command
//!
//! Usage:
//!   lessonloom generate <prompt> [--level L] [--content-type T]
//!                       [--output DIR] [--no-cache] [--concurrency N]

use std::path::{Path, PathBuf};

use crate::cli::progress::ConsoleRenderer;
use crate::cli::ui::Output;
use crate::cli::util::{CommandContext, format_bytes};
use crate::generation::{ContentFlow, FlowServices, FlowSnapshot, export_lesson};
use crate::types::{ContentType, LessonError, LessonRequest, Level, Result};

pub struct GenerateOptions {
    pub prompt: String,
    pub level: Option<Level>,
    pub content_type: Option<ContentType>,
    pub output: Option<PathBuf>,
    pub no_cache: bool,
    pub concurrency: Option<usize>,
    pub config_path: Option<PathBuf>,
    pub quiet: bool,
}

pub async fn run(options: GenerateOptions) -> Result<()> {
    let out = Output::quiet(options.quiet);
    let mut ctx = CommandContext::load(options.config_path.as_deref())?;

    if let Some(concurrency) = options.concurrency {
        ctx.config.pipeline.page_concurrency = concurrency;
        ctx.config.validate()?;
    }

    let request = LessonRequest::new(
        options.prompt,
        options.level.unwrap_or(ctx.config.pipeline.default_level),
        options
            .content_type
            .unwrap_or(ctx.config.pipeline.default_content_type),
    );

    out.header(&format!("Generating lesson: {}", request.prompt));
    out.field("Level", request.level);
    out.field("Type", request.content_type);
    out.field("Backend", &ctx.config.llm.provider);

    let services = FlowServices::from_config(&ctx.config)?;
    let flow = ContentFlow::new(services, ctx.cache.clone(), ctx.config.pipeline.clone())
        .with_cache_reads(!options.no_cache);

    let renderer = (!options.quiet).then(|| ConsoleRenderer::new(flow.tracker()).spawn());
    let result = flow.run(&request).await;
    if let Some(handle) = renderer {
        // The renderer exits on the terminal state event
        let _ = handle.await;
    }
    let snapshot = result?;

    print_summary(&out, &snapshot, &ctx);

    if let Some(dir) = &options.output {
        export(&out, dir, &snapshot)?;
    }

    if !snapshot.failed_pages.is_empty() {
        out.warning(&format!(
            "{} page(s) failed; run again to retry them",
            snapshot.failed_pages.len()
        ));
    }

    Ok(())
}

fn print_summary(out: &Output, snapshot: &FlowSnapshot, ctx: &CommandContext) {
    let quizzes = snapshot.pages.values().filter(|p| p.quiz.is_some()).count();
    let info = ctx.cache.storage_info();

    out.header("Summary");
    if let Some(content) = &snapshot.content {
        out.field("Title", &content.title);
        out.field("Topics", content.topics.len());
    }
    out.field("Pages", snapshot.pages.len());
    out.field("Quizzes", quizzes);
    out.field("Failed", snapshot.failed_pages.len());
    out.field(
        "Cache",
        format!(
            "{} / {} ({:.1}%)",
            format_bytes(info.used_bytes),
            format_bytes(info.total_bytes),
            info.percentage_used
        ),
    );
}

fn export(out: &Output, dir: &Path, snapshot: &FlowSnapshot) -> Result<()> {
    let content = snapshot
        .content
        .as_ref()
        .ok_or_else(|| LessonError::pipeline("export", "no outline to export"))?;

    let summary = export_lesson(dir, content, &snapshot.pages)?;
    out.success(&format!(
        "Wrote {} files to {}",
        summary.files.len(),
        dir.display()
    ));
    Ok(())
}

//! Lesson export to a directory.
//!
//! Layout:
//! - `content.json`: the outline
//! - `page-<n>.html`: display HTML fragment of page n
//! - `quiz-<n>.json`: quiz attached to page n, when present

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::types::{Content, PageContent, Result, ResultExt};

#[derive(Debug, Default)]
pub struct ExportSummary {
    pub files: Vec<PathBuf>,
    pub pages: usize,
    pub quizzes: usize,
}

pub fn export_lesson(
    output_dir: &Path,
    content: &Content,
    pages: &BTreeMap<u32, PageContent>,
) -> Result<ExportSummary> {
    std::fs::create_dir_all(output_dir)
        .with_context_fn(|| format!("creating {}", output_dir.display()))?;

    let mut summary = ExportSummary::default();

    let outline_path = output_dir.join("content.json");
    std::fs::write(&outline_path, serde_json::to_string_pretty(content)?)?;
    summary.files.push(outline_path);

    for page in pages.values() {
        let page_path = output_dir.join(format!("page-{}.html", page.page));
        std::fs::write(&page_path, page.display_html())?;
        summary.files.push(page_path);
        summary.pages += 1;

        if let Some(quiz) = &page.quiz {
            let quiz_path = output_dir.join(format!("quiz-{}.json", page.page));
            std::fs::write(&quiz_path, serde_json::to_string_pretty(quiz)?)?;
            summary.files.push(quiz_path);
            summary.quizzes += 1;
        }
    }

    info!(
        "Exported {} pages and {} quizzes to {}",
        summary.pages,
        summary.quizzes,
        output_dir.display()
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::testing::quiz_json;
    use crate::types::{ContentType, Level, Quiz, Subtopic, Topic};
    use tempfile::TempDir;

    fn content() -> Content {
        Content {
            title: "Photosynthesis".to_string(),
            level: Level::SchoolKid,
            content_type: ContentType::Concise,
            topics: vec![Topic {
                title: "Basics".to_string(),
                subtopics: vec![
                    Subtopic {
                        title: "Light".to_string(),
                        page: 1,
                        summary: "Light.".to_string(),
                        requires: vec![],
                    },
                    Subtopic {
                        title: "Leaves".to_string(),
                        page: 2,
                        summary: "Leaves.".to_string(),
                        requires: vec![],
                    },
                ],
            }],
            total_pages: 2,
        }
    }

    #[test]
    fn test_export_layout() {
        let dir = TempDir::new().unwrap();
        let quiz: Quiz = serde_json::from_str(&quiz_json(6, 4)).unwrap();

        let mut pages = BTreeMap::new();
        pages.insert(
            1,
            PageContent {
                page: 1,
                title: "Light".to_string(),
                raw_content: "<p>raw</p>".to_string(),
                refined_content: Some("<p>refined</p>".to_string()),
                quiz: None,
            },
        );
        pages.insert(
            2,
            PageContent {
                page: 2,
                title: "Leaves".to_string(),
                raw_content: "<p>leaves</p>".to_string(),
                refined_content: None,
                quiz: Some(quiz.clone()),
            },
        );

        let out = dir.path().join("lesson");
        let summary = export_lesson(&out, &content(), &pages).unwrap();

        assert_eq!(summary.pages, 2);
        assert_eq!(summary.quizzes, 1);
        assert_eq!(summary.files.len(), 4);

        assert_eq!(
            std::fs::read_to_string(out.join("page-1.html")).unwrap(),
            "<p>refined</p>"
        );
        assert_eq!(
            std::fs::read_to_string(out.join("page-2.html")).unwrap(),
            "<p>leaves</p>"
        );
        assert!(!out.join("quiz-1.json").exists());

        let saved: Quiz =
            serde_json::from_str(&std::fs::read_to_string(out.join("quiz-2.json")).unwrap())
                .unwrap();
        assert_eq!(saved, quiz);

        let outline: Content =
            serde_json::from_str(&std::fs::read_to_string(out.join("content.json")).unwrap())
                .unwrap();
        assert_eq!(outline, content());
    }
}

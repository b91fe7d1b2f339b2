//! Prompt templates for each generation stage.

use crate::ai::prompt::PromptBuilder;
use crate::constants::quiz as quiz_shape;
use crate::types::{ContentType, Level, REFERENCES_TITLE};

use super::page::PageRequest;

/// HTML vocabulary pages must stick to
const HTML_VOCABULARY: &str = r#"Allowed elements and classes:
- <h2 class="lesson-heading"> page heading (exactly one, first)
- <h3 class="lesson-subheading"> section headings
- <p class="lesson-text"> paragraphs
- <ul class="lesson-list"> / <ol class="lesson-list"> with <li>
- <table class="lesson-table"> with <thead>, <tbody>, <tr>, <th>, <td>
- <div class="lesson-callout"> key takeaways or warnings
- <div class="lesson-example"> worked examples
- <dl class="lesson-definition"> with <dt>/<dd> for terms
- <strong>, <em>, <code> inline"#;

const MATH_RULES: &str = "Write math with KaTeX delimiters: $...$ for inline math and $$...$$ for display math. Never use \\( \\) or \\[ \\].";

const IMAGE_PLACEHOLDER: &str = "[image:<short search phrase>:<detailed description for an illustrator>]";

const ANIMATION_PLACEHOLDER: &str = "[animation:<one or two keywords>:<what the animation should show>]";

pub fn refine_prompt(original: &str, level: Level, content_type: ContentType) -> String {
    PromptBuilder::new()
        .role("curriculum designer", "turning short topic requests into lesson briefs")
        .objectives(vec![
            "Rewrite the request as one detailed paragraph describing the lesson to build",
            "Name the key concepts, the order to teach them in and useful examples",
            "Match the audience and depth below",
        ])
        .context_item("Request", original)
        .audience(level, content_type)
        .rules(vec![
            "Return only the paragraph, no headings, lists or preamble",
            "Do not change the subject of the request",
        ])
        .build()
}

pub fn outline(refined_prompt: &str, level: Level, content_type: ContentType) -> String {
    let (min_topics, max_topics) = content_type.topic_range();
    let topic_rule = format!(
        "Use {} to {} main topics, each with 2 to 4 subtopics, then a final topic titled \"{}\" with one subtopic",
        min_topics, max_topics, REFERENCES_TITLE
    );

    PromptBuilder::new()
        .role("instructional designer", "structuring lessons into pages")
        .objectives(vec![
            "Split the lesson into topics and subtopics",
            "Give every subtopic its own page, numbered sequentially from 1 across the whole lesson",
            "Tag each subtopic with the capabilities its page needs",
        ])
        .context_item("Lesson brief", refined_prompt)
        .audience(level, content_type)
        .rules(vec![
            topic_rule.as_str(),
            "Every subtopic has a title, a one-sentence summary and a numeric page",
            "\"requires\" lists any of: Image, Animation, Simulation, Table, List",
            "Page numbers are unique integers with no gaps",
        ])
        .output(
            "a single JSON object",
            r#"{
  "title": "Lesson title",
  "topics": [
    {
      "title": "Topic title",
      "subtopics": [
        { "title": "Subtopic", "page": 1, "summary": "One sentence.", "requires": ["Image"] }
      ]
    }
  ]
}"#,
        )
        .build()
}

pub fn page(request: &PageRequest<'_>) -> String {
    let builder = PromptBuilder::new()
        .role("teacher", "writing clear, engaging lesson pages in HTML")
        .context_item("Lesson brief", request.refined_prompt)
        .context_item("Page", &request.page.to_string())
        .context_item("Page title", request.title)
        .context_item("Page summary", request.summary)
        .audience(request.level, request.content_type)
        .section("HTML", HTML_VOCABULARY)
        .section("Math", MATH_RULES);

    if request.title.trim().eq_ignore_ascii_case(REFERENCES_TITLE) {
        return builder
            .objectives(vec![
                "List 5 to 8 reputable sources for the lesson brief",
                "Format each as author or organisation, title, year and URL when known",
            ])
            .rules(vec![
                "Use one <ol class=\"lesson-list\"> of citations under the page heading",
                "Do not invent URLs; omit the URL when unsure",
                "Return only the HTML fragment, no markdown fences",
            ])
            .build();
    }

    let mut rules = vec![
        "Return only the HTML fragment: no <html>, <head> or <body>, no markdown fences".to_string(),
        "Cover only this page's subtopic; other pages cover the rest".to_string(),
    ];
    if request.requires.iter().any(|r| r.eq_ignore_ascii_case("image")) {
        rules.push(format!(
            "Include one or two image placeholders on their own line, exactly as {}",
            IMAGE_PLACEHOLDER
        ));
    }
    if request
        .requires
        .iter()
        .any(|r| r.eq_ignore_ascii_case("animation") || r.eq_ignore_ascii_case("simulation"))
    {
        rules.push(format!(
            "Include one animation placeholder on its own line, exactly as {}",
            ANIMATION_PLACEHOLDER
        ));
    }
    if request.requires.iter().any(|r| r.eq_ignore_ascii_case("table")) {
        rules.push("Include a comparison or data table".to_string());
    }
    if request.requires.iter().any(|r| r.eq_ignore_ascii_case("list")) {
        rules.push("Include at least one list".to_string());
    }

    builder
        .objectives(vec![
            "Teach the page title thoroughly at the requested level",
            "Open with the page heading, then build the idea step by step",
            "Finish with a short callout summarizing the key takeaway",
        ])
        .rules(rules.iter().map(String::as_str).collect())
        .build()
}

pub fn refine_content(html: &str, level: Level, content_type: ContentType) -> String {
    PromptBuilder::new()
        .role("editor", "adapting lesson pages to an audience")
        .objectives(vec![
            "Adjust tone, vocabulary and length to the audience and depth below",
            "Keep every fact, heading, element, class, math expression and embedded media unchanged",
        ])
        .audience(level, content_type)
        .section("Page", html)
        .rules(vec![
            "Return only the revised HTML fragment, no markdown fences or commentary",
            "Do not add or remove <img>, <iframe> or <figure> elements",
        ])
        .build()
}

pub fn quiz(topic: &str, content: &str, level: Level) -> String {
    let count_rule = format!(
        "Exactly {} questions, each with exactly {} answers",
        quiz_shape::QUESTION_COUNT,
        quiz_shape::ANSWERS_PER_QUESTION
    );
    let answer_rule = format!(
        "\"correctAnswer\" is the 1-based index of the right answer as a string, \"1\" to \"{}\"",
        quiz_shape::ANSWERS_PER_QUESTION
    );

    PromptBuilder::new()
        .role("assessment designer", "short multiple-choice quizzes")
        .objectives(vec![
            "Check understanding of the topic using the lesson text",
            "Mix recall and reasoning questions",
        ])
        .context_item("Topic", topic)
        .context_item(
            "Audience",
            &format!("{} ({})", level.as_str(), level.guidance()),
        )
        .section("Lesson text", content)
        .rules(vec![
            count_rule.as_str(),
            answer_rule.as_str(),
            "Every question has an explanation and short right/wrong messages",
        ])
        .output(
            "a single JSON object",
            r##"{
  "quizTitle": "Topic quiz",
  "quizSynopsis": "One sentence.",
  "progressBarColor": "#9de1f6",
  "nrOfQuestions": "6",
  "questions": [
    {
      "question": "Question text?",
      "questionType": "text",
      "answerSelectionType": "single",
      "answers": ["A", "B", "C", "D"],
      "correctAnswer": "2",
      "messageForCorrectAnswer": "Correct!",
      "messageForIncorrectAnswer": "Not quite.",
      "explanation": "Why B is right.",
      "point": "10"
    }
  ]
}"##,
        )
        .build()
}

//! Console Progress Rendering
//!
//! Subscribes to a [`FlowTracker`] and prints one line per flow event.
//! Line-oriented so it stays readable when stdout is not a terminal.

use std::time::{Duration, Instant};

use console::style;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

use crate::generation::{FlowEvent, FlowState, FlowTracker};

const BAR_WIDTH: usize = 30;

pub struct ConsoleRenderer {
    receiver: broadcast::Receiver<FlowEvent>,
    started: Instant,
}

impl ConsoleRenderer {
    /// Subscribe before the run starts so no event is missed
    pub fn new(tracker: &FlowTracker) -> Self {
        Self {
            receiver: tracker.subscribe(),
            started: Instant::now(),
        }
    }

    /// Print events until the flow completes or fails
    pub fn spawn(mut self) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                match self.receiver.recv().await {
                    Ok(event) => {
                        if let Some(line) = render_event(&event, self.started.elapsed()) {
                            println!("{}", line);
                        }
                        if let FlowEvent::StateChanged { state, .. } = &event
                            && state.is_terminal()
                        {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::debug!("Progress renderer skipped {} events", skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }
}

fn render_event(event: &FlowEvent, elapsed: Duration) -> Option<String> {
    match event {
        FlowEvent::StateChanged { state, progress } => match state {
            FlowState::Idle => None,
            FlowState::Complete => Some(format!(
                "{} Lesson complete in {}",
                style("✓").green(),
                format_duration(elapsed.as_secs())
            )),
            FlowState::Error(message) => Some(format!("{} {}", style("✗").red(), message)),
            other => Some(format!(
                "{} {:>3.0}%  {}",
                render_progress_bar(*progress, BAR_WIDTH),
                progress,
                other
            )),
        },
        FlowEvent::OutlineReady { title, total_pages } => Some(format!(
            "{} {} ({} pages)",
            style("Outline:").bold(),
            title,
            total_pages
        )),
        FlowEvent::PageReady {
            page,
            title,
            has_quiz,
        } => Some(format!(
            "  {} page {}: {}{}",
            style("✓").green(),
            page,
            title,
            if *has_quiz { " + quiz" } else { "" }
        )),
        FlowEvent::PageFailed { page, title, error } => Some(format!(
            "  {} page {}: {} ({})",
            style("✗").red(),
            page,
            title,
            error
        )),
    }
}

/// Bar for a 0-100 percentage
fn render_progress_bar(percent: f32, width: usize) -> String {
    let ratio = (percent / 100.0).clamp(0.0, 1.0);
    let filled = (ratio * width as f32) as usize;
    let empty = width.saturating_sub(filled);

    format!("[{}{}]", "█".repeat(filled), "░".repeat(empty))
}

fn format_duration(secs: u64) -> String {
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_bar_render() {
        assert_eq!(render_progress_bar(0.0, 10), "[░░░░░░░░░░]");
        assert_eq!(render_progress_bar(50.0, 10), "[█████░░░░░]");
        assert_eq!(render_progress_bar(100.0, 10), "[██████████]");
        assert_eq!(render_progress_bar(140.0, 10), "[██████████]");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(30), "30s");
        assert_eq!(format_duration(90), "1m 30s");
        assert_eq!(format_duration(3700), "1h 1m");
    }

    #[test]
    fn test_render_page_events() {
        let ready = render_event(
            &FlowEvent::PageReady {
                page: 3,
                title: "Oxygen".to_string(),
                has_quiz: true,
            },
            Duration::ZERO,
        )
        .unwrap();
        assert!(ready.contains("page 3: Oxygen + quiz"));

        let failed = render_event(
            &FlowEvent::PageFailed {
                page: 2,
                title: "Leaves".to_string(),
                error: "timeout".to_string(),
            },
            Duration::ZERO,
        )
        .unwrap();
        assert!(failed.contains("page 2: Leaves (timeout)"));
    }

    #[test]
    fn test_render_state_events() {
        let idle = FlowEvent::StateChanged {
            state: FlowState::Idle,
            progress: 0.0,
        };
        assert!(render_event(&idle, Duration::ZERO).is_none());

        let pages = FlowEvent::StateChanged {
            state: FlowState::GeneratingPages {
                completed: 1,
                total: 2,
            },
            progress: 70.0,
        };
        let line = render_event(&pages, Duration::ZERO).unwrap();
        assert!(line.contains(" 70%  generating pages (1/2)"));
    }

    #[tokio::test]
    async fn test_renderer_stops_on_terminal_state() {
        let tracker = FlowTracker::new();
        let handle = ConsoleRenderer::new(&tracker).spawn();

        tracker.transition(FlowState::RefiningPrompt, 10.0);
        tracker.transition(FlowState::Complete, 100.0);

        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("renderer finished")
            .unwrap();
    }
}

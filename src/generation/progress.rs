//! Flow state and progress publication.
//!
//! `FlowTracker` keeps the latest `FlowSnapshot` for polling and broadcasts
//! every change as a `FlowEvent` for streaming observers.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use tokio::sync::broadcast;

use crate::constants::pipeline::EVENT_CHANNEL_CAPACITY;
use crate::constants::progress;
use crate::types::{Content, PageContent};

/// Orchestrator state; `Error` is absorbing until the next run resets it
#[derive(Debug, Clone, PartialEq)]
pub enum FlowState {
    Idle,
    RefiningPrompt,
    GeneratingOutline,
    GeneratingPages { completed: usize, total: usize },
    Complete,
    Error(String),
}

impl FlowState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Error(_))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}

impl fmt::Display for FlowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::RefiningPrompt => write!(f, "refining prompt"),
            Self::GeneratingOutline => write!(f, "generating outline"),
            Self::GeneratingPages { completed, total } => {
                write!(f, "generating pages ({}/{})", completed, total)
            }
            Self::Complete => write!(f, "complete"),
            Self::Error(message) => write!(f, "error: {}", message),
        }
    }
}

#[derive(Debug, Clone)]
pub enum FlowEvent {
    StateChanged { state: FlowState, progress: f32 },
    OutlineReady { title: String, total_pages: u32 },
    PageReady { page: u32, title: String, has_quiz: bool },
    PageFailed { page: u32, title: String, error: String },
}

/// Point-in-time view of a run
#[derive(Debug, Clone)]
pub struct FlowSnapshot {
    pub state: FlowState,
    /// 0-100
    pub progress: f32,
    pub content: Option<Content>,
    pub pages: BTreeMap<u32, PageContent>,
    pub failed_pages: BTreeMap<u32, String>,
}

impl Default for FlowSnapshot {
    fn default() -> Self {
        Self {
            state: FlowState::Idle,
            progress: 0.0,
            content: None,
            pages: BTreeMap::new(),
            failed_pages: BTreeMap::new(),
        }
    }
}

/// Progress after `completed` of `total` pages
pub fn page_progress(completed: usize, total: usize) -> f32 {
    if total == 0 {
        return progress::COMPLETE;
    }
    let ratio = (completed.min(total)) as f32 / total as f32;
    progress::OUTLINED + ratio * progress::PAGES_SPAN
}

#[derive(Clone)]
pub struct FlowTracker {
    snapshot: Arc<RwLock<FlowSnapshot>>,
    sender: broadcast::Sender<FlowEvent>,
}

impl Default for FlowTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl FlowTracker {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            snapshot: Arc::new(RwLock::new(FlowSnapshot::default())),
            sender,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FlowEvent> {
        self.sender.subscribe()
    }

    pub fn snapshot(&self) -> FlowSnapshot {
        self.snapshot
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn state(&self) -> FlowState {
        self.snapshot
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .state
            .clone()
    }

    #[inline]
    fn emit(&self, event: FlowEvent) {
        // No receivers when nothing is watching the run
        let _ = self.sender.send(event);
    }

    fn write<R>(&self, f: impl FnOnce(&mut FlowSnapshot) -> R) -> R {
        let mut snapshot = self
            .snapshot
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut snapshot)
    }

    /// Clear everything for a fresh run
    pub fn reset(&self) {
        self.write(|s| *s = FlowSnapshot::default());
        self.emit(FlowEvent::StateChanged {
            state: FlowState::Idle,
            progress: 0.0,
        });
    }

    /// Move to `state`; ignored once the run has failed
    pub fn transition(&self, state: FlowState, progress: f32) {
        let applied = self.write(|s| {
            if s.state.is_error() {
                return false;
            }
            s.state = state.clone();
            s.progress = progress;
            true
        });
        if applied {
            self.emit(FlowEvent::StateChanged { state, progress });
        }
    }

    pub fn set_content(&self, content: &Content) {
        self.write(|s| s.content = Some(content.clone()));
        self.emit(FlowEvent::OutlineReady {
            title: content.title.clone(),
            total_pages: content.total_pages,
        });
    }

    pub fn page_ready(&self, page: &PageContent) {
        self.write(|s| {
            s.failed_pages.remove(&page.page);
            s.pages.insert(page.page, page.clone());
        });
        self.emit(FlowEvent::PageReady {
            page: page.page,
            title: page.title.clone(),
            has_quiz: page.quiz.is_some(),
        });
    }

    pub fn page_failed(&self, page: u32, title: &str, error: &str) {
        self.write(|s| s.failed_pages.insert(page, error.to_string()));
        self.emit(FlowEvent::PageFailed {
            page,
            title: title.to_string(),
            error: error.to_string(),
        });
    }

    pub fn fail(&self, message: impl Into<String>) {
        let message = message.into();
        let progress = self.write(|s| {
            s.state = FlowState::Error(message.clone());
            s.progress
        });
        self.emit(FlowEvent::StateChanged {
            state: FlowState::Error(message),
            progress,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(n: u32) -> PageContent {
        PageContent {
            page: n,
            title: format!("Page {}", n),
            raw_content: "<p>x</p>".to_string(),
            refined_content: None,
            quiz: None,
        }
    }

    #[test]
    fn test_page_progress() {
        assert_eq!(page_progress(0, 4), 40.0);
        assert_eq!(page_progress(2, 4), 70.0);
        assert_eq!(page_progress(4, 4), 100.0);
        assert_eq!(page_progress(9, 4), 100.0);
        assert_eq!(page_progress(0, 0), 100.0);
    }

    #[test]
    fn test_error_is_absorbing() {
        let tracker = FlowTracker::new();
        tracker.transition(FlowState::GeneratingOutline, 20.0);
        tracker.fail("outline exploded");
        tracker.transition(FlowState::Complete, 100.0);

        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.state, FlowState::Error("outline exploded".to_string()));
        assert_eq!(snapshot.progress, 20.0);

        tracker.reset();
        assert_eq!(tracker.state(), FlowState::Idle);
    }

    #[test]
    fn test_pages_tracked_by_number() {
        let tracker = FlowTracker::new();
        tracker.page_failed(2, "Page 2", "timeout");
        tracker.page_ready(&page(3));
        tracker.page_ready(&page(1));

        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.pages.keys().copied().collect::<Vec<_>>(), vec![1, 3]);
        assert_eq!(snapshot.failed_pages.get(&2).map(String::as_str), Some("timeout"));

        tracker.page_ready(&page(2));
        assert!(tracker.snapshot().failed_pages.is_empty());
    }

    #[tokio::test]
    async fn test_events_broadcast_to_subscribers() {
        let tracker = FlowTracker::new();
        let mut rx = tracker.subscribe();

        tracker.transition(FlowState::RefiningPrompt, 10.0);
        tracker.page_ready(&page(1));

        match rx.recv().await.unwrap() {
            FlowEvent::StateChanged { state, progress } => {
                assert_eq!(state, FlowState::RefiningPrompt);
                assert_eq!(progress, 10.0);
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert!(matches!(
            rx.recv().await.unwrap(),
            FlowEvent::PageReady { page: 1, has_quiz: false, .. }
        ));
    }

    #[test]
    fn test_state_display() {
        let state = FlowState::GeneratingPages {
            completed: 2,
            total: 5,
        };
        assert_eq!(state.to_string(), "generating pages (2/5)");
    }
}

//! Global Constants
//!
//! Centralized constants for configuration and tuning.
//! All magic numbers should be defined here with documentation.

/// Cache constants
pub mod cache {
    /// Assumed total storage capacity (5 MiB)
    pub const DEFAULT_CAPACITY_BYTES: usize = 5 * 1024 * 1024;

    /// Largest single item accepted (1 MiB, key + value, UTF-16 estimate)
    pub const DEFAULT_MAX_ITEM_BYTES: usize = 1024 * 1024;

    /// Usage ratio above which a write triggers eviction
    pub const EVICTION_THRESHOLD: f64 = 0.90;

    /// Bytes per UTF-16 code unit in the size estimate
    pub const BYTES_PER_CODE_UNIT: usize = 2;

    /// Key prefixes for each cached artifact kind
    pub mod kind {
        pub const REFINED_PROMPT: &str = "refined";
        pub const CONTENT: &str = "content";
        pub const PAGE: &str = "page";
    }
}

/// Progress percentages reported by the content flow
pub mod progress {
    pub const REFINING: f32 = 10.0;
    pub const REFINED: f32 = 20.0;
    pub const OUTLINED: f32 = 40.0;
    /// Share of the bar covered by page generation
    pub const PAGES_SPAN: f32 = 60.0;
    pub const COMPLETE: f32 = 100.0;
}

/// Quiz shape constraints
pub mod quiz {
    pub const QUESTION_COUNT: usize = 6;
    pub const ANSWERS_PER_QUESTION: usize = 4;
    pub const POINTS_PER_QUESTION: &str = "10";
}

/// Pipeline constants
pub mod pipeline {
    /// Default number of pages generated concurrently
    pub const DEFAULT_PAGE_CONCURRENCY: usize = 1;

    /// Upper bound on page concurrency
    pub const MAX_PAGE_CONCURRENCY: usize = 16;

    /// Event channel capacity for flow observers
    pub const EVENT_CHANNEL_CAPACITY: usize = 256;
}

/// HTTP/Network constants
pub mod network {
    /// Default request timeout (seconds)
    pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

    /// Image search/generation timeout (seconds)
    pub const IMAGE_TIMEOUT_SECS: u64 = 120;

    /// Maximum retries for transient backend failures
    pub const MAX_NETWORK_RETRIES: usize = 3;

    /// Base delay for exponential backoff (milliseconds)
    pub const BASE_DELAY_MS: u64 = 500;

    /// Maximum delay between retries (seconds)
    pub const MAX_DELAY_SECS: u64 = 30;
}

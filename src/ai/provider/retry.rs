//! Backoff policy shared by HTTP backends.
//!
//! Only errors whose category is retryable (rate limit, network, 5xx) are
//! retried; callers pair this with `.when(LessonError::is_recoverable)`.

use std::time::Duration;

use backon::ExponentialBuilder;

use crate::constants::network;

/// Exponential backoff with jitter, capped at `max_retries` attempts
pub fn retry_policy(max_retries: usize) -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(network::BASE_DELAY_MS))
        .with_max_delay(Duration::from_secs(network::MAX_DELAY_SECS))
        .with_max_times(max_retries)
        .with_jitter()
}

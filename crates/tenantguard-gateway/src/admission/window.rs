use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Request timestamps for one key, oldest first.
#[derive(Debug, Default)]
pub struct RateWindow {
    hits: VecDeque<Instant>,
}

impl RateWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop timestamps older than `now - window`. Hits are time-ordered, so this
    /// only ever pops from the front.
    pub fn trim(&mut self, now: Instant, window: Duration) {
        while let Some(&oldest) = self.hits.front() {
            if now.saturating_duration_since(oldest) > window {
                self.hits.pop_front();
            } else {
                break;
            }
        }
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn is_full(&self, max_requests: u32) -> bool {
        self.hits.len() >= max_requests as usize
    }

    pub fn record(&mut self, now: Instant) {
        self.hits.push_back(now);
    }

    /// Seconds until the oldest hit leaves the window (min 1).
    pub fn retry_after(&self, now: Instant, window: Duration) -> u64 {
        let wait = self
            .hits
            .front()
            .map(|&oldest| (oldest + window).saturating_duration_since(now))
            .unwrap_or(Duration::ZERO);
        let secs = wait.as_secs() + u64::from(wait.subsec_nanos() > 0);
        secs.max(1)
    }

    /// No hit inside the window: safe to forget.
    pub fn is_idle(&self, now: Instant, window: Duration) -> bool {
        self.hits
            .back()
            .map_or(true, |&newest| now.saturating_duration_since(newest) > window)
    }
}

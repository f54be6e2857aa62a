//! Time-boxed exhaustion cache for (provider, model) pairs.
//!
//! When a provider reports quota or rate-limit exhaustion, its pair enters a
//! fixed cooldown window and every router call skips it until the window
//! lapses. The cache is process-local state owned by the router, not a
//! global, so tests can drive it with explicit instants.

use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Debug)]
pub struct CooldownCache {
    window: Duration,
    until: HashMap<(String, String), Instant>,
}

impl CooldownCache {
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            until: HashMap::new(),
        }
    }

    /// Starts (or restarts) the cooldown window for a pair.
    pub fn start(&mut self, provider: &str, model: &str, now: Instant) {
        self.until
            .insert((provider.to_string(), model.to_string()), now + self.window);
    }

    /// Whether the pair is still cooling down. Expired entries are dropped
    /// as they are observed.
    pub fn is_cooling(&mut self, provider: &str, model: &str, now: Instant) -> bool {
        let pair = (provider.to_string(), model.to_string());
        match self.until.get(&pair) {
            Some(deadline) if now < *deadline => true,
            Some(_) => {
                self.until.remove(&pair);
                false
            }
            None => false,
        }
    }

    /// Number of pairs still inside their window.
    #[must_use]
    pub fn active(&self, now: Instant) -> usize {
        self.until.values().filter(|deadline| now < **deadline).count()
    }
}

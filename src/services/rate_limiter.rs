// Per-wallet burst cap: at most `max_plays` plays inside a trailing window.

use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, VecDeque};

use crate::error::{AppError, Result};

#[derive(Debug)]
pub struct RateLimiter {
    window: Duration,
    max_plays: usize,
    recent: HashMap<String, VecDeque<DateTime<Utc>>>,
}

impl RateLimiter {
    pub fn new(window: Duration, max_plays: usize) -> Self {
        Self {
            window,
            max_plays,
            recent: HashMap::new(),
        }
    }

    // Drops timestamps at or before `now - window`.
    fn prune_window(plays: &mut VecDeque<DateTime<Utc>>, cutoff: DateTime<Utc>) {
        while plays.front().is_some_and(|ts| *ts <= cutoff) {
            plays.pop_front();
        }
    }

    /// Records a play at `now` unless the wallet is already at the cap.
    pub fn check_and_record(&mut self, wallet: &str, now: DateTime<Utc>) -> Result<()> {
        let cutoff = now - self.window;
        let plays = self.recent.entry(wallet.to_string()).or_default();
        Self::prune_window(plays, cutoff);

        if plays.len() >= self.max_plays {
            tracing::warn!(
                wallet = %wallet,
                plays_in_window = plays.len(),
                "Burst rate limit hit"
            );
            return Err(AppError::RateLimited);
        }

        plays.push_back(now);
        Ok(())
    }

    #[cfg(test)]
    pub fn plays_in_window(&self, wallet: &str, now: DateTime<Utc>) -> usize {
        let cutoff = now - self.window;
        self.recent
            .get(wallet)
            .map(|plays| plays.iter().filter(|ts| **ts > cutoff).count())
            .unwrap_or(0)
    }

    /// Forgets wallets with no plays left in the window.
    pub fn prune(&mut self, now: DateTime<Utc>) -> usize {
        let cutoff = now - self.window;
        let before = self.recent.len();
        self.recent.retain(|_, plays| {
            Self::prune_window(plays, cutoff);
            !plays.is_empty()
        });
        before - self.recent.len()
    }
}

use chrono::{DateTime, Utc};

use crate::models::{GameStatusResponse, PendingJackpot, PendingJackpotView};

pub const JACKPOT_PAUSE_REASON: &str = "Jackpot verification in progress";

/// Global pause switch. A pending jackpot always implies `paused`; only
/// [`GameState::approve_and_resume`] clears it.
#[derive(Debug, Default)]
pub struct GameState {
    paused: bool,
    reason: Option<String>,
    pending_jackpot: Option<PendingJackpot>,
}

impl GameState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    pub fn pending_jackpot(&self) -> Option<&PendingJackpot> {
        self.pending_jackpot.as_ref()
    }

    /// Manual pause. Does not touch a pending jackpot.
    pub fn pause(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        tracing::warn!("Game paused: {}", reason);
        self.paused = true;
        if self.pending_jackpot.is_none() {
            self.reason = Some(reason);
        }
    }

    pub fn set_pending_jackpot(&mut self, wallet: &str, amount: u64, won_at: DateTime<Utc>) {
        self.pending_jackpot = Some(PendingJackpot {
            wallet: wallet.to_string(),
            amount,
            won_at,
        });
        self.paused = true;
        self.reason = Some(JACKPOT_PAUSE_REASON.to_string());
    }

    /// Clears any pending jackpot and resumes play. Returns the jackpot that was pending.
    pub fn approve_and_resume(&mut self) -> Option<PendingJackpot> {
        self.paused = false;
        self.reason = None;
        self.pending_jackpot.take()
    }

    pub fn status(&self) -> GameStatusResponse {
        GameStatusResponse {
            paused: self.paused,
            reason: self.reason.clone(),
            pending_jackpot: self.pending_jackpot.as_ref().map(PendingJackpotView::from),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_invariant(state: &GameState) {
        if state.pending_jackpot().is_some() {
            assert!(state.is_paused());
        }
    }

    #[test]
    fn jackpot_pauses_and_approval_resumes() {
        let mut state = GameState::new();
        assert!(!state.is_paused());

        let now = Utc::now();
        state.set_pending_jackpot("winner", 1000, now);
        assert_invariant(&state);
        assert!(state.is_paused());
        assert_eq!(state.reason(), Some(JACKPOT_PAUSE_REASON));
        assert_eq!(state.pending_jackpot().map(|j| j.amount), Some(1000));

        let cleared = state.approve_and_resume().unwrap();
        assert_eq!(cleared.wallet, "winner");
        assert!(!state.is_paused());
        assert!(state.pending_jackpot().is_none());
        assert_invariant(&state);
    }

    #[test]
    fn manual_pause_keeps_jackpot_reason() {
        let mut state = GameState::new();
        state.set_pending_jackpot("winner", 500, Utc::now());
        state.pause("maintenance");
        assert_eq!(state.reason(), Some(JACKPOT_PAUSE_REASON));
        assert_invariant(&state);
    }

    #[test]
    fn approve_without_jackpot_is_unconditional() {
        let mut state = GameState::new();
        state.pause("maintenance");
        assert!(state.approve_and_resume().is_none());
        assert!(!state.is_paused());
        assert!(state.reason().is_none());
    }

    #[test]
    fn status_exposes_pending_jackpot_in_millis() {
        let mut state = GameState::new();
        let now = Utc::now();
        state.set_pending_jackpot("winner", 42, now);
        let status = state.status();
        assert!(status.paused);
        let view = status.pending_jackpot.unwrap();
        assert_eq!(view.timestamp, now.timestamp_millis());
        assert_eq!(view.winner, "winner");
    }
}

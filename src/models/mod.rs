// src/models/mod.rs
pub mod game;

pub use game::{
    AdminStats,
    GameResult,
    GameStatusResponse,
    Outcome,
    PendingJackpot,
    PendingJackpotView,
    PlayerRecord,
};

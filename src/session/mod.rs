//! Speech session management
//!
//! This module provides the `Session` abstraction that manages:
//! - The engine handle, from startup to shutdown
//! - Output modes (wave file, log file, memory) and pause state
//! - The speech queue: speak, typing, sync, reset
//! - Rate, speaker and user-dictionary parameters

mod config;
mod modes;
mod queue;
mod session;
mod stats;

pub use config::SessionConfig;
pub use modes::{Mode, ModeController, ResetToken, Transition, TransitionGuard};
pub use queue::validate_text;
pub use session::{validate_rate, ResetHandle, Session};
pub use stats::SessionStats;

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::modes::Mode;

/// Snapshot of a speech session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStats {
    pub session_id: String,

    /// Whether the engine handle is still valid
    pub is_live: bool,

    /// When the session was started
    pub started_at: DateTime<Utc>,

    /// Seconds since startup
    pub duration_secs: f64,

    /// Current output mode
    pub mode: Mode,

    /// Whether audio output is paused
    pub paused: bool,

    /// Number of phrases and typed characters queued so far
    pub phrases_queued: u64,

    /// Currently loaded user dictionary, if any
    pub user_dictionary: Option<PathBuf>,
}

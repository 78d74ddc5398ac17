use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::engine::{DeviceOption, DeviceOptions, Voice};

/// Configuration for a speech session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Unique session identifier (e.g., "session-announcer")
    pub session_id: String,

    /// Device-usage options passed to engine startup
    pub device_options: Vec<DeviceOption>,

    /// Initial speaking rate in words per minute (engine default when unset)
    pub rate: Option<u32>,

    /// Initial speaker voice (engine default when unset)
    pub speaker: Option<Voice>,

    /// User dictionary loaded right after startup
    pub user_dictionary: Option<PathBuf>,
}

impl SessionConfig {
    pub fn device_options(&self) -> DeviceOptions {
        self.device_options.iter().copied().collect()
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_id: format!("session-{}", uuid::Uuid::new_v4()),
            device_options: Vec::new(),
            rate: None,
            speaker: None,
            user_dictionary: None,
        }
    }
}

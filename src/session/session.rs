use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::config::SessionConfig;
use super::modes::{Mode, ModeController, Transition};
use super::stats::SessionStats;
use crate::engine::{codes, DeviceOptions, Engine, EngineHandle, EngineVersion, Voice};
use crate::error::{translate, OrderingError, ParameterError, Result};
use crate::language::LanguageRegistry;

/// Check a speaking rate against the engine's 75..=600 words-per-minute range.
pub fn validate_rate(rate: u32) -> Result<u32> {
    if (codes::MIN_RATE..=codes::MAX_RATE).contains(&rate) {
        Ok(rate)
    } else {
        Err(ParameterError::RateOutOfRange(rate).into())
    }
}

/// A speech engine session
///
/// Owns the engine handle from startup until [`Session::shutdown`] (or drop).
/// Methods take `&mut self`, so a session is driven from one thread at a
/// time; [`ResetHandle`] is the only way to act on it from elsewhere.
pub struct Session {
    /// Session identifier used in logs and stats
    pub(super) id: String,

    /// Identity for reset tokens
    pub(super) instance: Uuid,

    pub(super) engine: Arc<dyn Engine>,

    /// Engine handle; `None` once shut down
    pub(super) handle: Option<Arc<EngineHandle>>,

    pub(super) modes: ModeController,

    /// Device options chosen at startup
    pub(super) options: DeviceOptions,

    /// User dictionary loaded through this session
    dictionary: Option<PathBuf>,

    started_at: chrono::DateTime<Utc>,
}

impl Session {
    /// Start a new session in Active mode with the engine's default rate and speaker
    pub fn start(engine: Arc<dyn Engine>, options: DeviceOptions) -> Result<Self> {
        Self::start_with_id(engine, options, format!("session-{}", Uuid::new_v4()))
    }

    /// Start a session and apply the configured rate, speaker and dictionary
    pub fn from_config(engine: Arc<dyn Engine>, config: &SessionConfig) -> Result<Self> {
        let mut session =
            Self::start_with_id(engine, config.device_options(), config.session_id.clone())?;

        if let Some(rate) = config.rate {
            session.set_rate(rate)?;
        }
        if let Some(voice) = config.speaker {
            session.set_speaker(voice)?;
        }
        if let Some(path) = &config.user_dictionary {
            session.load_user_dictionary(path)?;
        }

        Ok(session)
    }

    fn start_with_id(engine: Arc<dyn Engine>, options: DeviceOptions, id: String) -> Result<Self> {
        info!("Starting speech session: {} (options={:#010x})", id, options.bits());

        let handle = translate(engine.startup(options))?;

        info!("Session {} started (handle={})", id, handle.as_raw());

        Ok(Self {
            id,
            instance: Uuid::new_v4(),
            engine,
            handle: Some(Arc::new(handle)),
            modes: ModeController::new(),
            options,
            dictionary: None,
            started_at: Utc::now(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn options(&self) -> DeviceOptions {
        self.options
    }

    pub fn mode(&self) -> Mode {
        self.modes.mode()
    }

    pub fn is_paused(&self) -> bool {
        self.modes.is_paused()
    }

    pub fn is_live(&self) -> bool {
        self.handle.is_some()
    }

    pub fn user_dictionary(&self) -> Option<&Path> {
        self.dictionary.as_deref()
    }

    /// Borrow the engine handle, failing once the session is shut down.
    pub(super) fn handle(&self) -> Result<&EngineHandle> {
        self.handle
            .as_deref()
            .ok_or_else(|| OrderingError::SessionClosed.into())
    }

    /// Load a user pronunciation dictionary.
    ///
    /// Only one dictionary may be loaded; unload the current one first.
    pub fn load_user_dictionary(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let handle = self.handle()?;
        if let Some(loaded) = &self.dictionary {
            warn!("Dictionary {} already loaded", loaded.display());
            return Err(OrderingError::DictionaryLoaded(loaded.clone()).into());
        }

        translate(self.engine.load_user_dictionary(handle, path))?;
        info!("User dictionary loaded: {}", path.display());
        self.dictionary = Some(path.to_path_buf());
        Ok(())
    }

    /// Unload the user dictionary.
    ///
    /// Always forwarded: the engine may have loaded a default dictionary at
    /// startup that this session never saw.
    pub fn unload_user_dictionary(&mut self) -> Result<()> {
        let handle = self.handle()?;
        translate(self.engine.unload_user_dictionary(handle))?;
        if let Some(path) = self.dictionary.take() {
            info!("User dictionary unloaded: {}", path.display());
        }
        Ok(())
    }

    /// Current speaking rate. May still report the previous rate until the
    /// next phrase boundary after a [`Session::set_rate`].
    pub fn get_rate(&mut self) -> Result<u32> {
        let handle = self.handle()?;
        let rate = translate(self.engine.get_rate(handle))?;
        let clamped = rate.clamp(codes::MIN_RATE, codes::MAX_RATE);
        if clamped != rate {
            warn!("Engine reported rate {} outside range, clamped to {}", rate, clamped);
        }
        Ok(clamped)
    }

    /// Set the speaking rate, effective at the next phrase boundary.
    pub fn set_rate(&mut self, rate: u32) -> Result<()> {
        validate_rate(rate)?;
        let handle = self.handle()?;
        translate(self.engine.set_rate(handle, rate))?;
        debug!("Rate change to {} wpm queued", rate);
        Ok(())
    }

    /// The last voice that actually spoke.
    pub fn get_speaker(&mut self) -> Result<Voice> {
        let handle = self.handle()?;
        let raw = translate(self.engine.get_speaker(handle))?;
        Voice::from_raw(raw).ok_or_else(|| ParameterError::UnknownVoice(raw).into())
    }

    /// Set the speaker voice, effective at the next phrase boundary.
    pub fn set_speaker(&mut self, voice: Voice) -> Result<()> {
        let handle = self.handle()?;
        translate(self.engine.set_speaker(handle, voice))?;
        debug!("Speaker change to {} queued", voice);
        Ok(())
    }

    pub fn version(&self) -> EngineVersion {
        let (packed, text) = self.engine.version();
        EngineVersion::from_packed(packed, text)
    }

    /// Language registry backed by this session's engine. Languages are
    /// engine-global and outlive the session.
    pub fn languages(&self) -> LanguageRegistry {
        LanguageRegistry::new(Arc::clone(&self.engine))
    }

    /// A handle that can reset this session from another thread, e.g. to
    /// unblock a [`Session::sync`].
    pub fn reset_handle(&self) -> Result<ResetHandle> {
        let handle = self
            .handle
            .as_ref()
            .ok_or(OrderingError::SessionClosed)?;
        Ok(ResetHandle {
            session_id: self.id.clone(),
            engine: Arc::clone(&self.engine),
            handle: Arc::downgrade(handle),
            modes: self.modes.clone(),
        })
    }

    pub fn stats(&self) -> SessionStats {
        let duration = Utc::now().signed_duration_since(self.started_at);

        SessionStats {
            session_id: self.id.clone(),
            is_live: self.is_live(),
            started_at: self.started_at,
            duration_secs: duration.num_milliseconds() as f64 / 1000.0,
            mode: self.modes.mode(),
            paused: self.modes.is_paused(),
            phrases_queued: self.modes.generation(),
            user_dictionary: self.dictionary.clone(),
        }
    }

    /// Shut the engine down, discarding queued text and releasing the user
    /// dictionary. Close any wave, log or memory mode first.
    pub fn shutdown(&mut self) -> Result<()> {
        let handle = self.handle()?;
        let guard = self.modes.begin(Transition::Shutdown)?;

        info!("Shutting down session: {}", self.id);
        translate(self.engine.shutdown(handle))?;
        guard.commit();

        self.handle = None;
        self.dictionary = None;

        info!("Session {} shut down", self.id);
        Ok(())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };

        warn!("Session {} dropped while live; shutting down", self.id);

        if self.modes.mode() != Mode::Active {
            if let Err(e) = translate(self.engine.reset(&handle, true)) {
                warn!("Failed to close {} mode: {}", self.modes.mode(), e);
            }
        }
        if let Err(e) = translate(self.engine.shutdown(&handle)) {
            warn!("Failed to shut down session {}: {}", self.id, e);
        }
        self.modes.mark_closed();
    }
}

/// Resets a session from a thread other than its owner
///
/// The only cancellation primitive: it drops every queued phrase, not a
/// single one.
#[derive(Clone)]
pub struct ResetHandle {
    session_id: String,
    engine: Arc<dyn Engine>,
    handle: Weak<EngineHandle>,
    modes: ModeController,
}

impl ResetHandle {
    pub fn reset(&self, full: bool) -> Result<()> {
        let handle = self.handle.upgrade().ok_or(OrderingError::SessionClosed)?;
        let guard = self.modes.begin(Transition::Reset { full })?;
        translate(self.engine.reset(&handle, full))?;
        guard.commit();
        info!("Session {} reset from handle (full={})", self.session_id, full);
        Ok(())
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }
}

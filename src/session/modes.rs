//! Output-mode state machine
//!
//! Exactly one mode holds at a time:
//! - Active (initial): speech goes to the audio device or is ignored
//! - WaveFile / LogFile / Memory: speech is captured, entered only from Active
//!
//! Paused is a side flag layered over whichever mode holds. Every transition
//! registers as pending while its engine call runs, so an opposite transition
//! arriving from the reset handle's thread is rejected locally.

use std::fmt;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::session::Session;
use crate::engine::{LogFlags, SpeechBuffer, WaveFormat};
use crate::error::{translate, OrderingError, ParameterError, Result};

/// Output mode of a session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    #[default]
    Active,
    WaveFile,
    LogFile,
    Memory,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Active => write!(f, "active"),
            Mode::WaveFile => write!(f, "wave-file"),
            Mode::LogFile => write!(f, "log-file"),
            Mode::Memory => write!(f, "memory"),
        }
    }
}

/// A state change in flight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transition {
    Pause,
    Resume,
    Open(Mode),
    Close(Mode),
    Reset { full: bool },
    Shutdown,
}

impl Transition {
    fn changes_mode(&self) -> bool {
        matches!(
            self,
            Transition::Open(_) | Transition::Close(_) | Transition::Reset { full: true }
        )
    }

    /// Whether `self` undoes or races `other`.
    pub fn conflicts_with(&self, other: &Transition) -> bool {
        use Transition::*;
        match (self, other) {
            (Shutdown, _) | (_, Shutdown) => true,
            (Pause, Resume) | (Resume, Pause) => true,
            // opening a mode resumes output
            (Pause, Open(_)) | (Open(_), Pause) => true,
            (a, b) => a.changes_mode() && b.changes_mode(),
        }
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transition::Pause => write!(f, "pause"),
            Transition::Resume => write!(f, "resume"),
            Transition::Open(mode) => write!(f, "open {mode}"),
            Transition::Close(mode) => write!(f, "close {mode}"),
            Transition::Reset { full: true } => write!(f, "full reset"),
            Transition::Reset { full: false } => write!(f, "reset"),
            Transition::Shutdown => write!(f, "shutdown"),
        }
    }
}

#[derive(Debug, Default)]
struct ModeState {
    mode: Mode,
    paused: bool,
    closed: bool,
    pending: Vec<Transition>,
    /// Bumped on every queued submission
    generation: u64,
}

/// Thread-safe mode state shared by a session and its reset handles
#[derive(Debug, Clone, Default)]
pub struct ModeController {
    state: Arc<Mutex<ModeState>>,
}

impl ModeController {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ModeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn mode(&self) -> Mode {
        self.lock().mode
    }

    pub fn is_paused(&self) -> bool {
        self.lock().paused
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Start a transition, validating it against the current mode and
    /// anything already pending. The returned guard must be committed once
    /// the engine call succeeds; dropping it abandons the transition.
    pub fn begin(&self, transition: Transition) -> Result<TransitionGuard<'_>> {
        let mut state = self.lock();
        if state.closed {
            return Err(OrderingError::SessionClosed.into());
        }

        if let Some(pending) = state
            .pending
            .iter()
            .find(|p| transition.conflicts_with(p))
        {
            warn!("Rejected {} while {} is pending", transition, pending);
            return Err(OrderingError::TransitionPending {
                requested: transition,
                pending: *pending,
            }
            .into());
        }

        match transition {
            Transition::Open(requested) if state.mode == requested => {
                return Err(OrderingError::ModeAlreadyOpen(requested).into());
            }
            Transition::Open(requested) if state.mode != Mode::Active => {
                return Err(OrderingError::ModeConflict {
                    open: state.mode,
                    requested,
                }
                .into());
            }
            Transition::Close(mode) if state.mode != mode => {
                return Err(OrderingError::NotOpen(mode).into());
            }
            Transition::Shutdown if state.mode != Mode::Active => {
                return Err(OrderingError::ModeStillOpen(state.mode).into());
            }
            _ => {}
        }

        state.pending.push(transition);
        Ok(TransitionGuard {
            controller: self,
            transition,
            committed: false,
        })
    }

    /// Fails unless `mode` currently holds.
    pub(crate) fn require(&self, mode: Mode) -> Result<()> {
        let state = self.lock();
        if state.closed {
            return Err(OrderingError::SessionClosed.into());
        }
        if state.mode != mode {
            return Err(OrderingError::NotOpen(mode).into());
        }
        Ok(())
    }

    pub(crate) fn clear_paused(&self) {
        self.lock().paused = false;
    }

    pub(crate) fn note_queued(&self) -> u64 {
        let mut state = self.lock();
        state.generation += 1;
        state.generation
    }

    pub(crate) fn generation(&self) -> u64 {
        self.lock().generation
    }

    pub(crate) fn mark_closed(&self) {
        let mut state = self.lock();
        state.closed = true;
        state.mode = Mode::Active;
        state.paused = false;
    }
}

/// An in-flight transition
#[must_use = "a transition guard does nothing unless committed"]
pub struct TransitionGuard<'a> {
    controller: &'a ModeController,
    transition: Transition,
    committed: bool,
}

impl TransitionGuard<'_> {
    pub fn commit(mut self) {
        let mut state = self.controller.lock();
        let before = state.mode;
        match self.transition {
            Transition::Pause => state.paused = true,
            Transition::Resume => state.paused = false,
            Transition::Open(mode) => {
                state.mode = mode;
                state.paused = false;
            }
            Transition::Close(_) | Transition::Reset { full: true } => state.mode = Mode::Active,
            Transition::Reset { full: false } => {}
            Transition::Shutdown => {
                state.closed = true;
                state.paused = false;
            }
        }
        debug!("Mode: {} -> {} after {}", before, state.mode, self.transition);
        self.committed = true;
    }
}

impl Drop for TransitionGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.controller.lock();
        if let Some(i) = state.pending.iter().position(|p| *p == self.transition) {
            state.pending.remove(i);
        }
        if !self.committed {
            debug!("Abandoned {}", self.transition);
        }
    }
}

/// Proof that a reset completed with nothing queued afterwards
///
/// Required by [`Session::close_in_memory`]; tearing down memory buffers
/// while the synthesizer is busy can deadlock the engine.
#[must_use]
#[derive(Debug)]
pub struct ResetToken {
    pub(crate) session: uuid::Uuid,
    pub(crate) generation: u64,
}

impl Session {
    /// Enter wave-file mode. Resumes output if paused.
    pub fn open_wave_out_file(&mut self, path: impl AsRef<Path>, format: WaveFormat) -> Result<()> {
        let path = path.as_ref();
        let handle = self.handle()?;
        let guard = self.modes.begin(Transition::Open(Mode::WaveFile))?;
        translate(self.engine.open_wave_out_file(handle, path, format))?;
        guard.commit();
        info!("Wave file opened: {} ({})", path.display(), format);
        Ok(())
    }

    pub fn close_wave_out_file(&mut self) -> Result<()> {
        let handle = self.handle()?;
        let guard = self.modes.begin(Transition::Close(Mode::WaveFile))?;
        translate(self.engine.close_wave_out_file(handle))?;
        guard.commit();
        info!("Wave file closed");
        Ok(())
    }

    /// Enter log-file mode. Resumes output if paused.
    ///
    /// Several flags may be combined; the engine then interleaves record
    /// kinds in no particular order.
    pub fn open_log_file(&mut self, path: impl AsRef<Path>, flags: LogFlags) -> Result<()> {
        let path = path.as_ref();
        if flags.is_empty() {
            return Err(ParameterError::EmptyLogFlags.into());
        }
        let handle = self.handle()?;
        let guard = self.modes.begin(Transition::Open(Mode::LogFile))?;
        translate(self.engine.open_log_file(handle, path, flags))?;
        guard.commit();
        info!("Log file opened: {}", path.display());
        Ok(())
    }

    pub fn close_log_file(&mut self) -> Result<()> {
        let handle = self.handle()?;
        let guard = self.modes.begin(Transition::Close(Mode::LogFile))?;
        translate(self.engine.close_log_file(handle))?;
        guard.commit();
        info!("Log file closed");
        Ok(())
    }

    /// Enter memory mode: speech samples go to buffers added with
    /// [`Session::add_buffer`].
    pub fn open_in_memory(&mut self, format: WaveFormat) -> Result<()> {
        let handle = self.handle()?;
        let guard = self.modes.begin(Transition::Open(Mode::Memory))?;
        translate(self.engine.open_in_memory(handle, format))?;
        guard.commit();
        info!("Memory capture opened ({})", format);
        Ok(())
    }

    pub fn add_buffer(&mut self, buffer: SpeechBuffer) -> Result<()> {
        if buffer.capacity() == 0 {
            return Err(ParameterError::EmptyBuffer.into());
        }
        let handle = self.handle()?;
        self.modes.require(Mode::Memory)?;
        translate(self.engine.add_buffer(handle, buffer))
    }

    pub fn return_buffer(&mut self) -> Result<Option<SpeechBuffer>> {
        let handle = self.handle()?;
        self.modes.require(Mode::Memory)?;
        translate(self.engine.return_buffer(handle))
    }

    /// Leave memory mode. Needs the token from a [`Session::reset`] issued
    /// after the last queued text.
    pub fn close_in_memory(&mut self, token: ResetToken) -> Result<()> {
        if token.session != self.instance {
            return Err(OrderingError::ForeignResetToken.into());
        }
        if token.generation != self.modes.generation() {
            return Err(OrderingError::StaleResetToken.into());
        }
        let handle = self.handle()?;
        let guard = self.modes.begin(Transition::Close(Mode::Memory))?;
        translate(self.engine.close_in_memory(handle))?;
        guard.commit();
        info!("Memory capture closed");
        Ok(())
    }

    /// Pause audio output. A second pause is a no-op.
    pub fn pause(&mut self) -> Result<()> {
        let handle = self.handle()?;
        if self.modes.is_paused() {
            debug!("Already paused");
            return Ok(());
        }
        let guard = self.modes.begin(Transition::Pause)?;
        translate(self.engine.pause(handle))?;
        guard.commit();
        Ok(())
    }

    pub fn resume(&mut self) -> Result<()> {
        let handle = self.handle()?;
        let guard = self.modes.begin(Transition::Resume)?;
        translate(self.engine.resume(handle))?;
        guard.commit();
        Ok(())
    }

    /// Flush queued text and stop output. With `full`, any special mode is
    /// closed and the session returns to Active.
    pub fn reset(&mut self, full: bool) -> Result<ResetToken> {
        let handle = self.handle()?;
        let guard = self.modes.begin(Transition::Reset { full })?;
        translate(self.engine.reset(handle, full))?;
        guard.commit();
        info!("Session {} reset (full={})", self.id, full);
        Ok(ResetToken {
            session: self.instance,
            generation: self.modes.generation(),
        })
    }
}

//! Synthesis engine capability
//!
//! The native engine is reached only through the [`Engine`] trait. Its
//! methods mirror the engine's entry points and hand back raw result words;
//! classification happens in [`crate::error`].
//!
//! Implementations:
//! - [`SimulatedEngine`]: in-process reference engine (tests, CLI, demos)
//! - native bindings: provided by the embedding application

pub mod codes;
mod render;
mod simulated;
mod types;

pub use render::MAX_PHRASE_MS;
pub use simulated::{SimulatedEngine, SimulatedEngineConfig};
pub use types::{
    DeviceOption, DeviceOptions, EngineVersion, LogFlag, LogFlags, SpeakPriority, SpeechBuffer,
    Voice, WaveFormat,
};

/// Raw session result word as returned by the engine. `0` means success.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MmResult(pub u32);

/// Engine call outcome before classification
pub type EngineResult<T = ()> = std::result::Result<T, MmResult>;

/// Opaque engine handle
///
/// Owned exclusively by one session. Deliberately neither `Clone` nor `Copy`:
/// every other component borrows it.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct EngineHandle(u64);

impl EngineHandle {
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn as_raw(&self) -> u64 {
        self.0
    }
}

/// Engine-internal load handle for a language pack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LanguageHandle(pub u32);

/// Speech synthesis engine trait
///
/// The engine is internally synchronized, so every method takes `&self`.
/// Callers still serialize per-handle calls; only `reset` may race with a
/// blocked `sync` on the same handle.
pub trait Engine: Send + Sync {
    /// Create a new engine instance
    fn startup(&self, options: DeviceOptions) -> EngineResult<EngineHandle>;

    /// Destroy the instance, discarding queued text and unloading its dictionary
    fn shutdown(&self, handle: &EngineHandle) -> EngineResult;

    /// Queue text for rendering. Never blocks.
    fn speak(&self, handle: &EngineHandle, text: &str, priority: SpeakPriority) -> EngineResult;

    /// Render one character as fast as possible, dropping queued text
    fn typing(&self, handle: &EngineHandle, character: char) -> EngineResult;

    /// Block until all queued text has been rendered
    fn sync(&self, handle: &EngineHandle) -> EngineResult;

    fn pause(&self, handle: &EngineHandle) -> EngineResult;

    fn resume(&self, handle: &EngineHandle) -> EngineResult;

    /// Flush queued text; with `full` also close any special mode
    fn reset(&self, handle: &EngineHandle, full: bool) -> EngineResult;

    fn open_wave_out_file(
        &self,
        handle: &EngineHandle,
        path: &std::path::Path,
        format: WaveFormat,
    ) -> EngineResult;

    fn close_wave_out_file(&self, handle: &EngineHandle) -> EngineResult;

    fn open_log_file(
        &self,
        handle: &EngineHandle,
        path: &std::path::Path,
        flags: LogFlags,
    ) -> EngineResult;

    fn close_log_file(&self, handle: &EngineHandle) -> EngineResult;

    fn open_in_memory(&self, handle: &EngineHandle, format: WaveFormat) -> EngineResult;

    fn close_in_memory(&self, handle: &EngineHandle) -> EngineResult;

    /// Hand a caller-allocated buffer to the engine's fill list
    fn add_buffer(&self, handle: &EngineHandle, buffer: SpeechBuffer) -> EngineResult;

    /// Take back the oldest buffer, filled or not
    fn return_buffer(&self, handle: &EngineHandle) -> EngineResult<Option<SpeechBuffer>>;

    fn load_user_dictionary(&self, handle: &EngineHandle, path: &std::path::Path) -> EngineResult;

    fn unload_user_dictionary(&self, handle: &EngineHandle) -> EngineResult;

    /// Rate in effect or pending, in words per minute
    fn get_rate(&self, handle: &EngineHandle) -> EngineResult<u32>;

    /// Takes effect at the next phrase boundary
    fn set_rate(&self, handle: &EngineHandle, rate: u32) -> EngineResult;

    /// Raw identifier of the last voice that spoke
    fn get_speaker(&self, handle: &EngineHandle) -> EngineResult<u32>;

    /// Takes effect at the next phrase boundary
    fn set_speaker(&self, handle: &EngineHandle, voice: Voice) -> EngineResult;

    /// Packed version word and optional text
    fn version(&self) -> (u32, Option<String>);

    /// Load a language pack. Returns a handle word or a word with
    /// `TTS_LANG_ERROR` set.
    fn start_lang(&self, code: &str) -> u32;

    /// Make a loaded language current for the calling thread
    fn select_lang(&self, language: LanguageHandle) -> bool;

    /// Release one reference; `false` while other references remain
    fn close_lang(&self, code: &str) -> bool;
}

//! Error taxonomy for engine sessions
//!
//! Every raw engine result word is classified here before it reaches a
//! caller. Session results and language results live in separate code spaces
//! and are classified by separate functions.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::engine::{codes, MmResult};
use crate::session::{Mode, Transition};

/// Result type alias using the crate's `Error` type
pub type Result<T> = std::result::Result<T, Error>;

/// Broad classification of an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Driver, licence or memory exhaustion. Usually fatal to the session.
    Resource,
    /// Bad handle, argument, device id or format. Correct the input and retry.
    Parameter,
    /// Usage-protocol violation detected locally, never sent to the engine.
    Ordering,
    /// Language pack not supported or not installed.
    Language,
}

/// All errors surfaced by a session
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("resource error: {0}")]
    Resource(#[from] ResourceError),

    #[error("parameter error: {0}")]
    Parameter(#[from] ParameterError),

    #[error("ordering error: {0}")]
    Ordering(#[from] OrderingError),

    #[error("language error: {0}")]
    Language(#[from] LanguageError),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Resource(_) => ErrorKind::Resource,
            Error::Parameter(_) => ErrorKind::Parameter,
            Error::Ordering(_) => ErrorKind::Ordering,
            Error::Language(_) => ErrorKind::Language,
        }
    }

    /// Raw engine code this error was classified from, if any.
    pub fn raw_code(&self) -> Option<u32> {
        match self {
            Error::Resource(e) => Some(e.code()),
            Error::Parameter(e) => e.code(),
            Error::Ordering(_) => None,
            Error::Language(e) => Some(e.code()),
        }
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceError {
    #[error("{}", message(codes::MMSYSERR_NODRIVER))]
    NoDriver,

    #[error("{}", message(codes::MMSYSERR_ERROR))]
    General,

    #[error("{}", message(codes::MMSYSERR_ALLOCATED))]
    Allocated,

    #[error("{}", message(codes::MMSYSERR_NOTENABLED))]
    NotEnabled,

    #[error("{}", message(codes::MMSYSERR_NOMEM))]
    NoMem,

    #[error("unrecognized engine result code {0}")]
    Unrecognized(u32),
}

impl ResourceError {
    pub fn code(&self) -> u32 {
        match self {
            ResourceError::NoDriver => codes::MMSYSERR_NODRIVER,
            ResourceError::General => codes::MMSYSERR_ERROR,
            ResourceError::Allocated => codes::MMSYSERR_ALLOCATED,
            ResourceError::NotEnabled => codes::MMSYSERR_NOTENABLED,
            ResourceError::NoMem => codes::MMSYSERR_NOMEM,
            ResourceError::Unrecognized(code) => *code,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParameterError {
    #[error("{}", message(codes::MMSYSERR_INVALHANDLE))]
    InvalidHandle,

    #[error("{}", message(codes::MMSYSERR_INVALPARAM))]
    InvalidParam,

    #[error("{}", message(codes::MMSYSERR_BADDEVICEID))]
    BadDeviceId,

    #[error("{}", message(codes::WAVERR_BADFORMAT))]
    BadWaveFormat,

    #[error("speaking rate {0} is outside 75..=600 words per minute")]
    RateOutOfRange(u32),

    #[error("engine reported unknown voice identifier {0}")]
    UnknownVoice(u32),

    #[error("text contains an interior NUL byte at offset {0}")]
    InteriorNul(usize),

    #[error("memory buffer capacity must be non-zero")]
    EmptyBuffer,

    #[error("log file needs at least one log flag")]
    EmptyLogFlags,
}

impl ParameterError {
    /// Engine code for errors the engine reported; `None` for local checks.
    pub fn code(&self) -> Option<u32> {
        match self {
            ParameterError::InvalidHandle => Some(codes::MMSYSERR_INVALHANDLE),
            ParameterError::InvalidParam => Some(codes::MMSYSERR_INVALPARAM),
            ParameterError::BadDeviceId => Some(codes::MMSYSERR_BADDEVICEID),
            ParameterError::BadWaveFormat => Some(codes::WAVERR_BADFORMAT),
            _ => None,
        }
    }
}

/// Usage-protocol violations. These never reach the engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OrderingError {
    #[error("session has been shut down")]
    SessionClosed,

    #[error("{0} mode is not open")]
    NotOpen(Mode),

    #[error("{0} mode is already open")]
    ModeAlreadyOpen(Mode),

    #[error("cannot open {requested} mode while {open} mode is open")]
    ModeConflict { open: Mode, requested: Mode },

    #[error("cannot shut down while {0} mode is open")]
    ModeStillOpen(Mode),

    #[error("{requested} requested while {pending} is still pending")]
    TransitionPending {
        requested: Transition,
        pending: Transition,
    },

    #[error("user dictionary {} is already loaded", .0.display())]
    DictionaryLoaded(PathBuf),

    #[error("typing requires direct output to a live audio device")]
    TypingRequiresAudioDevice,

    #[error("reset token does not belong to this session")]
    ForeignResetToken,

    #[error("text was queued after the reset; reset again before closing memory mode")]
    StaleResetToken,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LanguageError {
    #[error("{}", language_message(codes::TTS_NOT_SUPPORTED))]
    NotSupported,

    #[error("{}", language_message(codes::TTS_NOT_AVAILABLE))]
    NotAvailable,
}

impl LanguageError {
    pub fn code(&self) -> u32 {
        match self {
            LanguageError::NotSupported => codes::TTS_NOT_SUPPORTED,
            LanguageError::NotAvailable => codes::TTS_NOT_AVAILABLE,
        }
    }
}

/// Static message for a session result code.
pub fn message(code: u32) -> &'static str {
    match code {
        codes::MMSYSERR_NOERROR => "no error",
        codes::MMSYSERR_NODRIVER => "no audio driver available",
        codes::MMSYSERR_ERROR => "general error occurred",
        codes::MMSYSERR_ALLOCATED => "no more license units available",
        codes::MMSYSERR_NOTENABLED => "no license unit exists",
        codes::MMSYSERR_NOMEM => "no memory available",
        codes::MMSYSERR_INVALHANDLE => "invalid handle",
        codes::MMSYSERR_INVALPARAM => "invalid parameter",
        codes::MMSYSERR_BADDEVICEID => "device id out of range",
        codes::WAVERR_BADFORMAT => "wave output device does not support the requested format",
        _ => "unknown error",
    }
}

/// Static message for a language result code.
pub fn language_message(code: u32) -> &'static str {
    match code {
        codes::TTS_NOT_SUPPORTED => "language not supported",
        codes::TTS_NOT_AVAILABLE => "language not available",
        _ => "unknown language error",
    }
}

/// Classify a raw session result. `0` is success.
pub fn classify(code: MmResult) -> Option<Error> {
    let err = match code.0 {
        codes::MMSYSERR_NOERROR => return None,
        codes::MMSYSERR_NODRIVER => ResourceError::NoDriver.into(),
        codes::MMSYSERR_ERROR => ResourceError::General.into(),
        codes::MMSYSERR_ALLOCATED => ResourceError::Allocated.into(),
        codes::MMSYSERR_NOTENABLED => ResourceError::NotEnabled.into(),
        codes::MMSYSERR_NOMEM => ResourceError::NoMem.into(),
        codes::MMSYSERR_INVALHANDLE => ParameterError::InvalidHandle.into(),
        codes::MMSYSERR_INVALPARAM => ParameterError::InvalidParam.into(),
        codes::MMSYSERR_BADDEVICEID => ParameterError::BadDeviceId.into(),
        codes::WAVERR_BADFORMAT => ParameterError::BadWaveFormat.into(),
        other => ResourceError::Unrecognized(other).into(),
    };
    Some(err)
}

/// Classify a raw language word returned by a language load.
///
/// Only words carrying the `TTS_LANG_ERROR` bit are errors; anything else is
/// a load handle.
pub fn classify_language(word: u32) -> Option<LanguageError> {
    if word & codes::TTS_LANG_ERROR == 0 {
        return None;
    }
    match word {
        codes::TTS_NOT_AVAILABLE => Some(LanguageError::NotAvailable),
        // Unknown error words are reported as unsupported
        _ => Some(LanguageError::NotSupported),
    }
}

/// Funnel an engine result through the classifier.
pub(crate) fn translate<T>(result: std::result::Result<T, MmResult>) -> Result<T> {
    result.map_err(|code| {
        classify(code).unwrap_or(Error::Resource(ResourceError::Unrecognized(code.0)))
    })
}

impl fmt::Display for MmResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", message(self.0), self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_is_not_an_error() {
        assert_eq!(classify(MmResult(0)), None);
    }

    #[test]
    fn test_resource_codes() {
        for (code, expected) in [
            (6, ResourceError::NoDriver),
            (1, ResourceError::General),
            (4, ResourceError::Allocated),
            (3, ResourceError::NotEnabled),
            (7, ResourceError::NoMem),
        ] {
            let err = classify(MmResult(code)).unwrap();
            assert_eq!(err, Error::Resource(expected));
            assert_eq!(err.kind(), ErrorKind::Resource);
            assert_eq!(err.raw_code(), Some(code));
        }
    }

    #[test]
    fn test_parameter_codes() {
        for (code, expected) in [
            (5, ParameterError::InvalidHandle),
            (11, ParameterError::InvalidParam),
            (2, ParameterError::BadDeviceId),
            (32, ParameterError::BadWaveFormat),
        ] {
            let err = classify(MmResult(code)).unwrap();
            assert_eq!(err.kind(), ErrorKind::Parameter);
            assert_eq!(err, Error::Parameter(expected));
        }
    }

    #[test]
    fn test_unknown_code_keeps_raw_value() {
        let err = classify(MmResult(999)).unwrap();
        assert_eq!(err, Error::Resource(ResourceError::Unrecognized(999)));
        assert_eq!(err.raw_code(), Some(999));
    }

    #[test]
    fn test_messages_are_human_readable() {
        let err = classify(MmResult(4)).unwrap();
        assert_eq!(
            err.to_string(),
            "resource error: no more license units available"
        );
        let err = classify(MmResult(5)).unwrap();
        assert_eq!(err.to_string(), "parameter error: invalid handle");
    }

    #[test]
    fn test_language_words() {
        assert_eq!(classify_language(3), None);
        assert_eq!(
            classify_language(codes::TTS_NOT_SUPPORTED),
            Some(LanguageError::NotSupported)
        );
        assert_eq!(
            classify_language(codes::TTS_NOT_AVAILABLE),
            Some(LanguageError::NotAvailable)
        );
        assert_eq!(LanguageError::NotAvailable.to_string(), "language not available");
    }

    #[test]
    fn test_local_parameter_errors_have_no_code() {
        assert_eq!(ParameterError::RateOutOfRange(1000).code(), None);
        let err: Error = OrderingError::SessionClosed.into();
        assert_eq!(err.kind(), ErrorKind::Ordering);
        assert_eq!(err.raw_code(), None);
    }

    #[test]
    fn test_translate_maps_engine_failure() {
        let ok: std::result::Result<u32, MmResult> = Ok(180);
        assert_eq!(translate(ok), Ok(180));
        let failed: std::result::Result<(), MmResult> = Err(MmResult(7));
        assert_eq!(translate(failed), Err(Error::Resource(ResourceError::NoMem)));
    }
}

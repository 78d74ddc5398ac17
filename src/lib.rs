pub mod config;
pub mod engine;
pub mod error;
pub mod language;
pub mod session;

pub use config::{Config, OutputConfig};
pub use engine::{
    DeviceOption, DeviceOptions, Engine, EngineVersion, LogFlag, LogFlags, SimulatedEngine,
    SimulatedEngineConfig, SpeakPriority, SpeechBuffer, Voice, WaveFormat,
};
pub use error::{
    classify, classify_language, Error, ErrorKind, LanguageError, OrderingError, ParameterError,
    ResourceError, Result,
};
pub use language::{Language, LanguageContext, LanguageRegistry};
pub use session::{
    Mode, ResetHandle, ResetToken, Session, SessionConfig, SessionStats, Transition,
};

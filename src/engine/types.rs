use std::fmt;
use std::ops::BitOr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::codes;

/// A single device-usage option chosen at session creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceOption {
    /// Render nothing to the audio device; only file and memory modes produce output
    DoNotUseAudioDevice,
    /// Keep the audio device open for the lifetime of the session
    OwnAudioDevice,
    /// Fail startup when the audio device cannot be opened
    ReportOpenError,
    /// Route audio through the alternate backend
    UseAlternateAudioBackend,
}

impl DeviceOption {
    pub const ALL: [DeviceOption; 4] = [
        DeviceOption::DoNotUseAudioDevice,
        DeviceOption::OwnAudioDevice,
        DeviceOption::ReportOpenError,
        DeviceOption::UseAlternateAudioBackend,
    ];

    pub fn bits(self) -> u32 {
        match self {
            DeviceOption::DoNotUseAudioDevice => codes::DO_NOT_USE_AUDIO_DEVICE,
            DeviceOption::OwnAudioDevice => codes::OWN_AUDIO_DEVICE,
            DeviceOption::ReportOpenError => codes::REPORT_OPEN_ERROR,
            DeviceOption::UseAlternateAudioBackend => codes::USE_SAPI5_AUDIO_DEVICE,
        }
    }
}

/// Set of [`DeviceOption`]s
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct DeviceOptions(u32);

impl DeviceOptions {
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Returns `None` if `bits` carries anything but known options.
    pub fn from_bits(bits: u32) -> Option<Self> {
        let known = DeviceOption::ALL.iter().fold(0, |acc, o| acc | o.bits());
        (bits & !known == 0).then_some(Self(bits))
    }

    pub fn bits(&self) -> u32 {
        self.0
    }

    pub fn contains(&self, option: DeviceOption) -> bool {
        self.0 & option.bits() != 0
    }

    pub fn with(self, option: DeviceOption) -> Self {
        Self(self.0 | option.bits())
    }

    pub fn iter(&self) -> impl Iterator<Item = DeviceOption> + '_ {
        DeviceOption::ALL.into_iter().filter(|o| self.contains(*o))
    }
}

impl From<DeviceOption> for DeviceOptions {
    fn from(option: DeviceOption) -> Self {
        Self(option.bits())
    }
}

impl FromIterator<DeviceOption> for DeviceOptions {
    fn from_iter<I: IntoIterator<Item = DeviceOption>>(iter: I) -> Self {
        iter.into_iter().fold(Self::empty(), Self::with)
    }
}

impl BitOr for DeviceOption {
    type Output = DeviceOptions;

    fn bitor(self, rhs: Self) -> DeviceOptions {
        DeviceOptions::from(self).with(rhs)
    }
}

impl BitOr<DeviceOption> for DeviceOptions {
    type Output = DeviceOptions;

    fn bitor(self, rhs: DeviceOption) -> DeviceOptions {
        self.with(rhs)
    }
}

/// Kind of record written to a log file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFlag {
    Text,
    Phonemes,
    Syllables,
}

impl LogFlag {
    pub const ALL: [LogFlag; 3] = [LogFlag::Text, LogFlag::Phonemes, LogFlag::Syllables];

    pub fn bits(self) -> u32 {
        match self {
            LogFlag::Text => codes::LOG_TEXT,
            LogFlag::Phonemes => codes::LOG_PHONEMES,
            LogFlag::Syllables => codes::LOG_SYLLABLES,
        }
    }
}

impl fmt::Display for LogFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogFlag::Text => write!(f, "text"),
            LogFlag::Phonemes => write!(f, "phonemes"),
            LogFlag::Syllables => write!(f, "syllables"),
        }
    }
}

impl FromStr for LogFlag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(LogFlag::Text),
            "phonemes" => Ok(LogFlag::Phonemes),
            "syllables" => Ok(LogFlag::Syllables),
            other => Err(format!("unknown log flag: {other}")),
        }
    }
}

/// Combinable set of [`LogFlag`]s
///
/// Any combination is accepted. With more than one flag the engine
/// interleaves record kinds in an unpredictable order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct LogFlags(u32);

impl LogFlags {
    pub const fn empty() -> Self {
        Self(0)
    }

    pub fn from_bits(bits: u32) -> Option<Self> {
        let known = LogFlag::ALL.iter().fold(0, |acc, f| acc | f.bits());
        (bits & !known == 0).then_some(Self(bits))
    }

    pub fn bits(&self) -> u32 {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn contains(&self, flag: LogFlag) -> bool {
        self.0 & flag.bits() != 0
    }

    pub fn with(self, flag: LogFlag) -> Self {
        Self(self.0 | flag.bits())
    }

    pub fn iter(&self) -> impl Iterator<Item = LogFlag> + '_ {
        LogFlag::ALL.into_iter().filter(|f| self.contains(*f))
    }
}

impl From<LogFlag> for LogFlags {
    fn from(flag: LogFlag) -> Self {
        Self(flag.bits())
    }
}

impl FromIterator<LogFlag> for LogFlags {
    fn from_iter<I: IntoIterator<Item = LogFlag>>(iter: I) -> Self {
        iter.into_iter().fold(Self::empty(), Self::with)
    }
}

impl BitOr for LogFlag {
    type Output = LogFlags;

    fn bitor(self, rhs: Self) -> LogFlags {
        LogFlags::from(self).with(rhs)
    }
}

impl BitOr<LogFlag> for LogFlags {
    type Output = LogFlags;

    fn bitor(self, rhs: LogFlag) -> LogFlags {
        self.with(rhs)
    }
}

/// Sample format for wave-file and memory capture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WaveFormat {
    /// Mono, 8-bit, 11.025 kHz
    #[serde(rename = "mono8-11025")]
    Mono8Khz11,
    /// Mono, 16-bit, 11.025 kHz
    #[serde(rename = "mono16-11025")]
    Mono16Khz11,
    /// Mono, 8-bit µ-law, 8 kHz
    #[serde(rename = "mulaw8-8000")]
    MuLaw8Khz8,
}

impl WaveFormat {
    pub fn bits(self) -> u32 {
        match self {
            WaveFormat::Mono8Khz11 => codes::WAVE_FORMAT_1M08,
            WaveFormat::Mono16Khz11 => codes::WAVE_FORMAT_1M16,
            WaveFormat::MuLaw8Khz8 => codes::WAVE_FORMAT_08M08,
        }
    }

    pub fn sample_rate(self) -> u32 {
        match self {
            WaveFormat::Mono8Khz11 | WaveFormat::Mono16Khz11 => 11025,
            WaveFormat::MuLaw8Khz8 => 8000,
        }
    }

    pub fn bits_per_sample(self) -> u16 {
        match self {
            WaveFormat::Mono16Khz11 => 16,
            WaveFormat::Mono8Khz11 | WaveFormat::MuLaw8Khz8 => 8,
        }
    }
}

impl fmt::Display for WaveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WaveFormat::Mono8Khz11 => write!(f, "mono8-11025"),
            WaveFormat::Mono16Khz11 => write!(f, "mono16-11025"),
            WaveFormat::MuLaw8Khz8 => write!(f, "mulaw8-8000"),
        }
    }
}

impl FromStr for WaveFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mono8-11025" | "1m08" => Ok(WaveFormat::Mono8Khz11),
            "mono16-11025" | "1m16" => Ok(WaveFormat::Mono16Khz11),
            "mulaw8-8000" | "08m08" => Ok(WaveFormat::MuLaw8Khz8),
            other => Err(format!("unknown wave format: {other}")),
        }
    }
}

/// Queueing priority for [`crate::Session::speak`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeakPriority {
    /// Ordinary sequential rendering
    #[default]
    Normal,
    /// Render even when the session does not use the audio device
    Force,
}

impl SpeakPriority {
    pub fn bits(self) -> u32 {
        match self {
            SpeakPriority::Normal => codes::TTS_NORMAL,
            SpeakPriority::Force => codes::TTS_FORCE,
        }
    }
}

/// Built-in speaker voices
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Voice {
    #[default]
    Paul,
    Betty,
    Harry,
    Frank,
    Dennis,
    Kit,
    Ursula,
    Rita,
    Wendy,
}

impl Voice {
    pub const ALL: [Voice; 9] = [
        Voice::Paul,
        Voice::Betty,
        Voice::Harry,
        Voice::Frank,
        Voice::Dennis,
        Voice::Kit,
        Voice::Ursula,
        Voice::Rita,
        Voice::Wendy,
    ];

    pub fn raw(self) -> u32 {
        self as u32
    }

    pub fn from_raw(raw: u32) -> Option<Self> {
        Self::ALL.get(raw as usize).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            Voice::Paul => "paul",
            Voice::Betty => "betty",
            Voice::Harry => "harry",
            Voice::Frank => "frank",
            Voice::Dennis => "dennis",
            Voice::Kit => "kit",
            Voice::Ursula => "ursula",
            Voice::Rita => "rita",
            Voice::Wendy => "wendy",
        }
    }
}

impl fmt::Display for Voice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Voice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|v| v.name() == lower)
            .ok_or_else(|| format!("unknown voice: {s}"))
    }
}

/// Caller-allocated buffer filled by the engine in memory mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeechBuffer {
    data: Vec<u8>,
    capacity: usize,
}

impl SpeechBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.data.len() >= self.capacity
    }

    /// Sample bytes written so far, in the memory mode's wave format
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Append as much of `bytes` as fits; returns the count consumed.
    pub fn fill(&mut self, bytes: &[u8]) -> usize {
        let room = self.capacity.saturating_sub(self.data.len());
        let take = room.min(bytes.len());
        self.data.extend_from_slice(&bytes[..take]);
        take
    }
}

/// Decoded engine version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineVersion {
    pub engine_major: u8,
    pub engine_minor: u8,
    pub protocol_major: u8,
    pub protocol_minor: u8,
    pub text: Option<String>,
}

impl EngineVersion {
    pub fn from_packed(packed: u32, text: Option<String>) -> Self {
        let [protocol_major, protocol_minor, engine_minor, engine_major] = packed.to_le_bytes();
        Self {
            engine_major,
            engine_minor,
            protocol_major,
            protocol_minor,
            text,
        }
    }
}

impl fmt::Display for EngineVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "engine {}.{}, protocol {}.{}",
            self.engine_major, self.engine_minor, self.protocol_major, self.protocol_minor
        )?;
        if let Some(text) = &self.text {
            write!(f, " ({text})")?;
        }
        Ok(())
    }
}

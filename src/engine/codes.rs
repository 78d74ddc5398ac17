//! Raw constants from the engine header

pub const MMSYSERR_NOERROR: u32 = 0;
pub const MMSYSERR_ERROR: u32 = 1;
pub const MMSYSERR_BADDEVICEID: u32 = 2;
pub const MMSYSERR_NOTENABLED: u32 = 3;
pub const MMSYSERR_ALLOCATED: u32 = 4;
pub const MMSYSERR_INVALHANDLE: u32 = 5;
pub const MMSYSERR_NODRIVER: u32 = 6;
pub const MMSYSERR_NOMEM: u32 = 7;
pub const MMSYSERR_INVALPARAM: u32 = 11;
pub const WAVERR_BADFORMAT: u32 = 32;

pub const TTS_LANG_ERROR: u32 = 0x4000;
pub const TTS_NOT_SUPPORTED: u32 = 0x7FFF;
pub const TTS_NOT_AVAILABLE: u32 = 0x7FFE;

pub const OWN_AUDIO_DEVICE: u32 = 0x0000_0001;
pub const REPORT_OPEN_ERROR: u32 = 0x0000_0002;
pub const USE_SAPI5_AUDIO_DEVICE: u32 = 0x4000_0000;
pub const DO_NOT_USE_AUDIO_DEVICE: u32 = 0x8000_0000;

pub const WAVE_FORMAT_1M08: u32 = 0x0000_0001;
pub const WAVE_FORMAT_1M16: u32 = 0x0000_0004;
pub const WAVE_FORMAT_08M08: u32 = 0x0000_1000;

pub const LOG_TEXT: u32 = 0x0000_0001;
pub const LOG_PHONEMES: u32 = 0x0000_0002;
pub const LOG_SYLLABLES: u32 = 0x0000_0008;

pub const TTS_NORMAL: u32 = 0;
pub const TTS_FORCE: u32 = 1;

pub const MIN_RATE: u32 = 75;
pub const MAX_RATE: u32 = 600;
pub const DEFAULT_RATE: u32 = 180;

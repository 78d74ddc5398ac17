//! Phrase rendering for the simulated engine
//!
//! No linguistics happen here: a phrase is timed from its word count and
//! explicit phoneme durations, then rendered as a tone at the speaker's
//! base pitch. The tone generator and µ-law encoder only give captures a
//! measurable length and format; they are not speech synthesis.

use std::collections::VecDeque;
use std::f32::consts::PI;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use hound::{SampleFormat, WavSpec, WavWriter};
use tracing::warn;

use super::codes;
use super::types::{LogFlag, LogFlags, SpeechBuffer, Voice, WaveFormat};

/// Longest rendering of a single phrase, in milliseconds. Longer requested
/// durations are truncated.
pub const MAX_PHRASE_MS: u64 = 60_000;

/// What a phrase asks for once directives are pulled out
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct Phrase {
    /// Text with all bracketed groups removed
    pub plain: String,
    pub words: usize,
    /// Sum of explicit `<duration,pitch>` durations, in milliseconds
    pub explicit_ms: u64,
    pub rate: Option<u32>,
    pub voice: Option<Voice>,
}

impl Phrase {
    pub fn parse(text: &str) -> Self {
        let mut phrase = Phrase::default();
        let mut rest = text;

        while let Some(open) = rest.find('[') {
            phrase.plain.push_str(&rest[..open]);
            let Some(close) = rest[open..].find(']') else {
                // unterminated group is spoken as text
                phrase.plain.push_str(&rest[open..]);
                rest = "";
                break;
            };
            let inner = &rest[open + 1..open + close];
            match inner.strip_prefix(':') {
                Some(directive) => phrase.apply_directive(directive),
                None => phrase.add_phonemes(inner),
            }
            phrase.plain.push(' ');
            rest = &rest[open + close + 1..];
        }
        phrase.plain.push_str(rest);
        phrase.words += phrase.plain.split_whitespace().count();
        phrase
    }

    fn apply_directive(&mut self, directive: &str) {
        let lower = directive.trim().to_ascii_lowercase();
        let mut parts = lower.split_whitespace();
        match parts.next() {
            Some("rate") => {
                self.rate = parts
                    .next()
                    .and_then(|r| r.parse().ok())
                    .filter(|r| (codes::MIN_RATE..=codes::MAX_RATE).contains(r));
            }
            Some("name") => {
                self.voice = parts.next().and_then(|n| n.parse().ok());
            }
            // [:np] [:nb] ... select a voice by initial
            Some(short) if short.len() == 2 && short.starts_with('n') => {
                self.voice = Voice::ALL
                    .into_iter()
                    .find(|v| v.name().as_bytes()[0] == short.as_bytes()[1]);
            }
            _ => {}
        }
    }

    fn add_phonemes(&mut self, group: &str) {
        let mut timed = false;
        let mut rest = group;
        while let Some(open) = rest.find('<') {
            let Some(close) = rest[open..].find('>') else {
                break;
            };
            let timing = &rest[open + 1..open + close];
            if let Some(ms) = timing.split(',').next().and_then(|d| d.trim().parse::<u64>().ok()) {
                self.explicit_ms = self.explicit_ms.saturating_add(ms);
                timed = true;
            }
            rest = &rest[open + close + 1..];
        }
        if !timed && !group.trim().is_empty() {
            self.words += 1;
        }
    }

    /// Rendering time at `rate`, capped at [`MAX_PHRASE_MS`]
    pub fn duration_ms(&self, rate: u32) -> u64 {
        let spoken = (self.words as u64).saturating_mul(60_000) / rate.max(1) as u64;
        self.explicit_ms.saturating_add(spoken).min(MAX_PHRASE_MS)
    }
}

/// Base pitch of each voice, in Hz
fn base_pitch(voice: Voice) -> f32 {
    match voice {
        Voice::Paul => 122.0,
        Voice::Betty => 208.0,
        Voice::Harry => 89.0,
        Voice::Frank => 155.0,
        Voice::Dennis => 110.0,
        Voice::Kit => 306.0,
        Voice::Ursula => 240.0,
        Voice::Rita => 106.0,
        Voice::Wendy => 200.0,
    }
}

pub(crate) fn synthesize(duration_ms: u64, voice: Voice, sample_rate: u32) -> Vec<i16> {
    let count = (duration_ms.min(MAX_PHRASE_MS) * sample_rate as u64 / 1000) as usize;
    let step = 2.0 * PI * base_pitch(voice) / sample_rate as f32;
    (0..count)
        .map(|i| ((i as f32 * step).sin() * 6000.0) as i16)
        .collect()
}

fn mulaw(sample: i16) -> u8 {
    const BIAS: i32 = 0x84;
    const CLIP: i32 = 32635;

    let mut s = sample as i32;
    let sign = if s < 0 {
        s = -s;
        0x80
    } else {
        0
    };
    s = s.min(CLIP) + BIAS;

    let mut exponent = 7;
    let mut mask = 0x4000;
    while exponent > 0 && s & mask == 0 {
        exponent -= 1;
        mask >>= 1;
    }
    let mantissa = (s >> (exponent + 3)) & 0x0F;
    !((sign | (exponent << 4) | mantissa) as u8)
}

/// Encode samples as the raw bytes of `format`
pub(crate) fn encode(samples: &[i16], format: WaveFormat) -> Vec<u8> {
    match format {
        WaveFormat::Mono16Khz11 => samples.iter().flat_map(|s| s.to_le_bytes()).collect(),
        WaveFormat::Mono8Khz11 => samples.iter().map(|s| ((s >> 8) as u8) ^ 0x80).collect(),
        WaveFormat::MuLaw8Khz8 => samples.iter().map(|s| mulaw(*s)).collect(),
    }
}

/// Caller buffers for memory mode
#[derive(Debug, Default)]
pub(crate) struct BufferQueue {
    /// Added by the caller, waiting to be filled
    pub filling: VecDeque<SpeechBuffer>,
    /// Full, waiting to be returned
    pub filled: VecDeque<SpeechBuffer>,
}

impl BufferQueue {
    /// Spread `bytes` over the waiting buffers. Returns the bytes that found
    /// no room.
    pub fn fill(&mut self, mut bytes: &[u8]) -> usize {
        while !bytes.is_empty() {
            let Some(buffer) = self.filling.front_mut() else {
                break;
            };
            let taken = buffer.fill(bytes);
            bytes = &bytes[taken..];
            if buffer.is_full() {
                if let Some(full) = self.filling.pop_front() {
                    self.filled.push_back(full);
                }
            }
        }
        bytes.len()
    }

    /// Oldest filled buffer, else the partly filled head
    pub fn take(&mut self) -> Option<SpeechBuffer> {
        self.filled.pop_front().or_else(|| self.filling.pop_front())
    }

    /// Queue every waiting buffer for return
    pub fn release_all(&mut self) {
        self.filled.extend(self.filling.drain(..));
    }
}

/// Where the worker sends rendered speech
pub(crate) enum Sink {
    Audio,
    Wave {
        writer: WavWriter<BufWriter<File>>,
        format: WaveFormat,
    },
    Log {
        writer: BufWriter<File>,
        flags: LogFlags,
    },
    Memory {
        format: WaveFormat,
    },
}

impl Sink {
    pub fn wave(path: &Path, format: WaveFormat) -> Result<Self> {
        let spec = WavSpec {
            channels: 1,
            sample_rate: format.sample_rate(),
            bits_per_sample: format.bits_per_sample(),
            sample_format: SampleFormat::Int,
        };
        let writer = WavWriter::create(path, spec)
            .with_context(|| format!("Failed to create wave file {}", path.display()))?;
        Ok(Sink::Wave { writer, format })
    }

    pub fn log(path: &Path, flags: LogFlags) -> Result<Self> {
        let file = File::create(path)
            .with_context(|| format!("Failed to create log file {}", path.display()))?;
        Ok(Sink::Log {
            writer: BufWriter::new(file),
            flags,
        })
    }

    pub fn write_samples(&mut self, samples: &[i16]) -> Result<()> {
        if let Sink::Wave { writer, format } = self {
            for &s in samples {
                match format {
                    WaveFormat::Mono16Khz11 => writer.write_sample(s)?,
                    _ => writer.write_sample((s >> 8) as i8)?,
                }
            }
        }
        Ok(())
    }

    /// One record per requested kind. Order across kinds is not meaningful.
    pub fn write_records(&mut self, phrase: &Phrase) -> Result<()> {
        if let Sink::Log { writer, flags } = self {
            let words: Vec<&str> = phrase.plain.split_whitespace().collect();
            for flag in flags.iter() {
                match flag {
                    LogFlag::Text => writeln!(writer, "[{flag}] {}", words.join(" "))?,
                    LogFlag::Phonemes | LogFlag::Syllables => {
                        writeln!(writer, "[{flag}] {}", words.join(" ").to_ascii_uppercase())?
                    }
                }
            }
        }
        Ok(())
    }

    /// Flush and close whatever file is open
    pub fn finish(self) -> Result<()> {
        match self {
            Sink::Wave { writer, .. } => writer.finalize().context("Failed to finalize wave file"),
            Sink::Log { mut writer, .. } => writer.flush().context("Failed to flush log file"),
            Sink::Audio | Sink::Memory { .. } => Ok(()),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Sink::Audio => "audio",
            Sink::Wave { .. } => "wave-file",
            Sink::Log { .. } => "log-file",
            Sink::Memory { .. } => "memory",
        }
    }
}

/// Fill memory buffers, dropping what does not fit
pub(crate) fn deliver(buffers: &mut BufferQueue, bytes: &[u8]) {
    let overflow = buffers.fill(bytes);
    if overflow > 0 {
        warn!("No room in memory buffers, dropped {} bytes", overflow);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_text() {
        let phrase = Phrase::parse("Congratulations, you can now synthesize any text");
        assert_eq!(phrase.words, 7);
        assert_eq!(phrase.explicit_ms, 0);
        assert_eq!(phrase.duration_ms(180), 7 * 60_000 / 180);
    }

    #[test]
    fn test_parse_directives() {
        let phrase = Phrase::parse("[:name betty] hi [:rate 300] there [:volume set 50]");
        assert_eq!(phrase.voice, Some(Voice::Betty));
        assert_eq!(phrase.rate, Some(300));
        assert_eq!(phrase.words, 2);

        assert_eq!(Phrase::parse("[:nw]").voice, Some(Voice::Wendy));
        assert_eq!(Phrase::parse("[:rate 1000]").rate, None);
    }

    #[test]
    fn test_parse_phoneme_durations() {
        let phrase = Phrase::parse("[dah<600,20>][dah<500,16>][dah<130,23>]");
        assert_eq!(phrase.explicit_ms, 1230);
        assert_eq!(phrase.words, 0);
        assert_eq!(phrase.duration_ms(180), 1230);
    }

    #[test]
    fn test_oversized_durations_are_capped() {
        let phrase = Phrase::parse("[dah<18446744073709551615,20>][dah<5,20>]");
        assert_eq!(phrase.explicit_ms, u64::MAX);
        assert_eq!(phrase.duration_ms(180), MAX_PHRASE_MS);

        let phrase = Phrase::parse("[dah<100000000,20>] and some words");
        assert_eq!(phrase.duration_ms(75), MAX_PHRASE_MS);

        assert_eq!(
            synthesize(u64::MAX, Voice::Paul, 11025).len() as u64,
            MAX_PHRASE_MS * 11025 / 1000
        );
    }

    #[test]
    fn test_unterminated_group_is_text() {
        let phrase = Phrase::parse("say [this");
        assert_eq!(phrase.words, 2);
    }

    #[test]
    fn test_synthesize_length() {
        assert_eq!(synthesize(1000, Voice::Paul, 11025).len(), 11025);
        assert!(synthesize(0, Voice::Kit, 8000).is_empty());
    }

    #[test]
    fn test_encode_widths() {
        let samples = [0i16, 1000, -1000];
        assert_eq!(encode(&samples, WaveFormat::Mono16Khz11).len(), 6);
        assert_eq!(encode(&samples, WaveFormat::Mono8Khz11), vec![0x80, 0x83, 0x7C]);
        assert_eq!(encode(&[0], WaveFormat::MuLaw8Khz8), vec![0xFF]);
    }

    #[test]
    fn test_buffer_queue_spreads_bytes() {
        let mut buffers = BufferQueue::default();
        buffers.filling.push_back(SpeechBuffer::with_capacity(3));
        buffers.filling.push_back(SpeechBuffer::with_capacity(3));

        assert_eq!(buffers.fill(&[1, 2, 3, 4]), 0);
        assert_eq!(buffers.filled.len(), 1);
        assert_eq!(buffers.fill(&[5, 6, 7]), 1);

        assert_eq!(buffers.take().unwrap().as_bytes(), &[1, 2, 3]);
        assert_eq!(buffers.take().unwrap().as_bytes(), &[4, 5, 6]);
        assert!(buffers.take().is_none());
    }
}

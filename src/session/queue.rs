//! Speech queue submission
//!
//! `speak` and `typing` never block; the engine renders queued work on its
//! own thread. `sync` is the only blocking call and has no timeout: use a
//! [`super::ResetHandle`] from another thread to cut it short.

use tracing::debug;

use super::modes::Mode;
use super::session::Session;
use crate::engine::{DeviceOption, SpeakPriority};
use crate::error::{translate, OrderingError, ParameterError, Result};

/// Reject text the engine cannot take as a C string.
pub fn validate_text(text: &str) -> Result<&str> {
    match text.find('\0') {
        Some(offset) => Err(ParameterError::InteriorNul(offset).into()),
        None => Ok(text),
    }
}

impl Session {
    /// Queue text, including any inline `[:...]` voice-control directives,
    /// which are passed to the engine verbatim.
    ///
    /// Text is rendered in submission order. [`SpeakPriority::Force`] keeps
    /// text timed and processed even when the session was started with
    /// [`DeviceOption::DoNotUseAudioDevice`].
    pub fn speak(&mut self, text: &str, priority: SpeakPriority) -> Result<()> {
        let text = validate_text(text)?;
        let handle = self.handle()?;

        translate(self.engine.speak(handle, text, priority))?;

        let queued = self.modes.note_queued();
        debug!(
            "Queued phrase {} on {} ({} bytes, {:?})",
            queued,
            self.id,
            text.len(),
            priority
        );
        Ok(())
    }

    /// Speak one character as fast as possible, dropping queued text.
    ///
    /// Only valid while rendering straight to a live audio device.
    pub fn typing(&mut self, character: char) -> Result<()> {
        if character == '\0' {
            return Err(ParameterError::InteriorNul(0).into());
        }
        let handle = self.handle()?;
        if self.modes.mode() != Mode::Active
            || self.options.contains(DeviceOption::DoNotUseAudioDevice)
        {
            return Err(OrderingError::TypingRequiresAudioDevice.into());
        }

        translate(self.engine.typing(handle, character))?;
        self.modes.note_queued();
        Ok(())
    }

    /// Block until everything queued so far has been rendered. Resumes
    /// output if paused.
    pub fn sync(&mut self) -> Result<()> {
        let handle = self.handle()?;
        debug!("Waiting for {} to drain", self.id);
        translate(self.engine.sync(handle))?;
        self.modes.clear_paused();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_validate_text() {
        assert_eq!(validate_text("[:name paul] hello"), Ok("[:name paul] hello"));
        assert_eq!(
            validate_text("bad\0text"),
            Err(Error::Parameter(ParameterError::InteriorNul(3)))
        );
    }
}

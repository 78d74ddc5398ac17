//! Language packs for multi-language engines
//!
//! Loading is engine-global and reference counted by the engine. The
//! "current language" is held in a caller-owned [`LanguageContext`] rather
//! than hidden thread-local state.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::engine::{Engine, LanguageHandle};
use crate::error::{classify_language, LanguageError, Result};

/// A language pack loaded into the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Language {
    code: String,
    handle: LanguageHandle,
}

impl Language {
    /// Two-character language identifier, e.g. "us"
    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn handle(&self) -> LanguageHandle {
        self.handle
    }
}

/// The caller's current language selection
#[derive(Debug, Clone, Default)]
pub struct LanguageContext {
    current: Option<Language>,
}

impl LanguageContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<&Language> {
        self.current.as_ref()
    }
}

/// Loads, selects and unloads language packs
#[derive(Clone)]
pub struct LanguageRegistry {
    engine: Arc<dyn Engine>,
}

impl LanguageRegistry {
    pub fn new(engine: Arc<dyn Engine>) -> Self {
        Self { engine }
    }

    /// Check that `code` is installed and load it.
    pub fn load(&self, code: &str) -> Result<Language> {
        if code.len() != 2 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
            warn!("Rejected malformed language code {:?}", code);
            return Err(LanguageError::NotSupported.into());
        }

        let word = self.engine.start_lang(code);
        if let Some(err) = classify_language(word) {
            warn!("Language {} failed to load: {}", code, err);
            return Err(err.into());
        }

        info!("Language loaded: {} (handle={:#x})", code, word);
        Ok(Language {
            code: code.to_string(),
            handle: LanguageHandle(word),
        })
    }

    /// Make `language` current for this caller. `false` means the engine
    /// could not complete the selection and `context` is unchanged.
    pub fn select(&self, context: &mut LanguageContext, language: &Language) -> bool {
        if !self.engine.select_lang(language.handle) {
            debug!("Selection of {} not completed", language.code);
            return false;
        }
        context.current = Some(language.clone());
        true
    }

    /// Release this reference to `language`. `false` means other references
    /// keep it loaded; that is not an error. Once unloaded, `context` no
    /// longer reports it as current.
    pub fn unload(&self, context: &mut LanguageContext, language: &Language) -> bool {
        let unloaded = self.engine.close_lang(&language.code);
        if unloaded {
            if context.current.as_ref().is_some_and(|c| c.code == language.code) {
                context.current = None;
            }
            info!("Language unloaded: {}", language.code);
        } else {
            debug!("Language {} still referenced", language.code);
        }
        unloaded
    }
}

// Shared test doubles
//
// RecordingEngine forwards to a SimulatedEngine and records every call, so
// tests can prove that locally rejected operations never reach the engine.

#![allow(dead_code)]

use std::path::Path;
use std::sync::{Arc, Mutex};

use dectalk_session::engine::{EngineHandle, EngineResult, LanguageHandle};
use dectalk_session::{
    DeviceOptions, Engine, LogFlags, SimulatedEngine, SimulatedEngineConfig, SpeakPriority,
    SpeechBuffer, Voice, WaveFormat,
};

pub struct RecordingEngine {
    pub inner: SimulatedEngine,
    calls: Mutex<Vec<&'static str>>,
}

impl RecordingEngine {
    pub fn new() -> Arc<Self> {
        Self::with_config(SimulatedEngineConfig::default())
    }

    pub fn with_config(config: SimulatedEngineConfig) -> Arc<Self> {
        Arc::new(Self {
            inner: SimulatedEngine::new(config),
            calls: Mutex::new(Vec::new()),
        })
    }

    fn record(&self, name: &'static str) {
        self.calls.lock().unwrap().push(name);
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, name: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| **c == name).count()
    }
}

impl Engine for RecordingEngine {
    fn startup(&self, options: DeviceOptions) -> EngineResult<EngineHandle> {
        self.record("startup");
        self.inner.startup(options)
    }

    fn shutdown(&self, handle: &EngineHandle) -> EngineResult {
        self.record("shutdown");
        self.inner.shutdown(handle)
    }

    fn speak(&self, handle: &EngineHandle, text: &str, priority: SpeakPriority) -> EngineResult {
        self.record("speak");
        self.inner.speak(handle, text, priority)
    }

    fn typing(&self, handle: &EngineHandle, character: char) -> EngineResult {
        self.record("typing");
        self.inner.typing(handle, character)
    }

    fn sync(&self, handle: &EngineHandle) -> EngineResult {
        self.record("sync");
        self.inner.sync(handle)
    }

    fn pause(&self, handle: &EngineHandle) -> EngineResult {
        self.record("pause");
        self.inner.pause(handle)
    }

    fn resume(&self, handle: &EngineHandle) -> EngineResult {
        self.record("resume");
        self.inner.resume(handle)
    }

    fn reset(&self, handle: &EngineHandle, full: bool) -> EngineResult {
        self.record("reset");
        self.inner.reset(handle, full)
    }

    fn open_wave_out_file(
        &self,
        handle: &EngineHandle,
        path: &Path,
        format: WaveFormat,
    ) -> EngineResult {
        self.record("open_wave_out_file");
        self.inner.open_wave_out_file(handle, path, format)
    }

    fn close_wave_out_file(&self, handle: &EngineHandle) -> EngineResult {
        self.record("close_wave_out_file");
        self.inner.close_wave_out_file(handle)
    }

    fn open_log_file(&self, handle: &EngineHandle, path: &Path, flags: LogFlags) -> EngineResult {
        self.record("open_log_file");
        self.inner.open_log_file(handle, path, flags)
    }

    fn close_log_file(&self, handle: &EngineHandle) -> EngineResult {
        self.record("close_log_file");
        self.inner.close_log_file(handle)
    }

    fn open_in_memory(&self, handle: &EngineHandle, format: WaveFormat) -> EngineResult {
        self.record("open_in_memory");
        self.inner.open_in_memory(handle, format)
    }

    fn close_in_memory(&self, handle: &EngineHandle) -> EngineResult {
        self.record("close_in_memory");
        self.inner.close_in_memory(handle)
    }

    fn add_buffer(&self, handle: &EngineHandle, buffer: SpeechBuffer) -> EngineResult {
        self.record("add_buffer");
        self.inner.add_buffer(handle, buffer)
    }

    fn return_buffer(&self, handle: &EngineHandle) -> EngineResult<Option<SpeechBuffer>> {
        self.record("return_buffer");
        self.inner.return_buffer(handle)
    }

    fn load_user_dictionary(&self, handle: &EngineHandle, path: &Path) -> EngineResult {
        self.record("load_user_dictionary");
        self.inner.load_user_dictionary(handle, path)
    }

    fn unload_user_dictionary(&self, handle: &EngineHandle) -> EngineResult {
        self.record("unload_user_dictionary");
        self.inner.unload_user_dictionary(handle)
    }

    fn get_rate(&self, handle: &EngineHandle) -> EngineResult<u32> {
        self.record("get_rate");
        self.inner.get_rate(handle)
    }

    fn set_rate(&self, handle: &EngineHandle, rate: u32) -> EngineResult {
        self.record("set_rate");
        self.inner.set_rate(handle, rate)
    }

    fn get_speaker(&self, handle: &EngineHandle) -> EngineResult<u32> {
        self.record("get_speaker");
        self.inner.get_speaker(handle)
    }

    fn set_speaker(&self, handle: &EngineHandle, voice: Voice) -> EngineResult {
        self.record("set_speaker");
        self.inner.set_speaker(handle, voice)
    }

    fn version(&self) -> (u32, Option<String>) {
        self.record("version");
        self.inner.version()
    }

    fn start_lang(&self, code: &str) -> u32 {
        self.record("start_lang");
        self.inner.start_lang(code)
    }

    fn select_lang(&self, language: LanguageHandle) -> bool {
        self.record("select_lang");
        self.inner.select_lang(language)
    }

    fn close_lang(&self, code: &str) -> bool {
        self.record("close_lang");
        self.inner.close_lang(code)
    }
}

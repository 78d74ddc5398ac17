//! In-process reference engine
//!
//! Behaves like the native engine at the API boundary: result codes, license
//! units, deferred rate/speaker changes, reference-counted languages. Each
//! instance renders its queue on a dedicated worker thread.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle, ThreadId};

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use super::codes;
use super::render::{deliver, encode, synthesize, BufferQueue, Phrase, Sink};
use super::types::{
    DeviceOption, DeviceOptions, LogFlags, SpeakPriority, SpeechBuffer, Voice, WaveFormat,
};
use super::{Engine, EngineHandle, EngineResult, LanguageHandle, MmResult};

const ENGINE_MAJOR: u32 = 5;
const ENGINE_MINOR: u32 = 0;
const PROTOCOL_MAJOR: u32 = 1;
const PROTOCOL_MINOR: u32 = 0;

/// Configuration for the simulated engine
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatedEngineConfig {
    /// Concurrent sessions allowed
    pub license_units: usize,

    /// Whether any license is installed at all
    pub licensed: bool,

    /// Whether an audio output device is present
    pub audio_device_available: bool,

    /// Language codes the engine knows about
    pub supported_languages: Vec<String>,

    /// Language codes actually installed
    pub installed_languages: Vec<String>,
}

impl Default for SimulatedEngineConfig {
    fn default() -> Self {
        Self {
            license_units: 4,
            licensed: true,
            audio_device_available: false,
            supported_languages: ["us", "uk", "gr", "sp", "la", "fr"]
                .map(String::from)
                .to_vec(),
            installed_languages: vec!["us".to_string()],
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn fail(code: u32) -> MmResult {
    MmResult(code)
}

/// Sink selected on the caller side; the worker catches up in queue order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Audio,
    Wave,
    Log,
    Memory,
}

/// State shared between the caller side and the worker
#[derive(Debug)]
struct Voicing {
    rate: u32,
    pending_rate: Option<u32>,
    /// Last voice that spoke
    speaker: Voice,
    pending_speaker: Option<Voice>,
    paused: bool,
    target: Target,
    dictionary: Option<PathBuf>,
    buffers: BufferQueue,
}

impl Default for Voicing {
    fn default() -> Self {
        Self {
            rate: codes::DEFAULT_RATE,
            pending_rate: None,
            speaker: Voice::default(),
            pending_speaker: None,
            paused: false,
            target: Target::Audio,
            dictionary: None,
            buffers: BufferQueue::default(),
        }
    }
}

enum Job {
    Speak {
        text: String,
        priority: SpeakPriority,
        epoch: u64,
    },
    SetSink(Sink),
    CloseSink(oneshot::Sender<u32>),
    Barrier(oneshot::Sender<()>),
    Stop,
}

/// Rendering totals across all instances
#[derive(Debug, Default)]
struct Counters {
    rendered: AtomicU64,
    dropped: AtomicU64,
    samples: AtomicU64,
}

struct Instance {
    jobs: mpsc::UnboundedSender<Job>,
    /// Queued speech from an older epoch is discarded
    epoch: Arc<AtomicU64>,
    voicing: Arc<Mutex<Voicing>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Instance {
    fn send(&self, job: Job) -> EngineResult {
        self.jobs
            .send(job)
            .map_err(|_| fail(codes::MMSYSERR_INVALHANDLE))
    }

    fn speak(&self, text: String, priority: SpeakPriority) -> EngineResult {
        let epoch = self.epoch.load(Ordering::SeqCst);
        self.send(Job::Speak {
            text,
            priority,
            epoch,
        })
    }

    /// Close the worker's sink once everything queued before it is rendered
    fn close_sink(&self) -> EngineResult {
        let (ack, done) = oneshot::channel();
        self.send(Job::CloseSink(ack))?;
        match done.blocking_recv() {
            Ok(codes::MMSYSERR_NOERROR) => Ok(()),
            Ok(code) => Err(fail(code)),
            Err(_) => Err(fail(codes::MMSYSERR_INVALHANDLE)),
        }
    }

    fn discard_queued(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Default)]
struct LanguageTable {
    next_handle: u32,
    /// code -> (handle, references)
    loaded: HashMap<String, (u32, usize)>,
    selected: HashMap<ThreadId, u32>,
}

/// Simulated speech engine
pub struct SimulatedEngine {
    config: SimulatedEngineConfig,
    next_handle: AtomicU64,
    instances: Mutex<HashMap<u64, Arc<Instance>>>,
    languages: Mutex<LanguageTable>,
    counters: Arc<Counters>,
}

impl SimulatedEngine {
    pub fn new(config: SimulatedEngineConfig) -> Self {
        Self {
            config,
            next_handle: AtomicU64::new(1),
            instances: Mutex::new(HashMap::new()),
            languages: Mutex::new(LanguageTable::default()),
            counters: Arc::new(Counters::default()),
        }
    }

    /// Number of live engine instances
    pub fn active_sessions(&self) -> usize {
        lock(&self.instances).len()
    }

    /// Phrases rendered to any sink so far
    pub fn rendered_phrases(&self) -> u64 {
        self.counters.rendered.load(Ordering::SeqCst)
    }

    /// Phrases discarded without rendering
    pub fn dropped_phrases(&self) -> u64 {
        self.counters.dropped.load(Ordering::SeqCst)
    }

    /// Total samples synthesized so far
    pub fn rendered_samples(&self) -> u64 {
        self.counters.samples.load(Ordering::SeqCst)
    }

    /// Codes of the currently loaded languages, sorted
    pub fn loaded_languages(&self) -> Vec<String> {
        let mut codes: Vec<String> = lock(&self.languages).loaded.keys().cloned().collect();
        codes.sort();
        codes
    }

    /// Language handle the calling thread has selected
    pub fn selected_language(&self) -> Option<LanguageHandle> {
        lock(&self.languages)
            .selected
            .get(&thread::current().id())
            .copied()
            .map(LanguageHandle)
    }

    fn instance(&self, handle: &EngineHandle) -> EngineResult<Arc<Instance>> {
        lock(&self.instances)
            .get(&handle.as_raw())
            .cloned()
            .ok_or(fail(codes::MMSYSERR_INVALHANDLE))
    }

    fn open_sink(&self, handle: &EngineHandle, target: Target, sink: Sink) -> EngineResult {
        let instance = self.instance(handle)?;
        {
            let mut voicing = lock(&instance.voicing);
            if voicing.target != Target::Audio {
                return Err(fail(codes::MMSYSERR_ERROR));
            }
            voicing.target = target;
            voicing.paused = false;
        }
        instance.send(Job::SetSink(sink))
    }

    fn close_target(&self, handle: &EngineHandle, target: Target) -> EngineResult {
        let instance = self.instance(handle)?;
        {
            let mut voicing = lock(&instance.voicing);
            if voicing.target != target {
                return Err(fail(codes::MMSYSERR_ERROR));
            }
            voicing.target = Target::Audio;
        }
        instance.close_sink()
    }
}

impl Default for SimulatedEngine {
    fn default() -> Self {
        Self::new(SimulatedEngineConfig::default())
    }
}

impl Engine for SimulatedEngine {
    fn startup(&self, options: DeviceOptions) -> EngineResult<EngineHandle> {
        if !self.config.licensed {
            return Err(fail(codes::MMSYSERR_NOTENABLED));
        }
        if !options.contains(DeviceOption::DoNotUseAudioDevice)
            && !self.config.audio_device_available
            && options.contains(DeviceOption::ReportOpenError)
        {
            return Err(fail(codes::MMSYSERR_NODRIVER));
        }

        let mut instances = lock(&self.instances);
        if instances.len() >= self.config.license_units {
            warn!("All {} license units in use", self.config.license_units);
            return Err(fail(codes::MMSYSERR_ALLOCATED));
        }

        let raw = self.next_handle.fetch_add(1, Ordering::SeqCst);
        let (jobs, rx) = mpsc::unbounded_channel();
        let epoch = Arc::new(AtomicU64::new(0));
        let voicing = Arc::new(Mutex::new(Voicing::default()));

        let worker = Worker {
            options,
            epoch: Arc::clone(&epoch),
            voicing: Arc::clone(&voicing),
            counters: Arc::clone(&self.counters),
            sink: Sink::Audio,
        };
        let thread = thread::Builder::new()
            .name(format!("tts-worker-{raw}"))
            .spawn(move || worker.run(rx))
            .map_err(|e| {
                error!("Failed to spawn engine worker: {}", e);
                fail(codes::MMSYSERR_NOMEM)
            })?;

        instances.insert(
            raw,
            Arc::new(Instance {
                jobs,
                epoch,
                voicing,
                worker: Mutex::new(Some(thread)),
            }),
        );
        debug!("Engine instance {} started", raw);
        Ok(EngineHandle::from_raw(raw))
    }

    fn shutdown(&self, handle: &EngineHandle) -> EngineResult {
        let instance = lock(&self.instances)
            .remove(&handle.as_raw())
            .ok_or(fail(codes::MMSYSERR_INVALHANDLE))?;

        instance.discard_queued();
        if instance.send(Job::Stop).is_err() {
            warn!("Engine worker {} already exited", handle.as_raw());
        }
        if let Some(thread) = lock(&instance.worker).take() {
            if thread.join().is_err() {
                error!("Engine worker {} panicked", handle.as_raw());
            }
        }
        debug!("Engine instance {} shut down", handle.as_raw());
        Ok(())
    }

    fn speak(&self, handle: &EngineHandle, text: &str, priority: SpeakPriority) -> EngineResult {
        self.instance(handle)?.speak(text.to_string(), priority)
    }

    fn typing(&self, handle: &EngineHandle, character: char) -> EngineResult {
        let instance = self.instance(handle)?;
        instance.discard_queued();
        instance.speak(character.to_string(), SpeakPriority::Force)
    }

    fn sync(&self, handle: &EngineHandle) -> EngineResult {
        let instance = self.instance(handle)?;
        lock(&instance.voicing).paused = false;

        let (ack, done) = oneshot::channel();
        instance.send(Job::Barrier(ack))?;
        done.blocking_recv()
            .map_err(|_| fail(codes::MMSYSERR_INVALHANDLE))
    }

    fn pause(&self, handle: &EngineHandle) -> EngineResult {
        lock(&self.instance(handle)?.voicing).paused = true;
        Ok(())
    }

    fn resume(&self, handle: &EngineHandle) -> EngineResult {
        lock(&self.instance(handle)?.voicing).paused = false;
        Ok(())
    }

    fn reset(&self, handle: &EngineHandle, full: bool) -> EngineResult {
        let instance = self.instance(handle)?;
        instance.discard_queued();

        let close = {
            let mut voicing = lock(&instance.voicing);
            voicing.buffers.release_all();
            let special = voicing.target != Target::Audio;
            if full && special {
                voicing.target = Target::Audio;
            }
            full && special
        };
        if close {
            instance.close_sink()?;
        }
        Ok(())
    }

    fn open_wave_out_file(
        &self,
        handle: &EngineHandle,
        path: &Path,
        format: WaveFormat,
    ) -> EngineResult {
        if format == WaveFormat::MuLaw8Khz8 {
            return Err(fail(codes::WAVERR_BADFORMAT));
        }
        self.instance(handle)?;
        let sink = Sink::wave(path, format).map_err(|e| {
            warn!("{:#}", e);
            fail(codes::MMSYSERR_ERROR)
        })?;
        self.open_sink(handle, Target::Wave, sink)
    }

    fn close_wave_out_file(&self, handle: &EngineHandle) -> EngineResult {
        self.close_target(handle, Target::Wave)
    }

    fn open_log_file(&self, handle: &EngineHandle, path: &Path, flags: LogFlags) -> EngineResult {
        if flags.is_empty() {
            return Err(fail(codes::MMSYSERR_INVALPARAM));
        }
        self.instance(handle)?;
        let sink = Sink::log(path, flags).map_err(|e| {
            warn!("{:#}", e);
            fail(codes::MMSYSERR_ERROR)
        })?;
        self.open_sink(handle, Target::Log, sink)
    }

    fn close_log_file(&self, handle: &EngineHandle) -> EngineResult {
        self.close_target(handle, Target::Log)
    }

    fn open_in_memory(&self, handle: &EngineHandle, format: WaveFormat) -> EngineResult {
        self.open_sink(handle, Target::Memory, Sink::Memory { format })
    }

    fn close_in_memory(&self, handle: &EngineHandle) -> EngineResult {
        self.close_target(handle, Target::Memory)?;
        let instance = self.instance(handle)?;
        let mut voicing = lock(&instance.voicing);
        voicing.buffers = BufferQueue::default();
        Ok(())
    }

    fn add_buffer(&self, handle: &EngineHandle, buffer: SpeechBuffer) -> EngineResult {
        let instance = self.instance(handle)?;
        let mut voicing = lock(&instance.voicing);
        if voicing.target != Target::Memory {
            return Err(fail(codes::MMSYSERR_ERROR));
        }
        voicing.buffers.filling.push_back(buffer);
        Ok(())
    }

    fn return_buffer(&self, handle: &EngineHandle) -> EngineResult<Option<SpeechBuffer>> {
        let instance = self.instance(handle)?;
        let mut voicing = lock(&instance.voicing);
        if voicing.target != Target::Memory {
            return Err(fail(codes::MMSYSERR_ERROR));
        }
        Ok(voicing.buffers.take())
    }

    fn load_user_dictionary(&self, handle: &EngineHandle, path: &Path) -> EngineResult {
        let instance = self.instance(handle)?;
        let mut voicing = lock(&instance.voicing);
        if voicing.dictionary.is_some() {
            return Err(fail(codes::MMSYSERR_ERROR));
        }
        match std::fs::metadata(path) {
            Ok(meta) if meta.is_file() && meta.len() > 0 => {
                voicing.dictionary = Some(path.to_path_buf());
                Ok(())
            }
            _ => Err(fail(codes::MMSYSERR_ERROR)),
        }
    }

    fn unload_user_dictionary(&self, handle: &EngineHandle) -> EngineResult {
        lock(&self.instance(handle)?.voicing).dictionary = None;
        Ok(())
    }

    fn get_rate(&self, handle: &EngineHandle) -> EngineResult<u32> {
        let instance = self.instance(handle)?;
        let voicing = lock(&instance.voicing);
        // reports the latest setting even before it takes effect
        Ok(voicing.pending_rate.unwrap_or(voicing.rate))
    }

    fn set_rate(&self, handle: &EngineHandle, rate: u32) -> EngineResult {
        if !(codes::MIN_RATE..=codes::MAX_RATE).contains(&rate) {
            return Err(fail(codes::MMSYSERR_INVALPARAM));
        }
        lock(&self.instance(handle)?.voicing).pending_rate = Some(rate);
        Ok(())
    }

    fn get_speaker(&self, handle: &EngineHandle) -> EngineResult<u32> {
        Ok(lock(&self.instance(handle)?.voicing).speaker.raw())
    }

    fn set_speaker(&self, handle: &EngineHandle, voice: Voice) -> EngineResult {
        lock(&self.instance(handle)?.voicing).pending_speaker = Some(voice);
        Ok(())
    }

    fn version(&self) -> (u32, Option<String>) {
        let packed = ENGINE_MAJOR << 24 | ENGINE_MINOR << 16 | PROTOCOL_MINOR << 8 | PROTOCOL_MAJOR;
        (packed, Some("simulated engine".to_string()))
    }

    fn start_lang(&self, code: &str) -> u32 {
        let code = code.to_ascii_lowercase();
        if !self.config.supported_languages.contains(&code) {
            return codes::TTS_NOT_SUPPORTED;
        }
        if !self.config.installed_languages.contains(&code) {
            return codes::TTS_NOT_AVAILABLE;
        }

        let mut table = lock(&self.languages);
        if let Some((handle, refs)) = table.loaded.get_mut(&code) {
            *refs += 1;
            return *handle;
        }
        table.next_handle += 1;
        let handle = table.next_handle;
        table.loaded.insert(code, (handle, 1));
        handle
    }

    fn select_lang(&self, language: LanguageHandle) -> bool {
        let mut table = lock(&self.languages);
        if !table.loaded.values().any(|(h, _)| *h == language.0) {
            return false;
        }
        table.selected.insert(thread::current().id(), language.0);
        true
    }

    fn close_lang(&self, code: &str) -> bool {
        let code = code.to_ascii_lowercase();
        let mut table = lock(&self.languages);
        let Some((handle, refs)) = table.loaded.get_mut(&code) else {
            return false;
        };
        if *refs > 1 {
            *refs -= 1;
            return false;
        }
        let handle = *handle;
        table.loaded.remove(&code);
        table.selected.retain(|_, h| *h != handle);
        info!("Language {} unloaded from engine", code);
        true
    }
}

/// Renders one instance's queue
struct Worker {
    options: DeviceOptions,
    epoch: Arc<AtomicU64>,
    voicing: Arc<Mutex<Voicing>>,
    counters: Arc<Counters>,
    sink: Sink,
}

impl Worker {
    fn run(mut self, mut rx: mpsc::UnboundedReceiver<Job>) {
        while let Some(job) = rx.blocking_recv() {
            match job {
                Job::Speak {
                    text,
                    priority,
                    epoch,
                } => {
                    if epoch != self.epoch.load(Ordering::SeqCst) {
                        self.counters.dropped.fetch_add(1, Ordering::SeqCst);
                        continue;
                    }
                    self.render(&text, priority);
                }
                Job::SetSink(sink) => {
                    let previous = std::mem::replace(&mut self.sink, sink);
                    if let Err(e) = previous.finish() {
                        error!("{:#}", e);
                    }
                }
                Job::CloseSink(ack) => {
                    let previous = std::mem::replace(&mut self.sink, Sink::Audio);
                    let name = previous.name();
                    let code = match previous.finish() {
                        Ok(()) => codes::MMSYSERR_NOERROR,
                        Err(e) => {
                            error!("{:#}", e);
                            codes::MMSYSERR_ERROR
                        }
                    };
                    debug!("Closed {} sink", name);
                    let _ = ack.send(code);
                }
                Job::Barrier(ack) => {
                    let _ = ack.send(());
                }
                Job::Stop => break,
            }
        }

        let sink = std::mem::replace(&mut self.sink, Sink::Audio);
        if let Err(e) = sink.finish() {
            error!("{:#}", e);
        }
    }

    fn render(&mut self, text: &str, priority: SpeakPriority) {
        let phrase = Phrase::parse(text);

        // phrase boundary: pending changes take effect now
        let (rate, voice) = {
            let mut voicing = lock(&self.voicing);
            if let Some(rate) = voicing.pending_rate.take() {
                voicing.rate = rate;
            }
            if let Some(voice) = voicing.pending_speaker.take() {
                voicing.speaker = voice;
            }
            let rate = phrase.rate.unwrap_or(voicing.rate);
            let voice = phrase.voice.unwrap_or(voicing.speaker);
            voicing.speaker = voice;
            if phrase.rate.is_some() {
                voicing.rate = rate;
            }
            (rate, voice)
        };

        if matches!(self.sink, Sink::Audio)
            && self.options.contains(DeviceOption::DoNotUseAudioDevice)
            && priority == SpeakPriority::Normal
        {
            self.counters.dropped.fetch_add(1, Ordering::SeqCst);
            return;
        }

        let duration_ms = phrase.duration_ms(rate);
        let result = match self.sink {
            // audio device playback is not simulated, only timed
            Sink::Audio => Ok((duration_ms.saturating_mul(11025) / 1000) as usize),
            Sink::Wave { format, .. } => {
                let samples = synthesize(duration_ms, voice, format.sample_rate());
                self.sink.write_samples(&samples).map(|_| samples.len())
            }
            Sink::Log { .. } => self.sink.write_records(&phrase).map(|_| 0),
            Sink::Memory { format } => {
                let samples = synthesize(duration_ms, voice, format.sample_rate());
                let bytes = encode(&samples, format);
                deliver(&mut lock(&self.voicing).buffers, &bytes);
                Ok(samples.len())
            }
        };

        match result {
            Ok(samples) => {
                self.counters.rendered.fetch_add(1, Ordering::SeqCst);
                self.counters
                    .samples
                    .fetch_add(samples as u64, Ordering::SeqCst);
            }
            Err(e) => error!("Failed to render to {}: {:#}", self.sink.name(), e),
        }
    }
}

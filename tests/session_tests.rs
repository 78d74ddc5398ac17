// Integration tests for session lifecycle
//
// These tests drive a full session against the simulated engine: startup,
// parameters, dictionaries, wave capture and shutdown.

mod common;

use std::fs;
use std::sync::Arc;

use anyhow::Result;
use common::RecordingEngine;
use dectalk_session::{
    DeviceOption, DeviceOptions, Error, ErrorKind, LogFlag, Mode, OrderingError, ParameterError,
    ResourceError, Session, SessionConfig, SimulatedEngine, SimulatedEngineConfig, SpeakPriority,
    Voice, WaveFormat,
};
use tempfile::TempDir;

fn silent() -> DeviceOptions {
    DeviceOption::DoNotUseAudioDevice.into()
}

#[test]
fn test_wave_file_session_end_to_end() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("out.wav");
    let engine = Arc::new(SimulatedEngine::default());

    let mut session = Session::start(engine.clone(), silent())?;
    session.open_wave_out_file(&path, WaveFormat::Mono16Khz11)?;
    assert_eq!(session.mode(), Mode::WaveFile);

    session.speak(
        "Congratulations, you can now synthesize any text",
        SpeakPriority::Normal,
    )?;
    session.sync()?;
    session.close_wave_out_file()?;
    assert_eq!(session.mode(), Mode::Active);
    session.shutdown()?;

    assert_eq!(engine.active_sessions(), 0);
    assert_eq!(engine.rendered_phrases(), 1);

    let reader = hound::WavReader::open(&path)?;
    let spec = reader.spec();
    assert_eq!(spec.channels, 1);
    assert_eq!(spec.sample_rate, 11025);
    assert_eq!(spec.bits_per_sample, 16);

    // 7 words at 180 wpm
    let samples = reader.duration();
    assert!(
        (2 * 11025..3 * 11025).contains(&samples),
        "Unexpected sample count {samples}"
    );

    Ok(())
}

#[test]
fn test_eight_bit_wave_file() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("out8.wav");
    let engine = Arc::new(SimulatedEngine::default());

    let mut session = Session::start(engine, silent())?;
    session.open_wave_out_file(&path, WaveFormat::Mono8Khz11)?;
    session.speak("[dah<500,20>]", SpeakPriority::Normal)?;
    session.close_wave_out_file()?;
    session.shutdown()?;

    let reader = hound::WavReader::open(&path)?;
    assert_eq!(reader.spec().bits_per_sample, 8);
    assert_eq!(reader.duration(), 500 * 11025 / 1000);
    Ok(())
}

#[test]
fn test_out_of_range_rate_never_reaches_engine() -> Result<()> {
    let engine = RecordingEngine::new();
    let mut session = Session::start(engine.clone(), silent())?;

    let before = session.get_rate()?;
    let err = session.set_rate(1000).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Parameter);
    assert_eq!(err, Error::Parameter(ParameterError::RateOutOfRange(1000)));

    assert_eq!(session.get_rate()?, before);
    assert_eq!(engine.count("set_rate"), 0);

    session.shutdown()?;
    Ok(())
}

#[test]
fn test_rate_setting_is_reported_before_it_applies() -> Result<()> {
    let engine = Arc::new(SimulatedEngine::default());
    let mut session = Session::start(engine, silent())?;

    assert_eq!(session.get_rate()?, 180);
    session.set_rate(300)?;
    assert_eq!(session.get_rate()?, 300);
    session.set_rate(75)?;
    session.set_rate(600)?;
    assert_eq!(session.get_rate()?, 600);

    session.shutdown()?;
    Ok(())
}

#[test]
fn test_speaker_change_applies_at_phrase_boundary() -> Result<()> {
    let engine = Arc::new(SimulatedEngine::default());
    let mut session = Session::start(engine, silent())?;

    assert_eq!(session.get_speaker()?, Voice::Paul);
    session.set_speaker(Voice::Betty)?;
    // nothing has spoken since the change
    assert_eq!(session.get_speaker()?, Voice::Paul);

    session.speak("hello", SpeakPriority::Force)?;
    session.sync()?;
    assert_eq!(session.get_speaker()?, Voice::Betty);

    // inline voice directives count as the last voice that spoke
    session.speak("[:name harry] hello", SpeakPriority::Force)?;
    session.sync()?;
    assert_eq!(session.get_speaker()?, Voice::Harry);

    session.shutdown()?;
    Ok(())
}

#[test]
fn test_shutdown_refused_while_mode_open() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let engine = RecordingEngine::new();
    let mut session = Session::start(engine.clone(), silent())?;

    session.open_log_file(temp_dir.path().join("speech.log"), LogFlag::Text.into())?;

    let err = session.shutdown().unwrap_err();
    assert_eq!(
        err,
        Error::Ordering(OrderingError::ModeStillOpen(Mode::LogFile))
    );
    assert_eq!(engine.count("shutdown"), 0);
    assert!(session.is_live());

    session.close_log_file()?;
    session.shutdown()?;
    assert!(!session.is_live());
    Ok(())
}

#[test]
fn test_operations_after_shutdown_fail() -> Result<()> {
    let engine = RecordingEngine::new();
    let mut session = Session::start(engine.clone(), silent())?;
    session.shutdown()?;

    let closed = Error::Ordering(OrderingError::SessionClosed);
    assert_eq!(session.speak("hello", SpeakPriority::Force).unwrap_err(), closed);
    assert_eq!(session.sync().unwrap_err(), closed);
    assert_eq!(session.get_rate().unwrap_err(), closed);
    assert_eq!(session.pause().unwrap_err(), closed);
    assert_eq!(session.shutdown().unwrap_err(), closed);
    assert!(session.reset_handle().is_err());

    assert_eq!(engine.calls(), vec!["startup", "shutdown"]);
    assert_eq!(engine.inner.active_sessions(), 0);
    Ok(())
}

#[test]
fn test_license_units_are_limited() -> Result<()> {
    let engine = Arc::new(SimulatedEngine::new(SimulatedEngineConfig {
        license_units: 1,
        ..Default::default()
    }));

    let mut first = Session::start(engine.clone(), silent())?;
    let err = Session::start(engine.clone(), silent()).err().unwrap();
    assert_eq!(err.kind(), ErrorKind::Resource);
    assert_eq!(err, Error::Resource(ResourceError::Allocated));

    first.shutdown()?;
    let mut second = Session::start(engine.clone(), silent())?;
    second.shutdown()?;
    Ok(())
}

#[test]
fn test_unlicensed_engine() {
    let engine = Arc::new(SimulatedEngine::new(SimulatedEngineConfig {
        licensed: false,
        ..Default::default()
    }));

    let err = Session::start(engine, silent()).err().unwrap();
    assert_eq!(err, Error::Resource(ResourceError::NotEnabled));
    assert_eq!(err.raw_code(), Some(3));
}

#[test]
fn test_missing_audio_device_reported_only_on_request() -> Result<()> {
    let engine = Arc::new(SimulatedEngine::default());

    let err = Session::start(engine.clone(), DeviceOption::ReportOpenError.into())
        .err()
        .unwrap();
    assert_eq!(err, Error::Resource(ResourceError::NoDriver));

    let mut session = Session::start(engine.clone(), DeviceOptions::empty())?;
    session.shutdown()?;

    let mut session = Session::start(
        engine,
        DeviceOption::DoNotUseAudioDevice | DeviceOption::ReportOpenError,
    )?;
    session.shutdown()?;
    Ok(())
}

#[test]
fn test_user_dictionary_loads_once() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let dict = temp_dir.path().join("user.dic");
    fs::write(&dict, "dectalk\t[d'ehktahk]\n")?;

    let engine = RecordingEngine::new();
    let mut session = Session::start(engine.clone(), silent())?;

    session.load_user_dictionary(&dict)?;
    assert_eq!(session.user_dictionary(), Some(dict.as_path()));

    let err = session.load_user_dictionary(&dict).unwrap_err();
    assert_eq!(err, Error::Ordering(OrderingError::DictionaryLoaded(dict.clone())));
    assert_eq!(engine.count("load_user_dictionary"), 1);

    session.unload_user_dictionary()?;
    assert_eq!(session.user_dictionary(), None);
    session.load_user_dictionary(&dict)?;

    session.shutdown()?;
    Ok(())
}

#[test]
fn test_unreadable_dictionary_is_general_error() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let engine = Arc::new(SimulatedEngine::default());
    let mut session = Session::start(engine, silent())?;

    let err = session
        .load_user_dictionary(temp_dir.path().join("missing.dic"))
        .unwrap_err();
    assert_eq!(err, Error::Resource(ResourceError::General));
    assert_eq!(session.user_dictionary(), None);

    // unloading with nothing loaded is forwarded and succeeds
    session.unload_user_dictionary()?;
    session.shutdown()?;
    Ok(())
}

#[test]
fn test_drop_closes_mode_and_shuts_down() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("dropped.wav");
    let engine = Arc::new(SimulatedEngine::default());

    {
        let mut session = Session::start(engine.clone(), silent())?;
        session.open_wave_out_file(&path, WaveFormat::Mono16Khz11)?;
        session.speak("hello there", SpeakPriority::Normal)?;
        session.sync()?;
        assert_eq!(engine.active_sessions(), 1);
    }

    assert_eq!(engine.active_sessions(), 0);
    // finalized on drop, so the header is readable
    let reader = hound::WavReader::open(&path)?;
    assert!(reader.duration() > 0);
    Ok(())
}

#[test]
fn test_session_from_config() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let dict = temp_dir.path().join("user.dic");
    fs::write(&dict, "word\t[w'ehrd]\n")?;

    let config = SessionConfig {
        session_id: "session-announcer".to_string(),
        device_options: vec![DeviceOption::DoNotUseAudioDevice],
        rate: Some(250),
        speaker: Some(Voice::Wendy),
        user_dictionary: Some(dict.clone()),
    };
    let engine = Arc::new(SimulatedEngine::default());
    let mut session = Session::from_config(engine, &config)?;

    assert_eq!(session.id(), "session-announcer");
    assert!(session.options().contains(DeviceOption::DoNotUseAudioDevice));
    assert_eq!(session.get_rate()?, 250);
    assert_eq!(session.user_dictionary(), Some(dict.as_path()));

    session.speak("ready", SpeakPriority::Force)?;
    session.sync()?;
    assert_eq!(session.get_speaker()?, Voice::Wendy);

    let stats = session.stats();
    assert_eq!(stats.session_id, "session-announcer");
    assert_eq!(stats.phrases_queued, 1);
    assert_eq!(stats.mode, Mode::Active);
    assert!(stats.is_live);

    session.shutdown()?;
    assert!(!session.stats().is_live);
    Ok(())
}

#[test]
fn test_from_config_rejects_bad_rate() {
    let config = SessionConfig {
        rate: Some(20),
        device_options: vec![DeviceOption::DoNotUseAudioDevice],
        ..Default::default()
    };
    let engine = Arc::new(SimulatedEngine::default());

    let err = Session::from_config(engine.clone(), &config).err().unwrap();
    assert_eq!(err, Error::Parameter(ParameterError::RateOutOfRange(20)));
    // the half-started session was dropped and shut down
    assert_eq!(engine.active_sessions(), 0);
}

#[test]
fn test_engine_version() -> Result<()> {
    let engine = Arc::new(SimulatedEngine::default());
    let mut session = Session::start(engine, silent())?;

    let version = session.version();
    assert_eq!(version.engine_major, 5);
    assert_eq!(version.engine_minor, 0);
    assert_eq!(version.protocol_major, 1);
    assert_eq!(version.protocol_minor, 0);
    assert_eq!(version.text.as_deref(), Some("simulated engine"));

    session.shutdown()?;
    Ok(())
}

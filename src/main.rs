use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use dectalk_session::{
    Config, DeviceOption, LanguageContext, LogFlag, LogFlags, Mode, Session, SimulatedEngine,
    SpeakPriority, Voice, WaveFormat,
};
use tracing::{info, warn, Level};

#[derive(Parser)]
#[command(name = "dectalk-session")]
#[command(about = "Drive a speech engine session: speak text to audio, a wave file or a log file")]
struct Args {
    /// Config file (TOML, extension optional)
    #[arg(short, long)]
    config: Option<String>,

    /// Text to speak (repeatable; queued in order)
    #[arg(short, long)]
    text: Vec<String>,

    /// Phoneme directives spoken with phoneme input enabled
    #[arg(long)]
    phonemes: Option<String>,

    /// Capture speech to this wave file
    #[arg(short, long, conflicts_with = "log")]
    wave: Option<String>,

    /// Capture speech records to this log file
    #[arg(short, long)]
    log: Option<String>,

    /// Log record kinds: text, phonemes, syllables
    #[arg(long, value_delimiter = ',')]
    log_flags: Vec<LogFlag>,

    /// Wave format: mono8-11025, mono16-11025, mulaw8-8000
    #[arg(short, long)]
    format: Option<WaveFormat>,

    /// Speaking rate in words per minute (75-600)
    #[arg(short, long)]
    rate: Option<u32>,

    /// Speaker voice
    #[arg(short = 'V', long)]
    voice: Option<Voice>,

    /// User dictionary to load
    #[arg(short, long)]
    dictionary: Option<PathBuf>,

    /// Language pack to load and select
    #[arg(long)]
    language: Option<String>,

    /// Print the engine version and exit
    #[arg(long)]
    version_info: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(if args.verbose { Level::DEBUG } else { Level::INFO })
        .init();

    let mut cfg = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if args.rate.is_some() {
        cfg.session.rate = args.rate;
    }
    if args.voice.is_some() {
        cfg.session.speaker = args.voice;
    }
    if let Some(path) = &args.dictionary {
        cfg.session.user_dictionary = Some(path.clone());
    }
    if cfg.session.device_options.is_empty() {
        cfg.session.device_options = vec![
            DeviceOption::DoNotUseAudioDevice,
            DeviceOption::ReportOpenError,
        ];
    }

    let engine = Arc::new(SimulatedEngine::new(cfg.engine.clone()));
    let mut session = Session::from_config(engine.clone(), &cfg.session)
        .context("Failed to start speech session")?;

    info!("Speech session {} started", session.id());

    if args.version_info {
        println!("{}", session.version());
        session.shutdown()?;
        return Ok(());
    }

    let languages = session.languages();
    let mut context = LanguageContext::new();
    let language = match &args.language {
        Some(code) => {
            let language = languages.load(code)?;
            if !languages.select(&mut context, &language) {
                warn!("Could not select language {}", code);
            }
            Some(language)
        }
        None => None,
    };

    let output_dir = cfg.output.directory();
    let expand = |path: &str| -> PathBuf {
        let path = PathBuf::from(shellexpand::tilde(path).as_ref());
        if path.is_absolute() {
            path
        } else {
            output_dir.join(path)
        }
    };

    if let Some(wave) = &args.wave {
        let path = expand(wave);
        let format = args.format.unwrap_or(cfg.output.wave_format);
        session.open_wave_out_file(&path, format)?;
    } else if let Some(log) = &args.log {
        let path = expand(log);
        let flags: LogFlags = if args.log_flags.is_empty() {
            cfg.output.log_flags()
        } else {
            args.log_flags.iter().copied().collect()
        };
        session.open_log_file(&path, flags)?;
    }

    if let Some(phonemes) = &args.phonemes {
        session.speak("[:PHONE ON]", SpeakPriority::Normal)?;
        session.speak(phonemes, SpeakPriority::Force)?;
    }
    for text in &args.text {
        session.speak(text, SpeakPriority::Force)?;
    }

    session.sync()?;
    info!("Speaker: {}, rate: {} wpm", session.get_speaker()?, session.get_rate()?);

    match session.mode() {
        Mode::WaveFile => session.close_wave_out_file()?,
        Mode::LogFile => session.close_log_file()?,
        _ => {}
    }

    let stats = session.stats();
    session.shutdown()?;

    if let Some(language) = language {
        if !languages.unload(&mut context, &language) {
            info!("Language {} still in use elsewhere", language.code());
        }
    }

    info!(
        "Rendered {} phrases ({} dropped)",
        engine.rendered_phrases(),
        engine.dropped_phrases()
    );
    println!("{}", serde_json::to_string_pretty(&stats)?);

    Ok(())
}

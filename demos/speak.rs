// Example: Render a short phoneme tune and a sentence to a wave file
//
// This example demonstrates the basic session lifecycle:
// 1. Start a session that never touches the audio device
// 2. Open a wave file for capture
// 3. Queue phoneme input and plain text
// 4. Wait for rendering, close the file and shut down
//
// Usage: cargo run --example speak -- --output test.wav
//
// This will write a 16-bit mono 11025 Hz wave file.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use dectalk_session::{
    DeviceOption, Session, SimulatedEngine, SpeakPriority, Voice, WaveFormat,
};
use tracing::{info, Level};

const TUNE: &str = "[dah<600,20>][dah<600,20>][dah<600,20>]\
                    [dah<500,16>][dah<130,23>][dah<600,20>]\
                    [dah<500,16>][dah<130,23>][dah<600,20>]";

#[derive(Parser)]
#[command(name = "speak")]
#[command(about = "Render speech to a wave file")]
struct Args {
    /// Output wave file
    #[arg(short, long, default_value = "test.wav")]
    output: String,

    /// Text spoken after the tune
    #[arg(
        short,
        long,
        default_value = "Congratulations, you can now synthesize any text you like. aeiou"
    )]
    text: String,

    /// Speaker voice
    #[arg(short, long, default_value = "paul")]
    voice: Voice,
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .init();

    let args = Args::parse();

    let output = PathBuf::from(shellexpand::tilde(&args.output).as_ref());
    info!("Output file: {}", output.display());

    let engine = Arc::new(SimulatedEngine::default());
    let mut session = Session::start(
        engine.clone(),
        DeviceOption::DoNotUseAudioDevice | DeviceOption::ReportOpenError,
    )?;
    session.set_speaker(args.voice)?;

    session.open_wave_out_file(&output, WaveFormat::Mono16Khz11)?;

    // Phoneme input must be switched on before the tune
    session.speak("[:PHONE ON]", SpeakPriority::Normal)?;
    session.speak(TUNE, SpeakPriority::Force)?;
    session.speak(&args.text, SpeakPriority::Force)?;

    info!("Waiting for rendering to finish...");
    session.sync()?;

    session.close_wave_out_file()?;
    session.shutdown()?;

    info!(
        "Done! {} phrases, {} samples written to {}",
        engine.rendered_phrases(),
        engine.rendered_samples(),
        output.display()
    );

    Ok(())
}

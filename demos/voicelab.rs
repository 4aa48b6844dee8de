use std::path::PathBuf;
use std::time::Instant;

use voicelab::{effects, EngineConfig, EngineController};

/// Usage: voicelab <text> <reference.wav> [language] [mood] [intensity] [config.json]
fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let text = args
        .next()
        .unwrap_or_else(|| "Olá! Esta é uma demonstração de clonagem de voz.".to_string());
    let reference = args.next().map(PathBuf::from);
    let language = args.next().unwrap_or_else(|| "pt".to_string());
    let mood = args.next().unwrap_or_else(|| "normal".to_string());
    let intensity: i32 = args.next().map(|s| s.parse()).transpose()?.unwrap_or(3);
    let config = match args.next() {
        Some(path) => EngineConfig::from_json_file(&PathBuf::from(path))?,
        None => EngineConfig::default(),
    };

    let engine = EngineController::new(config);
    let load_start = Instant::now();
    engine.initialize();
    let backend = engine.ensure_ready()?;
    println!("Engine ready with {backend} in {:.2?}", load_start.elapsed());
    if let Some(reason) = engine.last_error() {
        println!("Primary backend unavailable: {reason}");
    }

    let synth_start = Instant::now();
    let raw = engine.synthesize(&text, reference.as_deref(), &language)?;
    let synth_dur = synth_start.elapsed();
    println!(
        "Synthesized {:.2}s audio in {:.2?} ({:.1}x real-time)",
        raw.duration_secs(),
        synth_dur,
        raw.duration_secs() / synth_dur.as_secs_f64()
    );

    let output = match effects::apply_mood(&raw, &mood, intensity) {
        Ok(processed) => processed,
        Err(e) => {
            eprintln!("Mood processing failed ({e}), writing raw audio");
            raw
        }
    };
    output.write_wav(&PathBuf::from("output.wav"))?;
    println!("Saved to output.wav");
    println!("{}", serde_json::to_string_pretty(&engine.status())?);

    engine.shutdown();
    Ok(())
}

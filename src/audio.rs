//! Audio decoding and 16-bit PCM encoding.
//!
//! WAV goes through hound; MP3, M4A, OGG and FLAC go through symphonia.
//! Multi-channel input is downmixed to mono by averaging each frame.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::error::{Result, VoiceLabError};
use crate::SignalBuffer;

/// File extensions accepted for reference recordings.
pub const SUPPORTED_EXTENSIONS: [&str; 5] = ["wav", "mp3", "m4a", "ogg", "flac"];

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

/// Decode any supported audio file into a mono [`SignalBuffer`].
pub fn read_audio(path: &Path) -> Result<SignalBuffer> {
    match extension(path).as_deref() {
        Some("wav") => read_wav(path),
        Some(ext) if SUPPORTED_EXTENSIONS.contains(&ext) => read_compressed(path, ext),
        _ => Err(VoiceLabError::UnsupportedFormat(format!(
            "{}: expected one of {}",
            path.display(),
            SUPPORTED_EXTENSIONS.join(", ")
        ))),
    }
}

/// Decode a WAV file into a mono [`SignalBuffer`].
pub fn read_wav(path: &Path) -> Result<SignalBuffer> {
    if extension(path).as_deref() != Some("wav") {
        return Err(VoiceLabError::UnsupportedFormat(format!(
            "{}: not a WAV file",
            path.display()
        )));
    }

    let reader = hound::WavReader::open(path).map_err(|e| match e {
        hound::Error::IoError(io) => VoiceLabError::Io(io),
        other => VoiceLabError::UnsupportedFormat(format!("{}: {other}", path.display())),
    })?;
    decode(reader)
}

fn unsupported(path: &Path, e: impl std::fmt::Display) -> VoiceLabError {
    VoiceLabError::UnsupportedFormat(format!("{}: {e}", path.display()))
}

/// Decode a compressed container through symphonia.
fn read_compressed(path: &Path, ext: &str) -> Result<SignalBuffer> {
    let mss = MediaSourceStream::new(Box::new(File::open(path)?), Default::default());
    let mut hint = Hint::new();
    hint.with_extension(ext);

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| unsupported(path, e))?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| unsupported(path, "no decodable audio track"))?;
    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| unsupported(path, "unknown sample rate"))?;
    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| unsupported(path, e))?;

    let mut samples = Vec::new();
    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(ref e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(unsupported(path, e)),
        };
        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                let channels = spec.channels.count().max(1);
                let mut buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                buf.copy_interleaved_ref(decoded);
                if channels == 1 {
                    samples.extend_from_slice(buf.samples());
                } else {
                    samples.extend(
                        buf.samples()
                            .chunks_exact(channels)
                            .map(|frame| frame.iter().sum::<f32>() / channels as f32),
                    );
                }
            }
            Err(SymphoniaError::DecodeError(e)) => {
                log::warn!("Skipping corrupt packet in {}: {e}", path.display());
            }
            Err(e) => return Err(unsupported(path, e)),
        }
    }

    Ok(SignalBuffer::new(samples, sample_rate))
}

/// Decode WAV data from any reader.
pub fn read_wav_from<R: Read>(reader: R) -> Result<SignalBuffer> {
    let reader = hound::WavReader::new(reader)
        .map_err(|e| VoiceLabError::UnsupportedFormat(e.to_string()))?;
    decode(reader)
}

fn decode<R: Read>(mut reader: hound::WavReader<R>) -> Result<SignalBuffer> {
    let spec = reader.spec();
    if spec.channels == 0 || spec.sample_rate == 0 {
        return Err(VoiceLabError::UnsupportedFormat(format!(
            "invalid WAV header: {} channels at {} Hz",
            spec.channels, spec.sample_rate
        )));
    }

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => {
            if spec.bits_per_sample != 32 {
                return Err(VoiceLabError::UnsupportedFormat(format!(
                    "{}-bit float WAV",
                    spec.bits_per_sample
                )));
            }
            reader
                .samples::<f32>()
                .collect::<std::result::Result<_, _>>()?
        }
        hound::SampleFormat::Int => {
            if !(8..=32).contains(&spec.bits_per_sample) {
                return Err(VoiceLabError::UnsupportedFormat(format!(
                    "{}-bit integer WAV",
                    spec.bits_per_sample
                )));
            }
            let scale = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<std::result::Result<_, _>>()?
        }
    };

    let channels = spec.channels as usize;
    let samples = if channels == 1 {
        interleaved
    } else {
        interleaved
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect()
    };

    Ok(SignalBuffer::new(samples, spec.sample_rate))
}

/// Convert samples to 16-bit signed PCM, clamping to full scale.
pub fn to_pcm16(samples: &[f32]) -> Vec<i16> {
    samples
        .iter()
        .map(|&s| (s.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16)
        .collect()
}

/// Write a buffer as a 16-bit PCM mono WAV file.
pub fn write_wav(buffer: &SignalBuffer, path: &Path) -> Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: buffer.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)?;
    for sample in to_pcm16(&buffer.samples) {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;
    Ok(())
}

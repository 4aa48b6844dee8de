//! Mood effect chain and the reduced normalization paths.
//!
//! The full chain runs, in order:
//!
//! ```text
//! normalize -> pitch shift -> time-stretch -> gain -> [soft clip] -> normalize -> resample
//! ```
//!
//! Pitch shift and time-stretch are skipped when their parameters are within
//! a small tolerance of identity. The soft clip only runs for the `angry`
//! mood above a factor of 0.2. Every output is at [`TARGET_SAMPLE_RATE`] with
//! a peak no greater than [`SAFETY_CEILING`].
//!
//! The chain holds no state; concurrent calls need no synchronization.

pub mod mood;
pub mod resample;
pub mod stages;
pub mod vocoder;

pub use mood::{intensity_factor, EffectParameters, MoodProfile, MOOD_CATALOG};
pub use stages::{
    EffectStage, GainAdjust, PeakNormalize, PitchShift, Resample, SoftClip, TimeStretch,
    SAFETY_CEILING, SAFETY_TARGET,
};

use crate::error::Result;
use crate::{SignalBuffer, TARGET_SAMPLE_RATE};

/// Peak target for imported reference recordings.
pub const REFERENCE_PEAK: f32 = 0.9;
/// Peak target for raw fallback-backend output.
pub const FALLBACK_PEAK: f32 = 0.85;

const PITCH_TOLERANCE: f32 = 0.01;
const SPEED_TOLERANCE: f32 = 0.005;
const DISTORTION_MIN_FACTOR: f32 = 0.2;

/// The ordered stages for one mood at one intensity.
pub struct EffectChain {
    profile: &'static MoodProfile,
    params: EffectParameters,
    stages: Vec<Box<dyn EffectStage + Send + Sync>>,
}

impl EffectChain {
    /// Build the chain for `mood` at `intensity`.
    ///
    /// Unknown moods fall back to `normal`; intensity is clamped to 1..=5.
    pub fn new(mood: &str, intensity: i32) -> Self {
        let profile = MoodProfile::resolve(mood);
        if profile.name != mood {
            log::debug!("Unknown mood {mood:?}, using '{}'", profile.name);
        }
        let params = profile.parameters(intensity);

        let mut stages: Vec<Box<dyn EffectStage + Send + Sync>> =
            vec![Box::new(PeakNormalize::Safety)];
        if params.pitch_steps.abs() > PITCH_TOLERANCE {
            stages.push(Box::new(PitchShift {
                semitones: params.pitch_steps,
            }));
        }
        if (params.speed_rate - 1.0).abs() > SPEED_TOLERANCE {
            stages.push(Box::new(TimeStretch {
                rate: params.speed_rate,
            }));
        }
        stages.push(Box::new(GainAdjust {
            linear: params.gain_linear,
        }));
        if profile.name == "angry" && params.factor > DISTORTION_MIN_FACTOR {
            stages.push(Box::new(SoftClip::for_factor(params.factor)));
        }
        stages.push(Box::new(PeakNormalize::Safety));
        stages.push(Box::new(Resample {
            target_rate: TARGET_SAMPLE_RATE,
        }));
        // Sinc interpolation can overshoot between samples.
        stages.push(Box::new(PeakNormalize::Safety));

        Self {
            profile,
            params,
            stages,
        }
    }

    pub fn profile(&self) -> &MoodProfile {
        self.profile
    }

    pub fn parameters(&self) -> EffectParameters {
        self.params
    }

    /// Names of the stages this chain will run, in order.
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    pub fn apply(&self, buffer: SignalBuffer) -> Result<SignalBuffer> {
        self.stages
            .iter()
            .try_fold(buffer, |buffer, stage| stage.process(buffer))
    }
}

/// Apply a mood to a buffer. Output is at 44100 Hz with a bounded peak.
pub fn apply_mood(buffer: &SignalBuffer, mood: &str, intensity: i32) -> Result<SignalBuffer> {
    let chain = EffectChain::new(mood, intensity);
    let output = chain.apply(buffer.clone())?;
    log::info!(
        "Mood '{}' (intensity={intensity}) applied: {:.2}s -> {:.2}s",
        chain.profile().name,
        buffer.duration_secs(),
        output.duration_secs()
    );
    Ok(output)
}

fn normalize_to(buffer: &SignalBuffer, peak: f32) -> Result<SignalBuffer> {
    let resampled = Resample {
        target_rate: TARGET_SAMPLE_RATE,
    }
    .process(buffer.clone())?;
    PeakNormalize::Target(peak).process(resampled)
}

/// Prepare an imported reference recording: 44100 Hz, peak at [`REFERENCE_PEAK`].
pub fn normalize_for_storage(buffer: &SignalBuffer) -> Result<SignalBuffer> {
    normalize_to(buffer, REFERENCE_PEAK)
}

/// Prepare raw fallback output: 44100 Hz, peak at [`FALLBACK_PEAK`].
pub fn normalize_fallback_output(buffer: &SignalBuffer) -> Result<SignalBuffer> {
    normalize_to(buffer, FALLBACK_PEAK)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::VoiceLabError;
    use std::f32::consts::PI;

    fn sine(freq: f32, amplitude: f32, sample_rate: u32, len: usize) -> SignalBuffer {
        let samples = (0..len)
            .map(|i| amplitude * (2.0 * PI * freq * i as f32 / sample_rate as f32).sin())
            .collect();
        SignalBuffer::new(samples, sample_rate)
    }

    /// Energy at `freq` via a single-bin DFT.
    fn tone_energy(samples: &[f32], sample_rate: u32, freq: f32) -> f32 {
        let (mut re, mut im) = (0.0f64, 0.0f64);
        for (i, &s) in samples.iter().enumerate() {
            let phase = 2.0 * std::f64::consts::PI * freq as f64 * i as f64 / sample_rate as f64;
            re += s as f64 * phase.cos();
            im -= s as f64 * phase.sin();
        }
        ((re * re + im * im).sqrt() / samples.len() as f64) as f32
    }

    #[test]
    fn normal_mood_only_changes_rate() {
        for intensity in 1..=5 {
            let chain = EffectChain::new("normal", intensity);
            assert_eq!(
                chain.stage_names(),
                vec!["normalize", "gain", "normalize", "resample", "normalize"]
            );
        }

        let input = sine(220.0, 0.5, 44100, 4410);
        let output = apply_mood(&input, "normal", 5).unwrap();
        assert_eq!(output, input);

        let input = sine(220.0, 0.5, 22050, 22050);
        let output = apply_mood(&input, "normal", 3).unwrap();
        assert_eq!(output.sample_rate, TARGET_SAMPLE_RATE);
        assert_eq!(output.len(), 44100);
    }

    #[test]
    fn unknown_mood_behaves_like_normal() {
        let chain = EffectChain::new("sarcastic", 5);
        assert_eq!(chain.profile().name, "normal");
        assert_eq!(chain.parameters().gain_linear, 1.0);
    }

    #[test]
    fn intensity_one_skips_pitch_and_stretch() {
        for mood in ["upbeat", "angry", "excited"] {
            let names = EffectChain::new(mood, 1).stage_names();
            assert!(!names.contains(&"pitch_shift"));
            assert!(!names.contains(&"time_stretch"));
            assert!(!names.contains(&"soft_clip"));
        }
    }

    #[test]
    fn soft_clip_only_for_angry_above_threshold() {
        // intensity 1 -> 0.0, 2 -> 0.25
        assert!(!EffectChain::new("angry", 1).stage_names().contains(&"soft_clip"));
        assert!(EffectChain::new("angry", 2).stage_names().contains(&"soft_clip"));
        assert!(EffectChain::new("angry", 5).stage_names().contains(&"soft_clip"));
        for intensity in 1..=5 {
            assert!(!EffectChain::new("excited", intensity)
                .stage_names()
                .contains(&"soft_clip"));
            assert!(!EffectChain::new("upbeat", intensity)
                .stage_names()
                .contains(&"soft_clip"));
        }
    }

    #[test]
    fn every_mood_respects_peak_and_rate() {
        let input = sine(180.0, 0.9, 22050, 22050);
        for profile in MOOD_CATALOG.iter() {
            for intensity in [1, 3, 5] {
                let output = apply_mood(&input, profile.name, intensity).unwrap();
                assert_eq!(output.sample_rate, TARGET_SAMPLE_RATE);
                assert!(
                    output.peak() <= SAFETY_CEILING,
                    "{} at {intensity}: peak {}",
                    profile.name,
                    output.peak()
                );
            }
        }
    }

    #[test]
    fn speed_changes_duration() {
        let input = sine(180.0, 0.5, 44100, 44100);
        let output = apply_mood(&input, "excited", 5).unwrap();
        let expected = (44100.0f64 / 1.22).round() as usize;
        assert_eq!(output.len(), expected);
    }

    #[test]
    fn angry_full_intensity_adds_harmonics() {
        let sample_rate = 44100;
        let input = sine(200.0, 0.9, sample_rate, 44100);
        let chain = EffectChain::new("angry", 5);
        assert_eq!(chain.parameters().factor, 1.0);
        assert!(chain.stage_names().contains(&"soft_clip"));

        // Pre-distortion: the signal as it reaches the soft clip stage.
        let gained = GainAdjust {
            linear: chain.parameters().gain_linear,
        }
        .process(input)
        .unwrap();
        let clipped = SoftClip::for_factor(1.0).process(gained.clone()).unwrap();
        let before = tone_energy(&gained.samples, sample_rate, 600.0);
        let after = tone_energy(&clipped.samples, sample_rate, 600.0);
        assert!(before < 1e-3, "third harmonic before clip: {before}");
        assert!(after > 10.0 * before.max(1e-4), "third harmonic after clip: {after}");

        let output = chain.apply(sine(200.0, 0.9, sample_rate, 44100)).unwrap();
        assert!(output.peak() <= SAFETY_CEILING);
    }

    #[test]
    fn empty_buffer_fails_the_chain() {
        let err = apply_mood(&SignalBuffer::new(vec![], 24000), "upbeat", 3).unwrap_err();
        assert!(matches!(err, VoiceLabError::EffectStageFailed { .. }));
    }

    #[test]
    fn chain_is_deterministic() {
        let input = sine(150.0, 0.6, 24000, 12000);
        let a = apply_mood(&input, "upbeat", 4).unwrap();
        let b = apply_mood(&input, "upbeat", 4).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn storage_and_fallback_ceilings_differ() {
        let input = sine(220.0, 0.3, 22050, 2205);

        let stored = normalize_for_storage(&input).unwrap();
        assert_eq!(stored.sample_rate, TARGET_SAMPLE_RATE);
        assert!((stored.peak() - REFERENCE_PEAK).abs() < 1e-5);

        let fallback = normalize_fallback_output(&input).unwrap();
        assert_eq!(fallback.sample_rate, TARGET_SAMPLE_RATE);
        assert!((fallback.peak() - FALLBACK_PEAK).abs() < 1e-5);
    }

    #[test]
    fn single_sample_at_high_rate_is_processed() {
        let input = SignalBuffer::new(vec![0.4], 96000);
        for mood in ["normal", "upbeat", "angry"] {
            let output = apply_mood(&input, mood, 5).unwrap();
            assert_eq!(output.sample_rate, TARGET_SAMPLE_RATE);
            assert_eq!(output.len(), 1);
        }
    }
}

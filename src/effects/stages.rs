use crate::error::{Result, VoiceLabError};
use crate::SignalBuffer;

use super::{resample, vocoder};

/// Peak above which the safety normalizer engages.
pub const SAFETY_CEILING: f32 = 0.98;
/// Peak the safety normalizer scales down to.
pub const SAFETY_TARGET: f32 = 0.95;

/// One step of the effect chain. Consumes a buffer and produces a new one.
pub trait EffectStage {
    fn name(&self) -> &'static str;

    fn process(&self, input: SignalBuffer) -> Result<SignalBuffer>;
}

fn check_input(stage: &'static str, input: &SignalBuffer) -> Result<()> {
    if input.is_empty() {
        return Err(VoiceLabError::stage(stage, "empty input buffer"));
    }
    if input.sample_rate == 0 {
        return Err(VoiceLabError::stage(stage, "sample rate is zero"));
    }
    Ok(())
}

fn check_finite(stage: &'static str, input: &SignalBuffer) -> Result<()> {
    if input.samples.iter().any(|s| !s.is_finite()) {
        return Err(VoiceLabError::stage(stage, "input contains non-finite samples"));
    }
    Ok(())
}

/// Shift pitch by a number of semitones while keeping the duration.
#[derive(Debug, Clone, Copy)]
pub struct PitchShift {
    pub semitones: f32,
}

impl EffectStage for PitchShift {
    fn name(&self) -> &'static str {
        "pitch_shift"
    }

    /// Time-stretch by `2^(-n/12)`, then resample by the same ratio so the
    /// duration comes back to the original and the pitch moves by `n`.
    fn process(&self, input: SignalBuffer) -> Result<SignalBuffer> {
        check_input(self.name(), &input)?;
        check_finite(self.name(), &input)?;

        let rate = 2f32.powf(-self.semitones / 12.0);
        let stretched = vocoder::time_stretch(&input.samples, rate);
        if stretched.is_empty() {
            return Err(VoiceLabError::stage(self.name(), "input too short to shift"));
        }
        let mut samples = resample::resample_ratio(&stretched, rate as f64)?;
        samples.resize(input.len(), 0.0);
        Ok(SignalBuffer::new(samples, input.sample_rate))
    }
}

/// Change speed without changing pitch. `rate > 1` is faster.
#[derive(Debug, Clone, Copy)]
pub struct TimeStretch {
    pub rate: f32,
}

impl EffectStage for TimeStretch {
    fn name(&self) -> &'static str {
        "time_stretch"
    }

    fn process(&self, input: SignalBuffer) -> Result<SignalBuffer> {
        check_input(self.name(), &input)?;
        check_finite(self.name(), &input)?;
        if !self.rate.is_finite() || self.rate <= 0.0 {
            return Err(VoiceLabError::stage(self.name(), format!("invalid rate {}", self.rate)));
        }

        let samples = vocoder::time_stretch(&input.samples, self.rate);
        if samples.is_empty() {
            return Err(VoiceLabError::stage(self.name(), "input too short to stretch"));
        }
        Ok(SignalBuffer::new(samples, input.sample_rate))
    }
}

/// Multiply every sample by a linear gain.
#[derive(Debug, Clone, Copy)]
pub struct GainAdjust {
    pub linear: f32,
}

impl EffectStage for GainAdjust {
    fn name(&self) -> &'static str {
        "gain"
    }

    fn process(&self, mut input: SignalBuffer) -> Result<SignalBuffer> {
        check_input(self.name(), &input)?;
        for s in &mut input.samples {
            *s *= self.linear;
        }
        Ok(input)
    }
}

/// `tanh` saturation bounded by `threshold`.
///
/// Adds odd harmonics. A lower threshold saturates earlier.
#[derive(Debug, Clone, Copy)]
pub struct SoftClip {
    pub threshold: f32,
}

impl SoftClip {
    /// Threshold for a distortion factor in `[0, 1]`: 0.85 down to 0.70.
    pub fn for_factor(factor: f32) -> Self {
        Self {
            threshold: 0.85 - 0.15 * factor,
        }
    }
}

impl EffectStage for SoftClip {
    fn name(&self) -> &'static str {
        "soft_clip"
    }

    fn process(&self, mut input: SignalBuffer) -> Result<SignalBuffer> {
        check_input(self.name(), &input)?;
        if self.threshold <= 0.0 {
            return Err(VoiceLabError::stage(self.name(), "threshold must be positive"));
        }
        let t = self.threshold;
        for s in &mut input.samples {
            *s = (*s / t).tanh() * t;
        }
        Ok(input)
    }
}

/// Peak normalization.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PeakNormalize {
    /// Scale down to [`SAFETY_TARGET`] only when the peak exceeds [`SAFETY_CEILING`].
    Safety,
    /// Scale any non-silent buffer so its peak equals the target.
    Target(f32),
}

impl EffectStage for PeakNormalize {
    fn name(&self) -> &'static str {
        "normalize"
    }

    fn process(&self, mut input: SignalBuffer) -> Result<SignalBuffer> {
        check_input(self.name(), &input)?;
        let peak = input.peak();
        let gain = match *self {
            PeakNormalize::Safety if peak > SAFETY_CEILING => SAFETY_TARGET / peak,
            PeakNormalize::Target(target) if peak > 0.0 => target / peak,
            _ => return Ok(input),
        };
        for s in &mut input.samples {
            *s *= gain;
        }
        Ok(input)
    }
}

/// Convert to a fixed sample rate. No-op when the rate already matches.
#[derive(Debug, Clone, Copy)]
pub struct Resample {
    pub target_rate: u32,
}

impl EffectStage for Resample {
    fn name(&self) -> &'static str {
        "resample"
    }

    fn process(&self, input: SignalBuffer) -> Result<SignalBuffer> {
        check_input(self.name(), &input)?;
        if input.sample_rate == self.target_rate {
            return Ok(input);
        }
        log::debug!("Resampling {} Hz -> {} Hz", input.sample_rate, self.target_rate);
        let samples = resample::resample(&input.samples, input.sample_rate, self.target_rate)?;
        Ok(SignalBuffer::new(samples, self.target_rate))
    }
}

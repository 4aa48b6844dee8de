//! Band-limited sample rate conversion using rubato.

use rubato::{
    calculate_cutoff, Resampler, SincFixedIn, SincInterpolationParameters,
    SincInterpolationType, WindowFunction,
};

use crate::error::{Result, VoiceLabError};

const CHUNK_SIZE: usize = 1024;
const SINC_LEN: usize = 256;

/// Resample `samples` from `from_rate` to `to_rate`.
///
/// The output has exactly `round(len * to_rate / from_rate)` samples with
/// the filter delay removed, so it stays time-aligned with the input.
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>> {
    if from_rate == to_rate {
        return Ok(samples.to_vec());
    }
    if from_rate == 0 || to_rate == 0 {
        return Err(VoiceLabError::stage(
            "resample",
            format!("invalid rate conversion {from_rate} Hz -> {to_rate} Hz"),
        ));
    }
    resample_ratio(samples, to_rate as f64 / from_rate as f64)
}

/// Resample by an arbitrary `ratio` (output rate / input rate).
pub fn resample_ratio(samples: &[f32], ratio: f64) -> Result<Vec<f32>> {
    if samples.is_empty() {
        return Ok(Vec::new());
    }
    if !ratio.is_finite() || ratio <= 0.0 {
        return Err(VoiceLabError::stage("resample", format!("invalid ratio {ratio}")));
    }

    let window = WindowFunction::BlackmanHarris2;
    let params = SincInterpolationParameters {
        sinc_len: SINC_LEN,
        f_cutoff: calculate_cutoff(SINC_LEN, window),
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window,
    };

    let mut resampler = SincFixedIn::<f32>::new(ratio, 1.0, params, CHUNK_SIZE, 1)
        .map_err(|e| VoiceLabError::stage("resample", e.to_string()))?;

    // A non-empty input never resamples to nothing.
    let expected = ((samples.len() as f64 * ratio).round() as usize).max(1);
    let delay = resampler.output_delay();
    let mut output = Vec::with_capacity(expected + delay + CHUNK_SIZE);

    let mut chunks = samples.chunks_exact(CHUNK_SIZE);
    for chunk in chunks.by_ref() {
        let out = resampler
            .process(&[chunk], None)
            .map_err(|e| VoiceLabError::stage("resample", e.to_string()))?;
        output.extend_from_slice(&out[0]);
    }

    let remainder = chunks.remainder();
    if !remainder.is_empty() {
        let out = resampler
            .process_partial(Some(&[remainder][..]), None)
            .map_err(|e| VoiceLabError::stage("resample", e.to_string()))?;
        output.extend_from_slice(&out[0]);
    }

    // Flush the filter tail until the delayed output is complete.
    while output.len() < expected + delay {
        let out = resampler
            .process_partial::<&[f32]>(None, None)
            .map_err(|e| VoiceLabError::stage("resample", e.to_string()))?;
        if out[0].is_empty() {
            break;
        }
        output.extend_from_slice(&out[0]);
    }

    let mut aligned: Vec<f32> = output.into_iter().skip(delay).take(expected).collect();
    aligned.resize(expected, 0.0);
    Ok(aligned)
}

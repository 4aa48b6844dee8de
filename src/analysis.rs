//! Speaker gender classification from the median fundamental frequency.

use serde::{Deserialize, Serialize};

use crate::SignalBuffer;

/// Median F0 at or above this is classified as female.
pub const GENDER_THRESHOLD_HZ: f32 = 165.0;

const F0_MIN_HZ: f32 = 65.0; // ~C2
const F0_MAX_HZ: f32 = 1047.0; // ~C6
const FRAME_SECS: f32 = 0.04;
const HOP_SECS: f32 = 0.02;
const MIN_RMS: f32 = 0.01;
const VOICING_THRESHOLD: f32 = 0.6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Female,
    Male,
    Unknown,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Female => "female",
            Gender::Male => "male",
            Gender::Unknown => "unknown",
        }
    }
}

/// Classify the speaker of an utterance. Silence or unvoiced audio is `Unknown`.
pub fn detect_gender(buffer: &SignalBuffer) -> Gender {
    match median_f0(buffer) {
        Some(f0) if f0 >= GENDER_THRESHOLD_HZ => Gender::Female,
        Some(_) => Gender::Male,
        None => Gender::Unknown,
    }
}

/// Median fundamental frequency over voiced frames, if any frame is voiced.
pub fn median_f0(buffer: &SignalBuffer) -> Option<f32> {
    let sr = buffer.sample_rate as f32;
    let frame_len = (FRAME_SECS * sr) as usize;
    let hop = ((HOP_SECS * sr) as usize).max(1);
    let min_lag = ((sr / F0_MAX_HZ).floor() as usize).max(2);
    let max_lag = (sr / F0_MIN_HZ).ceil() as usize;
    if frame_len <= max_lag + 1 || buffer.len() < frame_len {
        return None;
    }

    let mut pitches: Vec<f32> = buffer
        .samples
        .windows(frame_len)
        .step_by(hop)
        .filter_map(|frame| frame_f0(frame, sr, min_lag, max_lag))
        .collect();
    if pitches.is_empty() {
        return None;
    }

    pitches.sort_by(f32::total_cmp);
    let mid = pitches.len() / 2;
    let median = if pitches.len() % 2 == 0 {
        (pitches[mid - 1] + pitches[mid]) / 2.0
    } else {
        pitches[mid]
    };
    log::debug!("Median F0 {median:.1} Hz over {} voiced frames", pitches.len());
    Some(median)
}

fn frame_f0(frame: &[f32], sr: f32, min_lag: usize, max_lag: usize) -> Option<f32> {
    let energy: f32 = frame.iter().map(|s| s * s).sum();
    if (energy / frame.len() as f32).sqrt() < MIN_RMS {
        return None;
    }

    let correlation: Vec<f32> = (min_lag..=max_lag)
        .map(|lag| normalized_autocorrelation(frame, lag))
        .collect();
    let best = correlation.iter().copied().fold(f32::MIN, f32::max);
    if best < VOICING_THRESHOLD {
        return None;
    }

    // The shortest period close to the best one avoids picking a subharmonic.
    let idx = correlation.iter().position(|&r| r >= 0.9 * best)?;
    // Walk up to the local maximum before interpolating.
    let mut peak = idx;
    while peak + 1 < correlation.len() && correlation[peak + 1] > correlation[peak] {
        peak += 1;
    }

    let offset = if peak > 0 && peak + 1 < correlation.len() {
        let (a, b, c) = (correlation[peak - 1], correlation[peak], correlation[peak + 1]);
        let denom = a - 2.0 * b + c;
        if denom.abs() > f32::EPSILON {
            0.5 * (a - c) / denom
        } else {
            0.0
        }
    } else {
        0.0
    };
    let lag = (min_lag + peak) as f32 + offset;
    Some(sr / lag)
}

fn normalized_autocorrelation(frame: &[f32], lag: usize) -> f32 {
    let (head, tail) = (&frame[..frame.len() - lag], &frame[lag..]);
    let mut cross = 0.0f32;
    let mut e0 = 0.0f32;
    let mut e1 = 0.0f32;
    for (a, b) in head.iter().zip(tail) {
        cross += a * b;
        e0 += a * a;
        e1 += b * b;
    }
    let denom = (e0 * e1).sqrt();
    if denom > 0.0 {
        cross / denom
    } else {
        0.0
    }
}

//! STFT phase vocoder used for time-stretching.
//!
//! Frames are centred (the signal is zero-padded by half a window on each
//! side), analysed with a periodic Hann window, and resynthesised by
//! weighted overlap-add normalised by the summed squared window.

use std::f32::consts::PI;

use rustfft::num_complex::Complex;
use rustfft::FftPlanner;

pub const N_FFT: usize = 2048;
pub const HOP_LENGTH: usize = 512;

const N_BINS: usize = N_FFT / 2 + 1;

fn hann_window() -> Vec<f32> {
    (0..N_FFT)
        .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f32 / N_FFT as f32).cos())
        .collect()
}

/// Stretch `samples` in time by `rate` without changing pitch.
///
/// `rate > 1` speeds speech up. The output has exactly
/// `round(samples.len() / rate)` samples.
pub fn time_stretch(samples: &[f32], rate: f32) -> Vec<f32> {
    let out_len = (samples.len() as f64 / rate as f64).round() as usize;
    if samples.is_empty() || out_len == 0 {
        return Vec::new();
    }

    let mut planner = FftPlanner::<f32>::new();
    let window = hann_window();
    let frames = stft(samples, &window, &mut planner);
    let stretched = phase_vocoder(&frames, rate);
    istft(&stretched, &window, out_len, &mut planner)
}

fn stft(samples: &[f32], window: &[f32], planner: &mut FftPlanner<f32>) -> Vec<Vec<Complex<f32>>> {
    let pad = N_FFT / 2;
    let mut padded = vec![0.0f32; samples.len() + 2 * pad];
    padded[pad..pad + samples.len()].copy_from_slice(samples);
    if padded.len() < N_FFT {
        padded.resize(N_FFT, 0.0);
    }

    let fft = planner.plan_fft_forward(N_FFT);
    let n_frames = 1 + (padded.len() - N_FFT) / HOP_LENGTH;
    let mut frames = Vec::with_capacity(n_frames);
    let mut buf = vec![Complex::new(0.0f32, 0.0); N_FFT];

    for f in 0..n_frames {
        let start = f * HOP_LENGTH;
        for (i, slot) in buf.iter_mut().enumerate() {
            *slot = Complex::new(padded[start + i] * window[i], 0.0);
        }
        fft.process(&mut buf);
        frames.push(buf[..N_BINS].to_vec());
    }
    frames
}

fn wrap_phase(phase: f32) -> f32 {
    phase - 2.0 * PI * ((phase + PI) / (2.0 * PI)).floor()
}

/// Resample the frame sequence at steps of `rate`, interpolating magnitudes
/// and accumulating phase so partials stay coherent across frames.
fn phase_vocoder(frames: &[Vec<Complex<f32>>], rate: f32) -> Vec<Vec<Complex<f32>>> {
    let n_frames = frames.len();
    let advance: Vec<f32> = (0..N_BINS)
        .map(|k| 2.0 * PI * k as f32 * HOP_LENGTH as f32 / N_FFT as f32)
        .collect();
    let silent = vec![Complex::new(0.0f32, 0.0); N_BINS];

    let mut phase_acc: Vec<f32> = frames[0].iter().map(|c| c.arg()).collect();
    let mut out = Vec::new();
    let mut step = 0usize;

    loop {
        let t = step as f64 * rate as f64;
        if t >= n_frames as f64 {
            break;
        }
        let idx = t.floor() as usize;
        let alpha = (t - idx as f64) as f32;
        let left = &frames[idx];
        let right = frames.get(idx + 1).unwrap_or(&silent);

        let mut column = Vec::with_capacity(N_BINS);
        for k in 0..N_BINS {
            let mag = (1.0 - alpha) * left[k].norm() + alpha * right[k].norm();
            column.push(Complex::from_polar(mag, phase_acc[k]));

            let delta = wrap_phase(right[k].arg() - left[k].arg() - advance[k]);
            phase_acc[k] = wrap_phase(phase_acc[k] + advance[k] + delta);
        }
        out.push(column);
        step += 1;
    }
    out
}

fn istft(
    frames: &[Vec<Complex<f32>>],
    window: &[f32],
    out_len: usize,
    planner: &mut FftPlanner<f32>,
) -> Vec<f32> {
    let pad = N_FFT / 2;
    let total = N_FFT + HOP_LENGTH * frames.len().saturating_sub(1);
    let mut signal = vec![0.0f32; total.max(out_len + pad)];
    let mut norm = vec![0.0f32; signal.len()];

    let ifft = planner.plan_fft_inverse(N_FFT);
    let mut buf = vec![Complex::new(0.0f32, 0.0); N_FFT];
    let scale = 1.0 / N_FFT as f32;

    for (f, column) in frames.iter().enumerate() {
        // Rebuild the full Hermitian spectrum from the positive bins.
        buf[..N_BINS].copy_from_slice(column);
        for k in 1..N_FFT - N_BINS + 1 {
            buf[N_FFT - k] = column[k].conj();
        }
        ifft.process(&mut buf);

        let start = f * HOP_LENGTH;
        for i in 0..N_FFT {
            signal[start + i] += buf[i].re * scale * window[i];
            norm[start + i] += window[i] * window[i];
        }
    }

    for (s, n) in signal.iter_mut().zip(&norm) {
        if *n > 1e-8 {
            *s /= n;
        }
    }

    let mut out: Vec<f32> = signal.into_iter().skip(pad).take(out_len).collect();
    out.resize(out_len, 0.0);
    out
}

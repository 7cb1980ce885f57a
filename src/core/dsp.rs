use ndarray::{Array2, Array3, Axis};
use num_complex::Complex32;
use once_cell::sync::Lazy;
use rustfft::{num_traits::Zero, FftPlanner};
use std::sync::Mutex;

use crate::{
    error::{DatasetError, Result},
    types::Waveform,
};

/// Shared planner so repeated transforms of the same size reuse their plans.
static PLANNER: Lazy<Mutex<FftPlanner<f32>>> = Lazy::new(|| Mutex::new(FftPlanner::new()));

/// Short-time transform backend.
pub trait SpectralTransform: Send + Sync {
    /// Returns a `(n_fft / 2 + 1, frames)` complex spectrum of `signal`.
    fn transform(&self, signal: &[f32], n_fft: usize, hop: usize) -> Result<Array2<Complex32>>;
}

/// Centered STFT with a periodic Hann window and reflect padding.
/// Only even FFT sizes are supported.
#[derive(Clone, Copy, Debug, Default)]
pub struct StftTransform;

impl SpectralTransform for StftTransform {
    fn transform(&self, signal: &[f32], n_fft: usize, hop: usize) -> Result<Array2<Complex32>> {
        if n_fft < 2 || n_fft % 2 != 0 || hop == 0 {
            return Err(DatasetError::invalid(format!(
                "bad transform size n_fft={n_fft} hop={hop}"
            )));
        }

        let pad = n_fft / 2;
        let padded = pad_center(signal, pad);
        let frames = 1 + signal.len() / hop;
        let bins = n_fft / 2 + 1;

        let fft = lock_planner()?.plan_fft_forward(n_fft);
        let window = compute_hann(n_fft);

        let mut out = Array2::<Complex32>::zeros((bins, frames));
        let mut buf = vec![Complex32::zero(); n_fft];

        for fr in 0..frames {
            let start = fr * hop;
            let chunk = &padded[start..start + n_fft];
            for i in 0..n_fft {
                buf[i] = Complex32::new(chunk[i] * window[i], 0.0);
            }
            fft.process(&mut buf);
            for fi in 0..bins {
                out[(fi, fr)] = buf[fi];
            }
        }
        Ok(out)
    }
}

fn lock_planner() -> Result<std::sync::MutexGuard<'static, FftPlanner<f32>>> {
    PLANNER
        .lock()
        .map_err(|_| anyhow::anyhow!("fft planner poisoned").into())
}

/// Periodic Hann window.
fn compute_hann(n_fft: usize) -> Vec<f32> {
    if n_fft <= 1 {
        return vec![1.0];
    }
    let denom = n_fft as f32;
    (0..n_fft)
        .map(|i| 0.5 - 0.5 * (2.0 * std::f32::consts::PI * (i as f32) / denom).cos())
        .collect()
}

/// Pads `pad` samples on both sides, mirrored about the edge samples.
/// Signals too short to mirror are zero padded instead.
fn pad_center(signal: &[f32], pad: usize) -> Vec<f32> {
    let t = signal.len();
    let mut out = vec![0.0f32; pad + t + pad];
    out[pad..pad + t].copy_from_slice(signal);
    if t > pad {
        for i in 0..pad {
            out[pad - 1 - i] = signal[i + 1];
            out[pad + t + i] = signal[t - 2 - i];
        }
    }
    out
}

/// FFT size implied by a hop length: `2 * (hop - 1)`, giving `hop` bins.
pub fn n_fft_for_hop(hop_length: usize) -> Result<usize> {
    if hop_length < 2 {
        return Err(DatasetError::invalid(format!(
            "hop length must be at least 2, got {hop_length}"
        )));
    }
    Ok(2 * (hop_length - 1))
}

/// Complex spectrogram of both channels, shaped `(2, hop, frames)`.
pub fn calc_spec<T: SpectralTransform + ?Sized>(
    wave: &Waveform,
    hop_length: usize,
    transform: &T,
) -> Result<Array3<Complex32>> {
    let n_fft = n_fft_for_hop(hop_length)?;
    let left = transform.transform(wave.left(), n_fft, hop_length)?;
    let right = transform.transform(wave.right(), n_fft, hop_length)?;
    if left.dim() != right.dim() {
        return Err(DatasetError::invalid("channel spectra differ in shape"));
    }
    let spec = ndarray::stack(Axis(0), &[left.view(), right.view()])?;
    Ok(spec)
}

pub fn magnitude(spec: &Array3<Complex32>) -> Array3<f32> {
    spec.mapv(|c| c.norm())
}

/// Unit-modulus phase factors. Silent bins get a phase of 1.
pub fn phase(spec: &Array3<Complex32>) -> Array3<Complex32> {
    spec.mapv(|c| {
        let m = c.norm();
        if m > 0.0 {
            c / m
        } else {
            Complex32::new(1.0, 0.0)
        }
    })
}

/// Rebuilds a stereo waveform from `magnitude * phase`.
pub fn spec_to_wav(
    mag: &Array3<f32>,
    phase: &Array3<Complex32>,
    hop_length: usize,
    sample_rate: u32,
) -> Result<Waveform> {
    if mag.dim() != phase.dim() {
        return Err(DatasetError::invalid(format!(
            "magnitude {:?} and phase {:?} differ in shape",
            mag.dim(),
            phase.dim()
        )));
    }
    if mag.len_of(Axis(0)) != 2 {
        return Err(DatasetError::invalid("expected a two-channel spectrogram"));
    }
    let n_fft = n_fft_for_hop(hop_length)?;

    let mut channels = Vec::with_capacity(2);
    for ch in 0..2 {
        let spec = &mag.index_axis(Axis(0), ch).mapv(|m| Complex32::new(m, 0.0))
            * &phase.index_axis(Axis(0), ch);
        channels.push(istft(&spec, n_fft, hop_length)?);
    }
    let right = channels.pop().unwrap_or_default();
    let left = channels.pop().unwrap_or_default();
    Waveform::new(left, right, sample_rate)
}

/// Windowed overlap-add inverse of [`StftTransform`].
/// Output length is `hop * (frames - 1)`.
fn istft(spec: &Array2<Complex32>, n_fft: usize, hop: usize) -> Result<Vec<f32>> {
    let (bins, frames) = spec.dim();
    if bins != n_fft / 2 + 1 {
        return Err(DatasetError::invalid(format!(
            "spectrum has {bins} bins, expected {}",
            n_fft / 2 + 1
        )));
    }
    if frames == 0 {
        return Ok(Vec::new());
    }

    let ifft = lock_planner()?.plan_fft_inverse(n_fft);
    let window = compute_hann(n_fft);

    let padded_length = n_fft + hop * (frames - 1);
    let mut out = vec![0.0f32; padded_length];
    let mut window_sum = vec![0.0f32; padded_length];
    let mut buf = vec![Complex32::zero(); n_fft];
    let scale = 1.0 / n_fft as f32;

    for fr in 0..frames {
        buf.fill(Complex32::zero());
        for fi in 0..bins {
            buf[fi] = spec[(fi, fr)];
        }
        // Negative frequencies mirror the positive ones.
        for fi in 1..bins {
            let neg = n_fft - fi;
            if neg >= bins {
                buf[neg] = buf[fi].conj();
            }
        }
        buf[0].im = 0.0;
        buf[n_fft / 2].im = 0.0;

        ifft.process(&mut buf);

        let start = fr * hop;
        for i in 0..n_fft {
            let w = window[i];
            out[start + i] += buf[i].re * w * scale;
            window_sum[start + i] += w * w;
        }
    }

    for (v, &sum) in out.iter_mut().zip(&window_sum) {
        if sum > 1e-10 {
            *v /= sum;
        }
    }

    let pad = n_fft / 2;
    let len = hop * (frames - 1);
    Ok(out[pad..pad + len].to_vec())
}

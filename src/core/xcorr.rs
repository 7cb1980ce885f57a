//! Head/tail offset estimation by cross-correlation.
//!
//! `full_correlation(a, v)` follows the numpy `correlate(a, v, "full")`
//! convention: entry `k + (v.len() - 1)` holds `sum_n a[n + k] * v[n]`.

use std::sync::Mutex;

use num_complex::Complex64;
use once_cell::sync::Lazy;
use rustfft::{num_traits::Zero, FftPlanner};
use tracing::debug;

use crate::{
    error::{DatasetError, Result},
    types::{CorrelationMethod, Waveform},
};

static PLANNER: Lazy<Mutex<FftPlanner<f64>>> = Lazy::new(|| Mutex::new(FftPlanner::new()));

/// Signed sample shifts of `b` relative to `a` at the head and the tail.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Offsets {
    pub delay_front: i64,
    pub delay_back: i64,
}

impl Offsets {
    /// Head/tail disagreement, non-zero when the two signals run at
    /// different speeds.
    pub fn drift(&self) -> i64 {
        self.delay_back - self.delay_front
    }
}

pub fn estimate_offset(
    a: &Waveform,
    b: &Waveform,
    sample_rate: u32,
    clip_duration_secs: usize,
    offset_secs: usize,
) -> Result<Offsets> {
    estimate_offset_with(
        a,
        b,
        sample_rate,
        clip_duration_secs,
        offset_secs,
        CorrelationMethod::Fft,
    )
}

pub fn estimate_offset_with(
    a: &Waveform,
    b: &Waveform,
    sample_rate: u32,
    clip_duration_secs: usize,
    offset_secs: usize,
    method: CorrelationMethod,
) -> Result<Offsets> {
    let sr = sample_rate as usize;
    let win = sr * clip_duration_secs;
    let skip = sr * offset_secs;
    let needed = win + skip;

    if win == 0 {
        return Err(DatasetError::invalid("correlation window is empty"));
    }
    let shorter = a.len().min(b.len());
    if shorter < needed {
        return Err(DatasetError::invalid(format!(
            "input of {shorter} samples is shorter than the {needed} samples \
             needed for a {clip_duration_secs}s window at {offset_secs}s offset"
        )));
    }

    let a_front = centered_mono(a, skip..skip + win, false);
    let b_front = centered_mono(b, skip..skip + win, false);

    let back_end = shorter - skip;
    let a_back = centered_mono(a, back_end - win..back_end, true);
    let b_back = centered_mono(b, back_end - win..back_end, true);

    let lag0 = (win - 1) as i64;
    let front_peak = argmax(&correlate(&a_front, &b_front, method)?) as i64;
    let back_peak = argmax(&correlate(&a_back, &b_back, method)?) as i64;

    let offsets = Offsets {
        delay_front: front_peak - lag0,
        // The tail windows are time-reversed, which mirrors the lag axis.
        delay_back: lag0 - back_peak,
    };
    debug!(
        delay_front = offsets.delay_front,
        delay_back = offsets.delay_back,
        window = win,
        "estimated offsets"
    );
    Ok(offsets)
}

/// Channel sum over `range` with the mean removed, optionally reversed.
fn centered_mono(w: &Waveform, range: std::ops::Range<usize>, reverse: bool) -> Vec<f64> {
    let mut mono: Vec<f64> = w.left()[range.clone()]
        .iter()
        .zip(&w.right()[range])
        .map(|(l, r)| *l as f64 + *r as f64)
        .collect();
    if reverse {
        mono.reverse();
    }
    let mean = mono.iter().sum::<f64>() / mono.len().max(1) as f64;
    for v in &mut mono {
        *v -= mean;
    }
    mono
}

fn correlate(a: &[f64], v: &[f64], method: CorrelationMethod) -> Result<Vec<f64>> {
    match method {
        CorrelationMethod::Direct => Ok(full_correlation_direct(a, v)),
        CorrelationMethod::Fft => full_correlation(a, v),
    }
}

/// First index of the largest value.
pub fn argmax(values: &[f64]) -> usize {
    let mut best = 0usize;
    for (i, &x) in values.iter().enumerate() {
        if x > values[best] {
            best = i;
        }
    }
    best
}

/// Full cross-correlation in O(len(a) * len(v)).
pub fn full_correlation_direct(a: &[f64], v: &[f64]) -> Vec<f64> {
    if a.is_empty() || v.is_empty() {
        return Vec::new();
    }
    let (na, nv) = (a.len() as i64, v.len() as i64);
    let mut out = Vec::with_capacity((na + nv - 1) as usize);
    for k in -(nv - 1)..na {
        let n_lo = 0i64.max(-k);
        let n_hi = nv.min(na - k);
        let mut acc = 0.0f64;
        for n in n_lo..n_hi {
            acc += a[(n + k) as usize] * v[n as usize];
        }
        out.push(acc);
    }
    out
}

/// Full cross-correlation through a zero-padded FFT product.
pub fn full_correlation(a: &[f64], v: &[f64]) -> Result<Vec<f64>> {
    if a.is_empty() || v.is_empty() {
        return Ok(Vec::new());
    }
    let (na, nv) = (a.len(), v.len());
    let out_len = na + nv - 1;
    let size = out_len.next_power_of_two();

    let (forward, inverse) = {
        let mut planner = PLANNER
            .lock()
            .map_err(|_| anyhow::anyhow!("fft planner poisoned"))?;
        (planner.plan_fft_forward(size), planner.plan_fft_inverse(size))
    };

    let mut fa = vec![Complex64::zero(); size];
    let mut fv = vec![Complex64::zero(); size];
    for (dst, &x) in fa.iter_mut().zip(a) {
        dst.re = x;
    }
    for (dst, &x) in fv.iter_mut().zip(v) {
        dst.re = x;
    }
    forward.process(&mut fa);
    forward.process(&mut fv);

    for (x, y) in fa.iter_mut().zip(&fv) {
        *x *= y.conj();
    }
    inverse.process(&mut fa);

    // Circular lag k lives at index k for k >= 0 and size + k for k < 0.
    let scale = 1.0 / size as f64;
    let mut out = Vec::with_capacity(out_len);
    for k in -(nv as i64 - 1)..na as i64 {
        let idx = (if k < 0 { size as i64 + k } else { k }) as usize;
        out.push(fa[idx].re * scale);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn direct_matches_numpy_convention() {
        // numpy.correlate([1, 2, 3], [0, 1, 0.5], "full") == [0.5, 2, 3.5, 3, 0]
        let out = full_correlation_direct(&[1.0, 2.0, 3.0], &[0.0, 1.0, 0.5]);
        assert_eq!(out, vec![0.5, 2.0, 3.5, 3.0, 0.0]);
    }

    #[test]
    fn fft_matches_direct() {
        let a: Vec<f64> = (0..37).map(|i| ((i * 13) % 7) as f64 - 3.0).collect();
        let v: Vec<f64> = (0..21).map(|i| ((i * 5) % 11) as f64 - 5.0).collect();
        let d = full_correlation_direct(&a, &v);
        let f = full_correlation(&a, &v).unwrap();
        assert_eq!(d.len(), f.len());
        for (x, y) in d.iter().zip(&f) {
            assert_abs_diff_eq!(*x, *y, epsilon = 1e-8);
        }
    }

    #[test]
    fn repeated_sizes_reuse_the_shared_planner() {
        let a: Vec<f64> = (0..300).map(|i| (i as f64 * 0.37).sin()).collect();
        let first = full_correlation(&a, &a).unwrap();
        let second = full_correlation(&a, &a).unwrap();
        assert_eq!(first, second);
        assert_eq!(argmax(&first), a.len() - 1);
    }

    #[test]
    fn argmax_prefers_first_tie() {
        assert_eq!(argmax(&[1.0, 3.0, 3.0, 2.0]), 1);
    }
}

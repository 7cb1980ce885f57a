//! Suppression of near-silent stretches in a training mask.

use ndarray::{s, Array3, Axis};

use crate::{
    error::{DatasetError, Result},
    types::MaskOptions,
};

/// Marks long low-energy runs of `reference` as fully uninformative in `mask`.
///
/// Runs of frames whose mean energy is below `threshold` and that are longer
/// than `min_range` frames get a linear 0 -> 1 fade in, a flat interior of 1
/// and a 1 -> 0 fade out. Fades are added to the existing mask and clipped, so
/// mask values never decrease. Runs starting less than `fade_area` frames
/// after the previous one are merged with it.
pub fn refine(mut mask: Array3<f32>, reference: &Array3<f32>, opts: &MaskOptions) -> Result<Array3<f32>> {
    let MaskOptions {
        threshold,
        min_range,
        fade_area,
    } = *opts;

    if min_range < fade_area * 2 {
        return Err(DatasetError::invalid(format!(
            "min_range ({min_range}) must be >= 2 * fade_area ({fade_area})"
        )));
    }
    let frames = mask.len_of(Axis(2));
    if reference.len_of(Axis(2)) != frames {
        return Err(DatasetError::invalid(format!(
            "mask has {frames} frames but reference has {}",
            reference.len_of(Axis(2))
        )));
    }

    let energy = frame_energy(reference);
    let runs: Vec<(usize, usize)> = quiet_runs(&energy, threshold)
        .into_iter()
        .filter(|(s, e)| e - s > min_range)
        .collect();

    let fade_in = ramp(fade_area, false);
    let fade_out = ramp(fade_area, true);

    let mut prev_end: Option<usize> = None;
    for (start, end) in runs {
        let mut start = start;
        match prev_end {
            Some(prev) if start - prev < fade_area => {
                start = prev.saturating_sub(fade_area * 2);
            }
            _ if start != 0 => add_ramp(&mut mask, start, &fade_in),
            _ => {}
        }
        if end != frames {
            add_ramp(&mut mask, end.saturating_sub(fade_area), &fade_out);
        }

        let lo = start + fade_area;
        let hi = end.saturating_sub(fade_area);
        if lo < hi {
            mask.slice_mut(s![.., .., lo..hi]).fill(1.0);
        }
        prev_end = Some(end);
    }

    Ok(mask)
}

/// Convenience wrapper with the default threshold and fade settings.
pub fn mask_uninformative(mask: Array3<f32>, reference: &Array3<f32>) -> Result<Array3<f32>> {
    refine(mask, reference, &MaskOptions::default())
}

/// Mean over channel and frequency for every frame.
fn frame_energy(reference: &Array3<f32>) -> Vec<f32> {
    let (c, f, t) = reference.dim();
    let count = (c * f).max(1) as f32;
    (0..t)
        .map(|i| reference.slice(s![.., .., i]).sum() / count)
        .collect()
}

/// Maximal half-open runs `[start, end)` of values below `threshold`.
fn quiet_runs(energy: &[f32], threshold: f32) -> Vec<(usize, usize)> {
    let mut runs = Vec::new();
    let mut start: Option<usize> = None;
    for (i, &e) in energy.iter().enumerate() {
        match (e < threshold, start) {
            (true, None) => start = Some(i),
            (false, Some(s)) => {
                runs.push((s, i));
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        runs.push((s, energy.len()));
    }
    runs
}

/// `len` evenly spaced values from 0 to 1 (or 1 to 0).
fn ramp(len: usize, descending: bool) -> Vec<f32> {
    (0..len)
        .map(|i| {
            let v = if len > 1 {
                i as f32 / (len - 1) as f32
            } else {
                0.0
            };
            if descending {
                1.0 - v
            } else {
                v
            }
        })
        .collect()
}

/// Adds `ramp` along the frame axis starting at `at`, clipped to [0, 1].
fn add_ramp(mask: &mut Array3<f32>, at: usize, ramp: &[f32]) {
    let frames = mask.len_of(Axis(2));
    for (i, &r) in ramp.iter().enumerate() {
        let t = at + i;
        if t >= frames {
            break;
        }
        mask.slice_mut(s![.., .., t])
            .mapv_inplace(|v| (v + r).clamp(0.0, 1.0));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runs_are_half_open_and_maximal() {
        let e = [1.0, 0.1, 0.1, 1.0, 0.0, 0.0];
        assert_eq!(quiet_runs(&e, 0.3), vec![(1, 3), (4, 6)]);
    }

    #[test]
    fn ramps_match_linspace() {
        assert_eq!(ramp(3, false), vec![0.0, 0.5, 1.0]);
        assert_eq!(ramp(3, true), vec![1.0, 0.5, 0.0]);
        assert_eq!(ramp(1, false), vec![0.0]);
    }
}

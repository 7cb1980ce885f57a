use crate::{
    core::interp::{CubicSpline, Interpolator, MIN_CUBIC_POINTS},
    error::{DatasetError, Result},
    types::Waveform,
};

/// Re-samples the same time span onto `desired` evenly spaced points.
///
/// This is a speed change: the first and last samples stay anchored and the
/// signal in between is squeezed or stretched by cubic interpolation.
pub fn resample(waveform: &Waveform, desired: usize) -> Result<Waveform> {
    resample_with(&CubicSpline, waveform, desired)
}

/// [`resample`] with a caller-chosen interpolation backend.
pub fn resample_with<I: Interpolator + ?Sized>(
    interp: &I,
    waveform: &Waveform,
    desired: usize,
) -> Result<Waveform> {
    let n = waveform.len();
    if n < MIN_CUBIC_POINTS {
        return Err(DatasetError::invalid(format!(
            "cannot resample {n} samples, need at least {MIN_CUBIC_POINTS}"
        )));
    }
    if desired < MIN_CUBIC_POINTS {
        return Err(DatasetError::invalid(format!(
            "resample target {desired} is below {MIN_CUBIC_POINTS} samples"
        )));
    }

    let left = interp.resample_uniform(waveform.left(), desired)?;
    let right = interp.resample_uniform(waveform.right(), desired)?;
    Waveform::new(left, right, waveform.sample_rate())
}

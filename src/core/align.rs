//! Head/tail alignment with iterative drift correction.

use std::sync::Arc;

use tracing::debug;

use crate::{
    core::{
        resample::resample,
        xcorr::{estimate_offset_with, Offsets},
    },
    error::{DatasetError, Result},
    io::progress::{AlignProgress, ProgressObserver, TracingObserver},
    types::{AlignOptions, Waveform},
};

/// Brings two recordings of the same performance into sample correspondence.
pub struct Aligner {
    opts: AlignOptions,
    observer: Arc<dyn ProgressObserver>,
}

impl Default for Aligner {
    fn default() -> Self {
        Self::new(AlignOptions::default())
    }
}

impl Aligner {
    pub fn new(opts: AlignOptions) -> Self {
        Self {
            opts,
            observer: Arc::new(TracingObserver),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Aligns `b` to `a` and returns both trimmed to the same length.
    ///
    /// Both inputs are upsampled, offsets are measured at the head and tail,
    /// the leading excess is cut and the faster signal is re-timed so the
    /// tails line up, then everything is downsampled again.
    pub fn align(&self, a: &Waveform, b: &Waveform, sample_rate: u32) -> Result<(Waveform, Waveform)> {
        let factor = self.opts.upsample_factor;
        if factor == 0 {
            return Err(DatasetError::invalid("upsample factor must be at least 1"));
        }

        self.emit(AlignProgress::Upsampling { factor });
        let mut a = resample(a, a.len() * factor)?;
        let mut b = resample(b, b.len() * factor)?;

        let (offsets, delta) = self.converge(&a, &b, sample_rate)?;

        if offsets.delay_front > 0 {
            a = a.skip(offsets.delay_front as usize);
        } else {
            b = b.skip(offsets.delay_front.unsigned_abs() as usize);
        }

        self.emit(AlignProgress::Correcting { delta });
        if delta.abs() > 1 {
            if delta > 0 {
                a = resample(&a, shrink(a.len(), delta)?)?;
            } else {
                b = resample(&b, shrink(b.len(), -delta)?)?;
            }
        }

        let len = a.len().min(b.len());
        let a = a.truncate(len);
        let b = b.truncate(len);

        self.emit(AlignProgress::Downsampling { factor });
        let a = resample(&a, len / factor)?.with_sample_rate(sample_rate);
        let b = resample(&b, len / factor)?.with_sample_rate(sample_rate);
        debug!(samples = a.len(), delta, "pair aligned");
        Ok((a, b))
    }

    /// Widens the analysis windows until head and tail offsets agree.
    fn converge(&self, a: &Waveform, b: &Waveform, sample_rate: u32) -> Result<(Offsets, i64)> {
        let mut clip = self.opts.clip_duration_secs;
        let mut offset = self.opts.offset_secs;
        let mut widenings = 0usize;

        loop {
            let needed = sample_rate as usize * (clip + offset);
            if a.len().min(b.len()) < needed {
                return Err(DatasetError::invalid(format!(
                    "inputs of {} and {} upsampled samples are too short for a {clip}s window at {offset}s offset",
                    a.len(),
                    b.len()
                )));
            }

            let offsets =
                estimate_offset_with(a, b, sample_rate, clip, offset, self.opts.correlation)?;
            let delta = offsets.drift();
            self.emit(AlignProgress::Offsets {
                iteration: widenings,
                clip_duration_secs: clip,
                offset_secs: offset,
                delay_front: offsets.delay_front,
                delay_back: offsets.delay_back,
            });

            if delta <= self.opts.drift_tolerance {
                return Ok((offsets, delta));
            }
            if widenings >= self.opts.max_iterations {
                return Err(DatasetError::AlignmentDidNotConverge {
                    iterations: widenings,
                    delta,
                });
            }

            widenings += 1;
            clip += 1;
            offset += 1;
            self.emit(AlignProgress::Widening {
                clip_duration_secs: clip,
                offset_secs: offset,
            });
        }
    }

    fn emit(&self, event: AlignProgress) {
        self.observer.on_progress(&event);
    }
}

/// Shorthand for `Aligner::default().align(a, b, sample_rate)`.
pub fn align(a: &Waveform, b: &Waveform, sample_rate: u32) -> Result<(Waveform, Waveform)> {
    Aligner::default().align(a, b, sample_rate)
}

fn shrink(len: usize, by: i64) -> Result<usize> {
    len.checked_sub(by as usize)
        .filter(|&n| n > 0)
        .ok_or_else(|| DatasetError::invalid(format!("cannot shorten {len} samples by {by}")))
}

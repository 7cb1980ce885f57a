use serde::{Deserialize, Serialize};
use std::{fs, ops::Range, path::Path};

use crate::error::{DatasetError, Result};

/// Interleaved samples as they come out of the decoder.
#[derive(Clone, Debug)]
pub struct AudioData {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

/// Planar stereo signal. Both channels always hold the same number of samples.
#[derive(Clone, Debug, PartialEq)]
pub struct Waveform {
    left: Vec<f32>,
    right: Vec<f32>,
    sample_rate: u32,
}

impl Waveform {
    pub fn new(left: Vec<f32>, right: Vec<f32>, sample_rate: u32) -> Result<Self> {
        if left.len() != right.len() {
            return Err(DatasetError::invalid(format!(
                "channel length mismatch: left={} right={}",
                left.len(),
                right.len()
            )));
        }
        Ok(Self {
            left,
            right,
            sample_rate,
        })
    }

    /// Same signal on both channels.
    pub fn from_mono(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            right: samples.clone(),
            left: samples,
            sample_rate,
        }
    }

    /// Splits interleaved frames. Mono is duplicated, channels past the
    /// second are dropped.
    pub fn from_interleaved(samples: &[f32], channels: u16, sample_rate: u32) -> Result<Self> {
        match channels {
            0 => Err(DatasetError::invalid("audio has no channels")),
            1 => Ok(Self::from_mono(samples.to_vec(), sample_rate)),
            n => {
                let n = n as usize;
                let frames = samples.len() / n;
                let mut left = Vec::with_capacity(frames);
                let mut right = Vec::with_capacity(frames);
                for frame in samples.chunks_exact(n) {
                    left.push(frame[0]);
                    right.push(frame[1]);
                }
                Ok(Self {
                    left,
                    right,
                    sample_rate,
                })
            }
        }
    }

    pub fn to_interleaved(&self) -> Vec<f32> {
        let mut out = Vec::with_capacity(self.len() * 2);
        for (l, r) in self.left.iter().zip(&self.right) {
            out.push(*l);
            out.push(*r);
        }
        out
    }

    pub fn left(&self) -> &[f32] {
        &self.left
    }

    pub fn right(&self) -> &[f32] {
        &self.right
    }

    pub fn channels(&self) -> [&[f32]; 2] {
        [self.left.as_slice(), self.right.as_slice()]
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.left.len()
    }

    pub fn is_empty(&self) -> bool {
        self.left.is_empty()
    }

    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    /// Copies `range` out of both channels. The range is clamped to the signal.
    pub fn slice(&self, range: Range<usize>) -> Self {
        let end = range.end.min(self.len());
        let start = range.start.min(end);
        Self {
            left: self.left[start..end].to_vec(),
            right: self.right[start..end].to_vec(),
            sample_rate: self.sample_rate,
        }
    }

    pub fn skip(&self, n: usize) -> Self {
        self.slice(n..self.len())
    }

    pub fn truncate(&self, len: usize) -> Self {
        self.slice(0..len)
    }

    /// Sample-wise `self - other` over the common length.
    pub fn difference(&self, other: &Waveform) -> Self {
        let sub = |a: &[f32], b: &[f32]| -> Vec<f32> {
            a.iter().zip(b).map(|(x, y)| x - y).collect()
        };
        Self {
            left: sub(&self.left, &other.left),
            right: sub(&self.right, &other.right),
            sample_rate: self.sample_rate,
        }
    }
}

/// Correlation backend used by the offset estimator.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CorrelationMethod {
    /// Quadratic sum over all lags.
    Direct,
    #[default]
    Fft,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AlignOptions {
    pub upsample_factor: usize,
    pub clip_duration_secs: usize,
    pub offset_secs: usize,
    /// Drift (in upsampled samples) above which the analysis windows are widened.
    pub drift_tolerance: i64,
    pub max_iterations: usize,
    pub correlation: CorrelationMethod,
}

impl Default for AlignOptions {
    fn default() -> Self {
        Self {
            upsample_factor: 8,
            clip_duration_secs: 8,
            offset_secs: 0,
            drift_tolerance: 999,
            max_iterations: 16,
            correlation: CorrelationMethod::Fft,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct MaskOptions {
    pub threshold: f32,
    pub min_range: usize,
    pub fade_area: usize,
}

impl Default for MaskOptions {
    fn default() -> Self {
        Self {
            threshold: 0.3,
            min_range: 64,
            fade_area: 32,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    pub sample_rate: u32,
    pub hop_length: usize,
    pub top_db: f32,
    /// Pairs aligned at once. 1 runs them one after another, 0 uses every
    /// core. Each pair holds several upsampled copies of its audio.
    pub jobs: usize,
    pub align: AlignOptions,
    pub mask: MaskOptions,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            hop_length: 1024,
            top_db: 60.0,
            jobs: 1,
            align: AlignOptions::default(),
            mask: MaskOptions::default(),
        }
    }
}

impl DatasetConfig {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = fs::read_to_string(path.as_ref())?;
        Ok(serde_json::from_str(&raw)?)
    }
}

#[derive(Clone, Debug)]
pub struct PairOutput {
    pub instrument_path: String,
    pub mix_path: String,
    pub vocal_path: String,
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub written: Vec<PairOutput>,
    /// File name and error message of every pair that failed.
    pub failed: Vec<(String, String)>,
}

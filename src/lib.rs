//! # vocal-dataset-core
//!
//! Prepares paired mix / instrumental recordings for vocal separation
//! training: cubic resampling, cross-correlation alignment with drift
//! correction, cached magnitude spectrograms and confidence masking.

pub mod cache;
pub mod core;
pub mod error;
pub mod io;
pub mod paths;
pub mod pipeline;
pub mod types;

pub use crate::{
    cache::{cache_path, SpectrogramCache},
    core::{
        align::{align, Aligner},
        audio::{load_waveform, read_audio, trim_silence, write_waveform, AudioLoader, DecodingLoader},
        dsp::{calc_spec, magnitude, phase, spec_to_wav, SpectralTransform, StftTransform},
        interp::{CubicSpline, Interpolator},
        mask::{mask_uninformative, refine},
        resample::{resample, resample_with},
        xcorr::{estimate_offset, Offsets},
    },
    error::{DatasetError, Result},
    io::progress::{AlignProgress, NoopObserver, ProgressObserver, TracingObserver},
    pipeline::{generate_dataset, DatasetBuilder},
    types::{
        AlignOptions, AudioData, BatchReport, CorrelationMethod, DatasetConfig, MaskOptions,
        PairOutput, Waveform,
    },
};

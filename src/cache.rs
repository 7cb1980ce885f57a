//! On-disk cache of aligned magnitude spectrograms.
//!
//! Each source file gets a `.npy` companion next to it. A pair is only
//! served from disk when both companions exist.

use std::{
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
    sync::Arc,
};

use ndarray::{Array3, Axis};
use ndarray_npy::{ReadNpyExt, WriteNpyExt};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::{
    core::{
        align::Aligner,
        audio::{trim_silence, AudioLoader, DecodingLoader},
        dsp::{calc_spec, magnitude, n_fft_for_hop, SpectralTransform, StftTransform},
    },
    error::{DatasetError, Result},
    types::AlignOptions,
};

pub const CACHE_EXTENSION: &str = "npy";

/// Cache location for `source`: the same path with its extension replaced.
pub fn cache_path<P: AsRef<Path>>(source: P) -> PathBuf {
    source.as_ref().with_extension(CACHE_EXTENSION)
}

pub struct SpectrogramCache {
    loader: Arc<dyn AudioLoader>,
    transform: Arc<dyn SpectralTransform>,
    aligner: Aligner,
    top_db: f32,
}

impl Default for SpectrogramCache {
    fn default() -> Self {
        Self::new(
            Arc::new(DecodingLoader),
            Arc::new(StftTransform),
            Aligner::new(AlignOptions::default()),
        )
    }
}

impl SpectrogramCache {
    pub fn new(
        loader: Arc<dyn AudioLoader>,
        transform: Arc<dyn SpectralTransform>,
        aligner: Aligner,
    ) -> Self {
        Self {
            loader,
            transform,
            aligner,
            top_db: 60.0,
        }
    }

    pub fn with_top_db(mut self, top_db: f32) -> Self {
        self.top_db = top_db;
        self
    }

    /// Magnitude spectrograms `(mix, instrument)` of the aligned pair, shaped
    /// `(2, hop_length, frames)`.
    ///
    /// Served from the `.npy` companions when both exist, computed and
    /// written otherwise.
    pub fn get_or_compute<P: AsRef<Path>>(
        &self,
        mix_path: P,
        inst_path: P,
        sample_rate: u32,
        hop_length: usize,
    ) -> Result<(Array3<f32>, Array3<f32>)> {
        n_fft_for_hop(hop_length)?;
        let (mix_path, inst_path) = (mix_path.as_ref(), inst_path.as_ref());
        let mix_cache = cache_path(mix_path);
        let inst_cache = cache_path(inst_path);

        if mix_cache.exists() && inst_cache.exists() {
            debug!(mix = %mix_cache.display(), "spectrogram cache hit");
            let x = read_entry(&mix_cache, hop_length)?;
            let y = read_entry(&inst_cache, hop_length)?;
            return Ok((x, y));
        }

        info!(mix = %mix_path.display(), inst = %inst_path.display(), "computing spectrograms");
        let mix = trim_silence(&self.loader.load(mix_path, sample_rate)?, self.top_db);
        let inst = trim_silence(&self.loader.load(inst_path, sample_rate)?, self.top_db);
        let (mix, inst) = self.aligner.align(&mix, &inst, sample_rate)?;

        let x = magnitude(&calc_spec(&mix, hop_length, self.transform.as_ref())?);
        let y = magnitude(&calc_spec(&inst, hop_length, self.transform.as_ref())?);

        write_entry(&mix_cache, &x)?;
        write_entry(&inst_cache, &y)?;
        Ok((x, y))
    }
}

fn read_entry(path: &Path, hop_length: usize) -> Result<Array3<f32>> {
    let corrupt = |reason: String| DatasetError::CacheCorrupt {
        path: path.display().to_string(),
        reason,
    };
    let file = File::open(path)?;
    let arr = Array3::<f32>::read_npy(file).map_err(|e| corrupt(e.to_string()))?;
    if arr.len_of(Axis(0)) != 2 || arr.len_of(Axis(1)) != hop_length {
        return Err(corrupt(format!(
            "shape {:?} does not match (2, {hop_length}, frames)",
            arr.shape()
        )));
    }
    Ok(arr)
}

/// Writes next to `path` and renames into place, so readers never observe a
/// half-written array.
fn write_entry(path: &Path, arr: &Array3<f32>) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let tmp = NamedTempFile::new_in(dir)?;
    {
        let mut writer = BufWriter::new(tmp.as_file());
        arr.write_npy(&mut writer)
            .map_err(|e| anyhow::anyhow!("writing {}: {e}", path.display()))?;
        writer.flush()?;
    }
    tmp.persist(path)?;
    Ok(())
}

//! Batch generation of aligned instrument / mix / vocal triples.

use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use rayon::prelude::*;
use tracing::{info, warn};

use crate::{
    core::{
        align::Aligner,
        audio::{trim_silence, write_waveform, AudioLoader, DecodingLoader},
    },
    error::Result,
    io::progress::ProgressObserver,
    paths::{list_audio_files, output_path, INSTRUMENT_DIR, MIX_DIR, VOCAL_DIR},
    types::{BatchReport, DatasetConfig, PairOutput},
};

pub struct DatasetBuilder {
    config: DatasetConfig,
    loader: Arc<dyn AudioLoader>,
    aligner: Aligner,
}

impl DatasetBuilder {
    pub fn new(config: DatasetConfig) -> Self {
        let aligner = Aligner::new(config.align.clone());
        Self {
            config,
            loader: Arc::new(DecodingLoader),
            aligner,
        }
    }

    pub fn with_loader(mut self, loader: Arc<dyn AudioLoader>) -> Self {
        self.loader = loader;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.aligner = self.aligner.with_observer(observer);
        self
    }

    /// Aligns every `<source>/mix/<name>` with `<source>/instrument/<name>` and
    /// writes the triples under `dest`. Failing pairs are reported, not fatal.
    pub fn run(&self, source: &Path, dest: &Path) -> Result<BatchReport> {
        let mixes = list_audio_files(&source.join(MIX_DIR))?;
        for kind in [INSTRUMENT_DIR, MIX_DIR, VOCAL_DIR] {
            fs::create_dir_all(dest.join(kind))?;
        }
        info!(pairs = mixes.len(), source = %source.display(), "generating dataset");

        let work = |mix: &PathBuf| {
            let name = mix
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let inst = source.join(INSTRUMENT_DIR).join(&name);
            info!(pair = %name, "processing");
            match self.process_pair(&inst, mix, dest) {
                Ok(out) => Ok(out),
                Err(e) => {
                    warn!(pair = %name, error = %e, "pair failed, skipping");
                    Err((name, e.to_string()))
                }
            }
        };

        let results: Vec<std::result::Result<PairOutput, (String, String)>> =
            match self.config.jobs {
                1 => mixes.iter().map(work).collect(),
                0 => mixes.par_iter().map(work).collect(),
                jobs => {
                    let pool = rayon::ThreadPoolBuilder::new()
                        .num_threads(jobs)
                        .build()
                        .map_err(|e| anyhow::anyhow!("thread pool: {e}"))?;
                    pool.install(|| mixes.par_iter().map(work).collect())
                }
            };

        let mut report = BatchReport::default();
        for r in results {
            match r {
                Ok(out) => report.written.push(out),
                Err(failed) => report.failed.push(failed),
            }
        }
        info!(
            written = report.written.len(),
            failed = report.failed.len(),
            "dataset generation finished"
        );
        Ok(report)
    }

    fn process_pair(&self, inst_path: &Path, mix_path: &Path, dest: &Path) -> Result<PairOutput> {
        let sr = self.config.sample_rate;
        let inst = trim_silence(&self.loader.load(inst_path, sr)?, self.config.top_db);
        let mix = trim_silence(&self.loader.load(mix_path, sr)?, self.config.top_db);

        let (inst, mix) = self.aligner.align(&inst, &mix, sr)?;
        let vocal = inst.difference(&mix);

        let inst_out = output_path(dest, INSTRUMENT_DIR, mix_path);
        let mix_out = output_path(dest, MIX_DIR, mix_path);
        let vocal_out = output_path(dest, VOCAL_DIR, mix_path);
        write_waveform(&inst_out, &inst)?;
        write_waveform(&mix_out, &mix)?;
        write_waveform(&vocal_out, &vocal)?;

        Ok(PairOutput {
            instrument_path: inst_out.to_string_lossy().into(),
            mix_path: mix_out.to_string_lossy().into(),
            vocal_path: vocal_out.to_string_lossy().into(),
        })
    }
}

/// Runs [`DatasetBuilder`] with the default decoder.
pub fn generate_dataset(source: &Path, dest: &Path, config: &DatasetConfig) -> Result<BatchReport> {
    DatasetBuilder::new(config.clone()).run(source, dest)
}

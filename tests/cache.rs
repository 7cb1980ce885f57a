use std::{
    path::Path,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use ndarray::{Array2, Axis};
use num_complex::Complex32;
use rand::{rngs::StdRng, Rng, SeedableRng};
use tempfile::tempdir;
use vocal_dataset_core::{
    cache_path, AlignOptions, Aligner, AudioLoader, DatasetError, NoopObserver, Result,
    SpectralTransform, SpectrogramCache, StftTransform, Waveform,
};

const SR: u32 = 1000;
const HOP: usize = 64;

fn band_limited(seed: u64, n: usize) -> Vec<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    let partials: Vec<(f32, f32)> = (0..20)
        .map(|_| (rng.gen_range(5.0..100.0), rng.gen_range(0.0..std::f32::consts::TAU)))
        .collect();
    (0..n)
        .map(|i| {
            let t = i as f32 / SR as f32;
            partials
                .iter()
                .map(|(f, p)| 0.03 * (std::f32::consts::TAU * f * t + p).sin())
                .sum::<f32>()
        })
        .collect()
}

/// Serves an instrumental for paths named `inst*` and instrumental plus a
/// quiet voice for everything else.
#[derive(Default)]
struct SyntheticLoader {
    loads: AtomicUsize,
}

impl AudioLoader for SyntheticLoader {
    fn load(&self, path: &Path, sample_rate: u32) -> Result<Waveform> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        let inst = band_limited(1, 12_000);
        let name = path.file_name().unwrap().to_string_lossy();
        let samples = if name.starts_with("inst") {
            inst
        } else {
            let voice = band_limited(2, 12_000);
            inst.iter().zip(&voice).map(|(i, v)| i + 0.1 * v).collect()
        };
        Ok(Waveform::from_mono(samples, sample_rate))
    }
}

#[derive(Default)]
struct CountingTransform {
    calls: AtomicUsize,
}

impl SpectralTransform for CountingTransform {
    fn transform(&self, signal: &[f32], n_fft: usize, hop: usize) -> Result<Array2<Complex32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        StftTransform.transform(signal, n_fft, hop)
    }
}

fn cache_with(
    loader: &Arc<SyntheticLoader>,
    transform: &Arc<CountingTransform>,
) -> SpectrogramCache {
    SpectrogramCache::new(
        loader.clone(),
        transform.clone(),
        Aligner::new(AlignOptions::default()).with_observer(Arc::new(NoopObserver)),
    )
}

#[test]
fn second_call_is_served_from_disk() {
    let dir = tempdir().unwrap();
    let mix = dir.path().join("mix.flac");
    let inst = dir.path().join("inst.flac");
    let loader = Arc::new(SyntheticLoader::default());
    let transform = Arc::new(CountingTransform::default());
    let cache = cache_with(&loader, &transform);

    let (x, y) = cache.get_or_compute(&mix, &inst, SR, HOP).unwrap();
    assert_eq!(x.len_of(Axis(0)), 2);
    assert_eq!(x.len_of(Axis(1)), HOP);
    assert_eq!(x.dim(), y.dim());
    assert!(cache_path(&mix).exists());
    assert!(cache_path(&inst).exists());
    // One transform per channel per signal.
    assert_eq!(transform.calls.load(Ordering::SeqCst), 4);
    assert_eq!(loader.loads.load(Ordering::SeqCst), 2);

    let (x2, y2) = cache.get_or_compute(&mix, &inst, SR, HOP).unwrap();
    assert_eq!(transform.calls.load(Ordering::SeqCst), 4);
    assert_eq!(loader.loads.load(Ordering::SeqCst), 2);
    assert_eq!(x, x2);
    assert_eq!(y, y2);
}

#[test]
fn missing_companion_triggers_recompute() {
    let dir = tempdir().unwrap();
    let mix = dir.path().join("mix.wav");
    let inst = dir.path().join("inst.wav");
    let loader = Arc::new(SyntheticLoader::default());
    let transform = Arc::new(CountingTransform::default());
    let cache = cache_with(&loader, &transform);

    let (x, _) = cache.get_or_compute(&mix, &inst, SR, HOP).unwrap();
    std::fs::remove_file(cache_path(&inst)).unwrap();

    let (x2, _) = cache.get_or_compute(&mix, &inst, SR, HOP).unwrap();
    assert_eq!(transform.calls.load(Ordering::SeqCst), 8);
    assert!(cache_path(&inst).exists());
    assert_eq!(x, x2);
}

#[test]
fn unreadable_entry_is_reported_as_corrupt() {
    let dir = tempdir().unwrap();
    let mix = dir.path().join("mix.wav");
    let inst = dir.path().join("inst.wav");
    std::fs::write(cache_path(&mix), b"not an npy file").unwrap();
    std::fs::write(cache_path(&inst), b"not an npy file").unwrap();

    let cache = cache_with(
        &Arc::new(SyntheticLoader::default()),
        &Arc::new(CountingTransform::default()),
    );
    let err = cache.get_or_compute(&mix, &inst, SR, HOP).unwrap_err();
    assert!(matches!(err, DatasetError::CacheCorrupt { .. }));
}

#[test]
fn entry_of_wrong_rank_is_reported_as_corrupt() {
    let dir = tempdir().unwrap();
    let mix = dir.path().join("mix.wav");
    let inst = dir.path().join("inst.wav");
    let flat = Array2::<f32>::zeros((HOP, 10));
    ndarray_npy::write_npy(cache_path(&mix), &flat).unwrap();
    ndarray_npy::write_npy(cache_path(&inst), &flat).unwrap();

    let cache = cache_with(
        &Arc::new(SyntheticLoader::default()),
        &Arc::new(CountingTransform::default()),
    );
    let err = cache.get_or_compute(&mix, &inst, SR, HOP).unwrap_err();
    assert!(matches!(err, DatasetError::CacheCorrupt { .. }));
}

#[test]
fn entry_for_another_hop_length_is_reported_as_corrupt() {
    let dir = tempdir().unwrap();
    let mix = dir.path().join("mix.wav");
    let inst = dir.path().join("inst.wav");
    let cache = cache_with(
        &Arc::new(SyntheticLoader::default()),
        &Arc::new(CountingTransform::default()),
    );

    cache.get_or_compute(&mix, &inst, SR, HOP).unwrap();
    let err = cache.get_or_compute(&mix, &inst, SR, HOP / 2).unwrap_err();
    assert!(matches!(err, DatasetError::CacheCorrupt { .. }));
}

#[test]
fn invalid_hop_is_rejected_before_loading() {
    let dir = tempdir().unwrap();
    let loader = Arc::new(SyntheticLoader::default());
    let cache = cache_with(&loader, &Arc::new(CountingTransform::default()));
    let err = cache
        .get_or_compute(dir.path().join("mix.wav"), dir.path().join("inst.wav"), SR, 1)
        .unwrap_err();
    assert!(matches!(err, DatasetError::InvalidArgument(_)));
    assert_eq!(loader.loads.load(Ordering::SeqCst), 0);
}

use std::{
    path::Path,
    sync::{Arc, Mutex},
};

use rand::{rngs::StdRng, Rng, SeedableRng};
use tempfile::tempdir;
use vocal_dataset_core::{
    generate_dataset, write_waveform, AlignProgress, DatasetBuilder, DatasetConfig, Waveform,
};

const SR: u32 = 1000;

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

/// `<root>/instrument/<name>` and `<root>/mix/<name>`, the mix carrying an
/// extra voice and starting `lead` samples later.
fn write_pair(root: &Path, name: &str, seed: u64, lead: usize) {
    let inst = band_limited(seed, 12_000);
    let voice = band_limited(seed + 100, 12_000);
    let mix: Vec<f32> = inst
        .iter()
        .zip(&voice)
        .skip(lead)
        .map(|(i, v)| i + 0.2 * v)
        .collect();
    write_waveform(
        &root.join("instrument").join(name),
        &Waveform::from_mono(inst, SR),
    )
    .unwrap();
    write_waveform(&root.join("mix").join(name), &Waveform::from_mono(mix, SR)).unwrap();
}

fn config() -> DatasetConfig {
    DatasetConfig {
        sample_rate: SR,
        jobs: 2,
        ..DatasetConfig::default()
    }
}

fn frames(path: &str) -> (u32, u16, u32) {
    let reader = hound::WavReader::open(path).unwrap();
    let spec = reader.spec();
    (reader.duration(), spec.channels, spec.sample_rate)
}

#[test]
fn pairs_become_aligned_triples() {
    let src = tempdir().unwrap();
    let out = tempdir().unwrap();
    std::fs::create_dir_all(src.path().join("mix")).unwrap();
    std::fs::create_dir_all(src.path().join("instrument")).unwrap();
    write_pair(src.path(), "a.wav", 1, 0);
    write_pair(src.path(), "b.wav", 2, 25);
    std::fs::write(src.path().join("mix").join("notes.txt"), "ignored").unwrap();

    let report = generate_dataset(src.path(), out.path(), &config()).unwrap();
    assert!(report.failed.is_empty(), "{:?}", report.failed);
    assert_eq!(report.written.len(), 2);

    for pair in &report.written {
        let inst = frames(&pair.instrument_path);
        let mix = frames(&pair.mix_path);
        let vocal = frames(&pair.vocal_path);
        assert_eq!(inst, mix);
        assert_eq!(inst, vocal);
        assert_eq!(inst.1, 2);
        assert_eq!(inst.2, SR);
    }
    assert!(out.path().join("vocal").join("b.wav").exists());

    // The recovered vocal is the voice (with flipped sign), not the whole mix.
    let vocal = vocal_dataset_core::load_waveform(out.path().join("vocal").join("a.wav"), SR)
        .unwrap();
    let mix = vocal_dataset_core::load_waveform(out.path().join("mix").join("a.wav"), SR).unwrap();
    let energy = |x: &[f32]| x.iter().map(|v| v * v).sum::<f32>();
    assert!(energy(vocal.left()) < 0.2 * energy(mix.left()));
}

#[test]
fn failing_pairs_are_reported_and_skipped() {
    let src = tempdir().unwrap();
    let out = tempdir().unwrap();
    std::fs::create_dir_all(src.path().join("mix")).unwrap();
    std::fs::create_dir_all(src.path().join("instrument")).unwrap();
    write_pair(src.path(), "good.wav", 3, 0);
    // No instrumental counterpart.
    write_waveform(
        &src.path().join("mix").join("orphan.wav"),
        &Waveform::from_mono(band_limited(4, 12_000), SR),
    )
    .unwrap();

    let report = generate_dataset(src.path(), out.path(), &config()).unwrap();
    assert_eq!(report.written.len(), 1);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, "orphan.wav");
    assert!(!out.path().join("vocal").join("orphan.wav").exists());
}

#[test]
fn missing_mix_folder_is_an_error() {
    let src = tempdir().unwrap();
    let out = tempdir().unwrap();
    assert!(generate_dataset(src.path(), out.path(), &config()).is_err());
}

#[test]
fn observer_sees_every_pair() {
    let src = tempdir().unwrap();
    let out = tempdir().unwrap();
    std::fs::create_dir_all(src.path().join("mix")).unwrap();
    std::fs::create_dir_all(src.path().join("instrument")).unwrap();
    write_pair(src.path(), "a.wav", 5, 0);
    write_pair(src.path(), "b.wav", 6, 0);

    let seen = Arc::new(Mutex::new(0usize));
    let sink = Arc::clone(&seen);
    let report = DatasetBuilder::new(config())
        .with_observer(Arc::new(move |e: &AlignProgress| {
            if matches!(e, AlignProgress::Downsampling { .. }) {
                *sink.lock().unwrap() += 1;
            }
        }))
        .run(src.path(), out.path())
        .unwrap();

    assert_eq!(report.written.len(), 2);
    assert_eq!(*seen.lock().unwrap(), 2);
}

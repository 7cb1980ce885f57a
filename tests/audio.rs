use approx::assert_abs_diff_eq;
use rand::{rngs::StdRng, Rng, SeedableRng};
use tempfile::tempdir;
use vocal_dataset_core::core::audio::{convert_rate, write_audio};
use vocal_dataset_core::{
    load_waveform, read_audio, trim_silence, write_waveform, AudioData, Waveform,
};

fn noise(seed: u64, n: usize, sr: u32) -> Waveform {
    let mut rng = StdRng::seed_from_u64(seed);
    let left: Vec<f32> = (0..n).map(|_| rng.gen_range(-0.5..0.5)).collect();
    let right: Vec<f32> = (0..n).map(|_| rng.gen_range(-0.5..0.5)).collect();
    Waveform::new(left, right, sr).unwrap()
}

fn sine(n: usize, sr: u32, freq: f32) -> Vec<f32> {
    (0..n)
        .map(|i| 0.5 * (std::f32::consts::TAU * freq * i as f32 / sr as f32).sin())
        .collect()
}

#[test]
fn written_waveform_reads_back() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("pair.wav");
    let w = noise(1, 3000, 8000);

    write_waveform(&path, &w).unwrap();
    let back = load_waveform(&path, 8000).unwrap();

    assert_eq!(back.len(), w.len());
    assert_eq!(back.sample_rate(), 8000);
    for i in 0..w.len() {
        assert_abs_diff_eq!(back.left()[i], w.left()[i], epsilon = 1e-4);
        assert_abs_diff_eq!(back.right()[i], w.right()[i], epsilon = 1e-4);
    }
}

#[test]
fn write_leaves_no_temporary_files() {
    let dir = tempdir().unwrap();
    write_waveform(&dir.path().join("a.wav"), &noise(2, 100, 8000)).unwrap();
    let names: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    assert_eq!(names, vec![std::ffi::OsString::from("a.wav")]);
}

#[test]
fn mono_files_are_duplicated_to_stereo() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("mono.wav");
    let samples = sine(800, 8000, 440.0);
    write_audio(
        &path,
        &AudioData {
            samples: samples.clone(),
            sample_rate: 8000,
            channels: 1,
        },
    )
    .unwrap();

    let raw = read_audio(&path).unwrap();
    assert_eq!(raw.channels, 1);
    assert_eq!(raw.sample_rate, 8000);

    let w = load_waveform(&path, 8000).unwrap();
    assert_eq!(w.len(), samples.len());
    assert_eq!(w.left(), w.right());
}

#[test]
fn rate_conversion_scales_length() {
    let w = Waveform::from_mono(sine(8000, 8000, 200.0), 8000);
    let half = convert_rate(&w, 4000).unwrap();
    assert_eq!(half.sample_rate(), 4000);
    assert!((half.len() as i64 - 4000).abs() <= 1, "len {}", half.len());

    // A low tone survives the conversion, including its timing.
    let expected = sine(4000, 4000, 200.0);
    for i in 500..3500 {
        assert_abs_diff_eq!(half.left()[i], expected[i], epsilon = 0.02);
    }
}

#[test]
fn equal_rates_are_passed_through() {
    let w = noise(3, 500, 8000);
    let same = convert_rate(&w, 8000).unwrap();
    assert_eq!(same.left(), w.left());
}

#[test]
fn silence_is_trimmed_from_both_ends() {
    let sr = 8000;
    let signal = noise(4, 16_000, sr);
    let pad = vec![0.0f32; 8192];
    let mut left = pad.clone();
    left.extend_from_slice(signal.left());
    left.extend_from_slice(&pad);
    let padded = Waveform::new(left.clone(), left, sr).unwrap();

    let trimmed = trim_silence(&padded, 60.0);
    assert!(trimmed.len() >= 16_000);
    assert!(trimmed.len() <= 16_000 + 2 * 1024, "len {}", trimmed.len());
}

#[test]
fn all_silent_input_trims_to_nothing() {
    let w = Waveform::from_mono(vec![0.0; 5000], 8000);
    assert!(trim_silence(&w, 60.0).is_empty());
}

#[test]
fn truncated_file_decodes_the_frames_present() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("cut.wav");
    write_waveform(&path, &noise(5, 8000, 8000)).unwrap();
    let full = std::fs::metadata(&path).unwrap().len();
    let file = std::fs::OpenOptions::new().write(true).open(&path).unwrap();
    file.set_len(full - 1000).unwrap();
    drop(file);

    let w = load_waveform(&path, 8000).unwrap();
    assert!(!w.is_empty());
    assert!(w.len() < 8000, "len {}", w.len());
}

#[test]
fn unreadable_file_is_an_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("noise.wav");
    std::fs::write(&path, vec![0x5au8; 4096]).unwrap();
    assert!(read_audio(&path).is_err());
}

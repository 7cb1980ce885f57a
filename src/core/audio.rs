use std::{fs::File, io::ErrorKind, path::Path};

use anyhow::Context;
use hound::WavWriter;
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use symphonia::core::{
    audio::SampleBuffer, codecs::DecoderOptions, errors::Error as SymphoniaError,
    formats::FormatOptions, io::MediaSourceStream, meta::MetadataOptions, probe::Hint,
};
use symphonia::default::{get_codecs, get_probe};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::{
    error::{DatasetError, Result},
    types::{AudioData, Waveform},
};

/// Source of decoded waveforms for the spectrogram cache and the batch driver.
pub trait AudioLoader: Send + Sync {
    fn load(&self, path: &Path, sample_rate: u32) -> Result<Waveform>;
}

/// Decodes files with symphonia and converts them to the requested rate.
#[derive(Clone, Copy, Debug, Default)]
pub struct DecodingLoader;

impl AudioLoader for DecodingLoader {
    fn load(&self, path: &Path, sample_rate: u32) -> Result<Waveform> {
        load_waveform(path, sample_rate)
    }
}

pub fn read_audio<P: AsRef<Path>>(path: P) -> Result<AudioData> {
    let path: &Path = path.as_ref();

    let file: File =
        File::open(path).with_context(|| format!("Failed to open audio file: {:?}", path))?;

    let mss: MediaSourceStream = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint: Hint = Hint::new();

    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = get_probe().format(
        &hint,
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;

    let mut format = probed.format;
    let track = format.default_track().context("No default track found")?;
    let track_id = track.id;

    let mut decoder = get_codecs().make(&track.codec_params, &DecoderOptions::default())?;

    let mut samples: Vec<f32> = Vec::new();
    let mut sample_rate: u32 = track.codec_params.sample_rate.unwrap_or(0);
    let mut channels: u16 = track
        .codec_params
        .channels
        .map(|c| c.count() as u16)
        .unwrap_or(0);

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(SymphoniaError::IoError(e)) if e.kind() == ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e.into()),
        };
        if packet.track_id() != track_id {
            continue;
        }
        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            // Corrupt frames are skipped.
            Err(SymphoniaError::DecodeError(_)) => continue,
            Err(e) => return Err(e.into()),
        };
        sample_rate = decoded.spec().rate;
        channels = decoded.spec().channels.count() as u16;

        let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, *decoded.spec());
        buffer.copy_interleaved_ref(decoded);

        samples.extend_from_slice(buffer.samples());
    }

    debug!(
        path = %path.display(),
        sample_rate,
        channels,
        samples = samples.len(),
        "read audio"
    );

    Ok(AudioData {
        samples,
        sample_rate,
        channels,
    })
}

/// Decodes `path` into a stereo waveform at `sample_rate`.
pub fn load_waveform<P: AsRef<Path>>(path: P, sample_rate: u32) -> Result<Waveform> {
    let audio = read_audio(path.as_ref())?;
    if audio.sample_rate == 0 {
        return Err(DatasetError::invalid(format!(
            "{} reports no sample rate",
            path.as_ref().display()
        )));
    }
    let wave = Waveform::from_interleaved(&audio.samples, audio.channels, audio.sample_rate)?;
    convert_rate(&wave, sample_rate)
}

/// Band-limited sample rate conversion. Returns a copy when the rates match.
pub fn convert_rate(wave: &Waveform, target_rate: u32) -> Result<Waveform> {
    if target_rate == 0 {
        return Err(DatasetError::invalid("target sample rate must be positive"));
    }
    if wave.sample_rate() == target_rate || wave.is_empty() {
        return Ok(wave.clone().with_sample_rate(target_rate));
    }

    let ratio = target_rate as f64 / wave.sample_rate() as f64;
    let chunk_size = 1024;
    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };
    let mut resampler = SincFixedIn::<f32>::new(ratio, 1.0, params, chunk_size, 2)
        .context("Failed to create sinc resampler")?;

    let expected = (wave.len() as f64 * ratio).round() as usize;
    let delay = resampler.output_delay();
    let mut out: [Vec<f32>; 2] = [
        Vec::with_capacity(expected + delay),
        Vec::with_capacity(expected + delay),
    ];

    let [left, right] = wave.channels();
    let mut pos = 0usize;
    while pos + resampler.input_frames_next() <= wave.len() {
        let n = resampler.input_frames_next();
        let block = resampler
            .process(&[&left[pos..pos + n], &right[pos..pos + n]], None)
            .context("resampling failed")?;
        out[0].extend_from_slice(&block[0]);
        out[1].extend_from_slice(&block[1]);
        pos += n;
    }

    // Remaining input, then silence until the filter delay has been flushed.
    let tail = resampler
        .process_partial(Some(&[&left[pos..], &right[pos..]][..]), None)
        .context("resampling failed")?;
    out[0].extend_from_slice(&tail[0]);
    out[1].extend_from_slice(&tail[1]);
    while out[0].len() < expected + delay {
        let flush = resampler
            .process_partial::<&[f32]>(None, None)
            .context("resampling failed")?;
        if flush[0].is_empty() {
            break;
        }
        out[0].extend_from_slice(&flush[0]);
        out[1].extend_from_slice(&flush[1]);
    }

    let [l, r] = out;
    let end = (delay + expected).min(l.len());
    let start = delay.min(end);
    Waveform::new(l[start..end].to_vec(), r[start..end].to_vec(), target_rate)
}

const TRIM_FRAME: usize = 2048;
const TRIM_HOP: usize = 512;

/// Cuts leading and trailing frames more than `top_db` below the loudest
/// frame. RMS is measured on the channel mean with centred frames.
pub fn trim_silence(wave: &Waveform, top_db: f32) -> Waveform {
    if wave.is_empty() {
        return wave.clone();
    }
    let mono: Vec<f32> = wave
        .left()
        .iter()
        .zip(wave.right())
        .map(|(l, r)| 0.5 * (l + r))
        .collect();

    let frames = 1 + mono.len() / TRIM_HOP;
    let half = TRIM_FRAME / 2;
    let rms: Vec<f32> = (0..frames)
        .map(|f| {
            let center = f * TRIM_HOP;
            let lo = center.saturating_sub(half);
            let hi = (center + half).min(mono.len());
            let sum: f32 = mono[lo..hi].iter().map(|x| x * x).sum();
            (sum / TRIM_FRAME as f32).sqrt()
        })
        .collect();

    let peak = rms.iter().cloned().fold(0.0f32, f32::max);
    if peak <= 0.0 {
        return wave.slice(0..0);
    }
    let floor = peak * 10f32.powf(-top_db / 20.0);

    let first = rms.iter().position(|&r| r > floor);
    let last = rms.iter().rposition(|&r| r > floor);
    match (first, last) {
        (Some(first), Some(last)) => {
            let start = first * TRIM_HOP;
            let end = ((last + 1) * TRIM_HOP).min(wave.len());
            wave.slice(start..end)
        }
        _ => wave.slice(0..0),
    }
}

pub fn write_audio(path: &Path, audio: &AudioData) -> Result<()> {
    let spec = hound::WavSpec {
        channels: audio.channels,
        sample_rate: audio.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = WavWriter::create(path, spec)?;
    for sample in &audio.samples {
        let s = (sample * i16::MAX as f32).clamp(i16::MIN as f32, i16::MAX as f32) as i16;
        writer.write_sample(s)?;
    }

    writer.finalize()?;
    Ok(())
}

/// Writes a 16-bit stereo wav. The file only appears at `path` once it is
/// complete.
pub fn write_waveform(path: &Path, wave: &Waveform) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let tmp = NamedTempFile::new_in(dir)?;
    write_audio(
        tmp.path(),
        &AudioData {
            samples: wave.to_interleaved(),
            sample_rate: wave.sample_rate(),
            channels: 2,
        },
    )?;
    tmp.persist(path)?;
    Ok(())
}

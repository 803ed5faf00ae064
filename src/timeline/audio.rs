// SYNOID Dub Audio I/O
// Copyright (c) 2026 Xing_The_Creator | SYNOID
//
// Decoding of rendered clips (any container symphonia can probe), mono
// down-mix, sample-rate conversion and WAV output for the assembled track.

use anyhow::{anyhow, Context, Result};
use std::fs::File;
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::debug;

/// Decode an audio file into interleaved f32 samples.
/// Returns (samples, sample_rate, channels).
pub fn decode_file(path: &Path) -> Result<(Vec<f32>, u32, usize)> {
    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let file = File::open(path).with_context(|| format!("Open audio {:?}", path))?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .with_context(|| format!("Probe audio format {:?}", path))?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| anyhow!("No decodable audio track in {:?}", path))?;
    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| anyhow!("Unknown sample rate in {:?}", path))?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .context("Create decoder")?;

    let mut samples = Vec::new();
    let mut channels = track.codec_params.channels.map(|c| c.count()).unwrap_or(1);

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            // End of stream
            Err(SymphoniaError::IoError(ref e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(e).context("Read audio packet"),
        };
        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                channels = spec.channels.count().max(1);
                let mut buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                buf.copy_interleaved_ref(decoded);
                samples.extend_from_slice(buf.samples());
            }
            Err(SymphoniaError::DecodeError(e)) => {
                debug!("[AUDIO] Skipping corrupt packet in {:?}: {}", path, e);
                continue;
            }
            Err(e) => return Err(e).context("Decode audio packet"),
        }
    }

    Ok((samples, sample_rate, channels))
}

/// Average interleaved channels down to one.
pub fn downmix_to_mono(samples: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }
    samples
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}

/// Band-limited sample-rate conversion of a mono buffer. The output is
/// trimmed of the filter delay and sized to `round(len * to / from)`.
pub fn resample_mono(samples: Vec<f32>, from_rate: u32, to_rate: u32) -> Result<Vec<f32>> {
    use rubato::{
        Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
    };

    if from_rate == to_rate || samples.is_empty() {
        return Ok(samples);
    }
    if from_rate == 0 || to_rate == 0 {
        anyhow::bail!("Invalid sample rate conversion {} -> {}", from_rate, to_rate);
    }

    let ratio = to_rate as f64 / from_rate as f64;
    let frames = samples.len();
    let expected = (frames as f64 * ratio).round() as usize;

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let mut resampler = SincFixedIn::<f32>::new(ratio, 2.0, params, frames, 1)
        .map_err(|e| anyhow!("Create resampler: {}", e))?;

    let mut out = resampler
        .process(&[samples], None)
        .map_err(|e| anyhow!("Resample: {}", e))?
        .remove(0);
    let tail = resampler
        .process_partial(None::<&[Vec<f32>]>, None)
        .map_err(|e| anyhow!("Flush resampler: {}", e))?
        .remove(0);
    out.extend(tail);

    let delay = resampler.output_delay().min(out.len());
    let mut out = out.split_off(delay);
    out.resize(expected, 0.0);
    Ok(out)
}

/// Decode, down-mix and resample a clip to `sample_rate`.
pub fn load_mono(path: &Path, sample_rate: u32) -> Result<Vec<f32>> {
    let (samples, source_rate, channels) = decode_file(path)?;
    let mono = downmix_to_mono(&samples, channels);
    if source_rate != sample_rate {
        debug!(
            "[AUDIO] Resampling {:?}: {} Hz -> {} Hz",
            path, source_rate, sample_rate
        );
    }
    resample_mono(mono, source_rate, sample_rate)
}

/// Write mono f32 samples as 16-bit PCM WAV.
pub fn write_wav(path: &Path, samples: &[f32], sample_rate: u32) -> Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)
        .with_context(|| format!("Create WAV {:?}", path))?;
    for &sample in samples {
        let amplitude = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
        writer.write_sample(amplitude)?;
    }
    writer.finalize().context("Finalize WAV")?;
    Ok(())
}

/// Duration of a WAV file from its header.
pub fn wav_duration(path: &Path) -> Result<f64> {
    let reader =
        hound::WavReader::open(path).with_context(|| format!("Open WAV {:?}", path))?;
    let spec = reader.spec();
    if spec.sample_rate == 0 {
        anyhow::bail!("WAV {:?} declares a zero sample rate", path);
    }
    // duration() is in frames (samples per channel)
    Ok(reader.duration() as f64 / spec.sample_rate as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(len: usize, sample_rate: u32) -> Vec<f32> {
        (0..len)
            .map(|i| (i as f32 * 440.0 * 2.0 * std::f32::consts::PI / sample_rate as f32).sin() * 0.5)
            .collect()
    }

    #[test]
    fn test_write_then_measure_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        write_wav(&path, &tone(22_050, 44_100), 44_100).unwrap();
        let secs = wav_duration(&path).unwrap();
        assert!((secs - 0.5).abs() < 1e-9, "got {}", secs);
    }

    #[test]
    fn test_downmix_stereo() {
        let stereo = vec![1.0, 0.0, 0.5, 0.5, -1.0, 1.0];
        assert_eq!(downmix_to_mono(&stereo, 2), vec![0.5, 0.5, 0.0]);
    }

    #[test]
    fn test_resample_preserves_duration() {
        let input = tone(24_000, 24_000); // 1s at 24 kHz
        let out = resample_mono(input, 24_000, 44_100).unwrap();
        assert_eq!(out.len(), 44_100);
    }

    #[test]
    fn test_load_mono_decodes_and_resamples_stereo_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 22_050,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for _ in 0..22_050 {
            writer.write_sample(1000i16).unwrap();
            writer.write_sample(-1000i16).unwrap();
        }
        writer.finalize().unwrap();

        let mono = load_mono(&path, 44_100).unwrap();
        assert_eq!(mono.len(), 44_100);
        assert!(mono.iter().all(|s| s.abs() < 0.01));
    }

    #[test]
    fn test_decode_missing_file_fails() {
        assert!(decode_file(Path::new("/definitely/not/here.wav")).is_err());
    }
}

// SYNOID Production Tools - FFmpeg Stream Work for Dubbing
// Copyright (c) 2026 Xing_The_Creator | SYNOID
//
// This module provides FFmpeg wrappers for:
// 1. ASR audio extraction (16 kHz mono PCM)
// 2. Voice sample normalization to WAV
// 3. Pitch-preserving tempo stretch (atempo)
// 4. Audio stream replacement (video stream copied)

use anyhow::{Context, Result};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{info, warn};

use crate::agent::collaborators::{DurationProbe, Muxer, TempoStretcher};
use crate::agent::source_tools::get_media_duration;
use crate::timeline::audio;

/// Result of a production operation
#[derive(Debug)]
pub struct ProductionResult {
    pub output_path: PathBuf,
    pub size_mb: f64,
}

/// Prefix relative paths that start with '-' so ffmpeg never reads them as flags.
pub fn safe_arg_path(path: &Path) -> PathBuf {
    if path.to_string_lossy().starts_with('-') {
        Path::new(".").join(path)
    } else {
        path.to_path_buf()
    }
}

/// Check if ffmpeg is installed and accessible
pub async fn check_ffmpeg() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .output()
        .await
        .map(|o| o.status.success())
        .unwrap_or(false)
}

async fn run_ffmpeg(args: Vec<OsString>, what: &str) -> Result<()> {
    let output = Command::new("ffmpeg")
        .kill_on_drop(true)
        .args(&args)
        .output()
        .await
        .with_context(|| format!("Failed to execute ffmpeg for {}", what))?;

    if !output.status.success() {
        anyhow::bail!(
            "FFmpeg {} failed: {}",
            what,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(())
}

fn atempo_args(input: &Path, rate: f64, output: &Path) -> Vec<OsString> {
    vec![
        "-y".into(),
        "-nostdin".into(),
        "-i".into(),
        safe_arg_path(input).into(),
        "-filter:a".into(),
        format!("atempo={:.6}", rate).into(),
        "-vn".into(),
        safe_arg_path(output).into(),
    ]
}

fn mux_args(video: &Path, audio: &Path, output: &Path) -> Vec<OsString> {
    vec![
        "-y".into(),
        "-nostdin".into(),
        "-i".into(),
        safe_arg_path(video).into(),
        "-i".into(),
        safe_arg_path(audio).into(),
        "-c:v".into(),
        "copy".into(), // keep video as is
        "-map".into(),
        "0:v:0".into(),
        "-map".into(),
        "1:a:0".into(),
        "-shortest".into(),
        safe_arg_path(output).into(),
    ]
}

/// Extract the first audio track as 16 kHz mono PCM WAV for speech recognition.
pub async fn extract_audio_for_asr(video: &Path, output_wav: &Path) -> Result<()> {
    info!("[PROD] Extracting ASR audio: {:?}", video);
    let args: Vec<OsString> = vec![
        "-y".into(),
        "-nostdin".into(),
        "-i".into(),
        safe_arg_path(video).into(),
        "-vn".into(),
        "-acodec".into(),
        "pcm_s16le".into(),
        "-ar".into(),
        "16000".into(),
        "-ac".into(),
        "1".into(),
        safe_arg_path(output_wav).into(),
    ];
    run_ffmpeg(args, "audio extraction").await?;

    let size = std::fs::metadata(output_wav).map(|m| m.len()).unwrap_or(0);
    if size == 0 {
        anyhow::bail!("Audio extraction produced no data for {:?}", video);
    }
    Ok(())
}

/// Voice cloning wants a WAV prompt. Anything else (mp3, m4a...) is converted
/// into `work_dir`; WAV samples are used where they are.
pub async fn ensure_wav_sample(sample: &Path, work_dir: &Path) -> Result<PathBuf> {
    let is_wav = sample
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("wav"))
        .unwrap_or(false);
    if is_wav {
        return Ok(sample.to_path_buf());
    }

    let stem = sample
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "voice_sample".to_string());
    let output = work_dir.join(format!("{}.wav", stem));
    info!("[PROD] Converting voice sample {:?} -> {:?}", sample, output);

    let args: Vec<OsString> = vec![
        "-y".into(),
        "-nostdin".into(),
        "-i".into(),
        safe_arg_path(sample).into(),
        safe_arg_path(&output).into(),
    ];
    run_ffmpeg(args, "voice sample conversion").await?;
    Ok(output)
}

/// ffprobe / ffmpeg backed media operations for the dub pipeline.
#[derive(Debug, Clone, Default)]
pub struct FfmpegToolkit;

impl FfmpegToolkit {
    pub fn new() -> Self {
        Self
    }

    /// Replace the audio stream of `video` with `audio`.
    /// The muxed file only appears at `output` once ffmpeg has finished.
    pub async fn mux_video_with_audio(
        &self,
        video: &Path,
        audio: &Path,
        output: &Path,
    ) -> Result<ProductionResult> {
        for (what, p) in [("Video", video), ("Audio", audio)] {
            if !p.exists() {
                anyhow::bail!("{} not found: {:?}", what, p);
            }
        }

        let dir = output.parent().unwrap_or(Path::new("."));
        tokio::fs::create_dir_all(dir).await?;

        let ext = output
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("mp4")
            .to_string();
        let scratch = tempfile::Builder::new()
            .prefix(".mux_")
            .suffix(&format!(".{}", ext))
            .tempfile_in(dir)
            .context("Create mux scratch file")?;

        info!("[PROD] Muxing dub track into {:?}", output);
        run_ffmpeg(mux_args(video, audio, scratch.path()), "mux").await?;

        scratch
            .persist(output)
            .map_err(|e| e.error)
            .context("Move muxed video into place")?;

        let size_mb = std::fs::metadata(output)?.len() as f64 / 1_048_576.0;
        info!("[PROD] Dubbed video saved: {:?} ({:.2} MB)", output, size_mb);

        Ok(ProductionResult {
            output_path: output.to_path_buf(),
            size_mb,
        })
    }
}

impl DurationProbe for FfmpegToolkit {
    async fn duration(&self, path: &Path) -> Result<f64> {
        get_media_duration(path).await
    }
}

impl TempoStretcher for FfmpegToolkit {
    async fn stretch(&self, input: &Path, rate: f64, output: &Path) -> Result<()> {
        if !(0.5..=100.0).contains(&rate) {
            warn!("[PROD] atempo {:.3} is outside what ffmpeg accepts", rate);
        }
        run_ffmpeg(atempo_args(input, rate, output), "tempo stretch").await
    }
}

impl Muxer for FfmpegToolkit {
    async fn mux(&self, video: &Path, audio: &Path, output: &Path) -> Result<()> {
        self.mux_video_with_audio(video, audio, output).await.map(|_| ())
    }
}

/// Header-only WAV duration, no subprocess. Suited to clip renders that are
/// known to be WAV.
#[derive(Debug, Clone, Default)]
pub struct WavDurationProbe;

impl DurationProbe for WavDurationProbe {
    async fn duration(&self, path: &Path) -> Result<f64> {
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || audio::wav_duration(&path)).await?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(args: &[OsString]) -> Vec<String> {
        args.iter().map(|a| a.to_string_lossy().to_string()).collect()
    }

    #[test]
    fn test_safe_arg_path() {
        assert_eq!(safe_arg_path(Path::new("-out.mp4")), Path::new("./-out.mp4"));
        assert_eq!(safe_arg_path(Path::new("out.mp4")), Path::new("out.mp4"));
    }

    #[test]
    fn test_atempo_args() {
        let args = strings(&atempo_args(Path::new("clip_0.wav"), 1.25, Path::new("-x.wav")));
        assert!(args.contains(&"atempo=1.250000".to_string()));
        assert_eq!(args.last().unwrap(), "./-x.wav");
    }

    #[test]
    fn test_mux_args_copy_video_and_replace_audio() {
        let args = strings(&mux_args(
            Path::new("in.mp4"),
            Path::new("dub.wav"),
            Path::new("out.mp4"),
        ));
        let joined = args.join(" ");
        assert!(joined.contains("-c:v copy"));
        assert!(joined.contains("-map 0:v:0"));
        assert!(joined.contains("-map 1:a:0"));
        assert!(joined.contains("-shortest"));
    }

    #[tokio::test]
    async fn test_wav_sample_passes_through() {
        let dir = tempfile::tempdir().unwrap();
        let sample = Path::new("voices/Speaker.WAV");
        let out = ensure_wav_sample(sample, dir.path()).await.unwrap();
        assert_eq!(out, sample);
    }

    #[tokio::test]
    async fn test_wav_probe() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.wav");
        audio::write_wav(&path, &vec![0.0; 4_000], 8_000).unwrap();
        let secs = WavDurationProbe.duration(&path).await.unwrap();
        assert!((secs - 0.5).abs() < 1e-9);
    }
}

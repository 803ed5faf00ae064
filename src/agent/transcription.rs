// SYNOID Sovereign Ear
// Copyright (c) 2026 Xing_The_Creator | SYNOID
//
// Native Rust implementation of Whisper for local, private, word-level transcription.

use anyhow::{Context, Result};
use hf_hub::api::sync::Api;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

use crate::agent::collaborators::SpeechRecognizer;
use crate::agent::production_tools::extract_audio_for_asr;
use crate::timeline::{Transcript, Word, WordTimeline};

/// A loaded Whisper model. Open once per process (or per run), pass it to
/// the pipeline, close it when done.
pub struct WhisperSession {
    ctx: Arc<WhisperContext>,
    model_path: PathBuf,
    language: Option<String>,
}

impl WhisperSession {
    pub async fn open(
        model_name: &str,
        cache_dir: PathBuf,
        language: Option<String>,
        use_gpu: bool,
    ) -> Result<Self> {
        let model_name = model_name.to_string();

        // Locate or download the model, then load it, in a blocking task
        let (ctx, model_path) = tokio::task::spawn_blocking(move || {
            let model_path = Self::ensure_model(&model_name, &cache_dir)?;
            let params = WhisperContextParameters {
                use_gpu,
                ..Default::default()
            };
            let path_str = model_path
                .to_str()
                .context("Model path is not valid UTF-8")?;
            let ctx = WhisperContext::new_with_params(path_str, params)
                .map_err(|e| anyhow::anyhow!("Failed to load model: {:?}", e))?;
            Ok::<_, anyhow::Error>((ctx, model_path))
        })
        .await??;

        info!("[SOVEREIGN] Whisper session open: {:?}", model_path);
        Ok(Self {
            ctx: Arc::new(ctx),
            model_path,
            language,
        })
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    /// Release the model.
    pub fn close(self) {
        info!("[SOVEREIGN] Whisper session closed: {:?}", self.model_path);
    }

    /// Ensure the GGML model is present (Sovereign Ear - ModelDownloader)
    fn ensure_model(model_name: &str, base_dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(base_dir)?;

        let filename = format!("ggml-{}.bin", model_name);
        let model_path = base_dir.join(&filename);

        if model_path.exists() {
            info!("[SOVEREIGN] Found cached Whisper model: {:?}", model_path);
            return Ok(model_path);
        }

        info!("[SOVEREIGN] Downloading Whisper model: {}...", filename);

        // Use hf-hub to fetch from ggerganov/whisper.cpp
        let api = Api::new()?;
        let repo = api.model("ggerganov/whisper.cpp".to_string());
        let downloaded_path = repo.get(&filename)?;

        // Copy to our cache location for persistence/control
        fs::copy(&downloaded_path, &model_path)?;

        info!("[SOVEREIGN] Model secured: {:?}", model_path);
        Ok(model_path)
    }

    /// Transcribe a 16 kHz mono WAV into words.
    pub async fn transcribe_wav(&self, wav_path: &Path) -> Result<Transcript> {
        info!("[SOVEREIGN] Transcribing: {:?}", wav_path);
        let ctx = self.ctx.clone();
        let wav_path = wav_path.to_path_buf();
        let language = self.language.clone();

        let (text, words) = tokio::task::spawn_blocking(move || {
            let pcm = read_pcm_16k(&wav_path)?;
            decode_words(&ctx, &pcm, language.as_deref())
        })
        .await??;

        let words = WordTimeline::new(words).map_err(|e| anyhow::anyhow!("{}", e))?;
        info!("[SOVEREIGN] Transcription Complete: {} words.", words.len());
        Ok(Transcript { text, words })
    }
}

impl SpeechRecognizer for WhisperSession {
    async fn transcribe(&self, video_path: &Path) -> Result<Transcript> {
        if !video_path.exists() {
            anyhow::bail!("Video not found: {:?}", video_path);
        }
        let scratch = tempfile::Builder::new()
            .prefix("transcribe_video_")
            .tempdir()
            .context("Create ASR scratch dir")?;
        let wav = scratch.path().join("extracted_audio.wav");

        extract_audio_for_asr(video_path, &wav).await?;
        self.transcribe_wav(&wav).await
    }
}

fn read_pcm_16k(path: &Path) -> Result<Vec<f32>> {
    let mut reader = hound::WavReader::open(path).context("Open WAV")?;
    let spec = reader.spec();
    if spec.sample_rate != 16_000 || spec.channels != 1 {
        anyhow::bail!(
            "ASR expects 16 kHz mono, got {} Hz x {}",
            spec.sample_rate,
            spec.channels
        );
    }
    let pcm = reader
        .samples::<i16>()
        .map(|s| s.map(|s| s as f32 / 32768.0))
        .collect::<Result<Vec<f32>, _>>()
        .context("Read PCM samples")?;
    Ok(pcm)
}

/// Run Whisper with one-word segments so every segment carries a word timestamp.
fn decode_words(
    ctx: &WhisperContext,
    pcm: &[f32],
    language: Option<&str>,
) -> Result<(String, Vec<Word>)> {
    let mut state = ctx.create_state().context("Create state")?;

    let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
    params.set_language(language);
    params.set_print_special(false);
    params.set_print_progress(false);
    params.set_print_realtime(false);
    params.set_print_timestamps(false);
    params.set_token_timestamps(true);
    params.set_split_on_word(true);
    params.set_max_len(1);

    let num_threads = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4) as i32;
    params.set_n_threads(num_threads);

    state.full(params, pcm).context("Running inference")?;

    let num_segments = state.full_n_segments().context("Get segments count")?;
    let mut words = Vec::new();
    for i in 0..num_segments {
        let text = state.full_get_segment_text(i).unwrap_or_default();
        let text = text.trim();
        if text.is_empty() {
            continue;
        }
        // centiseconds to seconds, kept at millisecond precision
        let start = round_ms(state.full_get_segment_t0(i).unwrap_or(0) as f64 / 100.0);
        let end = round_ms(state.full_get_segment_t1(i).unwrap_or(0) as f64 / 100.0);
        words.push(Word::new(text, start, end.max(start)));
    }

    let text = words
        .iter()
        .map(|w| w.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    Ok((text, words))
}

fn round_ms(secs: f64) -> f64 {
    (secs * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_ms() {
        assert_eq!(round_ms(1.23456), 1.235);
        assert_eq!(round_ms(0.0), 0.0);
    }

    #[test]
    fn test_read_pcm_rejects_wrong_rate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("44k.wav");
        crate::timeline::audio::write_wav(&path, &[0.0; 441], 44_100).unwrap();
        assert!(read_pcm_16k(&path).is_err());

        let ok = dir.path().join("16k.wav");
        crate::timeline::audio::write_wav(&ok, &[0.0; 160], 16_000).unwrap();
        assert_eq!(read_pcm_16k(&ok).unwrap().len(), 160);
    }
}

// SYNOID Dub Pipeline - Voice Clone Re-Dubbing Orchestrator
// Copyright (c) 2026 Xing_The_Creator | SYNOID
//
// Source video + voice sample in, dubbed video out:
// fetch -> transcribe -> chunk -> (synthesize -> correct) per clip -> assemble -> mux.
// Every failure is fatal and reported with its stage and clip index.

use futures_util::{stream, StreamExt, TryStreamExt};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::agent::collaborators::{DurationProbe, Muxer, SpeechRecognizer, TempoStretcher, VoiceCloner};
use crate::agent::production_tools::ensure_wav_sample;
use crate::agent::source_tools::download_video;
use crate::config::DubConfig;
use crate::error::{DubError, DubResult};
use crate::timeline::{
    Clip, Correction, DurationCorrector, TimelineAssembler, Transcript, TranscriptChunker,
};

/// Where a run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunStage {
    Preparing,
    Fetching,
    Transcribing,
    Chunked { clips: usize },
    Synthesizing { clip: usize },
    Correcting { clip: usize },
    Assembling,
    Muxing,
    Done,
}

impl fmt::Display for RunStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStage::Preparing => write!(f, "preparing"),
            RunStage::Fetching => write!(f, "fetching"),
            RunStage::Transcribing => write!(f, "transcribing"),
            RunStage::Chunked { clips } => write!(f, "chunked ({} clips)", clips),
            RunStage::Synthesizing { clip } => write!(f, "synthesizing clip {}", clip),
            RunStage::Correcting { clip } => write!(f, "correcting clip {}", clip),
            RunStage::Assembling => write!(f, "assembling"),
            RunStage::Muxing => write!(f, "muxing"),
            RunStage::Done => write!(f, "done"),
        }
    }
}

/// Progress callback
pub type ProgressCallback = Arc<dyn Fn(&RunStage) + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoSource {
    LocalFile(PathBuf),
    Url(String),
}

impl VideoSource {
    /// `http(s)://` inputs are downloaded, anything else is a local path.
    pub fn parse(input: &str) -> Self {
        let lower = input.trim().to_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            VideoSource::Url(input.trim().to_string())
        } else {
            VideoSource::LocalFile(PathBuf::from(input))
        }
    }
}

#[derive(Debug, Clone)]
pub struct DubRequest {
    pub source: VideoSource,
    pub voice_sample: PathBuf,
    pub output: PathBuf,
}

#[derive(Debug, Clone)]
pub struct DubOutcome {
    pub output: PathBuf,
    pub transcript: Transcript,
    /// Clips in timeline order. Audio paths point into the run dir.
    pub clips: Vec<Clip>,
    pub corrections: Vec<Correction>,
    pub video_duration: f64,
    pub track_duration: f64,
    /// Set when intermediates were kept.
    pub run_dir: Option<PathBuf>,
}

pub struct DubPipeline<A, V, M> {
    asr: A,
    cloner: V,
    media: M,
    config: DubConfig,
    progress_callback: Option<ProgressCallback>,
}

struct RunPaths {
    dir: PathBuf,
    clips: PathBuf,
    /// Cleared once the run reaches an outcome; still set when the run is dropped.
    pending: bool,
}

impl Drop for RunPaths {
    fn drop(&mut self) {
        if !self.pending {
            return;
        }
        warn!("[DUB] Run dropped before finishing, removing {:?}", self.dir);
        if let Err(e) = std::fs::remove_dir_all(&self.dir) {
            warn!("[DUB] Could not remove {:?}: {}", self.dir, e);
        }
    }
}

impl<A, V, M> DubPipeline<A, V, M>
where
    A: SpeechRecognizer + Send + Sync,
    V: VoiceCloner + Send + Sync,
    M: DurationProbe + TempoStretcher + Muxer + Send + Sync,
{
    pub fn new(asr: A, cloner: V, media: M, config: DubConfig) -> DubResult<Self> {
        config.validate()?;
        Ok(Self {
            asr,
            cloner,
            media,
            config,
            progress_callback: None,
        })
    }

    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    pub fn config(&self) -> &DubConfig {
        &self.config
    }

    pub async fn run(&self, request: DubRequest) -> DubResult<DubOutcome> {
        self.run_observed(request, |_| {}).await
    }

    /// Like `run`, also reporting every stage change to `observer`.
    pub async fn run_observed<F>(&self, request: DubRequest, observer: F) -> DubResult<DubOutcome>
    where
        F: Fn(&RunStage) + Send + Sync,
    {
        let report = |stage: RunStage| {
            info!("[DUB] Stage: {}", stage);
            if let Some(cb) = &self.progress_callback {
                cb(&stage);
            }
            observer(&stage);
        };

        report(RunStage::Preparing);
        self.validate_request(&request)?;

        let run_dir = self.config.work_dir.join(format!("run-{}", Uuid::new_v4()));
        let mut paths = RunPaths {
            clips: run_dir.join("clips"),
            dir: run_dir,
            pending: true,
        };
        tokio::fs::create_dir_all(&paths.clips).await?;
        info!("[DUB] Run directory: {:?}", paths.dir);

        let result = self.execute(&request, &paths, &report).await;
        paths.pending = false;
        match result {
            Ok(mut outcome) => {
                if self.config.keep_intermediates {
                    outcome.run_dir = Some(paths.dir.clone());
                } else if let Err(e) = tokio::fs::remove_dir_all(&paths.dir).await {
                    warn!("[DUB] Could not remove {:?}: {}", paths.dir, e);
                }
                report(RunStage::Done);
                info!(
                    "[DUB] ✅ Dubbed {} clips into {:?}",
                    outcome.clips.len(),
                    outcome.output
                );
                Ok(outcome)
            }
            Err(e) => {
                error!(
                    "[DUB] ❌ Run failed while {}: {}. Intermediates kept in {:?}",
                    e.stage(),
                    e,
                    paths.dir
                );
                Err(e)
            }
        }
    }

    fn validate_request(&self, request: &DubRequest) -> DubResult<()> {
        if !request.voice_sample.is_file() {
            return Err(DubError::input(format!(
                "voice sample not found: {}",
                request.voice_sample.display()
            )));
        }
        if let VideoSource::LocalFile(video) = &request.source {
            if !video.is_file() {
                return Err(DubError::input(format!(
                    "video not found: {}",
                    video.display()
                )));
            }
            if video == &request.output {
                return Err(DubError::input("output would overwrite the source video"));
            }
        }
        Ok(())
    }

    async fn execute(
        &self,
        request: &DubRequest,
        paths: &RunPaths,
        report: &(dyn Fn(RunStage) + Send + Sync),
    ) -> DubResult<DubOutcome> {
        let video = match &request.source {
            VideoSource::LocalFile(path) => path.clone(),
            VideoSource::Url(url) => {
                report(RunStage::Fetching);
                let source = download_video(url, &paths.dir)
                    .await
                    .map_err(|e| DubError::input(format!("download failed: {:#}", e)))?;
                info!("[DUB] Source '{}' ({:.1}s)", source.title, source.duration);
                source.local_path
            }
        };

        let voice_sample = ensure_wav_sample(&request.voice_sample, &paths.dir)
            .await
            .map_err(|e| DubError::input(format!("voice sample unusable: {:#}", e)))?;

        report(RunStage::Transcribing);
        let transcript = self
            .asr
            .transcribe(&video)
            .await
            .map_err(|e| DubError::input(format!("transcription failed: {:#}", e)))?;
        if transcript.words.is_empty() {
            return Err(DubError::input("transcript has no words"));
        }
        self.save_transcript(&transcript, &paths.dir).await?;

        let chunker = TranscriptChunker::new(self.config.window_seconds)?
            .with_policy(self.config.boundary);
        let clips = chunker.chunk(&transcript.words, &voice_sample);
        if clips.is_empty() {
            return Err(DubError::input("no dialogue windows left after chunking"));
        }
        report(RunStage::Chunked { clips: clips.len() });

        let corrector =
            DurationCorrector::new(&self.media, &self.media).with_policy(self.config.correction);

        // Built up front; `buffered` runs at most N and yields in timeline order
        let renders: Vec<_> = clips
            .into_iter()
            .enumerate()
            .map(|(index, clip)| self.render_clip(index, clip, &paths.clips, &corrector, report))
            .collect();
        let rendered: Vec<(Clip, Correction)> = stream::iter(renders)
            .buffered(self.config.max_concurrent_clips)
            .try_collect()
            .await?;
        let (clips, corrections): (Vec<Clip>, Vec<Correction>) = rendered.into_iter().unzip();

        let video_duration = self
            .media
            .duration(&video)
            .await
            .map_err(|e| DubError::input(format!("cannot read video duration: {:#}", e)))?;

        report(RunStage::Assembling);
        let assembler = TimelineAssembler::new(self.config.sample_rate)?;
        let track_path = paths.dir.join("dub_track.wav");
        let (clips, track_duration) = {
            let track_path = track_path.clone();
            tokio::task::spawn_blocking(move || {
                let track = assembler.assemble(&clips, video_duration)?;
                track.write_wav(&track_path)?;
                Ok::<_, DubError>((clips, track.duration_secs()))
            })
            .await
            .map_err(|e| DubError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))??
        };

        report(RunStage::Muxing);
        self.media
            .mux(&video, &track_path, &request.output)
            .await
            .map_err(DubError::Mux)?;

        Ok(DubOutcome {
            output: request.output.clone(),
            transcript,
            clips,
            corrections,
            video_duration,
            track_duration,
            run_dir: None,
        })
    }

    async fn render_clip<P, S>(
        &self,
        index: usize,
        mut clip: Clip,
        clips_dir: &Path,
        corrector: &DurationCorrector<P, S>,
        report: &(dyn Fn(RunStage) + Send + Sync),
    ) -> DubResult<(Clip, Correction)>
    where
        P: DurationProbe,
        S: TempoStretcher,
    {
        let path = clips_dir.join(format!("clip_{}.wav", index));

        report(RunStage::Synthesizing { clip: index });
        self.cloner
            .synthesize(&clip.text, &clip.voice_sample, &path)
            .await
            .map_err(|source| DubError::Synthesis {
                clip: index,
                source,
            })?;

        report(RunStage::Correcting { clip: index });
        let correction = corrector
            .correct(&path, clip.window_duration())
            .await
            .map_err(|e| e.at_clip(index))?;

        clip.audio_path = Some(path);
        Ok((clip, correction))
    }

    async fn save_transcript(&self, transcript: &Transcript, dir: &Path) -> DubResult<()> {
        let path = dir.join("transcript.json");
        let json = serde_json::to_string_pretty(transcript)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        tokio::fs::write(&path, json).await?;
        info!(
            "[DUB] Transcript saved: {:?} ({} words)",
            path,
            transcript.words.len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_source_parse() {
        assert_eq!(
            VideoSource::parse("https://youtu.be/UF8uR6Z6KLc"),
            VideoSource::Url("https://youtu.be/UF8uR6Z6KLc".to_string())
        );
        assert_eq!(
            VideoSource::parse("HTTP://example.com/a.mp4"),
            VideoSource::Url("HTTP://example.com/a.mp4".to_string())
        );
        assert_eq!(
            VideoSource::parse("input/talk.mp4"),
            VideoSource::LocalFile(PathBuf::from("input/talk.mp4"))
        );
    }

    #[test]
    fn test_stage_display() {
        assert_eq!(RunStage::Synthesizing { clip: 4 }.to_string(), "synthesizing clip 4");
        assert_eq!(RunStage::Chunked { clips: 2 }.to_string(), "chunked (2 clips)");
    }
}

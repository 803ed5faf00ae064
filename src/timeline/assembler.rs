// SYNOID Timeline Assembler
// Copyright (c) 2026 Xing_The_Creator | SYNOID
//
// Rebuilds one continuous dub track from ordered clips. Silence fills every
// gap so each clip starts at its absolute video time. The cursor advances by
// the nominal window length, never by the decoded length, so a clip that could
// not be fitted only disturbs its own span.

use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::{audio, Clip};
use crate::error::{DubError, DubResult};

/// The assembled mono track.
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledTrack {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl AssembledTrack {
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Write the track as WAV. The file appears only once fully written.
    pub fn write_wav(&self, path: &Path) -> DubResult<PathBuf> {
        let dir = path.parent().unwrap_or(Path::new("."));
        std::fs::create_dir_all(dir)?;
        let scratch = tempfile::Builder::new()
            .prefix(".track_")
            .suffix(".wav")
            .tempfile_in(dir)?;

        audio::write_wav(scratch.path(), &self.samples, self.sample_rate)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, format!("{:#}", e)))?;
        scratch.persist(path).map_err(|e| e.error)?;

        info!(
            "[ASSEMBLER] Track written: {:?} ({:.2}s @ {} Hz)",
            path,
            self.duration_secs(),
            self.sample_rate
        );
        Ok(path.to_path_buf())
    }
}

#[derive(Debug, Clone)]
pub struct TimelineAssembler {
    sample_rate: u32,
}

impl TimelineAssembler {
    pub fn new(sample_rate: u32) -> DubResult<Self> {
        if sample_rate == 0 {
            return Err(DubError::input("assembly sample rate must be non-zero"));
        }
        Ok(Self { sample_rate })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Merge `clips` (ordered, each with a rendered audio file) into a track
    /// spanning at least `video_duration` seconds.
    pub fn assemble(&self, clips: &[Clip], video_duration: f64) -> DubResult<AssembledTrack> {
        // Every file must be present before any work is done
        for (index, clip) in clips.iter().enumerate() {
            let path = clip_audio(index, clip)?;
            if !path.is_file() {
                return Err(DubError::Assembly {
                    clip: index,
                    path: path.to_path_buf(),
                    reason: "rendered audio file is missing".to_string(),
                });
            }
        }

        let mut out: Vec<f32> = Vec::new();
        let mut cursor = 0.0f64;

        for (index, clip) in clips.iter().enumerate() {
            let path = clip_audio(index, clip)?;

            if clip.window_start > cursor {
                let gap = self.pad_silence(&mut out, cursor, clip.window_start);
                debug!(
                    "[ASSEMBLER] {:.3}s silence before clip {} ({} samples)",
                    clip.window_start - cursor,
                    index,
                    gap
                );
                cursor = clip.window_start;
            }

            let samples = audio::load_mono(path, self.sample_rate).map_err(|e| {
                DubError::Assembly {
                    clip: index,
                    path: path.to_path_buf(),
                    reason: format!("{:#}", e),
                }
            })?;
            debug!(
                "[ASSEMBLER] Clip {} @ {:.3}s: {:.3}s audio for a {:.3}s window",
                index,
                clip.window_start,
                samples.len() as f64 / self.sample_rate as f64,
                clip.window_duration()
            );
            out.extend_from_slice(&samples);
            cursor += clip.window_duration();
        }

        if video_duration > cursor {
            self.pad_silence(&mut out, cursor, video_duration);
        }
        // Clips that rendered short leave the buffer behind the cursor
        let floor = self.to_samples(video_duration).max(self.to_samples(cursor));
        if out.len() < floor {
            debug!(
                "[ASSEMBLER] Extending track by {} samples to cover the video",
                floor - out.len()
            );
            out.resize(floor, 0.0);
        }

        let track = AssembledTrack {
            samples: out,
            sample_rate: self.sample_rate,
        };
        info!(
            "[ASSEMBLER] Assembled {} clips into {:.3}s (video {:.3}s)",
            clips.len(),
            track.duration_secs(),
            video_duration
        );
        Ok(track)
    }

    /// Append silence for `from..to` seconds. Lengths come from absolute
    /// sample positions so rounding never accumulates across gaps.
    fn pad_silence(&self, out: &mut Vec<f32>, from: f64, to: f64) -> usize {
        let n = self.to_samples(to).saturating_sub(self.to_samples(from));
        out.resize(out.len() + n, 0.0);
        n
    }

    fn to_samples(&self, secs: f64) -> usize {
        (secs.max(0.0) * self.sample_rate as f64).round() as usize
    }
}

fn clip_audio(index: usize, clip: &Clip) -> DubResult<&Path> {
    clip.audio_path().ok_or_else(|| DubError::Assembly {
        clip: index,
        path: PathBuf::new(),
        reason: "clip was never synthesized".to_string(),
    })
}

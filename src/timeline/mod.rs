// SYNOID Dub Timeline - Shared Data Model
// Copyright (c) 2026 Xing_The_Creator | SYNOID
//
// Words come from the ASR collaborator, clips are windows of words mapped
// onto absolute video time. Everything downstream reads these types.

pub mod assembler;
pub mod audio;
pub mod chunker;
pub mod corrector;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{DubError, DubResult};

pub use assembler::{AssembledTrack, TimelineAssembler};
pub use chunker::{BoundaryPolicy, TranscriptChunker};
pub use corrector::{Correction, CorrectionPolicy, DurationCorrector};

/// One recognized word with absolute timestamps in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Word {
    #[serde(alias = "word")]
    pub text: String,
    pub start: f64,
    pub end: f64,
}

impl Word {
    pub fn new(text: impl Into<String>, start: f64, end: f64) -> Self {
        Self {
            text: text.into(),
            start,
            end,
        }
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    pub fn midpoint(&self) -> f64 {
        (self.start + self.end) / 2.0
    }
}

/// Word-level transcript, ordered by `start`. Read-only once built.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Word>", into = "Vec<Word>")]
pub struct WordTimeline {
    words: Vec<Word>,
}

impl WordTimeline {
    /// Validate and order the words. ASR output may carry small overlaps
    /// between neighbours; those are kept as-is.
    pub fn new(mut words: Vec<Word>) -> DubResult<Self> {
        for (i, w) in words.iter().enumerate() {
            if !w.start.is_finite() || !w.end.is_finite() {
                return Err(DubError::input(format!(
                    "word {} ({:?}) has a non-finite timestamp",
                    i, w.text
                )));
            }
            if w.start < 0.0 || w.start > w.end {
                return Err(DubError::input(format!(
                    "word {} ({:?}) has invalid span {:.3}..{:.3}",
                    i, w.text, w.start, w.end
                )));
            }
        }
        words.sort_by(|a, b| a.start.total_cmp(&b.start));
        Ok(Self { words })
    }

    pub fn words(&self) -> &[Word] {
        &self.words
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// End of the last word in timeline order.
    pub fn last_word_end(&self) -> Option<f64> {
        self.words.last().map(|w| w.end)
    }
}

impl TryFrom<Vec<Word>> for WordTimeline {
    type Error = DubError;

    fn try_from(words: Vec<Word>) -> Result<Self, Self::Error> {
        Self::new(words)
    }
}

impl From<WordTimeline> for Vec<Word> {
    fn from(timeline: WordTimeline) -> Self {
        timeline.words
    }
}

/// ASR output: the full text plus its word timeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Transcript {
    pub text: String,
    pub words: WordTimeline,
}

/// One window of dialogue mapped to an absolute span of the video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clip {
    pub text: String,
    pub window_start: f64,
    pub window_end: f64,
    pub audio_path: Option<PathBuf>,
    pub voice_sample: PathBuf,
}

impl Clip {
    /// Nominal length of the window, the amount of video time this clip owns.
    pub fn window_duration(&self) -> f64 {
        self.window_end - self.window_start
    }

    pub fn audio_path(&self) -> Option<&Path> {
        self.audio_path.as_deref()
    }
}

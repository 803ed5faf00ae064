// SYNOID Dub Errors
// Copyright (c) 2026 Xing_The_Creator | SYNOID
//
// Every failure in a dub run is fatal. Errors carry the clip index and the
// run stage so the caller can tell exactly where the pipeline stopped.

use std::path::PathBuf;
use thiserror::Error;

use crate::agent::dub_pipeline::RunStage;

pub type DubResult<T> = Result<T, DubError>;

#[derive(Debug, Error)]
pub enum DubError {
    /// Missing or invalid video, voice sample, transcript or configuration.
    #[error("input error: {0}")]
    Input(String),

    #[error("voice synthesis failed for clip {clip}: {source:#}")]
    Synthesis {
        clip: usize,
        #[source]
        source: anyhow::Error,
    },

    /// The original clip file is still intact when this is raised.
    #[error("duration correction failed for {} (clip {}): {source:#}", path.display(), fmt_clip(*clip))]
    Correction {
        clip: Option<usize>,
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("assembly failed at clip {clip} ({}): {reason}", path.display())]
    Assembly {
        clip: usize,
        path: PathBuf,
        reason: String,
    },

    #[error("mux failed: {0:#}")]
    Mux(#[source] anyhow::Error),

    #[error("dub run cancelled")]
    Cancelled,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

fn fmt_clip(clip: Option<usize>) -> String {
    clip.map(|c| c.to_string()).unwrap_or_else(|| "?".to_string())
}

impl DubError {
    pub fn input(msg: impl Into<String>) -> Self {
        Self::Input(msg.into())
    }

    /// Attach the clip index to an error raised below the pipeline layer.
    pub fn at_clip(self, index: usize) -> Self {
        match self {
            Self::Correction { path, source, .. } => Self::Correction {
                clip: Some(index),
                path,
                source,
            },
            other => other,
        }
    }

    /// Stage of the run this error belongs to.
    pub fn stage(&self) -> RunStage {
        match self {
            Self::Input(_) | Self::Io(_) | Self::Cancelled => RunStage::Preparing,
            Self::Synthesis { clip, .. } => RunStage::Synthesizing { clip: *clip },
            Self::Correction { clip, .. } => RunStage::Correcting {
                clip: clip.unwrap_or_default(),
            },
            Self::Assembly { .. } => RunStage::Assembling,
            Self::Mux(_) => RunStage::Muxing,
        }
    }
}

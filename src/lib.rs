// SYNOID Dub
// Copyright (c) 2026 Xing_The_Creator | SYNOID
//
// Re-dubs a video into a cloned voice. The timeline engine (chunking,
// duration correction, assembly) keeps every line of dialogue at the video
// time it was originally spoken.

pub mod agent;
pub mod config;
pub mod error;
pub mod timeline;

pub use agent::collaborators::{DurationProbe, Muxer, SpeechRecognizer, TempoStretcher, VoiceCloner};
pub use agent::dub_job::{DubJob, JobStatus};
pub use agent::dub_pipeline::{
    DubOutcome, DubPipeline, DubRequest, ProgressCallback, RunStage, VideoSource,
};
pub use agent::production_tools::{FfmpegToolkit, WavDurationProbe};
pub use agent::transcription::WhisperSession;
pub use agent::voice::VoiceCloneSession;
pub use config::{init_logging, DubConfig};
pub use error::{DubError, DubResult};
pub use timeline::{
    AssembledTrack, BoundaryPolicy, Clip, Correction, CorrectionPolicy, DurationCorrector,
    TimelineAssembler, Transcript, TranscriptChunker, Word, WordTimeline,
};

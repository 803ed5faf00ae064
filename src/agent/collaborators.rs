// SYNOID Dub Collaborator Contracts
// Copyright (c) 2026 Xing_The_Creator | SYNOID
//
// The timeline engine never runs models or codecs itself. It talks to these
// seams; the concrete sessions live in transcription.rs, voice/ and
// production_tools.rs.

use anyhow::Result;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use crate::timeline::Transcript;

/// Speech recognition with word-level timestamps.
pub trait SpeechRecognizer {
    fn transcribe(&self, video_path: &Path) -> impl Future<Output = Result<Transcript>> + Send;
}

/// Voice cloning: render `text` in the voice of `voice_sample` to `output_path`.
/// No duration guarantee.
pub trait VoiceCloner {
    fn synthesize(
        &self,
        text: &str,
        voice_sample: &Path,
        output_path: &Path,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// Duration of an audio or video file in seconds.
pub trait DurationProbe {
    fn duration(&self, path: &Path) -> impl Future<Output = Result<f64>> + Send;
}

/// Pitch-preserving tempo change. `rate > 1` plays faster (shorter output).
pub trait TempoStretcher {
    fn stretch(
        &self,
        input: &Path,
        rate: f64,
        output: &Path,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// Replace the audio stream of `video` with `audio`, copying video untouched.
pub trait Muxer {
    fn mux(
        &self,
        video: &Path,
        audio: &Path,
        output: &Path,
    ) -> impl Future<Output = Result<()>> + Send;
}

macro_rules! forward_through {
    ($($wrapper:ty),*) => {$(
        impl<T: DurationProbe + Send + Sync + ?Sized> DurationProbe for $wrapper {
            fn duration(&self, path: &Path) -> impl Future<Output = Result<f64>> + Send {
                (**self).duration(path)
            }
        }

        impl<T: TempoStretcher + Send + Sync + ?Sized> TempoStretcher for $wrapper {
            fn stretch(
                &self,
                input: &Path,
                rate: f64,
                output: &Path,
            ) -> impl Future<Output = Result<()>> + Send {
                (**self).stretch(input, rate, output)
            }
        }
    )*};
}

forward_through!(&T, Arc<T>);

// SYNOID Dub Job
// Copyright (c) 2026 Xing_The_Creator | SYNOID
//
// A dub run in the background: pollable status, awaitable result and
// cancellation. Cancelling drops the run, which kills any ffmpeg / yt-dlp
// child it had in flight.

use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::agent::collaborators::{DurationProbe, Muxer, SpeechRecognizer, TempoStretcher, VoiceCloner};
use crate::agent::dub_pipeline::{DubOutcome, DubPipeline, DubRequest, RunStage};
use crate::error::{DubError, DubResult};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum JobStatus {
    Queued,
    Running(RunStage),
    Completed { output: PathBuf, duration_secs: f64 },
    Failed { stage: RunStage, error: String },
    Cancelled,
}

impl JobStatus {
    pub fn is_finished(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed { .. } | JobStatus::Failed { .. } | JobStatus::Cancelled
        )
    }
}

pub struct DubJob {
    id: Uuid,
    status: Arc<watch::Sender<JobStatus>>,
    handle: JoinHandle<DubResult<DubOutcome>>,
}

impl DubJob {
    /// Start `request` on the runtime and return immediately.
    pub fn spawn<A, V, M>(pipeline: Arc<DubPipeline<A, V, M>>, request: DubRequest) -> Self
    where
        A: SpeechRecognizer + Send + Sync + 'static,
        V: VoiceCloner + Send + Sync + 'static,
        M: DurationProbe + TempoStretcher + Muxer + Send + Sync + 'static,
    {
        let id = Uuid::new_v4();
        let (tx, _rx) = watch::channel(JobStatus::Queued);
        let status = Arc::new(tx);
        info!("[JOB] Queued dub job {}: {:?}", id, request.source);

        let worker_status = status.clone();
        let handle = tokio::spawn(async move {
            let started = Instant::now();
            let observer_status = worker_status.clone();
            let result = pipeline
                .run_observed(request, move |stage| {
                    observer_status.send_replace(JobStatus::Running(*stage));
                })
                .await;

            match &result {
                Ok(outcome) => {
                    let duration_secs = started.elapsed().as_secs_f64();
                    info!("[JOB] Job {} completed in {:.1}s", id, duration_secs);
                    worker_status.send_replace(JobStatus::Completed {
                        output: outcome.output.clone(),
                        duration_secs,
                    });
                }
                Err(e) => {
                    // Last reported stage is where the run actually stopped
                    let stage = match *worker_status.borrow() {
                        JobStatus::Running(stage) => stage,
                        _ => e.stage(),
                    };
                    error!("[JOB] Job {} failed while {}: {}", id, stage, e);
                    worker_status.send_replace(JobStatus::Failed {
                        stage,
                        error: e.to_string(),
                    });
                }
            }
            result
        });

        Self { id, status, handle }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn status(&self) -> JobStatus {
        self.status.borrow().clone()
    }

    /// Receiver notified on every status change.
    pub fn subscribe(&self) -> watch::Receiver<JobStatus> {
        self.status.subscribe()
    }

    /// Abort the run. A job that already finished keeps its final status.
    pub fn cancel(&self) {
        self.handle.abort();
        let changed = self.status.send_if_modified(|status| {
            if status.is_finished() {
                false
            } else {
                *status = JobStatus::Cancelled;
                true
            }
        });
        if changed {
            warn!("[JOB] Job {} cancelled", self.id);
        }
    }

    pub async fn wait(self) -> DubResult<DubOutcome> {
        match self.handle.await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Err(DubError::Cancelled),
            Err(e) => Err(DubError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("dub job {} panicked: {}", self.id, e),
            ))),
        }
    }
}

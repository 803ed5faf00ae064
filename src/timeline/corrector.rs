// SYNOID Duration Corrector
// Copyright (c) 2026 Xing_The_Creator | SYNOID
//
// Fits a rendered clip to its video window with a pitch-preserving tempo
// change. Stretching goes to a scratch file next to the clip and is renamed
// over the original only once it succeeded.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info, warn};

use crate::agent::collaborators::{DurationProbe, TempoStretcher};
use crate::error::{DubError, DubResult};

/// Thresholds controlling when a clip is stretched.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrectionPolicy {
    /// Renders at or below this length are treated as degenerate.
    pub min_render_secs: f64,
    /// Drift at or below this is left alone.
    pub tolerance_secs: f64,
    pub min_rate: f64,
    pub max_rate: f64,
}

impl Default for CorrectionPolicy {
    fn default() -> Self {
        Self {
            min_render_secs: 0.1,
            tolerance_secs: 0.05,
            min_rate: 0.5,
            max_rate: 2.0,
        }
    }
}

/// What the corrector did to a clip.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Correction {
    /// Render too short to be meaningful.
    Degenerate { actual: f64 },
    WithinTolerance { actual: f64 },
    /// Required ratio is outside the allowed band; clip kept at natural length.
    OutOfRange { actual: f64, rate: f64 },
    Stretched { actual: f64, rate: f64 },
}

impl Correction {
    pub fn modified(&self) -> bool {
        matches!(self, Correction::Stretched { .. })
    }
}

pub struct DurationCorrector<P, S> {
    probe: P,
    stretcher: S,
    policy: CorrectionPolicy,
}

impl<P: DurationProbe, S: TempoStretcher> DurationCorrector<P, S> {
    pub fn new(probe: P, stretcher: S) -> Self {
        Self {
            probe,
            stretcher,
            policy: CorrectionPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: CorrectionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Decide what to do with a clip of `actual` seconds aimed at `target`.
    pub fn plan(&self, actual: f64, target: f64) -> Correction {
        let p = &self.policy;
        if actual <= p.min_render_secs {
            return Correction::Degenerate { actual };
        }
        // Probed durations carry float noise; a drift of exactly the tolerance is within it
        if (actual - target).abs() <= p.tolerance_secs + 1e-9 {
            return Correction::WithinTolerance { actual };
        }
        let rate = if target > 0.0 { actual / target } else { f64::INFINITY };
        if rate >= p.min_rate && rate <= p.max_rate {
            Correction::Stretched { actual, rate }
        } else {
            Correction::OutOfRange { actual, rate }
        }
    }

    /// Measure the clip and stretch it in place when the plan calls for it.
    pub async fn correct(&self, rendered: &Path, target_secs: f64) -> DubResult<Correction> {
        let actual = self
            .probe
            .duration(rendered)
            .await
            .map_err(|source| correction_error(rendered, source))?;

        let plan = self.plan(actual, target_secs);
        match plan {
            Correction::Degenerate { actual } => {
                warn!(
                    "[CORRECTOR] {:?} rendered only {:.3}s, leaving as-is",
                    rendered, actual
                );
            }
            Correction::WithinTolerance { actual } => {
                debug!(
                    "[CORRECTOR] {:?} is {:.3}s for a {:.3}s window, within tolerance",
                    rendered, actual, target_secs
                );
            }
            Correction::OutOfRange { actual, rate } => {
                warn!(
                    "[CORRECTOR] {:?} needs rate {:.2} ({:.2}s -> {:.2}s), outside {:.1}..{:.1}; using natural length",
                    rendered, rate, actual, target_secs, self.policy.min_rate, self.policy.max_rate
                );
            }
            Correction::Stretched { actual, rate } => {
                info!(
                    "[CORRECTOR] Stretching {:?} {:.2}s -> {:.2}s (atempo {:.3})",
                    rendered, actual, target_secs, rate
                );
                self.stretch_in_place(rendered, rate).await?;
            }
        }
        Ok(plan)
    }

    async fn stretch_in_place(&self, rendered: &Path, rate: f64) -> DubResult<()> {
        let dir = rendered.parent().unwrap_or(Path::new("."));
        let suffix = rendered
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{}", e))
            .unwrap_or_else(|| ".wav".to_string());

        // Removed on drop unless persisted
        let scratch = tempfile::Builder::new()
            .prefix(".stretch_")
            .suffix(&suffix)
            .tempfile_in(dir)
            .map_err(|e| correction_error(rendered, e.into()))?;

        self.stretcher
            .stretch(rendered, rate, scratch.path())
            .await
            .map_err(|source| correction_error(rendered, source))?;

        let written = std::fs::metadata(scratch.path())
            .map(|m| m.len())
            .unwrap_or(0);
        if written == 0 {
            return Err(correction_error(
                rendered,
                anyhow::anyhow!("stretch produced an empty file"),
            ));
        }

        scratch
            .persist(rendered)
            .map_err(|e| correction_error(rendered, e.error.into()))?;
        Ok(())
    }
}

fn correction_error(path: &Path, source: anyhow::Error) -> DubError {
    DubError::Correction {
        clip: None,
        path: path.to_path_buf(),
        source,
    }
}

// SYNOID Transcript Chunker
// Copyright (c) 2026 Xing_The_Creator | SYNOID
//
// Walks the word timeline in fixed windows and turns each non-empty window
// into one Clip. Pure function of (timeline, window, policy).

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::{Clip, Word, WordTimeline};
use crate::error::{DubError, DubResult};

/// Which words a window claims.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryPolicy {
    /// A word belongs to a window only if it lies fully inside it. Words that
    /// straddle every boundary they meet are dropped.
    #[default]
    FullyContained,
    /// A word belongs to the window holding its midpoint. Nothing is dropped.
    Midpoint,
}

#[derive(Debug, Clone)]
pub struct TranscriptChunker {
    window_seconds: f64,
    policy: BoundaryPolicy,
}

impl TranscriptChunker {
    pub fn new(window_seconds: f64) -> DubResult<Self> {
        if !window_seconds.is_finite() || window_seconds <= 0.0 {
            return Err(DubError::input(format!(
                "chunk window must be a positive number of seconds, got {}",
                window_seconds
            )));
        }
        Ok(Self {
            window_seconds,
            policy: BoundaryPolicy::default(),
        })
    }

    pub fn with_policy(mut self, policy: BoundaryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn window_seconds(&self) -> f64 {
        self.window_seconds
    }

    /// Split the timeline into clips, each voiced with `default_voice_sample`.
    pub fn chunk(&self, timeline: &WordTimeline, default_voice_sample: &Path) -> Vec<Clip> {
        let words = timeline.words();
        let Some(last_end) = timeline.last_word_end() else {
            return Vec::new();
        };

        let mut taken = vec![false; words.len()];
        let mut clips = Vec::new();
        let mut window = 0u64;

        loop {
            // Skip straight past runs of empty windows
            let next_home = words
                .iter()
                .zip(&taken)
                .filter(|(_, taken)| !**taken)
                .map(|(w, _)| self.home_window(w))
                .filter(|&home| home + 1 >= window)
                .min();
            match next_home {
                Some(home) => window = window.max(home.saturating_sub(1)),
                None => break,
            }

            let t = window as f64 * self.window_seconds;
            if t >= last_end {
                break;
            }
            let t_end = t + self.window_seconds;

            let selected: Vec<usize> = words
                .iter()
                .enumerate()
                .filter(|(i, w)| !taken[*i] && self.claims(w, t, t_end))
                .map(|(i, _)| i)
                .collect();

            window += 1;

            if selected.is_empty() {
                debug!("[CHUNKER] Window {:.2}s..{:.2}s is silent", t, t_end);
                continue;
            }

            for &i in &selected {
                taken[i] = true;
            }
            clips.push(build_clip(words, &selected, default_voice_sample));
        }

        let dropped = taken.iter().filter(|t| !**t).count();
        if dropped > 0 {
            warn!(
                "[CHUNKER] {} word(s) straddle every {:.1}s window boundary and were dropped",
                dropped, self.window_seconds
            );
        }
        info!(
            "[CHUNKER] {} words -> {} clips ({:.1}s windows, {:?})",
            words.len(),
            clips.len(),
            self.window_seconds,
            self.policy
        );

        clips
    }

    /// Index of the only window that can claim `word`, up to float rounding
    /// at the boundary (hence the one-window slack at the call site).
    fn home_window(&self, word: &Word) -> u64 {
        let anchor = match self.policy {
            BoundaryPolicy::FullyContained => word.start,
            BoundaryPolicy::Midpoint => word.midpoint(),
        };
        (anchor / self.window_seconds).floor() as u64
    }

    fn claims(&self, word: &Word, t: f64, t_end: f64) -> bool {
        match self.policy {
            BoundaryPolicy::FullyContained => word.start >= t && word.end <= t_end,
            BoundaryPolicy::Midpoint => {
                let mid = word.midpoint();
                mid >= t && mid < t_end
            }
        }
    }
}

fn build_clip(words: &[Word], selected: &[usize], voice_sample: &Path) -> Clip {
    let text = selected
        .iter()
        .map(|&i| words[i].text.trim())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    Clip {
        text,
        window_start: words[selected[0]].start,
        window_end: words[selected[selected.len() - 1]].end,
        audio_path: None,
        voice_sample: PathBuf::from(voice_sample),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn timeline(words: &[(&str, f64, f64)]) -> WordTimeline {
        WordTimeline::new(
            words
                .iter()
                .map(|(t, s, e)| Word::new(*t, *s, *e))
                .collect(),
        )
        .unwrap()
    }

    fn sample() -> PathBuf {
        PathBuf::from("voice.wav")
    }

    #[test]
    fn test_hi_there_bye_scenario() {
        let tl = timeline(&[("hi", 0.0, 0.4), ("there", 0.5, 0.9), ("bye", 12.0, 12.3)]);
        let clips = TranscriptChunker::new(10.0).unwrap().chunk(&tl, &sample());

        assert_eq!(clips.len(), 2);
        assert_eq!(clips[0].text, "hi there");
        assert_eq!(clips[0].window_start, 0.0);
        assert_eq!(clips[0].window_end, 0.9);
        assert_eq!(clips[1].text, "bye");
        assert_eq!(clips[1].window_start, 12.0);
        assert_eq!(clips[1].window_end, 12.3);
        assert!(clips.iter().all(|c| c.voice_sample == sample()));
        assert!(clips.iter().all(|c| c.audio_path.is_none()));
    }

    #[test]
    fn test_silence_gap_produces_no_clip() {
        // 5..35 is silent, longer than three windows
        let tl = timeline(&[("a", 1.0, 2.0), ("b", 36.0, 37.0)]);
        let clips = TranscriptChunker::new(10.0).unwrap().chunk(&tl, &sample());
        assert_eq!(clips.len(), 2);
        assert_eq!(clips[0].text, "a");
        assert_eq!(clips[1].text, "b");
    }

    #[test]
    fn test_straddling_word_is_dropped() {
        // "mid" crosses the 10s boundary and never fits a window
        let tl = timeline(&[("a", 1.0, 2.0), ("mid", 9.5, 10.5), ("c", 11.0, 12.0)]);
        let clips = TranscriptChunker::new(10.0).unwrap().chunk(&tl, &sample());
        let all_text: Vec<&str> = clips.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(all_text, vec!["a", "c"]);
    }

    #[test]
    fn test_midpoint_policy_keeps_straddling_word() {
        let tl = timeline(&[("a", 1.0, 2.0), ("mid", 9.5, 10.3), ("c", 11.0, 12.0)]);
        let clips = TranscriptChunker::new(10.0)
            .unwrap()
            .with_policy(BoundaryPolicy::Midpoint)
            .chunk(&tl, &sample());
        assert_eq!(clips.len(), 2);
        assert_eq!(clips[0].text, "a mid");
        assert_eq!(clips[0].window_end, 10.3);
        assert_eq!(clips[1].text, "c");
    }

    #[test]
    fn test_word_longer_than_window_is_dropped_not_fatal() {
        let tl = timeline(&[("loooong", 0.0, 25.0), ("ok", 26.0, 27.0)]);
        let clips = TranscriptChunker::new(10.0).unwrap().chunk(&tl, &sample());
        assert_eq!(clips.len(), 1);
        assert_eq!(clips[0].text, "ok");
    }

    #[test]
    fn test_zero_length_boundary_word_assigned_once() {
        let tl = timeline(&[("a", 1.0, 2.0), ("tick", 10.0, 10.0), ("b", 11.0, 12.0)]);
        let clips = TranscriptChunker::new(10.0).unwrap().chunk(&tl, &sample());
        let ticks = clips.iter().filter(|c| c.text.contains("tick")).count();
        assert_eq!(ticks, 1);
    }

    #[test]
    fn test_coverage_and_strict_ordering() {
        // Dense synthetic speech with tiny ASR overlaps
        let mut words = Vec::new();
        let mut t = 0.3;
        for i in 0..400 {
            let len = 0.2 + (i % 7) as f64 * 0.05;
            words.push(Word::new(format!("w{}", i), t, t + len));
            t += len - 0.01;
            if i % 50 == 49 {
                t += 13.0; // long pause
            }
        }
        let tl = WordTimeline::new(words).unwrap();

        for window in [0.7, 3.0, 10.0, 30.0] {
            let clips = TranscriptChunker::new(window).unwrap().chunk(&tl, &sample());

            let mut seen = HashSet::new();
            for clip in &clips {
                for token in clip.text.split(' ') {
                    assert!(tl.words().iter().any(|w| w.text == token));
                    assert!(seen.insert(token.to_string()), "{} emitted twice", token);
                }
            }
            for pair in clips.windows(2) {
                assert!(pair[0].window_start < pair[1].window_start);
                assert!(pair[0].window_end <= pair[1].window_start + 0.011);
            }
        }
    }

    #[test]
    fn test_tiny_window_over_long_silence_finishes() {
        let tl = timeline(&[
            ("a", 0.000_000_2, 0.000_000_5),
            ("b", 3_600.000_000_2, 3_600.000_000_5),
            ("c", 7_200.000_000_2, 7_200.000_000_5),
        ]);
        for policy in [BoundaryPolicy::FullyContained, BoundaryPolicy::Midpoint] {
            let clips = TranscriptChunker::new(1e-6)
                .unwrap()
                .with_policy(policy)
                .chunk(&tl, &sample());
            let texts: Vec<&str> = clips.iter().map(|c| c.text.as_str()).collect();
            assert_eq!(texts, vec!["a", "b", "c"], "{:?}", policy);
        }
    }

    #[test]
    fn test_skipping_matches_window_walk() {
        // Gaps of many windows between words, one straddler at 20.0
        let tl = timeline(&[
            ("one", 0.2, 0.6),
            ("two", 31.1, 31.4),
            ("edge", 19.9, 20.1),
            ("three", 95.0, 95.5),
        ]);
        let clips = TranscriptChunker::new(2.0).unwrap().chunk(&tl, &sample());
        let spans: Vec<(&str, f64, f64)> = clips
            .iter()
            .map(|c| (c.text.as_str(), c.window_start, c.window_end))
            .collect();
        assert_eq!(
            spans,
            vec![("one", 0.2, 0.6), ("two", 31.1, 31.4), ("three", 95.0, 95.5)]
        );
    }

    #[test]
    fn test_deterministic() {
        let tl = timeline(&[("x", 0.1, 0.5), ("y", 4.0, 4.2), ("z", 8.8, 9.9)]);
        let chunker = TranscriptChunker::new(3.0).unwrap();
        assert_eq!(chunker.chunk(&tl, &sample()), chunker.chunk(&tl, &sample()));
    }

    #[test]
    fn test_empty_timeline_and_bad_window() {
        let clips = TranscriptChunker::new(10.0)
            .unwrap()
            .chunk(&WordTimeline::default(), &sample());
        assert!(clips.is_empty());

        assert!(TranscriptChunker::new(0.0).is_err());
        assert!(TranscriptChunker::new(-5.0).is_err());
        assert!(TranscriptChunker::new(f64::INFINITY).is_err());
    }
}

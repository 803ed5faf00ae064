use std::path::Path;
use std::process::Command;
use synoid_dub::agent::collaborators::{DurationProbe, Muxer, TempoStretcher};
use synoid_dub::agent::production_tools::{self, FfmpegToolkit};
use synoid_dub::agent::source_tools;
use synoid_dub::timeline::{audio, DurationCorrector};

fn ffmpeg_available() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
        && Command::new("ffprobe")
            .arg("-version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
}

fn make_test_video(path: &Path, secs: u32) {
    // testsrc generates a test pattern, sine gives it an audio track to replace
    let output = Command::new("ffmpeg")
        .args(["-y", "-f", "lavfi", "-i"])
        .arg(format!("testsrc=duration={}:size=320x240:rate=25", secs))
        .args(["-f", "lavfi", "-i"])
        .arg(format!("sine=frequency=440:duration={}", secs))
        .args(["-c:v", "mpeg4", "-c:a", "aac", "-shortest"])
        .arg(path)
        .output()
        .expect("Failed to execute ffmpeg");
    if !output.status.success() {
        panic!(
            "Failed to create dummy video: {}",
            String::from_utf8_lossy(&output.stderr)
        );
    }
}

fn tone(secs: f64, sr: u32) -> Vec<f32> {
    (0..(secs * sr as f64) as usize)
        .map(|i| (i as f32 * 0.05).sin() * 0.5)
        .collect()
}

#[tokio::test]
async fn test_atempo_stretch_fits_window() {
    if !ffmpeg_available() {
        println!("ffmpeg not installed, skipping");
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let clip = dir.path().join("clip_0.wav");
    audio::write_wav(&clip, &tone(3.0, 22_050), 22_050).unwrap();

    let toolkit = FfmpegToolkit::new();
    let corrector = DurationCorrector::new(&toolkit, &toolkit);
    let outcome = corrector.correct(&clip, 2.0).await.unwrap();
    assert!(outcome.modified());

    let after = toolkit.duration(&clip).await.unwrap();
    assert!((after - 2.0).abs() < 0.1, "Duration should be approx 2.0s, got {}", after);
}

#[tokio::test]
async fn test_stretch_to_missing_input_fails() {
    if !ffmpeg_available() {
        println!("ffmpeg not installed, skipping");
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let result = FfmpegToolkit::new()
        .stretch(&dir.path().join("nope.wav"), 1.2, &dir.path().join("out.wav"))
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_mux_replaces_audio_and_keeps_video_length() {
    if !ffmpeg_available() {
        println!("ffmpeg not installed, skipping");
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let video = dir.path().join("input.mp4");
    make_test_video(&video, 4);

    let track = dir.path().join("dub_track.wav");
    audio::write_wav(&track, &tone(4.0, 44_100), 44_100).unwrap();

    let output = dir.path().join("out/dubbed.mp4");
    let result = FfmpegToolkit::new()
        .mux_video_with_audio(&video, &track, &output)
        .await
        .expect("mux failed");
    assert!(result.output_path.exists());
    assert!(result.size_mb > 0.0);

    let duration = source_tools::get_media_duration(&output).await.unwrap();
    assert!((duration - 4.0).abs() < 0.5, "got {}", duration);

    // Only the output is left in its directory, no scratch files
    let entries = std::fs::read_dir(dir.path().join("out")).unwrap().count();
    assert_eq!(entries, 1);
}

#[tokio::test]
async fn test_failed_mux_leaves_no_output() {
    if !ffmpeg_available() {
        println!("ffmpeg not installed, skipping");
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let video = dir.path().join("not_a_video.mp4");
    std::fs::write(&video, b"garbage").unwrap();
    let track = dir.path().join("dub_track.wav");
    audio::write_wav(&track, &tone(1.0, 8_000), 8_000).unwrap();

    let output = dir.path().join("dubbed.mp4");
    let result = FfmpegToolkit::new().mux(&video, &track, &output).await;
    assert!(result.is_err());
    assert!(!output.exists());
}

#[tokio::test]
async fn test_extract_audio_for_asr() {
    if !ffmpeg_available() {
        println!("ffmpeg not installed, skipping");
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let video = dir.path().join("talk.mp4");
    make_test_video(&video, 2);

    let wav = dir.path().join("asr.wav");
    production_tools::extract_audio_for_asr(&video, &wav).await.unwrap();

    let reader = hound::WavReader::open(&wav).unwrap();
    assert_eq!(reader.spec().sample_rate, 16_000);
    assert_eq!(reader.spec().channels, 1);
}

// SYNOID Source Tools - Video Acquisition
// Copyright (c) 2026 Xing_The_Creator | SYNOID
//
// This module currently handles:
// 1. Source URL screening
// 2. YouTube (or any yt-dlp supported site) downloading into a run directory
// 3. Media duration extraction via ffprobe

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{info, warn};
use url::Url;

use crate::agent::production_tools::safe_arg_path;

#[derive(Debug, Clone)]
pub struct SourceInfo {
    pub title: String,
    pub duration: f64,
    pub local_path: PathBuf,
    pub original_url: Option<String>,
}

/// Only plain web URLs are handed to yt-dlp.
pub fn validate_source_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw).with_context(|| format!("Invalid source URL: {}", raw))?;
    match url.scheme() {
        "https" | "http" => {}
        other => anyhow::bail!("Unsupported URL scheme '{}' in {}", other, raw),
    }
    if url.host_str().is_none() {
        anyhow::bail!("Source URL has no host: {}", raw);
    }
    Ok(url)
}

/// Find a runnable yt-dlp: the standalone binary first, then `python3 -m yt_dlp`.
pub async fn get_ytdlp_command() -> Vec<String> {
    for bin in ["yt-dlp", "/usr/local/bin/yt-dlp", "/usr/bin/yt-dlp"] {
        if let Ok(output) = Command::new(bin).arg("--version").output().await {
            if output.status.success() {
                info!("[SOURCE] ✅ Found standalone 'yt-dlp' binary at '{}'", bin);
                return vec![bin.to_string()];
            }
        }
    }

    for python in ["python3", "python", "py"] {
        let ok = Command::new(python)
            .args(["-m", "yt_dlp", "--version"])
            .output()
            .await
            .map(|o| o.status.success())
            .unwrap_or(false);
        if ok {
            info!("[SOURCE] ✅ Found valid Python with yt-dlp module: '{}'", python);
            return vec![python.to_string(), "-m".to_string(), "yt_dlp".to_string()];
        }
    }

    warn!("[SOURCE] ⚠️ No yt-dlp found. Defaulting to 'yt-dlp' which may fail.");
    vec!["yt-dlp".to_string()]
}

fn build_ytdlp_info_args(url: &Url) -> Vec<String> {
    vec![
        "--print".to_string(),
        "%(title)s".to_string(),
        "--print".to_string(),
        "%(duration)s".to_string(),
        "--no-download".to_string(),
        "--".to_string(),
        url.to_string(),
    ]
}

fn build_ytdlp_download_args(url: &Url, output_path: &Path) -> Vec<String> {
    vec![
        "-f".to_string(),
        "bestvideo+bestaudio/best".to_string(),
        "--merge-output-format".to_string(),
        "mp4".to_string(),
        "-o".to_string(),
        safe_arg_path(output_path).to_string_lossy().to_string(),
        "--".to_string(),
        url.to_string(),
    ]
}

/// Keep titles ASCII and filesystem-safe.
fn sanitize_title(title: &str) -> String {
    let safe: String = title
        .chars()
        .filter(|c| c.is_ascii())
        .map(|c| if c.is_ascii_alphanumeric() || c == ' ' { c } else { '_' })
        .collect();
    let safe = safe.trim().to_string();
    if safe.is_empty() {
        "source".to_string()
    } else {
        safe
    }
}

/// Download a video with yt-dlp into `output_dir`.
pub async fn download_video(url: &str, output_dir: &Path) -> Result<SourceInfo> {
    let url = validate_source_url(url)?;
    info!("[SOURCE] Downloading: {}", url);

    tokio::fs::create_dir_all(output_dir).await?;
    let command = get_ytdlp_command().await;
    let (program, prefix) = command
        .split_first()
        .context("Empty yt-dlp command")?;

    let info_output = Command::new(program)
        .kill_on_drop(true)
        .args(prefix)
        .args(build_ytdlp_info_args(&url))
        .output()
        .await
        .context("Failed to run yt-dlp")?;
    if !info_output.status.success() {
        anyhow::bail!(
            "yt-dlp info failed: {}",
            String::from_utf8_lossy(&info_output.stderr).trim()
        );
    }

    let stdout = String::from_utf8_lossy(&info_output.stdout);
    let mut lines = stdout.lines();
    let title = lines.next().unwrap_or("Unknown").to_string();
    let duration: f64 = lines.next().unwrap_or("0").trim().parse().unwrap_or(0.0);

    let output_path = output_dir.join(format!("{}.mp4", sanitize_title(&title)));
    info!("[SOURCE] Starting download to: {:?}", output_path);

    let status = Command::new(program)
        .kill_on_drop(true)
        .args(prefix)
        .args(build_ytdlp_download_args(&url, &output_path))
        .status()
        .await
        .context("Failed to run yt-dlp download")?;
    if !status.success() {
        anyhow::bail!("Download process failed for {}", url);
    }
    if !output_path.exists() {
        anyhow::bail!("yt-dlp reported success but {:?} is missing", output_path);
    }

    Ok(SourceInfo {
        title,
        duration,
        local_path: output_path,
        original_url: Some(url.to_string()),
    })
}

/// Get media (video or audio) duration using ffprobe with a timeout
pub async fn get_media_duration(path: &Path) -> Result<f64> {
    let safe_path = safe_arg_path(path);

    // Getting duration from header is usually instant.
    let output = tokio::time::timeout(
        tokio::time::Duration::from_secs(10),
        Command::new("ffprobe")
            .kill_on_drop(true) // Ensure process is killed if timeout occurs
            .args([
                "-v",
                "error",
                "-show_entries",
                "format=duration",
                "-of",
                "default=noprint_wrappers=1:nokey=1",
            ])
            .arg(&safe_path)
            .output(),
    )
    .await
    .context("ffprobe duration check timed out")?
    .context("Failed to run ffprobe")?;

    if !output.status.success() {
        anyhow::bail!(
            "ffprobe failed on {:?}: {}",
            path,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    let duration: f64 = String::from_utf8_lossy(&output.stdout)
        .trim()
        .parse()
        .with_context(|| format!("Failed to parse duration from ffprobe output for {:?}", path))?;
    Ok(duration)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_source_url() {
        assert!(validate_source_url("https://youtu.be/UF8uR6Z6KLc").is_ok());
        assert!(validate_source_url("file:///etc/passwd").is_err());
        assert!(validate_source_url("-v").is_err());
        assert!(validate_source_url("not a url").is_err());
    }

    #[test]
    fn test_build_ytdlp_info_args_injection() {
        let url = validate_source_url("https://example.com/-v").unwrap();
        let args = build_ytdlp_info_args(&url);
        // URL always comes after the separator
        let separator_idx = args.iter().position(|r| r == "--").unwrap();
        assert_eq!(separator_idx, args.len() - 2);
    }

    #[test]
    fn test_build_ytdlp_download_args_injection() {
        let url = validate_source_url("https://youtube.com/watch?v=1").unwrap();
        let args = build_ytdlp_download_args(&url, Path::new("-out.mp4"));
        assert!(
            args.contains(&"./-out.mp4".to_string()) || args.contains(&".\\-out.mp4".to_string())
        );
    }

    #[test]
    fn test_sanitize_title() {
        assert_eq!(sanitize_title("Steve Jobs' 2005 Stanford"), "Steve Jobs_ 2005 Stanford");
        assert_eq!(sanitize_title("日本語"), "source");
    }
}

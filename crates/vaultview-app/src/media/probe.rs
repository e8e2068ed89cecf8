//! Media metadata via ffprobe.
//!
//! `ffprobe -print_format json` works against local paths and URLs alike;
//! the player only needs dimensions, frame rate, and duration.

use std::process::{Command, Stdio};
use std::sync::OnceLock;

use super::MediaError;

/// Check if ffmpeg/ffprobe are available on the system. Cached per process.
pub fn tools_available() -> bool {
    static AVAILABLE: OnceLock<bool> = OnceLock::new();
    *AVAILABLE.get_or_init(|| {
        Command::new("ffprobe")
            .arg("-version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    })
}

/// Stream metadata from ffprobe.
#[derive(Debug, Clone)]
pub struct MediaMeta {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub duration_secs: f64,
}

/// Probe the media URL. Blocks until ffprobe exits.
pub fn probe(url: &str) -> Result<MediaMeta, MediaError> {
    let output = Command::new("ffprobe")
        .args([
            "-v", "quiet",
            "-print_format", "json",
            "-show_streams",
            "-show_format",
        ])
        .arg(url)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .output()
        .map_err(|e| MediaError::Probe(format!("ffprobe failed to execute: {e}")))?;

    if !output.status.success() {
        return Err(MediaError::Probe(
            "ffprobe returned non-zero exit code".into(),
        ));
    }

    let json: serde_json::Value = serde_json::from_slice(&output.stdout)
        .map_err(|e| MediaError::Probe(format!("bad ffprobe JSON: {e}")))?;

    let streams = json["streams"]
        .as_array()
        .ok_or_else(|| MediaError::Probe("no streams in ffprobe output".into()))?;

    let video_stream = streams
        .iter()
        .find(|s| s["codec_type"].as_str() == Some("video"))
        .ok_or_else(|| MediaError::Probe("no video stream found".into()))?;

    let width = video_stream["width"]
        .as_u64()
        .ok_or_else(|| MediaError::Probe("missing width".into()))? as u32;
    let height = video_stream["height"]
        .as_u64()
        .ok_or_else(|| MediaError::Probe("missing height".into()))? as u32;

    let fps = parse_frame_rate(video_stream["r_frame_rate"].as_str().unwrap_or("30/1"));

    // Container duration is more reliable than per-stream for network media
    let duration_secs = json["format"]["duration"]
        .as_str()
        .and_then(|s| s.parse::<f64>().ok())
        .or_else(|| {
            video_stream["duration"]
                .as_str()
                .and_then(|s| s.parse::<f64>().ok())
        })
        .unwrap_or(0.0);

    Ok(MediaMeta {
        width,
        height,
        fps,
        duration_secs,
    })
}

/// ffprobe reports frame rate as a rational like `30000/1001`.
fn parse_frame_rate(rate: &str) -> f64 {
    if let Some((num, den)) = rate.split_once('/') {
        let n: f64 = num.parse().unwrap_or(30.0);
        let d: f64 = den.parse().unwrap_or(1.0);
        if d > 0.0 { n / d } else { 30.0 }
    } else {
        rate.parse().unwrap_or(30.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_rate_rational_forms() {
        assert!((parse_frame_rate("30/1") - 30.0).abs() < 1e-9);
        assert!((parse_frame_rate("30000/1001") - 29.97).abs() < 0.01);
        assert!((parse_frame_rate("25") - 25.0).abs() < 1e-9);
        // Degenerate denominators fall back to 30
        assert!((parse_frame_rate("30/0") - 30.0).abs() < 1e-9);
        assert!((parse_frame_rate("garbage") - 30.0).abs() < 1e-9);
    }
}

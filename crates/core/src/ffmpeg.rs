//! FFmpeg/FFprobe frame extraction.
//!
//! Produces the single representative still image that is sent to the
//! analysis model: the frame at the midpoint of the source video,
//! encoded as JPEG and piped straight out of `ffmpeg` on stdout.

use std::io::Cursor;
use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;

use crate::types::ImagePayload;

/// MIME type of extracted frames.
pub const FRAME_MIME_TYPE: &str = "image/jpeg";

/// Error type for FFmpeg/FFprobe operations.
#[derive(Debug, thiserror::Error)]
pub enum FfmpegError {
    #[error("ffprobe/ffmpeg binary not found: {0}")]
    NotFound(std::io::Error),

    #[error("ffprobe/ffmpeg execution failed (exit code {exit_code:?}): {stderr}")]
    ExecutionFailed {
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("failed to parse ffprobe output: {0}")]
    ParseError(String),

    #[error("video file not found: {0}")]
    VideoNotFound(String),

    #[error("extracted frame is not a valid image: {0}")]
    InvalidFrame(String),
}

/// A frame pulled out of a video, with its decoded dimensions.
#[derive(Debug, Clone)]
pub struct ExtractedFrame {
    pub image: ImagePayload,
    /// Timestamp in seconds where the frame was taken.
    pub timestamp_secs: f64,
    pub width: u32,
    pub height: u32,
}

/// Produces the representative still image of a video.
#[async_trait]
pub trait FrameExtractor: Send + Sync {
    async fn extract_midpoint(&self, video_path: &Path) -> Result<ExtractedFrame, FfmpegError>;
}

/// [`FrameExtractor`] backed by the `ffprobe` and `ffmpeg` binaries on `PATH`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ffmpeg;

#[async_trait]
impl FrameExtractor for Ffmpeg {
    async fn extract_midpoint(&self, video_path: &Path) -> Result<ExtractedFrame, FfmpegError> {
        extract_midpoint_frame(video_path).await
    }
}

// ---------------------------------------------------------------------------
// ffprobe JSON output structures
// ---------------------------------------------------------------------------

/// Top-level ffprobe JSON output (`-print_format json -show_format -show_streams`).
#[derive(Debug, Deserialize)]
pub struct FfprobeOutput {
    #[serde(default)]
    pub streams: Vec<FfprobeStream>,
    pub format: FfprobeFormat,
}

/// A single stream from ffprobe output.
#[derive(Debug, Deserialize)]
pub struct FfprobeStream {
    pub codec_type: Option<String>,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub duration: Option<String>,
}

/// Format-level metadata from ffprobe.
#[derive(Debug, Deserialize)]
pub struct FfprobeFormat {
    pub duration: Option<String>,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Run `ffprobe` on a video file and return the parsed JSON output.
pub async fn probe_video(path: &Path) -> Result<FfprobeOutput, FfmpegError> {
    ensure_exists(path)?;

    let output = tokio::process::Command::new("ffprobe")
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .kill_on_drop(true)
        .output()
        .await
        .map_err(FfmpegError::NotFound)?;

    if !output.status.success() {
        return Err(FfmpegError::ExecutionFailed {
            exit_code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        });
    }

    parse_probe_output(&String::from_utf8_lossy(&output.stdout))
}

/// Extract the frame at the midpoint of `video_path` as a JPEG image.
///
/// Videos whose duration cannot be determined are sampled at `0.0`.
pub async fn extract_midpoint_frame(video_path: &Path) -> Result<ExtractedFrame, FfmpegError> {
    let probe = probe_video(video_path).await?;
    let timestamp_secs = midpoint_secs(parse_duration(&probe));

    tracing::debug!(
        video = %video_path.display(),
        timestamp_secs,
        "Extracting midpoint frame",
    );

    let bytes = extract_frame_jpeg(video_path, timestamp_secs).await?;
    let (width, height) = frame_dimensions(&bytes)?;

    Ok(ExtractedFrame {
        image: ImagePayload::new(FRAME_MIME_TYPE, bytes),
        timestamp_secs,
        width,
        height,
    })
}

/// Rasterise exactly one frame at `timestamp_secs` and return the JPEG bytes.
pub async fn extract_frame_jpeg(
    video_path: &Path,
    timestamp_secs: f64,
) -> Result<Vec<u8>, FfmpegError> {
    ensure_exists(video_path)?;

    let output = tokio::process::Command::new("ffmpeg")
        .args(["-v", "error", "-ss", &format!("{timestamp_secs:.3}"), "-i"])
        .arg(video_path)
        .args([
            "-frames:v",
            "1",
            "-f",
            "image2pipe",
            "-vcodec",
            "mjpeg",
            "-q:v",
            "2",
            "pipe:1",
        ])
        .kill_on_drop(true)
        .output()
        .await
        .map_err(FfmpegError::NotFound)?;

    if !output.status.success() {
        return Err(FfmpegError::ExecutionFailed {
            exit_code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        });
    }

    if output.stdout.is_empty() {
        return Err(FfmpegError::InvalidFrame(format!(
            "no frame produced at {timestamp_secs:.3}s"
        )));
    }

    Ok(output.stdout)
}

// ---------------------------------------------------------------------------
// Parsing helpers
// ---------------------------------------------------------------------------

/// Parse raw ffprobe JSON.
pub fn parse_probe_output(stdout: &str) -> Result<FfprobeOutput, FfmpegError> {
    serde_json::from_str::<FfprobeOutput>(stdout)
        .map_err(|e| FfmpegError::ParseError(format!("{e}: {stdout}")))
}

/// Find the first video stream in the ffprobe output.
fn first_video_stream(probe: &FfprobeOutput) -> Option<&FfprobeStream> {
    probe
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
}

/// Parse the video duration in seconds from ffprobe output.
pub fn parse_duration(probe: &FfprobeOutput) -> f64 {
    // Try format-level duration first.
    if let Some(secs) = probe.format.duration.as_deref().and_then(parse_secs) {
        return secs;
    }
    // Fall back to the first video stream's duration.
    first_video_stream(probe)
        .and_then(|s| s.duration.as_deref())
        .and_then(parse_secs)
        .unwrap_or(0.0)
}

/// Seek target for a representative frame.
pub fn midpoint_secs(duration: f64) -> f64 {
    if duration.is_finite() && duration > 0.0 {
        duration / 2.0
    } else {
        0.0
    }
}

fn parse_secs(s: &str) -> Option<f64> {
    s.parse::<f64>().ok().filter(|v| v.is_finite() && *v >= 0.0)
}

/// Decode just enough of the image header to read its dimensions.
fn frame_dimensions(bytes: &[u8]) -> Result<(u32, u32), FfmpegError> {
    image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| FfmpegError::InvalidFrame(e.to_string()))?
        .into_dimensions()
        .map_err(|e| FfmpegError::InvalidFrame(e.to_string()))
}

fn ensure_exists(path: &Path) -> Result<(), FfmpegError> {
    if path.exists() {
        Ok(())
    } else {
        Err(FfmpegError::VideoNotFound(
            path.to_string_lossy().to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    const PROBE_JSON: &str = r#"{
        "streams": [
            {"index": 0, "codec_type": "audio", "duration": "9.000"},
            {"index": 1, "codec_type": "video", "width": 1920, "height": 1080, "duration": "8.000"}
        ],
        "format": {"duration": "8.040000", "format_name": "mov,mp4"}
    }"#;

    #[test]
    fn duration_prefers_format_level() {
        let probe = parse_probe_output(PROBE_JSON).unwrap();
        assert!((parse_duration(&probe) - 8.04).abs() < 1e-9);
    }

    #[test]
    fn duration_falls_back_to_video_stream() {
        let json = r#"{
            "streams": [
                {"codec_type": "audio", "duration": "9.0"},
                {"codec_type": "video", "duration": "6.5"}
            ],
            "format": {}
        }"#;
        let probe = parse_probe_output(json).unwrap();
        assert!((parse_duration(&probe) - 6.5).abs() < 1e-9);
    }

    #[test]
    fn unknown_duration_is_zero() {
        let json = r#"{"format": {"duration": "N/A"}}"#;
        let probe = parse_probe_output(json).unwrap();
        assert_eq!(parse_duration(&probe), 0.0);
    }

    #[test]
    fn invalid_probe_json_is_parse_error() {
        assert_matches!(parse_probe_output("not json"), Err(FfmpegError::ParseError(_)));
    }

    #[test]
    fn midpoint_of_positive_duration() {
        assert_eq!(midpoint_secs(10.0), 5.0);
        assert_eq!(midpoint_secs(0.0), 0.0);
        assert_eq!(midpoint_secs(f64::NAN), 0.0);
    }

    #[test]
    fn dimensions_of_encoded_png() {
        let mut buf = Vec::new();
        image::RgbImage::new(4, 3)
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        assert_eq!(frame_dimensions(&buf).unwrap(), (4, 3));
    }

    #[test]
    fn garbage_frame_is_rejected() {
        assert_matches!(
            frame_dimensions(b"definitely not an image"),
            Err(FfmpegError::InvalidFrame(_))
        );
    }

    #[tokio::test]
    async fn missing_video_is_reported_before_spawning() {
        let result = extract_midpoint_frame(Path::new("/nonexistent/clip.mp4")).await;
        assert_matches!(result, Err(FfmpegError::VideoNotFound(_)));
    }
}

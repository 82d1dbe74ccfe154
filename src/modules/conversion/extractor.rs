use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum ExtractionError {
    /// The input could not be converted. Retrying the same bytes will not help.
    #[error("ffmpeg exited with {status}: {stderr}")]
    Media { status: String, stderr: String },

    #[error("conversion produced no audio")]
    EmptyOutput,

    /// The converter on this host cannot encode MP3 at all.
    #[error("ffmpeg cannot encode MP3: {0}")]
    MissingEncoder(String),

    /// Scratch files or process spawning failed on this host.
    #[error("conversion I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ExtractionError {
    pub fn is_permanent(&self) -> bool {
        !matches!(
            self,
            ExtractionError::Io(_) | ExtractionError::MissingEncoder(_)
        )
    }
}

#[async_trait]
pub trait AudioExtractor: Send + Sync {
    /// Pull the audio track out of a video container as MP3.
    async fn extract(&self, video: Bytes) -> Result<Bytes, ExtractionError>;
}

pub struct FfmpegExtractor {
    binary: PathBuf,
}

// Keep only the tail of ffmpeg's stderr; the banner is noise.
const STDERR_TAIL: usize = 1024;

pub const MP3_ENCODER: &str = "libmp3lame";

// What ffmpeg prints when the requested encoder is not compiled in.
const MISSING_ENCODER_MARKERS: [&str; 3] = [
    "Unknown encoder",
    "Encoder not found",
    "encoder selection failed",
];

impl FfmpegExtractor {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn args(input: &Path, output: &Path) -> Vec<String> {
        vec![
            "-hide_banner".to_string(),
            "-nostdin".to_string(),
            "-y".to_string(),
            "-i".to_string(),
            input.display().to_string(),
            "-vn".to_string(),
            "-map".to_string(),
            "a".to_string(),
            "-c:a".to_string(),
            MP3_ENCODER.to_string(),
            "-q:a".to_string(),
            "0".to_string(),
            output.display().to_string(),
        ]
    }
}

#[async_trait]
impl AudioExtractor for FfmpegExtractor {
    async fn extract(&self, video: Bytes) -> Result<Bytes, ExtractionError> {
        let scratch = tempfile::Builder::new().prefix("vid2audio-").tempdir()?;
        let input = scratch.path().join("input");
        let output = scratch.path().join("output.mp3");

        tokio::fs::write(&input, &video).await?;
        debug!("Wrote {} bytes of video to {}", video.len(), input.display());

        let result = Command::new(&self.binary)
            .args(Self::args(&input, &output))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            let start = stderr.len().saturating_sub(STDERR_TAIL);
            let tail = stderr
                .get(start..)
                .unwrap_or(stderr.as_ref())
                .trim()
                .to_string();
            if MISSING_ENCODER_MARKERS.iter().any(|m| tail.contains(m)) {
                return Err(ExtractionError::MissingEncoder(tail));
            }
            return Err(ExtractionError::Media {
                status: result.status.to_string(),
                stderr: tail,
            });
        }

        let audio = match tokio::fs::read(&output).await {
            Ok(audio) => audio,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ExtractionError::EmptyOutput);
            }
            Err(e) => return Err(e.into()),
        };
        if audio.is_empty() {
            return Err(ExtractionError::EmptyOutput);
        }

        info!("Extracted {} bytes of audio", audio.len());
        Ok(Bytes::from(audio))
    }
}

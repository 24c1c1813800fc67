use crate::domain::audio::{AssemblyError, OutputFormat};
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Converts a finished WAV stream into the requested output format
#[async_trait]
pub trait Transcoder: Send + Sync {
    async fn transcode(&self, wav: Vec<u8>, format: OutputFormat) -> Result<Vec<u8>, AssemblyError>;
}

/// Runs `ffmpeg` with the WAV on stdin and the encoded file on stdout
pub struct FfmpegTranscoder {
    binary: PathBuf,
}

impl FfmpegTranscoder {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Command line for one conversion
    pub fn arguments(format: OutputFormat) -> Vec<&'static str> {
        let mut args = vec!["-hide_banner", "-loglevel", "error", "-f", "wav", "-i", "pipe:0"];
        match format {
            OutputFormat::Mp3 => args.extend(["-codec:a", "libmp3lame", "-b:a", "128k", "-f", "mp3"]),
            OutputFormat::Ogg => args.extend(["-codec:a", "libvorbis", "-q:a", "5", "-f", "ogg"]),
            OutputFormat::Wav => args.extend(["-codec:a", "pcm_s16le", "-f", "wav"]),
        }
        args.push("pipe:1");
        args
    }

    /// Check that the binary runs at all, before any synthesis is spent
    pub async fn probe(&self) -> Result<(), AssemblyError> {
        let status = Command::new(&self.binary)
            .arg("-version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|e| AssemblyError::Transcode {
                format: "probe".to_string(),
                message: format!("failed to start {}: {}", self.binary.display(), e),
            })?;

        if status.success() {
            Ok(())
        } else {
            Err(AssemblyError::Transcode {
                format: "probe".to_string(),
                message: format!("{} -version exited with {}", self.binary.display(), status),
            })
        }
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn transcode(&self, wav: Vec<u8>, format: OutputFormat) -> Result<Vec<u8>, AssemblyError> {
        if format == OutputFormat::Wav {
            return Ok(wav);
        }
        let failure = |message: String| AssemblyError::Transcode {
            format: format.to_string(),
            message,
        };

        tracing::info!(
            binary = %self.binary.display(),
            format = %format,
            input_size = wav.len(),
            "Transcoding assembled audio"
        );

        let mut child = Command::new(&self.binary)
            .args(Self::arguments(format))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| failure(format!("failed to start {}: {}", self.binary.display(), e)))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| failure("transcoder stdin unavailable".to_string()))?;

        // Feed stdin concurrently so a full stdout pipe cannot stall the child
        let feeder = tokio::spawn(async move {
            stdin.write_all(&wav).await?;
            stdin.shutdown().await
        });

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| failure(format!("transcoder did not finish: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(failure(format!("{}: {}", output.status, stderr.trim())));
        }

        match feeder.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(failure(format!("failed to stream audio: {}", e))),
            Err(e) => return Err(failure(format!("audio feeder crashed: {}", e))),
        }

        if output.stdout.is_empty() {
            return Err(failure("transcoder produced no output".to_string()));
        }

        tracing::info!(format = %format, output_size = output.stdout.len(), "Transcoding finished");
        Ok(output.stdout)
    }
}

//! Conversion strategies backed by external binaries
//!
//! FFmpeg and SoX are run as subprocesses. Exit status and stderr are
//! captured and mapped into `SpeechError::ConversionFailed`.

use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, instrument};

use crate::error::SpeechError;
use crate::ports::ConversionStrategy;
use crate::types::AudioFormat;

/// Sample rate produced by the subprocess strategies
pub const TRANSCODE_SAMPLE_RATE: &str = "16000";

/// Outcome of running an external binary
#[derive(Debug)]
pub(crate) enum ToolError {
    /// The binary does not exist
    NotFound(String),
    /// The binary ran and failed, or could not be spawned
    Failed(String),
}

impl From<ToolError> for SpeechError {
    fn from(err: ToolError) -> Self {
        match err {
            ToolError::NotFound(msg) | ToolError::Failed(msg) => Self::ConversionFailed(msg),
        }
    }
}

/// Run `program` with `args`, capturing stderr
pub(crate) async fn run_tool(program: &str, args: &[OsString]) -> Result<(), ToolError> {
    debug!(program, ?args, "Running external tool");

    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                ToolError::NotFound(format!("{program} not found"))
            } else {
                ToolError::Failed(format!("failed to spawn {program}: {e}"))
            }
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ToolError::Failed(format!(
            "{program} exited with {}: {}",
            output.status,
            stderr.trim()
        )));
    }

    Ok(())
}

/// FFmpeg muxer name for a format
pub(crate) const fn ffmpeg_format(format: AudioFormat) -> &'static str {
    match format {
        AudioFormat::Wav => "wav",
        AudioFormat::Webm => "webm",
        AudioFormat::Mp3 => "mp3",
        AudioFormat::Ogg => "ogg",
        AudioFormat::Flac => "flac",
        AudioFormat::Aiff => "aiff",
        AudioFormat::M4a => "ipod", // FFmpeg uses "ipod" for m4a
        AudioFormat::Aac => "adts",
    }
}

/// FFmpeg argument flavours used by the cascade
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FfmpegProfile {
    /// Container only, codec chosen by FFmpeg
    Generic,
    /// PCM s16, 16 kHz, mono, WAV container
    Pcm16k,
    /// As `Pcm16k` with bit-exact muxing
    Pcm16kBitExact,
}

/// Build an FFmpeg command line
pub(crate) fn ffmpeg_args(
    input: &Path,
    output: &Path,
    target: AudioFormat,
    profile: FfmpegProfile,
) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        "-y".into(),
        "-loglevel".into(),
        "error".into(),
        "-i".into(),
        input.into(),
    ];

    let pcm = ["-acodec", "pcm_s16le", "-ar", TRANSCODE_SAMPLE_RATE, "-ac", "1"];
    match (target, profile) {
        (AudioFormat::Wav, FfmpegProfile::Pcm16k) => {
            args.extend(pcm.iter().map(OsString::from));
            args.extend(["-f", "wav"].iter().map(OsString::from));
        },
        (AudioFormat::Wav, FfmpegProfile::Pcm16kBitExact) => {
            args.extend(["-f", "wav", "-bitexact"].iter().map(OsString::from));
            args.extend(pcm.iter().map(OsString::from));
        },
        _ => {
            args.extend(["-f", ffmpeg_format(target)].iter().map(OsString::from));
        },
    }

    args.push(output.into());
    args
}

/// Second cascade step: FFmpeg to 16 kHz mono PCM WAV
#[derive(Debug, Clone)]
pub struct TranscoderStrategy {
    ffmpeg_path: String,
}

impl TranscoderStrategy {
    /// Create the strategy with a custom FFmpeg path
    #[must_use]
    pub fn new(ffmpeg_path: impl Into<String>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
        }
    }
}

#[async_trait]
impl ConversionStrategy for TranscoderStrategy {
    fn id(&self) -> &'static str {
        "transcoder"
    }

    #[instrument(skip(self), fields(input = %input.display(), target = %target))]
    async fn convert(
        &self,
        input: &Path,
        output: &Path,
        target: AudioFormat,
    ) -> Result<(), SpeechError> {
        let args = ffmpeg_args(input, output, target, FfmpegProfile::Pcm16k);
        run_tool(&self.ffmpeg_path, &args).await?;
        Ok(())
    }
}

/// Third cascade step: SoX, or bit-exact FFmpeg when SoX is not installed
#[derive(Debug, Clone)]
pub struct ExternalToolStrategy {
    sox_path: String,
    ffmpeg_path: String,
}

impl ExternalToolStrategy {
    /// Create the strategy with custom SoX and FFmpeg paths
    #[must_use]
    pub fn new(sox_path: impl Into<String>, ffmpeg_path: impl Into<String>) -> Self {
        Self {
            sox_path: sox_path.into(),
            ffmpeg_path: ffmpeg_path.into(),
        }
    }

    fn sox_args(input: &Path, output: &Path, target: AudioFormat) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![input.into()];
        if target == AudioFormat::Wav {
            args.extend(
                ["-r", TRANSCODE_SAMPLE_RATE, "-b", "16", "-c", "1"]
                    .iter()
                    .map(OsString::from),
            );
        }
        args.push(output.into());
        args
    }

    async fn run_sox(&self, input: &Path, output: &Path, target: AudioFormat) -> Result<(), ToolError> {
        run_tool(&self.sox_path, &["--version".into()]).await?;
        run_tool(&self.sox_path, &Self::sox_args(input, output, target)).await
    }
}

#[async_trait]
impl ConversionStrategy for ExternalToolStrategy {
    fn id(&self) -> &'static str {
        "external_tool"
    }

    #[instrument(skip(self), fields(input = %input.display(), target = %target))]
    async fn convert(
        &self,
        input: &Path,
        output: &Path,
        target: AudioFormat,
    ) -> Result<(), SpeechError> {
        match self.run_sox(input, output, target).await {
            Ok(()) => Ok(()),
            Err(ToolError::NotFound(msg)) => {
                debug!(reason = %msg, "SoX unavailable, falling back to FFmpeg");
                let args = ffmpeg_args(input, output, target, FfmpegProfile::Pcm16kBitExact);
                run_tool(&self.ffmpeg_path, &args).await?;
                Ok(())
            },
            Err(e) => Err(e.into()),
        }
    }
}

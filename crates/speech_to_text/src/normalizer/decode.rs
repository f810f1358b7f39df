//! In-process decode strategy
//!
//! Decodes any container symphonia understands, downmixes to mono, resamples
//! to 44.1 kHz and writes 16-bit PCM WAV with hound. Runs on the blocking
//! pool; decoder state is dropped when the worker returns.

use std::fs::File;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use hound::{SampleFormat, WavSpec, WavWriter};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, instrument, warn};

use super::tools::{FfmpegProfile, ffmpeg_args, run_tool};
use crate::error::SpeechError;
use crate::ports::ConversionStrategy;
use crate::types::AudioFormat;

/// Output sample rate of the decode strategy
pub const DECODE_SAMPLE_RATE: u32 = 44_100;

/// First cascade step: decode and re-encode in process
#[derive(Debug, Clone)]
pub struct DecodeStrategy {
    ffmpeg_path: String,
}

impl DecodeStrategy {
    /// Create the strategy; FFmpeg is only used for non-WAV targets
    #[must_use]
    pub fn new(ffmpeg_path: impl Into<String>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
        }
    }
}

#[async_trait]
impl ConversionStrategy for DecodeStrategy {
    fn id(&self) -> &'static str {
        "decode"
    }

    #[instrument(skip(self), fields(input = %input.display(), target = %target))]
    async fn convert(
        &self,
        input: &Path,
        output: &Path,
        target: AudioFormat,
    ) -> Result<(), SpeechError> {
        if target != AudioFormat::Wav {
            let args = ffmpeg_args(input, output, target, FfmpegProfile::Generic);
            run_tool(&self.ffmpeg_path, &args).await?;
            return Ok(());
        }

        let input: PathBuf = input.to_path_buf();
        let output: PathBuf = output.to_path_buf();
        tokio::task::spawn_blocking(move || decode_to_wav(&input, &output))
            .await
            .map_err(|e| SpeechError::ConversionFailed(format!("decode worker failed: {e}")))?
    }
}

fn decode_failed(stage: &str, err: impl std::fmt::Display) -> SpeechError {
    SpeechError::ConversionFailed(format!("{stage}: {err}"))
}

/// Decode `input` and write a 44.1 kHz mono s16 WAV to `output`
pub(crate) fn decode_to_wav(input: &Path, output: &Path) -> Result<(), SpeechError> {
    let (samples, source_rate) = decode_mono(input)?;

    let samples = if source_rate == DECODE_SAMPLE_RATE {
        samples
    } else {
        resample(&samples, source_rate, DECODE_SAMPLE_RATE)?
    };

    write_wav(output, &samples, DECODE_SAMPLE_RATE)?;

    debug!(
        samples = samples.len(),
        source_rate,
        "Audio decoded to 44.1kHz mono PCM"
    );
    Ok(())
}

/// Decode the default track to mono `f32` samples at its native rate
fn decode_mono(input: &Path) -> Result<(Vec<f32>, u32), SpeechError> {
    let file = File::open(input).map_err(|e| decode_failed("open", e))?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = input.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| decode_failed("probe", e))?;

    let mut format = probed.format;

    let track = format
        .default_track()
        .ok_or_else(|| decode_failed("track", "no audio track found"))?;

    let track_id = track.id;
    let codec_params = track.codec_params.clone();
    let source_rate = codec_params
        .sample_rate
        .ok_or_else(|| decode_failed("track", "unknown sample rate"))?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| decode_failed("codec", e))?;

    let mut mono: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(symphonia::core::errors::Error::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            },
            Err(e) => return Err(decode_failed("packet", e)),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(symphonia::core::errors::Error::DecodeError(e)) => {
                warn!(error = %e, "Skipping corrupt audio frame");
                continue;
            },
            Err(e) => return Err(decode_failed("decode", e)),
        };

        let spec = *decoded.spec();
        let frames = decoded.frames();
        if frames == 0 {
            continue;
        }

        let mut buffer = SampleBuffer::<f32>::new(frames as u64, spec);
        buffer.copy_interleaved_ref(decoded);
        downmix_into(&mut mono, buffer.samples(), spec.channels.count());
    }

    if mono.is_empty() {
        return Err(decode_failed("decode", "no audio samples decoded"));
    }

    Ok((mono, source_rate))
}

/// Average interleaved frames of `channels` samples into `mono`
#[allow(clippy::cast_precision_loss)]
fn downmix_into(mono: &mut Vec<f32>, interleaved: &[f32], channels: usize) {
    if channels > 1 {
        mono.extend(
            interleaved
                .chunks(channels)
                .map(|frame| frame.iter().sum::<f32>() / channels as f32),
        );
    } else {
        mono.extend_from_slice(interleaved);
    }
}

#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>, SpeechError> {
    use rubato::{
        Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
    };

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let ratio = f64::from(to_rate) / f64::from(from_rate);
    let chunk_size = 1024;

    let mut resampler = SincFixedIn::<f32>::new(ratio, 2.0, params, chunk_size, 1)
        .map_err(|e| decode_failed("resampler init", e))?;

    let mut output = Vec::with_capacity((samples.len() as f64 * ratio) as usize + chunk_size);

    for chunk in samples.chunks(chunk_size) {
        let mut input = chunk.to_vec();
        input.resize(chunk_size, 0.0);

        let result = resampler
            .process(&[input], None)
            .map_err(|e| decode_failed("resample", e))?;

        if let Some(channel) = result.first() {
            output.extend_from_slice(channel);
        }
    }

    let expected_len = (samples.len() as f64 * ratio) as usize;
    output.truncate(expected_len);

    Ok(output)
}

#[allow(clippy::cast_possible_truncation)]
fn write_wav(output: &Path, samples: &[f32], sample_rate: u32) -> Result<(), SpeechError> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut writer = WavWriter::create(output, spec).map_err(|e| decode_failed("wav create", e))?;
    for &sample in samples {
        let scaled = sample.clamp(-1.0, 1.0) * f32::from(i16::MAX);
        writer
            .write_sample(scaled as i16)
            .map_err(|e| decode_failed("wav write", e))?;
    }
    writer
        .finalize()
        .map_err(|e| decode_failed("wav finalize", e))
}

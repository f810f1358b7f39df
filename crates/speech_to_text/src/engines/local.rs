//! Local transcription engine
//!
//! Reads the normalized WAV, calibrates an energy threshold on the first
//! second of audio and submits the whole waveform to a hosted best-effort
//! recognizer. The backend answers with one JSON document per line; the
//! first document carrying a non-empty `result` holds the transcript.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use hound::{SampleFormat, WavReader};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::config::SpeechConfig;
use crate::error::{EngineError, SpeechError};
use crate::ports::TranscriptionEngine;
use crate::types::TranscriptionOptions;

/// Length of the calibration window
pub const CALIBRATION_SECS: f64 = 1.0;

/// Energy threshold before calibration
pub const INITIAL_ENERGY_THRESHOLD: f64 = 300.0;

/// Per-second damping of the threshold update
pub const ENERGY_DAMPING: f64 = 0.15;

/// Multiplier applied to the ambient energy
pub const ENERGY_RATIO: f64 = 1.5;

/// Frames per calibration buffer
const CALIBRATION_CHUNK: usize = 1024;

/// Mono 16-bit recording loaded from a WAV file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recording {
    /// Mono samples
    pub samples: Vec<i16>,
    /// Sample rate in Hz
    pub sample_rate: u32,
}

impl Recording {
    /// Load a WAV file, downmixing to mono and scaling to 16 bits
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Wav` if the file is not a readable PCM WAV.
    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    pub fn load(path: &Path) -> Result<Self, EngineError> {
        let mut reader = WavReader::open(path)?;
        let spec = reader.spec();

        if spec.sample_format != SampleFormat::Int {
            return Err(SpeechError::TranscriptionFailed(
                "WAV must contain integer PCM samples".to_string(),
            )
            .into());
        }

        let shift = u32::from(spec.bits_per_sample.saturating_sub(16));
        let widen = u32::from(16u16.saturating_sub(spec.bits_per_sample));
        let interleaved = reader
            .samples::<i32>()
            .map(|s| s.map(|v| ((v >> shift) << widen) as i16))
            .collect::<Result<Vec<_>, _>>()?;

        let channels = usize::from(spec.channels.max(1));
        let samples = if channels == 1 {
            interleaved
        } else {
            interleaved
                .chunks(channels)
                .map(|frame| {
                    let sum: i32 = frame.iter().map(|&s| i32::from(s)).sum();
                    (sum / channels as i32) as i16
                })
                .collect()
        };

        Ok(Self {
            samples,
            sample_rate: spec.sample_rate,
        })
    }

    /// Energy threshold after adapting to the first second of audio
    #[must_use]
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn ambient_energy_threshold(&self) -> f64 {
        if self.sample_rate == 0 {
            return INITIAL_ENERGY_THRESHOLD;
        }

        let seconds_per_buffer = CALIBRATION_CHUNK as f64 / f64::from(self.sample_rate);
        let damping = ENERGY_DAMPING.powf(seconds_per_buffer);
        let window = ((f64::from(self.sample_rate) * CALIBRATION_SECS) as usize).min(self.samples.len());

        self.samples[..window]
            .chunks(CALIBRATION_CHUNK)
            .fold(INITIAL_ENERGY_THRESHOLD, |threshold, chunk| {
                let target = rms(chunk) * ENERGY_RATIO;
                threshold.mul_add(damping, target * (1.0 - damping))
            })
    }

    /// Samples as big-endian 16-bit PCM
    #[must_use]
    pub fn to_l16_bytes(&self) -> Vec<u8> {
        self.samples.iter().flat_map(|s| s.to_be_bytes()).collect()
    }
}

#[allow(clippy::cast_precision_loss)]
fn rms(chunk: &[i16]) -> f64 {
    if chunk.is_empty() {
        return 0.0;
    }
    let sum: f64 = chunk.iter().map(|&s| f64::from(s) * f64::from(s)).sum();
    (sum / chunk.len() as f64).sqrt()
}

#[derive(Debug, Deserialize)]
struct RecognizerResponse {
    #[serde(default)]
    result: Vec<RecognizerResult>,
}

#[derive(Debug, Deserialize)]
struct RecognizerResult {
    #[serde(default)]
    alternative: Vec<RecognizerAlternative>,
}

#[derive(Debug, Deserialize)]
struct RecognizerAlternative {
    transcript: String,
    #[serde(default)]
    confidence: Option<f64>,
}

/// Pick the transcript out of a line-delimited recognizer response
pub(crate) fn parse_recognizer_response(body: &str) -> Result<String, EngineError> {
    for line in body.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let response: RecognizerResponse = serde_json::from_str(line)?;
        let Some(first) = response.result.into_iter().next() else {
            continue;
        };

        let best = first.alternative.iter().max_by(|a, b| {
            a.confidence
                .unwrap_or(0.0)
                .total_cmp(&b.confidence.unwrap_or(0.0))
        });

        return match best {
            Some(alt) if !alt.transcript.is_empty() => Ok(alt.transcript.clone()),
            _ => Err(SpeechError::Unrecognized.into()),
        };
    }

    Err(SpeechError::Unrecognized.into())
}

/// Engine backed by a hosted best-effort recognizer
#[derive(Debug, Clone)]
pub struct LocalEngine {
    client: Client,
    endpoint: String,
    api_key: Option<SecretString>,
    timeout: Duration,
}

impl LocalEngine {
    /// Create a new local engine
    ///
    /// # Errors
    ///
    /// Returns `SpeechError::EngineMisconfigured` if the HTTP client cannot be built.
    pub fn new(config: &SpeechConfig) -> Result<Self, SpeechError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| {
                SpeechError::EngineMisconfigured(format!("Failed to create HTTP client: {e}"))
            })?;

        Ok(Self {
            client,
            endpoint: config.local_endpoint.clone(),
            api_key: config.local_api_key.clone(),
            timeout: config.timeout(),
        })
    }

    async fn recognize(&self, recording: &Recording, language: &str) -> Result<String, EngineError> {
        let mut query = vec![
            ("client", "chromium".to_string()),
            ("lang", language.to_string()),
            ("pFilter", "0".to_string()),
        ];
        if let Some(key) = &self.api_key {
            query.push(("key", key.expose_secret().to_string()));
        }

        let response = self
            .client
            .post(&self.endpoint)
            .query(&query)
            .header(
                reqwest::header::CONTENT_TYPE,
                format!("audio/l16; rate={}", recording.sample_rate),
            )
            .body(recording.to_l16_bytes())
            .send()
            .await
            .map_err(|e| self.request_error(&e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| self.request_error(&e))?;

        if !status.is_success() {
            return Err(SpeechError::EngineRequestFailed(format!(
                "recognizer returned {status}: {body}"
            ))
            .into());
        }

        parse_recognizer_response(&body)
    }

    fn request_error(&self, err: &reqwest::Error) -> EngineError {
        if err.is_timeout() {
            SpeechError::Timeout {
                secs: self.timeout.as_secs(),
            }
            .into()
        } else {
            SpeechError::EngineRequestFailed(err.to_string()).into()
        }
    }
}

#[async_trait]
impl TranscriptionEngine for LocalEngine {
    fn name(&self) -> &'static str {
        "local"
    }

    #[instrument(skip(self, options), fields(audio = %audio.display(), language = options.language()))]
    async fn transcribe(
        &self,
        audio: &Path,
        options: &TranscriptionOptions,
    ) -> Result<String, EngineError> {
        let path: PathBuf = audio.to_path_buf();
        let recording = tokio::task::spawn_blocking(move || Recording::load(&path)).await??;

        let threshold = recording.ambient_energy_threshold();
        debug!(
            energy_threshold = threshold,
            samples = recording.samples.len(),
            sample_rate = recording.sample_rate,
            "Ambient noise calibrated"
        );

        let start = Instant::now();
        let result = self.recognize(&recording, options.language()).await;

        if start.elapsed() > self.timeout {
            return Err(SpeechError::Timeout {
                secs: self.timeout.as_secs(),
            }
            .into());
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use hound::{WavSpec, WavWriter};
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn write_wav(path: &Path, channels: u16, samples: &[i16]) {
        let spec = WavSpec {
            channels,
            sample_rate: 16_000,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(path, spec).unwrap();
        for &s in samples {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
    }

    fn engine_for(server: &MockServer, timeout_secs: u64) -> LocalEngine {
        let config = SpeechConfig {
            local_endpoint: format!("{}/speech-api/v2/recognize", server.uri()),
            timeout_secs,
            ..Default::default()
        };
        LocalEngine::new(&config).unwrap()
    }

    mod recording_tests {
        use super::*;

        #[test]
        fn stereo_is_downmixed() {
            let dir = tempfile::tempdir().unwrap();
            let wav = dir.path().join("stereo.wav");
            write_wav(&wav, 2, &[100, 300, -200, -400]);

            let recording = Recording::load(&wav).unwrap();
            assert_eq!(recording.samples, vec![200, -300]);
            assert_eq!(recording.sample_rate, 16_000);
        }

        #[test]
        fn silence_lowers_threshold() {
            let recording = Recording {
                samples: vec![0; 16_000],
                sample_rate: 16_000,
            };
            let threshold = recording.ambient_energy_threshold();
            assert!(threshold < INITIAL_ENERGY_THRESHOLD);
            assert!(threshold >= 0.0);
        }

        #[test]
        fn loud_noise_raises_threshold() {
            let recording = Recording {
                samples: vec![10_000; 32_000],
                sample_rate: 16_000,
            };
            assert!(recording.ambient_energy_threshold() > INITIAL_ENERGY_THRESHOLD);
        }

        #[test]
        fn empty_recording_keeps_initial_threshold() {
            let recording = Recording {
                samples: Vec::new(),
                sample_rate: 16_000,
            };
            assert!(
                (recording.ambient_energy_threshold() - INITIAL_ENERGY_THRESHOLD).abs()
                    < f64::EPSILON
            );
        }

        #[test]
        fn l16_bytes_are_big_endian() {
            let recording = Recording {
                samples: vec![1, -2],
                sample_rate: 8000,
            };
            assert_eq!(recording.to_l16_bytes(), vec![0x00, 0x01, 0xFF, 0xFE]);
        }

        #[test]
        fn non_wav_file_fails_with_wav_error() {
            let dir = tempfile::tempdir().unwrap();
            let bogus = dir.path().join("bogus.wav");
            std::fs::write(&bogus, b"nope").unwrap();
            assert!(matches!(Recording::load(&bogus), Err(EngineError::Wav(_))));
        }
    }

    mod response_tests {
        use super::*;

        #[test]
        fn skips_empty_result_lines() {
            let body = "{\"result\":[]}\n{\"result\":[{\"alternative\":[{\"transcript\":\"hola mundo\",\"confidence\":0.9}],\"final\":true}],\"result_index\":0}\n";
            assert_eq!(parse_recognizer_response(body).unwrap(), "hola mundo");
        }

        #[test]
        fn picks_highest_confidence() {
            let body = r#"{"result":[{"alternative":[{"transcript":"a"},{"transcript":"b","confidence":0.8}]}]}"#;
            assert_eq!(parse_recognizer_response(body).unwrap(), "b");
        }

        #[test]
        fn no_result_is_unrecognized() {
            let err = parse_recognizer_response("{\"result\":[]}\n").unwrap_err();
            assert!(matches!(err, EngineError::Speech(SpeechError::Unrecognized)));

            let err = parse_recognizer_response("").unwrap_err();
            assert!(matches!(err, EngineError::Speech(SpeechError::Unrecognized)));
        }

        #[test]
        fn malformed_line_is_a_json_error() {
            let err = parse_recognizer_response("<html>").unwrap_err();
            assert!(matches!(err, EngineError::Json(_)));
        }
    }

    #[tokio::test]
    async fn transcribes_through_backend() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/speech-api/v2/recognize"))
            .and(query_param("lang", "en-US"))
            .and(query_param("client", "chromium"))
            .and(header("content-type", "audio/l16; rate=16000"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                "{\"result\":[]}\n{\"result\":[{\"alternative\":[{\"transcript\":\"hello there\"}]}]}\n",
            ))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let wav = dir.path().join("clip.wav");
        write_wav(&wav, 1, &[0; 1600]);

        let options = TranscriptionOptions {
            language: Some("en-US".to_string()),
            ..Default::default()
        };
        let text = engine_for(&server, 30).transcribe(&wav, &options).await.unwrap();
        assert_eq!(text, "hello there");
    }

    #[tokio::test]
    async fn default_language_is_spanish() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(query_param("lang", "es-ES"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"result":[{"alternative":[{"transcript":"hola"}]}]}"#,
            ))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let wav = dir.path().join("clip.wav");
        write_wav(&wav, 1, &[0; 160]);

        let text = engine_for(&server, 30)
            .transcribe(&wav, &TranscriptionOptions::default())
            .await
            .unwrap();
        assert_eq!(text, "hola");
    }

    #[tokio::test]
    async fn backend_error_is_request_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let wav = dir.path().join("clip.wav");
        write_wav(&wav, 1, &[0; 160]);

        let err = engine_for(&server, 30)
            .transcribe(&wav, &TranscriptionOptions::default())
            .await
            .unwrap_err();
        match err {
            EngineError::Speech(SpeechError::EngineRequestFailed(msg)) => {
                assert!(msg.contains("503"));
                assert!(msg.contains("busy"));
            },
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn slow_backend_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"{"result":[{"alternative":[{"transcript":"late"}]}]}"#)
                    .set_delay(Duration::from_millis(1500)),
            )
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let wav = dir.path().join("clip.wav");
        write_wav(&wav, 1, &[0; 160]);

        let err = engine_for(&server, 1)
            .transcribe(&wav, &TranscriptionOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Speech(SpeechError::Timeout { secs: 1 })
        ));
    }

    #[test]
    fn engine_name() {
        let engine = LocalEngine::new(&SpeechConfig::default()).unwrap();
        assert_eq!(engine.name(), "local");
    }
}

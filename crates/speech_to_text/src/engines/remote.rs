//! Remote transcription engine (cloud recognition API)

use std::path::Path;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::config::SpeechConfig;
use crate::error::{EngineError, SpeechError};
use crate::ports::TranscriptionEngine;
use crate::types::TranscriptionOptions;

/// Sample rate declared in the recognition request
const REQUEST_SAMPLE_RATE: u32 = 16_000;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RecognitionConfig<'a> {
    encoding: &'static str,
    sample_rate_hertz: u32,
    language_code: &'a str,
    model: &'a str,
    enable_automatic_punctuation: bool,
}

#[derive(Debug, Serialize)]
struct RecognitionAudio {
    content: String,
}

#[derive(Debug, Serialize)]
struct RecognizeRequest<'a> {
    config: RecognitionConfig<'a>,
    audio: RecognitionAudio,
}

#[derive(Debug, Deserialize)]
struct RecognizeResponse {
    #[serde(default)]
    results: Vec<RecognizeResult>,
}

#[derive(Debug, Deserialize)]
struct RecognizeResult {
    #[serde(default)]
    alternatives: Vec<RecognizeAlternative>,
}

#[derive(Debug, Deserialize)]
struct RecognizeAlternative {
    #[serde(default)]
    transcript: String,
}

impl RecognizeResponse {
    fn transcript(&self) -> String {
        self.results
            .iter()
            .filter_map(|r| r.alternatives.first())
            .map(|alt| alt.transcript.as_str())
            .collect()
    }
}

/// Engine backed by a credentialed cloud recognition API
#[derive(Debug, Clone)]
pub struct RemoteEngine {
    client: Client,
    endpoint: String,
    api_key: SecretString,
    timeout: Duration,
}

impl RemoteEngine {
    /// Create a new remote engine
    ///
    /// # Errors
    ///
    /// Returns `SpeechError::EngineMisconfigured` if no credential is configured
    /// or the HTTP client cannot be built.
    pub fn new(config: &SpeechConfig) -> Result<Self, SpeechError> {
        if config.api_key().trim().is_empty() {
            return Err(SpeechError::EngineMisconfigured(
                "remote engine requires an API key".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| {
                SpeechError::EngineMisconfigured(format!("Failed to create HTTP client: {e}"))
            })?;

        Ok(Self {
            client,
            endpoint: config.remote_endpoint.clone(),
            api_key: SecretString::from(config.api_key().to_string()),
            timeout: config.timeout(),
        })
    }
}

#[async_trait]
impl TranscriptionEngine for RemoteEngine {
    fn name(&self) -> &'static str {
        "remote"
    }

    #[instrument(skip(self, options), fields(audio = %audio.display(), language = options.language(), model = options.model()))]
    async fn transcribe(
        &self,
        audio: &Path,
        options: &TranscriptionOptions,
    ) -> Result<String, EngineError> {
        let content = BASE64.encode(tokio::fs::read(audio).await?);

        let request = RecognizeRequest {
            config: RecognitionConfig {
                encoding: "LINEAR16",
                sample_rate_hertz: REQUEST_SAMPLE_RATE,
                language_code: options.language(),
                model: options.model(),
                enable_automatic_punctuation: true,
            },
            audio: RecognitionAudio { content },
        };

        let start = Instant::now();
        let response = self
            .client
            .post(&self.endpoint)
            .header("X-Goog-Api-Key", self.api_key.expose_secret())
            .json(&request)
            .send()
            .await?;

        if start.elapsed() > self.timeout {
            return Err(SpeechError::Timeout {
                secs: self.timeout.as_secs(),
            }
            .into());
        }

        let status = response.status();
        let body = response.text().await?;

        if status != reqwest::StatusCode::OK {
            warn!(status = %status, "Recognition API returned an error");
            return Err(SpeechError::EngineRequestFailed(body).into());
        }

        let parsed: RecognizeResponse = serde_json::from_str(&body)?;
        let transcript = parsed.transcript();

        debug!(
            results = parsed.results.len(),
            chars = transcript.len(),
            "Remote recognition completed"
        );

        Ok(transcript)
    }
}

//! Integration tests for speech_to_text crate
//!
//! Runs the full pipeline with the real cascade and engines against mocked
//! recognition backends.

use std::io::Cursor;
use std::path::Path;

use hound::{SampleFormat, WavSpec, WavWriter};
use proptest::prelude::*;
use secrecy::SecretString;
use speech_to_text::validator::BASELINE_FORMATS;
use speech_to_text::{
    AudioUpload, AudioValidator, SpeechConfig, SpeechError, TranscriptionOptions,
    TranscriptionPipeline,
};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_config(scratch: &Path, server: &MockServer) -> SpeechConfig {
    SpeechConfig {
        local_endpoint: format!("{}/speech-api/v2/recognize", server.uri()),
        remote_endpoint: format!("{}/v1/speech:recognize", server.uri()),
        scratch_dir: Some(scratch.to_path_buf()),
        removal_retry_delay_ms: 10,
        ffmpeg_path: "/nonexistent/ffmpeg".to_string(),
        sox_path: "/nonexistent/sox".to_string(),
        ..Default::default()
    }
}

/// Encode a short 440 Hz tone as WAV
fn tone_wav(sample_format: SampleFormat, sample_rate: u32) -> Vec<u8> {
    let bits = if sample_format == SampleFormat::Float { 32 } else { 16 };
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: bits,
        sample_format,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(&mut cursor, spec).unwrap();
        for n in 0..sample_rate / 4 {
            let value = (n as f32 / sample_rate as f32 * 440.0 * std::f32::consts::TAU).sin() * 0.3;
            if sample_format == SampleFormat::Float {
                writer.write_sample(value).unwrap();
            } else {
                writer.write_sample((value * f32::from(i16::MAX)) as i16).unwrap();
            }
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}

fn scratch_files(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

async fn mount_local_backend(server: &MockServer, transcript: &str) {
    Mock::given(method("POST"))
        .and(path("/speech-api/v2/recognize"))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!(
            "{{\"result\":[]}}\n{{\"result\":[{{\"alternative\":[{{\"transcript\":\"{transcript}\"}}]}}]}}\n"
        )))
        .mount(server)
        .await;
}

// ============ Local engine ============

#[tokio::test]
async fn float_wav_is_decoded_and_transcribed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/speech-api/v2/recognize"))
        .and(query_param("lang", "en-US"))
        .and(header("content-type", "audio/l16; rate=44100"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"{"result":[{"alternative":[{"transcript":"testing one two"}]}]}"#,
        ))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let pipeline = TranscriptionPipeline::from_config(&test_config(dir.path(), &server)).unwrap();

    let upload =
        AudioUpload::new(tone_wav(SampleFormat::Float, 22_050), "audio/wav").with_filename("memo.wav");
    let options = TranscriptionOptions {
        language: Some("en-US".to_string()),
        ..Default::default()
    };

    let result = pipeline.run(&upload, &options).await.unwrap();
    assert_eq!(result.text, "testing one two");
    assert_eq!(result.detected_language.as_deref(), Some("en-US"));
    assert!(result.confidence.is_none());

    let remaining = scratch_files(dir.path());
    assert_eq!(remaining.len(), 1, "only the original upload stays: {remaining:?}");
}

#[tokio::test]
async fn integer_wav_skips_conversion() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("content-type", "audio/l16; rate=16000"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"{"result":[{"alternative":[{"transcript":"sin conversion"}]}]}"#,
        ))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let pipeline = TranscriptionPipeline::from_config(&test_config(dir.path(), &server)).unwrap();

    let upload = AudioUpload::new(tone_wav(SampleFormat::Int, 16_000), "audio/x-wav");
    let result = pipeline
        .run(&upload, &TranscriptionOptions::default())
        .await
        .unwrap();

    assert_eq!(result.text, "sin conversion");
    assert!(result.detected_language.is_none());
    assert_eq!(scratch_files(dir.path()).len(), 1);
}

#[tokio::test]
async fn silence_is_unrecognized() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{\"result\":[]}\n"))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let pipeline = TranscriptionPipeline::from_config(&test_config(dir.path(), &server)).unwrap();

    let upload = AudioUpload::new(tone_wav(SampleFormat::Int, 16_000), "audio/wav");
    let err = pipeline
        .run(&upload, &TranscriptionOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, SpeechError::Unrecognized));
}

#[tokio::test]
async fn undecodable_upload_fails_conversion_and_cleans_up() {
    let server = MockServer::start().await;
    mount_local_backend(&server, "never").await;

    let dir = tempfile::tempdir().unwrap();
    let pipeline = TranscriptionPipeline::from_config(&test_config(dir.path(), &server)).unwrap();

    let upload = AudioUpload::new(vec![0u8; 4096], "audio/ogg").with_filename("broken.ogg");
    let err = pipeline
        .run(&upload, &TranscriptionOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, SpeechError::ConversionFailed(_)));
    let remaining = scratch_files(dir.path());
    assert_eq!(remaining.len(), 1);
    assert!(remaining[0].ends_with(".ogg"));
}

// ============ Remote engine ============

#[tokio::test]
async fn remote_engine_runs_through_pipeline() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/speech:recognize"))
        .and(header("X-Goog-Api-Key", "remote-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "results": [
                { "alternatives": [{ "transcript": "buenos" }] },
                { "alternatives": [{ "transcript": " dias" }] }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config = SpeechConfig {
        engine: "Remote".to_string(),
        api_key: Some(SecretString::from("remote-key")),
        ..test_config(dir.path(), &server)
    };
    let pipeline = TranscriptionPipeline::from_config(&config).unwrap();

    let upload = AudioUpload::new(tone_wav(SampleFormat::Int, 16_000), "audio/wav");
    let result = pipeline
        .run(&upload, &TranscriptionOptions::default())
        .await
        .unwrap();
    assert_eq!(result.text, "buenos dias");
}

#[tokio::test]
async fn remote_engine_without_key_fails_at_construction() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config = SpeechConfig {
        engine: "remote".to_string(),
        ..test_config(dir.path(), &server)
    };

    let err = TranscriptionPipeline::from_config(&config).unwrap_err();
    assert!(matches!(err, SpeechError::EngineMisconfigured(_)));
}

// ============ Validation ============

#[tokio::test]
async fn oversized_upload_is_rejected_before_persisting() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let config = SpeechConfig {
        max_file_size_mb: 1,
        ..test_config(dir.path(), &server)
    };
    let pipeline = TranscriptionPipeline::from_config(&config).unwrap();

    let upload = AudioUpload::new(vec![0u8; 2 * 1024 * 1024], "audio/ogg").with_filename("big.ogg");
    let err = pipeline
        .run(&upload, &TranscriptionOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, SpeechError::FileTooLarge { max_mb: 1, .. }));
    assert!(scratch_files(dir.path()).is_empty());
}

proptest! {
    #[test]
    fn baseline_formats_always_validate(
        idx in 0usize..BASELINE_FORMATS.len(),
        configured in proptest::collection::vec("[a-z0-9]{1,5}", 0..4),
        stem in "[a-zA-Z0-9_]{1,12}",
    ) {
        let validator = AudioValidator::new(10, configured);
        let ext = BASELINE_FORMATS[idx];
        let upload = AudioUpload::new(vec![0u8; 64], "application/octet-stream")
            .with_filename(format!("{stem}.{ext}"));

        prop_assert_eq!(validator.validate(&upload).unwrap(), ext);
    }

    #[test]
    fn uploads_over_limit_never_validate(extra in 1usize..4096, limit in 1u64..3) {
        let validator = AudioValidator::new(limit, ["wav"]);
        let size = usize::try_from(limit).unwrap() * 1024 * 1024 + extra;
        let upload = AudioUpload::new(vec![0u8; size], "audio/wav").with_filename("a.wav");

        let is_too_large = matches!(validator.validate(&upload), Err(SpeechError::FileTooLarge { .. }));
        prop_assert!(is_too_large);
    }
}

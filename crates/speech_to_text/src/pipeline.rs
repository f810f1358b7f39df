//! End-to-end transcription pipeline
//!
//! validate → persist → normalize → transcribe, with converted
//! intermediates released on every exit path.

use std::path::Path;

use tracing::{debug, info, instrument};

use crate::config::SpeechConfig;
use crate::error::SpeechError;
use crate::normalizer::AudioNormalizer;
use crate::service::TranscriptionService;
use crate::temp_files::{ConvertedArtifact, TempFileManager};
use crate::types::{AudioFormat, AudioUpload, TranscriptionOptions, TranscriptionResult};
use crate::validator::AudioValidator;

/// Format handed to the engines
pub const ENGINE_INPUT_FORMAT: AudioFormat = AudioFormat::Wav;

/// Wires the pipeline stages together for one request at a time
#[derive(Debug, Clone)]
pub struct TranscriptionPipeline {
    validator: AudioValidator,
    files: TempFileManager,
    normalizer: AudioNormalizer,
    service: TranscriptionService,
    retain_original_upload: bool,
}

impl TranscriptionPipeline {
    /// Build the pipeline from configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the configured engine cannot be built.
    pub fn from_config(config: &SpeechConfig) -> Result<Self, SpeechError> {
        let files = TempFileManager::from_config(config);
        Ok(Self {
            validator: AudioValidator::from_config(config),
            normalizer: AudioNormalizer::from_config(config, files.clone()),
            files,
            service: TranscriptionService::from_config(config)?,
            retain_original_upload: config.retain_original_upload,
        })
    }

    /// Assemble a pipeline from its parts
    #[must_use]
    pub const fn new(
        validator: AudioValidator,
        files: TempFileManager,
        normalizer: AudioNormalizer,
        service: TranscriptionService,
    ) -> Self {
        Self {
            validator,
            files,
            normalizer,
            service,
            retain_original_upload: true,
        }
    }

    /// Whether the persisted original upload is kept after the request
    #[must_use]
    pub const fn with_retain_original_upload(mut self, retain: bool) -> Self {
        self.retain_original_upload = retain;
        self
    }

    /// Process one upload
    ///
    /// Validation runs before anything touches the disk. The converted
    /// intermediate is always removed; the persisted original is removed only
    /// when `retain_original_upload` is off.
    ///
    /// # Errors
    ///
    /// Returns the first `SpeechError` raised by any stage.
    #[instrument(skip(self, upload, options), fields(size_bytes = upload.size_bytes(), content_type = upload.content_type()))]
    pub async fn run(
        &self,
        upload: &AudioUpload,
        options: &TranscriptionOptions,
    ) -> Result<TranscriptionResult, SpeechError> {
        let extension = self.validator.validate(upload)?;
        let original = self.files.persist(upload, &extension).await?;

        let outcome = self.transcribe_persisted(&original, options).await;

        if self.retain_original_upload {
            debug!(path = %original.display(), "Keeping original upload");
        } else {
            self.files.remove(&original).await;
        }

        let text = outcome?;
        info!(chars = text.len(), engine = self.service.engine_name(), "Transcription completed");
        Ok(TranscriptionResult::new(text, options))
    }

    async fn transcribe_persisted(
        &self,
        original: &Path,
        options: &TranscriptionOptions,
    ) -> Result<String, SpeechError> {
        let normalized = self
            .normalizer
            .normalize(original, ENGINE_INPUT_FORMAT)
            .await?;

        let artifact = normalized
            .was_converted
            .then(|| ConvertedArtifact::new(normalized.path.clone(), self.files.clone()));

        let result = self.service.transcribe(&normalized.path, options).await;

        if let Some(artifact) = artifact {
            artifact.release().await;
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use hound::{SampleFormat, WavSpec, WavWriter};

    use super::*;
    use crate::normalizer::EngineAudioProbe;
    use crate::ports::{ConversionStrategy, MockTranscriptionEngine};

    /// Writes a valid integer WAV regardless of input
    struct WavStrategy;

    #[async_trait]
    impl ConversionStrategy for WavStrategy {
        fn id(&self) -> &'static str {
            "wav_stub"
        }

        async fn convert(
            &self,
            _input: &Path,
            output: &Path,
            _target: AudioFormat,
        ) -> Result<(), SpeechError> {
            write_wav(output);
            Ok(())
        }
    }

    struct FailingStrategy;

    #[async_trait]
    impl ConversionStrategy for FailingStrategy {
        fn id(&self) -> &'static str {
            "failing"
        }

        async fn convert(
            &self,
            _input: &Path,
            _output: &Path,
            _target: AudioFormat,
        ) -> Result<(), SpeechError> {
            Err(SpeechError::ConversionFailed("codec missing".to_string()))
        }
    }

    fn write_wav(path: &Path) {
        let spec = WavSpec {
            channels: 1,
            sample_rate: 16_000,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(path, spec).unwrap();
        for _ in 0..160 {
            writer.write_sample(0i16).unwrap();
        }
        writer.finalize().unwrap();
    }

    fn pipeline(
        dir: &Path,
        strategy: Arc<dyn ConversionStrategy>,
        engine: MockTranscriptionEngine,
    ) -> TranscriptionPipeline {
        let config = SpeechConfig::test(dir);
        let files = TempFileManager::from_config(&config);
        let normalizer =
            AudioNormalizer::with_strategies(vec![strategy], Arc::new(EngineAudioProbe), files.clone());
        TranscriptionPipeline::new(
            AudioValidator::from_config(&config),
            files,
            normalizer,
            TranscriptionService::with_engine(Arc::new(engine)),
        )
    }

    fn ogg_upload(size: usize) -> AudioUpload {
        AudioUpload::new(vec![0u8; size], "audio/ogg").with_filename("clip.ogg")
    }

    fn files_in(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn success_keeps_only_the_original() {
        let dir = tempfile::tempdir().unwrap();
        let mut engine = MockTranscriptionEngine::new();
        engine.expect_name().return_const("mock");
        engine
            .expect_transcribe()
            .withf(|path, _| path.extension().is_some_and(|e| e == "wav"))
            .times(1)
            .returning(|_, _| Ok("hola".to_string()));

        let pipeline = pipeline(dir.path(), Arc::new(WavStrategy), engine);
        let options = TranscriptionOptions {
            language: Some("en-US".to_string()),
            ..Default::default()
        };

        let result = pipeline.run(&ogg_upload(2048), &options).await.unwrap();
        assert_eq!(result.text, "hola");
        assert_eq!(result.detected_language.as_deref(), Some("en-US"));
        assert!(result.confidence.is_none());
        assert!(result.duration_secs.is_none());

        let remaining = files_in(dir.path());
        assert_eq!(remaining.len(), 1);
        assert!(remaining[0].ends_with(".ogg"));
    }

    #[tokio::test]
    async fn engine_failure_still_releases_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let mut engine = MockTranscriptionEngine::new();
        engine.expect_name().return_const("mock");
        engine
            .expect_transcribe()
            .returning(|_, _| Err(SpeechError::Unrecognized.into()));

        let pipeline = pipeline(dir.path(), Arc::new(WavStrategy), engine);
        let err = pipeline
            .run(&ogg_upload(512), &TranscriptionOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SpeechError::Unrecognized));

        let remaining = files_in(dir.path());
        assert_eq!(remaining.len(), 1);
        assert!(remaining[0].ends_with(".ogg"));
    }

    #[tokio::test]
    async fn conversion_failure_skips_engine() {
        let dir = tempfile::tempdir().unwrap();
        let mut engine = MockTranscriptionEngine::new();
        engine.expect_name().return_const("mock");
        engine.expect_transcribe().times(0);

        let pipeline = pipeline(dir.path(), Arc::new(FailingStrategy), engine);
        let err = pipeline
            .run(&ogg_upload(512), &TranscriptionOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SpeechError::ConversionFailed(msg) if msg == "codec missing"));
        assert_eq!(files_in(dir.path()).len(), 1);
    }

    #[tokio::test]
    async fn validation_failure_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut engine = MockTranscriptionEngine::new();
        engine.expect_name().return_const("mock");
        engine.expect_transcribe().times(0);

        let pipeline = pipeline(dir.path(), Arc::new(WavStrategy), engine);
        let upload = AudioUpload::new(vec![0u8; 16], "application/x-msdownload")
            .with_filename("virus.exe");

        let err = pipeline
            .run(&upload, &TranscriptionOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SpeechError::FormatUnsupported { .. }));
        assert!(files_in(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn original_removed_when_not_retained() {
        let dir = tempfile::tempdir().unwrap();
        let mut engine = MockTranscriptionEngine::new();
        engine.expect_name().return_const("mock");
        engine
            .expect_transcribe()
            .returning(|_, _| Ok(String::new()));

        let pipeline = pipeline(dir.path(), Arc::new(WavStrategy), engine)
            .with_retain_original_upload(false);
        let result = pipeline
            .run(&ogg_upload(512), &TranscriptionOptions::default())
            .await
            .unwrap();
        assert_eq!(result.text, "");
        assert!(result.detected_language.is_none());
        assert!(files_in(dir.path()).is_empty());
    }
}

//! Transcription endpoint

use axum::{
    Json,
    extract::{Multipart, State, multipart::MultipartError},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use speech_to_text::{AudioUpload, TranscriptionOptions, TranscriptionResult};
use tracing::{debug, info, instrument};
use validator::Validate;

use crate::{error::ApiError, middleware::validation::format_validation_errors, state::TranscriptionState};

/// Multipart field carrying the audio file
pub const FILE_FIELD: &str = "archivo";

/// Multipart field carrying the JSON options
pub const OPTIONS_FIELD: &str = "opciones";

/// Options accepted in the `opciones` field
#[derive(Debug, Default, Deserialize, Validate)]
pub struct OpcionesTranscripcion {
    pub idioma: Option<String>,
    pub modelo: Option<String>,
    #[validate(range(min = 0.0, max = 1.0, message = "must be between 0.0 and 1.0"))]
    pub sensibilidad: Option<f32>,
}

impl From<OpcionesTranscripcion> for TranscriptionOptions {
    fn from(opciones: OpcionesTranscripcion) -> Self {
        Self {
            language: opciones.idioma,
            model: opciones.modelo,
            sensitivity: opciones.sensibilidad,
        }
    }
}

/// Transcription response body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionResponse {
    pub texto: String,
    pub confianza: Option<f32>,
    pub idioma_detectado: Option<String>,
    pub duracion: Option<f64>,
}

impl From<TranscriptionResult> for TranscriptionResponse {
    fn from(result: TranscriptionResult) -> Self {
        Self {
            texto: result.text,
            confianza: result.confidence,
            idioma_detectado: result.detected_language,
            duracion: result.duration_secs,
        }
    }
}

/// Transcribe an uploaded audio file
///
/// The options are parsed before the upload is validated, so malformed
/// `opciones` JSON is a 400 even when the file would be rejected.
#[instrument(skip_all)]
pub async fn transcribe(
    State(state): State<TranscriptionState>,
    mut multipart: Multipart,
) -> Result<Json<TranscriptionResponse>, ApiError> {
    let mut upload = None;
    let mut raw_options = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            FILE_FIELD => {
                let filename = field.file_name().map(ToString::to_string);
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let body = field.bytes().await.map_err(multipart_error)?;

                let mut file = AudioUpload::new(body, content_type);
                if let Some(filename) = filename {
                    file = file.with_filename(filename);
                }
                upload = Some(file);
            },
            OPTIONS_FIELD => {
                raw_options = Some(field.text().await.map_err(multipart_error)?);
            },
            other => debug!(field = other, "Ignoring unknown multipart field"),
        }
    }

    let options = parse_options(raw_options.as_deref())?;
    let upload =
        upload.ok_or_else(|| ApiError::BadRequest(format!("Field '{FILE_FIELD}' is required")))?;

    info!(
        filename = upload.filename().unwrap_or_default(),
        content_type = upload.content_type(),
        size_bytes = upload.size_bytes(),
        language = options.language(),
        "Transcription requested"
    );

    let result = state.pipeline.run(&upload, &options).await?;
    Ok(Json(result.into()))
}

fn parse_options(raw: Option<&str>) -> Result<TranscriptionOptions, ApiError> {
    let Some(raw) = raw.filter(|r| !r.trim().is_empty()) else {
        return Ok(TranscriptionOptions::default());
    };

    let opciones: OpcionesTranscripcion = serde_json::from_str(raw)
        .map_err(|e| ApiError::BadRequest(format!("Invalid JSON in '{OPTIONS_FIELD}': {e}")))?;
    opciones
        .validate()
        .map_err(|e| ApiError::BadRequest(format_validation_errors(&e)))?;

    Ok(opciones.into())
}

fn multipart_error(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(err.body_text())
    } else {
        ApiError::BadRequest(err.body_text())
    }
}

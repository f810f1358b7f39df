//! Text completion endpoints

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use text_completion::{CompletionRequest, CompletionResponse};
use tracing::{info, instrument};
use validator::Validate;

use crate::{error::ApiError, middleware::ValidatedJson, state::CompletionState};

/// Message reported by the status endpoint
pub const STATUS_MESSAGE: &str =
    "El servicio de procesamiento de texto con DeepSeek está funcionando correctamente";

/// Completion request body
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ProcesamientoRequest {
    #[validate(length(min = 1, message = "must not be empty"))]
    pub texto: String,
    #[validate(range(min = 0.0, max = 1.0, message = "must be between 0.0 and 1.0"))]
    pub temperatura: Option<f32>,
    #[validate(range(min = 1, message = "must be greater than 0"))]
    pub max_tokens: Option<u32>,
    pub modelo: Option<String>,
}

impl From<ProcesamientoRequest> for CompletionRequest {
    fn from(request: ProcesamientoRequest) -> Self {
        Self {
            text: request.texto,
            temperature: request.temperatura,
            max_tokens: request.max_tokens,
            model: request.modelo,
        }
    }
}

/// Completion response body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcesamientoResponse {
    pub texto_procesado: String,
    pub modelo_usado: String,
    pub tokens_entrada: u32,
    pub tokens_salida: u32,
    pub tiempo_proceso: f64,
}

impl From<CompletionResponse> for ProcesamientoResponse {
    fn from(response: CompletionResponse) -> Self {
        Self {
            texto_procesado: response.text,
            modelo_usado: response.model,
            tokens_entrada: response.prompt_tokens,
            tokens_salida: response.completion_tokens,
            tiempo_proceso: response.elapsed_secs,
        }
    }
}

/// Status endpoint body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EstadoServicio {
    pub estado: String,
    pub mensaje: String,
    pub modelo_predeterminado: String,
    /// Seconds since the Unix epoch
    pub timestamp: f64,
}

/// Forward a prompt to the completion backend
#[instrument(skip_all)]
pub async fn process(
    State(state): State<CompletionState>,
    ValidatedJson(request): ValidatedJson<ProcesamientoRequest>,
) -> Result<Json<ProcesamientoResponse>, ApiError> {
    let request = CompletionRequest::from(request);
    let response = state.completion.complete(&request).await?;

    info!(
        model = %response.model,
        elapsed_secs = response.elapsed_secs,
        "Completion request served"
    );

    Ok(Json(response.into()))
}

/// Report the service status and default model
pub async fn status(State(state): State<CompletionState>) -> Json<EstadoServicio> {
    #[allow(clippy::cast_precision_loss)]
    let timestamp = chrono::Utc::now().timestamp_millis() as f64 / 1000.0;

    Json(EstadoServicio {
        estado: "operativo".to_string(),
        mensaje: STATUS_MESSAGE.to_string(),
        modelo_predeterminado: state.completion.default_model(),
        timestamp,
    })
}

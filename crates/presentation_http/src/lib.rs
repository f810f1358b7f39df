//! HTTP presentation layer
//!
//! Two small services share this crate:
//! - `voz-texto-server` - multipart audio upload to transcript
//! - `texto-ia-server` - JSON prompt to chat-completion proxy
//!
//! Both answer errors as `{"detail": "..."}`.

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod state;

pub use error::{ApiError, ErrorResponse};
pub use middleware::{RequestIdLayer, ValidatedJson, ValidationError};
pub use routes::{create_completion_router, create_transcription_router};
pub use server::{apply_middleware, serve};
pub use state::{CompletionState, TranscriptionState};

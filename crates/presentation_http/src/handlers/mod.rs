//! HTTP request handlers

pub mod completion;
pub mod health;
pub mod transcription;

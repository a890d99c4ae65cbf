//! Semantic labeler trait and implementations.

pub mod mock;
pub mod ollama;

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::TokenRecord;

pub use mock::{MockLabeler, MockReply};
pub use ollama::OllamaLabeler;

#[derive(Error, Debug)]
pub enum LabelerError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("model endpoint returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("model call timed out after {0:?}")]
    Timeout(Duration),
    #[error("model returned an empty response")]
    EmptyResponse,
    #[error("cancelled")]
    Cancelled,
    #[error("{0}")]
    Other(String),
}

/// One page's worth of work for the labeler.
#[derive(Debug, Clone, Serialize)]
pub struct PageRequest {
    pub page_number: u32,
    pub page_text: String,
    pub records: Vec<TokenRecord>,
    pub model_id: String,
}

/// A model that assigns semantic labels to a page's numeric tokens.
pub trait SemanticLabeler: Send + Sync {
    /// Short name used in logs (e.g. "ollama").
    fn name(&self) -> &str;

    /// Label one page. Returns the model's response text, which is expected
    /// (but not guaranteed) to be a JSON object.
    fn label<'a>(
        &'a self,
        request: &'a PageRequest,
    ) -> Pin<Box<dyn Future<Output = Result<String, LabelerError>> + Send + 'a>>;
}

//! Wire types and error classification for the Generative Language API.

use crate::transport::HttpResponse;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;

/// Generation method a discovered model must support to be usable.
pub const GENERATE_METHOD: &str = "generateContent";

const MODEL_PREFIX: &str = "models/";

/// Message fragments the API uses when a model id is unknown or cannot
/// serve `generateContent`. Only consulted when status codes say nothing.
const MISMATCH_MARKERS: &[&str] = &[
    "not found",
    "is not supported",
    "not supported for",
    "unsupported",
];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("missing API key: set GEMINI_API_KEY or [api] gemini_key in skimmer.toml")]
    MissingCredential,
    #[error("model {model} is unavailable: {message}")]
    ModelMismatch { model: String, message: String },
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("model {model} returned no content")]
    EmptyResult { model: String },
    #[error("no working model found; last error: {last_error}")]
    NoWorkingModel { last_error: String },
}

impl ApiError {
    /// Whether another candidate model may succeed where this one failed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ApiError::ModelMismatch { .. })
    }
}

#[derive(Debug, Default, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    error: Option<ErrorBody>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    message: String,
    /// Canonical status name, e.g. `NOT_FOUND`
    status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ListModelsResponse {
    #[serde(default)]
    models: Vec<ModelInfo>,
    error: Option<ErrorBody>,
}

/// One entry of the model listing.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelInfo {
    pub name: String,
    #[serde(default)]
    pub supported_generation_methods: Vec<String>,
}

impl ModelInfo {
    /// Model id usable in a generation URL (`models/` prefix removed)
    pub fn id(&self) -> &str {
        model_id(&self.name)
    }

    pub fn supports_generation(&self) -> bool {
        self.supported_generation_methods
            .iter()
            .any(|method| method == GENERATE_METHOD)
    }
}

/// Bare model id, accepting both `gemini-x` and `models/gemini-x`.
pub fn model_id(name: &str) -> &str {
    let name = name.trim();
    name.strip_prefix(MODEL_PREFIX).unwrap_or(name)
}

/// Request body for a single-turn generation call.
pub fn generate_request(prompt: &str) -> Value {
    json!({ "contents": [{ "parts": [{ "text": prompt }] }] })
}

/// Turn a generation response into the summary text or a classified error.
pub fn parse_generate_response(model: &str, response: HttpResponse) -> Result<String, ApiError> {
    let status = response.status;
    let success = response.is_success();
    let parsed: GenerateResponse = serde_json::from_value(response.body).unwrap_or_default();

    if !success || parsed.error.is_some() {
        return Err(classify(model, status, parsed.error.as_ref()));
    }

    let text = parsed
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|part| part.text)
                .collect::<Vec<_>>()
                .join("\n")
        })
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(ApiError::EmptyResult {
            model: model.to_string(),
        });
    }
    Ok(text)
}

/// Ids of the listed models that support content generation, in listing order.
pub fn parse_model_list(response: HttpResponse) -> Result<Vec<String>, ApiError> {
    let status = response.status;
    let success = response.is_success();
    let parsed: ListModelsResponse = serde_json::from_value(response.body).unwrap_or_default();

    if !success || parsed.error.is_some() {
        let message = error_message(status, parsed.error.as_ref());
        return Err(ApiError::Api { status, message });
    }

    Ok(parsed
        .models
        .iter()
        .filter(|model| model.supports_generation())
        .map(|model| model.id().to_string())
        .collect())
}

/// Classify a failed generation call.
///
/// Structured signals win: auth and quota statuses are always fatal, a 404 or
/// `NOT_FOUND` is always a model mismatch. Only otherwise is the message text
/// inspected.
pub(crate) fn classify(model: &str, status: u16, error: Option<&ErrorBody>) -> ApiError {
    let message = error_message(status, error);
    let code = error.and_then(|e| e.status.as_deref());

    let fatal = matches!(status, 401 | 403 | 429)
        || matches!(
            code,
            Some("UNAUTHENTICATED" | "PERMISSION_DENIED" | "RESOURCE_EXHAUSTED")
        );
    let mismatch = status == 404 || code == Some("NOT_FOUND") || is_mismatch_message(&message);

    if !fatal && mismatch {
        ApiError::ModelMismatch {
            model: model.to_string(),
            message,
        }
    } else {
        ApiError::Api { status, message }
    }
}

fn error_message(status: u16, error: Option<&ErrorBody>) -> String {
    error
        .map(|e| e.message.trim())
        .filter(|message| !message.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("HTTP status {status}"))
}

fn is_mismatch_message(message: &str) -> bool {
    let message = message.to_lowercase();
    MISMATCH_MARKERS.iter().any(|marker| message.contains(marker))
}

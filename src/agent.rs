//! Summary client with model fallback.
//!
//! Turns a versioned, multi-model generation API into one `summarize` call.
//! Candidates are tried in preference order; a "model not found" style failure
//! moves on to the next one, anything else aborts. When every configured
//! model is gone the provider's model listing is consulted once. The last
//! model that worked is remembered and tried alone on the next call.

use crate::api::{self, ApiError};
use crate::config::AgentConfig;
use crate::transport::{ReqwestTransport, Transport};
use parking_lot::RwLock;
use tracing::{debug, info, warn};

/// Input beyond this many characters is dropped before prompting.
pub const MAX_INPUT_CHARS: usize = 100_000;

pub struct SummaryClient<T = ReqwestTransport> {
    transport: T,
    base_url: String,
    models: Vec<String>,
    /// Last model that produced a summary. Only overwritten on success.
    resolved_model: RwLock<Option<String>>,
}

impl SummaryClient<ReqwestTransport> {
    /// Build a client talking to the configured endpoint over HTTPS
    pub fn from_config(config: &AgentConfig) -> Result<Self, ApiError> {
        let transport = ReqwestTransport::new(config.timeout())
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        Ok(Self::new(
            transport,
            config.base_url.clone(),
            config.models.clone(),
        ))
    }
}

impl<T: Transport> SummaryClient<T> {
    pub fn new(transport: T, base_url: impl Into<String>, models: Vec<String>) -> Self {
        Self {
            transport,
            base_url: base_url.into(),
            models: models
                .iter()
                .map(|model| api::model_id(model).to_string())
                .collect(),
            resolved_model: RwLock::new(None),
        }
    }

    /// Start with a model already known to work, e.g. from an earlier session.
    pub fn with_resolved_model(self, model: impl Into<String>) -> Self {
        let model = model.into();
        *self.resolved_model.write() = Some(api::model_id(&model).to_string());
        self
    }

    pub fn resolved_model(&self) -> Option<String> {
        self.resolved_model.read().clone()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Summarize `text`, falling back across candidate models as needed.
    pub async fn summarize(&self, text: &str, api_key: &str) -> Result<String, ApiError> {
        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Err(ApiError::MissingCredential);
        }

        let prompt = build_prompt(text);
        let cached = self.resolved_model();
        let candidates = match &cached {
            Some(model) => vec![model.clone()],
            None => self.models.clone(),
        };

        let mut last_error: Option<ApiError> = None;
        for model in &candidates {
            match self.generate(model, &prompt, api_key).await {
                Ok(summary) => {
                    if cached.as_deref() != Some(model.as_str()) {
                        self.remember(model);
                    }
                    return Ok(summary);
                }
                Err(err) if err.is_retryable() => {
                    info!(model = %model, error = %err, "model unavailable, trying next candidate");
                    last_error = Some(err);
                }
                Err(err) => return Err(err),
            }
        }

        let discovered = self.discover(api_key).await;
        let Some(model) = discovered
            .into_iter()
            .find(|model| !candidates.contains(model))
        else {
            let last_error = last_error
                .map(|err| err.to_string())
                .unwrap_or_else(|| "no candidate models configured".to_string());
            return Err(ApiError::NoWorkingModel { last_error });
        };

        info!(model = %model, "trying discovered model");
        match self.generate(&model, &prompt, api_key).await {
            Ok(summary) => {
                self.remember(&model);
                Ok(summary)
            }
            Err(err) => Err(ApiError::NoWorkingModel {
                last_error: err.to_string(),
            }),
        }
    }

    /// Ids of the models this key may use for content generation.
    pub async fn list_generation_models(&self, api_key: &str) -> Result<Vec<String>, ApiError> {
        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Err(ApiError::MissingCredential);
        }

        let url = self.endpoint("models", api_key)?;
        let response = self
            .transport
            .get_json(&url)
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        api::parse_model_list(response)
    }

    async fn generate(&self, model: &str, prompt: &str, api_key: &str) -> Result<String, ApiError> {
        let url = self.endpoint(&format!("models/{model}:{}", api::GENERATE_METHOD), api_key)?;
        debug!(model, "requesting generation");

        let response = self
            .transport
            .post_json(&url, &api::generate_request(prompt))
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        api::parse_generate_response(model, response)
    }

    /// Discovery never fails the outer call; problems just mean no candidates.
    async fn discover(&self, api_key: &str) -> Vec<String> {
        match self.list_generation_models(api_key).await {
            Ok(models) => {
                debug!(count = models.len(), "discovered generation models");
                models
            }
            Err(err) => {
                warn!(error = %err, "model discovery failed");
                Vec::new()
            }
        }
    }

    fn remember(&self, model: &str) {
        debug!(model, "caching resolved model");
        *self.resolved_model.write() = Some(model.to_string());
    }

    fn endpoint(&self, path: &str, api_key: &str) -> Result<String, ApiError> {
        let base = format!("{}/v1beta/{path}", self.base_url.trim_end_matches('/'));
        reqwest::Url::parse_with_params(&base, &[("key", api_key)])
            .map(String::from)
            .map_err(|e| ApiError::Transport(format!("invalid endpoint URL: {e}")))
    }
}

/// Keep at most `max_chars` characters of `text`, dropping the tail.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

fn build_prompt(text: &str) -> String {
    format!(
        r#"Summarise the following web page content. Respond in Markdown using exactly these three sections:

## Executive Summary
Two or three sentences stating what the page is about and its main conclusion.

## Key Points
A bulleted list of the most important facts, claims and takeaways.

## Detailed Analysis
A few paragraphs covering the arguments, evidence and context behind the key points.

Do not add any other sections or commentary.

---

{}"#,
        truncate_chars(text, MAX_INPUT_CHARS)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{HttpResponse, TransportError};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::{json, Value};
    use std::collections::HashMap;

    const KEY: &str = "test-key";

    #[derive(Debug, Clone)]
    enum Reply {
        Http(u16, Value),
        Offline,
    }

    #[derive(Debug, Clone)]
    struct Call {
        url: String,
        body: Option<Value>,
    }

    /// In-memory API: generation replies keyed by model, one listing reply.
    #[derive(Default)]
    struct FakeApi {
        generate: HashMap<String, Reply>,
        listing: Option<Reply>,
        calls: Mutex<Vec<Call>>,
    }

    impl FakeApi {
        fn new() -> Self {
            Self::default()
        }

        fn model(mut self, model: &str, reply: Reply) -> Self {
            self.generate.insert(model.to_string(), reply);
            self
        }

        fn listing(mut self, reply: Reply) -> Self {
            self.listing = Some(reply);
            self
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().clone()
        }

        /// Models a generation request was sent for, in order.
        fn attempted(&self) -> Vec<String> {
            self.calls()
                .iter()
                .filter_map(|call| model_from_url(&call.url))
                .collect()
        }

        fn listing_calls(&self) -> usize {
            self.calls()
                .iter()
                .filter(|call| call.body.is_none())
                .count()
        }

        fn answer(reply: Option<Reply>) -> Result<HttpResponse, TransportError> {
            match reply {
                Some(Reply::Http(status, body)) => Ok(HttpResponse::new(status, body)),
                Some(Reply::Offline) => Err(TransportError::Request("connection refused".into())),
                None => Ok(HttpResponse::new(404, not_found_body("unknown"))),
            }
        }
    }

    #[async_trait]
    impl Transport for FakeApi {
        async fn post_json(&self, url: &str, body: &Value) -> Result<HttpResponse, TransportError> {
            self.calls.lock().push(Call {
                url: url.to_string(),
                body: Some(body.clone()),
            });
            let model = model_from_url(url).unwrap_or_default();
            Self::answer(self.generate.get(&model).cloned())
        }

        async fn get_json(&self, url: &str) -> Result<HttpResponse, TransportError> {
            self.calls.lock().push(Call {
                url: url.to_string(),
                body: None,
            });
            Self::answer(Some(
                self.listing
                    .clone()
                    .unwrap_or(Reply::Http(200, json!({ "models": [] }))),
            ))
        }
    }

    fn model_from_url(url: &str) -> Option<String> {
        let rest = url.split("/v1beta/models/").nth(1)?;
        let (model, _) = rest.split_once(':')?;
        Some(model.to_string())
    }

    fn not_found_body(model: &str) -> Value {
        json!({ "error": {
            "code": 404,
            "message": format!("models/{model} is not found for API version v1beta, or is not supported for generateContent."),
            "status": "NOT_FOUND"
        } })
    }

    fn not_found(model: &str) -> Reply {
        Reply::Http(404, not_found_body(model))
    }

    fn ok(text: &str) -> Reply {
        Reply::Http(
            200,
            json!({ "candidates": [{ "content": { "parts": [{ "text": text }], "role": "model" } }] }),
        )
    }

    fn bad_key() -> Reply {
        Reply::Http(
            400,
            json!({ "error": {
                "code": 400,
                "message": "API key not valid. Please pass a valid API key.",
                "status": "INVALID_ARGUMENT"
            } }),
        )
    }

    fn entry(name: &str, methods: &[&str]) -> Value {
        json!({ "name": name, "supportedGenerationMethods": methods })
    }

    fn listing(models: Vec<Value>) -> Reply {
        Reply::Http(200, json!({ "models": models }))
    }

    fn client(api: FakeApi) -> SummaryClient<FakeApi> {
        SummaryClient::new(
            api,
            "https://api.test",
            vec!["model-a".to_string(), "model-b".to_string()],
        )
    }

    fn sent_text(call: &Call) -> String {
        call.body.as_ref().unwrap()["contents"][0]["parts"][0]["text"]
            .as_str()
            .unwrap()
            .to_string()
    }

    #[tokio::test]
    async fn missing_key_makes_no_calls() {
        let client = client(FakeApi::new().model("model-a", ok("summary")));

        for key in ["", "   "] {
            let err = client.summarize("text", key).await.unwrap_err();
            assert_eq!(err, ApiError::MissingCredential);
        }
        assert!(client.transport().calls().is_empty());
        assert_eq!(client.resolved_model(), None);
    }

    #[tokio::test]
    async fn falls_back_to_next_model_and_caches_it() {
        let client = client(
            FakeApi::new()
                .model("model-a", not_found("model-a"))
                .model("model-b", ok("B summary")),
        );

        let summary = client.summarize("page text", KEY).await.unwrap();
        assert_eq!(summary, "B summary");
        assert_eq!(client.resolved_model().as_deref(), Some("model-b"));
        assert_eq!(client.transport().attempted(), vec!["model-a", "model-b"]);

        let summary = client.summarize("more text", KEY).await.unwrap();
        assert_eq!(summary, "B summary");
        assert_eq!(
            client.transport().attempted(),
            vec!["model-a", "model-b", "model-b"]
        );
    }

    #[tokio::test]
    async fn first_success_is_cached() {
        let client = client(FakeApi::new().model("model-a", ok("A summary")));

        assert_eq!(client.summarize("t", KEY).await.unwrap(), "A summary");
        assert_eq!(client.resolved_model().as_deref(), Some("model-a"));
        assert_eq!(client.transport().attempted(), vec!["model-a"]);
    }

    #[tokio::test]
    async fn fatal_error_aborts_without_trying_other_models() {
        let client = client(
            FakeApi::new()
                .model("model-a", bad_key())
                .model("model-b", ok("B summary")),
        );

        let err = client.summarize("text", KEY).await.unwrap_err();
        assert_eq!(
            err,
            ApiError::Api {
                status: 400,
                message: "API key not valid. Please pass a valid API key.".to_string()
            }
        );
        assert_eq!(client.transport().attempted(), vec!["model-a"]);
        assert_eq!(client.transport().listing_calls(), 0);
        assert_eq!(client.resolved_model(), None);
    }

    #[tokio::test]
    async fn transport_failure_is_fatal() {
        let client = client(
            FakeApi::new()
                .model("model-a", Reply::Offline)
                .model("model-b", ok("B summary")),
        );

        let err = client.summarize("text", KEY).await.unwrap_err();
        assert!(matches!(err, ApiError::Transport(ref msg) if msg.contains("connection refused")));
        assert_eq!(client.transport().attempted(), vec!["model-a"]);
    }

    #[tokio::test]
    async fn empty_result_is_fatal() {
        let client = client(
            FakeApi::new()
                .model("model-a", Reply::Http(200, json!({ "candidates": [] })))
                .model("model-b", ok("B summary")),
        );

        let err = client.summarize("text", KEY).await.unwrap_err();
        assert_eq!(
            err,
            ApiError::EmptyResult {
                model: "model-a".to_string()
            }
        );
        assert_eq!(client.transport().attempted(), vec!["model-a"]);
    }

    #[tokio::test]
    async fn discovers_model_when_static_list_is_exhausted() {
        let client = client(
            FakeApi::new()
                .model("model-a", not_found("model-a"))
                .model("model-b", not_found("model-b"))
                .model("model-c", ok("C summary"))
                .listing(listing(vec![
                    entry("models/embedding-001", &["embedContent"]),
                    entry("models/model-c", &["generateContent", "countTokens"]),
                ])),
        );

        let summary = client.summarize("text", KEY).await.unwrap();
        assert_eq!(summary, "C summary");
        assert_eq!(client.resolved_model().as_deref(), Some("model-c"));
        assert_eq!(
            client.transport().attempted(),
            vec!["model-a", "model-b", "model-c"]
        );
        assert_eq!(client.transport().listing_calls(), 1);
    }

    #[tokio::test]
    async fn empty_discovery_reports_last_error() {
        let client = client(
            FakeApi::new()
                .model("model-a", not_found("model-a"))
                .model("model-b", not_found("model-b"))
                .listing(listing(vec![])),
        );

        let err = client.summarize("text", KEY).await.unwrap_err();
        match err {
            ApiError::NoWorkingModel { last_error } => {
                assert!(last_error.contains("models/model-b is not found"), "{last_error}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(client.resolved_model(), None);
    }

    #[tokio::test]
    async fn failed_discovery_degrades_to_no_working_model() {
        let client = client(
            FakeApi::new()
                .model("model-a", not_found("model-a"))
                .model("model-b", not_found("model-b"))
                .listing(Reply::Http(500, json!({ "error": { "message": "internal" } }))),
        );

        let err = client.summarize("text", KEY).await.unwrap_err();
        assert!(matches!(err, ApiError::NoWorkingModel { ref last_error } if last_error.contains("model-b")));
    }

    #[tokio::test]
    async fn discovered_model_failure_is_terminal() {
        let client = client(
            FakeApi::new()
                .model("model-a", not_found("model-a"))
                .model("model-b", not_found("model-b"))
                .model("model-c", bad_key())
                .listing(listing(vec![entry("models/model-c", &["generateContent"])])),
        );

        let err = client.summarize("text", KEY).await.unwrap_err();
        assert!(matches!(err, ApiError::NoWorkingModel { ref last_error } if last_error.contains("API key not valid")));
        assert_eq!(client.resolved_model(), None);
    }

    #[tokio::test]
    async fn discovery_skips_models_already_tried() {
        let client = client(
            FakeApi::new()
                .model("model-a", not_found("model-a"))
                .model("model-b", not_found("model-b"))
                .listing(listing(vec![entry("models/model-a", &["generateContent"])])),
        );

        let err = client.summarize("text", KEY).await.unwrap_err();
        assert!(matches!(err, ApiError::NoWorkingModel { .. }));
        assert_eq!(client.transport().attempted(), vec!["model-a", "model-b"]);
    }

    #[tokio::test]
    async fn cached_model_failure_goes_straight_to_discovery() {
        let client = client(
            FakeApi::new()
                .model("retired", not_found("retired"))
                .model("model-a", ok("A summary"))
                .listing(listing(vec![])),
        )
        .with_resolved_model("retired");

        let err = client.summarize("text", KEY).await.unwrap_err();
        assert!(matches!(err, ApiError::NoWorkingModel { ref last_error } if last_error.contains("retired")));
        assert_eq!(client.transport().attempted(), vec!["retired"]);
        // Failure never clears the slot.
        assert_eq!(client.resolved_model().as_deref(), Some("retired"));
    }

    #[tokio::test]
    async fn cached_model_is_replaced_by_discovered_one() {
        let client = client(
            FakeApi::new()
                .model("retired", not_found("retired"))
                .model("model-z", ok("Z summary"))
                .listing(listing(vec![entry("models/model-z", &["generateContent"])])),
        )
        .with_resolved_model("retired");

        assert_eq!(client.summarize("text", KEY).await.unwrap(), "Z summary");
        assert_eq!(client.resolved_model().as_deref(), Some("model-z"));
    }

    #[tokio::test]
    async fn long_input_is_truncated_before_sending() {
        let client = client(FakeApi::new().model("model-a", ok("summary")));
        let text = format!("{}{}", "§".repeat(MAX_INPUT_CHARS), "¤".repeat(500));

        client.summarize(&text, KEY).await.unwrap();

        let calls = client.transport().calls();
        let sent = sent_text(&calls[0]);
        assert_eq!(sent.chars().filter(|&c| c == '§').count(), MAX_INPUT_CHARS);
        assert!(!sent.contains('¤'));
        assert!(sent.ends_with('§'));
    }

    #[tokio::test]
    async fn prompt_requests_three_sections() {
        let client = client(FakeApi::new().model("model-a", ok("summary")));
        client.summarize("The page body.", KEY).await.unwrap();

        let sent = sent_text(&client.transport().calls()[0]);
        for section in ["## Executive Summary", "## Key Points", "## Detailed Analysis"] {
            assert!(sent.contains(section), "missing {section}");
        }
        assert!(sent.ends_with("The page body."));
    }

    #[tokio::test]
    async fn request_url_carries_model_and_key() {
        let client = client(FakeApi::new().model("model-a", ok("summary")));
        client.summarize("text", KEY).await.unwrap();

        assert_eq!(
            client.transport().calls()[0].url,
            "https://api.test/v1beta/models/model-a:generateContent?key=test-key"
        );
    }

    #[tokio::test]
    async fn list_generation_models_surfaces_failures() {
        let client = client(FakeApi::new().listing(bad_key()));
        let err = client.list_generation_models(KEY).await.unwrap_err();
        assert!(matches!(err, ApiError::Api { status: 400, .. }));

        let err = client.list_generation_models("").await.unwrap_err();
        assert_eq!(err, ApiError::MissingCredential);
    }

    #[tokio::test]
    async fn prefixed_model_ids_are_normalised() {
        let client = SummaryClient::new(
            FakeApi::new().model("model-b", ok("B summary")),
            "https://api.test",
            vec!["models/model-a".to_string(), " models/model-b".to_string()],
        );

        assert_eq!(client.summarize("text", KEY).await.unwrap(), "B summary");
        assert_eq!(client.transport().attempted(), vec!["model-a", "model-b"]);
        assert!(client
            .transport()
            .calls()
            .iter()
            .all(|call| !call.url.contains("models/models/")));
        assert_eq!(client.resolved_model().as_deref(), Some("model-b"));

        let cached = SummaryClient::new(FakeApi::new(), "https://api.test", Vec::new())
            .with_resolved_model("models/model-b");
        assert_eq!(cached.resolved_model().as_deref(), Some("model-b"));
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("short", 100), "short");
        assert_eq!(truncate_chars("", 0), "");
        assert_eq!(truncate_chars("abc", 0), "");
    }
}

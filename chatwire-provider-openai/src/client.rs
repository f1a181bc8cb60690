//! OpenAI-compatible API client struct and builder.

use std::future::Future;
use std::time::Duration;

use chatwire_types::{AskOptions, Backend, BackendError, Capabilities, Message, Reply};

use crate::error::{map_http_status, map_reqwest_error};
use crate::mapping::{from_api_response, model_ids, to_api_request};
use crate::streaming::stream_response;

/// Default model for the hosted OpenAI API.
const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Default OpenAI API base URL.
const DEFAULT_BASE_URL: &str = "https://api.openai.com";

/// Default model for a local LM Studio server.
const LOCAL_MODEL: &str = "qwen2.5-coder-3b-instruct";

/// Default LM Studio server address.
const LOCAL_BASE_URL: &str = "http://localhost:1234";

/// Client for an OpenAI-compatible Chat Completions endpoint.
///
/// Implements [`Backend`] for use anywhere a backend is accepted. Requests on
/// one client are independent; conversation ordering is the caller's concern.
///
/// # Example
///
/// ```no_run
/// use chatwire_provider_openai::OpenAi;
///
/// let hosted = OpenAi::new("sk-...")
///     .model("gpt-4o")
///     .organization("org-...");
///
/// let local = OpenAi::local()
///     .base_url("http://127.0.0.1:1234")
///     .model("deepseek-r1-distill-qwen-7b");
/// ```
#[derive(Debug, Clone)]
pub struct OpenAi {
    /// Bearer token; `None` sends no `Authorization` header.
    pub(crate) api_key: Option<String>,
    /// Model identifier sent with every request.
    pub(crate) model: String,
    /// API base URL, without the `/v1/...` path.
    pub(crate) base_url: String,
    /// Optional organization ID for multi-org accounts.
    pub(crate) organization: Option<String>,
    /// `max_tokens` sent with every request, if any.
    pub(crate) max_tokens: Option<i64>,
    /// Whole-request timeout.
    pub(crate) timeout: Option<Duration>,
    /// Shared HTTP client.
    pub(crate) client: reqwest::Client,
}

impl OpenAi {
    /// Create a client for the hosted OpenAI API.
    ///
    /// Default model: `gpt-4o-mini`.
    /// Default base URL: `https://api.openai.com`.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            model: DEFAULT_MODEL.into(),
            base_url: DEFAULT_BASE_URL.into(),
            organization: None,
            max_tokens: None,
            timeout: None,
            client: reqwest::Client::new(),
        }
    }

    /// Create a client for a local LM Studio server.
    ///
    /// Default model: `qwen2.5-coder-3b-instruct`.
    /// Default base URL: `http://localhost:1234`.
    /// No authentication; `max_tokens` is `-1` (no limit).
    pub fn local() -> Self {
        Self {
            api_key: None,
            model: LOCAL_MODEL.into(),
            base_url: LOCAL_BASE_URL.into(),
            organization: None,
            max_tokens: Some(-1),
            timeout: None,
            client: reqwest::Client::new(),
        }
    }

    /// Override the model.
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Override the API base URL.
    ///
    /// Useful for testing with a local mock server or an API proxy. A trailing
    /// slash is ignored.
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the bearer token.
    #[must_use]
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Set the OpenAI organization ID.
    ///
    /// Sent as the `OpenAI-Organization` header on every request.
    #[must_use]
    pub fn organization(mut self, org: impl Into<String>) -> Self {
        self.organization = Some(org.into());
        self
    }

    /// Set `max_tokens` for every request.
    #[must_use]
    pub fn max_tokens(mut self, max_tokens: i64) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Set a whole-request timeout.
    ///
    /// For streaming requests this bounds the entire stream, not just the
    /// first byte.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// The configured model.
    #[must_use]
    pub fn model_name(&self) -> &str {
        &self.model
    }

    /// Build the chat completions endpoint URL.
    pub(crate) fn completions_url(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url)
    }

    /// Build the model listing endpoint URL.
    pub(crate) fn models_url(&self) -> String {
        format!("{}/v1/models", self.base_url)
    }

    /// Attach auth, organization and timeout to a request.
    fn decorate(&self, mut builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        if let Some(org) = &self.organization {
            builder = builder.header("OpenAI-Organization", org);
        }
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }
        builder
    }

    /// List the ids of the models the server offers.
    pub async fn models(&self) -> Result<Vec<String>, BackendError> {
        let url = self.models_url();
        tracing::debug!(url = %url, "listing models");

        let response = self
            .decorate(self.client.get(&url))
            .send()
            .await
            .map_err(|e| map_reqwest_error(e, self.timeout))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| map_reqwest_error(e, self.timeout))?;
        if status != reqwest::StatusCode::OK {
            return Err(map_http_status(status, &text));
        }

        let json: serde_json::Value = serde_json::from_str(&text)
            .map_err(|e| BackendError::InvalidResponse(format!("invalid JSON response: {e}")))?;
        model_ids(&json)
    }
}

impl Backend for OpenAi {
    fn capabilities(&self) -> Capabilities {
        Capabilities::ALL
    }

    /// Send a chat request.
    ///
    /// With `options.stream` the reply is a [`Reply::Stream`] decoded from
    /// the `data: ` framed body; otherwise the full body is read and
    /// `choices[0].message.content` is returned as [`Reply::Text`].
    fn ask(
        &self,
        messages: Vec<Message>,
        options: AskOptions,
    ) -> impl Future<Output = Result<Reply, BackendError>> + Send {
        let url = self.completions_url();
        let body = to_api_request(&messages, &options, &self.model, self.max_tokens);
        let request = self.decorate(self.client.post(&url)).json(&body);
        let timeout = self.timeout;

        async move {
            tracing::debug!(
                url = %url,
                model = %body["model"],
                stream = options.stream,
                messages = messages.len(),
                "sending chat completion request"
            );

            let response = request
                .send()
                .await
                .map_err(|e| map_reqwest_error(e, timeout))?;

            if options.stream {
                return Ok(Reply::Stream(stream_response(response, timeout).await?));
            }

            let status = response.status();
            let text = response
                .text()
                .await
                .map_err(|e| map_reqwest_error(e, timeout))?;
            if status != reqwest::StatusCode::OK {
                return Err(map_http_status(status, &text));
            }

            let json: serde_json::Value = serde_json::from_str(&text).map_err(|e| {
                BackendError::InvalidResponse(format!("invalid JSON response: {e}"))
            })?;
            Ok(Reply::Text(from_api_response(&json)?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hosted_defaults() {
        let client = OpenAi::new("sk-test-key");
        assert_eq!(client.model, DEFAULT_MODEL);
        assert_eq!(client.base_url, DEFAULT_BASE_URL);
        assert_eq!(client.api_key.as_deref(), Some("sk-test-key"));
        assert!(client.max_tokens.is_none());
    }

    #[test]
    fn local_defaults() {
        let client = OpenAi::local();
        assert_eq!(client.model, LOCAL_MODEL);
        assert_eq!(client.base_url, LOCAL_BASE_URL);
        assert!(client.api_key.is_none());
        assert_eq!(client.max_tokens, Some(-1));
    }

    #[test]
    fn builder_overrides() {
        let client = OpenAi::local()
            .model("deepseek-r1-distill-qwen-7b")
            .base_url("http://localhost:9999/")
            .api_key("lm-studio")
            .organization("org-abc123")
            .max_tokens(256)
            .timeout(Duration::from_secs(5));
        assert_eq!(client.model_name(), "deepseek-r1-distill-qwen-7b");
        assert_eq!(client.base_url, "http://localhost:9999");
        assert_eq!(client.api_key.as_deref(), Some("lm-studio"));
        assert_eq!(client.organization.as_deref(), Some("org-abc123"));
        assert_eq!(client.max_tokens, Some(256));
        assert_eq!(client.timeout, Some(Duration::from_secs(5)));
    }

    #[test]
    fn urls_include_path() {
        let client = OpenAi::new("k").base_url("http://localhost:9999");
        assert_eq!(
            client.completions_url(),
            "http://localhost:9999/v1/chat/completions"
        );
        assert_eq!(client.models_url(), "http://localhost:9999/v1/models");
    }

    #[test]
    fn declares_all_capabilities() {
        assert_eq!(OpenAi::local().capabilities(), Capabilities::ALL);
    }
}

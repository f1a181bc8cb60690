//! The conversation agent.

use chatwire_types::{
    AskOptions, Backend, BackendError, Capability, ChatHistory, ImageSource, Message,
    RecordingStream, Reply, ResponseFormat,
};

use crate::config::{AgentConfig, AgentType};

/// Errors from [`Agent::ask`].
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// The backend call failed.
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),
    /// An image attachment could not be read.
    #[error("cannot load image {input}: {source}")]
    Image {
        /// The image reference as given.
        input: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// The result of one [`Agent::ask`] call.
#[derive(Debug)]
pub enum Answer<'a> {
    /// The complete reply (non-streaming agent).
    Text(String),
    /// Reply fragments as they arrive (streaming agent). The agent's history
    /// receives the assembled reply once the stream concludes.
    Stream(RecordingStream<'a>),
    /// The backend lacks a capability this request needs; nothing was sent.
    Unsupported(Capability),
}

impl Answer<'_> {
    /// Resolve to the full reply text, draining the stream if there is one.
    ///
    /// Returns `Ok(None)` for [`Answer::Unsupported`].
    pub async fn into_text(self) -> Result<Option<String>, BackendError> {
        match self {
            Answer::Text(text) => Ok(Some(text)),
            Answer::Stream(stream) => stream.collect_text().await.map(Some),
            Answer::Unsupported(_) => Ok(None),
        }
    }

    /// Whether this is [`Answer::Unsupported`].
    #[must_use]
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Answer::Unsupported(_))
    }
}

/// A conversation agent over any [`Backend`].
///
/// Each [`ask`](Agent::ask) sends `[system prompt] ++ history ++ [user]` to
/// the backend and records the user turn and the assistant reply in the
/// agent's own [`ChatHistory`]. `ask` borrows the agent mutably and a
/// streamed answer keeps that borrow, so turns cannot overlap.
///
/// # Example
///
/// ```ignore
/// use chatwire_agent::{Agent, AgentType};
/// use chatwire_provider_openai::OpenAi;
///
/// let mut agent = Agent::new(OpenAi::local())
///     .agent_type(AgentType::GenericResponder)
///     .stream(true);
/// let answer = agent.ask("What is 1 + 4?", &[], None).await?;
/// ```
pub struct Agent<B> {
    backend: B,
    config: AgentConfig,
    history: ChatHistory,
}

impl<B: Backend> Agent<B> {
    /// Create an agent with the default [`AgentConfig`].
    pub fn new(backend: B) -> Self {
        Self::with_config(backend, AgentConfig::default())
    }

    /// Create an agent with an explicit configuration.
    pub fn with_config(backend: B, config: AgentConfig) -> Self {
        Self {
            backend,
            config,
            history: ChatHistory::new(),
        }
    }

    /// Set the persona.
    #[must_use]
    pub fn agent_type(mut self, agent_type: AgentType) -> Self {
        self.config.agent_type = agent_type;
        self
    }

    /// Append instructions to the system prompt.
    #[must_use]
    pub fn additional_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.config.additional_instructions = instructions.into();
        self
    }

    /// Replace the persona's system prompt.
    #[must_use]
    pub fn custom_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.custom_system_prompt = Some(prompt.into());
        self
    }

    /// Set the reply format.
    #[must_use]
    pub fn format(mut self, format: ResponseFormat) -> Self {
        self.config.format = format;
        self
    }

    /// Set the sampling temperature.
    #[must_use]
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.config.temperature = temperature;
        self
    }

    /// Stream replies as fragments.
    #[must_use]
    pub fn stream(mut self, stream: bool) -> Self {
        self.config.stream = stream;
        self
    }

    /// Extra backend request fields.
    #[must_use]
    pub fn extra(mut self, extra: serde_json::Value) -> Self {
        self.config.extra = Some(extra);
        self
    }

    /// The agent's configuration.
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Every user turn and assistant reply so far.
    pub fn history(&self) -> &ChatHistory {
        &self.history
    }

    /// The backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// The system message sent first on every request.
    pub fn system_message(&self) -> Message {
        Message::system(self.config.system_prompt())
    }

    fn options(&self) -> AskOptions {
        AskOptions {
            format: self.config.format,
            temperature: self.config.temperature,
            stream: self.config.stream,
            extra: self.config.extra.clone(),
        }
    }

    /// The first capability this request needs that the backend lacks.
    fn missing_capability(&self, has_images: bool) -> Option<Capability> {
        let caps = self.backend.capabilities();
        if self.config.stream && !caps.streaming {
            Some(Capability::Streaming)
        } else if self.config.format == ResponseFormat::Json && !caps.json_format {
            Some(Capability::JsonFormat)
        } else if has_images && !caps.images {
            Some(Capability::Images)
        } else {
            None
        }
    }

    /// Ask the backend about `prompt`.
    ///
    /// `images` are file paths, URLs, or base64 data (see
    /// [`ImageSource::resolve`]). `history` is sent between the system prompt
    /// and the new user message.
    ///
    /// The user message is recorded before the backend is called. A text
    /// reply is recorded immediately; a streamed reply is recorded once the
    /// stream concludes. When the backend lacks a needed capability, nothing
    /// is sent or recorded and [`Answer::Unsupported`] is returned.
    pub async fn ask(
        &mut self,
        prompt: &str,
        images: &[&str],
        history: Option<&[Message]>,
    ) -> Result<Answer<'_>, AgentError> {
        if let Some(capability) = self.missing_capability(!images.is_empty()) {
            tracing::debug!(%capability, "backend lacks capability, skipping request");
            return Ok(Answer::Unsupported(capability));
        }

        let images = images
            .iter()
            .map(|input| {
                ImageSource::resolve(input).map_err(|source| AgentError::Image {
                    input: (*input).to_string(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let user = Message::user(prompt).with_images(images);

        let mut prompts = vec![self.system_message()];
        if let Some(history) = history {
            prompts.extend_from_slice(history);
        }
        prompts.push(user.clone());
        self.history.push(user);

        let options = self.options();
        tracing::debug!(
            agent_type = ?self.config.agent_type,
            stream = options.stream,
            messages = prompts.len(),
            "asking backend"
        );

        let reply = self.backend.ask(prompts, options).await?;
        match reply {
            Reply::Stream(stream) if self.config.stream => {
                Ok(Answer::Stream(stream.recorded(&mut self.history)))
            }
            Reply::Stream(stream) => {
                let text = stream.collect_text().await?;
                self.history.push(Message::assistant(text.clone()));
                Ok(Answer::Text(text))
            }
            Reply::Text(text) => {
                self.history.push(Message::assistant(text.clone()));
                Ok(Answer::Text(text))
            }
        }
    }
}

impl<B> std::fmt::Debug for Agent<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("config", &self.config)
            .field("history", &self.history.len())
            .finish_non_exhaustive()
    }
}

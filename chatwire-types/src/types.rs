//! Core message, history, and option types.

use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

/// The role of a message participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Instructions that frame the whole conversation.
    System,
    /// A human user.
    User,
    /// The model.
    Assistant,
}

impl Role {
    /// The wire name of this role (`"system"`, `"user"`, `"assistant"`).
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// Source of an image attached to a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ImageSource {
    /// Base64-encoded image data.
    Base64 {
        /// MIME type (e.g. "image/png").
        media_type: String,
        /// Base64-encoded data.
        data: String,
    },
    /// URL to an image (`http(s)://` or a `data:` URI).
    Url {
        /// The image URL.
        url: String,
    },
}

impl ImageSource {
    /// Resolve a user-supplied image reference.
    ///
    /// - `http://`, `https://` and `data:` strings become [`ImageSource::Url`].
    /// - A path to an existing file is read and base64-encoded; the media type
    ///   is taken from the file extension.
    /// - Anything else is taken to be base64 PNG data already.
    pub fn resolve(input: &str) -> std::io::Result<Self> {
        if input.starts_with("http://") || input.starts_with("https://") || input.starts_with("data:")
        {
            return Ok(ImageSource::Url { url: input.to_string() });
        }

        let path = Path::new(input);
        if path.is_file() {
            return Self::from_path(path);
        }

        Ok(ImageSource::Base64 {
            media_type: "image/png".into(),
            data: input.to_string(),
        })
    }

    /// Read an image file and base64-encode it.
    pub fn from_path(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        Ok(ImageSource::Base64 {
            media_type: media_type_for(path).into(),
            data: STANDARD.encode(bytes),
        })
    }
}

fn media_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "image/png",
    }
}

/// A single role-tagged message in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Who authored the message.
    pub role: Role,
    /// The text of the message.
    pub content: String,
    /// Images attached to the message (multimodal models only).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<ImageSource>,
}

impl Message {
    /// Build a text-only message.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            images: Vec::new(),
        }
    }

    /// A system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// A user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// An assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Attach images to this message.
    #[must_use]
    pub fn with_images(mut self, images: impl IntoIterator<Item = ImageSource>) -> Self {
        self.images.extend(images);
        self
    }
}

/// Ordered, append-only log of conversation turns.
///
/// Entries can be added and read but never removed or reordered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatHistory {
    entries: Vec<Message>,
}

impl ChatHistory {
    /// An empty history.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message to the end of the log.
    pub fn push(&mut self, message: Message) {
        self.entries.push(message);
    }

    /// All entries, oldest first.
    #[must_use]
    pub fn entries(&self) -> &[Message] {
        &self.entries
    }

    /// The most recent entry.
    #[must_use]
    pub fn last(&self) -> Option<&Message> {
        self.entries.last()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the log has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over entries, oldest first.
    pub fn iter(&self) -> std::slice::Iter<'_, Message> {
        self.entries.iter()
    }
}

impl From<Vec<Message>> for ChatHistory {
    fn from(entries: Vec<Message>) -> Self {
        Self { entries }
    }
}

impl<'a> IntoIterator for &'a ChatHistory {
    type Item = &'a Message;
    type IntoIter = std::slice::Iter<'a, Message>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Requested shape of the model's reply.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseFormat {
    /// Free-form text.
    #[default]
    Text,
    /// A single JSON object.
    Json,
}

/// Per-request options passed to a [`Backend`](crate::Backend).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AskOptions {
    /// Requested reply format.
    #[serde(default)]
    pub format: ResponseFormat,
    /// Sampling temperature.
    pub temperature: f32,
    /// Whether to stream the reply as fragments.
    #[serde(default)]
    pub stream: bool,
    /// Extra backend-specific request fields, merged into the request body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<serde_json::Value>,
}

impl Default for AskOptions {
    fn default() -> Self {
        Self {
            format: ResponseFormat::Text,
            temperature: 0.8,
            stream: false,
            extra: None,
        }
    }
}

/// Optional features a backend may or may not support.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Incremental fragment streaming.
    Streaming,
    /// JSON-object response format.
    JsonFormat,
    /// Image attachments.
    Images,
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Capability::Streaming => "streaming",
            Capability::JsonFormat => "json format",
            Capability::Images => "images",
        })
    }
}

/// The optional capabilities a backend declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// Supports streaming replies.
    pub streaming: bool,
    /// Supports [`ResponseFormat::Json`].
    pub json_format: bool,
    /// Accepts image attachments.
    pub images: bool,
}

impl Capabilities {
    /// Every optional capability enabled.
    pub const ALL: Capabilities = Capabilities {
        streaming: true,
        json_format: true,
        images: true,
    };

    /// Text-only, non-streaming.
    pub const TEXT_ONLY: Capabilities = Capabilities {
        streaming: false,
        json_format: false,
        images: false,
    };

    /// Whether `capability` is supported.
    #[must_use]
    pub fn supports(&self, capability: Capability) -> bool {
        match capability {
            Capability::Streaming => self.streaming,
            Capability::JsonFormat => self.json_format,
            Capability::Images => self.images,
        }
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::ALL
    }
}

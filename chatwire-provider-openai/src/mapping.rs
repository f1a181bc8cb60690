//! Request/response mapping between chatwire types and the Chat Completions format.
//!
//! Reference: <https://platform.openai.com/docs/api-reference/chat>

use chatwire_types::{AskOptions, BackendError, ImageSource, Message, ResponseFormat};

// ─── Request mapping ─────────────────────────────────────────────────────────

/// Build the Chat Completions JSON body for `messages`.
///
/// `max_tokens` is sent only when set (LM Studio uses `-1` for unbounded).
/// Fields from [`AskOptions::extra`] are merged last and can override
/// anything above.
#[must_use]
pub fn to_api_request(
    messages: &[Message],
    options: &AskOptions,
    model: &str,
    max_tokens: Option<i64>,
) -> serde_json::Value {
    let mut body = serde_json::json!({
        "model": model,
        "messages": messages.iter().map(map_message).collect::<Vec<_>>(),
        "temperature": options.temperature,
        "stream": options.stream,
    });

    if let Some(max_tokens) = max_tokens {
        body["max_tokens"] = serde_json::Value::from(max_tokens);
    }

    if options.format == ResponseFormat::Json {
        body["response_format"] = serde_json::json!({ "type": "json_object" });
    }

    if let (Some(serde_json::Value::Object(extra)), serde_json::Value::Object(body_map)) =
        (&options.extra, &mut body)
    {
        for (k, v) in extra {
            body_map.insert(k.clone(), v.clone());
        }
    }

    body
}

/// Map one [`Message`] to the wire format.
///
/// Text-only messages use a plain string `content`; messages with images use
/// an array of `text` and `image_url` parts.
fn map_message(message: &Message) -> serde_json::Value {
    if message.images.is_empty() {
        return serde_json::json!({
            "role": message.role.as_str(),
            "content": message.content,
        });
    }

    let mut parts = vec![serde_json::json!({
        "type": "text",
        "text": message.content,
    })];
    parts.extend(message.images.iter().map(|image| {
        serde_json::json!({
            "type": "image_url",
            "image_url": { "url": image_url(image) },
        })
    }));

    serde_json::json!({
        "role": message.role.as_str(),
        "content": parts,
    })
}

fn image_url(image: &ImageSource) -> String {
    match image {
        ImageSource::Base64 { media_type, data } => format!("data:{media_type};base64,{data}"),
        ImageSource::Url { url } => url.clone(),
    }
}

// ─── Response mapping ────────────────────────────────────────────────────────

/// Extract the reply text from a non-streaming response body.
///
/// Reads `choices[0].message.content`. A `null` content (e.g. a refusal or a
/// tool-only reply) is returned as an empty string.
pub fn from_api_response(body: &serde_json::Value) -> Result<String, BackendError> {
    let message = body["choices"]
        .as_array()
        .and_then(|choices| choices.first())
        .map(|choice| &choice["message"])
        .ok_or_else(|| BackendError::InvalidResponse("response has no choices".into()))?;

    match &message["content"] {
        serde_json::Value::String(text) => Ok(text.clone()),
        serde_json::Value::Null => Ok(String::new()),
        other => Err(BackendError::InvalidResponse(format!(
            "unexpected message content: {other}"
        ))),
    }
}

/// Extract model ids from a `/v1/models` response body.
pub fn model_ids(body: &serde_json::Value) -> Result<Vec<String>, BackendError> {
    let data = body["data"]
        .as_array()
        .ok_or_else(|| BackendError::InvalidResponse("model list has no data array".into()))?;
    Ok(data
        .iter()
        .filter_map(|model| model["id"].as_str().map(String::from))
        .collect())
}

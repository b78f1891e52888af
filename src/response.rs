//! Structural validation of the text model's reply.
//!
//! Only the envelope is checked; the generated code itself is never inspected.
use crate::protocol::ImageRequest;
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MalformedResponse {
    #[error("Failed to parse AI response. Please try again.")]
    Unparsable(#[source] serde_json::Error),
    #[error("Invalid response structure from AI. Please try again.")]
    MissingField(&'static str),
}

/// What the reply asks for in `imageGenerationPrompt`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageDirective {
    Generate(ImageRequest),
    /// named, but not usable; its placeholder still has to be resolved
    Unusable { name: String },
}

/// Validated model reply; untyped JSON never leaves this module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelReply {
    pub new_code: String,
    pub explanation: String,
    pub image: Option<ImageDirective>,
}

impl ModelReply {
    pub fn image_request(&self) -> Option<&ImageRequest> {
        match &self.image {
            Some(ImageDirective::Generate(request)) => Some(request),
            _ => None,
        }
    }
}

pub fn parse_model_reply(raw: &str) -> Result<ModelReply, MalformedResponse> {
    let cleaned = strip_code_fence(raw);
    let value = match serde_json::from_str::<Value>(cleaned) {
        Ok(value) => value,
        // models sometimes wrap the object in a sentence or two
        Err(err) => outermost_object(cleaned)
            .and_then(|span| serde_json::from_str::<Value>(span).ok())
            .ok_or(MalformedResponse::Unparsable(err))?,
    };

    let object = value
        .as_object()
        .ok_or(MalformedResponse::MissingField("newCode"))?;

    Ok(ModelReply {
        new_code: required_text(object, "newCode")?,
        explanation: required_text(object, "explanation")?,
        image: image_directive(object.get("imageGenerationPrompt")),
    })
}

/// Remove a surrounding ``` / ```json fence, if any.
pub fn strip_code_fence(raw: &str) -> &str {
    let text = raw.trim();
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // drop the info string ("json", "JSON", ...) up to the first newline
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest.trim_start_matches(|c: char| c.is_ascii_alphabetic()),
    };
    body.trim_end()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim()
}

fn outermost_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

fn required_text(object: &Map<String, Value>, key: &'static str) -> Result<String, MalformedResponse> {
    match object.get(key) {
        Some(Value::String(text)) if !text.trim().is_empty() => Ok(text.clone()),
        _ => Err(MalformedResponse::MissingField(key)),
    }
}

fn image_directive(value: Option<&Value>) -> Option<ImageDirective> {
    let object = match value? {
        Value::Null => return None,
        Value::Object(object) => object,
        other => {
            tracing::warn!(?other, "ignoring non-object imageGenerationPrompt");
            return None;
        }
    };

    let name = object.get("name").and_then(Value::as_str).map(str::trim);
    let description = object.get("description").and_then(Value::as_str).map(str::trim);
    match (name, description) {
        (Some(name), Some(description)) if is_asset_name(name) && !description.is_empty() => {
            Some(ImageDirective::Generate(ImageRequest {
                name: name.to_string(),
                description: description.to_string(),
            }))
        }
        (Some(name), _) if is_asset_name(name) => {
            tracing::warn!(%name, "imageGenerationPrompt without a usable description");
            Some(ImageDirective::Unusable { name: name.to_string() })
        }
        _ => {
            tracing::warn!(?object, "ignoring incomplete imageGenerationPrompt");
            None
        }
    }
}

/// Asset names become part of placeholder tokens and storage keys.
pub fn is_asset_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

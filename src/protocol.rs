//! Wire types shared by the studio front end and the generation service.
//!
//! Field names follow the JSON contract of `POST /api/generate` (camelCase),
//! so the same structs serialize in the browser and deserialize in axum.
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// asset name -> dereferenceable URL (http(s) or data URL)
///
/// BTreeMap keeps the serialized form stable, which the prompt relies on.
pub type AssetMap = BTreeMap<String, String>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    #[serde(default, deserialize_with = "null_as_default")]
    pub current_code: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub prompt_history: Vec<String>,
    pub new_prompt: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub existing_assets: AssetMap,
}

// clients send `null` for "nothing yet"
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestRejection {
    /// `newPrompt` missing, not a string, or blank
    InvalidPrompt,
    /// anything else in the envelope has the wrong shape
    InvalidBody(String),
}

impl GenerationRequest {
    pub fn new(new_prompt: impl Into<String>) -> Self {
        GenerationRequest {
            new_prompt: new_prompt.into(),
            ..Default::default()
        }
    }

    /// Validate an untyped request body.
    ///
    /// The prompt is checked first so a bad prompt is always reported as
    /// such, whatever else is wrong with the body.
    pub fn from_json(body: Value) -> Result<Self, RequestRejection> {
        match body.get("newPrompt") {
            Some(Value::String(prompt)) if !prompt.trim().is_empty() => {}
            _ => return Err(RequestRejection::InvalidPrompt),
        }
        serde_json::from_value(body).map_err(|err| RequestRejection::InvalidBody(err.to_string()))
    }
}

/// Optional image request nested in the model reply. Transient: it only
/// drives asset generation and is never sent back to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRequest {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Image,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedAsset {
    #[serde(rename = "type")]
    pub kind: AssetKind,
    pub name: String,
    pub url: String,
}

impl GeneratedAsset {
    pub fn image(name: impl Into<String>, url: impl Into<String>) -> Self {
        GeneratedAsset {
            kind: AssetKind::Image,
            name: name.into(),
            url: url.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResult {
    pub new_code: String,
    pub explanation: String,
    #[serde(default)]
    pub generated_assets: Vec<GeneratedAsset>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

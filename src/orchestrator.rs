//! Request handler core: prompt -> model -> validated reply -> optional image -> result.
//!
//! ┌──────────────────────── Generation Flow ─────────────────────────┐
//! │                                                                  │
//! │  ReceivedRequest ─► Validated ─► ModelInvoked ─► ReplyValidated  │
//! │                                                      │           │
//! │                                  ┌───────────────────┤           │
//! │                                  ▼                   ▼           │
//! │                           ImageRequested        Completed        │
//! │                                  │                   ▲           │
//! │                                  └─► ImageResolved ──┘           │
//! │                                                                  │
//! │  Every arrow can fail, EXCEPT the image branch: a failed image   │
//! │  resolves its placeholder to null and the request still succeeds │
//! └──────────────────────────────────────────────────────────────────┘
//!
//! Stateless across requests. The only shared resource is the optional
//! blob store, written under per-request unique keys.
use crate::assets::{self, Resolution};
use crate::prompt::{compile_prompt, PromptInput};
use crate::protocol::{GeneratedAsset, GenerationRequest, GenerationResult, ImageRequest};
use crate::response::{parse_model_reply, ImageDirective, MalformedResponse};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

// ==================== Capabilities ====================
/// "given a composed instruction payload, returns text"
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate_text(&self, prompt: &str) -> Result<String>;
}

/// "given an image description, returns image bytes"
///
/// The asset name rides along for generators that key off it.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate_image(&self, request: &ImageRequest, config: &ImageConfig) -> Result<GeneratedImage>;
}

/// External object storage: put by key, public URL by convention.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<()>;
    fn public_url(&self, key: &str) -> String;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageConfig {
    #[serde(rename = "sampleCount")]
    pub number_of_images: u8,
    pub aspect_ratio: String,
    #[serde(rename = "safetySetting")]
    pub safety_filter_level: String,
    pub person_generation: String,
}

impl Default for ImageConfig {
    fn default() -> Self {
        ImageConfig {
            number_of_images: 1,
            aspect_ratio: "1:1".into(),
            safety_filter_level: "block_medium_and_above".into(),
            person_generation: "allow_adult".into(),
        }
    }
}

/// Opaque image payload; only the mime type is ever looked at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedImage {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

// ==================== Errors ====================
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Invalid prompt provided")]
    InvalidPrompt,
    #[error("An error occurred during generation")]
    Upstream(#[source] anyhow::Error),
    #[error(transparent)]
    Malformed(#[from] MalformedResponse),
}

// ==================== Orchestrator ====================
pub struct Orchestrator {
    text: Arc<dyn TextGenerator>,
    images: Arc<dyn ImageGenerator>,
    store: Option<Arc<dyn BlobStore>>,
    image_config: ImageConfig,
}

impl Orchestrator {
    pub fn new(text: Arc<dyn TextGenerator>, images: Arc<dyn ImageGenerator>) -> Self {
        Orchestrator {
            text,
            images,
            store: None,
            image_config: ImageConfig::default(),
        }
    }

    pub fn with_store(mut self, store: Arc<dyn BlobStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_image_config(mut self, config: ImageConfig) -> Self {
        self.image_config = config;
        self
    }

    #[tracing::instrument(name = "generation", skip_all, fields(history = request.prompt_history.len()))]
    pub async fn generate(&self, request: GenerationRequest) -> Result<GenerationResult, GenerationError> {
        if request.new_prompt.trim().is_empty() {
            return Err(GenerationError::InvalidPrompt);
        }

        let prompt = compile_prompt(&PromptInput::from(&request));
        tracing::debug!(bytes = prompt.len(), "invoking text model");
        let raw = self
            .text
            .generate_text(&prompt)
            .await
            .map_err(GenerationError::Upstream)?;

        let reply = parse_model_reply(&raw).map_err(|err| {
            tracing::error!(%err, raw = %raw, "unusable model reply");
            err
        })?;

        let mut new_code = reply.new_code;
        let mut generated_assets = Vec::new();
        match reply.image {
            None => {}
            Some(ImageDirective::Unusable { name }) => {
                // nothing will be produced; don't leave the token in place of a URL
                new_code = assets::resolve_placeholder(&new_code, &name, Resolution::Unavailable);
            }
            Some(ImageDirective::Generate(image)) => match self.produce_image(&image).await {
                Ok(url) => {
                    tracing::info!(name = %image.name, "image asset resolved");
                    new_code = assets::resolve_placeholder(&new_code, &image.name, Resolution::Url(&url));
                    generated_assets.push(GeneratedAsset::image(image.name, url));
                }
                Err(err) => {
                    // the code change stands on its own; degrade to the fallback rendering
                    tracing::warn!(name = %image.name, "image generation failed: {err:#}");
                    new_code = assets::resolve_placeholder(&new_code, &image.name, Resolution::Unavailable);
                }
            },
        }

        Ok(GenerationResult {
            new_code,
            explanation: reply.explanation,
            generated_assets,
        })
    }

    async fn produce_image(&self, request: &ImageRequest) -> Result<String> {
        tracing::info!(name = %request.name, description = %request.description, "generating image");
        let image = self
            .images
            .generate_image(request, &self.image_config)
            .await?;
        if image.bytes.is_empty() {
            return Err(anyhow!("image model returned no bytes"));
        }

        match &self.store {
            Some(store) => {
                let nonce = uuid::Uuid::new_v4().simple().to_string();
                let key = assets::asset_key(
                    &request.name,
                    &image.mime_type,
                    chrono::Utc::now().timestamp_millis(),
                    &nonce[..8],
                );
                store
                    .put(&key, image.bytes, &image.mime_type)
                    .await
                    .with_context(|| format!("Could not store asset : {key}"))?;
                Ok(store.public_url(&key))
            }
            None => Ok(assets::data_url(&image.mime_type, &image.bytes)),
        }
    }
}

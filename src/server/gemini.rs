//! Google Generative Language API: Gemini for code, Imagen for sprites.
use super::config::{ModelConfig, DEFAULT_IMAGE_MODEL};
use crate::orchestrator::{GeneratedImage, ImageConfig, ImageGenerator, TextGenerator};
use crate::protocol::ImageRequest;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine};
use serde::{Deserialize, Serialize};
use serde_json::json;

const API_KEY_HEADER: &str = "x-goog-api-key";

#[derive(Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    config: ModelConfig,
    image_model: String,
}

impl GeminiClient {
    pub fn new(config: ModelConfig) -> Self {
        GeminiClient {
            http: reqwest::Client::new(),
            config,
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
        }
    }

    pub fn with_image_model(mut self, model: impl Into<String>) -> Self {
        self.image_model = model.into();
        self
    }

    fn endpoint(&self, model: &str, method: &str) -> String {
        format!(
            "{}/v1beta/models/{}:{}",
            self.config.api_base.trim_end_matches('/'),
            model,
            method
        )
    }

    async fn post<T: for<'de> Deserialize<'de>>(&self, url: &str, body: &serde_json::Value) -> Result<T> {
        let resp = self
            .http
            .post(url)
            .header(API_KEY_HEADER, &self.config.api_key)
            .json(body)
            .send()
            .await
            .with_context(|| format!("request to {url} failed"))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(anyhow!("HTTP error {status} from {url}: {text}"));
        }
        resp.json::<T>()
            .await
            .with_context(|| format!("unexpected response shape from {url}"))
    }
}

// ==================== generateContent ====================
#[derive(Deserialize)]
struct ContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
    text: Option<String>,
}

impl ContentResponse {
    fn into_text(self) -> Option<String> {
        let content = self.candidates.into_iter().next()?.content?;
        let text: String = content.parts.into_iter().filter_map(|part| part.text).collect();
        (!text.is_empty()).then_some(text)
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate_text(&self, prompt: &str) -> Result<String> {
        tracing::info!(model = %self.config.text_model, "calling Gemini");
        let body = json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
            "generationConfig": {
                "temperature": self.config.temperature,
                "maxOutputTokens": self.config.max_output_tokens,
            },
        });
        let url = self.endpoint(&self.config.text_model, "generateContent");
        self.post::<ContentResponse>(&url, &body)
            .await?
            .into_text()
            .ok_or_else(|| anyhow!("Gemini returned no text"))
    }
}

// ==================== predict (Imagen) ====================
#[derive(Serialize)]
struct PredictRequest<'a> {
    instances: [Instance<'a>; 1],
    parameters: &'a ImageConfig,
}

#[derive(Serialize)]
struct Instance<'a> {
    prompt: &'a str,
}

#[derive(Deserialize)]
struct PredictResponse {
    #[serde(default)]
    predictions: Vec<Prediction>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Prediction {
    bytes_base64_encoded: Option<String>,
    mime_type: Option<String>,
}

impl PredictResponse {
    fn into_image(self) -> Result<GeneratedImage> {
        let prediction = self
            .predictions
            .into_iter()
            .find(|prediction| prediction.bytes_base64_encoded.is_some())
            .ok_or_else(|| anyhow!("Imagen returned no images (filtered by safety settings?)"))?;
        let encoded = prediction.bytes_base64_encoded.unwrap_or_default();
        let bytes = general_purpose::STANDARD
            .decode(encoded.as_bytes())
            .map_err(|e| anyhow!("Base64 decode error: {e}"))?;
        Ok(GeneratedImage {
            bytes,
            mime_type: prediction.mime_type.unwrap_or_else(|| "image/png".to_string()),
        })
    }
}

#[async_trait]
impl ImageGenerator for GeminiClient {
    async fn generate_image(&self, request: &ImageRequest, config: &ImageConfig) -> Result<GeneratedImage> {
        tracing::info!(model = %self.image_model, name = %request.name, "calling Imagen");
        let body = serde_json::to_value(PredictRequest {
            instances: [Instance { prompt: &request.description }],
            parameters: config,
        })?;
        let url = self.endpoint(&self.image_model, "predict");
        self.post::<PredictResponse>(&url, &body).await?.into_image()
    }
}

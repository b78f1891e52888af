//! Offline image backend: a 32x32 coloured tile per asset name.
use crate::orchestrator::{GeneratedImage, ImageConfig, ImageGenerator};
use crate::protocol::ImageRequest;
use anyhow::Result;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use std::collections::HashMap;

pub const SVG_MIME: &str = "image/svg+xml";

const FALLBACK: Swatch = Swatch {
    color: "#9C27B0",
    label: "?",
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Swatch {
    color: &'static str,
    label: &'static str,
}

// well known asset names of the starter game
static SWATCHES: Lazy<HashMap<&'static str, Swatch>> = Lazy::new(|| {
    HashMap::from([
        ("playerSprite", Swatch { color: "#4CAF50", label: "🐉" }),
        ("spikeSprite", Swatch { color: "#F44336", label: "⚠" }),
        ("platformSprite", Swatch { color: "#2196F3", label: "▭" }),
        ("backgroundImage", Swatch { color: "#87CEEB", label: "☁" }),
    ])
});

fn swatch(name: &str) -> Swatch {
    SWATCHES.get(name).copied().unwrap_or(FALLBACK)
}

pub fn placeholder_svg(name: &str) -> String {
    let Swatch { color, label } = swatch(name);
    format!(
        concat!(
            r#"<svg width="32" height="32" xmlns="http://www.w3.org/2000/svg">"#,
            r#"<rect width="32" height="32" fill="{}" rx="4"/>"#,
            r#"<text x="16" y="20" text-anchor="middle" fill="white" font-size="16" font-family="Arial">{}</text>"#,
            "</svg>"
        ),
        color, label
    )
}

/// Never calls out; the description is ignored.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlaceholderImages;

#[async_trait]
impl ImageGenerator for PlaceholderImages {
    async fn generate_image(&self, request: &ImageRequest, _config: &ImageConfig) -> Result<GeneratedImage> {
        tracing::debug!(name = %request.name, "placeholder image");
        Ok(GeneratedImage {
            bytes: placeholder_svg(&request.name).into_bytes(),
            mime_type: SVG_MIME.to_string(),
        })
    }
}

//! Placeholder tokens for pending images, and how resolved images are named.
use base64::{engine::general_purpose, Engine};

pub const PLACEHOLDER_PREFIX: &str = "PENDING_";

/// What a pending asset turned into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution<'a> {
    Url(&'a str),
    /// image generation failed; code falls back to its non-image path
    Unavailable,
}

pub fn placeholder_token(name: &str) -> String {
    format!("{PLACEHOLDER_PREFIX}{name}")
}

/// Replace every quoted `PENDING_<name>` literal in `code`.
///
/// - `'PENDING_x'` -> `'<url>'`, `"PENDING_x"` -> `"<url>"`
/// - `Unavailable` -> `null` for either quote style
///
/// Names missing from the code leave it untouched, so this can run for
/// every asset without checking first.
pub fn resolve_placeholder(code: &str, name: &str, resolution: Resolution) -> String {
    let token = placeholder_token(name);
    ['\'', '"'].iter().fold(code.to_string(), |code, &quote| {
        let literal = format!("{quote}{token}{quote}");
        if !code.contains(&literal) {
            return code;
        }
        let replacement = match resolution {
            Resolution::Url(url) => quoted(url, quote),
            Resolution::Unavailable => "null".to_string(),
        };
        code.replace(&literal, &replacement)
    })
}

fn quoted(text: &str, quote: char) -> String {
    let mut literal = String::with_capacity(text.len() + 2);
    literal.push(quote);
    for c in text.chars() {
        if c == quote || c == '\\' {
            literal.push('\\');
        }
        literal.push(c);
    }
    literal.push(quote);
    literal
}

/// Inline URL used when no blob store is configured.
pub fn data_url(mime_type: &str, bytes: &[u8]) -> String {
    format!(
        "data:{mime_type};base64,{}",
        general_purpose::STANDARD.encode(bytes)
    )
}

/// File extension for the image types the generators produce.
pub fn extension_for(mime_type: &str) -> &'static str {
    match mime_type {
        "image/png" => "png",
        "image/jpeg" | "image/jpg" => "jpg",
        "image/webp" => "webp",
        "image/gif" => "gif",
        "image/svg+xml" => "svg",
        _ => "bin",
    }
}

/// Blob key for a stored asset: `assets/<name>_<millis>_<nonce>.<ext>`.
///
/// Name plus timestamp plus nonce keeps concurrent requests from
/// overwriting each other's images.
pub fn asset_key(name: &str, mime_type: &str, timestamp_millis: i64, nonce: &str) -> String {
    format!(
        "assets/{name}_{timestamp_millis}_{nonce}.{}",
        extension_for(mime_type)
    )
}

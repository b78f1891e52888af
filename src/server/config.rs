use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;

const DEFAULT_PORT: u16 = 8787;
const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_TEXT_MODEL: &str = "gemini-1.5-flash";
pub(crate) const DEFAULT_IMAGE_MODEL: &str = "imagen-3.0-generate-002";
const DEFAULT_TEMPERATURE: f32 = 0.7;
const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 4000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(&'static str),
    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },
}

#[derive(Clone, Debug, PartialEq)]
pub struct ModelConfig {
    pub api_key: String,
    pub api_base: String,
    pub text_model: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ImageBackend {
    /// labelled SVG stand-ins, no model call
    Placeholder,
    Imagen { model: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreBackend {
    Local {
        directory: PathBuf,
    },
    /// S3 API compatible bucket (AWS, R2, MinIO ...)
    S3 {
        bucket: String,
        endpoint: Option<String>,
        region: Option<String>,
        access_key_id: Option<String>,
        secret_access_key: Option<String>,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub public_base_url: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    pub model: ModelConfig,
    pub images: ImageBackend,
    pub store: Option<StoreConfig>,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Same as `from_env`, reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let port: u16 = parse_or(var("PORT"), "PORT", DEFAULT_PORT)?;
        let host = var("GENENGINE_BIND").unwrap_or_else(|| "0.0.0.0".to_string());
        let addr = format!("{host}:{port}")
            .parse()
            .map_err(|_| ConfigError::InvalidValue {
                name: "GENENGINE_BIND",
                value: host.clone(),
            })?;

        let model = ModelConfig {
            api_key: var("GEMINI_API_KEY").ok_or(ConfigError::MissingVar("GEMINI_API_KEY"))?,
            api_base: var("GEMINI_API_BASE").unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            text_model: var("GENENGINE_TEXT_MODEL").unwrap_or_else(|| DEFAULT_TEXT_MODEL.to_string()),
            temperature: parse_or(var("GENENGINE_TEMPERATURE"), "GENENGINE_TEMPERATURE", DEFAULT_TEMPERATURE)?,
            max_output_tokens: parse_or(
                var("GENENGINE_MAX_OUTPUT_TOKENS"),
                "GENENGINE_MAX_OUTPUT_TOKENS",
                DEFAULT_MAX_OUTPUT_TOKENS,
            )?,
        };

        let images = match var("GENENGINE_IMAGE_BACKEND").as_deref() {
            None | Some("placeholder") => ImageBackend::Placeholder,
            Some("imagen") => ImageBackend::Imagen {
                model: var("GENENGINE_IMAGE_MODEL").unwrap_or_else(|| DEFAULT_IMAGE_MODEL.to_string()),
            },
            Some(other) => {
                return Err(ConfigError::InvalidValue {
                    name: "GENENGINE_IMAGE_BACKEND",
                    value: other.to_string(),
                })
            }
        };

        let backend = match var("GENENGINE_STORE").as_deref() {
            None => None,
            Some("local") => Some(StoreBackend::Local {
                directory: var("GENENGINE_STORE_DIR")
                    .map(PathBuf::from)
                    .ok_or(ConfigError::MissingVar("GENENGINE_STORE_DIR"))?,
            }),
            Some("s3") => Some(StoreBackend::S3 {
                bucket: var("GENENGINE_STORE_BUCKET").ok_or(ConfigError::MissingVar("GENENGINE_STORE_BUCKET"))?,
                endpoint: var("GENENGINE_STORE_ENDPOINT"),
                region: var("GENENGINE_STORE_REGION"),
                access_key_id: var("GENENGINE_STORE_ACCESS_KEY_ID"),
                secret_access_key: var("GENENGINE_STORE_SECRET_ACCESS_KEY"),
            }),
            Some(other) => {
                return Err(ConfigError::InvalidValue {
                    name: "GENENGINE_STORE",
                    value: other.to_string(),
                })
            }
        };
        let store = match backend {
            Some(backend) => Some(StoreConfig {
                backend,
                public_base_url: var("GENENGINE_PUBLIC_ASSET_URL")
                    .ok_or(ConfigError::MissingVar("GENENGINE_PUBLIC_ASSET_URL"))?,
            }),
            None => None,
        };

        Ok(ServerConfig {
            addr,
            model,
            images,
            store,
        })
    }
}

fn parse_or<T: std::str::FromStr>(value: Option<String>, name: &'static str, default: T) -> Result<T, ConfigError> {
    match value {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { name, value }),
    }
}

//! The generation service: `GET /` health and `POST /api/generate`.
mod config;
mod error;
mod gemini;
mod placeholder;
mod storage;

pub use config::{ConfigError, ImageBackend, ModelConfig, ServerConfig, StoreBackend, StoreConfig};
pub use error::ApiError;
pub use gemini::GeminiClient;
pub use placeholder::{placeholder_svg, PlaceholderImages};
pub use storage::ObjectBlobStore;

use crate::orchestrator::{ImageGenerator, Orchestrator};
use crate::protocol::{GenerationRequest, GenerationResult, HealthResponse};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, Method},
    routing::{get, post},
    Json, Router,
};
use serde_json::Value;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const SERVICE_NAME: &str = "GenEngine API";
pub const GENERATE_ROUTE: &str = "/api/generate";
// locally stored assets are served from here
pub const STATIC_ROUTE: &str = "/static";

#[derive(Clone)]
pub struct AppState {
    orchestrator: Arc<Orchestrator>,
}

impl AppState {
    pub fn new(orchestrator: Orchestrator) -> Self {
        AppState {
            orchestrator: Arc::new(orchestrator),
        }
    }
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/", get(health))
        .route(GENERATE_ROUTE, post(generate))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

#[tracing::instrument(name = "GET /")]
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        service: SERVICE_NAME.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

#[tracing::instrument(name = "POST /api/generate", skip_all)]
async fn generate(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<GenerationResult>, ApiError> {
    let Json(body) = body.map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;
    let request = GenerationRequest::from_json(body)?;
    tracing::info!(prompt = %request.new_prompt, "generation requested");
    let result = state.orchestrator.generate(request).await?;
    Ok(Json(result))
}

// ==================== Wiring ====================
pub fn build_orchestrator(config: &ServerConfig) -> anyhow::Result<Orchestrator> {
    let images: Arc<dyn ImageGenerator> = match &config.images {
        ImageBackend::Placeholder => Arc::new(PlaceholderImages),
        ImageBackend::Imagen { model } => Arc::new(GeminiClient::new(config.model.clone()).with_image_model(model)),
    };
    let text = Arc::new(GeminiClient::new(config.model.clone()));

    let orchestrator = Orchestrator::new(text, images);
    Ok(match &config.store {
        Some(store) => orchestrator.with_store(Arc::new(ObjectBlobStore::from_config(store)?)),
        None => orchestrator,
    })
}

pub async fn run() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    tracing::info!("Starting {} v{}", SERVICE_NAME, env!("CARGO_PKG_VERSION"));

    let config = ServerConfig::from_env()?;
    tracing::info!(
        text_model = %config.model.text_model,
        images = ?config.images,
        "Loaded configuration"
    );

    let mut app = router(AppState::new(build_orchestrator(&config)?));
    if let Some(StoreConfig {
        backend: StoreBackend::Local { directory },
        ..
    }) = &config.store
    {
        app = app.nest_service(STATIC_ROUTE, ServeDir::new(directory));
    }

    tracing::info!("Listening on {}", config.addr);
    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::{GeneratedImage, ImageConfig, TextGenerator};
    use crate::protocol::{ErrorBody, ImageRequest};
    use anyhow::anyhow;
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde::de::DeserializeOwned;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tower::ServiceExt;

    struct Model {
        reply: &'static str,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TextGenerator for Model {
        async fn generate_text(&self, _prompt: &str) -> anyhow::Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.reply.to_string())
        }
    }

    struct Broken;

    #[async_trait]
    impl ImageGenerator for Broken {
        async fn generate_image(&self, _request: &ImageRequest, _config: &ImageConfig) -> anyhow::Result<GeneratedImage> {
            Err(anyhow!("image model unavailable"))
        }
    }

    fn app(reply: &'static str, images: Arc<dyn ImageGenerator>) -> (Router, Arc<Model>) {
        let model = Arc::new(Model {
            reply,
            calls: AtomicUsize::new(0),
        });
        let state = AppState::new(Orchestrator::new(model.clone(), images));
        (router(state), model)
    }

    fn post_generate(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(GENERATE_ROUTE)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn read<T: DeserializeOwned>(response: axum::response::Response) -> T {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    const SQUARE: &str = r#"{"newCode":"ctx.fillRect(50, 50, 40, 40);","explanation":"Added a red square."}"#;
    const DRAGON: &str = r#"{"newCode":"assetUrls.player = 'PENDING_playerSprite';","explanation":"Dragon.","imageGenerationPrompt":{"name":"playerSprite","description":"pixel art dragon"}}"#;

    #[tokio::test]
    async fn health_reports_service() {
        let (app, _) = app(SQUARE, Arc::new(PlaceholderImages));
        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let health: HealthResponse = read(response).await;
        assert_eq!(health.status, "ok");
        assert_eq!(health.service, "GenEngine API");
        assert_eq!(health.version, env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn blank_prompt_is_rejected_without_a_model_call() {
        let (app, model) = app(SQUARE, Arc::new(PlaceholderImages));
        let response = app
            .oneshot(post_generate(r#"{"currentCode":"","promptHistory":[],"newPrompt":"   "}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: ErrorBody = read(response).await;
        assert_eq!(body.error, "Invalid prompt provided");
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn non_json_body_is_a_bad_request() {
        let (app, model) = app(SQUARE, Arc::new(PlaceholderImages));
        let response = app.oneshot(post_generate("add a square")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn successful_generation() {
        let (app, _) = app(SQUARE, Arc::new(PlaceholderImages));
        let response = app
            .oneshot(post_generate(r#"{"newPrompt":"add a red square"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let result: GenerationResult = read(response).await;
        assert_eq!(result.new_code, "ctx.fillRect(50, 50, 40, 40);");
        assert_eq!(result.explanation, "Added a red square.");
        assert!(result.generated_assets.is_empty());
    }

    #[tokio::test]
    async fn placeholder_image_is_inlined() {
        let (app, _) = app(DRAGON, Arc::new(PlaceholderImages));
        let response = app
            .oneshot(post_generate(r#"{"newPrompt":"make the player a dragon"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let result: GenerationResult = read(response).await;
        assert_eq!(result.generated_assets.len(), 1);
        assert!(result.generated_assets[0].url.starts_with("data:image/svg+xml;base64,"));
        assert!(!result.new_code.contains("PENDING_playerSprite"));
    }

    #[tokio::test]
    async fn image_failure_still_returns_code() {
        let (app, _) = app(DRAGON, Arc::new(Broken));
        let response = app
            .oneshot(post_generate(r#"{"newPrompt":"make the player a dragon"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let result: GenerationResult = read(response).await;
        assert_eq!(result.new_code, "assetUrls.player = null;");
        assert!(result.generated_assets.is_empty());
    }

    #[tokio::test]
    async fn malformed_reply_is_a_server_error() {
        let (app, _) = app("I'm sorry, I can't do that.", Arc::new(PlaceholderImages));
        let response = app
            .oneshot(post_generate(r#"{"newPrompt":"add a red square"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: ErrorBody = read(response).await;
        assert!(!body.error.is_empty());
    }

    #[tokio::test]
    async fn cors_preflight_is_allowed() {
        let (app, _) = app(SQUARE, Arc::new(PlaceholderImages));
        let response = app
            .oneshot(
                Request::builder()
                    .method("OPTIONS")
                    .uri(GENERATE_ROUTE)
                    .header("origin", "http://localhost:5173")
                    .header("access-control-request-method", "POST")
                    .header("access-control-request-headers", "content-type")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get("access-control-allow-origin").unwrap(),
            "*"
        );
    }
}

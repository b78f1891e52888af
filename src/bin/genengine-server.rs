//! `cargo run --bin genengine-server` serves `POST /api/generate` on $PORT (8787).
#[cfg(not(target_arch = "wasm32"))]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    genengine::server::run().await
}

// the generation service is native only
#[cfg(target_arch = "wasm32")]
fn main() {}

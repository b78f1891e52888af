// ==================== Imports ====================
use wasm_bindgen::prelude::*;

#[macro_use]
mod browser;

// ==================== Modules ====================
// shared by the browser studio and the generation service
pub mod assets;
pub mod prompt;
pub mod protocol;
pub mod response;
pub mod template;

// browser side: live execution and session history
pub mod engine;
pub mod session;
pub mod studio;

// service side
#[cfg(not(target_arch = "wasm32"))]
pub mod orchestrator;
#[cfg(not(target_arch = "wasm32"))]
pub mod server;

pub use browser::{compile_script, CanvasSandbox};
pub use studio::Studio;

// ==================== Main Functions ====================
/// Main entry for Webassembly module
/// - better panic messages
/// - the page then builds a `Studio` per canvas
#[wasm_bindgen]
pub fn main_js() -> Result<(), JsValue> {
    console_error_panic_hook::set_once();
    log!("GenEngine {} loaded", env!("CARGO_PKG_VERSION"));
    Ok(())
}

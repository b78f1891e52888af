//! Live execution against a real canvas: `wasm-pack test --headless --chrome`.
#![cfg(target_arch = "wasm32")]

use futures::channel::oneshot;
use genengine::engine::{LiveCanvas, LoadOutcome};
use genengine::{compile_script, CanvasSandbox, Studio};
use js_sys::Reflect;
use std::cell::RefCell;
use std::rc::Rc;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_test::*;
use web_sys::HtmlCanvasElement;

wasm_bindgen_test_configure!(run_in_browser);

fn fresh_canvas() -> HtmlCanvasElement {
    let document = web_sys::window().unwrap().document().unwrap();
    let canvas: HtmlCanvasElement = document.create_element("canvas").unwrap().dyn_into().unwrap();
    canvas.set_width(64);
    canvas.set_height(64);
    document.body().unwrap().append_child(&canvas).unwrap();
    canvas
}

fn canvas_with_id(id: &str) -> HtmlCanvasElement {
    let canvas = fresh_canvas();
    canvas.set_id(id);
    canvas
}

// nothing listens here and browsers refuse the port outright
const UNREACHABLE_API: &str = "http://127.0.0.1:9";

fn field(state: &JsValue, key: &str) -> JsValue {
    Reflect::get(state, &JsValue::from_str(key)).unwrap()
}

fn live_canvas() -> (LiveCanvas<CanvasSandbox>, Rc<RefCell<Vec<String>>>) {
    let errors = Rc::new(RefCell::new(Vec::new()));
    let sink = errors.clone();
    let sandbox = CanvasSandbox::new(fresh_canvas()).unwrap();
    let canvas = LiveCanvas::new(sandbox, move |message: &str| sink.borrow_mut().push(message.to_string()));
    (canvas, errors)
}

fn global_number(name: &str) -> f64 {
    Reflect::get(&js_sys::global(), &JsValue::from_str(name))
        .unwrap()
        .as_f64()
        .unwrap_or(0.0)
}

async fn next_frame() {
    let (tx, rx) = oneshot::channel::<()>();
    let tick = Closure::once_into_js(move |_: f64| {
        let _ = tx.send(());
    });
    web_sys::window()
        .unwrap()
        .request_animation_frame(tick.unchecked_ref())
        .unwrap();
    rx.await.unwrap();
}

fn pixel(canvas: &HtmlCanvasElement, x: f64, y: f64) -> Vec<u8> {
    let context = canvas
        .get_context("2d")
        .unwrap()
        .unwrap()
        .dyn_into::<web_sys::CanvasRenderingContext2d>()
        .unwrap();
    context.get_image_data(x, y, 1.0, 1.0).unwrap().data().to_vec()
}

#[wasm_bindgen_test]
fn syntax_errors_come_back_as_err() {
    assert!(compile_script("canvas", "const = ;").is_err());
    assert!(compile_script("canvas", "return canvas.width;").is_ok());
}

#[wasm_bindgen_test]
fn scripts_draw_on_the_injected_canvas() {
    let (mut live, errors) = live_canvas();
    let outcome = live.load(
        "const ctx = canvas.getContext('2d');\nctx.fillStyle = 'red';\nctx.fillRect(0, 0, 10, 10);",
    );
    assert_eq!(outcome, LoadOutcome::Running);
    assert!(errors.borrow().is_empty());
    assert_eq!(pixel(live.sandbox().canvas(), 5.0, 5.0), vec![255, 0, 0, 255]);

    // blank code clears the surface
    assert_eq!(live.load(""), LoadOutcome::Blank);
    assert_eq!(pixel(live.sandbox().canvas(), 5.0, 5.0), vec![0, 0, 0, 0]);
}

#[wasm_bindgen_test]
fn thrown_errors_are_reported_not_propagated() {
    let (mut live, errors) = live_canvas();
    assert_eq!(live.load("undefinedFunction();"), LoadOutcome::Failed);
    assert_eq!(live.load("this is not javascript"), LoadOutcome::Failed);
    let errors = errors.borrow();
    assert_eq!(errors.len(), 2);
    assert!(errors[0].contains("undefinedFunction"), "{}", errors[0]);
}

#[wasm_bindgen_test]
async fn replaced_scripts_stop_ticking() {
    let (mut live, _) = live_canvas();
    live.load(
        "window.__oldTicks = 0;\nfunction loop() { window.__oldTicks++; requestAnimationFrame(loop); }\nrequestAnimationFrame(loop);",
    );
    next_frame().await;
    next_frame().await;
    assert!(global_number("__oldTicks") >= 1.0);

    live.load("window.__newRuns = (window.__newRuns || 0) + 1;");
    let frozen = global_number("__oldTicks");
    for _ in 0..3 {
        next_frame().await;
    }
    assert_eq!(global_number("__oldTicks"), frozen);
    assert_eq!(global_number("__newRuns"), 1.0);
}

#[wasm_bindgen_test]
async fn dropping_the_canvas_stops_the_loop() {
    let (mut live, _) = live_canvas();
    live.load(
        "window.__dropTicks = 0;\n(function loop() { window.__dropTicks++; requestAnimationFrame(loop); })();",
    );
    next_frame().await;
    drop(live);
    let frozen = global_number("__dropTicks");
    for _ in 0..3 {
        next_frame().await;
    }
    assert_eq!(global_number("__dropTicks"), frozen);
}

#[wasm_bindgen_test]
async fn ticks_are_released_as_the_loop_runs() {
    let (mut live, _) = live_canvas();
    live.load("(function loop() { requestAnimationFrame(loop); })();");
    for _ in 0..5 {
        next_frame().await;
    }
    // one queued for the next frame, at most one spent from the last
    assert!(live.sandbox().retained_frames() <= 2, "{}", live.sandbox().retained_frames());

    live.load("const id = requestAnimationFrame(() => {});\ncancelAnimationFrame(id);");
    assert_eq!(live.sandbox().retained_frames(), 0);
}

#[wasm_bindgen_test]
fn studio_starts_with_a_blank_canvas() {
    let canvas = canvas_with_id("studio-blank");
    let context = canvas
        .get_context("2d")
        .unwrap()
        .unwrap()
        .dyn_into::<web_sys::CanvasRenderingContext2d>()
        .unwrap();
    context.fill_rect(0.0, 0.0, 10.0, 10.0);
    assert_eq!(pixel(&canvas, 5.0, 5.0)[3], 255);

    let _studio = Studio::new("studio-blank", UNREACHABLE_API).unwrap();
    assert_eq!(pixel(&canvas, 5.0, 5.0), vec![0, 0, 0, 0]);
}

#[wasm_bindgen_test]
fn studio_reports_canvas_errors() {
    canvas_with_id("studio-errors");
    let studio = Studio::new("studio-errors", UNREACHABLE_API).unwrap();

    studio.edit_code("undefinedFunction();".into());

    let error = field(&studio.state(), "error").as_string().unwrap();
    assert!(error.starts_with("Canvas Error:"), "{error}");
    assert!(error.contains("undefinedFunction"), "{error}");
}

#[wasm_bindgen_test]
fn studio_reloads_only_changed_code() {
    canvas_with_id("studio-reload");
    let studio = Studio::new("studio-reload", UNREACHABLE_API).unwrap();
    let code = "window.__studioRuns = (window.__studioRuns || 0) + 1;";

    studio.edit_code(code.into());
    assert_eq!(global_number("__studioRuns"), 1.0);

    studio.dismiss_error();
    studio.edit_code(code.into());
    assert_eq!(global_number("__studioRuns"), 1.0);

    studio.edit_code(format!("{code}\n// tweaked"));
    assert_eq!(global_number("__studioRuns"), 2.0);
}

#[wasm_bindgen_test]
async fn failed_generation_clears_loading() {
    canvas_with_id("studio-generate");
    let studio = Studio::new("studio-generate", UNREACHABLE_API).unwrap();

    studio.generate("add a red square".into());
    assert_eq!(field(&studio.state(), "isLoading").as_bool(), Some(true));

    for _ in 0..600 {
        if field(&studio.state(), "isLoading").as_bool() == Some(false) {
            break;
        }
        next_frame().await;
    }

    let state = studio.state();
    assert_eq!(field(&state, "isLoading").as_bool(), Some(false));
    assert_eq!(
        field(&state, "error").as_string().as_deref(),
        Some("Failed to generate code. Please try again.")
    );
    assert_eq!(field(&state, "promptHistory").dyn_into::<js_sys::Array>().unwrap().length(), 0);
}

use crate::engine::{ExecutionError, Sandbox, SharedFrameChain};
use anyhow::{anyhow, Result};
use js_sys::{Array, Function, Reflect};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::future::Future;
use std::rc::{Rc, Weak};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;

#[rustfmt::skip]
use web_sys::{
    CanvasRenderingContext2d,
    Document,
    Headers,
    HtmlCanvasElement,
    Request,
    RequestInit,
    RequestMode,
    Response,
    Window,
};

// ==================== Logging ====================
macro_rules! log {
    ($($t:tt)*) => {
        web_sys::console::log_1(&format!($($t)*).into())
    }
}

macro_rules! error {
    ($($t:tt)*) => {
        web_sys::console::error_1(&format!($($t)*).into())
    }
}

// ==================== Constants ====================
// Constants related to HTML elements and the script sandbox
mod html {
    pub const CONTEXT_2D: &str = "2d";
    pub const JSON: &str = "application/json";
    // the only names a generated script can see
    pub const SCRIPT_PARAMS: &str = "canvas, requestAnimationFrame, cancelAnimationFrame";
    pub const UNKNOWN_ERROR: &str = "Unknown error occurred";
}

// ==================== DOM ====================
pub fn window() -> Result<Window> {
    web_sys::window().ok_or_else(|| anyhow!("Window not found"))
}

pub fn document() -> Result<Document> {
    window()?
        .document()
        .ok_or_else(|| anyhow!("No Document Found"))
}

pub fn canvas(id: &str) -> Result<HtmlCanvasElement> {
    document()?
        .get_element_by_id(id)
        .ok_or_else(|| anyhow!("No Canvas Element found with ID : '{}'", id))?
        .dyn_into::<HtmlCanvasElement>()
        .map_err(|element| anyhow!("Error converting {:#?} to HtmlCanvasElement", element))
}

pub fn context(canvas: &HtmlCanvasElement) -> Result<CanvasRenderingContext2d> {
    canvas
        .get_context(html::CONTEXT_2D)
        // Result<Option<Object>, JsValue>
        // - JsValue error -> anyhow
        // - None -> no 2d context (canvas already claimed by webgl)
        .map_err(|js_value| anyhow!("Error getting context : {:#?}", js_value))?
        .ok_or_else(|| anyhow!("No 2d context found"))?
        .dyn_into::<CanvasRenderingContext2d>()
        .map_err(|element| {
            anyhow!(
                "Error converting {:#?} to CanvasRenderingContext2d",
                element
            )
        })
}

pub fn spawn_local<F>(future: F)
where
    F: Future<Output = ()> + 'static,
{
    wasm_bindgen_futures::spawn_local(future);
}

/// Best effort human readable text for a thrown JS value.
pub fn error_message(value: &JsValue) -> String {
    if let Some(err) = value.dyn_ref::<js_sys::Error>() {
        return String::from(err.message());
    }
    value
        .as_string()
        .unwrap_or_else(|| html::UNKNOWN_ERROR.to_string())
}

// ==================== Fetch ====================
/// A non-2xx reply, or a transport failure (status 0).
#[derive(Debug, Clone)]
pub struct HttpFailure {
    pub status: u16,
    pub body: Option<JsValue>,
    pub message: String,
}

pub async fn post_json<B, T>(url: &str, body: &B) -> std::result::Result<T, HttpFailure>
where
    B: Serialize,
    T: DeserializeOwned,
{
    let transport = |message: String| HttpFailure {
        status: 0,
        body: None,
        message,
    };

    let payload = serde_json::to_string(body).map_err(|err| transport(err.to_string()))?;
    let request = json_request(url, &payload).map_err(|err| transport(format!("{err:#}")))?;
    let window = window().map_err(|err| transport(err.to_string()))?;

    let resp: Response = JsFuture::from(window.fetch_with_request(&request))
        .await
        .map_err(|err| transport(error_message(&err)))?
        .dyn_into()
        .map_err(|element| transport(format!("error converting [{:#?}] to Response", element)))?;

    let json = match resp.json() {
        Ok(promise) => JsFuture::from(promise).await.ok(),
        Err(_) => None,
    };

    if !resp.ok() {
        return Err(HttpFailure {
            status: resp.status(),
            body: json,
            message: resp.status_text(),
        });
    }

    let json = json.ok_or_else(|| transport("response body is not JSON".to_string()))?;
    serde_wasm_bindgen::from_value(json)
        .map_err(|err| transport(format!("error converting response : {:#?}", err)))
}

fn json_request(url: &str, payload: &str) -> Result<Request> {
    let headers = Headers::new().map_err(|err| anyhow!("Could not create headers : {:#?}", err))?;
    headers
        .set("Content-Type", html::JSON)
        .map_err(|err| anyhow!("Could not set content type : {:#?}", err))?;

    let init = RequestInit::new();
    init.set_method("POST");
    init.set_mode(RequestMode::Cors);
    init.set_headers(&headers);
    init.set_body(&JsValue::from_str(payload));

    Request::new_with_str_and_init(url, &init)
        .map_err(|err| anyhow!("Could not build request for {} : {:#?}", url, err))
}

// ==================== Canvas Sandbox ====================
/// Compile `source` with the global `Function` constructor.
///
/// Goes through `Reflect::construct` rather than `Function::new_with_args`
/// because only the former hands a SyntaxError back as `Err` instead of
/// throwing through wasm.
pub fn compile_script(params: &str, source: &str) -> std::result::Result<Function, JsValue> {
    let constructor: Function = Reflect::get(&js_sys::global(), &JsValue::from_str("Function"))?
        .dyn_into()?;
    // the extra block lets scripts re-declare `canvas` with const/let
    let body = format!("{{\n{source}\n}}");
    let args = Array::of2(&JsValue::from_str(params), &JsValue::from_str(&body));
    Reflect::construct(&constructor, &args)?.dyn_into()
}

type RequestFrame = Closure<dyn FnMut(Function) -> i32>;
type CancelFrame = Closure<dyn FnMut(i32)>;
type Tick = Closure<dyn FnMut(f64)>;

/// Frame callbacks owned by one scope, so none outlives it.
#[derive(Default)]
struct Ticks {
    // requested, not yet fired
    queued: BTreeMap<i32, Tick>,
    // the tick being called right now; freed only after it returns
    running: Option<Tick>,
    // fired; freed on the next request
    spent: Vec<Tick>,
}

impl Ticks {
    fn retained(&self) -> usize {
        self.queued.len() + self.spent.len() + usize::from(self.running.is_some())
    }
}

/// `requestAnimationFrame` / `cancelAnimationFrame` as seen by ONE script
/// version. Both stop working once that version's chain is revoked.
struct FrameScope {
    window: Window,
    ticks: Rc<RefCell<Ticks>>,
    request: RequestFrame,
    cancel: CancelFrame,
}

impl FrameScope {
    fn new(window: Window, frames: SharedFrameChain) -> Self {
        let ticks: Rc<RefCell<Ticks>> = Rc::default();

        let request = {
            let window = window.clone();
            let frames = frames.clone();
            let ticks = ticks.clone();
            Closure::wrap(Box::new(move |callback: Function| -> i32 {
                if frames.is_revoked() {
                    return 0;
                }
                ticks.borrow_mut().spent.clear();

                let handle_slot = Rc::new(Cell::new(0));
                let tick = Self::tick(callback, frames.clone(), Rc::downgrade(&ticks), handle_slot.clone());
                match window.request_animation_frame(tick.as_ref().unchecked_ref()) {
                    Ok(handle) => {
                        handle_slot.set(handle);
                        frames.record(handle);
                        ticks.borrow_mut().queued.insert(handle, tick);
                        handle
                    }
                    Err(err) => {
                        error!("requestAnimationFrame failed: {}", error_message(&err));
                        0
                    }
                }
            }) as Box<dyn FnMut(Function) -> i32>)
        };

        let cancel = {
            let window = window.clone();
            let ticks = ticks.clone();
            Closure::wrap(Box::new(move |handle: i32| {
                frames.settle(handle);
                let _ = window.cancel_animation_frame(handle);
                let cancelled = ticks.borrow_mut().queued.remove(&handle);
                drop(cancelled);
            }) as Box<dyn FnMut(i32)>)
        };

        FrameScope {
            window,
            ticks,
            request,
            cancel,
        }
    }

    fn tick(callback: Function, frames: SharedFrameChain, ticks: Weak<RefCell<Ticks>>, handle: Rc<Cell<i32>>) -> Tick {
        Closure::once(move |timestamp: f64| {
            let handle = handle.get();
            frames.settle(handle);
            let Some(ticks) = ticks.upgrade() else {
                return;
            };
            {
                let mut ticks = ticks.borrow_mut();
                ticks.running = ticks.queued.remove(&handle);
            }
            // a frame queued before revocation must not draw over the next version
            if !frames.is_revoked() {
                if let Err(err) = callback.call1(&JsValue::NULL, &JsValue::from_f64(timestamp)) {
                    error!("Canvas frame error: {}", error_message(&err));
                }
            }
            let mut ticks = ticks.borrow_mut();
            if let Some(done) = ticks.running.take() {
                ticks.spent.push(done);
            }
        })
    }
}

impl Drop for FrameScope {
    fn drop(&mut self) {
        let queued = std::mem::take(&mut self.ticks.borrow_mut().queued);
        for handle in queued.keys() {
            let _ = self.window.cancel_animation_frame(*handle);
        }
    }
}

pub struct CanvasSandbox {
    window: Window,
    canvas: HtmlCanvasElement,
    context: CanvasRenderingContext2d,
    // closures handed to the running script; replaced on every run
    scope: RefCell<Option<FrameScope>>,
}

impl CanvasSandbox {
    pub fn new(canvas: HtmlCanvasElement) -> Result<Self> {
        Ok(CanvasSandbox {
            window: window()?,
            context: context(&canvas)?,
            canvas,
            scope: RefCell::new(None),
        })
    }

    pub fn by_id(id: &str) -> Result<Self> {
        Self::new(canvas(id)?)
    }

    pub fn canvas(&self) -> &HtmlCanvasElement {
        &self.canvas
    }

    /// Frame callbacks still held for the running script.
    pub fn retained_frames(&self) -> usize {
        self.scope
            .borrow()
            .as_ref()
            .map_or(0, |scope| scope.ticks.borrow().retained())
    }
}

impl Sandbox for CanvasSandbox {
    fn clear_surface(&self) {
        self.context.clear_rect(
            0.0,
            0.0,
            self.canvas.width().into(),
            self.canvas.height().into(),
        );
    }

    fn cancel_frame(&self, handle: i32) {
        if let Err(err) = self.window.cancel_animation_frame(handle) {
            error!("cancelAnimationFrame failed: {}", error_message(&err));
        }
        if let Some(scope) = self.scope.borrow().as_ref() {
            let cancelled = scope.ticks.borrow_mut().queued.remove(&handle);
            drop(cancelled);
        }
    }

    fn run(&self, source: &str, frames: &SharedFrameChain) -> std::result::Result<(), ExecutionError> {
        let script = compile_script(html::SCRIPT_PARAMS, source)
            .map_err(|err| ExecutionError::Compile(error_message(&err)))?;

        let scope = FrameScope::new(self.window.clone(), frames.clone());
        let result = script.call3(
            &JsValue::NULL,
            &self.canvas,
            scope.request.as_ref(),
            scope.cancel.as_ref(),
        );
        // the previous version's closures are dropped here; its chain is already revoked
        self.scope.replace(Some(scope));

        result
            .map(|_| ())
            .map_err(|err| ExecutionError::Runtime(error_message(&err)))
    }
}

//! The page-facing controller: one `Studio` per canvas.
//!
//! ┌──────────── prompt ────────────┐
//! │                                ▼
//! │   page UI ──► Studio::dispatch ──► SessionState::apply
//! │                 │         ▲                 │
//! │                 │         │ result          │ Effect::Submit
//! │                 │         └── fetch ◄───────┘
//! │                 ▼
//! │         LiveCanvas::load(current_code)  (only when the code changed)
//! │                 │
//! └── onChange(state) ◄┘
use crate::browser::{self, CanvasSandbox, HttpFailure};
use crate::engine::LiveCanvas;
use crate::protocol::{ErrorBody, GenerationResult};
use crate::session::{Action, Effect, SessionState, Ticket};
use serde::Serialize;
use std::cell::RefCell;
use std::rc::{Rc, Weak};
use wasm_bindgen::prelude::*;

const GENERATE_PATH: &str = "/api/generate";
const GENERIC_FAILURE: &str = "Failed to generate code. Please try again.";

/// What the page renders from.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StudioView<'a> {
    current_code: &'a str,
    explanation: &'a str,
    prompt_history: &'a [String],
    error: Option<&'a str>,
    is_loading: bool,
    can_reset: bool,
}

struct Inner {
    // Option only so the reducer can move the state out and back in
    session: Option<SessionState>,
    canvas: LiveCanvas<CanvasSandbox>,
    endpoint: String,
    listener: Option<js_sys::Function>,
}

#[wasm_bindgen]
pub struct Studio {
    inner: Rc<RefCell<Inner>>,
    // canvas errors land here while `inner` is mutably borrowed
    canvas_errors: Rc<RefCell<Vec<String>>>,
}

#[wasm_bindgen]
impl Studio {
    #[wasm_bindgen(constructor)]
    pub fn new(canvas_id: &str, api_base_url: &str) -> Result<Studio, JsValue> {
        let sandbox = CanvasSandbox::by_id(canvas_id).map_err(|err| JsValue::from_str(&format!("{err:#}")))?;

        let canvas_errors = Rc::new(RefCell::new(Vec::new()));
        let sink = canvas_errors.clone();
        let mut canvas = LiveCanvas::new(sandbox, move |message: &str| {
            sink.borrow_mut().push(message.to_string());
        });
        // a reused canvas element may still show an earlier game
        canvas.load("");

        let endpoint = format!("{}{}", api_base_url.trim_end_matches('/'), GENERATE_PATH);
        log!("GenEngine studio ready : canvas '{}' -> {}", canvas_id, endpoint);

        Ok(Studio {
            inner: Rc::new(RefCell::new(Inner {
                session: Some(SessionState::new()),
                canvas,
                endpoint,
                listener: None,
            })),
            canvas_errors,
        })
    }

    /// Register `callback(state)`, called after every state change.
    #[wasm_bindgen(js_name = onChange)]
    pub fn on_change(&self, callback: js_sys::Function) {
        self.inner.borrow_mut().listener = Some(callback);
    }

    pub fn generate(&self, prompt: String) {
        self.dispatch(Action::Generate(prompt));
    }

    pub fn reset(&self) {
        self.dispatch(Action::Reset);
    }

    #[wasm_bindgen(js_name = editCode)]
    pub fn edit_code(&self, text: String) {
        self.dispatch(Action::EditCode(text));
    }

    #[wasm_bindgen(js_name = dismissError)]
    pub fn dismiss_error(&self) {
        self.dispatch(Action::DismissError);
    }

    /// Snapshot of the session for rendering.
    pub fn state(&self) -> JsValue {
        let inner = self.inner.borrow();
        inner.session.as_ref().map(view).unwrap_or(JsValue::NULL)
    }
}

impl Studio {
    fn dispatch(&self, action: Action) {
        Self::dispatch_on(&self.inner, &self.canvas_errors, action);
    }

    fn dispatch_on(inner: &Rc<RefCell<Inner>>, canvas_errors: &Rc<RefCell<Vec<String>>>, action: Action) {
        let (effect, endpoint) = {
            let mut guard = inner.borrow_mut();
            let Some(session) = guard.session.take() else {
                return;
            };
            let previous_code = session.current_code.clone();
            let (session, effect) = session.apply(action);
            let reload = session.current_code != previous_code;
            let code = session.current_code.clone();
            guard.session = Some(session);
            if reload {
                guard.canvas.load(&code);
            }
            (effect, guard.endpoint.clone())
        };

        // reported after the borrow ends: CanvasFailed re-enters dispatch
        let failures: Vec<String> = canvas_errors.borrow_mut().drain(..).collect();
        for message in failures {
            Self::dispatch_on(inner, canvas_errors, Action::CanvasFailed(message));
        }

        if let Some(Effect::Submit { ticket, request }) = effect {
            let weak = Rc::downgrade(inner);
            let errors = canvas_errors.clone();
            browser::spawn_local(async move {
                let outcome = browser::post_json::<_, GenerationResult>(&endpoint, &request).await;
                Self::complete(weak, errors, ticket, outcome);
            });
        }

        Self::notify(inner);
    }

    fn complete(
        inner: Weak<RefCell<Inner>>,
        canvas_errors: Rc<RefCell<Vec<String>>>,
        ticket: Ticket,
        outcome: Result<GenerationResult, HttpFailure>,
    ) {
        // the studio was dropped while the request was in flight
        let Some(inner) = inner.upgrade() else {
            return;
        };
        let action = match outcome {
            Ok(result) => Action::GenerationSucceeded { ticket, result },
            Err(failure) => {
                error!("Generation error: {} ({})", failure.message, failure.status);
                let body = failure
                    .body
                    .and_then(|body| serde_wasm_bindgen::from_value::<ErrorBody>(body).ok());
                Action::GenerationFailed {
                    ticket,
                    message: failure_message(body),
                }
            }
        };
        Self::dispatch_on(&inner, &canvas_errors, action);
    }

    fn notify(inner: &Rc<RefCell<Inner>>) {
        let (listener, state) = {
            let guard = inner.borrow();
            match (&guard.listener, &guard.session) {
                (Some(listener), Some(session)) => (listener.clone(), view(session)),
                _ => return,
            }
        };
        if let Err(err) = listener.call1(&JsValue::NULL, &state) {
            error!("onChange listener threw: {}", browser::error_message(&err));
        }
    }
}

fn view(session: &SessionState) -> JsValue {
    let view = StudioView {
        current_code: &session.current_code,
        explanation: &session.explanation,
        prompt_history: &session.prompt_history,
        error: session.error.as_deref(),
        is_loading: session.is_loading(),
        can_reset: session.can_reset(),
    };
    serde_wasm_bindgen::to_value(&view).unwrap_or(JsValue::NULL)
}

/// The service's `{ "error": ... }` text, or a generic message.
fn failure_message(body: Option<ErrorBody>) -> String {
    body.map(|body| body.error)
        .filter(|error| !error.trim().is_empty())
        .unwrap_or_else(|| GENERIC_FAILURE.to_string())
}

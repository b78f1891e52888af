//! Live execution of generated game scripts.
//!
//! TABLE
//! ┌──────────────────────── LiveCanvas::load(code) ─────────────────────────┐
//! │                                                                         │
//! │  1. teardown()      revoke the previous FrameChain, cancel its frame    │
//! │  2. clear_surface() blank canvas                                        │
//! │  3. code empty?     stop: blank canvas is a valid steady state          │
//! │  4. run(code)       compile + call, scoped to (canvas, frame fns)       │
//! │  5. Err(..)         on_error(message), host keeps running               │
//! │  6. Ok(())          the script's own frame chain keeps ticking until    │
//! │                     the next load() or until the LiveCanvas is dropped  │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//!
//! Nothing here touches the DOM. `Sandbox` is the seam: the browser build
//! plugs in `browser::CanvasSandbox`, tests plug in a fake.
use std::cell::Cell;
use std::rc::Rc;
use thiserror::Error;

// ELI5: web assembly is a single threaded environment, so Rc + Cell is all
// the sharing a frame chain needs
#[derive(Debug, Default)]
pub struct FrameChain {
    pending: Cell<Option<i32>>,
    revoked: Cell<bool>,
}

pub type SharedFrameChain = Rc<FrameChain>;

impl FrameChain {
    pub fn new() -> SharedFrameChain {
        Rc::new(FrameChain::default())
    }

    /// Remember the most recently scheduled frame.
    /// Returns false (and records nothing) once the chain is revoked.
    pub fn record(&self, handle: i32) -> bool {
        if self.revoked.get() {
            return false;
        }
        self.pending.set(Some(handle));
        true
    }

    /// Called when a scheduled frame fires or is cancelled by the script.
    pub fn settle(&self, handle: i32) {
        if self.pending.get() == Some(handle) {
            self.pending.set(None);
        }
    }

    pub fn pending(&self) -> Option<i32> {
        self.pending.get()
    }

    pub fn is_revoked(&self) -> bool {
        self.revoked.get()
    }

    /// Stop the chain for good; hands back the frame that still needs cancelling.
    fn revoke(&self) -> Option<i32> {
        self.revoked.set(true);
        self.pending.take()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutionError {
    #[error("{0}")]
    Compile(String),
    #[error("{0}")]
    Runtime(String),
}

impl ExecutionError {
    pub fn message(&self) -> &str {
        match self {
            ExecutionError::Compile(message) | ExecutionError::Runtime(message) => message,
        }
    }
}

/// Everything the engine needs from a rendering host.
pub trait Sandbox {
    fn clear_surface(&self);
    fn cancel_frame(&self, handle: i32);
    /// Compile `source` into a unit that can reach only the surface and the
    /// frame functions bound to `frames`, then run it synchronously.
    fn run(&self, source: &str, frames: &SharedFrameChain) -> Result<(), ExecutionError>;
}

/// State recreated on every code update.
#[derive(Debug, Default)]
pub struct ExecutionContext {
    frames: Option<SharedFrameChain>,
    version: u64,
}

impl ExecutionContext {
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn frames(&self) -> Option<&SharedFrameChain> {
        self.frames.as_ref()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Blank,
    Running,
    Failed,
}

pub type ErrorCallback = Box<dyn FnMut(&str)>;

pub struct LiveCanvas<S: Sandbox> {
    sandbox: S,
    context: ExecutionContext,
    on_error: ErrorCallback,
}

impl<S: Sandbox> LiveCanvas<S> {
    pub fn new(sandbox: S, on_error: impl FnMut(&str) + 'static) -> Self {
        LiveCanvas {
            sandbox,
            context: ExecutionContext::default(),
            on_error: Box::new(on_error),
        }
    }

    pub fn sandbox(&self) -> &S {
        &self.sandbox
    }

    pub fn context(&self) -> &ExecutionContext {
        &self.context
    }

    /// Replace whatever is running with `code`.
    pub fn load(&mut self, code: &str) -> LoadOutcome {
        // must come first: two versions must never tick against one surface
        self.teardown();
        self.sandbox.clear_surface();
        self.context.version += 1;

        if code.is_empty() {
            return LoadOutcome::Blank;
        }

        let frames = FrameChain::new();
        self.context.frames = Some(frames.clone());
        match self.sandbox.run(code, &frames) {
            Ok(()) => LoadOutcome::Running,
            Err(err) => {
                // whatever was drawn before the throw stays; the next load clears it
                log_failure(self.context.version, &err);
                (self.on_error)(err.message());
                LoadOutcome::Failed
            }
        }
    }

    /// Stop the current script's frame chain, if any.
    pub fn teardown(&mut self) {
        if let Some(frames) = self.context.frames.take() {
            if let Some(handle) = frames.revoke() {
                self.sandbox.cancel_frame(handle);
            }
        }
    }
}

impl<S: Sandbox> Drop for LiveCanvas<S> {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(target_arch = "wasm32")]
fn log_failure(version: u64, err: &ExecutionError) {
    error!("Canvas execution error (version {}): {}", version, err);
}

#[cfg(not(target_arch = "wasm32"))]
fn log_failure(version: u64, err: &ExecutionError) {
    tracing::warn!(version, "canvas execution error: {err}");
}

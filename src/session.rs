//! Session state for the studio page, driven as a reducer.
//!
//! Every operation CONSUMES the current `SessionState` and returns the next
//! one, the same way a state machine transition moves `self`:
//! - the old snapshot can't be observed half-updated
//! - side effects (the HTTP call) come back as an `Effect` for the caller
//!   to perform, keeping this module free of browser types
use crate::protocol::{AssetMap, GenerationRequest, GenerationResult};

pub const REVERTED: &str = "Reverted to previous state";
pub const MANUALLY_EDITED: &str = "Code manually edited";

/// Identifies one dispatched generation. Monotonically increasing, so a
/// result for anything but the outstanding ticket is stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Ticket(u64);

pub enum Action {
    Generate(String),
    GenerationSucceeded { ticket: Ticket, result: GenerationResult },
    GenerationFailed { ticket: Ticket, message: String },
    Reset,
    EditCode(String),
    CanvasFailed(String),
    DismissError,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Submit { ticket: Ticket, request: GenerationRequest },
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct InFlight {
    ticket: Ticket,
    prompt: String,
    // code as it was when the prompt was sent; committed to history on success
    snapshot: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    pub current_code: String,
    pub prompt_history: Vec<String>,
    pub code_history: Vec<String>,
    pub explanation: String,
    pub existing_assets: AssetMap,
    pub error: Option<String>,
    in_flight: Option<InFlight>,
    next_ticket: u64,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn can_reset(&self) -> bool {
        !self.is_loading() && !self.code_history.is_empty()
    }

    pub fn apply(self, action: Action) -> (Self, Option<Effect>) {
        match action {
            Action::Generate(prompt) => self.generate(prompt),
            Action::GenerationSucceeded { ticket, result } => (self.commit(ticket, result), None),
            Action::GenerationFailed { ticket, message } => (self.fail(ticket, message), None),
            Action::Reset => (self.reset(), None),
            Action::EditCode(text) => (self.edit_code(text), None),
            Action::CanvasFailed(message) => (self.with_error(format!("Canvas Error: {message}")), None),
            Action::DismissError => (self.with_error(None::<String>), None),
        }
    }

    fn generate(mut self, prompt: String) -> (Self, Option<Effect>) {
        let prompt = prompt.trim().to_string();
        // one generation at a time: no queueing, no cancelling the outstanding one
        if self.is_loading() || prompt.is_empty() {
            return (self, None);
        }

        let ticket = Ticket(self.next_ticket);
        self.next_ticket += 1;
        let request = GenerationRequest {
            current_code: self.current_code.clone(),
            prompt_history: self.prompt_history.clone(),
            new_prompt: prompt.clone(),
            existing_assets: self.existing_assets.clone(),
        };
        self.in_flight = Some(InFlight {
            ticket,
            prompt,
            snapshot: self.current_code.clone(),
        });
        self.error = None;
        (self, Some(Effect::Submit { ticket, request }))
    }

    fn take_in_flight(&mut self, ticket: Ticket) -> Option<InFlight> {
        if self.in_flight.as_ref().map(|in_flight| in_flight.ticket) == Some(ticket) {
            self.in_flight.take()
        } else {
            None
        }
    }

    fn commit(mut self, ticket: Ticket, result: GenerationResult) -> Self {
        let Some(in_flight) = self.take_in_flight(ticket) else {
            return self;
        };
        if !in_flight.snapshot.is_empty() {
            self.code_history.push(in_flight.snapshot);
        }
        self.prompt_history.push(in_flight.prompt);
        self.current_code = result.new_code;
        self.explanation = result.explanation;
        for asset in result.generated_assets {
            self.existing_assets.insert(asset.name, asset.url);
        }
        self
    }

    fn fail(mut self, ticket: Ticket, message: String) -> Self {
        if self.take_in_flight(ticket).is_none() {
            return self;
        }
        self.error = Some(message);
        self
    }

    fn reset(mut self) -> Self {
        if !self.can_reset() {
            return self;
        }
        if let Some(previous) = self.code_history.pop() {
            self.current_code = previous;
            self.prompt_history.pop();
            self.explanation = REVERTED.to_string();
        }
        self
    }

    fn edit_code(mut self, text: String) -> Self {
        self.current_code = text;
        self.explanation = MANUALLY_EDITED.to_string();
        self
    }

    fn with_error(mut self, error: impl Into<Option<String>>) -> Self {
        self.error = error.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::GeneratedAsset;

    fn submit(state: SessionState, prompt: &str) -> (SessionState, Ticket, GenerationRequest) {
        match state.apply(Action::Generate(prompt.to_string())) {
            (state, Some(Effect::Submit { ticket, request })) => (state, ticket, request),
            (_, None) => panic!("generate({prompt}) was ignored"),
        }
    }

    fn succeed(state: SessionState, prompt: &str, code: &str) -> SessionState {
        let (state, ticket, _) = submit(state, prompt);
        let result = GenerationResult {
            new_code: code.to_string(),
            explanation: format!("applied {prompt}"),
            generated_assets: vec![],
        };
        state.apply(Action::GenerationSucceeded { ticket, result }).0
    }

    #[test]
    fn generate_sends_the_session_snapshot() {
        let state = succeed(SessionState::new(), "add a red square", "v1");
        let (state, _, request) = submit(state, "make it blue");

        assert!(state.is_loading());
        assert_eq!(request.current_code, "v1");
        assert_eq!(request.prompt_history, vec!["add a red square".to_string()]);
        assert_eq!(request.new_prompt, "make it blue");
    }

    #[test]
    fn success_commits_code_history_and_explanation() {
        let state = succeed(SessionState::new(), "add a red square", "v1");
        assert_eq!(state.current_code, "v1");
        assert_eq!(state.prompt_history, vec!["add a red square".to_string()]);
        // empty starting code is not worth undoing to
        assert!(state.code_history.is_empty());
        assert_eq!(state.explanation, "applied add a red square");
        assert!(!state.is_loading());

        let state = succeed(state, "add gravity", "v2");
        assert_eq!(state.code_history, vec!["v1".to_string()]);
        assert_eq!(state.prompt_history.len(), 2);
    }

    #[test]
    fn reset_undoes_exactly_the_last_generation() {
        let mut state = succeed(SessionState::new(), "p1", "v1");
        for (n, code) in ["v2", "v3", "v4"].iter().enumerate() {
            state = succeed(state, &format!("p{}", n + 2), code);
        }
        let (prompts, codes) = (state.prompt_history.len(), state.code_history.len());

        let state = state.apply(Action::Reset).0;
        assert_eq!(state.current_code, "v3");
        assert_eq!(state.prompt_history.len(), prompts - 1);
        assert_eq!(state.code_history.len(), codes - 1);
        assert_eq!(state.explanation, REVERTED);

        let state = state.apply(Action::Reset).0;
        assert_eq!(state.current_code, "v2");
    }

    #[test]
    fn reset_with_empty_history_is_a_no_op() {
        let state = SessionState::new().apply(Action::EditCode("draw()".into())).0;
        let before = state.clone();
        assert_eq!(state.apply(Action::Reset).0, before);
    }

    #[test]
    fn generate_is_ignored_while_loading() {
        let (state, first, _) = submit(SessionState::new(), "p1");
        let (state, effect) = state.apply(Action::Generate("p2".into()));
        assert!(effect.is_none());

        let result = GenerationResult {
            new_code: "v1".into(),
            explanation: "done".into(),
            generated_assets: vec![],
        };
        let state = state.apply(Action::GenerationSucceeded { ticket: first, result }).0;
        assert_eq!(state.prompt_history, vec!["p1".to_string()]);
    }

    #[test]
    fn blank_prompt_is_ignored() {
        let (state, effect) = SessionState::new().apply(Action::Generate("   ".into()));
        assert!(effect.is_none());
        assert!(!state.is_loading());
    }

    #[test]
    fn failure_leaves_code_and_history_untouched() {
        let state = succeed(SessionState::new(), "p1", "v1");
        let state = succeed(state, "p2", "v2");
        let before = (state.current_code.clone(), state.prompt_history.clone(), state.code_history.clone());

        let (state, ticket, _) = submit(state, "p3");
        let state = state
            .apply(Action::GenerationFailed { ticket, message: "Invalid response structure from AI".into() })
            .0;

        assert_eq!((state.current_code.clone(), state.prompt_history.clone(), state.code_history.clone()), before);
        assert_eq!(state.error.as_deref(), Some("Invalid response structure from AI"));
        assert!(!state.is_loading());
        assert_eq!(state.code_history.len() + 1, state.prompt_history.len());
    }

    #[test]
    fn stale_results_are_discarded() {
        let (state, stale, _) = submit(SessionState::new(), "p1");
        let state = state
            .apply(Action::GenerationFailed { ticket: stale, message: "timeout".into() })
            .0;
        let (state, current, _) = submit(state, "p2");
        assert!(current > stale);

        let late = GenerationResult {
            new_code: "stale".into(),
            explanation: "late".into(),
            generated_assets: vec![],
        };
        let state = state.apply(Action::GenerationSucceeded { ticket: stale, result: late }).0;
        assert!(state.is_loading());
        assert_eq!(state.current_code, "");
    }

    #[test]
    fn edit_code_overwrites_without_touching_history() {
        let state = succeed(SessionState::new(), "p1", "v1");
        let state = state.apply(Action::EditCode("v1 edited".into())).0;
        assert_eq!(state.current_code, "v1 edited");
        assert_eq!(state.explanation, MANUALLY_EDITED);
        assert_eq!(state.prompt_history.len(), 1);
        assert!(state.code_history.is_empty());
    }

    #[test]
    fn generated_assets_are_remembered_by_name() {
        let (state, ticket, _) = submit(SessionState::new(), "dragon player");
        let result = GenerationResult {
            new_code: "v1".into(),
            explanation: "dragon".into(),
            generated_assets: vec![GeneratedAsset::image("playerSprite", "https://cdn.test/a.png")],
        };
        let state = state.apply(Action::GenerationSucceeded { ticket, result }).0;

        let (state, ticket, request) = submit(state, "greener dragon");
        assert_eq!(request.existing_assets["playerSprite"], "https://cdn.test/a.png");

        let result = GenerationResult {
            new_code: "v2".into(),
            explanation: "greener".into(),
            generated_assets: vec![GeneratedAsset::image("playerSprite", "https://cdn.test/b.png")],
        };
        let state = state.apply(Action::GenerationSucceeded { ticket, result }).0;
        assert_eq!(state.existing_assets.len(), 1);
        assert_eq!(state.existing_assets["playerSprite"], "https://cdn.test/b.png");
    }

    #[test]
    fn errors_are_shown_until_dismissed() {
        let state = SessionState::new().apply(Action::CanvasFailed("x is not defined".into())).0;
        assert_eq!(state.error.as_deref(), Some("Canvas Error: x is not defined"));
        let state = state.apply(Action::DismissError).0;
        assert_eq!(state.error, None);
    }
}

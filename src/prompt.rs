//! Builds the single instruction payload sent to the text model.
use crate::protocol::{AssetMap, GenerationRequest};
use crate::template;

// ==================== Constants ====================
pub const SYSTEM_INSTRUCTION: &str = r#"You are an expert game development assistant for the HTML5 Canvas API with multimodal asset generation. You build a game iteratively by rewriting a single JavaScript file and requesting image assets when the user asks for visual changes.

INPUT: you receive the current code, the existing assets (asset name -> URL), the history of earlier prompts, and the user's new prompt.

RUNTIME: the code runs as the body of a function whose only parameters are `canvas` (the game's HTMLCanvasElement), `requestAnimationFrame` and `cancelAnimationFrame`. Draw on `canvas` and drive the game loop with `requestAnimationFrame`.

OUTPUT FORMAT: reply with ONLY a JSON object with these keys:
- "newCode": string, the complete updated JavaScript code
- "explanation": string, a 1-2 sentence summary of what changed
- "imageGenerationPrompt": optional object {"name": string, "description": string}, present only when a new image asset is needed

IMAGE RULES:
- Any change to how something LOOKS (colour, style, character, sprite, pixel art, background) MUST request an image through "imageGenerationPrompt".
- Player visuals use the name "playerSprite", obstacles "spikeSprite" or "platformSprite", backgrounds "backgroundImage".
- Descriptions must be specific: size (32x32 for sprites), style (pixel art, cartoon, ...) and perspective (side-view for platformers).

CODE RULES:
- Code that references an image that does not exist yet MUST use the placeholder string 'PENDING_<name>' (for example assetUrls.player = 'PENDING_playerSprite'); it is replaced with the real URL before the code runs.
- Assets listed under Existing Assets already exist: reference their URLs directly and do NOT request them again.
- Draw functions must actually use the sprites once loaded, and keep the coloured-shape fallback for when an image is missing.

Return ONLY valid JSON. No markdown, no code fences, no text before or after the object."#;

const NO_HISTORY: &str = "None";

// ==================== Prompt ====================
/// Borrowed view of everything the compiler needs.
pub struct PromptInput<'a> {
    pub current_code: &'a str,
    pub prompt_history: &'a [String],
    pub new_prompt: &'a str,
    pub existing_assets: &'a AssetMap,
}

impl<'a> From<&'a GenerationRequest> for PromptInput<'a> {
    fn from(request: &'a GenerationRequest) -> Self {
        PromptInput {
            current_code: &request.current_code,
            prompt_history: &request.prompt_history,
            new_prompt: &request.new_prompt,
            existing_assets: &request.existing_assets,
        }
    }
}

/// Assemble the payload:
/// system instruction -> Current Code -> Existing Assets -> Prompt History -> New Prompt
pub fn compile_prompt(input: &PromptInput) -> String {
    let code = if input.current_code.trim().is_empty() {
        template::DEFAULT_GAME.trim()
    } else {
        input.current_code
    };

    // a String-keyed map always serializes
    let assets = serde_json::to_string(input.existing_assets).unwrap_or_else(|_| "{}".into());

    let history = if input.prompt_history.is_empty() {
        NO_HISTORY.to_string()
    } else {
        input.prompt_history.join("\n")
    };

    let mut payload = String::with_capacity(
        SYSTEM_INSTRUCTION.len() + code.len() + assets.len() + history.len() + 128,
    );
    payload.push_str(SYSTEM_INSTRUCTION);
    payload.push_str("\n\n");
    push_section(&mut payload, "Current Code", code);
    push_section(&mut payload, "Existing Assets", &assets);
    push_section(&mut payload, "Prompt History", &history);
    payload.push_str("New Prompt:\n");
    payload.push_str(input.new_prompt);
    payload
}

fn push_section(payload: &mut String, label: &str, body: &str) {
    payload.push_str(label);
    payload.push_str(":\n");
    payload.push_str(body);
    payload.push_str("\n\n");
}

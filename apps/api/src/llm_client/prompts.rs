// Shared prompt fragments. Each component that calls the model keeps its own
// prompts next to it; only cross-cutting pieces live here.

/// System prompt fragment that enforces JSON-only output.
pub const JSON_ONLY_SYSTEM: &str = "You MUST respond with a single valid JSON object only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// Maximum characters of any free-text context block placed into a prompt.
pub const MAX_BLOCK_CHARS: usize = 2_000;

/// Truncates `text` to `MAX_BLOCK_CHARS` on a char boundary.
pub fn clip(text: &str) -> String {
    if text.chars().count() <= MAX_BLOCK_CHARS {
        return text.to_string();
    }
    let mut clipped: String = text.chars().take(MAX_BLOCK_CHARS).collect();
    clipped.push('…');
    clipped
}

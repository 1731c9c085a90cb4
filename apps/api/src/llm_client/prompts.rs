// Shared prompt fragments. Each service that needs LLM calls defines its own
// prompts.rs alongside it; this file holds the cross-cutting pieces.

/// System prompt fragment that enforces JSON-only output.
pub const JSON_ONLY_SYSTEM: &str = "You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// Instruction that keeps masking tokens intact through the model.
pub const PRESERVE_TOKENS_INSTRUCTION: &str = "\
    CRITICAL: The text contains placeholder tokens such as ⟦M0⟧, ⟦M1⟧ or ⟦M1_0⟧. \
    Copy every token exactly as written, keep each one exactly once, and keep them \
    in the same position relative to the surrounding words. Never translate, \
    reorder, merge or drop a token.";

// All LLM prompt constants for the Generation module.
// Reuses cross-cutting fragments from llm_client::prompts.

/// System prompt for the first draft. Plain text out, no JSON.
pub const GENERATE_SYSTEM: &str = "You are a concise LinkedIn content writer. \
    Reply with the post text only: no preamble, no title, no surrounding quotes.";

/// First-draft template.
/// Replace: {topic}, {context_block}, {niche}, {tone}
pub const GENERATE_PROMPT_TEMPLATE: &str = r#"Given this trending headline or summary:
"{topic}"
{context_block}
Write a LinkedIn post (80-160 words) targeting {niche}.
Tone: {tone}.
Include:
- A one-line hook (strong first sentence).
- Two short valuable insights the reader can act on.
- A soft CTA question to drive comments.
Return in plain text."#;

/// Inserted into `{context_block}` when the topic came with a body.
/// Replace: {context}
pub const CONTEXT_BLOCK_TEMPLATE: &str = r#"
Additional context from the source:
"""
{context}
"""
"#;

/// System prompt for the engagement rewrite. JSON only.
/// Replace: {json_rules}
pub const OPTIMIZE_SYSTEM_TEMPLATE: &str =
    "You are a LinkedIn growth strategist and copywriter. {json_rules}";

/// Engagement rewrite template.
/// Replace: {preserve_facts}, {draft}
pub const OPTIMIZE_PROMPT_TEMPLATE: &str = r#"Polish the following LinkedIn post to maximize human tone, storytelling, and virality.
{preserve_facts}

Rules:
- Keep under 1200 characters.
- Add at most one short personal anecdote or micro-story, only if it fits.
- Use 1-2 emojis, sparingly.
- End with a question or a one-line CTA.
- Keep it readable: short sentences.

Post to optimize:
"""
{draft}
"""

Return a JSON object with this EXACT schema (no extra fields):
{
  "optimizedText": "the optimized post text",
  "optimizedMeta": {
    "hooks": ["question", "stat"],
    "emotionalScore": 0.7,
    "engagementPrediction": 0.6
  }
}

`hooks` lists the hook types used (may be empty).
`emotionalScore` and `engagementPrediction` are numbers between 0.0 and 1.0."#;

/// System prompt for tone adaptation. JSON only.
/// Replace: {json_rules}
pub const ADAPT_SYSTEM_TEMPLATE: &str =
    "You are an editor who matches a writer's established voice. {json_rules}";

/// Tone adaptation template.
/// Replace: {learned_tone_json}, {post}
pub const ADAPT_PROMPT_TEMPLATE: &str = r#"Here is my learned tone profile:
{learned_tone_json}

Field meanings: avg_length is the typical post length in characters, preferred_hooks are the hook types I use most,
sentence_complexity is an average clauses-per-sentence scalar, emoji_usage is the share of sentences with an emoji.

Analyze the post below against that profile. If it deviates, adjust word choice and length to match my tone.
Keep the facts, the hook and the closing question.

Post:
"""
{post}
"""

Return a JSON object with this EXACT schema (no extra fields):
{
  "finalPost": "the adapted post text",
  "score": 0.85,
  "adjustments": ["Shortened the intro to match average length"]
}

`score` is how well the final post matches the learned tone, between 0.0 and 1.0.
`adjustments` lists each change you made in plain language (empty if none)."#;

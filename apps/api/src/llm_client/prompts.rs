// Shared prompt fragments.
// Each feature that needs LLM calls defines its own prompts.rs alongside it;
// this file only holds cross-cutting pieces.

/// System prompt fragment that enforces JSON-only output.
pub const JSON_ONLY_RULES: &str = "You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// Instruction appended to every rewriting prompt so edits never invent facts.
pub const PRESERVE_FACTS_INSTRUCTION: &str = "\
    Preserve every fact, number and claim from the input. \
    Do NOT invent statistics, quotes, companies or events that are not in the input.";

/// Fills `{key}` placeholders in a single pass.
///
/// Substituted values are never rescanned, so user text containing `{topic}`
/// or JSON braces is inserted verbatim. Unknown `{...}` sequences are kept.
pub fn fill_template(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let tail = &rest[open + 1..];
        let hit = vars
            .iter()
            .find(|(key, _)| tail.strip_prefix(key).is_some_and(|t| t.starts_with('}')));
        match hit {
            Some((key, value)) => {
                out.push_str(value);
                rest = &tail[key.len() + 1..];
            }
            None => {
                out.push('{');
                rest = tail;
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_template_replaces_known_keys() {
        let out = fill_template("Hi {name}, tone {tone}.", &[("name", "Ada"), ("tone", "warm")]);
        assert_eq!(out, "Hi Ada, tone warm.");
    }

    #[test]
    fn test_fill_template_keeps_json_braces() {
        let out = fill_template(r#"{"a": "{v}"}"#, &[("v", "1")]);
        assert_eq!(out, r#"{"a": "1"}"#);
    }

    #[test]
    fn test_fill_template_does_not_rescan_values() {
        let out = fill_template("{a}|{b}", &[("a", "{b}"), ("b", "x")]);
        assert_eq!(out, "{b}|x");
    }

    #[test]
    fn test_fill_template_repeated_key() {
        let out = fill_template("{x}{x}", &[("x", "ab")]);
        assert_eq!(out, "abab");
    }
}

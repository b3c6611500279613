//! System prompt resolution.

/// Placeholder for the follow-up instructions.
pub const FOLLOWUP_PLACEHOLDER: &str = "{follow_up_questions_prompt}";

/// Placeholder for text injected through a `>>>` override.
pub const INJECTED_PLACEHOLDER: &str = "{injected_prompt}";

/// Prefix that turns an override into an injection.
pub const INJECTION_PREFIX: &str = ">>>";

/// Resolve the system prompt for the answer call.
///
/// - no override: `template` with nothing injected
/// - `>>>text`: `template` with `text` and a newline injected
/// - anything else replaces `template`; only the follow-up placeholder is filled
pub fn system_prompt(template: &str, override_prompt: Option<&str>, followup_prompt: &str) -> String {
    match override_prompt {
        None => fill(template, "", followup_prompt),
        Some(o) => match o.strip_prefix(INJECTION_PREFIX) {
            Some(injected) => fill(template, &format!("{injected}\n"), followup_prompt),
            None => o.replace(FOLLOWUP_PLACEHOLDER, followup_prompt),
        },
    }
}

fn fill(template: &str, injected: &str, followup_prompt: &str) -> String {
    template
        .replace(FOLLOWUP_PLACEHOLDER, followup_prompt)
        .replace(INJECTED_PLACEHOLDER, injected)
}

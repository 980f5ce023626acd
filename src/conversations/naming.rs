//! Naming rules: default names, names derived from the first message, and the
//! mangled form given to deleted conversations.

use std::sync::OnceLock;

use regex::Regex;

/// Maximum length, in characters, of a name derived from a message.
pub const NAME_MAX_CHARS: usize = 20;

const DEFAULT_NAME_PATTERN: &str = r"^New chat \(\d+\)$";

fn default_name_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(DEFAULT_NAME_PATTERN).ok()).as_ref()
}

/// Default name for probe index `index`.
#[must_use]
pub fn default_name(index: usize) -> String {
    format!("New chat ({index})")
}

/// Whether `name` still carries the default pattern.
#[must_use]
pub fn is_default_name(name: &str) -> bool {
    default_name_regex().is_some_and(|re| re.is_match(name.trim()))
}

/// Name stored on a soft-deleted record so the plain name becomes reusable.
#[must_use]
pub fn deleted_name(name: &str) -> String {
    format!("__delete_{name}_delete__")
}

/// Smallest free "New chat (i)", probing from 1.
#[must_use]
pub fn next_default_name<F>(is_taken: F) -> String
where
    F: Fn(&str) -> bool,
{
    let mut index = 1;
    loop {
        let candidate = default_name(index);
        if !is_taken(&candidate) {
            return candidate;
        }
        index += 1;
    }
}

/// Candidate name derived from the first user message: trimmed, then cut to
/// [`NAME_MAX_CHARS`] characters.
#[must_use]
pub fn derive_candidate(message: &str) -> String {
    message.trim().chars().take(NAME_MAX_CHARS).collect()
}

/// `base` if free, else `base_1`, `base_2`, ... whichever is free first.
#[must_use]
pub fn unique_name<F>(base: &str, is_taken: F) -> String
where
    F: Fn(&str) -> bool,
{
    if !is_taken(base) {
        return base.to_string();
    }
    let mut suffix = 1;
    loop {
        let candidate = format!("{base}_{suffix}");
        if !is_taken(&candidate) {
            return candidate;
        }
        suffix += 1;
    }
}

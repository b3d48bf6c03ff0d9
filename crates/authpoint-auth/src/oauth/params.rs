//! Request parameter names and list helpers.

use std::collections::BTreeSet;

pub const CLIENT_ID: &str = "client_id";
pub const REDIRECT_URI: &str = "redirect_uri";
pub const STATE: &str = "state";
pub const SCOPE: &str = "scope";
pub const RESPONSE_TYPE: &str = "response_type";
pub const PROMPT: &str = "prompt";
pub const CODE_CHALLENGE: &str = "code_challenge";
pub const CODE_CHALLENGE_METHOD: &str = "code_challenge_method";
pub const CODE_VERIFIER: &str = "code_verifier";

/// `prompt` value asking the server not to display any UI.
pub const PROMPT_NONE: &str = "none";

/// Splits a space (or comma) delimited parameter into a set.
///
/// Empty items are dropped.
#[must_use]
pub fn parse_parameter_list(value: &str) -> BTreeSet<String> {
    value
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Joins a set back into a space delimited parameter.
#[must_use]
pub fn format_parameter_list<'a>(values: impl IntoIterator<Item = &'a String>) -> String {
    values
        .into_iter()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(" ")
}

//! String helpers shared by naming, labels and dashboards

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

static DYNAMIC_LABEL_BRACKETS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*\([^()]*\$\{[^()]*\)").expect("static regex"));

static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("static regex"));

/// Join tokens with `separator`, skipping empty tokens and any token that
/// case-insensitively repeats an earlier one. First occurrence wins.
pub fn join_distinct<'a, I>(tokens: I, separator: &str) -> String
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    let mut seen = HashSet::new();
    let mut kept: Vec<&str> = Vec::new();

    for token in tokens.into_iter().flatten() {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        if seen.insert(token.to_lowercase()) {
            kept.push(token);
        }
    }

    kept.join(separator)
}

/// Strip bracketed parts containing dynamic labels, e.g. `Latency (avg: ${AVG})`
/// becomes `Latency`.
pub fn remove_brackets_with_dynamic_labels(label: &str) -> String {
    let stripped = DYNAMIC_LABEL_BRACKETS.replace_all(label, "");
    WHITESPACE_RUN.replace_all(stripped.trim(), " ").into_owned()
}

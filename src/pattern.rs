//! Glob matching for namespace discovery
//!
//! Filters a flat set of child names against one path segment of a query
//! pattern. Plain globs (`*`, `?`, character classes) are supported, extended
//! with a single brace-alternation group: `{foo,bar}baz` matches `foobaz` or
//! `barbaz`. Only the leftmost brace group is expanded.

use glob::Pattern;
use std::collections::HashSet;

/// Filter `entries` by `pattern`.
///
/// With a brace group, matches from each expanded variant are unioned in
/// first-seen order with duplicates removed. Without one, matches are sorted
/// lexically. An unparsable glob matches nothing.
pub fn match_entries(entries: &[String], pattern: &str) -> Vec<String> {
    let open = pattern.find('{');
    let close = pattern.find('}');

    if let (Some(open), Some(close)) = (open, close) {
        if close > open {
            let mut matching = Vec::new();
            for variation in pattern[open + 1..close].split(',') {
                let variant = format!(
                    "{}{}{}",
                    &pattern[..open],
                    variation,
                    &pattern[close + 1..]
                );
                matching.extend(filter(entries, &variant));
            }
            return deduplicate(matching);
        }
    }

    let mut matching = filter(entries, pattern);
    matching.sort();
    matching
}

fn filter(entries: &[String], pattern: &str) -> Vec<String> {
    let Ok(glob) = Pattern::new(pattern) else {
        return Vec::new();
    };
    entries
        .iter()
        .filter(|entry| glob.matches(entry))
        .cloned()
        .collect()
}

/// Remove duplicates without changing order.
fn deduplicate(entries: Vec<String>) -> Vec<String> {
    let mut yielded = HashSet::new();
    entries
        .into_iter()
        .filter(|entry| yielded.insert(entry.clone()))
        .collect()
}

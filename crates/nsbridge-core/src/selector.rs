//! Selector resolution
//!
//! Host method names cannot contain `:`, so `_` stands in for both the
//! colon and a literal underscore. A name with k underscores therefore has
//! 2^k possible selector spellings; all of them are tried in a fixed order
//! and the first one the receiver responds to wins.

use std::sync::{Arc, LazyLock};

use dashmap::DashMap;

/// Hard ceiling on the permutation search regardless of configuration
const PERMUTATION_LIMIT: usize = 20;

/// Separator assignments by underscore count.
///
/// Entry i, position j is `_` when bit j of i is set and `:` otherwise.
static PERMUTATIONS: LazyLock<DashMap<usize, Arc<[Box<[char]>]>>> = LazyLock::new(DashMap::new);

/// All separator assignments for `count` underscores, in the order they are tried
pub fn permutations(count: usize) -> Arc<[Box<[char]>]> {
    if let Some(cached) = PERMUTATIONS.get(&count) {
        return Arc::clone(cached.value());
    }
    let total = 1usize << count;
    let generated: Arc<[Box<[char]>]> = (0..total)
        .map(|i| {
            (0..count)
                .map(|j| if i & (1 << j) != 0 { '_' } else { ':' })
                .collect::<Box<[char]>>()
        })
        .collect();
    tracing::debug!(count, total, "cached selector permutations");
    Arc::clone(PERMUTATIONS.entry(count).or_insert(generated).value())
}

/// Candidate selector names for a host method name, in the order they are tried.
///
/// Names with more than `max_separators` underscores only get the
/// deterministic escape mapping, see [`selector_name_from_host`].
pub fn candidate_selectors(host_name: &str, max_separators: usize) -> Vec<String> {
    let mut parts = host_name.split('_');
    let head = parts.next().unwrap_or_default();
    let rest: Vec<&str> = parts.collect();
    if rest.is_empty() {
        return vec![host_name.to_string()];
    }
    if rest.len() > max_separators.min(PERMUTATION_LIMIT) {
        return vec![selector_name_from_host(host_name)];
    }
    permutations(rest.len())
        .iter()
        .map(|separators| {
            let mut name = String::with_capacity(host_name.len());
            name.push_str(head);
            for (separator, part) in separators.iter().zip(&rest) {
                name.push(*separator);
                name.push_str(part);
            }
            name
        })
        .collect()
}

/// Probe the candidate spellings of `host_name`, returning the first that
/// `responds` accepts
pub fn resolve(
    host_name: &str,
    max_separators: usize,
    mut responds: impl FnMut(&str) -> bool,
) -> Option<String> {
    candidate_selectors(host_name, max_separators)
        .into_iter()
        .find(|candidate| responds(candidate))
}

/// Escape mapping from host to selector spelling: `__` becomes `_`, `_` becomes `:`
pub fn selector_name_from_host(host_name: &str) -> String {
    let mut out = String::with_capacity(host_name.len());
    let mut chars = host_name.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '_' {
            if chars.peek() == Some(&'_') {
                chars.next();
                out.push('_');
            } else {
                out.push(':');
            }
        } else {
            out.push(ch);
        }
    }
    out
}

/// Escape mapping from selector to host spelling: `:` becomes `_`, `_` becomes `__`
pub fn selector_name_to_host(selector: &str) -> String {
    let mut out = String::with_capacity(selector.len() + 4);
    for ch in selector.chars() {
        match ch {
            ':' => out.push('_'),
            '_' => out.push_str("__"),
            other => out.push(other),
        }
    }
    out
}

//! # Identity Normalizer
//! Canonicalizes raw handles/usernames into a single comparable key.
//!
//! Every component that compares two handles must route both sides through
//! [`normalize`]; there is no alternate comparison path. The function is pure
//! and total: bad input yields the empty-string sentinel, which downstream
//! components treat as "unattributable" and exclude.

/// Canonical identity key: lowercase, no leading `@`, no surrounding whitespace.
///
/// Empty or whitespace-only input returns `""`.
pub fn normalize(raw: &str) -> String {
    let trimmed = raw.trim();
    let stripped = trimmed.strip_prefix('@').unwrap_or(trimmed);
    stripped.trim().to_lowercase()
}

/// True when a normalized key carries no attribution and must be skipped.
pub fn is_unattributable(key: &str) -> bool {
    key.is_empty()
}

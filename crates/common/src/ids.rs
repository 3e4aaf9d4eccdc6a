//! Deterministic content identifiers.
//!
//! A chunk is identified by `sha256("<url>::chunk::<index>")` truncated to
//! 16 hex characters; a page by `sha256("page::<url>")` truncated the same
//! way. Stable across re-ingests, so re-indexing a page overwrites its own
//! chunks instead of accumulating stale ones.

use sha2::{Digest, Sha256};

fn short_hash(raw: &str) -> String {
    let digest = Sha256::digest(raw.as_bytes());
    hex::encode(digest)[..16].to_string()
}

/// Identifier for chunk `index` of the page at `url`.
pub fn chunk_id(url: &str, index: usize) -> String {
    short_hash(&format!("{url}::chunk::{index}"))
}

/// Identifier for the page record of `url`.
pub fn page_id(url: &str) -> String {
    short_hash(&format!("page::{url}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_deterministic() {
        assert_eq!(chunk_id("https://a.com/x", 0), chunk_id("https://a.com/x", 0));
        assert_eq!(page_id("https://a.com/x"), page_id("https://a.com/x"));
    }

    #[test]
    fn ids_are_sixteen_hex_chars() {
        let id = chunk_id("https://a.com/x", 3);
        assert_eq!(id.len(), 16);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn chunk_index_changes_the_id() {
        assert_ne!(chunk_id("https://a.com/x", 0), chunk_id("https://a.com/x", 1));
    }

    #[test]
    fn page_and_chunk_namespaces_differ() {
        assert_ne!(page_id("https://a.com/x"), chunk_id("https://a.com/x", 0));
    }
}

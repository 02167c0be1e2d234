//! Rewrites bracket indexed keys into dotted paths.
use thiserror::Error;

/// A key whose brackets do not pair up.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unmatched brackets in key {0:?}")]
pub struct UnbalancedBrackets(pub String);

/// Rewrite `posts[0][title]` into `posts.0.title`.
///
/// Every `[` that does not immediately close becomes a `.`, all brackets are dropped, so an
/// empty pair `[]` disappears entirely.
pub fn normalize_key(key: &str) -> Result<String, UnbalancedBrackets> {
    let mut normalized = String::with_capacity(key.len());
    let mut open = 0usize;
    let mut chars = key.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '[' => {
                open += 1;
                if chars.peek().map_or(false, |&next| next != ']') {
                    normalized.push('.');
                }
            }
            ']' => {
                open = open
                    .checked_sub(1)
                    .ok_or_else(|| UnbalancedBrackets(key.to_owned()))?;
            }
            other => normalized.push(other),
        }
    }

    if open > 0 {
        return Err(UnbalancedBrackets(key.to_owned()));
    }

    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_indices() {
        assert_eq!(normalize_key("posts[0][title]").unwrap(), "posts.0.title");
        assert_eq!(normalize_key("a[b][c][1]").unwrap(), "a.b.c.1");
    }

    #[test]
    fn empty_pair_is_elided() {
        assert_eq!(normalize_key("names[]").unwrap(), "names");
        assert_eq!(normalize_key("plain").unwrap(), "plain");
    }

    #[test]
    fn unbalanced_is_rejected() {
        assert!(normalize_key("posts[0").is_err());
        assert!(normalize_key("posts]0[").is_err());
        assert!(normalize_key("posts[").is_err());
    }

    #[test]
    fn output_is_bracket_free() {
        for key in ["x[1][y]", "[a]", "a[][b]", "q[x][]"] {
            let normalized = normalize_key(key).unwrap();
            assert!(!normalized.contains(['[', ']']), "{}", normalized);
        }
    }
}

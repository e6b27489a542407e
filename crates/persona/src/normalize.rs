//! Deterministic persona label normalization (§4.1)
//!
//! lowercase → collapse non-alphanumeric runs to a single space → trim →
//! drop a leading `character` token → iteratively drop trailing qualifier
//! tokens from a closed set.

const TRAILING_QUALIFIERS: &[&str] = &["thought", "spoken", "inner", "fantasy", "quoted", "exclaimed"];
const LEADING_DROP: &str = "character";

/// Normalize a raw persona label into its canonical form.
///
/// `normalize(normalize(s)) == normalize(s)` for all `s` (I8): every step is
/// idempotent, and a string that already has no separators, leading
/// `character`, or trailing qualifier token is left unchanged.
pub fn normalize(raw: &str) -> String {
    let collapsed = collapse_non_alphanumeric(raw);
    let mut tokens: Vec<&str> = collapsed.split_whitespace().collect();

    if tokens.first() == Some(&LEADING_DROP) {
        tokens.remove(0);
    }

    while let Some(last) = tokens.last() {
        if TRAILING_QUALIFIERS.contains(last) {
            tokens.pop();
        } else {
            break;
        }
    }

    tokens.join(" ")
}

fn collapse_non_alphanumeric(raw: &str) -> String {
    let lower = raw.to_lowercase();
    let mut out = String::with_capacity(lower.len());
    let mut pending_space = false;

    for c in lower.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            out.push(c);
        } else {
            pending_space = true;
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aliases_collapse_to_the_same_canonical() {
        let a = normalize("Father_Terrier");
        let b = normalize("Father Terrier (thought)");
        let c = normalize("father terrier");
        assert_eq!(a, "father terrier");
        assert_eq!(a, b);
        assert_eq!(b, c);
    }

    #[test]
    fn drops_leading_character_token() {
        assert_eq!(normalize("Character Alice (spoken)"), "alice");
    }

    #[test]
    fn idempotent() {
        for raw in ["Narrator", "Character Bob (exclaimed)", "mrs. dalloway!!"] {
            let once = normalize(raw);
            let twice = normalize(&once);
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn only_drops_trailing_qualifiers_not_mid_sentence() {
        // "thought" appears mid-string, not as a trailing qualifier token
        assert_eq!(normalize("thought police"), "thought police");
    }
}

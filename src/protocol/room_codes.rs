//! Room code generation.
//!
//! Uses the ambiguous-char-free alphabet named in the data model
//! (`ABCDEFGHJKLMNPQRSTUVWXYZ23456789` — no `0`, `O`, `I`, `1`) so that codes
//! read back unambiguously over voice or on a phone screen. Input is always
//! uppercased before lookup.

use rand::Rng;

/// Ambiguous-char-free alphabet: letters first, then digits, matching the
/// data model's documented ordering exactly.
const CLEAN_CHARS: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Generate a room code of the given length using [`CLEAN_CHARS`].
#[must_use]
pub fn generate_room_code(length: usize) -> String {
    if length == 0 {
        return String::new();
    }
    let mut rng = rand::rng();
    (0..length)
        .map(|_| {
            let idx = rng.random_range(0..CLEAN_CHARS.len());
            // SAFETY: `idx` is produced by `random_range(0..len)`, so it is
            // always within [0, len).
            #[allow(clippy::indexing_slicing)]
            let ch = CLEAN_CHARS[idx] as char;
            ch
        })
        .collect()
}

/// Normalize a client-supplied room code for lookup: uppercase, trimmed.
#[must_use]
pub fn normalize_room_code(raw: &str) -> String {
    raw.trim().to_ascii_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_codes_avoid_ambiguous_characters() {
        for _ in 0..200 {
            let code = generate_room_code(6);
            assert_eq!(code.len(), 6);
            assert!(!code.contains('0'));
            assert!(!code.contains('O'));
            assert!(!code.contains('I'));
            assert!(!code.contains('1'));
            assert!(code.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
        }
    }

    #[test]
    fn normalization_uppercases_and_trims() {
        assert_eq!(normalize_room_code(" abc234 "), "ABC234");
    }

    #[test]
    fn empty_length_yields_empty_string() {
        assert_eq!(generate_room_code(0), "");
    }

    #[test]
    fn generates_many_unique_codes() {
        let mut codes = std::collections::HashSet::new();
        for _ in 0..200 {
            codes.insert(generate_room_code(6));
        }
        assert!(codes.len() > 190);
    }
}

//! Deterministic hashing used to seed in-match randomness (enemy AI steps,
//! `worldHash`). Gameplay determinism forbids a nondeterministic RNG here —
//! every "random" choice the simulator makes is actually a hash of
//! `matchId|tick|id`-style strings, so identical input streams reproduce
//! identical ticks.

/// FNV-1a-32, offset basis `0x811C9DC5`, prime `0x01000193`.
#[must_use]
pub fn fnv1a_32(bytes: &[u8]) -> u32 {
    let mut hash: u32 = 0x811C_9DC5;
    for &byte in bytes {
        hash ^= u32::from(byte);
        hash = hash.wrapping_mul(0x0100_0193);
    }
    hash
}

/// Hex-encodes an FNV-1a-32 hash of `bytes`, used for `worldHash`.
#[must_use]
pub fn fnv1a_32_hex(bytes: &[u8]) -> String {
    format!("{:08x}", fnv1a_32(bytes))
}

/// Hashes a `matchId|tick|id`-style seed string into a `u32`, used to pick a
/// uniformly-distributed index among candidate choices (e.g. enemy AI move
/// direction) without any stateful RNG.
#[must_use]
pub fn seeded_hash(parts: &[&str]) -> u32 {
    let joined = parts.join("|");
    fnv1a_32(joined.as_bytes())
}

/// Picks an index in `0..len` from a seed string, for deterministic
/// "uniform choice among N candidates" decisions. Returns `0` if `len == 0`.
#[must_use]
pub fn seeded_choice(parts: &[&str], len: usize) -> usize {
    if len == 0 {
        return 0;
    }
    (seeded_hash(parts) as usize) % len
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fnv1a_32_of_empty_is_offset_basis() {
        assert_eq!(fnv1a_32(b""), 0x811C_9DC5);
    }

    #[test]
    fn fnv1a_32_is_deterministic_across_calls() {
        let a = fnv1a_32(b"hello world");
        let b = fnv1a_32(b"hello world");
        assert_eq!(a, b);
    }

    #[test]
    fn fnv1a_32_hex_is_lowercase_eight_chars() {
        let hex = fnv1a_32_hex(b"tiles");
        assert_eq!(hex.len(), 8);
        assert!(hex.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn seeded_choice_is_deterministic_and_in_bounds() {
        let seed = ["match-1", "42", "enemy-3"];
        let a = seeded_choice(&seed, 4);
        let b = seeded_choice(&seed, 4);
        assert_eq!(a, b);
        assert!(a < 4);
    }

    #[test]
    fn seeded_choice_of_zero_len_returns_zero() {
        assert_eq!(seeded_choice(&["x"], 0), 0);
    }

    #[test]
    fn different_ticks_usually_produce_different_choices() {
        let mut distinct = std::collections::HashSet::new();
        for tick in 0..20 {
            let seed = format!("match-1|{tick}|enemy-0");
            distinct.insert(fnv1a_32(seed.as_bytes()) % 4);
        }
        assert!(distinct.len() > 1);
    }
}

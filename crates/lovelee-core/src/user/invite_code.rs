//! Invite codes.
//!
//! Codes are uppercase alphanumeric and compared after uppercasing, so users
//! may type them in any case.

use rand::Rng;

const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Draws a random code of `length` characters.
pub fn generate<R: Rng + ?Sized>(rng: &mut R, length: usize) -> String {
    (0..length)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

/// Canonical form used for storage and lookup.
pub fn normalize(code: &str) -> String {
    code.trim().to_uppercase()
}

/// Whether `code` (already normalized) could have been produced by [`generate`].
pub fn is_well_formed(code: &str, length: usize) -> bool {
    code.len() == length && code.bytes().all(|b| ALPHABET.contains(&b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_generated_codes_are_well_formed() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..100 {
            let code = generate(&mut rng, 6);
            assert!(is_well_formed(&code, 6), "bad code {code}");
        }
    }

    #[test]
    fn test_normalize_uppercases_and_trims() {
        assert_eq!(normalize(" ab12cd "), "AB12CD");
        assert!(is_well_formed(&normalize("ab12cd"), 6));
        assert!(!is_well_formed("AB12C", 6));
        assert!(!is_well_formed("AB-2CD", 6));
    }
}

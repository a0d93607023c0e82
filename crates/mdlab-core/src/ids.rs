//! Human-readable identifier generation.
//!
//! Both patient IDs and appointment codes are random tokens that rely on a
//! UNIQUE index in the store; callers insert optimistically and regenerate on
//! conflict, up to [`MAX_UNIQUE_ATTEMPTS`] times.

use chrono::NaiveDate;
use rand::Rng;

/// Characters allowed in generated tokens.
const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Number of random characters after the `P` prefix.
pub const PATIENT_ID_LEN: usize = 9;

/// Number of random characters in the appointment code suffix.
pub const APPOINTMENT_SUFFIX_LEN: usize = 5;

/// Upper bound on generate-and-insert attempts before giving up.
pub const MAX_UNIQUE_ATTEMPTS: usize = 10;

/// Random token of `len` characters drawn from `[A-Z0-9]`.
pub fn random_token<R: Rng + ?Sized>(rng: &mut R, len: usize) -> String {
    (0..len)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

/// New patient ID candidate, e.g. `P7K2Q9X1AB`.
pub fn patient_id_candidate() -> String {
    format!("P{}", random_token(&mut rand::thread_rng(), PATIENT_ID_LEN))
}

/// New appointment code candidate, e.g. `APT-20251013-4QZ8M`.
pub fn appointment_code_candidate(date: NaiveDate) -> String {
    format!(
        "APT-{}-{}",
        date.format("%Y%m%d"),
        random_token(&mut rand::thread_rng(), APPOINTMENT_SUFFIX_LEN)
    )
}

/// Check that a value has the `P` + 9 `[A-Z0-9]` patient ID shape.
pub fn is_valid_patient_id(value: &str) -> bool {
    let mut chars = value.chars();
    chars.next() == Some('P')
        && value.len() == PATIENT_ID_LEN + 1
        && chars.all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_patient_id_candidate_shape() {
        for _ in 0..100 {
            let id = patient_id_candidate();
            assert!(is_valid_patient_id(&id), "bad id: {}", id);
        }
    }

    #[test]
    fn test_appointment_code_is_date_coded() {
        let date = NaiveDate::from_ymd_opt(2025, 10, 13).unwrap();
        let code = appointment_code_candidate(date);
        assert!(code.starts_with("APT-20251013-"));
        assert_eq!(code.len(), "APT-20251013-".len() + APPOINTMENT_SUFFIX_LEN);
    }

    #[test]
    fn test_rejects_malformed_patient_ids() {
        assert!(!is_valid_patient_id(""));
        assert!(!is_valid_patient_id("P12345678"));
        assert!(!is_valid_patient_id("P1234567890"));
        assert!(!is_valid_patient_id("Q123456789"));
        assert!(!is_valid_patient_id("Pabcdefghi"));
    }

    proptest! {
        #[test]
        fn prop_random_token_uses_alphabet(seed in any::<u64>(), len in 0usize..32) {
            use rand::SeedableRng;
            let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
            let token = random_token(&mut rng, len);
            prop_assert_eq!(token.len(), len);
            prop_assert!(token.bytes().all(|b| ALPHABET.contains(&b)));
        }
    }
}

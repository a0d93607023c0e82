//! Shared format checks for contact details.

use std::sync::LazyLock;

use regex::Regex;

/// Philippine mobile number: optional `+63`, `63` or `0` prefix, then 9-11 digits.
static CONTACT_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:\+63|63|0)?[0-9]{9,11}$").expect("valid contact regex"));

/// `local@domain.tld` shape; not a full RFC 5322 check.
static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9](?:[A-Za-z0-9\-]*[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9\-]*[A-Za-z0-9])?)*\.[A-Za-z]{2,}$")
        .expect("valid email regex")
});

pub fn is_valid_contact_number(value: &str) -> bool {
    CONTACT_NUMBER.is_match(value)
}

pub fn is_valid_email(value: &str) -> bool {
    EMAIL.is_match(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contact_numbers() {
        assert!(is_valid_contact_number("09496858361"));
        assert!(is_valid_contact_number("+639496858361"));
        assert!(is_valid_contact_number("639496858361"));
        assert!(is_valid_contact_number("9496858361"));

        assert!(!is_valid_contact_number("12345"));
        assert!(!is_valid_contact_number("0949-685-8361"));
        assert!(!is_valid_contact_number("+1 555 0100"));
        assert!(!is_valid_contact_number(""));
        // Non-ASCII digits
        assert!(!is_valid_contact_number("٠٩٤٩٦٨٥٨٣٦١"));
        assert!(!is_valid_contact_number("０９４９６８５８３６１"));
    }

    #[test]
    fn test_emails() {
        assert!(is_valid_email("renz09358@gmail.com"));
        assert!(is_valid_email("first.last+lab@clinic.com.ph"));

        assert!(!is_valid_email("renz09358"));
        assert!(!is_valid_email("renz@gmail"));
        assert!(!is_valid_email("@gmail.com"));
        assert!(!is_valid_email("a b@gmail.com"));
    }
}

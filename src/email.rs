use std::sync::OnceLock;

use regex::Regex;

pub const PERSONAL_DOMAINS: [&str; 20] = [
    "gmail.com",
    "yahoo.com",
    "outlook.com",
    "hotmail.com",
    "icloud.com",
    "me.com",
    "msn.com",
    "live.com",
    "aol.com",
    "zoho.com",
    "protonmail.com",
    "proton.me",
    "yandex.com",
    "mail.com",
    "gmx.com",
    "rediffmail.com",
    "rocketmail.com",
    "tutanota.com",
    "fastmail.com",
    "hushmail.com",
];

pub fn is_personal_email(email: &str) -> bool {
    let Some(domain) = email.split('@').nth(1) else {
        return false;
    };
    let domain = domain.to_lowercase();
    PERSONAL_DOMAINS.iter().any(|d| *d == domain)
}

pub fn is_valid_email(email: &str) -> bool {
    static SHAPE: OnceLock<Regex> = OnceLock::new();
    let shape = SHAPE.get_or_init(|| {
        Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is a fixed literal")
    });
    shape.is_match(email)
}

/// Derives a display name from the local part of an address:
/// digits and symbols are dropped, `.`/`_`/`-` split words, words are
/// capitalized and joined with spaces.
pub fn extract_name_from_email(email: &str) -> String {
    let prefix = email.split('@').next().unwrap_or_default();
    let letters_only: String = prefix
        .chars()
        .filter(|c| c.is_ascii_alphabetic() || matches!(c, '.' | '_' | '-'))
        .collect();

    letters_only
        .split(['.', '_', '-'])
        .filter(|part| !part.is_empty())
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ")
}

fn capitalize(part: &str) -> String {
    let mut chars = part.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn personal_domains_match_case_insensitively() {
        assert!(is_personal_email("someone@gmail.com"));
        assert!(is_personal_email("someone@GMAIL.COM"));
        assert!(!is_personal_email("someone@acme.io"));
        assert!(!is_personal_email("not-an-email"));
    }

    #[test]
    fn shape_check_requires_local_domain_and_tld() {
        assert!(is_valid_email("john.doe@gmail.com"));
        assert!(is_valid_email("a@b.c"));
        assert!(!is_valid_email("john.doe@gmail"));
        assert!(!is_valid_email("@gmail.com"));
        assert!(!is_valid_email("john doe@gmail.com"));
        assert!(!is_valid_email(""));
    }

    #[test]
    fn name_extraction_capitalizes_separated_parts() {
        assert_eq!(extract_name_from_email("john.doe@gmail.com"), "John Doe");
        assert_eq!(extract_name_from_email("jane_ann-smith@acme.io"), "Jane Ann Smith");
        assert_eq!(extract_name_from_email("JOHN@acme.io"), "John");
    }

    #[test]
    fn name_extraction_drops_digits_and_symbols() {
        assert_eq!(extract_name_from_email("john.doe42@gmail.com"), "John Doe");
        assert_eq!(extract_name_from_email("j+filter.tag@x.y"), "Jfilter Tag");
        assert_eq!(extract_name_from_email("12345@x.y"), "");
    }
}

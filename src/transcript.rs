/// Converts one spoken utterance into a text token suitable for form input.
///
/// Speech engines render symbols as words ("john dot doe at gmail dot com")
/// and often append a closing period. The substitutions only fire on the
/// exact space-padded words, so "dashboard" or "update" are never rewritten.
/// Whitespace is stripped only when the result looks like a structured token
/// (contains `@` or `.`); plain phrases keep their spaces.
pub fn normalize(raw: &str) -> String {
    let mut text = raw.trim().to_string();
    if let Some(stripped) = text.strip_suffix('.') {
        text = stripped.to_string();
    }
    text = text.to_lowercase();
    text = text.replace(" dot ", ".");
    text = text.replace(" at ", "@");
    text = text.replace(" underscore ", "_");
    text = text.replace(" dash ", "-");
    text = text.replace(" hyphen ", "-");
    if text.contains('@') || text.contains('.') {
        text.retain(|c| !c.is_whitespace());
    }
    if let Some(stripped) = text.strip_suffix('.') {
        text = stripped.to_string();
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spoken_email_becomes_address() {
        assert_eq!(
            normalize("John dot Doe at gmail dot com."),
            "john.doe@gmail.com"
        );
    }

    #[test]
    fn plain_phrases_are_trimmed_and_lowercased_only() {
        assert_eq!(normalize("   Hello World   "), "hello world");
        assert_eq!(normalize("plain text no symbols"), "plain text no symbols");
    }

    #[test]
    fn empty_input_is_empty_output() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("   "), "");
        assert_eq!(normalize("."), "");
    }

    #[test]
    fn substitution_requires_space_padding() {
        assert_eq!(normalize("push dash up"), "push-up");
        assert_eq!(normalize("dash board"), "dash board");
        assert_eq!(normalize("update the dashboard"), "update the dashboard");
        assert_eq!(normalize("dot com"), "dot com");
    }

    #[test]
    fn underscore_and_hyphen_words_are_rewritten() {
        assert_eq!(
            normalize("jane underscore doe at proton dot me"),
            "jane_doe@proton.me"
        );
        assert_eq!(normalize("well hyphen known"), "well-known");
    }

    #[test]
    fn trailing_period_from_concatenation_is_stripped() {
        // "dot" spoken last concatenates onto the end once spaces are removed
        assert_eq!(normalize("a at b dot ."), "a@b");
    }

    #[test]
    fn normalization_is_idempotent() {
        for input in [
            "John dot Doe at gmail dot com.",
            "   Hello World   ",
            "",
            "plain text no symbols",
            "push dash up",
            "jane underscore doe at proton dot me",
        ] {
            let once = normalize(input);
            assert_eq!(normalize(&once), once);
        }
    }
}

//! Recipient address normalization.

/// Normalize a recipient into a WhatsApp JID.
///
/// Group JIDs pass through untouched. Phone numbers are stripped to digits,
/// a leading `0` is rewritten to the `62` country prefix, and the user
/// suffix is appended if missing.
pub fn format_recipient(recipient: &str) -> String {
    if recipient.ends_with("@g.us") {
        return recipient.to_string();
    }

    let mut digits: String = recipient.chars().filter(char::is_ascii_digit).collect();
    if let Some(rest) = digits.strip_prefix('0') {
        digits = format!("62{rest}");
    }
    format!("{digits}@c.us")
}

#[cfg(test)]
mod tests {
    use super::format_recipient;

    #[test]
    fn group_jid_passes_through() {
        assert_eq!(
            format_recipient("120363042@g.us"),
            "120363042@g.us".to_string()
        );
    }

    #[test]
    fn strips_formatting_characters() {
        assert_eq!(format_recipient("+62 812-3456-789"), "628123456789@c.us");
    }

    #[test]
    fn leading_zero_becomes_country_prefix() {
        assert_eq!(format_recipient("08123456789"), "628123456789@c.us");
    }

    #[test]
    fn already_suffixed_number_keeps_single_suffix() {
        assert_eq!(format_recipient("628123456789@c.us"), "628123456789@c.us");
    }
}

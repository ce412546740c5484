/// Normalizes a conversation identity to an E.164-like string: strips the
/// `whatsapp:` prefix and whitespace, ensures a leading `+`.
pub fn normalize(raw: &str) -> String {
    let cleaned: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    let cleaned = cleaned.strip_prefix("whatsapp:").unwrap_or(&cleaned);

    if cleaned.starts_with('+') {
        cleaned.to_string()
    } else {
        format!("+{cleaned}")
    }
}

/// The bare-digits form the Meta API expects as a recipient.
pub fn api_recipient(raw: &str) -> String {
    normalize(raw).trim_start_matches('+').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_prefix_and_spaces() {
        assert_eq!(normalize("whatsapp:+5511999999999"), "+5511999999999");
        assert_eq!(normalize(" 55 11 99999 9999"), "+5511999999999");
    }

    #[test]
    fn keeps_already_normalized_numbers() {
        assert_eq!(normalize("+5511999999999"), "+5511999999999");
    }

    #[test]
    fn api_recipient_has_no_plus() {
        assert_eq!(api_recipient("whatsapp:+5511999999999"), "5511999999999");
    }
}

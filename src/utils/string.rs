//! String helpers for log output
//!
//! Truncation at character boundaries and masking of secrets before they
//! reach a log line.

/// Truncate a string to at most `max_chars` characters
///
/// # Example
/// ```
/// use copilot_token_pool::utils::truncate_str;
///
/// assert_eq!(truncate_str("ghu_abcdef", 4), "ghu_");
/// assert_eq!(truncate_str("short", 100), "short");
/// ```
pub fn truncate_str(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Truncate a string and append `suffix` when something was cut off
pub fn truncate_with_suffix(s: &str, max_chars: usize, suffix: &str) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        format!("{}{}", truncate_str(s, max_chars), suffix)
    }
}

/// Mask a credential for logging, keeping only a short recognizable prefix
///
/// # Example
/// ```
/// use copilot_token_pool::utils::mask_secret;
///
/// assert_eq!(mask_secret("ghp_1234567890abcdef"), "ghp_12******");
/// assert_eq!(mask_secret("abc"), "******");
/// ```
pub fn mask_secret(secret: &str) -> String {
    const VISIBLE: usize = 6;
    if secret.chars().count() <= VISIBLE * 2 {
        return "******".to_string();
    }
    format!("{}******", truncate_str(secret, VISIBLE))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_str_ascii() {
        let text = "gho_token_value";
        assert_eq!(truncate_str(text, 3), "gho");
        assert_eq!(truncate_str(text, 100), "gho_token_value");
    }

    #[test]
    fn test_truncate_str_unicode() {
        let text = "clé_secrète";
        assert_eq!(truncate_str(text, 3), "clé");
        assert_eq!(truncate_str(text, 9), "clé_secrè");
    }

    #[test]
    fn test_truncate_with_suffix() {
        assert_eq!(truncate_with_suffix("Bad credentials", 3, "..."), "Bad...");
        assert_eq!(truncate_with_suffix("Hi", 5, "..."), "Hi");
        assert_eq!(truncate_with_suffix("", 10, "..."), "");
    }

    #[test]
    fn test_mask_secret_hides_tail() {
        let masked = mask_secret("ghu_AAAABBBBCCCCDDDD");
        assert_eq!(masked, "ghu_AA******");
        assert!(!masked.contains("DDDD"));
    }

    #[test]
    fn test_mask_secret_short_values() {
        assert_eq!(mask_secret(""), "******");
        assert_eq!(mask_secret("tok1"), "******");
    }
}

use once_cell::sync::Lazy;
use regex::Regex;

/// Credential shapes that upstream generator errors tend to echo back.
static SECRET_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r#"(?i)\b(api[_-]?key|token|secret|password)\s*[:=]\s*["']?([A-Za-z0-9_\-\.]{6,})["']?"#)
            .expect("valid regex"),
        Regex::new(r"(?i)\b(bearer)\s+[A-Za-z0-9_\-\.=]{8,}").expect("valid regex"),
        Regex::new(r"\b(sk-[A-Za-z0-9_\-]{8,})").expect("valid regex"),
    ]
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redacted {
    pub content: String,
    pub redaction_count: usize,
}

#[derive(Debug, Default, Clone)]
pub struct Redactor;

impl Redactor {
    pub fn redact(&self, input: &str) -> Redacted {
        let mut content = input.to_string();
        let mut redaction_count = 0usize;

        for pattern in SECRET_PATTERNS.iter() {
            let matches = pattern.find_iter(&content).count();
            if matches == 0 {
                continue;
            }

            redaction_count += matches;
            content = pattern
                .replace_all(&content, |caps: &regex::Captures<'_>| {
                    let key = caps
                        .get(1)
                        .map(|m| m.as_str())
                        .filter(|key| !key.starts_with("sk-"))
                        .unwrap_or("secret")
                        .to_ascii_lowercase();
                    format!("{}=[REDACTED]", key)
                })
                .to_string();
        }

        Redacted {
            content,
            redaction_count,
        }
    }
}

/// Shorthand for log fields.
pub fn redact(input: &str) -> String {
    Redactor.redact(input).content
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redacts_named_key() {
        let result = Redactor.redact("upstream said api_key=abcd1234abcd1234 is invalid");
        assert_eq!(result.content, "upstream said api_key=[REDACTED] is invalid");
        assert_eq!(result.redaction_count, 1);
    }

    #[test]
    fn redacts_bearer_and_openai_style_keys() {
        let cleaned = redact("Authorization: Bearer abcdefgh12345678 for sk-proj1234567890");
        assert!(!cleaned.contains("abcdefgh12345678"));
        assert!(!cleaned.contains("sk-proj1234567890"));
        assert!(cleaned.contains("bearer=[REDACTED]"));
        assert!(cleaned.contains("secret=[REDACTED]"));
    }

    #[test]
    fn leaves_plain_messages_alone() {
        let result = Redactor.redact("error sending request for url (https://api.openai.com/v1/chat/completions)");
        assert_eq!(result.redaction_count, 0);
        assert_eq!(redact(""), "");
    }
}

use ammonia::Builder;
use std::collections::HashSet;
use thiserror::Error;

/// Upper bound on a single raw field, in characters
pub const MAX_INPUT_CHARS: usize = 4096;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SanitizeError {
    #[error("invalid input: {reason}")]
    InvalidInput { reason: String },
}

/// Strips every tag from `input`, keeping text content, so the result can be
/// rendered verbatim. `script` and `style` bodies are dropped entirely.
///
/// Sanitizing already-sanitized text returns it unchanged.
pub fn sanitize_input(input: &str) -> Result<String, SanitizeError> {
    if input.chars().count() > MAX_INPUT_CHARS {
        return Err(SanitizeError::InvalidInput {
            reason: format!("input exceeds {} characters", MAX_INPUT_CHARS),
        });
    }
    if input
        .chars()
        .any(|c| c.is_control() && !matches!(c, '\n' | '\r' | '\t'))
    {
        return Err(SanitizeError::InvalidInput {
            reason: "input contains control characters".to_string(),
        });
    }

    let mut builder = Builder::empty();
    builder
        .clean_content_tags(HashSet::from(["script", "style"]))
        .strip_comments(true);

    Ok(builder.clean(input).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_passes_through() {
        assert_eq!(sanitize_input("Grace Okafor").unwrap(), "Grace Okafor");
        assert_eq!(
            sanitize_input("grace@example.com").unwrap(),
            "grace@example.com"
        );
    }

    #[test]
    fn markup_is_stripped_but_text_kept() {
        assert_eq!(sanitize_input("<b>Tithe</b> for May").unwrap(), "Tithe for May");
        assert_eq!(
            sanitize_input("hello<script>alert(1)</script>").unwrap(),
            "hello"
        );
        assert_eq!(sanitize_input("<!-- note -->thanks").unwrap(), "thanks");
    }

    #[test]
    fn sanitizing_twice_is_a_no_op() {
        let samples = [
            "Tom & Jerry",
            "1 < 2 > 0",
            "<i>italic</i> & <u>under</u>",
            "O'Brien \"quoted\"",
            "&lt;b&gt;already escaped&lt;/b&gt;",
            "<img src=x onerror=alert(1)>caption",
        ];
        for sample in samples {
            let once = sanitize_input(sample).unwrap();
            let twice = sanitize_input(&once).unwrap();
            assert_eq!(once, twice, "not idempotent for {:?}", sample);
        }
    }

    #[test]
    fn malformed_input_is_reported_generically() {
        assert!(matches!(
            sanitize_input("bad\0byte"),
            Err(SanitizeError::InvalidInput { .. })
        ));
        let oversized = "a".repeat(MAX_INPUT_CHARS + 1);
        assert!(sanitize_input(&oversized).is_err());
    }
}

//! Deterministic request fingerprints used as cache and in-flight keys.

use sha2::{Digest, Sha256};

use crate::translation::models::TranslationRequest;

/// Length-prefixes every field so `("ab", "c")` and `("a", "bc")` never collide.
fn digest(kind: &str, fields: &[&str]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(kind.as_bytes());
    for field in fields {
        hasher.update((field.len() as u64).to_le_bytes());
        hasher.update(field.as_bytes());
    }
    hex::encode(hasher.finalize())
}

fn html_flag(is_html: bool) -> &'static str {
    if is_html {
        "html"
    } else {
        "text"
    }
}

/// Key for a whole translation: (source, target, html, model, domain, raw text).
pub fn translation_key(request: &TranslationRequest) -> String {
    digest(
        "translation",
        &[
            &request.source_lang,
            &request.target_lang,
            html_flag(request.is_html),
            &request.model,
            request.domain.as_deref().unwrap_or(""),
            &request.raw_text,
        ],
    )
}

/// Key for one masked chunk: (source, target, html, model, chunk text).
///
/// `domain` is left out, so identical chunks from requests with different
/// domains share one remote call, and the prompt carries the domain hint of
/// whichever request started it. The hint only steers terminology; the
/// whole-request key still separates domains in the result cache.
pub fn chunk_key(request: &TranslationRequest, chunk_text: &str) -> String {
    digest(
        "chunk",
        &[
            &request.source_lang,
            &request.target_lang,
            html_flag(request.is_html),
            &request.model,
            chunk_text,
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn request(text: &str, target: &str, domain: Option<&str>) -> TranslationRequest {
        TranslationRequest {
            raw_text: text.to_string(),
            source_lang: "en".to_string(),
            target_lang: target.to_string(),
            is_html: false,
            temperature: 0.2,
            model: "m".to_string(),
            max_chars: 1000,
            chunk_chars: 100,
            ttl: Duration::from_secs(60),
            domain: domain.map(str::to_string),
        }
    }

    #[test]
    fn test_same_fields_same_key() {
        let a = translation_key(&request("hello", "ru", None));
        let b = translation_key(&request("hello", "ru", None));
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_each_field_changes_key() {
        let base = translation_key(&request("hello", "ru", None));
        assert_ne!(base, translation_key(&request("hello!", "ru", None)));
        assert_ne!(base, translation_key(&request("hello", "de", None)));
        assert_ne!(base, translation_key(&request("hello", "ru", Some("resume"))));

        let mut html = request("hello", "ru", None);
        html.is_html = true;
        assert_ne!(base, translation_key(&html));
    }

    #[test]
    fn test_field_boundaries_do_not_collide() {
        let mut a = request("x", "ru", None);
        a.model = "ab".to_string();
        a.raw_text = "c".to_string();
        let mut b = request("x", "ru", None);
        b.model = "a".to_string();
        b.raw_text = "bc".to_string();
        assert_ne!(translation_key(&a), translation_key(&b));
    }

    #[test]
    fn test_chunk_key_ignores_domain_and_differs_from_translation_key() {
        let plain = request("hello", "ru", None);
        let with_domain = request("hello", "ru", Some("resume"));
        assert_eq!(chunk_key(&plain, "hello"), chunk_key(&with_domain, "hello"));
        assert_ne!(chunk_key(&plain, "hello"), translation_key(&plain));
    }
}

use crate::llm_client::prompts::{JSON_ONLY_SYSTEM, PRESERVE_TOKENS_INSTRUCTION};

pub const TRANSLATE_SYSTEM_TEMPLATE: &str = "\
    You are a professional translator working on job-search documents. \
    Translate faithfully and naturally, keep names of companies, products and \
    technologies as they are, and keep the original formatting (line breaks, \
    bullet markers, markdown) intact.\n\
    {preserve}\n\
    {json_only}\n\
    Respond with exactly this shape: {\"translation\": \"<translated text>\"}";

pub const TRANSLATE_PROMPT_TEMPLATE: &str = "\
    Translate the following {format} from {source} into {target}.{domain}\n\
    \n\
    {text}";

pub fn translation_system() -> String {
    TRANSLATE_SYSTEM_TEMPLATE
        .replace("{preserve}", PRESERVE_TOKENS_INSTRUCTION)
        .replace("{json_only}", JSON_ONLY_SYSTEM)
}

pub fn translation_prompt(
    text: &str,
    source_lang: &str,
    target_lang: &str,
    is_html: bool,
    domain: Option<&str>,
) -> String {
    let source = if source_lang == "auto" {
        "the detected source language"
    } else {
        source_lang
    };
    let format = if is_html {
        "HTML fragment (translate only text nodes, never tags or attributes)"
    } else {
        "text"
    };
    let domain = domain
        .map(|d| format!(" The text belongs to a {d}; use its usual terminology."))
        .unwrap_or_default();

    // `text` is substituted last so its contents are never re-templated.
    TRANSLATE_PROMPT_TEMPLATE
        .replace("{format}", format)
        .replace("{source}", source)
        .replace("{target}", target_lang)
        .replace("{domain}", &domain)
        .replace("{text}", text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_prompt_embeds_shared_fragments() {
        let system = translation_system();
        assert!(system.contains("⟦M0⟧"));
        assert!(system.contains("valid JSON only"));
        assert!(!system.contains("{preserve}"));
    }

    #[test]
    fn test_prompt_mentions_languages_and_domain() {
        let prompt = translation_prompt("Hello", "en", "ru", false, Some("resume"));
        assert!(prompt.contains("from en into ru"));
        assert!(prompt.contains("resume"));
        assert!(prompt.ends_with("Hello"));
    }

    #[test]
    fn test_prompt_auto_source_and_html() {
        let prompt = translation_prompt("<p>Hi</p>", "auto", "de", true, None);
        assert!(prompt.contains("detected source language"));
        assert!(prompt.contains("HTML fragment"));
    }

    #[test]
    fn test_text_with_template_markers_is_left_alone() {
        let prompt = translation_prompt("{target} {source}", "en", "ru", false, None);
        assert!(prompt.ends_with("{target} {source}"));
    }
}

//! Masking: swaps untranslatable spans for opaque tokens before text reaches
//! the model, and puts them back afterwards.
//!
//! The stages run as an ordered pipeline; each one sees the output of the
//! previous one, so a URL inside a code fence is already hidden by the time
//! the URL stage runs.

use std::collections::{HashMap, HashSet};
use std::ops::Range;
use std::sync::LazyLock;

use regex::{Captures, Regex};

static CODE_FENCE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)```.*?```").expect("code fence regex"));

static INLINE_CODE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"`[^`\n]+`").expect("inline code regex"));

static URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)\b(?:https?://|www\.)[^\s<>"'`]+"#).expect("url regex"));

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9-]+(?:\.[A-Za-z0-9-]+)*\.[A-Za-z]{2,}\b")
        .expect("email regex")
});

// Alternation order matters: `{{name}}` must win over `{name}`.
static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"\{\{[^{}\n]*\}\}",                       // {{name}}
        r"|\{\d+\}",                               // {0}
        r"|\{[A-Za-z_][A-Za-z0-9_.]*\}",           // {name}
        r"|%(?:\d+\$)?[-+#0]?\d*(?:\.\d+)?[sdifuxX]", // %s %1$d %.2f
        r"|\$\d+",                                 // $1
        r"|\B:[A-Za-z_][A-Za-z0-9_]*",             // :name
    ))
    .expect("placeholder regex")
});

static HTML_ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\b(?:href|src)\s*=\s*(?:"([^"]*)"|'([^']*)')"#)
        .expect("html attribute regex")
});

// A salted prefix already present in the input, e.g. `⟦M3_`.
static SALTED_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"⟦M(\d+)_").expect("salted prefix regex"));

const TOKEN_PREFIX: &str = "⟦M";

static OPEN_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<([A-Za-z][A-Za-z0-9-]*)(?:\s[^<>]*)?>").expect("open tag regex"));

static CLOSE_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"</([a-z][a-z0-9-]*)>").expect("close tag regex"));

/// One masked span: the token that replaced it and the text it stood for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Restore {
    pub token: String,
    pub original: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaskedText {
    pub text: String,
    /// In insertion order; `unmask` walks it backwards.
    pub restores: Vec<Restore>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaskStage {
    CodeFence,
    InlineCode,
    Url,
    Email,
    Placeholder,
    HtmlAttribute,
}

impl MaskStage {
    /// Fixed execution order of the masking pipeline.
    pub const PIPELINE: [MaskStage; 6] = [
        MaskStage::CodeFence,
        MaskStage::InlineCode,
        MaskStage::Url,
        MaskStage::Email,
        MaskStage::Placeholder,
        MaskStage::HtmlAttribute,
    ];

    fn pattern(self) -> &'static Regex {
        match self {
            MaskStage::CodeFence => &CODE_FENCE,
            MaskStage::InlineCode => &INLINE_CODE,
            MaskStage::Url => &URL,
            MaskStage::Email => &EMAIL,
            MaskStage::Placeholder => &PLACEHOLDER,
            MaskStage::HtmlAttribute => &HTML_ATTRIBUTE,
        }
    }

    fn enabled(self, is_html: bool) -> bool {
        self != MaskStage::HtmlAttribute || is_html
    }

    /// Byte range of the match to hide, or `None` to leave the match alone.
    fn protected_span(self, caps: &Captures, restores: &[Restore]) -> Option<Range<usize>> {
        match self {
            MaskStage::Url => {
                let m = caps.get(0)?;
                // Sentence punctuation after a URL belongs to the prose.
                let kept = m
                    .as_str()
                    .trim_end_matches(['.', ',', ';', ':', '!', '?', ')', ']', '\'', '"']);
                (!kept.is_empty()).then(|| m.start()..m.start() + kept.len())
            }
            MaskStage::HtmlAttribute => {
                let value = caps.get(1).or_else(|| caps.get(2))?;
                let raw = value.as_str().trim();
                // Values already hidden by the URL stage are left as they are.
                let masked = restores.iter().any(|r| r.token == raw);
                (!raw.is_empty() && !masked).then(|| value.range())
            }
            _ => caps.get(0).map(|m| m.range()),
        }
    }

    /// Runs this stage alone, appending new restores after the existing ones.
    /// Tokens are `{prefix}{n}⟧`; see `token_prefix`.
    pub fn apply(self, text: &str, prefix: &str, restores: &mut Vec<Restore>) -> String {
        let mut out = String::with_capacity(text.len());
        let mut last = 0;

        for caps in self.pattern().captures_iter(text) {
            let Some(span) = self.protected_span(&caps, restores) else {
                continue;
            };
            let token = format!("{prefix}{}⟧", restores.len());
            out.push_str(&text[last..span.start]);
            out.push_str(&token);
            restores.push(Restore {
                token,
                original: text[span.clone()].to_string(),
            });
            last = span.end;
        }

        out.push_str(&text[last..]);
        out
    }
}

/// Picks a token prefix no text in `input` can be mistaken for.
///
/// Plain `⟦M` when the input never contains it; otherwise `⟦M{salt}_` with
/// the smallest salt whose prefix is absent, so `unmask` only ever replaces
/// tokens it inserted.
pub fn token_prefix(input: &str) -> String {
    if !input.contains(TOKEN_PREFIX) {
        return TOKEN_PREFIX.to_string();
    }

    let taken: HashSet<u64> = SALTED_PREFIX
        .captures_iter(input)
        .filter_map(|caps| caps.get(1)?.as_str().parse().ok())
        .collect();
    let mut salt = 1;
    while taken.contains(&salt) {
        salt += 1;
    }
    format!("{TOKEN_PREFIX}{salt}_")
}

/// True when the text opens a tag that it later closes, e.g. `<b>..</b>`.
pub fn looks_like_html(text: &str) -> bool {
    let lowered = text.to_ascii_lowercase();

    let mut last_close: HashMap<&str, usize> = HashMap::new();
    for caps in CLOSE_TAG.captures_iter(&lowered) {
        if let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) {
            last_close.insert(name.as_str(), whole.start());
        }
    }

    OPEN_TAG.captures_iter(&lowered).any(|caps| {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            return false;
        };
        last_close
            .get(name.as_str())
            .is_some_and(|&close| close >= whole.end())
    })
}

/// Resolves an optional caller flag, falling back to tag detection.
pub fn resolve_html(flag: Option<bool>, text: &str) -> bool {
    flag.unwrap_or_else(|| looks_like_html(text))
}

pub fn mask(text: &str, is_html: bool) -> MaskedText {
    let prefix = token_prefix(text);
    let mut restores = Vec::new();
    let text = MaskStage::PIPELINE
        .iter()
        .filter(|stage| stage.enabled(is_html))
        .fold(text.to_string(), |acc, stage| {
            stage.apply(&acc, &prefix, &mut restores)
        });

    MaskedText { text, restores }
}

/// Replaces every occurrence of each token, newest first, so spans that were
/// masked on top of earlier tokens unfold in the right order.
pub fn unmask(text: &str, restores: &[Restore]) -> String {
    restores
        .iter()
        .rev()
        .fold(text.to_string(), |acc, r| acc.replace(&r.token, &r.original))
}

//! Prompt sanitizer.
//!
//! Every prompt sent to a provider passes through [`sanitize`]:
//!
//! ```text
//! raw ──► strip invisible / control chars ──► redact deny-list ──► truncate ──► clean
//! ```
//!
//! Redactions become `[REDACTED]`; text over [`MAX_PROMPT_CHARS`] is cut and
//! ends with `[TRUNCATED]`. Neither marker matches a deny-list pattern and the
//! output never exceeds the ceiling, so `sanitize(sanitize(x)) == sanitize(x)`.

use regex::Regex;

/// Character ceiling for any prompt handed to a provider.
pub const MAX_PROMPT_CHARS: usize = 50_000;

pub const REDACTION_MARKER: &str = "[REDACTED]";
pub const TRUNCATION_MARKER: &str = "[TRUNCATED]";

/// Upper bound on redact/truncate rounds in [`sanitize`].
const MAX_PASSES: usize = 8;

/// Placeholder every template must reference.
pub const TRANSCRIPT_PLACEHOLDER: &str = "{transcript}";

lazy_static::lazy_static! {
    static ref DENY_LIST: Vec<Regex> = [
        // instruction overrides
        r"(?i)\bignore\s+(?:all\s+)?(?:the\s+)?(?:previous\s+|prior\s+|above\s+)?instructions\b",
        r"(?i)\bdisregard\s+(?:all\s+|your\s+|the\s+)?(?:previous\s+|prior\s+|above\s+)?instructions\b",
        r"(?i)\bforget\s+(?:all\s+|your\s+|the\s+)?(?:previous\s+|prior\s+)?instructions\b",
        r"(?i)\bnew\s+instructions\s*:",
        // markup injection
        r"(?is)<\s*script\b[^>]*>.*?<\s*/\s*script\s*>",
        r"(?i)<\s*/?\s*(?:script|iframe)\b[^>]*>",
        r"(?i)\bjavascript\s*:",
        r"(?i)\bon(?:load|error|click|mouseover|focus|blur|submit)\s*=",
        // code execution
        r"(?i)\b(?:eval|exec)\s*\(",
        // chat role markers
        r"(?im)^[ \t]*(?:system|assistant)[ \t]*:",
        r"(?i)<\|im_(?:start|end)\|>",
        r"(?i)<<\s*/?\s*sys\s*>>",
        r"(?i)\[\s*/?\s*inst\s*\]",
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect();
}

/// Clean `text` for use in a prompt. Never fails.
///
/// Redaction and truncation repeat until the text stops changing: a cut can
/// expose a new word boundary after a deny-list phrase, and a redaction can
/// push the text back over the ceiling.
pub fn sanitize(text: &str) -> String {
    let mut current = remove_invisible_chars(text);
    let mut total = 0;
    for _ in 0..MAX_PASSES {
        let (redacted, hits) = redact(&current);
        total += hits;
        let next = truncate(redacted);
        if next == current {
            break;
        }
        current = next;
    }
    if total > 0 {
        tracing::warn!(redactions = total, "[Sanitizer] Redacted suspicious prompt content");
    }
    current
}

/// Whether `template` is acceptable as a step prompt template.
pub fn validate_template(template: &str) -> bool {
    check_template(template).is_ok()
}

/// Like [`validate_template`] but reports the reason.
pub fn check_template(template: &str) -> Result<(), String> {
    if !template.contains(TRANSCRIPT_PLACEHOLDER) {
        return Err(format!("missing required {} placeholder", TRANSCRIPT_PLACEHOLDER));
    }
    if let Some(m) = DENY_LIST.iter().find_map(|re| re.find(template)) {
        return Err(format!("contains disallowed pattern '{}'", m.as_str()));
    }
    Ok(())
}

/// Whether `text` contains anything the sanitizer would redact.
pub fn contains_dangerous_pattern(text: &str) -> bool {
    DENY_LIST.iter().any(|re| re.is_match(text))
}

fn remove_invisible_chars(text: &str) -> String {
    text.chars()
        .filter(|c| {
            if matches!(*c, ' ' | '\n' | '\t' | '\r') {
                return true;
            }
            if matches!(
                *c,
                '\u{200B}'..='\u{200F}' | '\u{202A}'..='\u{202E}' | '\u{2060}'..='\u{2064}'
                    | '\u{2066}'..='\u{2069}' | '\u{FEFF}'
            ) {
                return false;
            }
            !c.is_control()
        })
        .collect()
}

fn redact(text: &str) -> (String, usize) {
    let mut out = text.to_string();
    let mut hits = 0;
    for re in DENY_LIST.iter() {
        let found = re.find_iter(&out).count();
        if found > 0 {
            hits += found;
            out = re.replace_all(&out, REDACTION_MARKER).into_owned();
        }
    }
    (out, hits)
}

fn truncate(text: String) -> String {
    if text.chars().count() <= MAX_PROMPT_CHARS {
        return text;
    }
    let keep = MAX_PROMPT_CHARS - TRUNCATION_MARKER.chars().count();
    let mut cut: String = text.chars().take(keep).collect();
    tracing::warn!(limit = MAX_PROMPT_CHARS, "[Sanitizer] Prompt truncated");
    cut.push_str(TRUNCATION_MARKER);
    cut
}

//! Recovery parsing for LLM-produced JSON.
//!
//! Agent replies frequently arrive wrapped in markdown fences or peppered
//! with typographic punctuation that breaks strict JSON parsing. The
//! helpers here normalize those artifacts before handing the text to
//! `serde_json`, and report position-annotated context when parsing still
//! fails.

use serde_json::Value as JsonValue;
use thiserror::Error;

const SNIPPET_RADIUS: usize = 50;

#[derive(Debug, Error)]
#[error("failed to parse JSON{context}: {message}")]
pub struct JsonParseError {
    context: String,
    message: String,
    /// Position-annotated excerpt of the offending text, when available.
    pub snippet: Option<String>,
}

/// Outcome of [`try_parse`]: either the parsed value or the failure
/// details alongside the raw text that produced them.
#[derive(Debug)]
pub enum ParseOutcome {
    Parsed(JsonValue),
    Failed { error: JsonParseError, raw: String },
}

fn strip_markdown_code_fences(text: &str) -> &str {
    let mut cleaned = text.trim();

    if let Some(rest) = cleaned.strip_prefix("```json") {
        cleaned = rest;
    } else if let Some(rest) = cleaned.strip_prefix("```") {
        cleaned = rest;
    }
    if let Some(rest) = cleaned.strip_suffix("```") {
        cleaned = rest;
    }

    cleaned.trim()
}

fn is_curly_quote(c: char) -> bool {
    matches!(c, '\u{201C}' | '\u{201D}')
}

fn is_opening_boundary(c: char) -> bool {
    c.is_whitespace() || matches!(c, '{' | '[' | ',' | ':')
}

/// Normalize curly quotes ONLY where they act as JSON delimiters: adjacent
/// to structural characters. Curly quotes inside already-quoted content are
/// left untouched, since replacing them globally corrupts valid strings.
fn normalize_curly_quote_delimiters(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());

    for (i, &c) in chars.iter().enumerate() {
        if !is_curly_quote(c) {
            out.push(c);
            continue;
        }

        let opens = (i == 0 || is_opening_boundary(chars[i - 1]))
            && chars.get(i + 1).is_some_and(|next| !next.is_whitespace());
        let closes = chars[i + 1..]
            .iter()
            .find(|next| !next.is_whitespace())
            .map(|next| matches!(next, ':' | ',' | '}' | ']'))
            .unwrap_or(true);

        if opens || closes {
            out.push('"');
        } else {
            out.push(c);
        }
    }

    out
}

/// Replace problematic characters commonly emitted by LLMs with plain
/// JSON-safe equivalents and strip any surrounding markdown fence.
pub fn sanitize(text: &str) -> String {
    let cleaned = strip_markdown_code_fences(text);

    let mut out = String::with_capacity(cleaned.len());
    for c in cleaned.chars() {
        match c {
            // En dash and em dash
            '\u{2013}' | '\u{2014}' => out.push('-'),
            // Horizontal ellipsis
            '\u{2026}' => out.push_str("..."),
            // Non-breaking space
            '\u{00A0}' => out.push(' '),
            // Zero-width characters and BOM
            '\u{200B}'..='\u{200D}' | '\u{FEFF}' => {}
            other => out.push(other),
        }
    }

    out
}

fn annotate(text: &str, err: &serde_json::Error) -> Option<String> {
    let position = byte_position(text, err.line(), err.column())?;
    let start = position.saturating_sub(SNIPPET_RADIUS);
    let end = (position + SNIPPET_RADIUS).min(text.len());
    let excerpt: String = text
        .get(start..end)
        .map(str::to_owned)
        .unwrap_or_else(|| text.chars().skip(start).take(end - start).collect());
    let marker = " ".repeat(position.saturating_sub(start).min(SNIPPET_RADIUS));
    Some(format!("{excerpt}\n{marker}^"))
}

fn byte_position(text: &str, line: usize, column: usize) -> Option<usize> {
    if line == 0 {
        return None;
    }
    let mut offset = 0;
    for (index, content) in text.split('\n').enumerate() {
        if index + 1 == line {
            return Some(offset + column.saturating_sub(1).min(content.len()));
        }
        offset += content.len() + 1;
    }
    None
}

/// Parse `text` after sanitization, retrying once with conservative
/// curly-quote normalization before giving up.
pub fn parse(text: &str, context: Option<&str>) -> Result<JsonValue, JsonParseError> {
    let cleaned = sanitize(text);

    match serde_json::from_str(&cleaned) {
        Ok(value) => Ok(value),
        Err(_) => {
            let normalized = normalize_curly_quote_delimiters(&cleaned);
            serde_json::from_str(&normalized).map_err(|err| JsonParseError {
                context: context.map(|c| format!(" ({c})")).unwrap_or_default(),
                message: err.to_string(),
                snippet: annotate(&normalized, &err),
            })
        }
    }
}

/// Parse with multiple strategies, returning a result object instead of an
/// error so callers can surface the raw text to the client.
pub fn try_parse(text: &str, context: Option<&str>) -> ParseOutcome {
    match parse(text, context) {
        Ok(value) => ParseOutcome::Parsed(value),
        Err(error) => ParseOutcome::Failed {
            error,
            raw: text.to_owned(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_json() {
        let value = parse(r#"{"a": 1}"#, None).unwrap();
        assert_eq!(value["a"], 1);
    }

    #[test]
    fn strips_json_fences() {
        let value = parse("```json\n{\"rules\": []}\n```", None).unwrap();
        assert!(value["rules"].as_array().unwrap().is_empty());
    }

    #[test]
    fn strips_bare_fences() {
        let value = parse("```\n[1, 2]\n```", None).unwrap();
        assert_eq!(value.as_array().unwrap().len(), 2);
    }

    #[test]
    fn normalizes_unicode_punctuation() {
        let value = parse("{\"delta\": \"a \u{2014} b\u{2026}\u{00A0}c\"}", None).unwrap();
        assert_eq!(value["delta"], "a - b... c");
    }

    #[test]
    fn strips_bom_and_zero_width() {
        let value = parse("\u{FEFF}{\"a\": \"b\u{200B}c\"}", None).unwrap();
        assert_eq!(value["a"], "bc");
    }

    #[test]
    fn recovers_curly_quote_delimiters() {
        let text = "{\u{201C}constraint\u{201D}: \u{201C}Sector\u{201D}}";
        let value = parse(text, None).unwrap();
        assert_eq!(value["constraint"], "Sector");
    }

    #[test]
    fn keeps_curly_quotes_inside_valid_strings() {
        let text = "{\"note\": \"she said \u{201C}hold\u{201D} twice\"}";
        let value = parse(text, None).unwrap();
        assert_eq!(value["note"], "she said \u{201C}hold\u{201D} twice");
    }

    #[test]
    fn reports_context_and_snippet() {
        let err = parse("{\"a\": nope}", Some("extractor reply")).unwrap_err();
        assert!(err.to_string().contains("extractor reply"));
        assert!(err.snippet.is_some());
    }

    #[test]
    fn try_parse_keeps_raw_text() {
        match try_parse("not json at all", None) {
            ParseOutcome::Failed { raw, .. } => assert_eq!(raw, "not json at all"),
            ParseOutcome::Parsed(_) => panic!("expected failure"),
        }
    }
}

//! Deterministic text transforms applied to model output.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::Value;

use crate::templates::Parameters;

pub const HIGH_COMPLEXITY_SUFFIX: &str =
    " The scene is highly complex, with many layered elements, intricate detail and multiple simultaneous actions.";
pub const MEDIUM_COMPLEXITY_SUFFIX: &str =
    " The scene has moderate complexity, with several distinct elements and some secondary motion.";

/// `intensityLevels` parameter: how hard the action and emotion are pushed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intensity {
    Low,
    Medium,
    High,
    Extreme,
}

impl Intensity {
    pub const NAMES: &'static [&'static str] = &["low", "medium", "high", "extreme"];

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            "extreme" => Some(Self::Extreme),
            _ => None,
        }
    }

    pub fn clause(&self) -> &'static str {
        match self {
            Self::Low => " Keep the action calm and understated, with gentle motion.",
            Self::Medium => " Keep the action lively, with a steady and engaging energy.",
            Self::High => " Make the action intense and dynamic, with strong motion and emotion.",
            Self::Extreme => {
                " Push the action to the extreme: explosive motion, maximum energy and dramatic emotion."
            }
        }
    }
}

/// Read a JSON number or numeric string.
pub fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub fn complexity_suffix(parameters: &Parameters) -> Option<&'static str> {
    let level = parameters.get("sceneComplexity").and_then(numeric)?;
    if level > 7.0 {
        Some(HIGH_COMPLEXITY_SUFFIX)
    } else if level > 5.0 {
        Some(MEDIUM_COMPLEXITY_SUFFIX)
    } else {
        None
    }
}

pub fn intensity_suffix(parameters: &Parameters) -> Option<&'static str> {
    parameters
        .get("intensityLevels")
        .and_then(Value::as_str)
        .and_then(Intensity::parse)
        .map(|i| i.clause())
}

/// Append the complexity clause, then the intensity clause.
pub fn apply_suffixes(mut text: String, parameters: &Parameters) -> String {
    if let Some(suffix) = complexity_suffix(parameters) {
        text.push_str(suffix);
    }
    if let Some(suffix) = intensity_suffix(parameters) {
        text.push_str(suffix);
    }
    text
}

pub fn encode_base64(text: &str) -> String {
    STANDARD.encode(text.as_bytes())
}

/// Names the client asked to keep verbatim during redaction, from the
/// comma-separated `nameExceptions` parameter.
pub fn name_exceptions(parameters: &Parameters) -> Vec<String> {
    parameters
        .get("nameExceptions")
        .and_then(Value::as_str)
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Normalize a negative prompt into one comma-separated line.
pub fn clean_negative(raw: &str) -> String {
    let mut seen: Vec<String> = Vec::new();
    let mut terms: Vec<String> = Vec::new();

    for piece in raw.split(['\n', ',']) {
        let term = strip_list_marker(piece.trim())
            .trim_matches(|c: char| c == '"' || c == '\'' || c == '`' || c == '.')
            .trim();
        if term.is_empty() {
            continue;
        }
        let folded = term.to_lowercase();
        if seen.contains(&folded) {
            continue;
        }
        seen.push(folded);
        terms.push(term.to_string());
    }

    terms.join(", ")
}

fn strip_list_marker(s: &str) -> &str {
    let s = s.trim_start_matches(['-', '*', '•']).trim_start();
    let digits = s.bytes().take_while(u8::is_ascii_digit).count();
    if digits > 0 {
        let rest = &s[digits..];
        if let Some(after) = rest.strip_prefix('.').or_else(|| rest.strip_prefix(')')) {
            return after.trim_start();
        }
    }
    s
}

/// Strip a Markdown code fence around model output, if present, so the
/// remainder can be parsed as JSON.
pub fn extract_json_block(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Skip the info string ("json") on the fence line.
    let body = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(v: Value) -> Parameters {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn complexity_thresholds() {
        assert_eq!(
            complexity_suffix(&params(json!({"sceneComplexity": 8}))),
            Some(HIGH_COMPLEXITY_SUFFIX)
        );
        assert_eq!(
            complexity_suffix(&params(json!({"sceneComplexity": "6"}))),
            Some(MEDIUM_COMPLEXITY_SUFFIX)
        );
        assert_eq!(complexity_suffix(&params(json!({"sceneComplexity": 5}))), None);
        assert_eq!(complexity_suffix(&params(json!({}))), None);
    }

    #[test]
    fn suffix_order_is_complexity_then_intensity() {
        let out = apply_suffixes(
            "base.".to_string(),
            &params(json!({"sceneComplexity": 9, "intensityLevels": "High"})),
        );
        let expected = format!("base.{HIGH_COMPLEXITY_SUFFIX}{}", Intensity::High.clause());
        assert_eq!(out, expected);
    }

    #[test]
    fn exceptions_split_and_trimmed() {
        let p = params(json!({"nameExceptions": " Paris, ,Eiffel Tower "}));
        assert_eq!(name_exceptions(&p), vec!["Paris", "Eiffel Tower"]);
        assert!(name_exceptions(&Parameters::new()).is_empty());
    }

    #[test]
    fn clean_negative_normalizes_list() {
        let raw = "1. blurry\n2) Watermark\n- \"text\", BLURRY\n* low quality.";
        assert_eq!(clean_negative(raw), "blurry, Watermark, text, low quality");
    }

    #[test]
    fn json_fence_stripped() {
        assert_eq!(extract_json_block("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(extract_json_block("  {\"a\": 1} "), "{\"a\": 1}");
        assert_eq!(extract_json_block("```\n{}\n```\n"), "{}");
    }
}

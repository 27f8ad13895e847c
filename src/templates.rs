//! Instruction templates sent to the upstream model.
//!
//! Every builder here is a pure function: same inputs, byte-identical output.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Open string-to-scalar map supplied by the client.
pub type Parameters = Map<String, Value>;

/// Parameter keys that steer the server rather than describe the video.
pub const CONTROL_KEYS: &[&str] = &["generationModel", "nameExceptions"];

/// Which instruction template governs prompt generation.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Mode {
    AutoPilot,
    Improve,
    SuperImprove,
}

impl Mode {
    pub const NAMES: &'static [&'static str] = &["auto-pilot", "improve", "super-improve"];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AutoPilot => "auto-pilot",
            Self::Improve => "improve",
            Self::SuperImprove => "super-improve",
        }
    }
}

/// Post-processing policy applied after generation.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum OperatingMode {
    /// Raw model output, untouched.
    #[default]
    General,
    NoNames,
    Base64,
}

impl OperatingMode {
    pub const NAMES: &'static [&'static str] = &["general", "no-names", "base64"];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::General => "general",
            Self::NoNames => "no-names",
            Self::Base64 => "base64",
        }
    }
}

/// Flavor of idea requested from `/api/generate-ideas`.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum IdeaKind {
    Subject,
    Style,
    Quality,
}

impl IdeaKind {
    pub const NAMES: &'static [&'static str] = &["subject", "style", "quality"];
}

/// Keys of the object returned by `/api/generate-custom-preset`.
pub const PRESET_KEYS: [&str; 10] = [
    "style",
    "camera",
    "lighting",
    "cinematography",
    "mood",
    "effect",
    "background",
    "audio",
    "details",
    "negative",
];

/// Example payload shown to the model so it answers in the right shape.
pub const EXAMPLE_PRESET: &str = r#"{
  "style": "cinematic photorealism",
  "camera": "slow dolly-in on a 35mm lens",
  "lighting": "golden hour backlight with soft fill",
  "cinematography": "shallow depth of field, anamorphic flares",
  "mood": "melancholic and hopeful",
  "effect": "light film grain",
  "background": "misty pine forest at dawn",
  "audio": "distant birdsong over a low cello drone",
  "details": "dew on spider webs, breath visible in cold air",
  "negative": "blurry, distorted faces, watermark, text"
}"#;

const EXAMPLE_ANIME: &str =
    r#"{"studio": "Studio Ghibli", "style": "hand-drawn watercolor backgrounds", "artist": "Hayao Miyazaki"}"#;

/// Does this parameter value carry information? Mirrors the client's notion of
/// "filled in": null, false, empty string and zero are skipped.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn parameter_lines(parameters: &Parameters) -> String {
    let mut lines = String::new();
    for (key, value) in parameters {
        if CONTROL_KEYS.contains(&key.as_str()) || !is_truthy(value) {
            continue;
        }
        lines.push_str(&format!("- {key}: {}\n", display_value(value)));
    }
    lines
}

/// Build the prompt-generation instruction for `mode`.
pub fn prompt_instruction(idea: &str, parameters: &Parameters, mode: Mode) -> String {
    match mode {
        Mode::AutoPilot => format!(
            "You are an expert prompt engineer for video generation AI. \
             Take the user's idea and independently decide every creative detail: \
             visual style, camera work, lighting, mood, setting and sound. \
             Write one vivid, self-contained prompt in English, as a single paragraph, \
             with no preamble or explanation.\n\nIdea: \"{idea}\""
        ),
        Mode::Improve => {
            let mut out = format!(
                "Generate a detailed prompt for a video generation AI. The user's idea is: \"{idea}\"."
            );
            let lines = parameter_lines(parameters);
            if !lines.is_empty() {
                out.push_str(" The following parameters are provided:\n");
                out.push_str(&lines);
            }
            out.push_str(
                "\nRespect every parameter, keep the idea recognizable, and answer with the prompt only.",
            );
            out
        }
        Mode::SuperImprove => {
            let mut out = prompt_instruction(idea, parameters, Mode::Improve);
            out.push_str(
                "\n\nGo further than a plain description:\n\
                 - specify camera movement, lens and framing for each beat\n\
                 - describe light sources, color temperature and shadows\n\
                 - describe textures and materials of key surfaces\n\
                 - give the pacing of the shot from first to last second\n\
                 - suggest ambient sound and music\n\
                 Keep it to one dense paragraph.",
            );
            out
        }
    }
}

pub fn tags_instruction(idea: &str, prompt: &str) -> String {
    format!(
        "Generate a list of 15-20 relevant hashtags for a short video. \
         The original idea is: \"{idea}\". The final video prompt is: \"{prompt}\". \
         Return only the hashtags separated by spaces, each starting with #."
    )
}

pub fn problems_instruction(idea: &str, prompt: &str) -> String {
    format!(
        "You are reviewing a prompt for a video generation AI before it is rendered. \
         The original idea is: \"{idea}\". The prompt is: \"{prompt}\". \
         List the problems the generator is likely to have with this prompt \
         (anatomy, physics, text rendering, temporal consistency, ambiguous wording) \
         and for each one suggest a concrete fix. Answer as a short bulleted list."
    )
}

pub fn negative_instruction(prompt: &str) -> String {
    format!(
        "Write a negative prompt for a video generation AI: a comma-separated list of \
         visual defects and unwanted elements to avoid when rendering the following prompt. \
         Return only the list.\n\nPrompt: \"{prompt}\""
    )
}

pub fn translate_instruction(text: &str) -> String {
    format!("Translate the following text to English: \"{text}\"")
}

pub fn idea_instruction(kind: Option<IdeaKind>) -> String {
    match kind {
        None => "Generate a creative and interesting idea for a video.".to_string(),
        Some(IdeaKind::Subject) => "Suggest one original, visually striking subject for a short \
             video: who or what is on screen and what happens. One sentence, no preamble."
            .to_string(),
        Some(IdeaKind::Style) => "Suggest one distinctive visual style for a short video \
             (art direction, color palette, era or medium). One sentence, no preamble."
            .to_string(),
        Some(IdeaKind::Quality) => "Suggest a short list of quality modifiers for a video \
             generation prompt (resolution, detail, rendering terms), comma-separated, no preamble."
            .to_string(),
    }
}

pub fn custom_preset_instruction(idea: &str) -> String {
    format!(
        "Create a complete visual preset for a video generation AI based on this idea: \"{idea}\".\n\
         Respond with a single JSON object and nothing else. It must have exactly these keys: {}.\n\
         Every value is a short English phrase. Example:\n{EXAMPLE_PRESET}",
        PRESET_KEYS.join(", ")
    )
}

pub fn anime_instruction(title: &str) -> String {
    format!(
        "For the anime titled \"{title}\", identify the animation studio, describe its visual \
         style in a few words, and name the key artist or director. \
         Respond with a single JSON object with keys studio, style and artist, and nothing else. \
         Example:\n{EXAMPLE_ANIME}"
    )
}

/// Second-stage instruction for `no-names`: paraphrase proper nouns away.
pub fn redaction_instruction(text: &str, exceptions: &[String]) -> String {
    let mut out = String::from(
        "Rewrite the following prompt to avoid using any specific names of people, brands, \
         or characters. Instead, use descriptive language. For example, instead of \
         \"Harry Potter\", you could say \"a young wizard with a lightning scar\".",
    );
    if !exceptions.is_empty() {
        out.push_str(&format!(
            " Keep these names exactly as written: {}.",
            exceptions.join(", ")
        ));
    }
    out.push_str(" Return only the rewritten prompt.");
    out.push_str(&format!("\n\nOriginal prompt: \"{text}\""));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(v: Value) -> Parameters {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn truthiness_matches_client() {
        assert!(!is_truthy(&json!(null)));
        assert!(!is_truthy(&json!(false)));
        assert!(!is_truthy(&json!("")));
        assert!(!is_truthy(&json!(0)));
        assert!(is_truthy(&json!("0")));
        assert!(is_truthy(&json!(2.5)));
    }

    #[test]
    fn improve_lists_truthy_parameters_only() {
        let p = params(json!({
            "style": "noir",
            "fps": 24,
            "camera": "",
            "loop": false,
            "generationModel": "gemini-x"
        }));
        let out = prompt_instruction("a cat", &p, Mode::Improve);
        assert!(out.contains("- style: noir\n"));
        assert!(out.contains("- fps: 24\n"));
        assert!(!out.contains("camera"));
        assert!(!out.contains("loop"));
        assert!(!out.contains("gemini-x"));
    }

    #[test]
    fn improve_without_parameters_has_no_header() {
        let out = prompt_instruction("a cat", &Parameters::new(), Mode::Improve);
        assert!(!out.contains("parameters are provided"));
    }

    #[test]
    fn super_improve_extends_improve() {
        let p = params(json!({"style": "noir"}));
        let improve = prompt_instruction("a cat", &p, Mode::Improve);
        let sup = prompt_instruction("a cat", &p, Mode::SuperImprove);
        assert!(sup.starts_with(&improve));
        assert!(sup.len() > improve.len());
    }

    #[test]
    fn mode_names_match_serde() {
        for name in Mode::NAMES {
            let mode: Mode = serde_json::from_value(json!(name)).unwrap();
            assert_eq!(mode.as_str(), *name);
        }
        for name in OperatingMode::NAMES {
            let mode: OperatingMode = serde_json::from_value(json!(name)).unwrap();
            assert_eq!(mode.as_str(), *name);
        }
    }

    #[test]
    fn example_preset_has_every_key() {
        let v: Value = serde_json::from_str(EXAMPLE_PRESET).unwrap();
        let obj = v.as_object().unwrap();
        assert_eq!(obj.len(), PRESET_KEYS.len());
        for key in PRESET_KEYS {
            assert!(obj.contains_key(key), "missing {key}");
        }
    }

    #[test]
    fn redaction_carries_exceptions() {
        let out = redaction_instruction("text", &["Paris".to_string(), "Eiffel Tower".to_string()]);
        assert!(out.contains("Keep these names exactly as written: Paris, Eiffel Tower."));
        assert!(out.ends_with("Original prompt: \"text\""));

        let out = redaction_instruction("text", &[]);
        assert!(!out.contains("Keep these names"));
    }
}

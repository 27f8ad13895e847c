use serde::{Deserialize, Serialize};

use crate::error::ForgeError;
use crate::postprocess::extract_json_block;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedPrompt {
    pub generated_prompt: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedTags {
    pub generated_tags: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictedProblems {
    pub predicted_problems: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedNegative {
    pub generated_negative: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslatedText {
    pub translated_text: String,
}

#[derive(Debug, Serialize)]
pub struct GeneratedIdea {
    pub idea: String,
}

/// Ten-field visual preset. Keys the model leaves out come back empty;
/// keys it invents are dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CustomPreset {
    pub style: String,
    pub camera: String,
    pub lighting: String,
    pub cinematography: String,
    pub mood: String,
    pub effect: String,
    pub background: String,
    pub audio: String,
    pub details: String,
    pub negative: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimeFill {
    pub studio: String,
    pub style: String,
    pub artist: String,
}

/// Parse a JSON object out of raw model text, tolerating a Markdown fence.
pub fn parse_model_json<T: for<'de> Deserialize<'de>>(raw: &str) -> Result<T, ForgeError> {
    serde_json::from_str(extract_json_block(raw))
        .map_err(|e| ForgeError::SchemaParse(format!("model did not return the expected JSON: {e}")))
}

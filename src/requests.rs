//! Typed request bodies. Shape checks happen in [`crate::validate`] first;
//! these only deserialize bodies that already passed.

use serde::Deserialize;
use serde_json::Value;

use crate::templates::{IdeaKind, Mode, OperatingMode, Parameters};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    pub idea: String,
    pub parameters: Parameters,
    pub mode: Mode,
    #[serde(default)]
    pub operating_mode: Option<OperatingMode>,
}

impl GenerationRequest {
    /// Absent means `general`.
    pub fn operating_mode(&self) -> OperatingMode {
        self.operating_mode.unwrap_or_default()
    }
}

/// Body of `/api/generate-tags` and `/api/predict-problems`.
#[derive(Debug, Clone, Deserialize)]
pub struct TagRequest {
    pub idea: String,
    pub prompt: String,
}

pub type ProblemRequest = TagRequest;

#[derive(Debug, Clone, Deserialize)]
pub struct NegativeRequest {
    pub prompt: String,
    /// `null` and absent both mean "leave the model output as is".
    #[serde(default)]
    pub clean: Option<bool>,
}

impl NegativeRequest {
    pub fn clean(&self) -> bool {
        self.clean.unwrap_or(false)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TranslateRequest {
    pub text: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct IdeaRequest {
    #[serde(rename = "type", default)]
    pub kind: Option<IdeaKind>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PresetRequest {
    pub idea: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnimeRequest {
    pub title: String,
}

/// Upstream model the caller asked for: `generationModel`, then
/// `parameters.generationModel`, then `modelName`. Blank values are skipped.
pub fn requested_model(body: &Value) -> Option<&str> {
    [
        body.get("generationModel"),
        body.get("parameters").and_then(|p| p.get("generationModel")),
        body.get("modelName"),
    ]
    .into_iter()
    .flatten()
    .filter_map(Value::as_str)
    .map(str::trim)
    .find(|m| !m.is_empty())
}

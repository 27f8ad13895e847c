//! Shape checks for incoming JSON bodies.
//!
//! Each endpoint owns a [`Schema`]: an ordered list of field rules. Rules are
//! checked in order and the first violation wins, so error messages always
//! name exactly one field. Unknown keys are ignored everywhere.

use serde_json::{Map, Value};

use crate::dispatch::is_valid_model_name;
use crate::error::ForgeError;
use crate::postprocess::Intensity;
use crate::templates::{IdeaKind, Mode, OperatingMode};

#[derive(Debug, Clone, Copy)]
pub enum FieldKind {
    /// Non-empty (after trimming) string.
    Text,
    /// Upstream model override. Blank means "use the default"; anything else
    /// must be a plain model identifier.
    ModelName,
    /// Boolean.
    Flag,
    /// String drawn from a fixed set.
    OneOf(&'static [&'static str]),
    /// Open string-to-scalar map of generation parameters.
    Parameters,
}

#[derive(Debug, Clone, Copy)]
pub struct FieldRule {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
}

const fn required(name: &'static str, kind: FieldKind) -> FieldRule {
    FieldRule {
        name,
        kind,
        required: true,
    }
}

const fn optional(name: &'static str, kind: FieldKind) -> FieldRule {
    FieldRule {
        name,
        kind,
        required: false,
    }
}

pub type Schema = &'static [FieldRule];

const MODEL_OVERRIDES: [FieldRule; 2] = [
    optional("generationModel", FieldKind::ModelName),
    optional("modelName", FieldKind::ModelName),
];

pub const GENERATE_PROMPT: Schema = &[
    required("idea", FieldKind::Text),
    required("parameters", FieldKind::Parameters),
    required("mode", FieldKind::OneOf(Mode::NAMES)),
    optional("operatingMode", FieldKind::OneOf(OperatingMode::NAMES)),
    MODEL_OVERRIDES[0],
    MODEL_OVERRIDES[1],
];

pub const GENERATE_TAGS: Schema = &[
    required("idea", FieldKind::Text),
    required("prompt", FieldKind::Text),
    MODEL_OVERRIDES[0],
    MODEL_OVERRIDES[1],
];

pub const PREDICT_PROBLEMS: Schema = GENERATE_TAGS;

pub const NEGATIVE_PROMPT: Schema = &[
    required("prompt", FieldKind::Text),
    optional("clean", FieldKind::Flag),
    MODEL_OVERRIDES[0],
    MODEL_OVERRIDES[1],
];

pub const TRANSLATE: Schema = &[
    required("text", FieldKind::Text),
    MODEL_OVERRIDES[0],
    MODEL_OVERRIDES[1],
];

pub const GENERATE_IDEAS: Schema = &[
    optional("type", FieldKind::OneOf(IdeaKind::NAMES)),
    MODEL_OVERRIDES[0],
    MODEL_OVERRIDES[1],
];

pub const CUSTOM_PRESET: Schema = &[
    required("idea", FieldKind::Text),
    MODEL_OVERRIDES[0],
    MODEL_OVERRIDES[1],
];

pub const ANIME_AUTO_FILL: Schema = &[
    required("title", FieldKind::Text),
    MODEL_OVERRIDES[0],
    MODEL_OVERRIDES[1],
];

/// First schema violation found in a request body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl From<ValidationError> for ForgeError {
    fn from(e: ValidationError) -> Self {
        ForgeError::Validation {
            field: e.field,
            message: e.message,
        }
    }
}

/// Check `body` against `schema`, logging the violated constraint on failure.
pub fn validate(body: &Value, schema: Schema) -> Result<(), ValidationError> {
    let result = check(body, schema);
    if let Err(ref e) = result {
        tracing::warn!(field = %e.field, constraint = %e.message, "request validation failed");
    }
    result
}

fn check(body: &Value, schema: Schema) -> Result<(), ValidationError> {
    let obj = body
        .as_object()
        .ok_or_else(|| ValidationError::new("body", "request body must be a JSON object"))?;

    for rule in schema {
        match obj.get(rule.name) {
            None | Some(Value::Null) => {
                if rule.required {
                    return Err(ValidationError::new(
                        rule.name,
                        format!("{} is required", rule.name),
                    ));
                }
            }
            Some(value) => check_kind(rule.name, rule.kind, value)?,
        }
    }
    Ok(())
}

fn check_kind(name: &str, kind: FieldKind, value: &Value) -> Result<(), ValidationError> {
    match kind {
        FieldKind::Text => match value.as_str() {
            Some(s) if !s.trim().is_empty() => Ok(()),
            _ => Err(ValidationError::new(
                name,
                format!("{name} must be a non-empty string"),
            )),
        },
        FieldKind::ModelName => match value {
            Value::String(s) if s.trim().is_empty() || is_valid_model_name(s.trim()) => Ok(()),
            Value::String(_) => Err(ValidationError::new(
                name,
                format!("{name} must be a model identifier (letters, digits, '.', '_', '-')"),
            )),
            _ => Err(ValidationError::new(name, format!("{name} must be a string"))),
        },
        FieldKind::Flag => match value {
            Value::Bool(_) => Ok(()),
            _ => Err(ValidationError::new(name, format!("{name} must be a boolean"))),
        },
        FieldKind::OneOf(allowed) => match value.as_str() {
            Some(s) if allowed.contains(&s) => Ok(()),
            _ => Err(ValidationError::new(
                name,
                format!("{name} must be one of: {}", allowed.join(", ")),
            )),
        },
        FieldKind::Parameters => match value {
            Value::Object(map) => check_parameters(name, map),
            _ => Err(ValidationError::new(
                name,
                format!("{name} must be an object"),
            )),
        },
    }
}

fn check_parameters(name: &str, params: &Map<String, Value>) -> Result<(), ValidationError> {
    for (key, value) in params {
        if value.is_array() || value.is_object() {
            return Err(ValidationError::new(
                format!("{name}.{key}"),
                format!("{name}.{key} must be a scalar"),
            ));
        }
    }

    if let Some(value) = params.get("generationModel") {
        check_kind(&format!("{name}.generationModel"), FieldKind::ModelName, value)?;
    }

    if let Some(value) = params.get("sceneComplexity")
        && !is_blank(value)
        && crate::postprocess::numeric(value).is_none()
    {
        return Err(ValidationError::new(
            format!("{name}.sceneComplexity"),
            format!("{name}.sceneComplexity must be a number"),
        ));
    }

    if let Some(value) = params.get("intensityLevels")
        && !is_blank(value)
    {
        let known = value.as_str().is_some_and(|s| Intensity::parse(s).is_some());
        if !known {
            return Err(ValidationError::new(
                format!("{name}.intensityLevels"),
                format!(
                    "{name}.intensityLevels must be one of: {}",
                    Intensity::NAMES.join(", ")
                ),
            ));
        }
    }

    Ok(())
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

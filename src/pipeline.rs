//! Prompt generation as an explicit two-stage pipeline.
//!
//! Stage one ([`PromptPipeline::draft`]) renders the mode template and makes
//! the first model call. Stage two ([`PromptPipeline::finish`]) applies the
//! operating mode, which for `no-names` is a second model call fed with the
//! draft text. A failure in stage two discards the draft.

use std::sync::Arc;

use crate::dispatch::{ModelRequest, TextModel};
use crate::error::ForgeError;
use crate::postprocess;
use crate::requests::GenerationRequest;
use crate::templates::{self, OperatingMode};

/// Output of stage one, before any operating-mode transform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Draft {
    pub text: String,
    pub model: String,
}

pub struct PromptPipeline {
    model: Arc<dyn TextModel>,
}

impl PromptPipeline {
    pub fn new(model: Arc<dyn TextModel>) -> Self {
        Self { model }
    }

    pub async fn draft(&self, req: &GenerationRequest, model: &str) -> Result<Draft, ForgeError> {
        let instruction = templates::prompt_instruction(&req.idea, &req.parameters, req.mode);
        tracing::debug!(mode = req.mode.as_str(), model, "generating draft prompt");
        let result = self
            .model
            .generate(&ModelRequest::new(instruction, model))
            .await?;
        Ok(Draft {
            text: result.text,
            model: result.model,
        })
    }

    pub async fn finish(&self, draft: Draft, req: &GenerationRequest) -> Result<String, ForgeError> {
        let operating_mode = req.operating_mode();
        let text = match operating_mode {
            OperatingMode::General | OperatingMode::Base64 => draft.text,
            OperatingMode::NoNames => {
                let exceptions = postprocess::name_exceptions(&req.parameters);
                let instruction = templates::redaction_instruction(&draft.text, &exceptions);
                tracing::debug!(exceptions = exceptions.len(), "redacting names");
                self.model
                    .generate(&ModelRequest::new(instruction, draft.model))
                    .await?
                    .text
            }
        };

        let text = postprocess::apply_suffixes(text, &req.parameters);

        Ok(match operating_mode {
            OperatingMode::Base64 => postprocess::encode_base64(&text),
            _ => text,
        })
    }

    pub async fn run(&self, req: &GenerationRequest, model: &str) -> Result<String, ForgeError> {
        let draft = self.draft(req, model).await?;
        self.finish(draft, req).await
    }
}

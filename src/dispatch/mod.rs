pub mod http;

use async_trait::async_trait;

use crate::error::ForgeError;

/// Upstream model names become a URL path segment, so only plain identifiers
/// are accepted: an ASCII alphanumeric first, then alphanumerics, `.`, `_`, `-`.
pub fn is_valid_model_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphanumeric())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}

/// One instruction in, one text out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelRequest {
    pub instruction: String,
    /// Upstream model identifier (e.g. "gemini-2.0-flash").
    pub model: String,
}

impl ModelRequest {
    pub fn new(instruction: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            instruction: instruction.into(),
            model: model.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ModelResult {
    pub text: String,
    pub model: String,
    pub latency_ms: u64,
}

/// The upstream text-generation service. Stateless: every call is independent.
///
/// Handlers hold an `Arc<dyn TextModel>` so tests can swap in a stub.
#[async_trait]
pub trait TextModel: Send + Sync {
    async fn generate(&self, req: &ModelRequest) -> Result<ModelResult, ForgeError>;
}

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use ideaforge::dispatch::{ModelRequest, ModelResult, TextModel};
use ideaforge::error::ForgeError;

type Reply = dyn Fn(&ModelRequest) -> Result<String, ForgeError> + Send + Sync;

/// Stub upstream that records every request and answers via a closure.
pub struct StubModel {
    reply: Box<Reply>,
    calls: Mutex<Vec<ModelRequest>>,
}

impl StubModel {
    pub fn new(
        reply: impl Fn(&ModelRequest) -> Result<String, ForgeError> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            reply: Box::new(reply),
            calls: Mutex::new(Vec::new()),
        })
    }

    /// Always answers with the same text.
    pub fn fixed(text: &str) -> Arc<Self> {
        let text = text.to_string();
        Self::new(move |_| Ok(text.clone()))
    }

    /// Always fails as an upstream outage would.
    pub fn failing() -> Arc<Self> {
        Self::new(|_| {
            Err(ForgeError::Upstream {
                provider: "gemini".to_string(),
                message: "503: secret upstream detail".to_string(),
                status: Some(503),
            })
        })
    }

    pub fn calls(&self) -> Vec<ModelRequest> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextModel for StubModel {
    async fn generate(&self, req: &ModelRequest) -> Result<ModelResult, ForgeError> {
        self.calls.lock().unwrap().push(req.clone());
        let text = (self.reply)(req)?;
        Ok(ModelResult {
            text,
            model: req.model.clone(),
            latency_ms: 0,
        })
    }
}

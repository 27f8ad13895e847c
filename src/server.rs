use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Bytes;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderValue, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::net::TcpListener;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::dispatch::http::GeminiDispatch;
use crate::dispatch::{ModelRequest, TextModel};
use crate::error::{ForgeError, ForgeResult};
use crate::pipeline::PromptPipeline;
use crate::postprocess;
use crate::rate_limit::{Decision, KeyedQuota, QuotaLimiter};
use crate::requests::{
    self, AnimeRequest, GenerationRequest, IdeaRequest, NegativeRequest, PresetRequest,
    ProblemRequest, TagRequest, TranslateRequest,
};
use crate::response::{
    self, AnimeFill, CustomPreset, GeneratedIdea, GeneratedNegative, GeneratedPrompt,
    GeneratedTags, PredictedProblems, TranslatedText,
};
use crate::templates;
use crate::validate::{self, Schema};

/// How often idle quota entries are dropped.
const QUOTA_PRUNE_INTERVAL: Duration = Duration::from_secs(60);

/// Process-wide collaborators, built once at startup and handed to every handler.
#[derive(Clone)]
pub struct AppState {
    model: Arc<dyn TextModel>,
    quota: Arc<dyn QuotaLimiter>,
    pipeline: Arc<PromptPipeline>,
    default_model: Arc<str>,
}

impl AppState {
    pub fn new(
        model: Arc<dyn TextModel>,
        quota: Arc<dyn QuotaLimiter>,
        default_model: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            pipeline: Arc::new(PromptPipeline::new(model.clone())),
            model,
            quota,
            default_model: default_model.into(),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, ForgeError> {
        let model = GeminiDispatch::new(config.base_url.clone(), config.api_key.clone())?;
        let quota = KeyedQuota::new(config.quota)?;
        Ok(Self::new(
            Arc::new(model),
            Arc::new(quota),
            config.default_model.clone(),
        ))
    }

    pub fn quota(&self) -> Arc<dyn QuotaLimiter> {
        self.quota.clone()
    }

    fn model_for(&self, body: &Value) -> String {
        requests::requested_model(body)
            .unwrap_or(&*self.default_model)
            .to_string()
    }

    /// Single model call: one instruction in, one text out.
    async fn complete(&self, instruction: String, model: String) -> ForgeResult<String> {
        let result = self
            .model
            .generate(&ModelRequest::new(instruction, model))
            .await?;
        Ok(result.text)
    }
}

pub fn router(state: AppState, static_dir: &Path) -> Router {
    let api = Router::new()
        .route("/api/generate-prompt", post(generate_prompt))
        .route("/api/generate-tags", post(generate_tags))
        .route("/api/predict-problems", post(predict_problems))
        .route("/api/generate-negative-prompt", post(generate_negative_prompt))
        .route("/api/translate", post(translate))
        .route("/api/generate-ideas", post(generate_ideas))
        .route("/api/generate-custom-preset", post(generate_custom_preset))
        .route("/api/anime-auto-fill", post(anime_auto_fill))
        .route_layer(middleware::from_fn_with_state(state.clone(), enforce_quota));

    api.fallback_service(ServeDir::new(static_dir))
        .with_state(state)
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("SAMEORIGIN"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::REFERRER_POLICY,
            HeaderValue::from_static("no-referrer"),
        ))
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Bind, serve until Ctrl-C, and keep the quota table trimmed meanwhile.
pub async fn start(config: Config) -> anyhow::Result<()> {
    let state = AppState::from_config(&config)?;
    let pruner = spawn_quota_pruner(state.quota());
    let app = router(state, &config.static_dir);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("server is running on http://localhost:{}", config.port);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    pruner.abort();
    Ok(())
}

fn spawn_quota_pruner(quota: Arc<dyn QuotaLimiter>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(QUOTA_PRUNE_INTERVAL);
        loop {
            ticker.tick().await;
            quota.prune();
        }
    })
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to install Ctrl+C handler: {e}");
    }
    tracing::info!("shutting down");
}

/// Quota key for a request: the peer IP, or "unknown" when the connection
/// info was not recorded.
fn client_key(req: &Request) -> String {
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

async fn enforce_quota(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let key = client_key(&req);
    match state.quota.consume(&key) {
        Decision::Allow => next.run(req).await,
        Decision::Deny => ForgeError::QuotaExceeded { key }.into_response(),
    }
}

/// Parse, validate, then deserialize a body. An empty body reads as `{}`.
fn decode<T: DeserializeOwned>(body: &Bytes, schema: Schema) -> ForgeResult<(T, Value)> {
    let raw: Value = if body.iter().all(u8::is_ascii_whitespace) {
        Value::Object(Default::default())
    } else {
        serde_json::from_slice(body).map_err(|e| {
            tracing::warn!(error = %e, "request body is not valid JSON");
            ForgeError::Validation {
                field: "body".to_string(),
                message: "request body must be valid JSON".to_string(),
            }
        })?
    };

    validate::validate(&raw, schema)?;

    let typed = serde_json::from_value(raw.clone()).map_err(|e| {
        tracing::warn!(error = %e, "validated body did not deserialize");
        ForgeError::Validation {
            field: "body".to_string(),
            message: "request body has an unexpected shape".to_string(),
        }
    })?;
    Ok((typed, raw))
}

async fn generate_prompt(
    State(state): State<AppState>,
    body: Bytes,
) -> ForgeResult<Json<GeneratedPrompt>> {
    let (req, raw): (GenerationRequest, _) = decode(&body, validate::GENERATE_PROMPT)?;
    let model = state.model_for(&raw);
    let start = Instant::now();

    let generated_prompt = state.pipeline.run(&req, &model).await?;

    tracing::info!(
        mode = req.mode.as_str(),
        operating_mode = req.operating_mode().as_str(),
        model = %model,
        duration_ms = start.elapsed().as_millis() as u64,
        "prompt generated"
    );
    Ok(Json(GeneratedPrompt { generated_prompt }))
}

async fn generate_tags(
    State(state): State<AppState>,
    body: Bytes,
) -> ForgeResult<Json<GeneratedTags>> {
    let (req, raw): (TagRequest, _) = decode(&body, validate::GENERATE_TAGS)?;
    let generated_tags = state
        .complete(
            templates::tags_instruction(&req.idea, &req.prompt),
            state.model_for(&raw),
        )
        .await?;
    Ok(Json(GeneratedTags { generated_tags }))
}

async fn predict_problems(
    State(state): State<AppState>,
    body: Bytes,
) -> ForgeResult<Json<PredictedProblems>> {
    let (req, raw): (ProblemRequest, _) = decode(&body, validate::PREDICT_PROBLEMS)?;
    let predicted_problems = state
        .complete(
            templates::problems_instruction(&req.idea, &req.prompt),
            state.model_for(&raw),
        )
        .await?;
    Ok(Json(PredictedProblems { predicted_problems }))
}

async fn generate_negative_prompt(
    State(state): State<AppState>,
    body: Bytes,
) -> ForgeResult<Json<GeneratedNegative>> {
    let (req, raw): (NegativeRequest, _) = decode(&body, validate::NEGATIVE_PROMPT)?;
    let text = state
        .complete(templates::negative_instruction(&req.prompt), state.model_for(&raw))
        .await?;
    let generated_negative = if req.clean() {
        postprocess::clean_negative(&text)
    } else {
        text
    };
    Ok(Json(GeneratedNegative { generated_negative }))
}

async fn translate(
    State(state): State<AppState>,
    body: Bytes,
) -> ForgeResult<Json<TranslatedText>> {
    let (req, raw): (TranslateRequest, _) = decode(&body, validate::TRANSLATE)?;
    let translated_text = state
        .complete(templates::translate_instruction(&req.text), state.model_for(&raw))
        .await?;
    Ok(Json(TranslatedText { translated_text }))
}

async fn generate_ideas(
    State(state): State<AppState>,
    body: Bytes,
) -> ForgeResult<Json<GeneratedIdea>> {
    let (req, raw): (IdeaRequest, _) = decode(&body, validate::GENERATE_IDEAS)?;
    let idea = state
        .complete(templates::idea_instruction(req.kind), state.model_for(&raw))
        .await?;
    Ok(Json(GeneratedIdea { idea }))
}

async fn generate_custom_preset(
    State(state): State<AppState>,
    body: Bytes,
) -> ForgeResult<Json<CustomPreset>> {
    let (req, raw): (PresetRequest, _) = decode(&body, validate::CUSTOM_PRESET)?;
    let text = state
        .complete(
            templates::custom_preset_instruction(&req.idea),
            state.model_for(&raw),
        )
        .await?;
    Ok(Json(response::parse_model_json(&text)?))
}

async fn anime_auto_fill(
    State(state): State<AppState>,
    body: Bytes,
) -> ForgeResult<Json<AnimeFill>> {
    let (req, raw): (AnimeRequest, _) = decode(&body, validate::ANIME_AUTO_FILL)?;
    let text = state
        .complete(templates::anime_instruction(&req.title), state.model_for(&raw))
        .await?;
    Ok(Json(response::parse_model_json(&text)?))
}

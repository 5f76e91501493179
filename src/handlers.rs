use axum::body::Bytes;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::charset;
use crate::error::AppError;
use crate::extract::{PinnedForm, StandardForm};
use crate::form::FormData;
use crate::state::AppState;

/// JSON payload accepted by `/euc-kr/json`; missing fields take defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Message {
    pub name: String,
    pub message: String,
}

impl Default for Message {
    fn default() -> Self {
        Self {
            name: "unknown".to_string(),
            message: "none".to_string(),
        }
    }
}

pub async fn health_get() -> &'static str {
    "ok"
}

pub async fn read_text(State(state): State<AppState>, body: Bytes) -> Result<Json<Value>, AppError> {
    let text = charset::decode(&body, state.charset)?;
    tracing::info!(%text, "decoded text");
    Ok(Json(json!({ "text": text })))
}

pub async fn read_json(State(state): State<AppState>, body: Bytes) -> Result<Json<Message>, AppError> {
    let text = charset::decode(&body, state.charset)?;
    let message: Message = serde_json::from_str(&text)?;
    tracing::info!(?message, "decoded json");
    Ok(Json(message))
}

pub async fn read_pinned_form(PinnedForm(form): PinnedForm) -> Json<FormData> {
    tracing::info!(%form, "decoded form data");
    Json(FormData::clone(&form))
}

pub async fn read_standard_form(StandardForm(form): StandardForm) -> Json<FormData> {
    tracing::info!(%form, "decoded form data");
    Json(FormData::clone(&form))
}

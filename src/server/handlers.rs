/// HTTP handlers for Sigfox callbacks and reading queries
use axum::async_trait;
use axum::extract::{FromRequest, Query, Request, State};
use axum::http::header::CONTENT_TYPE;
use axum::{Form, Json};
use log::{debug, info, warn};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::models::{InboundRecord, NewReading, StoredReading};
use crate::payload::{classify, decode};
use crate::server::error::{AppError, AppResult};
use crate::server::AppState;
use crate::utils::format_datetime;

/// Callback body, accepted as JSON or as a urlencoded form
pub struct Callback(pub InboundRecord);

#[async_trait]
impl<S> FromRequest<S> for Callback
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let mime = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        match mime.as_str() {
            "application/json" => {
                let Json(record) = Json::<InboundRecord>::from_request(req, state)
                    .await
                    .map_err(|e| AppError::BadRequest(e.body_text()))?;
                Ok(Callback(record))
            }
            "application/x-www-form-urlencoded" => {
                let Form(record) = Form::<InboundRecord>::from_request(req, state)
                    .await
                    .map_err(|e| AppError::BadRequest(e.body_text()))?;
                Ok(Callback(record))
            }
            _ => Err(AppError::UnsupportedMediaType(content_type)),
        }
    }
}

/// POST /callback
///
/// Decodes the payload, classifies it and appends the result to the store.
/// Replies `OK` once the reading is stored.
pub async fn receive_callback(
    State(state): State<AppState>,
    Callback(record): Callback,
) -> AppResult<&'static str> {
    let device = record.id.clone().unwrap_or_else(|| "unknown".to_string());
    let decoded = decode(record.data.as_deref().unwrap_or_default());

    if decoded.is_empty() {
        warn!("Payload from {} carried no decodable fields", device);
    } else if !decoded.is_complete() {
        debug!("Payload from {} has no location, using fallback", device);
    }

    let alerts = classify(&decoded, &state.thresholds);
    for alert in &alerts {
        warn!("Alert {} for device {}: {:?}", alert, device, decoded);
    }

    let stored = state
        .store
        .append(NewReading::new(record, decoded, alerts))
        .await
        .map_err(AppError::Storage)?;

    info!(
        "Callback from {} received and stored as #{} at {}",
        device,
        stored.id,
        format_datetime(&stored.received_at)
    );
    Ok("OK")
}

#[derive(Debug, Deserialize)]
pub struct RecentParams {
    pub limit: Option<usize>,
}

/// GET /api/readings?limit=N
///
/// Latest readings, newest first. `limit` falls back to the configured
/// default and is capped at the configured maximum.
pub async fn recent_readings(
    State(state): State<AppState>,
    Query(params): Query<RecentParams>,
) -> AppResult<Json<Vec<StoredReading>>> {
    let limit = params
        .limit
        .unwrap_or(state.query.default_limit)
        .min(state.query.max_limit);

    let readings = state.store.recent(limit).await.map_err(AppError::Storage)?;
    Ok(Json(readings))
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "store": state.store.kind(),
    }))
}

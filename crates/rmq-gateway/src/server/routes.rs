//! HTTP handlers

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use super::state::{AppState, SERVICE_NAME};
use crate::broker::MAX_FETCH;
use crate::error::{GatewayError, Result};
use crate::status::TlsStatusReport;

const DEFAULT_QUEUE: &str = "default_queue";

/// Body of `POST /publish`
#[derive(Debug, Default, Deserialize)]
pub struct PublishRequest {
    /// Target queue
    #[serde(default)]
    pub queue: Option<String>,
    /// Message body, any JSON value
    #[serde(default)]
    pub message: Option<Value>,
}

/// `?count=N` of the peek and consume routes
#[derive(Debug, Default, Deserialize)]
pub struct CountQuery {
    /// Number of messages, 1 to 100
    pub count: Option<usize>,
}

impl CountQuery {
    fn resolve(&self) -> Result<usize> {
        match self.count {
            None => Ok(1),
            Some(n) if (1..=MAX_FETCH).contains(&n) => Ok(n),
            Some(n) => Err(GatewayError::BadRequest(format!(
                "count must be between 1 and {}, got {}",
                MAX_FETCH, n
            ))),
        }
    }
}

/// `GET /`
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": SERVICE_NAME,
        "rmq_connected": state.broker.is_connected().await,
    }))
}

/// `POST /publish`
pub async fn publish(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Value>> {
    let request: PublishRequest = if body.iter().all(u8::is_ascii_whitespace) {
        PublishRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| GatewayError::BadRequest(format!("invalid JSON body: {}", e)))?
    };
    let queue = request
        .queue
        .filter(|q| !q.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_QUEUE.to_string());
    let message = request.message.unwrap_or_else(|| json!({}));

    state.broker.publish(&queue, &message).await?;

    Ok(Json(json!({
        "status": "success",
        "message": "Message published successfully",
        "queue": queue,
    })))
}

/// `GET /queue/{name}/info`
pub async fn queue_info(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Value>> {
    let info = state.broker.queue_info(&name).await?;
    Ok(Json(json!({
        "status": "success",
        "queue_info": info,
    })))
}

/// `GET /queue/{name}/peek`
pub async fn peek(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<CountQuery>,
) -> Result<Json<Value>> {
    let count = query.resolve()?;
    let messages = state.broker.peek(&name, count).await?;
    Ok(Json(json!({
        "status": "success",
        "queue": name,
        "count": messages.len(),
        "messages": messages,
    })))
}

/// `POST /queue/{name}/consume`
pub async fn consume(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<CountQuery>,
) -> Result<Json<Value>> {
    let count = query.resolve()?;
    let messages = state.broker.consume(&name, count).await?;
    Ok(Json(json!({
        "status": "success",
        "queue": name,
        "count": messages.len(),
        "messages": messages,
    })))
}

/// `GET /services`
pub async fn services(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "success",
        "services": state.services.summaries(),
    }))
}

/// `GET /tls-config`
pub async fn tls_config(State(state): State<AppState>) -> Json<Value> {
    let materialized = state.broker.cert_paths().await;
    let report = TlsStatusReport::new(&state.settings, materialized.as_ref());
    Json(json!({
        "status": "success",
        "tls_config": report,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_bounds() {
        assert_eq!(CountQuery { count: None }.resolve().unwrap(), 1);
        assert_eq!(CountQuery { count: Some(100) }.resolve().unwrap(), 100);
        assert!(CountQuery { count: Some(0) }.resolve().is_err());
        assert!(CountQuery { count: Some(101) }.resolve().is_err());
    }
}

//! Ingestion of the platform's database webhooks into the realtime transport.

use axum::{
    Json,
    extract::{FromRef, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::Value;

use crate::{AppState, realtime::MemoryTransport, transaction::TransactionRecord};

/// The header carrying the shared webhook secret.
pub const WEBHOOK_SECRET_HEADER: &str = "x-webhook-secret";

/// The body of a database webhook.
#[derive(Debug, Deserialize)]
pub struct WebhookPayload {
    /// "INSERT", "UPDATE" or "DELETE".
    #[serde(rename = "type")]
    pub kind: String,
    /// The schema of the changed table.
    pub schema: String,
    /// The changed table.
    pub table: String,
    /// The row after the change.
    #[serde(default)]
    pub record: Option<Value>,
    /// The row before the change.
    #[serde(default)]
    pub old_record: Option<Value>,
}

/// The state needed for receiving webhooks.
#[derive(Debug, Clone)]
pub struct WebhookState {
    /// Where inserted transactions are published.
    pub transport: MemoryTransport,
    /// The secret the platform sends with every webhook.
    pub secret: String,
}

impl FromRef<AppState> for WebhookState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            transport: state.transport.clone(),
            secret: state.webhook_secret.clone(),
        }
    }
}

/// Publish an inserted transaction to the open realtime channels.
///
/// Responds 401 if the secret header does not match, 204 for changes other
/// than inserts and 202 once an insert has been published.
pub async fn receive_transaction_webhook(
    State(state): State<WebhookState>,
    headers: HeaderMap,
    Json(payload): Json<WebhookPayload>,
) -> Response {
    let secret = headers
        .get(WEBHOOK_SECRET_HEADER)
        .and_then(|value| value.to_str().ok());

    if secret != Some(state.secret.as_str()) {
        tracing::warn!("rejected a webhook with a missing or wrong secret");
        return StatusCode::UNAUTHORIZED.into_response();
    }

    if !payload.kind.eq_ignore_ascii_case("INSERT") {
        tracing::debug!(
            "ignoring {} on {}.{}",
            payload.kind,
            payload.schema,
            payload.table
        );
        return StatusCode::NO_CONTENT.into_response();
    }

    let Some(record) = payload.record else {
        return (StatusCode::BAD_REQUEST, "missing record").into_response();
    };

    let record: TransactionRecord = match serde_json::from_value(record) {
        Ok(record) => record,
        Err(error) => {
            tracing::warn!("could not decode the inserted transaction: {error}");
            return (StatusCode::BAD_REQUEST, "invalid transaction record").into_response();
        }
    };

    let delivered = state
        .transport
        .publish(&payload.schema, &payload.table, &record);
    tracing::info!(
        "received transaction {:?} for {}, delivered to {delivered} channel(s)",
        record.id,
        record.owner_id
    );

    StatusCode::ACCEPTED.into_response()
}

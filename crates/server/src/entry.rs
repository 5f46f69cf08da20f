use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use parley_core::interaction::Interaction;
use parley_interactions::{Engine, Registry};
use serde_json::json;
use tracing::{info, warn};

use crate::verify::SignatureVerifier;

/// Everything the webhook endpoint needs, shared across requests.
pub struct Gateway {
    pub verifier: SignatureVerifier,
    pub registry: Registry,
    pub engine: Engine,
}

pub fn router(gateway: Arc<Gateway>) -> Router {
    Router::new().route("/entry", post(entry)).with_state(gateway)
}

/// The single inbound surface. Order is load-bearing: authentication
/// happens on the raw bytes before any parsing, and a parse failure or a
/// routing miss is a 400, never a crash.
pub async fn entry(
    State(gateway): State<Arc<Gateway>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let signature = headers.get("x-signature-ed25519").and_then(|value| value.to_str().ok());
    let timestamp = headers.get("x-signature-timestamp").and_then(|value| value.to_str().ok());

    let (Some(signature), Some(timestamp)) = (signature, timestamp) else {
        return StatusCode::UNAUTHORIZED.into_response();
    };

    if !gateway.verifier.verify(timestamp, &body, signature) {
        warn!(
            event_name = "server.entry.bad_signature",
            "rejected webhook call with an invalid signature"
        );
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let interaction = match Interaction::from_slice(&body) {
        Ok(interaction) => interaction,
        Err(error) => {
            warn!(
                event_name = "server.entry.malformed_payload",
                error = %error,
                "authenticated payload failed to parse"
            );
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"error": "malformed interaction payload"})),
            )
                .into_response();
        }
    };

    info!(
        event_name = "server.entry.interaction_received",
        interaction_id = %interaction.id,
        kind = ?interaction.kind,
        guild_id = interaction.guild_id.as_deref().unwrap_or("none"),
        "interaction received"
    );

    match gateway.engine.dispatch(&gateway.registry, interaction).await {
        Some(response) => Json(response.to_wire()).into_response(),
        None => (StatusCode::BAD_REQUEST, Json(json!({}))).into_response(),
    }
}

//! The inbound interaction endpoint.
//!
//! One POST route answers every platform callback:
//!
//! ```text
//! POST {path}
//! ├── bad or missing signature  → 401, empty body
//! ├── body is not an interaction → 422 {"detail": [{loc, msg, type}]}
//! ├── unknown command/component  → 400 {"detail": "..."}
//! └── dispatched                 → 200 {type, data?}
//! ```
//!
//! Signatures are checked before the body is parsed. Errors no handler
//! claimed still answer 200 with the dispatcher's failure message, so the
//! user sees a reply instead of "This interaction failed".

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
};
use quill_core::Interaction;
use quill_framework::Dispatcher;
use serde::Serialize;
use serde_json::json;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::error::TransportResult;
use crate::verify::{SIGNATURE_HEADER, TIMESTAMP_HEADER, Verifier};

/// Default route path.
pub const DEFAULT_PATH: &str = "/";

struct EndpointState {
    dispatcher: Dispatcher,
    verifier: Verifier,
}

/// Builds the router serving interactions at `path`.
pub fn router(dispatcher: Dispatcher, verifier: Verifier, path: &str) -> Router {
    let path = if path.starts_with('/') {
        path.to_owned()
    } else {
        format!("/{path}")
    };
    let state = Arc::new(EndpointState {
        dispatcher,
        verifier,
    });
    Router::new()
        .route(&path, post(handle_interaction))
        .with_state(state)
}

/// Binds `addr` and returns the listener.
pub async fn bind(addr: &str) -> TransportResult<TcpListener> {
    let listener = TcpListener::bind(addr).await?;
    Ok(listener)
}

/// Serves `router` until `shutdown` fires. In-flight requests finish first.
pub async fn serve(
    listener: TcpListener,
    router: Router,
    shutdown: CancellationToken,
) -> TransportResult<()> {
    let addr: SocketAddr = listener.local_addr()?;
    info!(addr = %addr, "Interaction endpoint listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    info!(addr = %addr, "Interaction endpoint stopped");
    Ok(())
}

async fn handle_interaction(
    State(state): State<Arc<EndpointState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let signature = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());
    let timestamp = headers.get(TIMESTAMP_HEADER).and_then(|v| v.to_str().ok());
    let verified = match (signature, timestamp) {
        (Some(signature), Some(timestamp)) => state.verifier.verify(signature, timestamp, &body),
        _ => false,
    };
    if !verified {
        debug!("Rejected request with a bad signature");
        return StatusCode::UNAUTHORIZED.into_response();
    }

    trace!(len = body.len(), "Received interaction");
    let interaction: Interaction = match serde_json::from_slice(&body) {
        Ok(interaction) => interaction,
        Err(error) => {
            debug!(error = %error, "Rejected malformed interaction");
            return (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({ "detail": [FieldError::from_json(&error)] })),
            )
                .into_response();
        }
    };

    match state.dispatcher.dispatch(interaction).await {
        Ok(payload) => Json(payload).into_response(),
        Err(error) if error.is_client_error() => {
            warn!(error = %error, "Interaction could not be routed");
            (
                StatusCode::BAD_REQUEST,
                Json(json!({ "detail": error.to_string() })),
            )
                .into_response()
        }
        Err(_) => {
            Json(state.dispatcher.failure_response()).into_response()
        }
    }
}

/// One entry of a 422 body.
#[derive(Debug, Serialize)]
struct FieldError {
    loc: Vec<String>,
    msg: String,
    #[serde(rename = "type")]
    kind: &'static str,
}

impl FieldError {
    fn from_json(error: &serde_json::Error) -> Self {
        let mut loc = vec!["body".to_owned()];
        let kind = match error.classify() {
            serde_json::error::Category::Data => {
                if let Some(field) = field_name(&error.to_string()) {
                    loc.push(field);
                }
                "value_error"
            }
            _ => "json_invalid",
        };
        Self {
            loc,
            msg: error.to_string(),
            kind,
        }
    }
}

/// Field name from serde messages like ``missing field `token` ``. Messages
/// quoting a value instead (unknown variants, invalid values) yield `None`.
fn field_name(message: &str) -> Option<String> {
    let rest = ["missing field `", "unknown field `", "duplicate field `"]
        .iter()
        .find_map(|prefix| message.strip_prefix(prefix))?;
    let (field, _) = rest.split_once('`')?;
    Some(field.to_owned())
}

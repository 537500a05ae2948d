use crate::dashboard::Dashboard;
use crate::models::{DeviceEdit, DeviceView};
use axum::body::Bytes;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub const SAVE_DEVICE_NAMES: &str = "save_device_names";

const MSG_SAVED: &str = "Device names and icons updated.";
const MSG_WRITE_FAILED: &str = "Failed to write to file.";
const MSG_INVALID_DATA: &str = "Invalid data format.";
const MSG_UNKNOWN_ACTION: &str = "Unknown action.";
const MSG_NO_ACTION: &str = "No action specified.";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiResponse {
    pub status: Outcome,
    pub message: String,
}

impl ApiResponse {
    fn success(message: &str) -> Self {
        Self {
            status: Outcome::Success,
            message: message.to_string(),
        }
    }

    fn error(message: &str) -> Self {
        Self {
            status: Outcome::Error,
            message: message.to_string(),
        }
    }
}

pub fn router(dashboard: Arc<Dashboard>) -> Router {
    Router::new()
        .route("/", get(device_view))
        .route("/api", post(api))
        .layer(TraceLayer::new_for_http())
        .with_state(dashboard)
}

async fn device_view(State(dashboard): State<Arc<Dashboard>>) -> Json<DeviceView> {
    Json(dashboard.refresh().await)
}

// Every outcome, including a malformed body, is answered with the JSON envelope.
async fn api(State(dashboard): State<Arc<Dashboard>>, body: Bytes) -> Json<ApiResponse> {
    let request: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    // Saving waits on file locks.
    let reply = tokio::task::spawn_blocking(move || dispatch(&dashboard, &request))
        .await
        .unwrap_or_else(|e| {
            tracing::error!("Action task failed: {}", e);
            ApiResponse::error(MSG_WRITE_FAILED)
        });
    Json(reply)
}

pub fn dispatch(dashboard: &Dashboard, request: &Value) -> ApiResponse {
    let action = match request.get("action").and_then(Value::as_str) {
        Some(action) => action,
        None => return ApiResponse::error(MSG_NO_ACTION),
    };

    match action {
        SAVE_DEVICE_NAMES => {
            let edits = match request
                .get("devices")
                .filter(|devices| devices.is_array())
                .and_then(|devices| Vec::<DeviceEdit>::deserialize(devices).ok())
            {
                Some(edits) => edits,
                None => return ApiResponse::error(MSG_INVALID_DATA),
            };

            match dashboard.save_device_edits(&edits) {
                Ok(()) => ApiResponse::success(MSG_SAVED),
                Err(e) => {
                    tracing::warn!("{}", e);
                    ApiResponse::error(MSG_WRITE_FAILED)
                }
            }
        }
        other => {
            tracing::debug!("Rejected unknown action {:?}", other);
            ApiResponse::error(MSG_UNKNOWN_ACTION)
        }
    }
}

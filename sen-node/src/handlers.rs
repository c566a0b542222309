//! Request handlers for API endpoints

use axum::{
    Json,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use crate::models::*;
use crate::state::AppState;

/// Health check endpoint
pub async fn health_handler() -> Json<HealthCheck> {
    Json(HealthCheck {
        status: "healthy",
        version: "2026.1.16",
    })
}

/// Descriptor of the sensor this node reads
pub async fn sensor_handler(State(state): State<AppState>) -> Json<SensorInfo> {
    Json(SensorInfo::new(state.descriptor, state.address))
}

/// Latest measurement; 204 until the first cycle delivers
pub async fn measurement_handler(State(state): State<AppState>) -> Response {
    match state.measurements.latest() {
        Some(measurement) => Json(state.render(&measurement)).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

/// WebSocket stream with one JSON document per measurement
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| stream_measurements(socket, state))
}

async fn stream_measurements(mut socket: WebSocket, state: AppState) {
    let mut stream = state.measurements.subscribe();
    // fecha quando o scheduler termina e o sink é descartado
    let mut latest = state.measurements.watch();
    debug!("websocket client connected");

    loop {
        tokio::select! {
            received = stream.recv() => match received {
                Ok(measurement) => {
                    let text = state.render(&measurement).to_string();
                    if socket.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "websocket client lagging, measurements skipped");
                }
                Err(RecvError::Closed) => break,
            },
            changed = latest.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            incoming = socket.recv() => match incoming {
                None | Some(Err(_)) | Some(Ok(Message::Close(_))) => break,
                Some(Ok(_)) => {}
            },
        }
    }

    debug!("websocket client disconnected");
}

use std::convert::Infallible;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use futures::Stream;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

use crate::auth::handlers::non_blank;
use crate::db::TIMESTAMP_FORMAT;
use crate::error::{AppError, AppResult};
use crate::extractors::JsonBody;
use crate::state::AppState;

/// One chat line as fanned out to stream subscribers.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub text: String,
    pub uid: Option<String>,
    #[serde(rename = "photoURL")]
    pub photo_url: Option<String>,
    pub sent_at: String,
}

#[derive(Deserialize)]
pub struct SendMessageRequest {
    pub text: Option<String>,
    pub uid: Option<String>,
    #[serde(rename = "photoURL")]
    pub photo_url: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/send-message", post(send_message))
        .route("/messages/stream", get(stream_messages))
}

/// POST /send-message — broadcast only, nothing is persisted
async fn send_message(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<SendMessageRequest>,
) -> AppResult<Json<serde_json::Value>> {
    let text = non_blank(req.text)
        .ok_or_else(|| AppError::BadRequest("Message text is required".into()))?;

    let message = ChatMessage {
        text,
        uid: req.uid,
        photo_url: req.photo_url,
        sent_at: Utc::now().format(TIMESTAMP_FORMAT).to_string(),
    };

    // send() only fails when nobody is listening
    let receivers = state.messages.send(message).unwrap_or(0);
    tracing::info!("Broadcast chat message to {} subscriber(s)", receivers);

    Ok(Json(json!({
        "message": "Message sent successfully",
        "receivers": receivers,
    })))
}

/// GET /messages/stream — SSE feed of `new_message` events
async fn stream_messages(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    tracing::debug!("New chat stream subscriber");

    let stream = BroadcastStream::new(state.messages.subscribe()).filter_map(|received| {
        match received {
            Ok(message) => match Event::default().event("new_message").json_data(&message) {
                Ok(event) => Some(Ok(event)),
                Err(e) => {
                    tracing::error!("Failed to encode chat message: {}", e);
                    None
                }
            },
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                tracing::warn!("Chat subscriber lagged, skipped {} message(s)", skipped);
                None
            }
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

use axum::http::StatusCode;
use axum::Json;

use crate::response::Message;

/// GET /ping
pub async fn ping() -> (StatusCode, Json<Message>) {
    (StatusCode::OK, Json(Message::successful()))
}

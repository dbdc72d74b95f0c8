use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

/// JSON body shared by the downstream handler and the admission layer's
/// rejections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub status: String,
    pub body: String,
}

impl Message {
    pub fn new(status: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            body: body.into(),
        }
    }

    pub fn at_capacity() -> Self {
        Self::new(
            "Request Failed",
            "The API is at capacity, please try again later",
        )
    }

    pub fn internal_error() -> Self {
        Self::new("Request Failed", "Internal server error")
    }

    pub fn successful() -> Self {
        Self::new(
            "Successful",
            "Hi! You've reached the API. How may I help you?",
        )
    }
}

/// 429 with the capacity-exceeded message.
pub fn rate_limited() -> Response {
    (StatusCode::TOO_MANY_REQUESTS, Json(Message::at_capacity())).into_response()
}

/// 500 for requests whose client identity could not be determined.
pub fn identity_unavailable() -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, Json(Message::internal_error())).into_response()
}

//! Error types for the HTTP binding.
//!
//! [`ApiError`] captures every non-success answer a handler can give and
//! implements [`IntoResponse`] so handlers can return it with `?`.
//!
//! ## Error Cases
//! - `InvalidRequest`: a query parameter is missing or malformed (`400`).
//! - `NotFound`: the queue is empty, or the wait elapsed (`404`).
//! - `RequestCancelled`: the wait was cancelled on the caller's behalf.
//! - `ServiceShutdown`: the server began shutting down (`503`).

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// Status used for waits cancelled on behalf of the client.
const CLIENT_CLOSED_REQUEST: u16 = 499;

/// Body sent to consumers still waiting when the server shuts down.
pub const SHUTDOWN_BODY: &str = "service is shutting down";

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// The request was malformed.
    #[error("Invalid request: {reason}")]
    InvalidRequest { reason: String },

    /// Nothing was available within the allowed time.
    #[error("Queue is empty")]
    NotFound,

    /// The wait was cancelled before a value arrived.
    #[error("Request cancelled")]
    RequestCancelled,

    /// The server is shutting down.
    #[error("service is shutting down")]
    ServiceShutdown,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::InvalidRequest { reason } => (StatusCode::BAD_REQUEST, reason).into_response(),
            Self::NotFound => StatusCode::NOT_FOUND.into_response(),
            Self::RequestCancelled => StatusCode::from_u16(CLIENT_CLOSED_REQUEST)
                .unwrap_or(StatusCode::REQUEST_TIMEOUT)
                .into_response(),
            Self::ServiceShutdown => {
                (StatusCode::SERVICE_UNAVAILABLE, SHUTDOWN_BODY).into_response()
            }
        }
    }
}

//! HTTP binding for the queue coordinator.
//!
//! Translates requests into coordinator operations and coordinator outcomes
//! into status codes. No queue state lives here.
//!
//! ## Structure
//!
//! - [`error`] - request-level errors and their HTTP mapping.
//! - [`handler`] - the axum router and its `PUT`/`GET` handlers.

pub mod error;
pub mod handler;

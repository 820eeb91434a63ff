//! Shared response envelope types for API handlers.
//!
//! License and health responses use the `{ "data": ... }` envelope.
//! `process-video` keeps the flat `{ success, images, ... }` shape the
//! capture UI consumes, defined in [`crate::handlers::capture`].

use serde::Serialize;

/// Standard `{ "data": T }` response envelope.
#[derive(Debug, Serialize)]
pub struct DataResponse<T: Serialize> {
    pub data: T,
}

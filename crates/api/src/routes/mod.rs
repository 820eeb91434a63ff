pub mod capture;
pub mod health;
pub mod license;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /process-video                                   fetch, sample, charge quota (POST)
///
/// /license                                         current entitlement + usage (GET),
///                                                  activate credential (POST)
/// ```
///
/// Every route is scoped to the client context in the `x-client-id` header.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(capture::router())
        .merge(license::router())
}

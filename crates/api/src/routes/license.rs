use axum::routing::get;
use axum::Router;

use crate::handlers::license;
use crate::state::AppState;

/// Routes mounted at `/license`.
///
/// ```text
/// GET   /license      -> get_license
/// POST  /license      -> set_license
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route(
        "/license",
        get(license::get_license).post(license::set_license),
    )
}

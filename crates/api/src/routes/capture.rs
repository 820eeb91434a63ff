use axum::routing::post;
use axum::Router;

use crate::handlers::capture;
use crate::state::AppState;

/// Routes mounted at `/process-video`.
pub fn router() -> Router<AppState> {
    Router::new().route("/process-video", post(capture::process_video))
}

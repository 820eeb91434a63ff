//! Client-context extractor for Axum handlers.

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use framegrab_core::quota::QuotaLedger;
use framegrab_core::registry::{validate_client_context, DEFAULT_CLIENT_CONTEXT};

use crate::error::AppError;
use crate::state::AppState;

/// Header naming the client context a request belongs to.
pub const CLIENT_ID_HEADER: &str = "x-client-id";

/// The client context of a request and its quota ledger.
///
/// Read from the `x-client-id` header; requests without one share the
/// `default` context.
///
/// ```ignore
/// async fn my_handler(client: ClientContext) -> AppResult<Json<()>> {
///     tracing::info!(client = %client.id, "handling request");
///     Ok(Json(()))
/// }
/// ```
#[derive(Debug, Clone)]
pub struct ClientContext {
    pub id: String,
    pub ledger: Arc<QuotaLedger>,
}

impl FromRequestParts<AppState> for ClientContext {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let id = match parts.headers.get(CLIENT_ID_HEADER) {
            None => DEFAULT_CLIENT_CONTEXT.to_string(),
            Some(value) => value
                .to_str()
                .map_err(|_| AppError::BadRequest("Client id must be visible ASCII".into()))?
                .trim()
                .to_string(),
        };
        validate_client_context(&id)?;

        let ledger = state.ledgers.ledger_for(&id);
        Ok(ClientContext { id, ledger })
    }
}

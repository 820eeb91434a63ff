//! Handlers for the `/license` resource.
//!
//! A client context's entitlement is replaced wholesale by whatever
//! credential is posted; there is no partial update.

use axum::Json;
use framegrab_core::error::CoreError;
use framegrab_core::quota::LedgerSnapshot;
use serde::Deserialize;

use crate::error::AppResult;
use crate::middleware::client::ClientContext;
use crate::response::DataResponse;

#[derive(Debug, Deserialize)]
pub struct SetLicenseRequest {
    #[serde(default)]
    pub credential: Option<String>,
}

/// GET /api/v1/license
pub async fn get_license(client: ClientContext) -> Json<DataResponse<LedgerSnapshot>> {
    Json(DataResponse {
        data: client.ledger.snapshot(),
    })
}

/// POST /api/v1/license
///
/// Activate a credential for the caller's context. Usage counters are kept.
pub async fn set_license(
    client: ClientContext,
    Json(input): Json<SetLicenseRequest>,
) -> AppResult<Json<DataResponse<LedgerSnapshot>>> {
    let credential = input
        .credential
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .ok_or_else(|| CoreError::Validation("Please enter a license key".to_string()))?;

    let entitlement = client.ledger.set_credential(Some(credential));
    tracing::info!(client = %client.id, tier = entitlement.tier.as_str(), "License activated");

    Ok(Json(DataResponse {
        data: client.ledger.snapshot(),
    }))
}

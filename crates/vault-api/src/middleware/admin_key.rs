use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use tracing::debug;
use vault_shared::constants::ADMIN_KEY_HEADER;

use crate::error::ApiError;
use crate::state::AppState;

/// Reject administrative calls without the configured key. A deployment without a key
/// configured leaves the surface open.
pub async fn require_admin_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(expected) = state.admin_api_key.as_deref() else {
        return Ok(next.run(request).await);
    };

    let provided = request
        .headers()
        .get(ADMIN_KEY_HEADER)
        .and_then(|value| value.to_str().ok());

    match provided {
        Some(key) if constant_time_eq(key.as_bytes(), expected.as_bytes()) => {
            debug!("Admin key accepted");
            Ok(next.run(request).await)
        }
        Some(_) => Err(ApiError::Unauthorized("invalid admin key".into())),
        None => Err(ApiError::Unauthorized(format!("missing {} header", ADMIN_KEY_HEADER))),
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{DecodingKey, Validation, decode};

use roster_types::api::Claims;

use crate::AppState;
use crate::error::ApiError;

/// Extract and validate the bearer JWT from the Authorization header,
/// stashing the claims as a request extension for handlers downstream.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(unauthorized)?;

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(state.jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| unauthorized())?;

    req.extensions_mut().insert(token_data.claims);
    Ok(next.run(req).await)
}

/// Reject non-admin callers. Must run after `require_auth` has inserted the
/// claims.
pub async fn require_admin(req: Request, next: Next) -> Result<Response, ApiError> {
    let claims = req.extensions().get::<Claims>().ok_or_else(unauthorized)?;

    if !claims.is_admin {
        return Err(ApiError::Forbidden(
            "Unauthorized: You do not have permissions to perform this action".into(),
        ));
    }

    Ok(next.run(req).await)
}

fn unauthorized() -> ApiError {
    ApiError::Unauthorized("Unauthorized: You must be logged in to perform this action".into())
}

use axum::{Json, extract::State, response::IntoResponse};
use jsonwebtoken::{EncodingKey, Header, encode};
use tracing::error;

use roster_db::models::UserRow;
use roster_types::api::{Claims, LoginRequest, LoginResponse};

use crate::AppState;
use crate::error::ApiError;

/// Token lifetime. Tokens are stateless; revocation is out of scope.
const TOKEN_TTL_DAYS: i64 = 30;

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let credentials = state.credentials;
    let db_state = state.clone();
    let LoginRequest { email, password } = req;

    // Both the row lookup (connection mutex) and the KDF are blocking work.
    let verified = tokio::task::spawn_blocking(move || -> anyhow::Result<Option<UserRow>> {
        let Some(user) = db_state.db.get_user_by_email(&email)? else {
            // Burn a derivation anyway so unknown emails aren't
            // distinguishable from bad passwords by response time.
            let _ = credentials.derive(&password);
            return Ok(None);
        };

        if credentials.verify(&password, &user.credential())? {
            Ok(Some(user))
        } else {
            Ok(None)
        }
    })
    .await
    .map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        internal()
    })?
    .map_err(|e| {
        // Only malformed stored credentials or DB failures land here — a
        // plain mismatch is Ok(None).
        error!("login failed unexpectedly: {}", e);
        internal()
    })?;

    let Some(user) = verified else {
        return Err(ApiError::Unauthorized("Invalid email or password".into()));
    };

    let token = create_token(&state.jwt_secret, &user).map_err(|e| {
        error!("token issuance failed: {}", e);
        internal()
    })?;

    Ok(Json(LoginResponse {
        access_token: token,
    }))
}

fn create_token(secret: &str, user: &UserRow) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user.id,
        email: user.email.clone(),
        name: user.name.clone(),
        is_admin: user.is_admin,
        exp: (chrono::Utc::now() + chrono::Duration::days(TOKEN_TTL_DAYS)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

fn internal() -> ApiError {
    ApiError::internal("An unexpected error occurred while logging in")
}

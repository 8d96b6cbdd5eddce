use axum::{
    Json,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, Uri, header},
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::{error, warn};

use roster_db::models::{UserChanges, UserRow};
use roster_types::api::{CreateUserRequest, Envelope, PublicUser, UpdateUserRequest};

use crate::AppState;
use crate::error::ApiError;
use crate::pagination::{self, DEFAULT_LIMIT, DEFAULT_SKIP};
use crate::validate;

/// Hard ceiling on page size, independent of what the client asks for.
const MAX_LIMIT: u32 = 200;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default = "default_skip")]
    pub skip: u32,
}

fn default_limit() -> u32 {
    DEFAULT_LIMIT
}

fn default_skip() -> u32 {
    DEFAULT_SKIP
}

pub async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
    uri: Uri,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let limit = query.limit.min(MAX_LIMIT);
    let skip = query.skip;

    let db = state.clone();
    let rows = tokio::task::spawn_blocking(move || db.db.list_users(limit, skip))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            list_failed()
        })?
        .map_err(|e| {
            error!("listing users failed: {}", e);
            list_failed()
        })?;

    let base_url = base_url(&headers, &uri);
    let meta = pagination::page_meta(&base_url, limit, skip, rows.len());
    let users: Vec<PublicUser> = rows.into_iter().map(row_to_public).collect();

    Ok(Json(Envelope::page(users, meta)))
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let row = tokio::task::spawn_blocking(move || db.db.get_user(id))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            get_failed(id)
        })?
        .map_err(|e| {
            error!("fetching user {} failed: {}", id, e);
            get_failed(id)
        })?
        .ok_or_else(|| not_found(id))?;

    Ok(Json(Envelope::data(row_to_public(row))))
}

pub async fn create_user(
    State(state): State<AppState>,
    Json(req): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let errors = validate::validate_create_user(&req.email, &req.password);
    if !errors.is_empty() {
        return Err(ApiError::Validation(errors));
    }

    let credentials = state.credentials;
    let db = state.clone();
    let CreateUserRequest {
        email,
        password,
        name,
        is_admin,
    } = req;
    let email_for_error = email.clone();

    // Uniqueness check, derivation, and insert under one blocking task.
    let created = tokio::task::spawn_blocking(move || -> anyhow::Result<Option<UserRow>> {
        if db.db.get_user_by_email(&email)?.is_some() {
            return Ok(None);
        }

        let credential = credentials.derive(&password);
        let id = db
            .db
            .create_user(&email, name.as_deref(), is_admin.unwrap_or(false), &credential)?;

        Ok(db.db.get_user(id)?)
    })
    .await
    .map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        create_failed()
    })?
    .map_err(|e| {
        error!("creating user failed: {}", e);
        create_failed()
    })?;

    let Some(user) = created else {
        return Err(ApiError::BadRequest(format!(
            "A user with the email address ({}) already exists",
            email_for_error
        )));
    };

    state
        .notifier
        .broadcast(format!("User {} created", user.id))
        .await;

    Ok((
        StatusCode::CREATED,
        Json(Envelope::data(row_to_public(user))),
    ))
}

pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let errors = validate::validate_update_user(req.email.as_deref(), req.password.as_deref());
    if !errors.is_empty() {
        return Err(ApiError::Validation(errors));
    }

    let credentials = state.credentials;
    let db = state.clone();
    let UpdateUserRequest {
        email,
        password,
        name,
        is_admin,
    } = req;

    let outcome = tokio::task::spawn_blocking(move || -> anyhow::Result<UpdateOutcome> {
        if db.db.get_user(id)?.is_none() {
            return Ok(UpdateOutcome::NotFound);
        }

        if let Some(email) = &email {
            if db.db.email_used_by_another_user(email, id)? {
                return Ok(UpdateOutcome::EmailTaken(email.clone()));
            }
        }

        // A password change always derives a fresh credential — new salt,
        // never reused from the previous one.
        let changes = UserChanges {
            email,
            name,
            is_admin,
            credential: password.map(|p| credentials.derive(&p)),
        };
        db.db.update_user(id, &changes)?;

        let row = db
            .db
            .get_user(id)?
            .ok_or_else(|| anyhow::anyhow!("user {} vanished mid-update", id))?;
        Ok(UpdateOutcome::Updated(row))
    })
    .await
    .map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        update_failed(id)
    })?
    .map_err(|e| {
        error!("updating user {} failed: {}", id, e);
        update_failed(id)
    })?;

    let user = match outcome {
        UpdateOutcome::NotFound => return Err(not_found(id)),
        UpdateOutcome::EmailTaken(email) => {
            return Err(ApiError::BadRequest(format!(
                "This email address ({}) is being used by another user",
                email
            )));
        }
        UpdateOutcome::Updated(row) => row,
    };

    state
        .notifier
        .broadcast(format!("User {} updated", user.id))
        .await;

    Ok(Json(Envelope::data(row_to_public(user))))
}

enum UpdateOutcome {
    NotFound,
    EmailTaken(String),
    Updated(UserRow),
}

pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let deleted = tokio::task::spawn_blocking(move || db.db.delete_user(id))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            delete_failed(id)
        })?
        .map_err(|e| {
            error!("deleting user {} failed: {}", id, e);
            delete_failed(id)
        })?;

    if !deleted {
        return Err(not_found(id));
    }

    state
        .notifier
        .broadcast(format!("User {} deleted", id))
        .await;

    Ok(StatusCode::NO_CONTENT)
}

fn row_to_public(row: UserRow) -> PublicUser {
    PublicUser {
        id: row.id,
        email: row.email,
        name: row.name,
        is_admin: row.is_admin,
        created_at: row
            .created_at
            .parse::<chrono::DateTime<chrono::Utc>>()
            .or_else(|_| {
                // SQLite stores timestamps as "YYYY-MM-DD HH:MM:SS" without
                // timezone. Parse as naive UTC and convert.
                chrono::NaiveDateTime::parse_from_str(&row.created_at, "%Y-%m-%d %H:%M:%S")
                    .map(|ndt| ndt.and_utc())
            })
            .unwrap_or_else(|e| {
                warn!("Corrupt created_at '{}' on user {}: {}", row.created_at, row.id, e);
                chrono::DateTime::default()
            }),
    }
}

/// Rebuild the request's own address for pagination links. TLS termination
/// lives outside this service, so the scheme is always http here.
fn base_url(headers: &HeaderMap, uri: &Uri) -> String {
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");
    format!("http://{}{}", host, uri.path())
}

fn not_found(id: i64) -> ApiError {
    ApiError::NotFound(format!("User with id ({}) not found", id))
}

fn list_failed() -> ApiError {
    ApiError::internal("An unexpected error occurred while retrieving users")
}

fn get_failed(id: i64) -> ApiError {
    ApiError::internal(format!(
        "An unexpected error occurred while retrieving user with id: {}",
        id
    ))
}

fn create_failed() -> ApiError {
    ApiError::internal("An unexpected error occurred while creating user")
}

fn update_failed(id: i64) -> ApiError {
    ApiError::internal(format!(
        "An unexpected error occurred while updating user with id: {}",
        id
    ))
}

fn delete_failed(id: i64) -> ApiError {
    ApiError::internal(format!(
        "An unexpected error occurred while deleting user with id: {}",
        id
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(created_at: &str) -> UserRow {
        UserRow {
            id: 1,
            email: "a@example.com".into(),
            name: None,
            is_admin: false,
            password: String::new(),
            salt: String::new(),
            created_at: created_at.into(),
        }
    }

    #[test]
    fn public_user_parses_sqlite_timestamps() {
        let user = row_to_public(row("2026-03-14 09:26:53"));
        assert_eq!(user.created_at.to_rfc3339(), "2026-03-14T09:26:53+00:00");
    }

    #[test]
    fn public_user_tolerates_corrupt_timestamps() {
        let user = row_to_public(row("not a date"));
        assert_eq!(user.created_at, chrono::DateTime::<chrono::Utc>::default());
    }

    #[test]
    fn base_url_prefers_host_header() {
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, "api.example.com:8080".parse().unwrap());
        let uri: Uri = "/api/users?limit=10".parse().unwrap();
        assert_eq!(
            base_url(&headers, &uri),
            "http://api.example.com:8080/api/users"
        );
    }

    #[test]
    fn base_url_falls_back_without_host() {
        let uri: Uri = "/api/users".parse().unwrap();
        assert_eq!(base_url(&HeaderMap::new(), &uri), "http://localhost/api/users");
    }
}

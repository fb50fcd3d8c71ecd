use axum::{
    extract::{FromRef, State},
    routing::{get, post},
    Json, Router,
};
use tracing::{error, info, instrument, warn};

use crate::{
    auth::{
        dto::{
            AuthResponse, LoginRequest, PublicAccount, RefreshRequest, RegisterRequest,
            UpdateMeRequest,
        },
        extractors::AuthUser,
        repo::Account,
        services::{hash_password, is_valid_email, verify_password, JwtKeys},
    },
    error::ApiError,
    scope::Role,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/me", get(get_me).put(update_me))
}

fn token_pair(
    keys: &JwtKeys,
    account: &Account,
) -> Result<(String, String, PublicAccount), ApiError> {
    let role = account.role()?;
    let access_token = keys.sign_access(account.id, role).map_err(|e| {
        error!(error = %e, "jwt sign access failed");
        ApiError::Internal(e)
    })?;
    let refresh_token = keys.sign_refresh(account.id, role).map_err(|e| {
        error!(error = %e, "jwt sign refresh failed");
        ApiError::Internal(e)
    })?;
    Ok((access_token, refresh_token, account.to_public()?))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(mut payload): Json<RegisterRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    payload.email = payload.email.trim().to_lowercase();

    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(ApiError::validation("Invalid email"));
    }

    if payload.password.len() < 8 {
        warn!("password too short");
        return Err(ApiError::validation("Password too short"));
    }

    if payload.display_name.trim().is_empty() {
        return Err(ApiError::validation("Display name is required"));
    }

    let role = payload.role.unwrap_or(Role::User);

    // Admins do not report to anyone.
    if role == Role::Admin && payload.admin_id.is_some() {
        return Err(ApiError::validation("Admins cannot have an assigned admin"));
    }

    if let Some(admin_id) = payload.admin_id {
        match Account::find_by_id(&state.db, admin_id).await? {
            Some(admin) if admin.role()? == Role::Admin => {}
            Some(_) => {
                return Err(ApiError::validation("adminId does not refer to an admin"));
            }
            None => {
                return Err(ApiError::validation("adminId refers to an unknown account"));
            }
        }
    }

    // Ensure email is not taken
    if Account::find_by_email(&state.db, &payload.email).await?.is_some() {
        warn!(email = %payload.email, "email already registered");
        return Err(ApiError::Conflict("Email already registered".into()));
    }

    let hash = hash_password(&payload.password).map_err(|e| {
        error!(error = %e, "hash_password failed");
        ApiError::Internal(e)
    })?;

    let account = Account::create(
        &state.db,
        &payload.email,
        &hash,
        payload.display_name.trim(),
        role,
        payload.admin_id,
    )
    .await?;

    let keys = JwtKeys::from_ref(&state);
    let (access_token, refresh_token, user) = token_pair(&keys, &account)?;

    info!(account_id = %account.id, email = %account.email, role = %account.role, "account registered");
    Ok(Json(AuthResponse {
        access_token,
        refresh_token,
        user,
    }))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(mut payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    payload.email = payload.email.trim().to_lowercase();

    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(ApiError::validation("Invalid email"));
    }

    let account = match Account::find_by_email(&state.db, &payload.email).await? {
        Some(a) => a,
        None => {
            warn!(email = %payload.email, "login unknown email");
            return Err(ApiError::Unauthorized("Invalid credentials".into()));
        }
    };

    let ok = verify_password(&payload.password, &account.password_hash).map_err(|e| {
        error!(error = %e, "verify_password failed");
        ApiError::Internal(e)
    })?;

    if !ok {
        warn!(email = %payload.email, account_id = %account.id, "login invalid password");
        return Err(ApiError::Unauthorized("Invalid credentials".into()));
    }

    let keys = JwtKeys::from_ref(&state);
    let (access_token, refresh_token, user) = token_pair(&keys, &account)?;

    info!(account_id = %account.id, email = %account.email, "account logged in");
    Ok(Json(AuthResponse {
        access_token,
        refresh_token,
        user,
    }))
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let keys = JwtKeys::from_ref(&state);
    let claims = keys
        .verify_refresh(&payload.refresh_token)
        .map_err(|e| ApiError::Unauthorized(e.to_string()))?;

    let account = Account::find_by_id(&state.db, claims.sub)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Account not found".into()))?;

    // Issue a new pair
    let (access_token, refresh_token, user) = token_pair(&keys, &account)?;
    Ok(Json(AuthResponse {
        access_token,
        refresh_token,
        user,
    }))
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
) -> Result<Json<PublicAccount>, ApiError> {
    let account = Account::find_by_id(&state.db, caller.id)
        .await?
        .ok_or_else(|| {
            error!(account_id = %caller.id, "authenticated account missing");
            ApiError::Unauthorized("Account not found".into())
        })?;

    Ok(Json(account.to_public()?))
}

#[instrument(skip(state, payload))]
pub async fn update_me(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Json(payload): Json<UpdateMeRequest>,
) -> Result<Json<PublicAccount>, ApiError> {
    let display_name = payload.display_name.trim();
    if display_name.is_empty() {
        return Err(ApiError::validation("Display name is required"));
    }

    let account = Account::update_display_name(&state.db, caller.id, display_name).await?;
    info!(account_id = %caller.id, "profile updated");
    Ok(Json(account.to_public()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn public_account_serialization_is_camel_case() {
        let response = PublicAccount {
            id: Uuid::new_v4(),
            email: "test@example.com".to_string(),
            display_name: "Test".to_string(),
            role: Role::User,
            assigned_admin: None,
        };

        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("test@example.com"));
        assert!(json.contains("displayName"));
        assert!(json.contains("\"role\":\"user\""));
    }

    #[test]
    fn register_request_accepts_camel_case_admin_id() {
        let body = r#"{
            "email": "a@b.co",
            "password": "longenough",
            "displayName": "A",
            "adminId": "7b5f4b10-5b9e-4f9f-9a53-0f4b58a2a001"
        }"#;
        let req: RegisterRequest = serde_json::from_str(body).unwrap();
        assert!(req.admin_id.is_some());
        assert!(req.role.is_none());
    }
}

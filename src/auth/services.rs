use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{LoginRequest, LoginResponse, RegisterRequest},
        jwt::JwtKeys,
        password::{verify_dummy, verify_password},
    },
    error::AppError,
    users::{
        dto::PublicUser,
        repo_types::Role,
        services::{create_account, normalize_email},
        store::UserStore,
    },
};

/// Self-service registration. Always creates a plain user; no token is issued.
pub async fn register(store: &dyn UserStore, req: RegisterRequest) -> Result<PublicUser, AppError> {
    create_account(store, &req.email, &req.password, Role::User).await
}

/// Checks credentials and issues an access token. Unknown email and wrong
/// password fail identically.
#[instrument(skip(store, keys, req))]
pub async fn login(
    store: &dyn UserStore,
    keys: &JwtKeys,
    req: LoginRequest,
) -> Result<LoginResponse, AppError> {
    let email = normalize_email(&req.email);

    let mut missing = Vec::new();
    if email.is_empty() {
        missing.push("email".to_string());
    }
    if req.password.is_empty() {
        missing.push("password".to_string());
    }
    if !missing.is_empty() {
        return Err(AppError::Validation(missing));
    }

    let Some(user) = store.find_by_email(&email).await? else {
        verify_dummy(&req.password);
        warn!(email = %email, "login unknown email");
        return Err(AppError::InvalidCredentials);
    };

    if !verify_password(&req.password, &user.password_hash) {
        warn!(email = %email, user_id = user.id, "login invalid password");
        return Err(AppError::InvalidCredentials);
    }

    let access_token = keys.issue_access(user.id, &user.email, user.role)?;

    info!(user_id = user.id, email = %user.email, "user logged in");
    Ok(LoginResponse {
        access_token,
        token_type: "Bearer".into(),
        expires_in: keys.access_ttl.whole_seconds(),
        user: user.into(),
    })
}

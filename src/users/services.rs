use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, instrument, warn};

use crate::{
    auth::password::hash_password,
    error::AppError,
    users::{
        dto::{CreateUserRequest, Pagination, PublicUser, UpdateUserRequest, UserPage},
        repo_types::{NewUser, Role},
        store::UserStore,
    },
};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Checks the fields of a new account and returns every offending field name.
pub(crate) fn validate_new_account(email: &str, password: &str) -> Result<(), AppError> {
    let mut fields = Vec::new();
    if !is_valid_email(email) {
        fields.push("email".to_string());
    }
    if password.is_empty() {
        fields.push("password".to_string());
    }
    if fields.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation(fields))
    }
}

/// Empty or whitespace-only optional fields count as absent.
fn present(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_role(raw: &str) -> Result<Role, AppError> {
    raw.parse()
        .map_err(|_| AppError::Validation(vec!["role".to_string()]))
}

/// Validates, checks uniqueness, hashes and persists a new account.
#[instrument(skip(store, password))]
pub async fn create_account(
    store: &dyn UserStore,
    email: &str,
    password: &str,
    role: Role,
) -> Result<PublicUser, AppError> {
    let email = normalize_email(email);
    validate_new_account(&email, password)?;

    if store.find_by_email(&email).await?.is_some() {
        warn!(email = %email, "email already registered");
        return Err(AppError::DuplicateEmail);
    }

    let password_hash = hash_password(password)?;
    // The unique index still decides under concurrent inserts.
    let user = store
        .create(NewUser {
            email,
            password_hash,
            role,
        })
        .await?;

    info!(user_id = user.id, email = %user.email, role = %user.role, "user created");
    Ok(user.into())
}

/// Admin creation: the requested role, admin when none is given.
pub async fn create_user(
    store: &dyn UserStore,
    req: CreateUserRequest,
) -> Result<PublicUser, AppError> {
    let role = match present(req.role.as_deref()) {
        Some(raw) => parse_role(raw)?,
        None => Role::Admin,
    };
    create_account(store, &req.email, &req.password, role).await
}

#[instrument(skip(store))]
pub async fn get_user(store: &dyn UserStore, id: i64) -> Result<PublicUser, AppError> {
    let user = store.find_by_id(id).await?.ok_or(AppError::NotFound)?;
    Ok(user.into())
}

#[instrument(skip(store, req))]
pub async fn update_user(
    store: &dyn UserStore,
    id: i64,
    req: UpdateUserRequest,
) -> Result<PublicUser, AppError> {
    let mut user = store.find_by_id(id).await?.ok_or(AppError::NotFound)?;

    let email = present(req.email.as_deref()).map(normalize_email);
    let role = present(req.role.as_deref()).map(parse_role).transpose()?;
    if let Some(email) = &email {
        if !is_valid_email(email) {
            return Err(AppError::Validation(vec!["email".to_string()]));
        }
    }

    if let Some(email) = email.filter(|e| *e != user.email) {
        if let Some(other) = store.find_by_email(&email).await? {
            if other.id != user.id {
                warn!(user_id = id, email = %email, "email already in use");
                return Err(AppError::DuplicateEmail);
            }
        }
        user.email = email;
    }

    if let Some(password) = req.password.as_deref().filter(|p| !p.is_empty()) {
        user.password_hash = hash_password(password)?;
    }

    if let Some(role) = role {
        user.role = role;
    }

    let updated = store.update(&user).await?.ok_or(AppError::NotFound)?;
    info!(user_id = updated.id, "user updated");
    Ok(updated.into())
}

/// Hard delete. The acting user can never remove their own account.
#[instrument(skip(store))]
pub async fn delete_user(store: &dyn UserStore, id: i64, actor_id: i64) -> Result<(), AppError> {
    store.find_by_id(id).await?.ok_or(AppError::NotFound)?;

    if id == actor_id {
        warn!(user_id = id, "self delete rejected");
        return Err(AppError::ForbiddenSelfDelete);
    }

    if !store.delete(id).await? {
        return Err(AppError::NotFound);
    }
    info!(user_id = id, actor_id, "user deleted");
    Ok(())
}

#[instrument(skip(store))]
pub async fn list_users(store: &dyn UserStore, p: &Pagination) -> Result<UserPage, AppError> {
    let (page, page_size) = p.normalized();
    // A page whose offset does not fit in i64 is past the end anyway.
    let (users, total_users) = match page
        .checked_sub(1)
        .and_then(|prev| prev.checked_mul(page_size))
    {
        Some(offset) => store.list(page_size, offset).await?,
        None => (Vec::new(), store.list(0, 0).await?.1),
    };

    let total_pages = if total_users == 0 {
        0
    } else {
        (total_users - 1) / page_size + 1
    };
    Ok(UserPage {
        users: users.into_iter().map(PublicUser::from).collect(),
        total_users,
        current_page: page,
        total_pages,
        has_next_page: page < total_pages,
        has_prev_page: page > 1,
    })
}

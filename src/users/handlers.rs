use axum::{
    extract::State,
    http::StatusCode,
    middleware,
    routing::{get, post, put},
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::guard::{enforce, AccessChain, Identity},
    error::AppError,
    extractors::{JsonBody, PathParam, QueryParams},
    state::AppState,
    users::{
        dto::{CreateUserRequest, Pagination, PublicUser, UpdateUserRequest, UserPage},
        services,
    },
};

/// `GET /user/:id` needs a token; every other route also needs the admin role.
pub fn user_routes(state: &AppState) -> Router<AppState> {
    let authenticated = AccessChain::authenticated(state.keys.clone());
    let admin = AccessChain::admin(state.keys.clone());

    let read = Router::new()
        .route("/user/:id", get(get_user))
        .route_layer(middleware::from_fn_with_state(authenticated, enforce));

    let write = Router::new()
        .route("/user", post(create_user))
        .route("/user/:id", put(update_user).delete(delete_user))
        .route("/users", get(list_users))
        .route_layer(middleware::from_fn_with_state(admin, enforce));

    read.merge(write)
}

#[instrument(skip(state, caller), fields(caller = caller.user_id))]
pub async fn get_user(
    State(state): State<AppState>,
    caller: Identity,
    PathParam(id): PathParam<i64>,
) -> Result<Json<PublicUser>, AppError> {
    let user = services::get_user(state.store.as_ref(), id).await?;
    Ok(Json(user))
}

#[instrument(skip(state, caller, payload), fields(caller = caller.user_id))]
pub async fn create_user(
    State(state): State<AppState>,
    caller: Identity,
    JsonBody(payload): JsonBody<CreateUserRequest>,
) -> Result<(StatusCode, Json<PublicUser>), AppError> {
    let user = services::create_user(state.store.as_ref(), payload).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

#[instrument(skip(state, caller, payload), fields(caller = caller.user_id))]
pub async fn update_user(
    State(state): State<AppState>,
    caller: Identity,
    PathParam(id): PathParam<i64>,
    JsonBody(payload): JsonBody<UpdateUserRequest>,
) -> Result<Json<PublicUser>, AppError> {
    let user = services::update_user(state.store.as_ref(), id, payload).await?;
    Ok(Json(user))
}

#[instrument(skip(state, caller), fields(caller = caller.user_id))]
pub async fn delete_user(
    State(state): State<AppState>,
    caller: Identity,
    PathParam(id): PathParam<i64>,
) -> Result<StatusCode, AppError> {
    services::delete_user(state.store.as_ref(), id, caller.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state, caller), fields(caller = caller.user_id))]
pub async fn list_users(
    State(state): State<AppState>,
    caller: Identity,
    QueryParams(p): QueryParams<Pagination>,
) -> Result<Json<UserPage>, AppError> {
    let page = services::list_users(state.store.as_ref(), &p).await?;
    Ok(Json(page))
}

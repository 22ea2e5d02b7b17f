//! Access control for protected routes.
//!
//! A route is guarded by an [`AccessChain`]: an ordered list of [`Check`]s
//! evaluated front to back by one middleware. The builder only offers
//! `require_role` after `authenticate`, so a role check can never run
//! without an identity in place.

use std::marker::PhantomData;
use std::sync::Arc;

use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use tracing::{debug, warn};

use crate::{
    auth::{claims::Claims, jwt::JwtKeys},
    error::AppError,
    users::repo_types::Role,
};

/// Caller identity taken from a verified token. Inserted into request
/// extensions by the authenticate check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: i64,
    pub email: String,
    pub role: Role,
}

impl Identity {
    fn from_claims(claims: Claims) -> Option<Self> {
        Some(Self {
            user_id: claims.user_id()?,
            email: claims.email,
            role: claims.role,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Check {
    Authenticate,
    RequireRole(Role),
}

/// Admin passes every role requirement, user passes only its own.
fn satisfies(actual: Role, required: Role) -> bool {
    actual == Role::Admin || actual == required
}

/// Builder stage before `authenticate`.
pub struct Anonymous;
/// Builder stage after `authenticate`.
pub struct Authenticated;

pub struct ChainBuilder<Stage> {
    keys: JwtKeys,
    checks: Vec<Check>,
    _stage: PhantomData<Stage>,
}

impl ChainBuilder<Anonymous> {
    pub fn authenticate(mut self) -> ChainBuilder<Authenticated> {
        self.checks.push(Check::Authenticate);
        ChainBuilder {
            keys: self.keys,
            checks: self.checks,
            _stage: PhantomData,
        }
    }
}

impl ChainBuilder<Authenticated> {
    pub fn require_role(mut self, role: Role) -> Self {
        self.checks.push(Check::RequireRole(role));
        self
    }

    pub fn build(self) -> AccessChain {
        AccessChain {
            keys: self.keys,
            checks: self.checks.into(),
        }
    }
}

#[derive(Clone)]
pub struct AccessChain {
    keys: JwtKeys,
    checks: Arc<[Check]>,
}

impl AccessChain {
    pub fn builder(keys: JwtKeys) -> ChainBuilder<Anonymous> {
        ChainBuilder {
            keys,
            checks: Vec::new(),
            _stage: PhantomData,
        }
    }

    /// Token required.
    pub fn authenticated(keys: JwtKeys) -> Self {
        Self::builder(keys).authenticate().build()
    }

    /// Token required and the caller must be an admin.
    pub fn admin(keys: JwtKeys) -> Self {
        Self::builder(keys)
            .authenticate()
            .require_role(Role::Admin)
            .build()
    }

    pub fn checks(&self) -> &[Check] {
        &self.checks
    }

    /// Runs every check in order, stopping at the first failure.
    pub fn evaluate(&self, headers: &HeaderMap) -> Result<Option<Identity>, AppError> {
        let mut identity: Option<Identity> = None;
        for check in self.checks.iter() {
            match *check {
                Check::Authenticate => {
                    let token = bearer_token(headers).ok_or(AppError::Unauthorized)?;
                    let claims = self.keys.verify(token).map_err(|e| {
                        debug!(error = %e, "token rejected");
                        AppError::Unauthorized
                    })?;
                    identity = Some(Identity::from_claims(claims).ok_or(AppError::Unauthorized)?);
                }
                Check::RequireRole(required) => {
                    let who = identity.as_ref().ok_or(AppError::Unauthorized)?;
                    if !satisfies(who.role, required) {
                        warn!(user_id = who.user_id, role = %who.role, required = %required, "role check failed");
                        return Err(AppError::Forbidden);
                    }
                }
            }
        }
        Ok(identity)
    }
}

/// Returns the token of an `Authorization: Bearer <token>` header.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Middleware running an [`AccessChain`]. Attach with
/// `middleware::from_fn_with_state(chain, enforce)`.
pub async fn enforce(
    State(chain): State<AccessChain>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    if let Some(identity) = chain.evaluate(req.headers())? {
        req.extensions_mut().insert(identity);
    }
    Ok(next.run(req).await)
}

#[async_trait]
impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Identity>()
            .cloned()
            .ok_or(AppError::Unauthorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JwtConfig;
    use axum::http::HeaderValue;
    use time::Duration;

    fn keys() -> JwtKeys {
        JwtKeys::from_config(&JwtConfig {
            secret: "guard-secret".into(),
            issuer: "iss".into(),
            audience: "aud".into(),
            ttl_minutes: 10,
        })
    }

    fn headers_with(value: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        h
    }

    #[test]
    fn builder_orders_authenticate_first() {
        let chain = AccessChain::admin(keys());
        assert_eq!(
            chain.checks(),
            &[Check::Authenticate, Check::RequireRole(Role::Admin)]
        );
    }

    #[test]
    fn missing_header_is_unauthorized() {
        let chain = AccessChain::authenticated(keys());
        let err = chain.evaluate(&HeaderMap::new()).unwrap_err();
        assert!(matches!(err, AppError::Unauthorized));
    }

    #[test]
    fn wrong_scheme_is_unauthorized() {
        let k = keys();
        let token = k.issue_access(1, "a@x.com", Role::User).unwrap();
        let chain = AccessChain::authenticated(k);
        let err = chain
            .evaluate(&headers_with(&format!("Basic {token}")))
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized));
    }

    #[test]
    fn valid_token_yields_identity() {
        let k = keys();
        let token = k.issue_access(5, "a@x.com", Role::User).unwrap();
        let chain = AccessChain::authenticated(k);
        let identity = chain
            .evaluate(&headers_with(&format!("Bearer {token}")))
            .unwrap()
            .expect("identity");
        assert_eq!(
            identity,
            Identity {
                user_id: 5,
                email: "a@x.com".into(),
                role: Role::User
            }
        );
    }

    #[test]
    fn expired_token_is_unauthorized() {
        let k = keys();
        let token = k
            .issue(5, "a@x.com", Role::Admin, Duration::seconds(-5))
            .unwrap();
        let chain = AccessChain::admin(k);
        let err = chain
            .evaluate(&headers_with(&format!("Bearer {token}")))
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized));
    }

    #[test]
    fn user_role_is_forbidden_on_admin_chain() {
        let k = keys();
        let token = k.issue_access(5, "a@x.com", Role::User).unwrap();
        let chain = AccessChain::admin(k);
        let err = chain
            .evaluate(&headers_with(&format!("Bearer {token}")))
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden));
    }

    #[test]
    fn admin_role_passes_admin_chain() {
        let k = keys();
        let token = k.issue_access(9, "root@x.com", Role::Admin).unwrap();
        let chain = AccessChain::admin(k);
        let identity = chain
            .evaluate(&headers_with(&format!("bearer {token}")))
            .unwrap()
            .expect("identity");
        assert_eq!(identity.role, Role::Admin);
    }

    #[test]
    fn admin_satisfies_user_requirement() {
        assert!(satisfies(Role::Admin, Role::User));
        assert!(satisfies(Role::User, Role::User));
        assert!(!satisfies(Role::User, Role::Admin));
    }
}

use axum::extract::FromRef;
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use thiserror::Error;
use time::{Duration, OffsetDateTime};
use tracing::debug;

use crate::{auth::claims::Claims, config::JwtConfig, state::AppState, users::repo_types::Role};

/// The only signing algorithm accepted.
const ALGORITHM: Algorithm = Algorithm::HS256;

#[derive(Debug, Error)]
pub enum JwtError {
    #[error("failed to sign token: {0}")]
    Encoding(#[source] jsonwebtoken::errors::Error),

    #[error("invalid token signature")]
    InvalidSignature,

    #[error("token has expired")]
    Expired,

    #[error("malformed token")]
    Malformed,

    #[error("unexpected signing algorithm")]
    UnexpectedAlgorithm,
}

/// Signing and verification keys, built once from [`JwtConfig`].
#[derive(Clone)]
pub struct JwtKeys {
    pub encoding: EncodingKey,
    pub decoding: DecodingKey,
    pub issuer: String,
    pub audience: String,
    pub access_ttl: Duration,
}

impl JwtKeys {
    pub fn from_config(cfg: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
            access_ttl: Duration::minutes(cfg.ttl_minutes),
        }
    }

    pub fn issue(
        &self,
        user_id: i64,
        email: &str,
        role: Role,
        ttl: Duration,
    ) -> Result<String, JwtError> {
        let now = OffsetDateTime::now_utc();
        let exp = now + ttl;
        let claims = Claims {
            sub: user_id.to_string(),
            email: email.to_string(),
            role,
            iat: now.unix_timestamp().max(0) as usize,
            exp: exp.unix_timestamp().max(0) as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };
        let token =
            encode(&Header::new(ALGORITHM), &claims, &self.encoding).map_err(JwtError::Encoding)?;
        debug!(user_id, role = %role, "jwt signed");
        Ok(token)
    }

    /// Issues a token with the configured access TTL.
    pub fn issue_access(&self, user_id: i64, email: &str, role: Role) -> Result<String, JwtError> {
        self.issue(user_id, email, role, self.access_ttl)
    }

    pub fn verify(&self, token: &str) -> Result<Claims, JwtError> {
        let mut validation = Validation::new(ALGORITHM);
        validation.leeway = 0;
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        validation.set_required_spec_claims(&["exp", "sub", "iss", "aud"]);

        let data = decode::<Claims>(token, &self.decoding, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => JwtError::Expired,
                ErrorKind::InvalidSignature => JwtError::InvalidSignature,
                ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => {
                    JwtError::UnexpectedAlgorithm
                }
                _ => JwtError::Malformed,
            }
        })?;

        if data.claims.user_id().is_none() {
            return Err(JwtError::Malformed);
        }
        debug!(sub = %data.claims.sub, role = %data.claims.role, "jwt verified");
        Ok(data.claims)
    }
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        state.keys.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_keys(secret: &str, issuer: &str, audience: &str) -> JwtKeys {
        JwtKeys::from_config(&JwtConfig {
            secret: secret.into(),
            issuer: issuer.into(),
            audience: audience.into(),
            ttl_minutes: 10,
        })
    }

    #[test]
    fn issue_and_verify_access_token() {
        let keys = make_keys("dev-secret", "test-issuer", "test-aud");
        let token = keys
            .issue_access(42, "a@x.com", Role::Admin)
            .expect("sign access");
        let claims = keys.verify(&token).expect("verify token");
        assert_eq!(claims.user_id(), Some(42));
        assert_eq!(claims.email, "a@x.com");
        assert_eq!(claims.role, Role::Admin);
        assert_eq!(claims.iss, "test-issuer");
        assert_eq!(claims.aud, "test-aud");
        assert_eq!(claims.exp - claims.iat, 600);
    }

    #[test]
    fn expired_token_is_rejected() {
        let keys = make_keys("dev-secret", "iss", "aud");
        let token = keys
            .issue(1, "a@x.com", Role::User, Duration::seconds(-30))
            .expect("sign");
        assert!(matches!(keys.verify(&token), Err(JwtError::Expired)));
    }

    #[test]
    fn wrong_secret_is_invalid_signature() {
        let keys = make_keys("secret-one", "iss", "aud");
        let other = make_keys("secret-two", "iss", "aud");
        let token = keys.issue_access(1, "a@x.com", Role::User).unwrap();
        assert!(matches!(other.verify(&token), Err(JwtError::InvalidSignature)));
    }

    #[test]
    fn other_algorithm_is_rejected() {
        let keys = make_keys("dev-secret", "iss", "aud");
        let claims = Claims {
            sub: "1".into(),
            email: "a@x.com".into(),
            role: Role::Admin,
            iat: OffsetDateTime::now_utc().unix_timestamp() as usize,
            exp: (OffsetDateTime::now_utc() + Duration::minutes(5)).unix_timestamp() as usize,
            iss: "iss".into(),
            aud: "aud".into(),
        };
        let token = encode(
            &Header::new(Algorithm::HS512),
            &claims,
            &EncodingKey::from_secret(b"dev-secret"),
        )
        .unwrap();
        assert!(matches!(
            keys.verify(&token),
            Err(JwtError::UnexpectedAlgorithm)
        ));
    }

    #[test]
    fn garbage_is_malformed() {
        let keys = make_keys("dev-secret", "iss", "aud");
        assert!(matches!(keys.verify("not.a.jwt"), Err(JwtError::Malformed)));
        assert!(matches!(keys.verify(""), Err(JwtError::Malformed)));
    }

    #[test]
    fn wrong_issuer_or_audience_is_rejected() {
        let good = make_keys("same-secret", "good-iss", "good-aud");
        let bad = make_keys("same-secret", "bad-iss", "bad-aud");
        let token = good.issue_access(7, "a@x.com", Role::User).unwrap();
        assert!(bad.verify(&token).is_err());
    }
}

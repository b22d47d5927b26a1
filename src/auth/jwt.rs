use std::time::Duration;

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    auth::repo_types::{Role, User},
    config::JwtConfig,
    error::ApiError,
    state::AppState,
};

/// Session-token claims. `email_verified` makes the token's scope explicit:
/// an unverified account carries a token that the `VerifiedUser` extractor
/// rejects, so protected routes cannot be reached before verification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub exp: usize,
    pub iat: usize,
    pub iss: String,
    pub aud: String,
    pub email_verified: bool,
    pub role: Role,
}

#[derive(Clone)]
pub struct JwtKeys {
    pub encoding: EncodingKey,
    pub decoding: DecodingKey,
    pub issuer: String,
    pub audience: String,
    pub ttl: Duration,
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        let JwtConfig {
            secret,
            issuer,
            audience,
            ttl_minutes,
        } = state.config.jwt.clone();
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            issuer,
            audience,
            ttl: Duration::from_secs((ttl_minutes as u64) * 60),
        }
    }
}

impl JwtKeys {
    /// Signs a session token reflecting the user's current verification
    /// state. Verify-OTP reissues so the fresh claims carry
    /// `email_verified: true`.
    pub fn sign(&self, user: &User) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let exp = now + TimeDuration::seconds(self.ttl.as_secs() as i64);
        let claims = Claims {
            sub: user.id,
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            email_verified: user.is_email_verified,
            role: user.role,
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        debug!(user_id = %user.id, verified = user.is_email_verified, "jwt signed");
        Ok(token)
    }

    pub fn verify(&self, token: &str) -> anyhow::Result<Claims> {
        let mut validation = Validation::default();
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        debug!(user_id = %data.claims.sub, "jwt verified");
        Ok(data.claims)
    }
}

fn bearer_claims<S>(parts: &mut Parts, state: &S) -> Result<Claims, ApiError>
where
    JwtKeys: FromRef<S>,
{
    let keys = JwtKeys::from_ref(state);
    let auth_header = parts
        .headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::unauthorized("Missing Authorization header"))?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| ApiError::unauthorized("Invalid Authorization header"))?;

    keys.verify(token).map_err(|_| {
        warn!("invalid or expired token");
        ApiError::unauthorized("Invalid or expired token")
    })
}

/// Any authenticated caller, verified or not. Verify-OTP and resend-OTP run
/// under this.
pub struct AuthUser(pub Claims);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        bearer_claims(parts, state).map(AuthUser)
    }
}

/// Authenticated caller whose token was issued after email verification.
pub struct VerifiedUser(pub Claims);

#[async_trait]
impl<S> FromRequestParts<S> for VerifiedUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let claims = bearer_claims(parts, state)?;
        if !claims.email_verified {
            return Err(ApiError::forbidden("Email verification required"));
        }
        Ok(VerifiedUser(claims))
    }
}

/// Optional bearer; used where an anonymous caller is fine but an
/// authenticated one changes behavior (cross-account reset refusal).
/// A malformed or expired token is treated as anonymous.
pub struct MaybeAuthUser(pub Option<Claims>);

#[async_trait]
impl<S> FromRequestParts<S> for MaybeAuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeAuthUser(bearer_claims(parts, state).ok()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn make_keys() -> JwtKeys {
        JwtKeys::from_ref(&AppState::fake())
    }

    fn make_user(verified: bool) -> User {
        User {
            id: Uuid::new_v4(),
            email: "a@x.com".into(),
            full_name: "Ann A".into(),
            role: Role::Student,
            password_hash: "$argon2id$fake".into(),
            is_active: true,
            is_email_verified: verified,
            otp_hash: None,
            otp_expires_at: None,
            reset_token_hash: None,
            reset_expires_at: None,
            created_at: OffsetDateTime::now_utc(),
            last_login: None,
        }
    }

    fn parts_with_bearer(token: &str) -> Parts {
        let req = Request::builder()
            .header(axum::http::header::AUTHORIZATION, format!("Bearer {token}"))
            .body(())
            .expect("request");
        req.into_parts().0
    }

    #[tokio::test]
    async fn sign_and_verify_roundtrip() {
        let keys = make_keys();
        let user = make_user(true);
        let token = keys.sign(&user).expect("sign");
        let claims = keys.verify(&token).expect("verify");
        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.iss, "test-issuer");
        assert_eq!(claims.aud, "test-aud");
        assert!(claims.email_verified);
        assert_eq!(claims.role, Role::Student);
    }

    #[tokio::test]
    async fn unverified_user_gets_unverified_claims() {
        let keys = make_keys();
        let token = keys.sign(&make_user(false)).expect("sign");
        let claims = keys.verify(&token).expect("verify");
        assert!(!claims.email_verified);
    }

    #[tokio::test]
    async fn auth_user_accepts_unverified_token() {
        let state = AppState::fake();
        let keys = JwtKeys::from_ref(&state);
        let token = keys.sign(&make_user(false)).expect("sign");
        let mut parts = parts_with_bearer(&token);
        let result = AuthUser::from_request_parts(&mut parts, &state).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn verified_user_rejects_unverified_token() {
        let state = AppState::fake();
        let keys = JwtKeys::from_ref(&state);
        let token = keys.sign(&make_user(false)).expect("sign");
        let mut parts = parts_with_bearer(&token);
        let err = VerifiedUser::from_request_parts(&mut parts, &state)
            .await
            .err()
            .expect("should reject");
        assert_eq!(err.status(), axum::http::StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn verified_user_accepts_verified_token() {
        let state = AppState::fake();
        let keys = JwtKeys::from_ref(&state);
        let token = keys.sign(&make_user(true)).expect("sign");
        let mut parts = parts_with_bearer(&token);
        assert!(VerifiedUser::from_request_parts(&mut parts, &state)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn maybe_auth_user_is_none_without_header() {
        let state = AppState::fake();
        let mut parts = Request::builder()
            .body(())
            .expect("request")
            .into_parts()
            .0;
        let MaybeAuthUser(claims) = MaybeAuthUser::from_request_parts(&mut parts, &state)
            .await
            .expect("infallible");
        assert!(claims.is_none());
    }

    #[tokio::test]
    async fn maybe_auth_user_treats_garbage_token_as_anonymous() {
        let state = AppState::fake();
        let mut parts = parts_with_bearer("garbage");
        let MaybeAuthUser(claims) = MaybeAuthUser::from_request_parts(&mut parts, &state)
            .await
            .expect("infallible");
        assert!(claims.is_none());
    }

    #[tokio::test]
    async fn missing_header_is_unauthorized() {
        let state = AppState::fake();
        let mut parts = Request::builder()
            .body(())
            .expect("request")
            .into_parts()
            .0;
        let err = AuthUser::from_request_parts(&mut parts, &state)
            .await
            .err()
            .expect("should reject");
        assert_eq!(err.status(), axum::http::StatusCode::UNAUTHORIZED);
    }
}

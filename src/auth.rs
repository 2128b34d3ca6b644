use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use jsonwebtoken::{DecodingKey, Validation, decode, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    config::{AppConfig, Env},
    error::AppError,
    policy::Viewer,
    repository::RepositoryState,
};

/// Claims
///
/// The JWT payload issued by the identity provider. Only `sub` and `exp` matter here.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// The user's UUID, the primary key of the `users` table.
    pub sub: Uuid,
    /// Expiration time; expired tokens are rejected.
    pub exp: usize,
    pub iat: usize,
}

/// AuthUser
///
/// The resolved identity of an authenticated request.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub username: String,
    /// `"author"` or `"admin"`.
    pub role: String,
}

impl AuthUser {
    pub fn viewer(&self) -> Viewer {
        Viewer::User(self.id)
    }

    pub fn is_admin(&self) -> bool {
        self.role == "admin"
    }
}

/// Path and query of the request, used as the `next` target of the login redirect.
fn return_target(parts: &Parts) -> String {
    parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| parts.uri.path().to_string())
}

/// AuthUser Extractor Implementation
///
/// 1. Local bypass: in `Env::Local`, an `x-user-id` header naming an existing user is accepted.
/// 2. Bearer token extraction and JWT validation (signature and expiry).
/// 3. User lookup, so tokens of deleted users stop working.
///
/// Rejection: `AppError::LoginRequired`, which redirects to the login URL with the original
/// path as `next`. Repository failures surface as `AppError::Repository`.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let repo = RepositoryState::from_ref(state);
        let config = AppConfig::from_ref(state);

        let login_required = || AppError::LoginRequired {
            redirect_to: config.login_redirect(&return_target(parts)),
        };

        // Local development bypass.
        if config.env == Env::Local {
            let bypass_id = parts
                .headers
                .get("x-user-id")
                .and_then(|value| value.to_str().ok())
                .and_then(|value| Uuid::parse_str(value).ok());
            if let Some(user_id) = bypass_id {
                if let Some(user) = repo.get_user(user_id).await? {
                    return Ok(AuthUser {
                        id: user.id,
                        username: user.username,
                        role: user.role,
                    });
                }
            }
        }

        let Some(token) = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
        else {
            return Err(login_required());
        };

        let decoding_key = DecodingKey::from_secret(config.jwt_secret.as_bytes());
        let mut validation = Validation::default();
        validation.validate_exp = true;

        let token_data = match decode::<Claims>(token, &decoding_key, &validation) {
            Ok(data) => data,
            Err(e) => {
                match e.kind() {
                    ErrorKind::ExpiredSignature => tracing::debug!("expired token"),
                    kind => tracing::debug!(?kind, "rejected token"),
                }
                return Err(login_required());
            }
        };

        // A valid token for a user that no longer exists is treated as anonymous.
        let user = repo
            .get_user(token_data.claims.sub)
            .await?
            .ok_or_else(login_required)?;

        Ok(AuthUser {
            id: user.id,
            username: user.username,
            role: user.role,
        })
    }
}

/// Viewer Extractor Implementation
///
/// Resolves the optional identity for public routes: any request that would be redirected to
/// login is simply anonymous.
impl<S> FromRequestParts<S> for Viewer
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match AuthUser::from_request_parts(parts, state).await {
            Ok(user) => Ok(user.viewer()),
            Err(AppError::LoginRequired { .. }) => Ok(Viewer::Anonymous),
            Err(e) => Err(e),
        }
    }
}

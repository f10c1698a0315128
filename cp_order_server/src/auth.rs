//! Bearer token validation.
//!
//! Tokens are HS256 JWTs carrying the user id in `sub` and the granted roles in `roles`. This server never runs a login
//! flow; it only validates tokens minted by the identity service that shares `CP_JWT_SECRET`.
use std::future::{ready, Ready};

use actix_web::{dev::Payload, FromRequest, HttpMessage, HttpRequest};
use chrono::{Duration, Utc};
use cp_order_engine::db_types::Role;
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use log::*;
use serde::{Deserialize, Serialize};

use crate::{
    config::AuthConfig,
    errors::{AuthError, ServerError},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtClaims {
    /// The user id
    pub sub: String,
    pub roles: Vec<Role>,
    pub exp: i64,
}

impl JwtClaims {
    pub fn new<S: Into<String>>(user_id: S, roles: Vec<Role>, valid_for: Duration) -> Self {
        Self { sub: user_id.into(), roles, exp: (Utc::now() + valid_for).timestamp() }
    }

    pub fn user_id(&self) -> &str {
        self.sub.as_str()
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.iter().any(|r| r.grants(role))
    }

    pub fn is_staff(&self) -> bool {
        self.has_role(Role::Staff)
    }
}

/// Claims are placed in the request extensions by [`crate::middleware::JwtMiddlewareFactory`].
impl FromRequest for JwtClaims {
    type Error = ServerError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let claims = req.extensions().get::<JwtClaims>().cloned().ok_or_else(|| {
            warn!("💻️ No JWT claims found in request extensions");
            ServerError::AuthenticationError(AuthError::MissingToken)
        });
        ready(claims)
    }
}

#[derive(Clone)]
pub struct TokenValidator {
    key: DecodingKey,
    validation: Validation,
}

impl TokenValidator {
    pub fn new(config: &AuthConfig) -> Self {
        let key = DecodingKey::from_secret(config.jwt_secret.reveal().as_bytes());
        let validation = Validation::new(Algorithm::HS256);
        Self { key, validation }
    }

    pub fn validate(&self, token: &str) -> Result<JwtClaims, AuthError> {
        let data = decode::<JwtClaims>(token, &self.key, &self.validation).map_err(|e| match e.kind() {
            ErrorKind::InvalidToken | ErrorKind::Base64(_) | ErrorKind::Json(_) | ErrorKind::Utf8(_) => {
                AuthError::PoorlyFormattedToken(e.to_string())
            },
            _ => AuthError::ValidationError(e.to_string()),
        })?;
        trace!("💻️ Access token validated for {}", data.claims.sub);
        Ok(data.claims)
    }
}

/// Mints access tokens. The server itself only needs this in tests and in developer tooling.
pub struct TokenIssuer {
    key: EncodingKey,
}

impl TokenIssuer {
    pub fn new(config: &AuthConfig) -> Self {
        Self { key: EncodingKey::from_secret(config.jwt_secret.reveal().as_bytes()) }
    }

    pub fn issue_token(&self, claims: &JwtClaims) -> Result<String, AuthError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.key).map_err(|e| AuthError::ValidationError(e.to_string()))
    }
}

// Bearer-token identity: the subject id is the token's `sub` claim
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use std::sync::Arc;

use crate::error::GenerationError;
use crate::models::auth::Claims;
use crate::state::AppState;

#[derive(Clone)]
pub struct IdentityVerifier {
    key: Option<DecodingKey>,
    validation: Validation,
}

impl IdentityVerifier {
    /// Without a secret every request is anonymous
    pub fn new(secret: Option<&str>) -> Self {
        Self {
            key: secret.map(|s| DecodingKey::from_secret(s.as_bytes())),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.key.is_some()
    }

    pub fn verify(&self, token: &str) -> Result<Claims, GenerationError> {
        let key = self
            .key
            .as_ref()
            .ok_or_else(|| GenerationError::Unauthorized("Identity verification is not configured".to_string()))?;

        decode::<Claims>(token, key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::warn!("JWT verification failed: {}", e);
                GenerationError::Unauthorized("Invalid or expired token".to_string())
            })
    }

    /// `Ok(None)` when no credentials were presented
    pub fn subject_from_headers(&self, headers: &HeaderMap) -> Result<Option<String>, GenerationError> {
        let Some(header) = headers.get(AUTHORIZATION) else {
            return Ok(None);
        };
        if !self.is_enabled() {
            tracing::debug!("Authorization header ignored, JWT_SECRET not configured");
            return Ok(None);
        }

        let value = header
            .to_str()
            .map_err(|_| GenerationError::Unauthorized("Invalid Authorization header format".to_string()))?;
        let token = value.strip_prefix("Bearer ").ok_or_else(|| {
            GenerationError::Unauthorized("Invalid Authorization header format. Expected 'Bearer <token>'".to_string())
        })?;

        let claims = self.verify(token.trim())?;
        Ok(Some(claims.sub))
    }
}

fn app_state(parts: &Parts) -> Result<Arc<AppState>, GenerationError> {
    parts
        .extensions
        .get::<Arc<AppState>>()
        .cloned()
        .ok_or_else(|| GenerationError::Internal("application state is not installed".to_string()))
}

/// Caller's subject id, if any credentials were presented
#[derive(Debug, Clone)]
pub struct Identity(pub Option<String>);

#[async_trait]
impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = GenerationError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let state = app_state(parts)?;
        Ok(Identity(state.identity.subject_from_headers(&parts.headers)?))
    }
}

/// Caller's subject id; rejects anonymous requests with 401
#[derive(Debug, Clone)]
pub struct RequireIdentity(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for RequireIdentity
where
    S: Send + Sync,
{
    type Rejection = GenerationError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let state = app_state(parts)?;
        match state.identity.subject_from_headers(&parts.headers)? {
            Some(subject) => Ok(RequireIdentity(subject)),
            None => Err(GenerationError::Unauthorized("Authentication required".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::auth::Claims;
    use axum::http::HeaderValue;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn token(secret: &str, sub: &str) -> String {
        let claims = Claims {
            sub: sub.to_string(),
            exp: (chrono::Utc::now().timestamp() + 3600) as usize,
            iat: None,
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
    }

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn valid_token_yields_subject() {
        let verifier = IdentityVerifier::new(Some("secret"));
        let subject = verifier
            .subject_from_headers(&headers(&format!("Bearer {}", token("secret", "user_42"))))
            .unwrap();
        assert_eq!(subject.as_deref(), Some("user_42"));
    }

    #[test]
    fn absent_header_is_anonymous() {
        let verifier = IdentityVerifier::new(Some("secret"));
        assert_eq!(verifier.subject_from_headers(&HeaderMap::new()).unwrap(), None);
    }

    #[test]
    fn bad_tokens_are_rejected() {
        let verifier = IdentityVerifier::new(Some("secret"));
        let forged = headers(&format!("Bearer {}", token("other", "user_42")));
        assert!(matches!(verifier.subject_from_headers(&forged), Err(GenerationError::Unauthorized(_))));
        assert!(verifier.subject_from_headers(&headers("Token abc")).is_err());
    }
}

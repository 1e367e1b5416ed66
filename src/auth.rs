/*!
 * Authentication primitives
 * JWT access/refresh tokens, password hashing and bearer extraction
 */
use axum::http::HeaderMap;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::config::AppConfig;
use crate::error::ServiceResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// JWT Claims structure
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String, // Username
    pub kind: TokenKind,
    pub exp: i64,
    pub iat: i64,
}

/// Verified caller identity, passed explicitly into every service call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub username: String,
}

impl Identity {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
        }
    }
}

/// Issues and verifies access and refresh tokens.
#[derive(Clone)]
pub struct TokenService {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            access_encoding: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            access_decoding: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            refresh_encoding: EncodingKey::from_secret(config.refresh_secret.as_bytes()),
            refresh_decoding: DecodingKey::from_secret(config.refresh_secret.as_bytes()),
            access_ttl: Duration::minutes(config.access_token_minutes),
            refresh_ttl: Duration::days(config.refresh_token_days),
        }
    }

    fn issue(&self, username: &str, kind: TokenKind) -> ServiceResult<String> {
        let now = Utc::now();
        let (key, ttl) = match kind {
            TokenKind::Access => (&self.access_encoding, self.access_ttl),
            TokenKind::Refresh => (&self.refresh_encoding, self.refresh_ttl),
        };
        let claims = Claims {
            sub: username.to_string(),
            kind,
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
        };
        Ok(encode(&Header::default(), &claims, key)?)
    }

    pub fn issue_access(&self, username: &str) -> ServiceResult<String> {
        self.issue(username, TokenKind::Access)
    }

    pub fn issue_refresh(&self, username: &str) -> ServiceResult<String> {
        self.issue(username, TokenKind::Refresh)
    }

    /// A token only verifies as the kind it was issued as, so a refresh token
    /// can never stand in for an access token even when the secrets match.
    fn verify(&self, token: &str, kind: TokenKind) -> Option<Identity> {
        let key = match kind {
            TokenKind::Access => &self.access_decoding,
            TokenKind::Refresh => &self.refresh_decoding,
        };
        match decode::<Claims>(token, key, &Validation::default()) {
            Ok(data) if data.claims.kind == kind => Some(Identity::new(data.claims.sub)),
            Ok(_) => {
                tracing::debug!(expected = ?kind, "token kind mismatch");
                None
            }
            Err(e) => {
                tracing::debug!("Token verification failed: {}", e);
                None
            }
        }
    }

    pub fn verify_access(&self, token: &str) -> Option<Identity> {
        self.verify(token, TokenKind::Access)
    }

    pub fn verify_refresh(&self, token: &str) -> Option<Identity> {
        self.verify(token, TokenKind::Refresh)
    }
}

/// Extract bearer token from Authorization header
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Hash a password. bcrypt is CPU-bound; run it off the async executor.
pub async fn hash_password(password: String, cost: u32) -> ServiceResult<String> {
    Ok(tokio::task::spawn_blocking(move || bcrypt::hash(password, cost)).await??)
}

/// Check a password against a stored hash. Malformed hashes never verify.
pub async fn verify_password(password: String, hash: String) -> ServiceResult<bool> {
    Ok(tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash).unwrap_or(false)).await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens() -> TokenService {
        TokenService::new(&AppConfig::default())
    }

    #[test]
    fn test_access_token_round_trip() {
        let svc = tokens();
        let token = svc.issue_access("ada").unwrap();
        assert_eq!(svc.verify_access(&token), Some(Identity::new("ada")));
    }

    #[test]
    fn test_refresh_token_is_not_an_access_token() {
        let svc = tokens();
        let refresh = svc.issue_refresh("ada").unwrap();
        assert!(svc.verify_access(&refresh).is_none());
        assert_eq!(svc.verify_refresh(&refresh), Some(Identity::new("ada")));

        let access = svc.issue_access("ada").unwrap();
        assert!(svc.verify_refresh(&access).is_none());
    }

    #[test]
    fn test_verify_invalid_token_returns_none() {
        assert!(tokens().verify_access("invalid.jwt.token").is_none());
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let config = AppConfig {
            access_token_minutes: -10,
            ..AppConfig::default()
        };
        let svc = TokenService::new(&config);
        let token = svc.issue_access("ada").unwrap();
        assert!(svc.verify_access(&token).is_none());
    }

    #[test]
    fn test_token_signed_with_other_secret_is_rejected() {
        let other = TokenService::new(&AppConfig {
            jwt_secret: "another-secret".to_string(),
            ..AppConfig::default()
        });
        let token = other.issue_access("ada").unwrap();
        assert!(tokens().verify_access(&token).is_none());
    }

    #[test]
    fn test_extract_bearer_token() {
        let mut headers = HeaderMap::new();
        assert!(extract_bearer_token(&headers).is_none());
        headers.insert("authorization", "Bearer abc.def".parse().unwrap());
        assert_eq!(extract_bearer_token(&headers), Some("abc.def"));
        headers.insert("authorization", "Basic abc".parse().unwrap());
        assert!(extract_bearer_token(&headers).is_none());
    }

    #[tokio::test]
    async fn test_password_hash_and_verify() {
        let hash = hash_password("hunter2".to_string(), 4).await.unwrap();
        assert_ne!(hash, "hunter2");
        assert!(verify_password("hunter2".to_string(), hash.clone()).await.unwrap());
        assert!(!verify_password("wrong".to_string(), hash).await.unwrap());
        assert!(!verify_password("x".to_string(), "not-a-hash".to_string())
            .await
            .unwrap());
    }
}

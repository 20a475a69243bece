//! Signed session tokens and team credential hashing.
//!
//! Sessions are HS256 JWTs keyed from `SESSION_SECRET`; `exp` is enforced by
//! `jsonwebtoken::Validation` on every request. Team passwords are stored as
//! argon2id PHC strings.

use std::time::Duration;

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use axum::http::{header, HeaderMap};
use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::error;
use uuid::Uuid;

use crate::error::ApiError;

const SESSION_CONTEXT: &str = "club-leaderboard 2025-01 session token v1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
  Admin,
  Team,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
  pub role: Role,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub team: Option<String>,
  pub iat: i64,
  pub exp: i64,
  pub nonce: Uuid,
}

impl Claims {
  pub fn is_admin(&self) -> bool {
    self.role == Role::Admin
  }

  pub fn expires_at(&self) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(self.exp, 0)
  }
}

#[derive(Clone)]
pub struct SessionSigner {
  encoding: EncodingKey,
  decoding: DecodingKey,
  validation: Validation,
  ttl: chrono::Duration,
}

impl SessionSigner {
  pub fn new(secret: &str, ttl: Duration) -> Self {
    let key = blake3::derive_key(SESSION_CONTEXT, secret.as_bytes());
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;
    Self {
      encoding: EncodingKey::from_secret(&key),
      decoding: DecodingKey::from_secret(&key),
      validation,
      ttl: chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::hours(1)),
    }
  }

  pub fn issue_admin(&self, now: DateTime<Utc>) -> Result<(String, Claims), ApiError> {
    self.issue(Role::Admin, None, now)
  }

  pub fn issue_team(&self, team: &str, now: DateTime<Utc>) -> Result<(String, Claims), ApiError> {
    self.issue(Role::Team, Some(team.to_string()), now)
  }

  fn issue(&self, role: Role, team: Option<String>, now: DateTime<Utc>) -> Result<(String, Claims), ApiError> {
    let claims = Claims {
      role,
      team,
      iat: now.timestamp(),
      exp: (now + self.ttl).timestamp(),
      nonce: Uuid::new_v4(),
    };
    let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding).map_err(|e| {
      error!(error = %e, "failed to sign session token");
      ApiError::Internal("Failed to issue session".into())
    })?;
    Ok((token, claims))
  }

  /// Check signature and expiry. Any failure is a plain 401.
  pub fn verify(&self, token: &str) -> Result<Claims, ApiError> {
    let claims = match decode::<Claims>(token, &self.decoding, &self.validation) {
      Ok(data) => data.claims,
      Err(e) if matches!(e.kind(), ErrorKind::ExpiredSignature) => {
        return Err(ApiError::Unauthorized("Session expired".into()));
      }
      Err(_) => return Err(ApiError::unauthorized()),
    };
    if claims.role == Role::Team && claims.team.is_none() {
      return Err(ApiError::unauthorized());
    }
    Ok(claims)
  }
}

/// Extract a bearer token from the Authorization header.
pub fn bearer(headers: &HeaderMap) -> Option<&str> {
  headers
    .get(header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .and_then(|v| v.strip_prefix("Bearer "))
    .map(str::trim)
    .filter(|t| !t.is_empty())
}

/// Argon2id PHC string with an embedded random salt.
pub fn hash_password(password: &str) -> Result<String, ApiError> {
  let salt = SaltString::encode_b64(Uuid::new_v4().as_bytes()).map_err(|e| {
    error!(error = %e, "failed to encode password salt");
    ApiError::Internal("Failed to hash password".into())
  })?;
  Argon2::default()
    .hash_password(password.as_bytes(), &salt)
    .map(|hash| hash.to_string())
    .map_err(|e| {
      error!(error = %e, "failed to hash password");
      ApiError::Internal("Failed to hash password".into())
    })
}

pub fn verify_password(password: &str, stored: &str) -> bool {
  match PasswordHash::new(stored) {
    Ok(parsed) => Argon2::default()
      .verify_password(password.as_bytes(), &parsed)
      .is_ok(),
    Err(_) => false,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use axum::http::HeaderValue;

  fn signer() -> SessionSigner {
    SessionSigner::new("test-session-secret", Duration::from_secs(3600))
  }

  #[test]
  fn issued_admin_token_verifies() {
    let (token, claims) = signer().issue_admin(Utc::now()).unwrap();
    let verified = signer().verify(&token).unwrap();
    assert_eq!(verified, claims);
    assert!(verified.is_admin());
  }

  #[test]
  fn team_token_carries_team() {
    let (token, _) = signer().issue_team("alpha", Utc::now()).unwrap();
    let claims = signer().verify(&token).unwrap();
    assert_eq!(claims.role, Role::Team);
    assert_eq!(claims.team.as_deref(), Some("alpha"));
  }

  #[test]
  fn expired_token_is_rejected() {
    let issued = Utc::now() - chrono::Duration::hours(2);
    let (token, _) = signer().issue_admin(issued).unwrap();
    assert!(matches!(
      signer().verify(&token),
      Err(ApiError::Unauthorized(msg)) if msg == "Session expired"
    ));
  }

  #[test]
  fn token_from_other_secret_is_rejected() {
    let other = SessionSigner::new("different", Duration::from_secs(3600));
    let (token, _) = other.issue_admin(Utc::now()).unwrap();
    assert!(signer().verify(&token).is_err());
  }

  #[test]
  fn client_cannot_extend_expiry() {
    let (token, mut claims) = signer().issue_team("alpha", Utc::now()).unwrap();
    let (_, signature) = token.rsplit_once('.').unwrap();
    claims.exp += 86_400;
    claims.role = Role::Admin;

    // Same header and payload shape, original signature spliced on.
    let reencoded = encode(&Header::new(Algorithm::HS256), &claims, &EncodingKey::from_secret(b"guess")).unwrap();
    let (unsigned, _) = reencoded.rsplit_once('.').unwrap();
    let forged = format!("{unsigned}.{signature}");
    assert!(signer().verify(&forged).is_err());
  }

  #[test]
  fn malformed_tokens_are_rejected() {
    for token in ["", "abc", "a.b.c", "zz.zz"] {
      assert!(signer().verify(token).is_err());
    }
  }

  #[test]
  fn password_roundtrip_and_salting() {
    let a = hash_password("hunter2").unwrap();
    let b = hash_password("hunter2").unwrap();
    assert_ne!(a, b);
    assert!(a.starts_with("$argon2id$"));
    assert!(verify_password("hunter2", &a));
    assert!(verify_password("hunter2", &b));
    assert!(!verify_password("hunter3", &a));
    assert!(!verify_password("hunter2", "plaintext"));
  }

  #[test]
  fn bearer_extraction() {
    let mut headers = HeaderMap::new();
    assert_eq!(bearer(&headers), None);
    headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic dXNlcjpwYXNz"));
    assert_eq!(bearer(&headers), None);
    headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
    assert_eq!(bearer(&headers), Some("abc.def"));
  }
}

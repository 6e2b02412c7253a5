//! HTTP Basic auth for the operator endpoints.
//!
//! A single operator account is configured at startup. Its password is held
//! only as an argon2 PHC string.

use argon2::{Argon2, PasswordHash, PasswordVerifier};
use axum::{
  extract::FromRequestParts,
  http::{HeaderMap, header::AUTHORIZATION, request::Parts},
};
use base64::{Engine as _, engine::general_purpose::STANDARD as B64};

use crate::{AppState, error::ApiError};

/// The operator account.
#[derive(Clone)]
pub struct AuthConfig {
  pub username:      String,
  /// PHC string produced by argon2, e.g. `$argon2id$v=19$…`
  pub password_hash: String,
}

impl AuthConfig {
  /// Whether `username` and `password` match the operator account. An unset
  /// account accepts nobody.
  pub fn accepts(&self, username: &str, password: &str) -> bool {
    if self.username.is_empty() || username != self.username {
      return false;
    }
    PasswordHash::new(&self.password_hash).is_ok_and(|hash| {
      Argon2::default()
        .verify_password(password.as_bytes(), &hash)
        .is_ok()
    })
  }
}

/// Username and password from a `Basic` authorization header.
fn basic_credentials(headers: &HeaderMap) -> Option<(String, String)> {
  let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
  let encoded = value.strip_prefix("Basic ")?;
  let decoded = String::from_utf8(B64.decode(encoded.trim()).ok()?).ok()?;
  let (username, password) = decoded.split_once(':')?;
  Some((username.to_owned(), password.to_owned()))
}

/// The operator behind an authenticated request. Taking this as a handler
/// argument puts the handler behind auth.
#[derive(Debug, Clone)]
pub struct Operator {
  pub username: String,
}

impl<S, E, D> FromRequestParts<AppState<S, E, D>> for Operator
where
  S: Send + Sync,
  E: Send + Sync,
  D: Send + Sync,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S, E, D>,
  ) -> Result<Self, Self::Rejection> {
    let (username, password) =
      basic_credentials(&parts.headers).ok_or(ApiError::Unauthorized)?;
    if !state.auth.accepts(&username, &password) {
      tracing::warn!(%username, "rejected operator credentials");
      return Err(ApiError::Unauthorized);
    }
    Ok(Operator { username })
  }
}

#[cfg(test)]
mod tests {
  use argon2::{PasswordHasher, password_hash::SaltString};
  use axum::http::HeaderValue;
  use rand_core::OsRng;

  use super::*;

  fn config(password: &str) -> AuthConfig {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
      .hash_password(password.as_bytes(), &salt)
      .unwrap()
      .to_string();
    AuthConfig { username: "admin".to_string(), password_hash: hash }
  }

  fn headers(value: &str) -> HeaderMap {
    let mut map = HeaderMap::new();
    map.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
    map
  }

  #[test]
  fn accepts_only_the_operator() {
    let cfg = config("secret");
    assert!(cfg.accepts("admin", "secret"));
    assert!(!cfg.accepts("admin", "wrong"));
    assert!(!cfg.accepts("root", "secret"));
  }

  #[test]
  fn unset_account_accepts_nobody() {
    let cfg = AuthConfig { username: String::new(), password_hash: String::new() };
    assert!(!cfg.accepts("", ""));

    let cfg = AuthConfig { username: "admin".into(), password_hash: "plaintext".into() };
    assert!(!cfg.accepts("admin", "plaintext"));
  }

  #[test]
  fn parses_basic_header() {
    let value = format!("Basic {}", B64.encode("admin:pa:ss"));
    assert_eq!(
      basic_credentials(&headers(&value)),
      Some(("admin".to_string(), "pa:ss".to_string()))
    );
  }

  #[test]
  fn missing_or_malformed_header() {
    assert_eq!(basic_credentials(&HeaderMap::new()), None);
    assert_eq!(basic_credentials(&headers("Bearer abc")), None);
    assert_eq!(basic_credentials(&headers("Basic !!!not-base64!!!")), None);
    let no_colon = format!("Basic {}", B64.encode("admin"));
    assert_eq!(basic_credentials(&headers(&no_colon)), None);
  }
}

//! HTTP Basic-auth guard for administrative routes.
//!
//! Reads (`GET`, `HEAD`) pass through untouched; every other method needs
//! the configured username and a password matching its argon2 hash.

use std::sync::Arc;

use argon2::{Argon2, PasswordHash, PasswordVerifier};
use axum::{
  extract::{Request, State},
  http::{HeaderMap, Method},
  middleware::Next,
  response::{IntoResponse, Response},
};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64;

use crate::error::{Error, Result};

/// Credentials accepted as valid for this server instance.
#[derive(Clone)]
pub struct AuthConfig {
  pub username:      String,
  /// PHC string produced by argon2, e.g. `$argon2id$v=19$…`
  pub password_hash: String,
}

/// Verify Basic credentials in `headers` against `config`.
pub fn verify_auth(headers: &HeaderMap, config: &AuthConfig) -> Result<()> {
  let header_val = headers
    .get(axum::http::header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .ok_or(Error::Unauthorized)?;

  let encoded = header_val
    .strip_prefix("Basic ")
    .ok_or(Error::Unauthorized)?;

  let decoded = B64.decode(encoded).map_err(|_| Error::Unauthorized)?;
  let creds   = std::str::from_utf8(&decoded).map_err(|_| Error::Unauthorized)?;

  let (username, password) = creds.split_once(':').ok_or(Error::Unauthorized)?;

  if username != config.username {
    return Err(Error::Unauthorized);
  }

  let parsed_hash = PasswordHash::new(&config.password_hash)
    .map_err(|_| Error::Unauthorized)?;

  Argon2::default()
    .verify_password(password.as_bytes(), &parsed_hash)
    .map_err(|_| Error::Unauthorized)?;

  Ok(())
}

/// Middleware: let reads through, require credentials for everything else.
pub async fn require_admin(
  State(config): State<Arc<AuthConfig>>,
  request: Request,
  next: Next,
) -> Response {
  if matches!(*request.method(), Method::GET | Method::HEAD) {
    return next.run(request).await;
  }
  match verify_auth(request.headers(), &config) {
    Ok(()) => next.run(request).await,
    Err(e) => {
      tracing::warn!(
        method = %request.method(),
        path = request.uri().path(),
        "rejected unauthenticated admin request"
      );
      e.into_response()
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use axum::http::{HeaderValue, header};

  fn config(password: &str) -> AuthConfig {
    use argon2::{PasswordHasher, password_hash::SaltString};
    use rand_core::OsRng;
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
      .hash_password(password.as_bytes(), &salt)
      .unwrap()
      .to_string();
    AuthConfig { username: "admin".to_string(), password_hash: hash }
  }

  fn headers(value: &str) -> HeaderMap {
    let mut h = HeaderMap::new();
    h.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
    h
  }

  fn basic(user: &str, pass: &str) -> String {
    let encoded = B64.encode(format!("{user}:{pass}"));
    format!("Basic {encoded}")
  }

  #[test]
  fn correct_credentials() {
    let cfg = config("secret");
    assert!(verify_auth(&headers(&basic("admin", "secret")), &cfg).is_ok());
  }

  #[test]
  fn wrong_password() {
    let cfg = config("secret");
    assert!(matches!(
      verify_auth(&headers(&basic("admin", "wrong")), &cfg),
      Err(Error::Unauthorized)
    ));
  }

  #[test]
  fn wrong_username() {
    let cfg = config("secret");
    assert!(matches!(
      verify_auth(&headers(&basic("root", "secret")), &cfg),
      Err(Error::Unauthorized)
    ));
  }

  #[test]
  fn missing_header() {
    let cfg = config("secret");
    assert!(matches!(
      verify_auth(&HeaderMap::new(), &cfg),
      Err(Error::Unauthorized)
    ));
  }

  #[test]
  fn invalid_base64() {
    let cfg = config("secret");
    assert!(matches!(
      verify_auth(&headers("Basic !!!not-base64!!!"), &cfg),
      Err(Error::Unauthorized)
    ));
  }

  #[test]
  fn password_may_contain_colons() {
    let cfg = config("a:b:c");
    assert!(verify_auth(&headers(&basic("admin", "a:b:c")), &cfg).is_ok());
  }
}

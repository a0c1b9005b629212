// server/src/web/handlers/extractors.rs

use actix_web::{dev::Payload, FromRequest, HttpRequest};
use futures_util::future::{ready, Ready};
use tracing::warn;
use uuid::Uuid;

use crate::errors::AppError;

/// Caller identity taken from the `X-User-ID` header. Authentication itself
/// happens upstream; `X-User-Role: admin` marks operator calls.
#[derive(Debug, Clone, Copy)]
pub struct ActingUser {
  pub user_id: Uuid,
  pub is_admin: bool,
}

impl ActingUser {
  /// Admins may act for anyone; everybody else only for themselves.
  pub fn ensure_self_or_admin(&self, user_id: Uuid) -> Result<(), AppError> {
    if self.is_admin || self.user_id == user_id {
      Ok(())
    } else {
      Err(AppError::Forbidden(format!("user {} may not act for user {}", self.user_id, user_id)))
    }
  }

  pub fn ensure_admin(&self) -> Result<(), AppError> {
    if self.is_admin {
      Ok(())
    } else {
      Err(AppError::Forbidden("operator role required".to_string()))
    }
  }
}

impl FromRequest for ActingUser {
  type Error = AppError;
  type Future = Ready<Result<Self, Self::Error>>;

  fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
    let user_id = req
      .headers()
      .get("X-User-ID")
      .and_then(|h| h.to_str().ok())
      .and_then(|s| Uuid::parse_str(s.trim()).ok());
    let Some(user_id) = user_id else {
      warn!("ActingUser extractor: missing or invalid X-User-ID header.");
      return ready(Err(AppError::Auth("missing or invalid X-User-ID header".to_string())));
    };
    let is_admin = req
      .headers()
      .get("X-User-Role")
      .and_then(|h| h.to_str().ok())
      .is_some_and(|role| role.trim().eq_ignore_ascii_case("admin"));
    ready(Ok(ActingUser { user_id, is_admin }))
  }
}

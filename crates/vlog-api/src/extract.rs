//! Request extractors.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use vlog_models::Entity;

use crate::error::{ApiError, ApiResult};

/// Header the upstream gateway sets to the authenticated user id.
pub const USER_ID_HEADER: &str = "x-user-id";

/// The user a request acts for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActingUser {
    pub uid: String,
}

impl ActingUser {
    /// Reject access to records owned by someone else.
    pub fn ensure_owns<T: Entity>(&self, record: &T) -> ApiResult<()> {
        if record.owner_id() == self.uid {
            Ok(())
        } else {
            Err(ApiError::forbidden(format!(
                "{} {} belongs to another user",
                T::COLLECTION,
                record.id()
            )))
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for ActingUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let uid = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ApiError::unauthorized("missing X-User-Id header"))?;

        Ok(Self { uid: uid.to_string() })
    }
}

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

use crate::errors::AppError;
use crate::progress::Identity;
use crate::schedule::AssignedBy;

pub const PLAYER_HEADER: &str = "x-player-id";
pub const GUEST_HEADER: &str = "x-guest-token";
pub const ADMIN_HEADER: &str = "x-admin-id";

fn header<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Identity supplied by the session layer in front of this service.
/// A registered player id wins over a guest token when both are present.
pub struct RequestIdentity(pub Identity);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for RequestIdentity {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(id) = header(parts, PLAYER_HEADER) {
            return Ok(Self(Identity::Player(id.to_string())));
        }
        if let Some(token) = header(parts, GUEST_HEADER) {
            return Ok(Self(Identity::Guest(token.to_string())));
        }
        Err(AppError::Unauthorized)
    }
}

/// Admin user id, used only to tag schedule assignments. The `system` tag
/// marks selection-policy assignments and cannot be claimed by an admin.
pub struct AdminId(pub String);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for AdminId {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = header(parts, ADMIN_HEADER).ok_or(AppError::Unauthorized)?;
        if id == AssignedBy::System.as_tag() {
            return Err(AppError::Validation(format!(
                "{ADMIN_HEADER} '{id}' is reserved"
            )));
        }
        Ok(Self(id.to_string()))
    }
}

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap},
};

use crate::{error::AppError, models::UserId};

/// Header carrying the caller identity, set by the authentication layer
/// in front of this service
pub const USER_ID_HEADER: &str = "x-user-id";

/// Caller identity if the request is signed in
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<UserId>);

/// Caller identity, rejecting anonymous requests with 401
#[derive(Debug, Clone)]
pub struct CurrentUser(pub UserId);

fn user_from_headers(headers: &HeaderMap) -> Result<Option<UserId>, AppError> {
    let Some(value) = headers.get(USER_ID_HEADER) else {
        return Ok(None);
    };

    let value = value
        .to_str()
        .map_err(|_| AppError::Unauthorized(format!("{} is not valid text", USER_ID_HEADER)))?
        .trim();

    Ok((!value.is_empty()).then(|| UserId::new(value)))
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for MaybeUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(user_from_headers(&parts.headers)?))
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        user_from_headers(&parts.headers)?
            .map(CurrentUser)
            .ok_or_else(|| AppError::Unauthorized("sign in to manage collections".to_string()))
    }
}

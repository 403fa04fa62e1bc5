//! Caller identity from session headers.
//!
//! The upstream session provider forwards the logged-in user as headers. No
//! `x-user-id` means an anonymous caller; the domain decides whether that is
//! allowed.

use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::request::Parts;
use common::{BranchId, CustomerId, EmployeeId, EmployeeRole};
use domain::Caller;

use crate::error::ApiError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_TYPE_HEADER: &str = "x-user-type";
pub const USER_ROLE_HEADER: &str = "x-user-role";
pub const BRANCH_ID_HEADER: &str = "x-branch-id";

const INVALID_SESSION: &str = "Invalid session";

/// The resolved caller of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity(pub Caller);

impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        caller_from_headers(&parts.headers).map(Identity)
    }
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Result<Option<&'a str>, ApiError> {
    match headers.get(name) {
        None => Ok(None),
        Some(value) => value
            .to_str()
            .map(|v| Some(v.trim()))
            .map_err(|_| ApiError::Unauthorized(INVALID_SESSION)),
    }
}

fn positive_id(raw: &str) -> Result<i64, ApiError> {
    raw.parse::<i64>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or(ApiError::Unauthorized(INVALID_SESSION))
}

/// Resolves the caller from identity headers.
pub fn caller_from_headers(headers: &HeaderMap) -> Result<Caller, ApiError> {
    let Some(user_id) = header(headers, USER_ID_HEADER)? else {
        return Ok(Caller::Anonymous);
    };
    let user_id = positive_id(user_id)?;

    match header(headers, USER_TYPE_HEADER)?.map(str::to_ascii_lowercase).as_deref() {
        Some("customer") => Ok(Caller::customer(CustomerId::new(user_id))),
        Some("employee") => {
            let role: EmployeeRole = header(headers, USER_ROLE_HEADER)?
                .ok_or(ApiError::Unauthorized(INVALID_SESSION))?
                .to_ascii_lowercase()
                .parse()
                .map_err(|_| ApiError::Unauthorized(INVALID_SESSION))?;
            let branch_id = header(headers, BRANCH_ID_HEADER)?
                .filter(|raw| !raw.is_empty())
                .map(positive_id)
                .transpose()?
                .map(BranchId::new);
            Ok(Caller::employee(EmployeeId::new(user_id), role, branch_id))
        }
        _ => Err(ApiError::Unauthorized(INVALID_SESSION)),
    }
}

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::auth::cookie::extract_session_token;
use crate::error::AppError;
use crate::services::users;
use crate::state::AppState;

/// Represents the currently authenticated user.
#[derive(Debug, Clone, PartialEq)]
pub struct CurrentUser {
    pub id: String,
    pub name: String,
    pub email: String,
}

/// Why a session could not be resolved to a user.
#[derive(Debug)]
enum SessionFailure {
    NoToken,
    BadToken,
    UnknownUser,
    Server(AppError),
}

impl From<SessionFailure> for AppError {
    fn from(f: SessionFailure) -> Self {
        match f {
            SessionFailure::NoToken => {
                AppError::Unauthenticated("Not authorized, no token".into())
            }
            SessionFailure::BadToken => {
                AppError::Unauthenticated("Not authorized, token failed".into())
            }
            SessionFailure::UnknownUser => AppError::Unauthenticated("User not found".into()),
            SessionFailure::Server(e) => e,
        }
    }
}

fn resolve_session(parts: &Parts, state: &AppState) -> Result<CurrentUser, SessionFailure> {
    let token = extract_session_token(&parts.headers, &state.config.auth.cookie_name)
        .ok_or(SessionFailure::NoToken)?;

    let claims = state.tokens.verify(token).map_err(|e| {
        tracing::debug!("Rejected session token: {}", e);
        SessionFailure::BadToken
    })?;

    let conn = state
        .db
        .get()
        .map_err(|e| SessionFailure::Server(e.into()))?;
    let user = users::find_by_id(&conn, &claims.sub)
        .map_err(|e| SessionFailure::Server(e.into()))?
        .ok_or(SessionFailure::UnknownUser)?;

    Ok(CurrentUser {
        id: user.id,
        name: user.name,
        email: user.email,
    })
}

/// Extractor that requires authentication.
/// Returns 401 if no valid session found.
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        resolve_session(parts, state).map_err(AppError::from)
    }
}

/// Optional user extractor: yields None instead of a 401.
pub struct MaybeUser(pub Option<CurrentUser>);

impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match resolve_session(parts, state) {
            Ok(user) => Ok(MaybeUser(Some(user))),
            Err(SessionFailure::Server(e)) => {
                tracing::warn!("Optional session lookup failed: {}", e);
                Ok(MaybeUser(None))
            }
            Err(_) => Ok(MaybeUser(None)),
        }
    }
}

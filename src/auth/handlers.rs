use axum::extract::State;
use axum::http::header;
use axum::response::{AppendHeaders, IntoResponse, Response};
use serde::Deserialize;

use crate::auth::password::validate_password;
use crate::db::models::Profile;
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::forms::FormInput;
use crate::media::{self, folders};
use crate::response::ApiResponse;
use crate::services::users::{self, NewUser, ProfileChanges};
use crate::state::AppState;

// -- Request types --

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub bio: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Deserialize)]
pub struct ProfileRequest {
    pub name: Option<String>,
    pub bio: Option<String>,
    /// Externally hosted avatar URL; an uploaded `avatar` file wins over it
    pub avatar: Option<String>,
    pub password: Option<String>,
}

/// Trimmed value of a field, treating blank as absent.
fn filled(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Run bcrypt off the async executor.
async fn blocking<T, F>(f: F) -> AppResult<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AppError::Internal(format!("blocking task failed: {}", e)))
}

/// Issue a token for `user_id` and attach it to `body` as the session cookie.
fn with_session(state: &AppState, user_id: &str, body: impl IntoResponse) -> Response {
    let token = state.tokens.issue(user_id);
    let cookie = state.cookie.set(&token, state.tokens.ttl().num_seconds());
    (AppendHeaders([(header::SET_COOKIE, cookie)]), body).into_response()
}

/// POST /api/auth/register
pub async fn register(State(state): State<AppState>, mut form: FormInput) -> AppResult<Response> {
    let req: RegisterRequest = form.parse()?;
    let avatar = form.take_file("avatar");

    let (Some(name), Some(email), Some(password)) = (
        filled(&req.name),
        filled(&req.email),
        req.password.as_deref().filter(|p| !p.is_empty()),
    ) else {
        return Err(AppError::validation("Please provide all required fields"));
    };
    if !users::looks_like_email(email) {
        return Err(AppError::validation("Please provide a valid email"));
    }
    validate_password(password).map_err(AppError::Validation)?;

    {
        let conn = state.db.get()?;
        if users::find_by_email(&conn, email)?.is_some() {
            return Err(AppError::Conflict("User already exists".into()));
        }
    }

    let hasher = state.passwords.clone();
    let password = password.to_string();
    let password_hash = blocking(move || hasher.hash(&password)).await??;

    let stored = match avatar {
        Some(file) => Some(
            state
                .media
                .upload(file.bytes, folders::AVATARS, file.content_type.as_deref())
                .await?,
        ),
        None => None,
    };

    let created = {
        let conn = state.db.get()?;
        users::create(
            &conn,
            NewUser {
                email,
                password_hash,
                name,
                bio: req.bio.as_deref().unwrap_or("").trim(),
                avatar_url: stored.as_ref().map(|m| m.url.clone()),
                avatar_public_id: stored.as_ref().map(|m| m.public_id.clone()),
            },
        )
    };
    let user = match created {
        Ok(user) => user,
        Err(e) => {
            if let Some(media) = &stored {
                media::delete_best_effort(state.media.as_ref(), &media.public_id).await;
            }
            return Err(e);
        }
    };

    tracing::info!("Registered user {}", user.id);
    Ok(with_session(
        &state,
        &user.id,
        ApiResponse::created("User registered successfully", Profile::from_user(&user)),
    ))
}

/// POST /api/auth/login
pub async fn login(State(state): State<AppState>, form: FormInput) -> AppResult<Response> {
    let req: LoginRequest = form.parse()?;
    let (Some(email), Some(password)) = (
        filled(&req.email),
        req.password.filter(|p| !p.is_empty()),
    ) else {
        return Err(AppError::validation("Please provide email and password"));
    };

    let user = {
        let conn = state.db.get()?;
        users::find_by_email(&conn, email)?
    };

    let hasher = state.passwords.clone();
    let user = match user {
        Some(user) => {
            let hash = user.password_hash.clone();
            let matched = blocking(move || hasher.verify(&password, &hash)).await?;
            matched.then_some(user)
        }
        None => {
            blocking(move || hasher.verify_dummy(&password)).await?;
            None
        }
    };
    let Some(user) = user else {
        tracing::debug!("Failed login for {}", email);
        return Err(AppError::Unauthenticated("Invalid email or password".into()));
    };

    Ok(with_session(
        &state,
        &user.id,
        ApiResponse::ok("Login successful", Profile::from_user(&user)),
    ))
}

/// POST /api/auth/logout
pub async fn logout(State(state): State<AppState>) -> Response {
    (
        AppendHeaders([(header::SET_COOKIE, state.cookie.clear())]),
        ApiResponse::message("Logged out successfully"),
    )
        .into_response()
}

/// GET /api/auth/me
pub async fn me(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<ApiResponse<Profile>> {
    let conn = state.db.get()?;
    let user = users::find_by_id(&conn, &user.id)?
        .ok_or_else(|| AppError::not_found("User not found"))?;
    Ok(ApiResponse::ok(
        "User profile retrieved",
        Profile::from_user(&user).with_created_at(&user),
    ))
}

/// PUT /api/auth/profile
pub async fn update_profile(
    State(state): State<AppState>,
    current: CurrentUser,
    mut form: FormInput,
) -> AppResult<ApiResponse<Profile>> {
    let req: ProfileRequest = form.parse()?;
    let avatar_file = form.take_file("avatar");

    let existing = {
        let conn = state.db.get()?;
        users::find_by_id(&conn, &current.id)?
            .ok_or_else(|| AppError::not_found("User not found"))?
    };

    let mut changes = ProfileChanges {
        name: filled(&req.name).map(str::to_string),
        bio: req.bio.map(|b| b.trim().to_string()),
        ..Default::default()
    };

    if let Some(password) = req.password.filter(|p| !p.is_empty()) {
        validate_password(&password).map_err(AppError::Validation)?;
        let hasher = state.passwords.clone();
        changes.password_hash = Some(blocking(move || hasher.hash(&password)).await??);
    }

    let uploaded = match avatar_file {
        Some(file) => Some(
            state
                .media
                .upload(file.bytes, folders::AVATARS, file.content_type.as_deref())
                .await?,
        ),
        None => None,
    };
    changes.avatar = match (&uploaded, filled(&req.avatar)) {
        (Some(media), _) => Some((media.url.clone(), Some(media.public_id.clone()))),
        (None, Some(url)) => Some((url.to_string(), None)),
        (None, None) => None,
    };

    let updated = {
        let conn = state.db.get()?;
        users::update_profile(&conn, &current.id, &changes)
    };
    let updated = match updated {
        Ok(Some(user)) => user,
        Ok(None) => {
            if let Some(media) = &uploaded {
                media::delete_best_effort(state.media.as_ref(), &media.public_id).await;
            }
            return Err(AppError::not_found("User not found"));
        }
        Err(e) => {
            if let Some(media) = &uploaded {
                media::delete_best_effort(state.media.as_ref(), &media.public_id).await;
            }
            return Err(e.into());
        }
    };

    // The previous upload is orphaned once the row points elsewhere
    if changes.avatar.is_some() {
        if let Some(old) = existing.avatar_public_id.as_deref() {
            if updated.avatar_public_id.as_deref() != Some(old) {
                media::delete_best_effort(state.media.as_ref(), old).await;
            }
        }
    }

    Ok(ApiResponse::ok(
        "Profile updated successfully",
        Profile::from_user(&updated),
    ))
}

use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::Router;
use serde::Deserialize;

use crate::db::models::{Blog, BlogDetail, BlogPage, BlogStatus, LikeState};
use crate::error::{AppError, AppResult};
use crate::extractors::{CurrentUser, MaybeUser};
use crate::forms::FormInput;
use crate::guard::{self, Action};
use crate::media::{self, folders};
use crate::response::ApiResponse;
use crate::services::blogs::{self, BlogChanges, BlogFilter, BlogSort, NewBlog, SortField};
use crate::services::likes;
use crate::services::query::{ListParams, PageRequest, SortOrder, BLOG_PAGE_SIZE};
use crate::state::AppState;

// --- Forms ---

#[derive(Deserialize)]
pub struct BlogForm {
    pub title: Option<String>,
    pub content: Option<String>,
    pub status: Option<String>,
}

// --- Router ---

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/blogs", get(list_blogs).post(create_blog))
        .route("/blogs/my-blogs", get(my_blogs))
        .route("/blogs/user/{user_id}", get(user_blogs))
        .route(
            "/blogs/{id}",
            get(get_blog).put(update_blog).delete(delete_blog),
        )
        .route("/blogs/{id}/like", post(toggle_like))
        .route("/blogs/{id}/like-status", get(like_status))
}

// --- Param helpers ---

pub(crate) fn list_params(query: Result<Query<ListParams>, QueryRejection>) -> AppResult<ListParams> {
    query.map(|Query(params)| params).map_err(|e| {
        tracing::debug!("Rejected query string: {}", e.body_text());
        AppError::validation("Invalid query string")
    })
}

fn filled(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn parse_status(value: &Option<String>) -> AppResult<Option<BlogStatus>> {
    filled(value)
        .map(str::parse::<BlogStatus>)
        .transpose()
        .map_err(AppError::Validation)
}

fn parse_sort(params: &ListParams, default: SortField) -> AppResult<BlogSort> {
    let field = match filled(&params.sort_by) {
        Some(name) => SortField::parse(name)
            .ok_or_else(|| AppError::validation(format!("Invalid sortBy value '{}'", name)))?,
        None => default,
    };
    Ok(BlogSort {
        field,
        order: SortOrder::parse(params.order.as_deref()),
    })
}

fn search_term(params: &ListParams) -> Option<String> {
    filled(&params.search).map(str::to_string)
}

// --- Handlers ---

async fn list_blogs(
    State(state): State<AppState>,
    query: Result<Query<ListParams>, QueryRejection>,
) -> AppResult<ApiResponse<BlogPage>> {
    let params = list_params(query)?;
    let filter = BlogFilter {
        status: Some(BlogStatus::Published),
        author_id: None,
        search: search_term(&params),
    };
    let sort = parse_sort(&params, SortField::CreatedAt)?;
    let page = PageRequest::from_params(&params, BLOG_PAGE_SIZE);

    let conn = state.db.get()?;
    let result = blogs::list(&conn, &filter, sort, page)?;
    Ok(ApiResponse::ok("Blogs retrieved successfully", result))
}

async fn user_blogs(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    query: Result<Query<ListParams>, QueryRejection>,
) -> AppResult<ApiResponse<BlogPage>> {
    let params = list_params(query)?;
    let filter = BlogFilter {
        status: Some(BlogStatus::Published),
        author_id: Some(user_id),
        search: search_term(&params),
    };
    let sort = parse_sort(&params, SortField::CreatedAt)?;
    let page = PageRequest::from_params(&params, BLOG_PAGE_SIZE);

    let conn = state.db.get()?;
    let result = blogs::list(&conn, &filter, sort, page)?;
    Ok(ApiResponse::ok("User blogs retrieved successfully", result))
}

async fn my_blogs(
    State(state): State<AppState>,
    user: CurrentUser,
    query: Result<Query<ListParams>, QueryRejection>,
) -> AppResult<ApiResponse<BlogPage>> {
    let params = list_params(query)?;
    let filter = BlogFilter {
        status: parse_status(&params.status)?,
        author_id: Some(user.id),
        search: search_term(&params),
    };
    let sort = parse_sort(&params, SortField::UpdatedAt)?;
    let page = PageRequest::from_params(&params, BLOG_PAGE_SIZE);

    let conn = state.db.get()?;
    let result = blogs::list(&conn, &filter, sort, page)?;
    Ok(ApiResponse::ok("My blogs retrieved successfully", result))
}

async fn get_blog(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<BlogDetail>> {
    let conn = state.db.get()?;
    let detail = blogs::detail(&conn, &id, user.as_ref().map(|u| u.id.as_str()))?
        .ok_or_else(|| AppError::not_found("Blog not found"))?;
    Ok(ApiResponse::ok("Blog retrieved successfully", detail))
}

async fn create_blog(
    State(state): State<AppState>,
    user: CurrentUser,
    mut form: FormInput,
) -> AppResult<ApiResponse<Blog>> {
    let req: BlogForm = form.parse()?;
    let (Some(title), Some(content)) = (filled(&req.title), filled(&req.content)) else {
        return Err(AppError::validation("Please provide title and content"));
    };
    let status = parse_status(&req.status)?.unwrap_or_default();
    let cover = form
        .take_file("coverImage")
        .ok_or_else(|| AppError::validation("Please upload a cover image"))?;

    let stored = state
        .media
        .upload(cover.bytes, folders::BLOG_COVERS, cover.content_type.as_deref())
        .await?;

    let inserted = {
        let conn = state.db.get()?;
        blogs::create(
            &conn,
            NewBlog {
                title,
                content,
                status,
                author_id: &user.id,
                cover_image: &stored.url,
                cover_public_id: &stored.public_id,
            },
        )
    };
    match inserted {
        Ok(blog) => {
            tracing::info!("User {} created blog {}", user.id, blog.id);
            Ok(ApiResponse::created("Blog created successfully", blog))
        }
        Err(e) => {
            media::delete_best_effort(state.media.as_ref(), &stored.public_id).await;
            Err(e.into())
        }
    }
}

async fn update_blog(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    mut form: FormInput,
) -> AppResult<ApiResponse<Blog>> {
    let existing = {
        let conn = state.db.get()?;
        guard::authorize(blogs::find_record(&conn, &id)?, &user, Action::Update)?
    };

    let req: BlogForm = form.parse()?;
    let mut changes = BlogChanges {
        title: filled(&req.title).map(str::to_string),
        content: filled(&req.content).map(str::to_string),
        status: parse_status(&req.status)?,
        cover: None,
    };

    let uploaded = match form.take_file("coverImage") {
        Some(file) => Some(
            state
                .media
                .upload(file.bytes, folders::BLOG_COVERS, file.content_type.as_deref())
                .await?,
        ),
        None => None,
    };
    if let Some(media) = &uploaded {
        changes.cover = Some((media.url.clone(), media.public_id.clone()));
    }

    let updated = {
        let conn = state.db.get()?;
        blogs::update(&conn, &id, &user.id, &changes)
    };
    let blog = match updated {
        Ok(Some(blog)) => blog,
        other => {
            if let Some(media) = &uploaded {
                media::delete_best_effort(state.media.as_ref(), &media.public_id).await;
            }
            return match other {
                Err(e) => Err(e.into()),
                _ => Err(AppError::not_found("Blog not found")),
            };
        }
    };

    if uploaded.is_some() && !existing.cover_public_id.is_empty() {
        media::delete_best_effort(state.media.as_ref(), &existing.cover_public_id).await;
    }

    Ok(ApiResponse::ok("Blog updated successfully", blog))
}

async fn delete_blog(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<()>> {
    let existing = {
        let mut conn = state.db.get()?;
        let existing = guard::authorize(blogs::find_record(&conn, &id)?, &user, Action::Delete)?;
        if !blogs::delete(&mut conn, &id, &user.id)? {
            return Err(AppError::not_found("Blog not found"));
        }
        existing
    };

    if !existing.cover_public_id.is_empty() {
        media::delete_best_effort(state.media.as_ref(), &existing.cover_public_id).await;
    }

    Ok(ApiResponse::message("Blog deleted successfully"))
}

async fn toggle_like(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<LikeState>> {
    let mut conn = state.db.get()?;
    if !blogs::exists(&conn, &id)? {
        return Err(AppError::not_found("Blog not found"));
    }
    let like = likes::toggle(&mut conn, &id, &user.id)?;
    let message = if like.liked { "Blog liked" } else { "Blog unliked" };
    Ok(ApiResponse::ok(message, like))
}

async fn like_status(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<LikeState>> {
    let conn = state.db.get()?;
    if !blogs::exists(&conn, &id)? {
        return Err(AppError::not_found("Blog not found"));
    }
    let like = likes::status(&conn, &id, &user.id)?;
    Ok(ApiResponse::ok("Like status retrieved", like))
}

use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::routing::{get, put};
use axum::Router;
use serde::Deserialize;

use crate::db::models::{Comment, CommentPage};
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::forms::FormInput;
use crate::guard::{self, Action};
use crate::response::ApiResponse;
use crate::routes::blogs::list_params;
use crate::services::comments;
use crate::services::query::{ListParams, PageRequest, COMMENT_PAGE_SIZE};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CommentForm {
    pub content: Option<String>,
}

impl CommentForm {
    fn content(&self) -> AppResult<&str> {
        self.content
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| AppError::validation("Please provide comment content"))
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/blogs/{id}/comments",
            get(list_comments).post(add_comment),
        )
        .route(
            "/comments/{id}",
            put(update_comment).delete(delete_comment),
        )
        .route(
            "/blogs/comments/{id}",
            put(update_comment).delete(delete_comment),
        )
}

async fn list_comments(
    State(state): State<AppState>,
    Path(blog_id): Path<String>,
    query: Result<Query<ListParams>, QueryRejection>,
) -> AppResult<ApiResponse<CommentPage>> {
    let params = list_params(query)?;
    let page = PageRequest::from_params(&params, COMMENT_PAGE_SIZE);

    let conn = state.db.get()?;
    let result = comments::list(&conn, &blog_id, page)?;
    Ok(ApiResponse::ok("Comments retrieved successfully", result))
}

async fn add_comment(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(blog_id): Path<String>,
    form: FormInput,
) -> AppResult<ApiResponse<Comment>> {
    let req: CommentForm = form.parse()?;
    let content = req.content()?;

    let mut conn = state.db.get()?;
    let comment = comments::create(&mut conn, &blog_id, &user.id, content)?
        .ok_or_else(|| AppError::not_found("Blog not found"))?;
    Ok(ApiResponse::created("Comment added successfully", comment))
}

async fn update_comment(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    form: FormInput,
) -> AppResult<ApiResponse<Comment>> {
    let req: CommentForm = form.parse()?;
    let content = req.content()?;

    let conn = state.db.get()?;
    guard::authorize(comments::find_record(&conn, &id)?, &user, Action::Update)?;
    let comment = comments::update(&conn, &id, &user.id, content)?
        .ok_or_else(|| AppError::not_found("Comment not found"))?;
    Ok(ApiResponse::ok("Comment updated successfully", comment))
}

async fn delete_comment(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<()>> {
    let mut conn = state.db.get()?;
    guard::authorize(comments::find_record(&conn, &id)?, &user, Action::Delete)?;
    if !comments::delete(&mut conn, &id, &user.id)? {
        return Err(AppError::not_found("Comment not found"));
    }
    Ok(ApiResponse::message("Comment deleted successfully"))
}

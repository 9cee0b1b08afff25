//! Ownership checks for mutations on owned resources.

use crate::db::models::{BlogRecord, CommentRecord};
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;

/// A stored resource with a fixed owner.
pub trait Owned {
    /// Lower-case noun used in error messages ("blog", "comment")
    const KIND: &'static str;

    fn owner_id(&self) -> &str;
}

impl Owned for BlogRecord {
    const KIND: &'static str = "blog";

    fn owner_id(&self) -> &str {
        &self.author_id
    }
}

impl Owned for CommentRecord {
    const KIND: &'static str = "comment";

    fn owner_id(&self) -> &str {
        &self.author_id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Update,
    Delete,
}

impl Action {
    fn verb(self) -> &'static str {
        match self {
            Action::Update => "update",
            Action::Delete => "delete",
        }
    }
}

pub fn not_found<R: Owned>() -> AppError {
    let mut kind = R::KIND.to_string();
    if let Some(first) = kind.get_mut(0..1) {
        first.make_ascii_uppercase();
    }
    AppError::not_found(format!("{} not found", kind))
}

/// Pass the resource through if `user` owns it.
///
/// Missing → 404, someone else's → 403. Ownership is strict id equality.
pub fn authorize<R: Owned>(resource: Option<R>, user: &CurrentUser, action: Action) -> AppResult<R> {
    let resource = resource.ok_or_else(not_found::<R>)?;
    if resource.owner_id() != user.id {
        tracing::warn!(
            "User {} tried to {} {} owned by {}",
            user.id,
            action.verb(),
            R::KIND,
            resource.owner_id()
        );
        return Err(AppError::Forbidden(format!(
            "Not authorized to {} this {}",
            action.verb(),
            R::KIND
        )));
    }
    Ok(resource)
}

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Full user row, including the password hash. Never serialized.
#[derive(Debug, Clone)]
pub struct User {
    pub id: String,
    pub email: String,
    pub password_hash: String,
    pub name: String,
    pub bio: String,
    pub avatar_url: Option<String>,
    pub avatar_public_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// What a user sees about their own account.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub email: String,
    pub bio: String,
    pub avatar: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl Profile {
    pub fn from_user(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
            bio: user.bio.clone(),
            avatar: user.avatar_url.clone(),
            created_at: None,
        }
    }

    pub fn with_created_at(mut self, user: &User) -> Self {
        self.created_at = Some(user.created_at.clone());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BlogStatus {
    Draft,
    #[default]
    Published,
}

impl BlogStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            BlogStatus::Draft => "draft",
            BlogStatus::Published => "published",
        }
    }
}

impl fmt::Display for BlogStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BlogStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(BlogStatus::Draft),
            "published" => Ok(BlogStatus::Published),
            other => Err(format!("Invalid status '{}', expected draft or published", other)),
        }
    }
}

/// Author fields embedded in blog and comment payloads.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AuthorSummary {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub avatar: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Blog {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    pub content: String,
    pub cover_image: String,
    pub status: BlogStatus,
    pub author: AuthorSummary,
    pub comments_count: i64,
    pub likes_count: i64,
    pub created_at: String,
    pub updated_at: String,
}

/// Single-blog payload: the blog plus its comments and the caller's like state.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlogDetail {
    #[serde(flatten)]
    pub blog: Blog,
    pub comments: Vec<Comment>,
    pub is_liked: bool,
}

/// The columns the ownership guard and media cleanup need.
#[derive(Debug, Clone, PartialEq)]
pub struct BlogRecord {
    pub id: String,
    pub author_id: String,
    pub cover_image: String,
    pub cover_public_id: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    #[serde(rename = "_id")]
    pub id: String,
    pub content: String,
    pub author: AuthorSummary,
    pub blog: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommentRecord {
    pub id: String,
    pub author_id: String,
    pub blog_id: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LikeState {
    pub liked: bool,
    pub likes_count: i64,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub pages: u64,
}

impl Pagination {
    pub fn new(page: u32, limit: u32, total: u64) -> Self {
        let pages = if limit == 0 {
            0
        } else {
            total.div_ceil(limit as u64)
        };
        Self {
            page,
            limit,
            total,
            pages,
        }
    }

    pub fn offset(page: u32, limit: u32) -> u64 {
        (page.saturating_sub(1) as u64) * limit as u64
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BlogPage {
    pub blogs: Vec<Blog>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommentPage {
    pub comments: Vec<Comment>,
    pub pagination: Pagination,
}

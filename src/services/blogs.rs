use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

use crate::db::models::{
    AuthorSummary, Blog, BlogDetail, BlogPage, BlogRecord, BlogStatus, Pagination,
};
use crate::db::now_timestamp;
use crate::services::comments;
use crate::services::likes;
use crate::services::query::{PageRequest, SortOrder};

const BLOG_SELECT: &str = "
    SELECT b.id, b.title, b.content, b.cover_image, b.status, b.comments_count,
           (SELECT COUNT(*) FROM likes l WHERE l.blog_id = b.id) AS likes_count,
           b.created_at, b.updated_at,
           u.id, u.name, u.email, u.avatar_url, u.bio
    FROM blogs b
    JOIN users u ON u.id = b.author_id";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    #[default]
    CreatedAt,
    UpdatedAt,
    Title,
    CommentsCount,
    LikesCount,
}

impl SortField {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "createdAt" => Some(SortField::CreatedAt),
            "updatedAt" => Some(SortField::UpdatedAt),
            "title" => Some(SortField::Title),
            "commentsCount" => Some(SortField::CommentsCount),
            "likesCount" => Some(SortField::LikesCount),
            _ => None,
        }
    }

    fn column(self) -> &'static str {
        match self {
            SortField::CreatedAt => "b.created_at",
            SortField::UpdatedAt => "b.updated_at",
            SortField::Title => "b.title",
            SortField::CommentsCount => "b.comments_count",
            SortField::LikesCount => "likes_count",
        }
    }
}

/// Which blogs a listing covers.
#[derive(Debug, Clone, Default)]
pub struct BlogFilter {
    pub status: Option<BlogStatus>,
    pub author_id: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BlogSort {
    pub field: SortField,
    pub order: SortOrder,
}

pub struct NewBlog<'a> {
    pub title: &'a str,
    pub content: &'a str,
    pub status: BlogStatus,
    pub author_id: &'a str,
    pub cover_image: &'a str,
    pub cover_public_id: &'a str,
}

/// Field updates for a blog; `None` leaves the column unchanged.
#[derive(Debug, Default)]
pub struct BlogChanges {
    pub title: Option<String>,
    pub content: Option<String>,
    pub status: Option<BlogStatus>,
    /// `(url, media id)` of a newly uploaded cover
    pub cover: Option<(String, String)>,
}

fn blog_from_row(row: &Row, with_bio: bool) -> rusqlite::Result<Blog> {
    let status: String = row.get(4)?;
    let status = status.parse::<BlogStatus>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, e.into())
    })?;
    Ok(Blog {
        id: row.get(0)?,
        title: row.get(1)?,
        content: row.get(2)?,
        cover_image: row.get(3)?,
        status,
        comments_count: row.get(5)?,
        likes_count: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
        author: AuthorSummary {
            id: row.get(9)?,
            name: row.get(10)?,
            email: Some(row.get(11)?),
            avatar: row.get(12)?,
            bio: if with_bio { Some(row.get(13)?) } else { None },
        },
    })
}

/// Turn free text into an FTS5 query: every whitespace-separated term is
/// quoted (so operators in user input are literal) and terms are OR-ed.
pub fn fts_query(search: &str) -> Option<String> {
    let terms: Vec<String> = search
        .split_whitespace()
        .map(|term| format!("\"{}\"", term.replace('"', "\"\"")))
        .collect();
    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" OR "))
    }
}

fn where_clause(filter: &BlogFilter) -> (String, Vec<Value>) {
    let mut conditions = Vec::new();
    let mut values = Vec::new();

    if let Some(status) = filter.status {
        values.push(Value::Text(status.as_str().to_string()));
        conditions.push(format!("b.status = ?{}", values.len()));
    }
    if let Some(ref author) = filter.author_id {
        values.push(Value::Text(author.clone()));
        conditions.push(format!("b.author_id = ?{}", values.len()));
    }
    if let Some(query) = filter.search.as_deref().and_then(fts_query) {
        values.push(Value::Text(query));
        conditions.push(format!(
            "b.seq IN (SELECT rowid FROM blogs_fts WHERE blogs_fts MATCH ?{})",
            values.len()
        ));
    }

    if conditions.is_empty() {
        (String::new(), values)
    } else {
        (format!(" WHERE {}", conditions.join(" AND ")), values)
    }
}

pub fn list(
    conn: &Connection,
    filter: &BlogFilter,
    sort: BlogSort,
    page: PageRequest,
) -> rusqlite::Result<BlogPage> {
    let (where_sql, values) = where_clause(filter);

    let total: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM blogs b{}", where_sql),
        params_from_iter(values.iter()),
        |r| r.get(0),
    )?;

    // Tie-break on id so equal sort keys still page deterministically
    let direction = sort.order.sql();
    let sql = format!(
        "{}{} ORDER BY {} {}, b.id {} LIMIT {} OFFSET {}",
        BLOG_SELECT,
        where_sql,
        sort.field.column(),
        direction,
        direction,
        page.limit,
        page.offset()
    );
    let mut stmt = conn.prepare(&sql)?;
    let blogs = stmt
        .query_map(params_from_iter(values.iter()), |row| blog_from_row(row, false))?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(BlogPage {
        blogs,
        pagination: Pagination::new(page.page, page.limit, total.max(0) as u64),
    })
}

pub fn find(conn: &Connection, id: &str) -> rusqlite::Result<Option<Blog>> {
    conn.query_row(
        &format!("{} WHERE b.id = ?1", BLOG_SELECT),
        params![id],
        |row| blog_from_row(row, false),
    )
    .optional()
}

pub fn find_record(conn: &Connection, id: &str) -> rusqlite::Result<Option<BlogRecord>> {
    conn.query_row(
        "SELECT id, author_id, cover_image, cover_public_id FROM blogs WHERE id = ?1",
        params![id],
        |row| {
            Ok(BlogRecord {
                id: row.get(0)?,
                author_id: row.get(1)?,
                cover_image: row.get(2)?,
                cover_public_id: row.get(3)?,
            })
        },
    )
    .optional()
}

pub fn exists(conn: &Connection, id: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT COUNT(*) > 0 FROM blogs WHERE id = ?1",
        params![id],
        |r| r.get(0),
    )
}

/// The blog with its author's bio, all comments and the viewer's like state.
pub fn detail(
    conn: &Connection,
    id: &str,
    viewer_id: Option<&str>,
) -> rusqlite::Result<Option<BlogDetail>> {
    let blog = conn
        .query_row(
            &format!("{} WHERE b.id = ?1", BLOG_SELECT),
            params![id],
            |row| blog_from_row(row, true),
        )
        .optional()?;
    let Some(blog) = blog else {
        return Ok(None);
    };

    let comments = comments::all_for_blog(conn, id)?;
    let is_liked = match viewer_id {
        Some(user_id) => likes::is_liked(conn, id, user_id)?,
        None => false,
    };
    Ok(Some(BlogDetail {
        blog,
        comments,
        is_liked,
    }))
}

pub fn create(conn: &Connection, new: NewBlog<'_>) -> rusqlite::Result<Blog> {
    let id = uuid::Uuid::now_v7().to_string();
    conn.execute(
        "INSERT INTO blogs (id, title, content, cover_image, cover_public_id, status, author_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            id,
            new.title,
            new.content,
            new.cover_image,
            new.cover_public_id,
            new.status.as_str(),
            new.author_id
        ],
    )?;
    find(conn, &id)?.ok_or(rusqlite::Error::QueryReturnedNoRows)
}

/// Apply `changes` if the blog still belongs to `author_id`.
/// Returns `None` when no row matched.
pub fn update(
    conn: &Connection,
    id: &str,
    author_id: &str,
    changes: &BlogChanges,
) -> rusqlite::Result<Option<Blog>> {
    let (cover_url, cover_id) = match &changes.cover {
        Some((url, public_id)) => (Some(url.as_str()), Some(public_id.as_str())),
        None => (None, None),
    };
    let updated = conn.execute(
        "UPDATE blogs SET
            title = COALESCE(?3, title),
            content = COALESCE(?4, content),
            status = COALESCE(?5, status),
            cover_image = COALESCE(?6, cover_image),
            cover_public_id = COALESCE(?7, cover_public_id),
            updated_at = ?8
         WHERE id = ?1 AND author_id = ?2",
        params![
            id,
            author_id,
            changes.title,
            changes.content,
            changes.status.map(BlogStatus::as_str),
            cover_url,
            cover_id,
            now_timestamp()
        ],
    )?;
    if updated == 0 {
        return Ok(None);
    }
    find(conn, id)
}

/// Remove a blog with its comments and likes in one transaction.
/// Returns false when no blog owned by `author_id` matched.
pub fn delete(conn: &mut Connection, id: &str, author_id: &str) -> rusqlite::Result<bool> {
    let tx = conn.transaction()?;
    let owned: bool = tx.query_row(
        "SELECT COUNT(*) > 0 FROM blogs WHERE id = ?1 AND author_id = ?2",
        params![id, author_id],
        |r| r.get(0),
    )?;
    if !owned {
        return Ok(false);
    }
    let comments = tx.execute("DELETE FROM comments WHERE blog_id = ?1", params![id])?;
    let likes = tx.execute("DELETE FROM likes WHERE blog_id = ?1", params![id])?;
    tx.execute("DELETE FROM blogs WHERE id = ?1", params![id])?;
    tx.commit()?;

    tracing::info!(
        "Deleted blog {} with {} comments and {} likes",
        id,
        comments,
        likes
    );
    Ok(true)
}

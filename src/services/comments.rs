use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::models::{AuthorSummary, Comment, CommentPage, CommentRecord, Pagination};
use crate::db::now_timestamp;
use crate::services::query::PageRequest;

const COMMENT_SELECT: &str = "
    SELECT c.id, c.content, c.blog_id, c.created_at, c.updated_at,
           u.id, u.name, u.avatar_url
    FROM comments c
    JOIN users u ON u.id = c.author_id";

fn comment_from_row(row: &Row) -> rusqlite::Result<Comment> {
    Ok(Comment {
        id: row.get(0)?,
        content: row.get(1)?,
        blog: row.get(2)?,
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
        author: AuthorSummary {
            id: row.get(5)?,
            name: row.get(6)?,
            email: None,
            avatar: row.get(7)?,
            bio: None,
        },
    })
}

/// One page of a blog's comments, newest first.
pub fn list(conn: &Connection, blog_id: &str, page: PageRequest) -> rusqlite::Result<CommentPage> {
    let total: i64 = conn.query_row(
        "SELECT COUNT(*) FROM comments WHERE blog_id = ?1",
        params![blog_id],
        |r| r.get(0),
    )?;

    let mut stmt = conn.prepare(&format!(
        "{} WHERE c.blog_id = ?1 ORDER BY c.created_at DESC, c.id DESC LIMIT ?2 OFFSET ?3",
        COMMENT_SELECT
    ))?;
    let comments = stmt
        .query_map(
            params![blog_id, page.limit, page.offset() as i64],
            comment_from_row,
        )?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(CommentPage {
        comments,
        pagination: Pagination::new(page.page, page.limit, total.max(0) as u64),
    })
}

/// Every comment on a blog, newest first.
pub fn all_for_blog(conn: &Connection, blog_id: &str) -> rusqlite::Result<Vec<Comment>> {
    let mut stmt = conn.prepare(&format!(
        "{} WHERE c.blog_id = ?1 ORDER BY c.created_at DESC, c.id DESC",
        COMMENT_SELECT
    ))?;
    let rows = stmt.query_map(params![blog_id], comment_from_row)?;
    rows.collect()
}

pub fn find(conn: &Connection, id: &str) -> rusqlite::Result<Option<Comment>> {
    conn.query_row(
        &format!("{} WHERE c.id = ?1", COMMENT_SELECT),
        params![id],
        comment_from_row,
    )
    .optional()
}

pub fn find_record(conn: &Connection, id: &str) -> rusqlite::Result<Option<CommentRecord>> {
    conn.query_row(
        "SELECT id, author_id, blog_id FROM comments WHERE id = ?1",
        params![id],
        |row| {
            Ok(CommentRecord {
                id: row.get(0)?,
                author_id: row.get(1)?,
                blog_id: row.get(2)?,
            })
        },
    )
    .optional()
}

/// Insert a comment and bump the blog's counter atomically.
/// Returns `None` if the blog does not exist.
pub fn create(
    conn: &mut Connection,
    blog_id: &str,
    author_id: &str,
    content: &str,
) -> rusqlite::Result<Option<Comment>> {
    let id = uuid::Uuid::now_v7().to_string();
    let tx = conn.transaction()?;
    let bumped = tx.execute(
        "UPDATE blogs SET comments_count = comments_count + 1 WHERE id = ?1",
        params![blog_id],
    )?;
    if bumped == 0 {
        return Ok(None);
    }
    tx.execute(
        "INSERT INTO comments (id, content, author_id, blog_id) VALUES (?1, ?2, ?3, ?4)",
        params![id, content, author_id, blog_id],
    )?;
    tx.commit()?;

    find(conn, &id)
}

pub fn update(
    conn: &Connection,
    id: &str,
    author_id: &str,
    content: &str,
) -> rusqlite::Result<Option<Comment>> {
    let updated = conn.execute(
        "UPDATE comments SET content = ?3, updated_at = ?4 WHERE id = ?1 AND author_id = ?2",
        params![id, author_id, content, now_timestamp()],
    )?;
    if updated == 0 {
        return Ok(None);
    }
    find(conn, id)
}

/// Delete a comment; the blog counter only moves if a row actually went away.
pub fn delete(conn: &mut Connection, id: &str, author_id: &str) -> rusqlite::Result<bool> {
    let tx = conn.transaction()?;
    let blog_id: Option<String> = tx
        .query_row(
            "DELETE FROM comments WHERE id = ?1 AND author_id = ?2 RETURNING blog_id",
            params![id, author_id],
            |r| r.get(0),
        )
        .optional()?;
    let Some(blog_id) = blog_id else {
        return Ok(false);
    };
    tx.execute(
        "UPDATE blogs SET comments_count = MAX(0, comments_count - 1) WHERE id = ?1",
        params![blog_id],
    )?;
    tx.commit()?;
    Ok(true)
}

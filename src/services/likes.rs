use rusqlite::{params, Connection};

use crate::db::models::LikeState;

pub fn is_liked(conn: &Connection, blog_id: &str, user_id: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT COUNT(*) > 0 FROM likes WHERE blog_id = ?1 AND user_id = ?2",
        params![blog_id, user_id],
        |r| r.get(0),
    )
}

fn count(conn: &Connection, blog_id: &str) -> rusqlite::Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM likes WHERE blog_id = ?1",
        params![blog_id],
        |r| r.get(0),
    )
}

/// Like if not yet liked, otherwise unlike. The caller checks the blog exists.
pub fn toggle(conn: &mut Connection, blog_id: &str, user_id: &str) -> rusqlite::Result<LikeState> {
    let tx = conn.transaction()?;
    let removed = tx.execute(
        "DELETE FROM likes WHERE blog_id = ?1 AND user_id = ?2",
        params![blog_id, user_id],
    )?;
    if removed == 0 {
        tx.execute(
            "INSERT INTO likes (blog_id, user_id) VALUES (?1, ?2)",
            params![blog_id, user_id],
        )?;
    }
    let likes_count = count(&tx, blog_id)?;
    tx.commit()?;

    Ok(LikeState {
        liked: removed == 0,
        likes_count,
    })
}

pub fn status(conn: &Connection, blog_id: &str, user_id: &str) -> rusqlite::Result<LikeState> {
    Ok(LikeState {
        liked: is_liked(conn, blog_id, user_id)?,
        likes_count: count(conn, blog_id)?,
    })
}

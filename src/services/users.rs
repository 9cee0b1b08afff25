use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::models::User;
use crate::db::now_timestamp;
use crate::error::{AppError, AppResult};

const USER_COLUMNS: &str =
    "id, email, password_hash, name, bio, avatar_url, avatar_public_id, created_at, updated_at";

pub struct NewUser<'a> {
    pub email: &'a str,
    pub password_hash: String,
    pub name: &'a str,
    pub bio: &'a str,
    pub avatar_url: Option<String>,
    pub avatar_public_id: Option<String>,
}

/// Field updates for a profile; `None` leaves the column unchanged.
#[derive(Debug, Default)]
pub struct ProfileChanges {
    pub name: Option<String>,
    pub bio: Option<String>,
    /// `(url, media id)`; the id is `None` for externally hosted avatars
    pub avatar: Option<(String, Option<String>)>,
    pub password_hash: Option<String>,
}

fn user_from_row(row: &Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        password_hash: row.get(2)?,
        name: row.get(3)?,
        bio: row.get(4)?,
        avatar_url: row.get(5)?,
        avatar_public_id: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

/// Emails compare case-insensitively and without surrounding whitespace.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn looks_like_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && domain.contains('.')
                && !email.contains(char::is_whitespace)
        }
        None => false,
    }
}

pub fn find_by_id(conn: &Connection, id: &str) -> rusqlite::Result<Option<User>> {
    conn.query_row(
        &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
        params![id],
        user_from_row,
    )
    .optional()
}

pub fn find_by_email(conn: &Connection, email: &str) -> rusqlite::Result<Option<User>> {
    conn.query_row(
        &format!("SELECT {} FROM users WHERE email = ?1", USER_COLUMNS),
        params![normalize_email(email)],
        user_from_row,
    )
    .optional()
}

fn is_unique_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _)
            if err.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

pub fn create(conn: &Connection, new: NewUser<'_>) -> AppResult<User> {
    let email = normalize_email(new.email);
    if find_by_email(conn, &email)?.is_some() {
        return Err(AppError::Conflict("User already exists".into()));
    }

    let id = uuid::Uuid::now_v7().to_string();
    let inserted = conn.execute(
        "INSERT INTO users (id, email, password_hash, name, bio, avatar_url, avatar_public_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            id,
            email,
            new.password_hash,
            new.name.trim(),
            new.bio,
            new.avatar_url,
            new.avatar_public_id
        ],
    );
    match inserted {
        Ok(_) => {}
        // Lost a race with a concurrent registration for the same email
        Err(e) if is_unique_violation(&e) => {
            return Err(AppError::Conflict("User already exists".into()))
        }
        Err(e) => return Err(e.into()),
    }

    find_by_id(conn, &id)?
        .ok_or_else(|| AppError::Internal(format!("user {} vanished after insert", id)))
}

pub fn update_profile(
    conn: &Connection,
    id: &str,
    changes: &ProfileChanges,
) -> rusqlite::Result<Option<User>> {
    let (avatar_url, avatar_public_id, replace_avatar) = match &changes.avatar {
        Some((url, public_id)) => (Some(url.as_str()), public_id.as_deref(), true),
        None => (None, None, false),
    };

    conn.execute(
        "UPDATE users SET
            name = COALESCE(?2, name),
            bio = COALESCE(?3, bio),
            avatar_url = CASE WHEN ?4 THEN ?5 ELSE avatar_url END,
            avatar_public_id = CASE WHEN ?4 THEN ?6 ELSE avatar_public_id END,
            password_hash = COALESCE(?7, password_hash),
            updated_at = ?8
         WHERE id = ?1",
        params![
            id,
            changes.name,
            changes.bio,
            replace_avatar,
            avatar_url,
            avatar_public_id,
            changes.password_hash,
            now_timestamp()
        ],
    )?;
    find_by_id(conn, id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::test_pool;

    fn new_user<'a>(email: &'a str) -> NewUser<'a> {
        NewUser {
            email,
            password_hash: "hash".into(),
            name: "Ada",
            bio: "",
            avatar_url: None,
            avatar_public_id: None,
        }
    }

    #[test]
    fn create_then_find_by_email_ignores_case() {
        let (_tmp, pool) = test_pool();
        let conn = pool.get().unwrap();
        let user = create(&conn, new_user(" Ada@Example.com ")).unwrap();
        assert_eq!(user.email, "ada@example.com");
        assert_eq!(user.bio, "");

        let found = find_by_email(&conn, "ADA@example.COM").unwrap().unwrap();
        assert_eq!(found.id, user.id);
    }

    #[test]
    fn duplicate_email_is_a_conflict() {
        let (_tmp, pool) = test_pool();
        let conn = pool.get().unwrap();
        create(&conn, new_user("a@x.com")).unwrap();
        let err = create(&conn, new_user("A@x.com")).unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[test]
    fn update_profile_only_touches_given_fields() {
        let (_tmp, pool) = test_pool();
        let conn = pool.get().unwrap();
        let user = create(&conn, new_user("a@x.com")).unwrap();

        let updated = update_profile(
            &conn,
            &user.id,
            &ProfileChanges {
                bio: Some("hello".into()),
                avatar: Some(("http://img/a.png".into(), Some("a.png".into()))),
                ..Default::default()
            },
        )
        .unwrap()
        .unwrap();
        assert_eq!(updated.name, "Ada");
        assert_eq!(updated.bio, "hello");
        assert_eq!(updated.avatar_url.as_deref(), Some("http://img/a.png"));
        assert_eq!(updated.avatar_public_id.as_deref(), Some("a.png"));
        assert_eq!(updated.password_hash, "hash");

        // A later external avatar URL clears the stored media id
        let updated = update_profile(
            &conn,
            &user.id,
            &ProfileChanges {
                avatar: Some(("https://gravatar/x".into(), None)),
                ..Default::default()
            },
        )
        .unwrap()
        .unwrap();
        assert_eq!(updated.avatar_public_id, None);
        assert_eq!(updated.bio, "hello");
    }

    #[test]
    fn update_of_missing_user_returns_none() {
        let (_tmp, pool) = test_pool();
        let conn = pool.get().unwrap();
        let result = update_profile(&conn, "ghost", &ProfileChanges::default()).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn email_shape_check() {
        assert!(looks_like_email("a@x.com"));
        assert!(!looks_like_email("a@x"));
        assert!(!looks_like_email("@x.com"));
        assert!(!looks_like_email("a x@y.com"));
        assert!(!looks_like_email("no-at-sign"));
    }
}

pub use crate::model::User;
use crate::error::Error;
use rusqlite::{params, Connection, OptionalExtension};
use time::OffsetDateTime;
use uuid::Uuid;

/// Register a user, ensuring a unique username.
pub fn create_user(conn: &Connection, username: &str, display_name: &str) -> Result<User, Error> {
    let id = Uuid::new_v4();
    let now = OffsetDateTime::now_utc().unix_timestamp();
    let res = conn.execute(
        "INSERT INTO users (id, username, display_name, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![id.to_string(), username, display_name, now],
    );
    match res {
        Ok(_) => Ok(User {
            id,
            username: username.into(),
            display_name: display_name.into(),
            created_at: now,
        }),
        Err(e) => {
            if matches!(
                e.sqlite_error_code(),
                Some(rusqlite::ErrorCode::ConstraintViolation)
            ) {
                Err(Error::Conflict("duplicate_user"))
            } else {
                Err(e.into())
            }
        }
    }
}

pub fn get_user(conn: &Connection, id: Uuid) -> Result<Option<User>, Error> {
    let mut stmt = conn
        .prepare("SELECT id, username, display_name, created_at FROM users WHERE id = ?1")?;
    let user = stmt
        .query_row([id.to_string()], row_to_user)
        .optional()?;
    Ok(user)
}

/// Resolve a user id or fail with `user_not_found`.
pub fn require_user(conn: &Connection, id: Uuid) -> Result<User, Error> {
    get_user(conn, id)?.ok_or(Error::NotFound("user"))
}

pub fn list_users(conn: &Connection) -> Result<Vec<User>, Error> {
    let mut stmt = conn.prepare(
        "SELECT id, username, display_name, created_at FROM users ORDER BY created_at, username",
    )?;
    let users = stmt
        .query_map([], row_to_user)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(users)
}

/// Users the actor has not yet liked, excluding the actor. No scoring, just
/// the complement of the actor's like history.
pub fn discover_candidates(conn: &Connection, user_id: Uuid, limit: usize) -> Result<Vec<User>, Error> {
    require_user(conn, user_id)?;
    let mut stmt = conn.prepare(
        "SELECT id, username, display_name, created_at FROM users \
         WHERE id <> ?1 AND id NOT IN (SELECT likee_id FROM likes WHERE liker_id = ?1) \
         ORDER BY created_at, username LIMIT ?2",
    )?;
    let users = stmt
        .query_map(params![user_id.to_string(), limit as i64], row_to_user)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(users)
}

fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: Uuid::parse_str(row.get::<_, String>(0)?.as_str()).unwrap(),
        username: row.get(1)?,
        display_name: row.get(2)?,
        created_at: row.get(3)?,
    })
}

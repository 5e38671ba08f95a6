use crate::error::Error;
use rusqlite::{params, Connection, OptionalExtension};
use time::OffsetDateTime;
use uuid::Uuid;

/// Record a one-directional like. Returns whether this call inserted a new
/// row; re-liking the same ordered pair is a no-op. The insert-if-absent is
/// a single `INSERT OR IGNORE` against the (liker, likee) primary key, so
/// concurrent duplicates cannot race past each other.
pub fn record_like(conn: &Connection, liker: Uuid, likee: Uuid) -> Result<bool, Error> {
    if liker == likee {
        return Err(Error::InvalidPair);
    }
    let now = OffsetDateTime::now_utc().unix_timestamp();
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO likes (liker_id, likee_id, created_at) VALUES (?1, ?2, ?3)",
        params![liker.to_string(), likee.to_string(), now],
    )?;
    Ok(inserted > 0)
}

/// Existence check for the ordered pair (a likes b).
pub fn has_like(conn: &Connection, a: Uuid, b: Uuid) -> Result<bool, Error> {
    let mut stmt =
        conn.prepare("SELECT 1 FROM likes WHERE liker_id = ?1 AND likee_id = ?2")?;
    let hit: Option<i64> = stmt
        .query_row(params![a.to_string(), b.to_string()], |row| row.get(0))
        .optional()?;
    Ok(hit.is_some())
}

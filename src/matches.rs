pub use crate::model::{Match, MatchSummary};
use crate::error::Error;
use crate::{likes, messages, users};
use rusqlite::{params, Connection, OptionalExtension};
use time::OffsetDateTime;
use uuid::Uuid;

/// Fix an unordered pair into (low, high) under the Uuid total order.
pub fn canonical_pair(a: Uuid, b: Uuid) -> (Uuid, Uuid) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Deterministic match id for a canonical pair. Both sides of a reciprocal
/// race compute the same id, so the primary key backs up the pair
/// uniqueness constraint.
pub fn match_id_for(low: Uuid, high: Uuid) -> Uuid {
    let name = format!("match:{}:{}", low, high);
    Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes())
}

/// Outcome of a reciprocity check after a new like landed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchOutcome {
    /// The reverse like does not exist yet.
    NoMatch,
    /// This call created the match.
    Created(Match),
    /// Both directions raced; the other trigger created it first. Not an
    /// error, the match is simply returned.
    AlreadyExisted(Match),
}

/// Check reciprocity for a freshly inserted like and create the match if
/// both directions now exist. The `INSERT OR IGNORE` on the canonical pair
/// is the single synchronization point: when both users like each other at
/// the same instant, exactly one insert wins and the other caller observes
/// `AlreadyExisted`.
pub fn try_create_match_on_like(
    conn: &Connection,
    liker: Uuid,
    likee: Uuid,
) -> Result<MatchOutcome, Error> {
    if !likes::has_like(conn, likee, liker)? {
        return Ok(MatchOutcome::NoMatch);
    }
    let (low, high) = canonical_pair(liker, likee);
    let id = match_id_for(low, high);
    let now = OffsetDateTime::now_utc().unix_timestamp();
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO matches (id, user_low, user_high, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![id.to_string(), low.to_string(), high.to_string(), now],
    )?;
    // Row exists after the upsert whichever side won.
    let m = get_match(conn, id)?.ok_or(Error::Conflict("match_vanished"))?;
    if inserted > 0 {
        Ok(MatchOutcome::Created(m))
    } else {
        Ok(MatchOutcome::AlreadyExisted(m))
    }
}

/// Result of the `like` operation as seen by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LikeOutcome {
    /// Whether this call inserted a new like (false on re-like).
    pub like_created: bool,
    /// True only for the call that created the match.
    pub matched: bool,
    /// The match for this pair, if one exists after the call.
    pub match_id: Option<Uuid>,
}

/// The `like` operation: record the like, then run the reciprocity check,
/// but only when the like is new. A re-like never re-triggers the engine.
pub fn like_user(conn: &Connection, actor: Uuid, target: Uuid) -> Result<LikeOutcome, Error> {
    if actor == target {
        return Err(Error::InvalidPair);
    }
    users::require_user(conn, actor)?;
    users::require_user(conn, target)?;
    let like_created = likes::record_like(conn, actor, target)?;
    if !like_created {
        let existing = get_match_for_pair(conn, actor, target)?;
        return Ok(LikeOutcome {
            like_created: false,
            matched: false,
            match_id: existing.map(|m| m.id),
        });
    }
    let outcome = try_create_match_on_like(conn, actor, target)?;
    Ok(match outcome {
        MatchOutcome::NoMatch => LikeOutcome {
            like_created: true,
            matched: false,
            match_id: None,
        },
        MatchOutcome::Created(m) => {
            tracing::info!(match_id = %m.id, "mutual match created");
            LikeOutcome {
                like_created: true,
                matched: true,
                match_id: Some(m.id),
            }
        }
        MatchOutcome::AlreadyExisted(m) => LikeOutcome {
            like_created: true,
            matched: false,
            match_id: Some(m.id),
        },
    })
}

pub fn get_match(conn: &Connection, id: Uuid) -> Result<Option<Match>, Error> {
    let mut stmt = conn
        .prepare("SELECT id, user_low, user_high, created_at FROM matches WHERE id = ?1")?;
    let m = stmt.query_row([id.to_string()], row_to_match).optional()?;
    Ok(m)
}

/// Resolve a match id or fail with `match_not_found`.
pub fn require_match(conn: &Connection, id: Uuid) -> Result<Match, Error> {
    get_match(conn, id)?.ok_or(Error::NotFound("match"))
}

pub fn get_match_for_pair(conn: &Connection, a: Uuid, b: Uuid) -> Result<Option<Match>, Error> {
    let (low, high) = canonical_pair(a, b);
    get_match(conn, match_id_for(low, high))
}

/// Matches the user participates in, most recent first, each with the other
/// participant, a last-message preview and the unread count.
pub fn list_matches_for(conn: &Connection, user_id: Uuid) -> Result<Vec<MatchSummary>, Error> {
    users::require_user(conn, user_id)?;
    let mut stmt = conn.prepare(
        "SELECT id, user_low, user_high, created_at FROM matches \
         WHERE user_low = ?1 OR user_high = ?1 ORDER BY created_at DESC, id DESC",
    )?;
    let found = stmt
        .query_map([user_id.to_string()], row_to_match)?
        .collect::<Result<Vec<_>, _>>()?;
    let mut out = Vec::with_capacity(found.len());
    for m in found {
        let other_id = m
            .other_participant(user_id)
            .ok_or(Error::Conflict("corrupt_match"))?;
        let other_user = users::require_user(conn, other_id)?;
        let last_message = messages::last_message(conn, m.id)?;
        let unread = messages::unread_count(conn, m.id, user_id)?;
        out.push(MatchSummary {
            match_id: m.id,
            other_user,
            created_at: m.created_at,
            last_message,
            unread,
        });
    }
    Ok(out)
}

fn row_to_match(row: &rusqlite::Row<'_>) -> rusqlite::Result<Match> {
    Ok(Match {
        id: Uuid::parse_str(row.get::<_, String>(0)?.as_str()).unwrap(),
        user_low: Uuid::parse_str(row.get::<_, String>(1)?.as_str()).unwrap(),
        user_high: Uuid::parse_str(row.get::<_, String>(2)?.as_str()).unwrap(),
        created_at: row.get(3)?,
    })
}

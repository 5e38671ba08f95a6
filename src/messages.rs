pub use crate::model::Message;
use crate::error::Error;
use crate::matches;
use rusqlite::{params, Connection, OptionalExtension};
use time::OffsetDateTime;
use uuid::Uuid;

const MAX_PAGE: usize = 200;

/// Append a message to a match's conversation. The per-match `seq` is
/// assigned inside the insert statement, so concurrent sends to the same
/// match serialize on SQLite's write lock and never tie.
pub fn post_message(
    conn: &Connection,
    match_id: Uuid,
    sender: Uuid,
    body: &str,
) -> Result<Message, Error> {
    let m = matches::require_match(conn, match_id)?;
    if !m.has_participant(sender) {
        return Err(Error::NotParticipant);
    }
    let body = body.trim();
    if body.is_empty() {
        return Err(Error::EmptyMessage);
    }
    let id = Uuid::new_v4();
    let now = OffsetDateTime::now_utc().unix_timestamp();
    conn.execute(
        "INSERT INTO messages (id, match_id, sender_id, body, seq, created_at) \
         SELECT ?1, ?2, ?3, ?4, COALESCE(MAX(seq), 0) + 1, ?5 FROM messages WHERE match_id = ?2",
        params![
            id.to_string(),
            match_id.to_string(),
            sender.to_string(),
            body,
            now
        ],
    )?;
    get_message(conn, id)?.ok_or(Error::Conflict("message_vanished"))
}

/// Ordered conversation slice for a participant, ascending by send order.
/// `after_seq` restarts the sequence past an already-seen prefix.
pub fn list_messages(
    conn: &Connection,
    match_id: Uuid,
    requester: Uuid,
    after_seq: Option<i64>,
    limit: Option<usize>,
) -> Result<Vec<Message>, Error> {
    let m = matches::require_match(conn, match_id)?;
    if !m.has_participant(requester) {
        return Err(Error::NotParticipant);
    }
    let limit = limit.unwrap_or(MAX_PAGE).min(MAX_PAGE);
    let mut stmt = conn.prepare(
        "SELECT id, match_id, sender_id, body, seq, created_at, read_at FROM messages \
         WHERE match_id = ?1 AND seq > ?2 ORDER BY seq LIMIT ?3",
    )?;
    let msgs = stmt
        .query_map(
            params![match_id.to_string(), after_seq.unwrap_or(0), limit as i64],
            row_to_message,
        )?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(msgs)
}

/// Latest message of a match, for list previews.
pub fn last_message(conn: &Connection, match_id: Uuid) -> Result<Option<Message>, Error> {
    let mut stmt = conn.prepare(
        "SELECT id, match_id, sender_id, body, seq, created_at, read_at FROM messages \
         WHERE match_id = ?1 ORDER BY seq DESC LIMIT 1",
    )?;
    let msg = stmt
        .query_row([match_id.to_string()], row_to_message)
        .optional()?;
    Ok(msg)
}

/// Set `read_at` once. Only the non-sender participant may read; a second
/// call is a no-op returning the unchanged message.
pub fn mark_read(conn: &Connection, message_id: Uuid, reader: Uuid) -> Result<Message, Error> {
    let msg = get_message(conn, message_id)?.ok_or(Error::NotFound("message"))?;
    let m = matches::require_match(conn, msg.match_id)?;
    if reader == msg.sender_id || !m.has_participant(reader) {
        return Err(Error::NotRecipient);
    }
    if msg.read_at.is_some() {
        return Ok(msg);
    }
    let now = OffsetDateTime::now_utc().unix_timestamp();
    conn.execute(
        "UPDATE messages SET read_at = ?2 WHERE id = ?1 AND read_at IS NULL",
        params![message_id.to_string(), now],
    )?;
    get_message(conn, message_id)?.ok_or(Error::NotFound("message"))
}

/// Unread messages addressed to `user_id` within a match.
pub fn unread_count(conn: &Connection, match_id: Uuid, user_id: Uuid) -> Result<u32, Error> {
    let mut stmt = conn.prepare(
        "SELECT COUNT(*) FROM messages WHERE match_id = ?1 AND sender_id <> ?2 AND read_at IS NULL",
    )?;
    let count: u32 = stmt.query_row(
        params![match_id.to_string(), user_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(count)
}

pub fn get_message(conn: &Connection, id: Uuid) -> Result<Option<Message>, Error> {
    let mut stmt = conn.prepare(
        "SELECT id, match_id, sender_id, body, seq, created_at, read_at FROM messages WHERE id = ?1",
    )?;
    let msg = stmt.query_row([id.to_string()], row_to_message).optional()?;
    Ok(msg)
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    Ok(Message {
        id: Uuid::parse_str(row.get::<_, String>(0)?.as_str()).unwrap(),
        match_id: Uuid::parse_str(row.get::<_, String>(1)?.as_str()).unwrap(),
        sender_id: Uuid::parse_str(row.get::<_, String>(2)?.as_str()).unwrap(),
        body: row.get(3)?,
        seq: row.get(4)?,
        created_at: row.get(5)?,
        read_at: row.get(6)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{db, users};

    fn matched_pair(conn: &Connection) -> (Uuid, Uuid, Uuid) {
        let alice = users::create_user(conn, "alice", "Alice").unwrap();
        let bob = users::create_user(conn, "bob", "Bob").unwrap();
        matches::like_user(conn, alice.id, bob.id).unwrap();
        let out = matches::like_user(conn, bob.id, alice.id).unwrap();
        (out.match_id.unwrap(), alice.id, bob.id)
    }

    #[test]
    fn conversation_keeps_send_order() {
        let conn = db::init_db(":memory:").unwrap();
        let (match_id, alice, bob) = matched_pair(&conn);
        post_message(&conn, match_id, alice, "hi").unwrap();
        post_message(&conn, match_id, bob, "hey").unwrap();
        post_message(&conn, match_id, alice, "how are you").unwrap();
        let msgs = list_messages(&conn, match_id, alice, None, None).unwrap();
        let bodies: Vec<&str> = msgs.iter().map(|m| m.body.as_str()).collect();
        assert_eq!(bodies, ["hi", "hey", "how are you"]);
        // seq is strictly increasing even when timestamps tie
        assert!(msgs.windows(2).all(|w| w[0].seq < w[1].seq));
    }

    #[test]
    fn outsiders_cannot_post_or_read() {
        let conn = db::init_db(":memory:").unwrap();
        let (match_id, _, _) = matched_pair(&conn);
        let carol = users::create_user(&conn, "carol", "Carol").unwrap();
        let err = post_message(&conn, match_id, carol.id, "let me in").unwrap_err();
        assert_eq!(err.to_string(), "not_participant");
        let err = list_messages(&conn, match_id, carol.id, None, None).unwrap_err();
        assert_eq!(err.to_string(), "not_participant");
    }

    #[test]
    fn body_must_be_non_empty_after_trim() {
        let conn = db::init_db(":memory:").unwrap();
        let (match_id, alice, _) = matched_pair(&conn);
        let err = post_message(&conn, match_id, alice, "   \n").unwrap_err();
        assert_eq!(err.to_string(), "empty_message");
        let msg = post_message(&conn, match_id, alice, "  hi  ").unwrap();
        assert_eq!(msg.body, "hi");
    }

    #[test]
    fn unknown_match_is_reported() {
        let conn = db::init_db(":memory:").unwrap();
        let alice = users::create_user(&conn, "alice", "Alice").unwrap();
        let err = post_message(&conn, Uuid::new_v4(), alice.id, "hi").unwrap_err();
        assert_eq!(err.to_string(), "match_not_found");
    }

    #[test]
    fn mark_read_once_by_recipient_only() {
        let conn = db::init_db(":memory:").unwrap();
        let (match_id, alice, bob) = matched_pair(&conn);
        let msg = post_message(&conn, match_id, alice, "hi").unwrap();
        assert_eq!(unread_count(&conn, match_id, bob).unwrap(), 1);

        let err = mark_read(&conn, msg.id, alice).unwrap_err();
        assert_eq!(err.to_string(), "not_recipient");

        let read = mark_read(&conn, msg.id, bob).unwrap();
        assert!(read.read_at.is_some());
        assert_eq!(unread_count(&conn, match_id, bob).unwrap(), 0);

        let again = mark_read(&conn, msg.id, bob).unwrap();
        assert_eq!(again, read);

        let err = mark_read(&conn, Uuid::new_v4(), bob).unwrap_err();
        assert_eq!(err.to_string(), "message_not_found");
    }

    #[test]
    fn concurrent_sends_never_tie() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chat.db");
        let setup = db::init_db(&path).unwrap();
        let (match_id, alice, bob) = matched_pair(&setup);
        drop(setup);

        let mut handles = Vec::new();
        for (t, sender) in [alice, bob, alice, bob].into_iter().enumerate() {
            let path = path.clone();
            handles.push(std::thread::spawn(move || {
                let conn = db::init_db(&path).unwrap();
                (0..10)
                    .map(|i| {
                        post_message(&conn, match_id, sender, &format!("t{t}-{i}"))
                            .unwrap()
                            .seq
                    })
                    .collect::<Vec<i64>>()
            }));
        }
        let mut seqs: Vec<i64> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        assert_eq!(seqs.len(), 40);
        seqs.sort_unstable();
        seqs.dedup();
        assert_eq!(seqs.len(), 40, "two sends shared a seq slot");

        let conn = db::init_db(&path).unwrap();
        let msgs = list_messages(&conn, match_id, alice, None, None).unwrap();
        assert_eq!(msgs.len(), 40);
        assert!(msgs.windows(2).all(|w| w[0].seq < w[1].seq));
    }

    #[test]
    fn after_seq_restarts_past_a_stable_prefix() {
        let conn = db::init_db(":memory:").unwrap();
        let (match_id, alice, bob) = matched_pair(&conn);
        for i in 0..5 {
            let from = if i % 2 == 0 { alice } else { bob };
            post_message(&conn, match_id, from, &format!("m{i}")).unwrap();
        }
        let all = list_messages(&conn, match_id, alice, None, None).unwrap();
        let first = list_messages(&conn, match_id, alice, None, Some(2)).unwrap();
        assert_eq!(first.len(), 2);
        let rest =
            list_messages(&conn, match_id, alice, Some(first[1].seq), None).unwrap();
        let mut combined = first.clone();
        combined.extend(rest);
        assert_eq!(combined, all);
        // re-invocation yields the same prefix
        assert_eq!(
            list_messages(&conn, match_id, alice, None, Some(2)).unwrap(),
            first
        );
    }
}

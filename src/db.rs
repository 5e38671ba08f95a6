use anyhow::Result;
use rusqlite::Connection;
use std::path::Path;
use std::time::Duration;

/// Open the SQLite database, apply pragmas and run migrations.
pub fn init_db<P: AsRef<Path>>(path: P) -> Result<Connection> {
    let conn = Connection::open(path)?;
    conn.busy_timeout(Duration::from_secs(5))?;
    conn.execute_batch(PRAGMAS)?;
    conn.execute_batch(SCHEMA)?;
    Ok(conn)
}

/// Applied to every connection, pooled ones included.
pub const PRAGMAS: &str = "PRAGMA journal_mode = WAL; PRAGMA foreign_keys = ON;";

// The uniqueness constraints carry the core invariants: one like per ordered
// pair, one match per canonical pair, one seq slot per match. All
// insert-if-absent writes lean on them instead of application locks.
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
  id TEXT PRIMARY KEY,
  username TEXT UNIQUE NOT NULL,
  display_name TEXT NOT NULL,
  created_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS likes (
  liker_id TEXT NOT NULL REFERENCES users(id),
  likee_id TEXT NOT NULL REFERENCES users(id),
  created_at INTEGER NOT NULL,
  PRIMARY KEY (liker_id, likee_id)
);

CREATE TABLE IF NOT EXISTS matches (
  id TEXT PRIMARY KEY,
  user_low TEXT NOT NULL REFERENCES users(id),
  user_high TEXT NOT NULL REFERENCES users(id),
  created_at INTEGER NOT NULL,
  UNIQUE (user_low, user_high)
);

CREATE TABLE IF NOT EXISTS messages (
  id TEXT PRIMARY KEY,
  match_id TEXT NOT NULL REFERENCES matches(id),
  sender_id TEXT NOT NULL REFERENCES users(id),
  body TEXT NOT NULL,
  seq INTEGER NOT NULL,
  created_at INTEGER NOT NULL,
  read_at INTEGER,
  UNIQUE (match_id, seq)
);

CREATE INDEX IF NOT EXISTS idx_likes_likee ON likes (likee_id);
CREATE INDEX IF NOT EXISTS idx_messages_match ON messages (match_id, seq);
"#;

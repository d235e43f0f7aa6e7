//! v001 -- Initial schema creation.
//!
//! Creates the conversation tables: `conversations`, `conversation_meta`
//! and `messages`.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Conversations (one row per participant pair)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS conversations (
    key           TEXT PRIMARY KEY NOT NULL,  -- "<low>_<high>" sorted identities
    participant_a TEXT NOT NULL,              -- lower identity
    participant_b TEXT NOT NULL,              -- higher identity
    last_message  TEXT NOT NULL DEFAULT '',
    created_at    TEXT NOT NULL,              -- RFC-3339, microseconds, UTC
    updated_at    TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_conversations_a ON conversations(participant_a, updated_at DESC);
CREATE INDEX IF NOT EXISTS idx_conversations_b ON conversations(participant_b, updated_at DESC);

-- ----------------------------------------------------------------
-- Per-participant display metadata and unread counters
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS conversation_meta (
    conversation_key TEXT NOT NULL,           -- FK -> conversations(key)
    identity         TEXT NOT NULL,
    display_name     TEXT,
    avatar           TEXT,
    unread_count     INTEGER NOT NULL DEFAULT 0 CHECK (unread_count >= 0),

    PRIMARY KEY (conversation_key, identity),
    FOREIGN KEY (conversation_key) REFERENCES conversations(key) ON DELETE CASCADE
);

-- ----------------------------------------------------------------
-- Messages (append-only)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS messages (
    seq              INTEGER PRIMARY KEY AUTOINCREMENT,
    id               TEXT NOT NULL UNIQUE,    -- UUID v4
    conversation_key TEXT NOT NULL,           -- FK -> conversations(key)
    sender_id        TEXT NOT NULL,
    text             TEXT NOT NULL,
    created_at       TEXT NOT NULL,           -- server-assigned

    FOREIGN KEY (conversation_key) REFERENCES conversations(key) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_messages_conversation_ts
    ON messages(conversation_key, created_at ASC, seq ASC);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}

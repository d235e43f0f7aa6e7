//! v002 -- Participant directory: user profiles and provider listings.

use rusqlite::Connection;

const UP_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS profiles (
    identity        TEXT PRIMARY KEY NOT NULL,
    first_name      TEXT,
    last_name       TEXT,
    email           TEXT,
    phone           TEXT,
    profile_image   TEXT,                      -- avatar URL
    payment_method  TEXT,                      -- JSON {network, accountName, number}
    payment_details TEXT,                      -- free-form fallback
    created_at      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS listings (
    id           TEXT PRIMARY KEY NOT NULL,    -- UUID v4
    owner_id     TEXT NOT NULL,                -- identity that posted the listing
    service_name TEXT NOT NULL,
    description  TEXT,
    location     TEXT,
    created_at   TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_listings_owner ON listings(owner_id, created_at ASC);
"#;

pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}

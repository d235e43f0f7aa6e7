//! CRUD operations for [`ConversationRecord`]s and their per-participant
//! metadata.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

use parley_shared::{ConversationKey, Identity};

use crate::database::{conversion_failure, format_ts, parse_ts, Database};
use crate::error::{Result, StoreError};
use crate::models::{ConversationRecord, NewConversation, ParticipantMeta};

const SELECT_CONVERSATION: &str =
    "SELECT key, participant_a, participant_b, last_message, created_at, updated_at
     FROM conversations";

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Write a conversation with an empty preview and the given metadata.
    ///
    /// If a row with the same key already exists it is overwritten
    /// (last write wins). Messages are never touched.
    pub fn upsert_conversation(
        &mut self,
        draft: &NewConversation,
        now: DateTime<Utc>,
    ) -> Result<ConversationRecord> {
        let [a, b] = sorted(&draft.participants);
        let ts = format_ts(&now);

        let tx = self.conn_mut().transaction()?;
        tx.execute(
            "INSERT INTO conversations (key, participant_a, participant_b, last_message, created_at, updated_at)
             VALUES (?1, ?2, ?3, '', ?4, ?4)
             ON CONFLICT(key) DO UPDATE SET
                 last_message = '',
                 created_at   = excluded.created_at,
                 updated_at   = excluded.updated_at",
            params![draft.key.as_str(), a.as_str(), b.as_str(), ts],
        )?;
        tx.execute(
            "DELETE FROM conversation_meta WHERE conversation_key = ?1",
            params![draft.key.as_str()],
        )?;
        for (identity, meta) in &draft.meta {
            tx.execute(
                "INSERT INTO conversation_meta (conversation_key, identity, display_name, avatar, unread_count)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    draft.key.as_str(),
                    identity.as_str(),
                    meta.display_name,
                    meta.avatar,
                    meta.unread_count,
                ],
            )?;
        }
        tx.commit()?;

        self.get_conversation(&draft.key)?.ok_or(StoreError::NotFound)
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Fetch a conversation and its metadata, `None` when absent.
    pub fn get_conversation(&self, key: &ConversationKey) -> Result<Option<ConversationRecord>> {
        let record = self
            .conn()
            .query_row(
                &format!("{SELECT_CONVERSATION} WHERE key = ?1"),
                params![key.as_str()],
                row_to_conversation,
            )
            .optional()?;

        match record {
            Some(mut record) => {
                record.meta = self.load_meta(&record.key)?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// Every conversation `identity` takes part in, most recently updated
    /// first.
    pub fn list_conversations_for(&self, identity: &Identity) -> Result<Vec<ConversationRecord>> {
        let mut stmt = self.conn().prepare(&format!(
            "{SELECT_CONVERSATION}
             WHERE participant_a = ?1 OR participant_b = ?1
             ORDER BY updated_at DESC, key ASC"
        ))?;

        let rows = stmt.query_map(params![identity.as_str()], row_to_conversation)?;

        let mut records = Vec::new();
        for row in rows {
            let mut record = row?;
            record.meta = self.load_meta(&record.key)?;
            records.push(record);
        }
        Ok(records)
    }

    fn load_meta(&self, key: &ConversationKey) -> Result<BTreeMap<Identity, ParticipantMeta>> {
        let mut stmt = self.conn().prepare(
            "SELECT identity, display_name, avatar, unread_count
             FROM conversation_meta
             WHERE conversation_key = ?1",
        )?;

        let rows = stmt.query_map(params![key.as_str()], |row| {
            let identity: String = row.get(0)?;
            let identity = Identity::parse(identity).map_err(|e| conversion_failure(0, e))?;
            Ok((
                identity,
                ParticipantMeta {
                    display_name: row.get(1)?,
                    avatar: row.get(2)?,
                    unread_count: row.get(3)?,
                },
            ))
        })?;

        rows.collect::<std::result::Result<BTreeMap<_, _>, _>>()
            .map_err(StoreError::Sqlite)
    }

    // ------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------

    /// Set the preview to `text` and bump the unread count of every
    /// participant except `sender`.
    pub fn record_send(
        &mut self,
        key: &ConversationKey,
        sender: &Identity,
        text: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let record = self.get_conversation(key)?.ok_or(StoreError::NotFound)?;

        let tx = self.conn_mut().transaction()?;
        tx.execute(
            "UPDATE conversations SET last_message = ?2, updated_at = ?3 WHERE key = ?1",
            params![key.as_str(), text, format_ts(&now)],
        )?;
        for recipient in record.participants.iter().filter(|p| *p != sender) {
            tx.execute(
                "INSERT INTO conversation_meta (conversation_key, identity, unread_count)
                 VALUES (?1, ?2, 1)
                 ON CONFLICT(conversation_key, identity)
                 DO UPDATE SET unread_count = unread_count + 1",
                params![key.as_str(), recipient.as_str()],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Zero the unread count of `reader`. Creates the metadata entry when
    /// it is missing.
    pub fn reset_unread(
        &mut self,
        key: &ConversationKey,
        reader: &Identity,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let tx = self.conn_mut().transaction()?;
        touch(&tx, key, &now)?;
        tx.execute(
            "INSERT INTO conversation_meta (conversation_key, identity, unread_count)
             VALUES (?1, ?2, 0)
             ON CONFLICT(conversation_key, identity)
             DO UPDATE SET unread_count = 0",
            params![key.as_str(), reader.as_str()],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Rewrite the cached label and avatar of `participant`, preserving its
    /// unread count.
    pub fn refresh_participant(
        &mut self,
        key: &ConversationKey,
        participant: &Identity,
        display_name: &str,
        avatar: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let tx = self.conn_mut().transaction()?;
        touch(&tx, key, &now)?;
        tx.execute(
            "INSERT INTO conversation_meta (conversation_key, identity, display_name, avatar, unread_count)
             VALUES (?1, ?2, ?3, ?4, 0)
             ON CONFLICT(conversation_key, identity)
             DO UPDATE SET display_name = excluded.display_name, avatar = excluded.avatar",
            params![key.as_str(), participant.as_str(), display_name, avatar],
        )?;
        tx.commit()?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Delete
    // ------------------------------------------------------------------

    /// Delete a conversation. ON DELETE CASCADE removes its messages and
    /// metadata. Returns `true` if a row was deleted.
    pub fn delete_conversation(&self, key: &ConversationKey) -> Result<bool> {
        let affected = self.conn().execute(
            "DELETE FROM conversations WHERE key = ?1",
            params![key.as_str()],
        )?;
        Ok(affected > 0)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn sorted(participants: &[Identity; 2]) -> [&Identity; 2] {
    let [a, b] = participants;
    if a <= b {
        [a, b]
    } else {
        [b, a]
    }
}

/// Bump `updated_at`, failing with [`StoreError::NotFound`] when the
/// conversation is gone.
fn touch(conn: &rusqlite::Connection, key: &ConversationKey, now: &DateTime<Utc>) -> Result<()> {
    let affected = conn.execute(
        "UPDATE conversations SET updated_at = ?2 WHERE key = ?1",
        params![key.as_str(), format_ts(now)],
    )?;
    if affected == 0 {
        return Err(StoreError::NotFound);
    }
    Ok(())
}

/// Map a `rusqlite::Row` to a [`ConversationRecord`] without metadata.
fn row_to_conversation(row: &rusqlite::Row<'_>) -> rusqlite::Result<ConversationRecord> {
    let key: String = row.get(0)?;
    let a: String = row.get(1)?;
    let b: String = row.get(2)?;
    let last_message: String = row.get(3)?;
    let created_str: String = row.get(4)?;
    let updated_str: String = row.get(5)?;

    let key = ConversationKey::parse(&key).map_err(|e| conversion_failure(0, e))?;
    let a = Identity::parse(a).map_err(|e| conversion_failure(1, e))?;
    let b = Identity::parse(b).map_err(|e| conversion_failure(2, e))?;

    Ok(ConversationRecord {
        key,
        participants: [a, b],
        last_message,
        created_at: parse_ts(4, &created_str)?,
        updated_at: parse_ts(5, &updated_str)?,
        meta: BTreeMap::new(),
    })
}

use rusqlite::params;
use uuid::Uuid;

use parley_shared::{ConversationKey, Identity};

use crate::database::{conversion_failure, format_ts, not_found, parse_ts, Database};
use crate::error::{Result, StoreError};
use crate::models::Message;

impl Database {
    pub fn insert_message(&self, message: &Message) -> Result<()> {
        self.conn().execute(
            "INSERT INTO messages (id, conversation_key, sender_id, text, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                message.id.to_string(),
                message.conversation_key.as_str(),
                message.sender_id.as_str(),
                message.text,
                format_ts(&message.created_at),
            ],
        )?;
        Ok(())
    }

    /// All messages of a conversation, oldest first. Equal timestamps fall
    /// back to insertion order.
    pub fn get_messages_for_conversation(&self, key: &ConversationKey) -> Result<Vec<Message>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, conversation_key, sender_id, text, created_at
             FROM messages
             WHERE conversation_key = ?1
             ORDER BY created_at ASC, seq ASC",
        )?;

        let rows = stmt.query_map(params![key.as_str()], row_to_message)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)
    }

    pub fn get_message_by_id(&self, id: Uuid) -> Result<Message> {
        self.conn()
            .query_row(
                "SELECT id, conversation_key, sender_id, text, created_at
                 FROM messages WHERE id = ?1",
                params![id.to_string()],
                row_to_message,
            )
            .map_err(not_found)
    }

    pub fn count_messages(&self, key: &ConversationKey) -> Result<u64> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM messages WHERE conversation_key = ?1",
            params![key.as_str()],
            |row| row.get(0),
        )?;
        Ok(count.max(0) as u64)
    }
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    let id_str: String = row.get(0)?;
    let key_str: String = row.get(1)?;
    let sender_str: String = row.get(2)?;
    let text: String = row.get(3)?;
    let ts_str: String = row.get(4)?;

    let id = Uuid::parse_str(&id_str).map_err(|e| conversion_failure(0, e))?;
    let conversation_key = ConversationKey::parse(&key_str).map_err(|e| conversion_failure(1, e))?;
    let sender_id = Identity::parse(sender_str).map_err(|e| conversion_failure(2, e))?;

    Ok(Message {
        id,
        conversation_key,
        sender_id,
        text,
        created_at: parse_ts(4, &ts_str)?,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::{DateTime, Duration, Utc};

    use super::*;
    use crate::models::NewConversation;

    fn id(s: &str) -> Identity {
        Identity::parse(s).unwrap()
    }

    fn conversation(db: &mut Database) -> ConversationKey {
        let key = parley_shared::resolve_key(&id("u1"), &id("u2"));
        db.upsert_conversation(
            &NewConversation {
                key: key.clone(),
                participants: [id("u1"), id("u2")],
                meta: BTreeMap::new(),
            },
            Utc::now(),
        )
        .unwrap();
        key
    }

    fn message(key: &ConversationKey, sender: &str, text: &str, at: DateTime<Utc>) -> Message {
        Message {
            id: Uuid::new_v4(),
            conversation_key: key.clone(),
            sender_id: id(sender),
            text: text.to_string(),
            created_at: at,
        }
    }

    #[test]
    fn ordered_by_timestamp_not_insertion() {
        let mut db = Database::open_in_memory().unwrap();
        let key = conversation(&mut db);
        let t0 = Utc::now();

        db.insert_message(&message(&key, "u1", "second", t0 + Duration::seconds(2)))
            .unwrap();
        db.insert_message(&message(&key, "u2", "first", t0 + Duration::seconds(1)))
            .unwrap();
        db.insert_message(&message(&key, "u1", "third", t0 + Duration::seconds(3)))
            .unwrap();

        let texts: Vec<_> = db
            .get_messages_for_conversation(&key)
            .unwrap()
            .into_iter()
            .map(|m| m.text)
            .collect();
        assert_eq!(texts, ["first", "second", "third"]);
    }

    #[test]
    fn empty_conversation_has_no_messages() {
        let mut db = Database::open_in_memory().unwrap();
        let key = conversation(&mut db);
        assert!(db.get_messages_for_conversation(&key).unwrap().is_empty());
    }

    #[test]
    fn lookup_by_id() {
        let mut db = Database::open_in_memory().unwrap();
        let key = conversation(&mut db);
        let m = message(&key, "u1", "hi", Utc::now());
        db.insert_message(&m).unwrap();

        assert_eq!(db.get_message_by_id(m.id).unwrap().text, "hi");
        assert!(matches!(
            db.get_message_by_id(Uuid::new_v4()),
            Err(StoreError::NotFound)
        ));
    }

    #[test]
    fn deleting_conversation_cascades_to_messages() {
        let mut db = Database::open_in_memory().unwrap();
        let key = conversation(&mut db);
        db.insert_message(&message(&key, "u1", "hi", Utc::now()))
            .unwrap();
        assert_eq!(db.count_messages(&key).unwrap(), 1);

        db.delete_conversation(&key).unwrap();
        assert_eq!(db.count_messages(&key).unwrap(), 0);
    }

    #[test]
    fn message_needs_existing_conversation() {
        let db = Database::open_in_memory().unwrap();
        let key = parley_shared::resolve_key(&id("u1"), &id("u9"));
        assert!(db
            .insert_message(&message(&key, "u1", "orphan", Utc::now()))
            .is_err());
    }
}

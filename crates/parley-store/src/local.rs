//! [`DocumentStore`] backed by the local SQLite [`Database`].
//!
//! Adds what a hosted document store provides on top of plain storage:
//! server timestamps from a [`ServerClock`], participant access rules, and
//! live queries driven by a [`ChangeFeed`].

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tracing::{debug, info};
use uuid::Uuid;

use parley_shared::constants::{CHANGE_FEED_CAPACITY, DEFAULT_SUBSCRIPTION_BUFFER};
use parley_shared::{resolve_key, ConversationKey, Identity};

use crate::backend::DocumentStore;
use crate::clock::ServerClock;
use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::feed::{ChangeEvent, ChangeFeed, Subscription};
use crate::models::{
    ConversationRecord, ConversationUpdate, Listing, Message, NewConversation, Profile,
};

/// Shared handle to a local store. Clones share the same database, clock
/// and change feed.
#[derive(Clone)]
pub struct LocalStore {
    db: Arc<Mutex<Database>>,
    feed: ChangeFeed,
    clock: Arc<ServerClock>,
    subscription_buffer: usize,
}

impl LocalStore {
    pub fn new(db: Database) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
            feed: ChangeFeed::new(CHANGE_FEED_CAPACITY),
            clock: Arc::new(ServerClock::new()),
            subscription_buffer: DEFAULT_SUBSCRIPTION_BUFFER,
        }
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::new(Database::open_in_memory()?))
    }

    /// Capacity of each live query's delivery channel (at least 1).
    pub fn with_subscription_buffer(mut self, buffer: usize) -> Self {
        self.subscription_buffer = buffer.max(1);
        self
    }

    pub fn feed(&self) -> &ChangeFeed {
        &self.feed
    }

    // ------------------------------------------------------------------
    // Directory writes (plain CRUD for the surrounding app)
    // ------------------------------------------------------------------

    pub fn put_profile(&self, profile: &Profile) -> Result<()> {
        self.with_db(|db| db.upsert_profile(profile))
    }

    pub fn put_listing(&self, listing: &Listing) -> Result<()> {
        self.with_db(|db| db.insert_listing(listing))
    }

    /// Number of stored messages under `key`, including ones no participant
    /// can reach any more.
    pub fn message_count(&self, key: &ConversationKey) -> Result<u64> {
        self.with_db(|db| db.count_messages(key))
    }

    fn with_db<R>(&self, f: impl FnOnce(&mut Database) -> Result<R>) -> Result<R> {
        let mut guard = lock(&self.db)?;
        f(&mut guard)
    }

    fn publish_conversation(&self, record: &ConversationRecord) {
        self.feed.publish(ChangeEvent::Conversation {
            key: record.key.clone(),
            participants: record.participants.clone(),
        });
    }
}

#[async_trait]
impl DocumentStore for LocalStore {
    async fn get_conversation(
        &self,
        actor: &Identity,
        key: &ConversationKey,
    ) -> Result<Option<ConversationRecord>> {
        let record = self.with_db(|db| db.get_conversation(key))?;
        if let Some(record) = &record {
            authorize(record, actor)?;
        }
        Ok(record)
    }

    async fn create_conversation(
        &self,
        actor: &Identity,
        draft: NewConversation,
    ) -> Result<ConversationRecord> {
        let [a, b] = &draft.participants;
        if a == b {
            return Err(StoreError::Invalid(
                "a conversation needs two distinct participants".into(),
            ));
        }
        if resolve_key(a, b) != draft.key {
            return Err(StoreError::Invalid(format!(
                "key {} does not match participants {a} and {b}",
                draft.key
            )));
        }
        if !draft.participants.contains(actor) {
            return Err(StoreError::AccessDenied(format!(
                "{actor} cannot create a conversation it is not part of"
            )));
        }
        if let Some(stranger) = draft
            .meta
            .keys()
            .find(|id| !draft.participants.contains(id))
        {
            return Err(StoreError::Invalid(format!(
                "metadata for non-participant {stranger}"
            )));
        }

        // Stamped under the lock so commit order and timestamp order agree.
        let record = self.with_db(|db| db.upsert_conversation(&draft, self.clock.now()))?;

        info!(key = %record.key, by = %actor, "conversation written");
        self.publish_conversation(&record);
        Ok(record)
    }

    async fn update_conversation(
        &self,
        actor: &Identity,
        key: &ConversationKey,
        update: ConversationUpdate,
    ) -> Result<ConversationRecord> {
        let record = self.with_db(|db| {
            let current = db.get_conversation(key)?.ok_or(StoreError::NotFound)?;
            authorize(&current, actor)?;
            let now = self.clock.now();

            match &update {
                ConversationUpdate::RecordSend { sender, text } => {
                    if sender != actor {
                        return Err(StoreError::AccessDenied(format!(
                            "{actor} cannot record a send for {sender}"
                        )));
                    }
                    db.record_send(key, sender, text, now)?;
                }
                ConversationUpdate::ResetUnread { reader } => {
                    // Only the owner of a counter may clear it.
                    if reader != actor {
                        return Err(StoreError::AccessDenied(format!(
                            "{actor} cannot reset the unread count of {reader}"
                        )));
                    }
                    db.reset_unread(key, reader, now)?;
                }
                ConversationUpdate::RefreshParticipant {
                    participant,
                    display_name,
                    avatar,
                } => {
                    if !current.has_participant(participant) {
                        return Err(StoreError::Invalid(format!(
                            "{participant} is not a participant of {key}"
                        )));
                    }
                    db.refresh_participant(key, participant, display_name, avatar.as_deref(), now)?;
                }
            }

            db.get_conversation(key)?.ok_or(StoreError::NotFound)
        })?;

        debug!(key = %key, by = %actor, "conversation updated");
        self.publish_conversation(&record);
        Ok(record)
    }

    async fn delete_conversation(&self, actor: &Identity, key: &ConversationKey) -> Result<bool> {
        let deleted = self.with_db(|db| match db.get_conversation(key)? {
            Some(record) => {
                authorize(&record, actor)?;
                db.delete_conversation(key)?;
                Ok(Some(record))
            }
            None => Ok(None),
        })?;

        match deleted {
            Some(record) => {
                info!(key = %key, by = %actor, "conversation deleted");
                self.publish_conversation(&record);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn watch_conversations(&self, participant: &Identity) -> Subscription<Vec<ConversationRecord>> {
        let db = self.db.clone();
        let me = participant.clone();
        let filter_me = participant.clone();

        Subscription::spawn(
            self.feed.subscribe(),
            self.subscription_buffer,
            move |event| match event {
                ChangeEvent::Conversation { participants, .. } => participants.contains(&filter_me),
                ChangeEvent::Messages { .. } => false,
            },
            move || lock(&db)?.list_conversations_for(&me),
        )
    }

    async fn append_message(
        &self,
        actor: &Identity,
        key: &ConversationKey,
        text: &str,
    ) -> Result<Message> {
        let message = self.with_db(|db| {
            let record = db.get_conversation(key)?.ok_or_else(|| {
                StoreError::AccessDenied(format!("conversation {key} is not accessible"))
            })?;
            authorize(&record, actor)?;

            let message = Message {
                id: Uuid::new_v4(),
                conversation_key: key.clone(),
                sender_id: actor.clone(),
                text: text.to_string(),
                created_at: self.clock.now(),
            };
            db.insert_message(&message)?;
            Ok(message)
        })?;

        debug!(key = %key, id = %message.id, "message appended");
        self.feed.publish(ChangeEvent::Messages { key: key.clone() });
        Ok(message)
    }

    fn watch_messages(&self, actor: &Identity, key: &ConversationKey) -> Subscription<Vec<Message>> {
        let db = self.db.clone();
        let actor = actor.clone();
        let key = key.clone();
        let filter_key = key.clone();

        Subscription::spawn(
            self.feed.subscribe(),
            self.subscription_buffer,
            move |event| event.key() == &filter_key,
            move || {
                let db = lock(&db)?;
                match db.get_conversation(&key)? {
                    Some(record) if record.has_participant(&actor) => {
                        db.get_messages_for_conversation(&key)
                    }
                    _ => Err(StoreError::AccessDenied(format!(
                        "{actor} cannot read conversation {key}"
                    ))),
                }
            },
        )
    }

    async fn get_profile(&self, identity: &Identity) -> Result<Option<Profile>> {
        self.with_db(|db| db.get_profile(identity))
    }

    async fn find_listing_by_owner(&self, owner: &Identity) -> Result<Option<Listing>> {
        self.with_db(|db| db.find_listing_by_owner(owner))
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn lock(db: &Mutex<Database>) -> Result<MutexGuard<'_, Database>> {
    db.lock()
        .map_err(|_| StoreError::Unavailable("database lock poisoned".into()))
}

fn authorize(record: &ConversationRecord, actor: &Identity) -> Result<()> {
    if record.has_participant(actor) {
        Ok(())
    } else {
        Err(StoreError::AccessDenied(format!(
            "{actor} is not a participant of {}",
            record.key
        )))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::models::ParticipantMeta;

    fn id(s: &str) -> Identity {
        Identity::parse(s).unwrap()
    }

    fn draft(a: &str, b: &str) -> NewConversation {
        let (a, b) = (id(a), id(b));
        let meta = [&a, &b]
            .into_iter()
            .map(|p| (p.clone(), ParticipantMeta::labelled(p.to_string(), None)))
            .collect::<BTreeMap<_, _>>();
        NewConversation {
            key: resolve_key(&a, &b),
            participants: [a, b],
            meta,
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_updates_never_move_updated_at_back() {
        let store = LocalStore::open_in_memory().unwrap();
        let key = store
            .create_conversation(&id("u1"), draft("u1", "u2"))
            .await
            .unwrap()
            .key;

        let writers: Vec<_> = ["u1", "u2", "u1", "u2"]
            .into_iter()
            .map(|who| {
                let store = store.clone();
                let key = key.clone();
                tokio::spawn(async move {
                    let mut seen = Vec::new();
                    for n in 0..200 {
                        let update = ConversationUpdate::RecordSend {
                            sender: id(who),
                            text: format!("{who} {n}"),
                        };
                        let record = store
                            .update_conversation(&id(who), &key, update)
                            .await
                            .unwrap();
                        seen.push(record.updated_at);
                    }
                    seen
                })
            })
            .collect();

        let mut latest = None;
        for writer in writers {
            let seen = writer.await.unwrap();
            assert!(seen.windows(2).all(|w| w[0] < w[1]));
            latest = latest.max(seen.last().copied());
        }

        let stored = store.get_conversation(&id("u1"), &key).await.unwrap().unwrap();
        assert_eq!(Some(stored.updated_at), latest);
    }

    #[tokio::test]
    async fn outsiders_are_denied() {
        let store = LocalStore::open_in_memory().unwrap();
        let record = store
            .create_conversation(&id("u1"), draft("u1", "u2"))
            .await
            .unwrap();
        let outsider = id("u3");

        assert!(matches!(
            store.get_conversation(&outsider, &record.key).await,
            Err(StoreError::AccessDenied(_))
        ));
        assert!(matches!(
            store.append_message(&outsider, &record.key, "hi").await,
            Err(StoreError::AccessDenied(_))
        ));
        assert!(matches!(
            store.delete_conversation(&outsider, &record.key).await,
            Err(StoreError::AccessDenied(_))
        ));
        assert!(matches!(
            store
                .create_conversation(&outsider, draft("u1", "u2"))
                .await,
            Err(StoreError::AccessDenied(_))
        ));
    }

    #[tokio::test]
    async fn missing_conversation_reads_as_none_but_append_is_denied() {
        let store = LocalStore::open_in_memory().unwrap();
        let key = resolve_key(&id("u1"), &id("u2"));

        assert!(store
            .get_conversation(&id("u1"), &key)
            .await
            .unwrap()
            .is_none());
        assert!(matches!(
            store.append_message(&id("u1"), &key, "hi").await,
            Err(StoreError::AccessDenied(_))
        ));
        assert!(!store.delete_conversation(&id("u1"), &key).await.unwrap());
    }

    #[tokio::test]
    async fn malformed_drafts_are_rejected() {
        let store = LocalStore::open_in_memory().unwrap();

        let mut wrong_key = draft("u1", "u2");
        wrong_key.key = resolve_key(&id("u1"), &id("u3"));
        assert!(matches!(
            store.create_conversation(&id("u1"), wrong_key).await,
            Err(StoreError::Invalid(_))
        ));

        let mut stranger_meta = draft("u1", "u2");
        stranger_meta
            .meta
            .insert(id("u9"), ParticipantMeta::default());
        assert!(matches!(
            store.create_conversation(&id("u1"), stranger_meta).await,
            Err(StoreError::Invalid(_))
        ));
    }

    #[tokio::test]
    async fn counters_belong_to_their_owner() {
        let store = LocalStore::open_in_memory().unwrap();
        let record = store
            .create_conversation(&id("u1"), draft("u1", "u2"))
            .await
            .unwrap();

        let reset_other = ConversationUpdate::ResetUnread { reader: id("u2") };
        assert!(matches!(
            store
                .update_conversation(&id("u1"), &record.key, reset_other)
                .await,
            Err(StoreError::AccessDenied(_))
        ));

        let spoofed = ConversationUpdate::RecordSend {
            sender: id("u2"),
            text: "not me".into(),
        };
        assert!(matches!(
            store.update_conversation(&id("u1"), &record.key, spoofed).await,
            Err(StoreError::AccessDenied(_))
        ));
    }

    #[tokio::test]
    async fn appended_messages_carry_increasing_server_time() {
        let store = LocalStore::open_in_memory().unwrap();
        let record = store
            .create_conversation(&id("u1"), draft("u1", "u2"))
            .await
            .unwrap();

        let m1 = store.append_message(&id("u1"), &record.key, "a").await.unwrap();
        let m2 = store.append_message(&id("u2"), &record.key, "b").await.unwrap();
        assert!(m2.created_at > m1.created_at);
        assert!(m1.created_at > record.created_at);
    }

    #[tokio::test]
    async fn message_watch_replays_then_follows() {
        let store = LocalStore::open_in_memory().unwrap();
        let record = store
            .create_conversation(&id("u1"), draft("u1", "u2"))
            .await
            .unwrap();
        store.append_message(&id("u1"), &record.key, "one").await.unwrap();

        let mut watch = store.watch_messages(&id("u2"), &record.key);
        let initial = watch.next().await.unwrap().unwrap();
        assert_eq!(initial.len(), 1);

        store.append_message(&id("u2"), &record.key, "two").await.unwrap();
        let texts: Vec<_> = watch
            .next()
            .await
            .unwrap()
            .unwrap()
            .into_iter()
            .map(|m| m.text)
            .collect();
        assert_eq!(texts, ["one", "two"]);
    }

    #[tokio::test]
    async fn message_watch_reports_errors_and_keeps_running() {
        let store = LocalStore::open_in_memory().unwrap();
        let key = resolve_key(&id("u1"), &id("u2"));

        let mut watch = store.watch_messages(&id("u1"), &key);
        assert!(matches!(
            watch.next().await.unwrap(),
            Err(StoreError::AccessDenied(_))
        ));

        store
            .create_conversation(&id("u1"), draft("u1", "u2"))
            .await
            .unwrap();
        assert!(watch.next().await.unwrap().unwrap().is_empty());
    }

    #[tokio::test]
    async fn conversation_watch_ignores_unrelated_records() {
        let store = LocalStore::open_in_memory().unwrap();
        let mut watch = store.watch_conversations(&id("u1"));
        assert!(watch.next().await.unwrap().unwrap().is_empty());

        store
            .create_conversation(&id("u2"), draft("u2", "u3"))
            .await
            .unwrap();
        let mine = store
            .create_conversation(&id("u1"), draft("u1", "u2"))
            .await
            .unwrap();

        let snapshot = watch.next().await.unwrap().unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].key, mine.key);
    }

    #[tokio::test]
    async fn delete_cascades_and_reaches_both_watchers() {
        let store = LocalStore::open_in_memory().unwrap();
        let record = store
            .create_conversation(&id("u1"), draft("u1", "u2"))
            .await
            .unwrap();
        store.append_message(&id("u1"), &record.key, "hi").await.unwrap();

        let mut w1 = store.watch_conversations(&id("u1"));
        let mut w2 = store.watch_conversations(&id("u2"));
        assert_eq!(w1.next().await.unwrap().unwrap().len(), 1);
        assert_eq!(w2.next().await.unwrap().unwrap().len(), 1);

        assert!(store
            .delete_conversation(&id("u2"), &record.key)
            .await
            .unwrap());

        assert!(w1.next().await.unwrap().unwrap().is_empty());
        assert!(w2.next().await.unwrap().unwrap().is_empty());
        assert_eq!(store.message_count(&record.key).unwrap(), 0);
    }
}

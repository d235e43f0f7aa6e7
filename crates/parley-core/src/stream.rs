//! Message stream: the append-only transcript of a conversation.

use std::sync::Arc;

use tracing::debug;

use parley_shared::{ConversationKey, Identity};
use parley_store::{DocumentStore, Message, Subscription};

use crate::error::{ChatError, Result};

#[derive(Clone)]
pub struct MessageStream {
    store: Arc<dyn DocumentStore>,
}

impl MessageStream {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Append `text` as sent by `sender`. Blank text is rejected before the
    /// store is called. The text is stored as given, untrimmed.
    pub async fn append(
        &self,
        key: &ConversationKey,
        sender: &Identity,
        text: &str,
    ) -> Result<Message> {
        if text.trim().is_empty() {
            return Err(ChatError::EmptyInput);
        }
        let message = self.store.append_message(sender, key, text).await?;
        debug!(key = %key, id = %message.id, "message appended");
        Ok(message)
    }

    /// Live transcript, oldest first. Every subscription starts with the full
    /// history.
    pub fn subscribe(&self, key: &ConversationKey, reader: &Identity) -> Subscription<Vec<Message>> {
        self.store.watch_messages(reader, key)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::records::ConversationRecords;
    use crate::testing::{id, seeded_store, FlakyStore};
    use parley_shared::resolve_key;

    async fn open(store: Arc<dyn DocumentStore>) -> ConversationKey {
        let key = resolve_key(&id("u1"), &id("u2"));
        ConversationRecords::new(store)
            .get_or_create(&id("u1"), &key, [id("u1"), id("u2")], Default::default())
            .await
            .unwrap();
        key
    }

    #[tokio::test]
    async fn blank_text_never_reaches_the_store() {
        let store = FlakyStore::new(seeded_store());
        let key = open(store.clone()).await;
        let stream = MessageStream::new(store.clone());

        for blank in ["", "   ", "\n\t "] {
            let err = stream.append(&key, &id("u1"), blank).await.unwrap_err();
            assert_eq!(err, ChatError::EmptyInput);
        }
        assert_eq!(FlakyStore::count(&store.appends), 0);
        assert_eq!(store.inner.message_count(&key).unwrap(), 0);
    }

    #[tokio::test]
    async fn text_is_stored_as_submitted() {
        let store = Arc::new(seeded_store());
        let key = open(store.clone()).await;
        let stream = MessageStream::new(store);

        let message = stream.append(&key, &id("u1"), "  hello  ").await.unwrap();
        assert_eq!(message.text, "  hello  ");
        assert_eq!(message.sender_id, id("u1"));
    }

    #[tokio::test]
    async fn subscription_orders_by_server_time() {
        let store = Arc::new(seeded_store());
        let key = open(store.clone()).await;
        let stream = MessageStream::new(store);

        let mut live = stream.subscribe(&key, &id("u2"));
        assert!(live.next().await.unwrap().unwrap().is_empty());

        // Interleave the two senders from separate tasks.
        let a = {
            let stream = stream.clone();
            let key = key.clone();
            tokio::spawn(async move { stream.append(&key, &id("u1"), "m1").await.unwrap() })
        };
        let m1 = a.await.unwrap();
        let b = {
            let stream = stream.clone();
            let key = key.clone();
            tokio::spawn(async move { stream.append(&key, &id("u2"), "m2").await.unwrap() })
        };
        let m2 = b.await.unwrap();
        let m3 = stream.append(&key, &id("u1"), "m3").await.unwrap();
        assert!(m1.created_at < m2.created_at && m2.created_at < m3.created_at);

        let mut latest = Vec::new();
        while latest.len() < 3 {
            latest = tokio::time::timeout(Duration::from_secs(5), live.next())
                .await
                .unwrap()
                .unwrap()
                .unwrap();
        }
        let texts: Vec<&str> = latest.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, ["m1", "m2", "m3"]);

        // A fresh subscription replays the same order.
        let mut replay = stream.subscribe(&key, &id("u1"));
        let replayed = replay.next().await.unwrap().unwrap();
        assert_eq!(replayed, latest);
    }

    #[tokio::test]
    async fn sending_while_offline_fails() {
        let store = FlakyStore::new(seeded_store());
        let key = open(store.clone()).await;
        FlakyStore::set(&store.offline, true);

        let err = MessageStream::new(store.clone())
            .append(&key, &id("u1"), "hello")
            .await
            .unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(store.inner.message_count(&key).unwrap(), 0);
    }

    #[tokio::test]
    async fn strangers_are_denied() {
        let store = Arc::new(seeded_store());
        let key = open(store.clone()).await;

        let err = MessageStream::new(store)
            .append(&key, &id("u3"), "let me in")
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::AccessDenied(_)));
    }
}

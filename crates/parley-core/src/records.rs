//! Conversation record store: lazy creation and the denormalised preview and
//! unread bookkeeping of each conversation.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info};

use parley_shared::{ConversationKey, Identity};
use parley_store::{
    ConversationRecord, ConversationUpdate, DocumentStore, NewConversation, ParticipantMeta,
    Subscription,
};

use crate::directory::ParticipantDisplay;
use crate::error::Result;

#[derive(Clone)]
pub struct ConversationRecords {
    store: Arc<dyn DocumentStore>,
}

impl ConversationRecords {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn get(
        &self,
        actor: &Identity,
        key: &ConversationKey,
    ) -> Result<Option<ConversationRecord>> {
        Ok(self.store.get_conversation(actor, key).await?)
    }

    /// Return the conversation under `key`, creating it if absent.
    ///
    /// The read and the write are separate calls. Two devices opening the
    /// same new conversation at once may both create it; the later write
    /// wins on the initial metadata and no message is lost.
    pub async fn get_or_create(
        &self,
        actor: &Identity,
        key: &ConversationKey,
        participants: [Identity; 2],
        initial_meta: BTreeMap<Identity, ParticipantMeta>,
    ) -> Result<ConversationRecord> {
        if let Some(existing) = self.store.get_conversation(actor, key).await? {
            debug!(key = %key, "conversation already exists");
            return Ok(existing);
        }

        let meta = initial_meta
            .into_iter()
            .map(|(identity, meta)| {
                (
                    identity,
                    ParticipantMeta {
                        unread_count: 0,
                        ..meta
                    },
                )
            })
            .collect();
        let record = self
            .store
            .create_conversation(
                actor,
                NewConversation {
                    key: key.clone(),
                    participants,
                    meta,
                },
            )
            .await?;

        info!(key = %key, by = %actor, "conversation created");
        Ok(record)
    }

    /// Store `text` as the preview and bump the unread count of every
    /// participant other than `sender`. Call only after the message itself
    /// was appended.
    pub async fn record_send(
        &self,
        key: &ConversationKey,
        sender: &Identity,
        text: &str,
    ) -> Result<ConversationRecord> {
        let update = ConversationUpdate::RecordSend {
            sender: sender.clone(),
            text: text.to_string(),
        };
        Ok(self.store.update_conversation(sender, key, update).await?)
    }

    pub async fn reset_unread(&self, key: &ConversationKey, reader: &Identity) -> Result<()> {
        let update = ConversationUpdate::ResetUnread {
            reader: reader.clone(),
        };
        self.store.update_conversation(reader, key, update).await?;
        debug!(key = %key, reader = %reader, "unread count cleared");
        Ok(())
    }

    /// Rewrite the cached label of `latest.identity`, keeping its unread
    /// count.
    pub async fn refresh_participant(
        &self,
        key: &ConversationKey,
        actor: &Identity,
        latest: &ParticipantDisplay,
    ) -> Result<()> {
        let participant = latest.identity.clone();
        let update = ConversationUpdate::RefreshParticipant {
            participant: participant.clone(),
            display_name: latest.display_name.clone(),
            avatar: latest.avatar.clone(),
        };
        self.store.update_conversation(actor, key, update).await?;
        debug!(key = %key, participant = %participant, "participant label refreshed");
        Ok(())
    }

    /// Delete the conversation together with its messages.
    pub async fn delete(&self, key: &ConversationKey, actor: &Identity) -> Result<bool> {
        let deleted = self.store.delete_conversation(actor, key).await?;
        if deleted {
            info!(key = %key, by = %actor, "conversation deleted");
        }
        Ok(deleted)
    }

    /// Live list of `identity`'s conversations, most recently updated first.
    pub fn subscribe_by_participant(
        &self,
        identity: &Identity,
    ) -> Subscription<Vec<ConversationRecord>> {
        self.store.watch_conversations(identity)
    }
}

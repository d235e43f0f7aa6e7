//! The document store seam.
//!
//! Conversation logic only ever sees this trait. Calls that act on a
//! conversation carry the acting identity so the store can enforce its
//! participant rules; a violation is reported as
//! [`StoreError::AccessDenied`](crate::StoreError::AccessDenied), never
//! silently ignored.

use async_trait::async_trait;

use parley_shared::{ConversationKey, Identity};

use crate::error::Result;
use crate::feed::Subscription;
use crate::models::{
    ConversationRecord, ConversationUpdate, Listing, Message, NewConversation, Profile,
};

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Point read. `Ok(None)` when the conversation does not exist.
    async fn get_conversation(
        &self,
        actor: &Identity,
        key: &ConversationKey,
    ) -> Result<Option<ConversationRecord>>;

    /// Write a new conversation with server timestamps. An existing record
    /// under the same key is overwritten (last write wins).
    async fn create_conversation(
        &self,
        actor: &Identity,
        draft: NewConversation,
    ) -> Result<ConversationRecord>;

    /// Apply one mutation and bump `updated_at`.
    async fn update_conversation(
        &self,
        actor: &Identity,
        key: &ConversationKey,
        update: ConversationUpdate,
    ) -> Result<ConversationRecord>;

    /// Remove a conversation and everything under it. `Ok(false)` when it
    /// was already gone.
    async fn delete_conversation(&self, actor: &Identity, key: &ConversationKey) -> Result<bool>;

    /// Live, most-recent-first list of every conversation `participant`
    /// belongs to.
    fn watch_conversations(&self, participant: &Identity) -> Subscription<Vec<ConversationRecord>>;

    /// Append a message with a server-assigned timestamp. Does not validate
    /// the text.
    async fn append_message(
        &self,
        actor: &Identity,
        key: &ConversationKey,
        text: &str,
    ) -> Result<Message>;

    /// Live, oldest-first transcript of a conversation.
    fn watch_messages(&self, actor: &Identity, key: &ConversationKey)
        -> Subscription<Vec<Message>>;

    async fn get_profile(&self, identity: &Identity) -> Result<Option<Profile>>;

    async fn find_listing_by_owner(&self, owner: &Identity) -> Result<Option<Listing>>;
}

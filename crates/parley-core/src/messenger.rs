//! Entry point for a UI layer: builds the components around one store and
//! one identity provider.

use std::sync::Arc;

use parley_shared::{ConversationKey, Identity};
use parley_store::DocumentStore;

use crate::config::ChatConfig;
use crate::directory::{CounterpartHint, ParticipantDirectory};
use crate::identity::IdentityProvider;
use crate::list::ConversationList;
use crate::records::ConversationRecords;
use crate::session::{ChatSession, SessionTarget};
use crate::stream::MessageStream;

#[derive(Clone)]
pub struct Messenger {
    store: Arc<dyn DocumentStore>,
    identity: Arc<dyn IdentityProvider>,
    directory: ParticipantDirectory,
}

impl Messenger {
    pub fn new(store: Arc<dyn DocumentStore>, identity: Arc<dyn IdentityProvider>) -> Self {
        Self {
            directory: ParticipantDirectory::new(store.clone()),
            store,
            identity,
        }
    }

    pub fn with_config(mut self, config: &ChatConfig) -> Self {
        self.directory = self
            .directory
            .with_fallback_name(config.fallback_display_name.clone());
        self
    }

    pub fn current_identity(&self) -> Option<Identity> {
        self.identity.current()
    }

    pub fn records(&self) -> ConversationRecords {
        ConversationRecords::new(self.store.clone())
    }

    pub fn messages(&self) -> MessageStream {
        MessageStream::new(self.store.clone())
    }

    pub fn directory(&self) -> ParticipantDirectory {
        self.directory.clone()
    }

    /// The live inbox of whoever is signed in.
    pub fn conversation_list(&self) -> ConversationList {
        ConversationList::new(self.records(), self.directory(), self.identity.as_ref())
    }

    /// Open the conversation with `counterpart` from any screen that
    /// references it, creating the conversation on first contact.
    pub async fn open_or_create_conversation(
        &self,
        counterpart: &str,
        hint: CounterpartHint,
    ) -> ChatSession {
        self.open(SessionTarget::Counterpart {
            reference: Some(counterpart.to_string()),
            hint,
        })
        .await
    }

    /// Open an existing conversation from an inbox row.
    pub async fn open_conversation(&self, key: ConversationKey) -> ChatSession {
        self.open(SessionTarget::Conversation(key)).await
    }

    pub async fn open(&self, target: SessionTarget) -> ChatSession {
        let mut session = ChatSession::new(
            self.records(),
            self.messages(),
            self.directory(),
            self.identity.as_ref(),
            target,
        );
        session.open().await;
        session
    }
}

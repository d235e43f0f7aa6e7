//! The inbox: live, render-ready rows of the signed-in user's
//! conversations.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use parley_shared::constants::EMPTY_CONVERSATION_PREVIEW;
use parley_shared::{ConversationKey, Identity};
use parley_store::{ConversationRecord, Subscription};

use crate::directory::{ParticipantDirectory, ParticipantDisplay};
use crate::error::{ChatError, Result};
use crate::identity::IdentityProvider;
use crate::records::ConversationRecords;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ConversationRow {
    pub key: ConversationKey,
    pub counterpart: Identity,
    pub counterpart_display: String,
    /// `None` means the UI shows its placeholder image.
    pub avatar: Option<String>,
    pub last_message: String,
    /// `last_message`, or "No messages yet".
    pub last_message_preview: String,
    pub unread_count: u32,
    pub updated_at: DateTime<Utc>,
}

/// A delete the user asked for but has not confirmed yet. Dropping it
/// cancels the delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteRequest {
    pub key: ConversationKey,
    pub counterpart_display: String,
}

impl DeleteRequest {
    pub fn title(&self) -> &'static str {
        "Delete Chat"
    }

    pub fn prompt(&self) -> String {
        format!(
            "Are you sure you want to delete your chat with {}?",
            self.counterpart_display
        )
    }
}

/// What [`ConversationList::next_update`] observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListEvent {
    /// New rows are available.
    Rows(usize),
    /// The live query reported an error; rows are unchanged.
    Failed(ChatError),
    /// A different identity signed in; rows were cleared and a new live
    /// query started.
    Resubscribed(Identity),
    SignedOut,
}

/// A directory result and the record label it was looked up against. The
/// label changes when an open refreshes it, which expires the entry.
struct CachedDisplay {
    display: ParticipantDisplay,
    record_label: Option<String>,
}

enum Incoming {
    Identity(bool),
    Snapshot(Option<parley_store::Result<Vec<ConversationRecord>>>),
}

pub struct ConversationList {
    records: ConversationRecords,
    directory: ParticipantDirectory,
    identity_rx: watch::Receiver<Option<Identity>>,
    identity_open: bool,
    me: Option<Identity>,
    subscription: Option<Subscription<Vec<ConversationRecord>>>,
    /// Directory results per counterpart, filled lazily.
    displays: HashMap<Identity, CachedDisplay>,
    rows: Vec<ConversationRow>,
}

impl ConversationList {
    /// Build the list and start following the current identity's
    /// conversations, if anyone is signed in.
    pub fn new(
        records: ConversationRecords,
        directory: ParticipantDirectory,
        identity: &dyn IdentityProvider,
    ) -> Self {
        let mut identity_rx = identity.watch();
        let me = identity_rx.borrow_and_update().clone();
        let mut list = Self {
            records,
            directory,
            identity_rx,
            identity_open: true,
            me: None,
            subscription: None,
            displays: HashMap::new(),
            rows: Vec::new(),
        };
        if let Some(me) = me {
            list.follow(me);
        }
        list
    }

    pub fn rows(&self) -> &[ConversationRow] {
        &self.rows
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.me.as_ref()
    }

    /// Wait for the next change: a new snapshot, a live-query error or an
    /// identity change. `None` once nothing can change any more.
    pub async fn next_update(&mut self) -> Option<ListEvent> {
        loop {
            let incoming = match self.subscription.as_mut() {
                Some(sub) => tokio::select! {
                    changed = self.identity_rx.changed(), if self.identity_open => {
                        Incoming::Identity(changed.is_ok())
                    }
                    item = sub.next() => Incoming::Snapshot(item),
                },
                None if self.identity_open => {
                    Incoming::Identity(self.identity_rx.changed().await.is_ok())
                }
                None => return None,
            };

            match incoming {
                Incoming::Identity(false) => self.identity_open = false,
                Incoming::Identity(true) => {
                    let next = self.identity_rx.borrow_and_update().clone();
                    if next == self.me {
                        continue;
                    }
                    self.teardown();
                    return Some(match next {
                        Some(me) => {
                            self.follow(me.clone());
                            ListEvent::Resubscribed(me)
                        }
                        None => {
                            info!("signed out, conversation list cleared");
                            ListEvent::SignedOut
                        }
                    });
                }
                Incoming::Snapshot(Some(Ok(records))) => {
                    self.rebuild(records).await;
                    return Some(ListEvent::Rows(self.rows.len()));
                }
                Incoming::Snapshot(Some(Err(err))) => {
                    let err = ChatError::from(err);
                    warn!(error = %err, "conversation list query failed");
                    return Some(ListEvent::Failed(err));
                }
                Incoming::Snapshot(None) => {
                    self.subscription = None;
                    return None;
                }
            }
        }
    }

    /// First step of a delete. `None` when `key` is not in the list.
    pub fn request_delete(&self, key: &ConversationKey) -> Option<DeleteRequest> {
        self.rows
            .iter()
            .find(|row| &row.key == key)
            .map(|row| DeleteRequest {
                key: row.key.clone(),
                counterpart_display: row.counterpart_display.clone(),
            })
    }

    /// Second step of a delete. The row disappears with the next snapshot.
    pub async fn confirm_delete(&self, request: DeleteRequest) -> Result<bool> {
        let me = self.me.as_ref().ok_or(ChatError::SignedOut)?;
        self.records.delete(&request.key, me).await.map_err(|err| {
            warn!(key = %request.key, error = %err, "delete failed");
            err
        })
    }

    fn follow(&mut self, me: Identity) {
        info!(identity = %me, "following conversations");
        self.subscription = Some(self.records.subscribe_by_participant(&me));
        self.me = Some(me);
    }

    fn teardown(&mut self) {
        if let Some(mut sub) = self.subscription.take() {
            sub.cancel();
        }
        self.me = None;
        self.rows.clear();
        self.displays.clear();
    }

    async fn rebuild(&mut self, records: Vec<ConversationRecord>) {
        let Some(me) = self.me.clone() else {
            return;
        };

        let mut rows = Vec::with_capacity(records.len());
        for record in records {
            let Some(counterpart) = record.counterpart_of(&me).cloned() else {
                continue;
            };
            let cached = record.meta_for(&counterpart);
            let record_label = cached.and_then(|m| m.display_name.clone());
            let display = self.display_of(&counterpart, record_label.as_deref()).await;

            // The directory wins; the record's own label covers a placeholder
            // or a failed lookup.
            let counterpart_display = match (&display, record_label) {
                (Some(d), _) if d.known => d.display_name.clone(),
                (_, Some(label)) => label,
                (Some(d), None) => d.display_name.clone(),
                (None, None) => self.directory.fallback(&counterpart).display_name,
            };
            let avatar = display
                .and_then(|d| d.avatar)
                .or_else(|| cached.and_then(|m| m.avatar.clone()));

            let last_message_preview = if record.last_message.is_empty() {
                EMPTY_CONVERSATION_PREVIEW.to_string()
            } else {
                record.last_message.clone()
            };

            rows.push(ConversationRow {
                unread_count: record.unread_for(&me),
                key: record.key,
                counterpart,
                counterpart_display,
                avatar,
                last_message: record.last_message,
                last_message_preview,
                updated_at: record.updated_at,
            });
        }

        debug!(rows = rows.len(), "conversation list rebuilt");
        self.rows = rows;
    }

    /// Cached directory lookup. A failed lookup is not cached, and an entry
    /// filled against a different record label is looked up again.
    async fn display_of(
        &mut self,
        counterpart: &Identity,
        record_label: Option<&str>,
    ) -> Option<ParticipantDisplay> {
        let hit = self
            .displays
            .get(counterpart)
            .filter(|entry| entry.record_label.as_deref() == record_label)
            .map(|entry| entry.display.clone());
        if hit.is_some() {
            return hit;
        }
        if self.displays.remove(counterpart).is_some() {
            debug!(counterpart = %counterpart, "record label changed, display looked up again");
        }
        match self.directory.resolve_display(counterpart).await {
            Ok(display) => {
                self.displays.insert(
                    counterpart.clone(),
                    CachedDisplay {
                        display: display.clone(),
                        record_label: record_label.map(str::to_string),
                    },
                );
                Some(display)
            }
            Err(err) => {
                warn!(counterpart = %counterpart, error = %err, "directory lookup failed");
                None
            }
        }
    }
}

//! Record types persisted by the store.
//!
//! Every struct derives `Serialize` and `Deserialize` so it can be handed
//! directly to a UI layer.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use parley_shared::constants::MISSING_FIELD;
use parley_shared::{ConversationKey, Identity};

// ---------------------------------------------------------------------------
// Conversation
// ---------------------------------------------------------------------------

/// Display metadata and unread counter one participant has in a
/// conversation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantMeta {
    /// Best-known label at the time it was written. `None` when the entry
    /// was created by an unread increment before anyone labelled it.
    pub display_name: Option<String>,
    /// Avatar URL, if any.
    pub avatar: Option<String>,
    /// Messages received since this participant last opened the
    /// conversation.
    pub unread_count: u32,
}

impl ParticipantMeta {
    pub fn labelled(display_name: impl Into<String>, avatar: Option<String>) -> Self {
        Self {
            display_name: Some(display_name.into()),
            avatar,
            unread_count: 0,
        }
    }
}

/// The shared metadata document of a two-party conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ConversationRecord {
    pub key: ConversationKey,
    /// Both participants, sorted.
    pub participants: [Identity; 2],
    /// Body of the most recent message, empty until the first send.
    pub last_message: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Per-participant metadata. May lack an entry for a participant; readers
    /// fall back to a placeholder.
    pub meta: BTreeMap<Identity, ParticipantMeta>,
}

impl ConversationRecord {
    pub fn has_participant(&self, identity: &Identity) -> bool {
        self.participants.contains(identity)
    }

    /// The participant that is not `me`.
    pub fn counterpart_of(&self, me: &Identity) -> Option<&Identity> {
        if !self.has_participant(me) {
            return None;
        }
        self.participants.iter().find(|p| *p != me)
    }

    pub fn meta_for(&self, identity: &Identity) -> Option<&ParticipantMeta> {
        self.meta.get(identity)
    }

    /// Unread count of `identity`, zero when its entry is missing.
    pub fn unread_for(&self, identity: &Identity) -> u32 {
        self.meta_for(identity).map_or(0, |m| m.unread_count)
    }
}

/// Initial content of a conversation about to be created.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NewConversation {
    pub key: ConversationKey,
    pub participants: [Identity; 2],
    pub meta: BTreeMap<Identity, ParticipantMeta>,
}

/// A single mutation of a conversation record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ConversationUpdate {
    /// A message from `sender` was appended: store it as the preview and bump
    /// every other participant's unread count.
    RecordSend { sender: Identity, text: String },
    /// `reader` opened the conversation.
    ResetUnread { reader: Identity },
    /// Rewrite the cached label of `participant`, keeping its unread count.
    RefreshParticipant {
        participant: Identity,
        display_name: String,
        avatar: Option<String>,
    },
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// A single chat message. Immutable once appended.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    pub conversation_key: ConversationKey,
    pub sender_id: Identity,
    pub text: String,
    /// Server-assigned; the ordering key.
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Directory records
// ---------------------------------------------------------------------------

/// Structured payment method a provider registered.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PaymentMethod {
    pub network: Option<String>,
    pub account_name: Option<String>,
    pub number: Option<String>,
}

/// How a user can be paid.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum PaymentInfo {
    Method(PaymentMethod),
    /// Older free-form entry.
    Details(String),
}

impl PaymentInfo {
    /// Multi-line rendering shown to the payer. Missing parts read `N/A`.
    pub fn summary(&self) -> String {
        match self {
            PaymentInfo::Method(method) => {
                let field = |value: &Option<String>| {
                    value
                        .as_deref()
                        .map(str::trim)
                        .filter(|v| !v.is_empty())
                        .unwrap_or(MISSING_FIELD)
                        .to_string()
                };
                format!(
                    "Network: {}\nName: {}\nNumber: {}",
                    field(&method.network),
                    field(&method.account_name),
                    field(&method.number)
                )
            }
            PaymentInfo::Details(text) => text.clone(),
        }
    }
}

/// A user's profile record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub identity: Identity,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub profile_image: Option<String>,
    pub payment: Option<PaymentInfo>,
    pub created_at: DateTime<Utc>,
}

impl Profile {
    pub fn new(identity: Identity) -> Self {
        Self {
            identity,
            first_name: None,
            last_name: None,
            email: None,
            phone: None,
            profile_image: None,
            payment: None,
            created_at: Utc::now(),
        }
    }
}

/// A service a provider advertises.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    pub id: Uuid,
    pub owner_id: Identity,
    pub service_name: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Listing {
    pub fn new(owner_id: Identity, service_name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id,
            service_name: service_name.into(),
            description: None,
            location: None,
            created_at: Utc::now(),
        }
    }
}

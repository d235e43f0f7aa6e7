use thiserror::Error;

use parley_shared::IdentityError;
use parley_store::StoreError;

/// Everything that can go wrong in a conversation, classified by how the UI
/// has to react.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChatError {
    /// The store refused the operation for this identity. Terminal for the
    /// screen; input is disabled.
    #[error("Access denied: {0}")]
    AccessDenied(String),

    /// The other participant (or the conversation) is missing or malformed.
    /// Nothing is created.
    #[error("Invalid reference: {0}")]
    InvalidReference(String),

    /// Network or store trouble. Retried only when the user asks.
    #[error("Temporarily unavailable: {0}")]
    Transient(String),

    /// Blank message text, rejected before any write.
    #[error("Message is empty")]
    EmptyInput,

    /// No authenticated identity.
    #[error("Not signed in")]
    SignedOut,
}

impl ChatError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, ChatError::Transient(_))
    }

    /// Text shown inline on the conversation screen.
    pub fn user_message(&self) -> &'static str {
        match self {
            ChatError::AccessDenied(_) => "You don't have access to this chat.",
            ChatError::InvalidReference(_) => {
                "This conversation can't be opened: the other participant is missing or invalid."
            }
            ChatError::Transient(_) => {
                "Something went wrong while loading messages. Check your connection and try again."
            }
            ChatError::EmptyInput => "Type a message first.",
            ChatError::SignedOut => "Sign in to see your messages.",
        }
    }

    /// Text shown in the alert after a failed send.
    pub fn send_failure_message(&self) -> &'static str {
        match self {
            ChatError::AccessDenied(_) => "You don't have permission to send a message in this chat.",
            ChatError::Transient(_) => "Your message was not sent. Check your connection and try again.",
            other => other.user_message(),
        }
    }
}

impl From<StoreError> for ChatError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::AccessDenied(reason) => ChatError::AccessDenied(reason),
            StoreError::NotFound => ChatError::InvalidReference("record not found".into()),
            StoreError::Invalid(reason) => ChatError::InvalidReference(reason),
            other => ChatError::Transient(other.to_string()),
        }
    }
}

impl From<IdentityError> for ChatError {
    fn from(err: IdentityError) -> Self {
        ChatError::InvalidReference(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ChatError>;

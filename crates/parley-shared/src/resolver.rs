//! Conversation key derivation.
//!
//! Every entry point that knows both participants (a listing, a profile, an
//! existing list row) derives the same key without a lookup round-trip.

use crate::error::IdentityError;
use crate::types::{ConversationKey, Identity};

/// Derive the canonical key for the conversation between `a` and `b`.
///
/// The pair is sorted before joining, so `resolve_key(a, b) ==
/// resolve_key(b, a)`. Pure; callers are expected to pass two distinct
/// identities (see [`try_resolve_key`] for the checked form).
pub fn resolve_key(a: &Identity, b: &Identity) -> ConversationKey {
    if a <= b {
        ConversationKey::from_sorted(a, b)
    } else {
        ConversationKey::from_sorted(b, a)
    }
}

/// [`resolve_key`] that refuses a conversation with oneself.
pub fn try_resolve_key(a: &Identity, b: &Identity) -> Result<ConversationKey, IdentityError> {
    if a == b {
        return Err(IdentityError::SameParticipant);
    }
    Ok(resolve_key(a, b))
}

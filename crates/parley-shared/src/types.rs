use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::{KEY_SEPARATOR, MAX_IDENTITY_LEN};
use crate::error::IdentityError;

/// Stable identifier of an authenticated user, handed to us by the auth
/// provider. Never generated locally.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct Identity(String);

impl Identity {
    /// Validate a raw identifier.
    ///
    /// The key separator is reserved so that a conversation key always splits
    /// back into exactly the two identities it was built from.
    pub fn parse(raw: impl Into<String>) -> Result<Self, IdentityError> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(IdentityError::Empty);
        }
        if raw.chars().count() > MAX_IDENTITY_LEN {
            return Err(IdentityError::TooLong {
                max: MAX_IDENTITY_LEN,
            });
        }
        if let Some(c) = raw
            .chars()
            .find(|c| *c == KEY_SEPARATOR || c.is_whitespace() || c.is_control())
        {
            return Err(IdentityError::ReservedChar(c));
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Identity {
    type Error = IdentityError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<Identity> for String {
    fn from(id: Identity) -> Self {
        id.0
    }
}

impl std::str::FromStr for Identity {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Canonical key of a two-party conversation. Build one with
/// [`crate::resolve_key`]; parse one received from elsewhere with
/// [`ConversationKey::parse`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct ConversationKey(String);

impl ConversationKey {
    pub(crate) fn from_sorted(low: &Identity, high: &Identity) -> Self {
        Self(format!("{low}{KEY_SEPARATOR}{high}"))
    }

    /// Parse a key that was passed around as a plain string (e.g. from a
    /// list row or a deep link).
    pub fn parse(raw: &str) -> Result<Self, IdentityError> {
        let (a, b) = raw
            .split_once(KEY_SEPARATOR)
            .ok_or_else(|| IdentityError::MalformedKey(raw.to_string()))?;
        let a = Identity::parse(a).map_err(|_| IdentityError::MalformedKey(raw.to_string()))?;
        let b = Identity::parse(b).map_err(|_| IdentityError::MalformedKey(raw.to_string()))?;
        if a >= b {
            return Err(IdentityError::MalformedKey(raw.to_string()));
        }
        Ok(Self::from_sorted(&a, &b))
    }

    /// The two participants encoded in the key, in sorted order.
    pub fn participants(&self) -> (Identity, Identity) {
        let (a, b) = self
            .0
            .split_once(KEY_SEPARATOR)
            .unwrap_or((self.0.as_str(), ""));
        (Identity(a.to_string()), Identity(b.to_string()))
    }

    /// The participant that is not `me`, or `None` when `me` is not part of
    /// this conversation.
    pub fn counterpart_of(&self, me: &Identity) -> Option<Identity> {
        let (a, b) = self.participants();
        if &a == me {
            Some(b)
        } else if &b == me {
            Some(a)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConversationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ConversationKey {
    type Error = IdentityError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ConversationKey> for String {
    fn from(key: ConversationKey) -> Self {
        key.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_and_reserved() {
        assert_eq!(Identity::parse(""), Err(IdentityError::Empty));
        assert_eq!(
            Identity::parse("a_b"),
            Err(IdentityError::ReservedChar('_'))
        );
        assert_eq!(
            Identity::parse("a b"),
            Err(IdentityError::ReservedChar(' '))
        );
        assert!(Identity::parse("x".repeat(MAX_IDENTITY_LEN + 1)).is_err());
        assert!(Identity::parse("Zk3uQ9aPq1").is_ok());
    }

    #[test]
    fn key_parse_requires_sorted_distinct_pair() {
        assert!(ConversationKey::parse("alice_bob").is_ok());
        assert!(ConversationKey::parse("bob_alice").is_err());
        assert!(ConversationKey::parse("alice_alice").is_err());
        assert!(ConversationKey::parse("alice").is_err());
        assert!(ConversationKey::parse("_bob").is_err());
    }

    #[test]
    fn counterpart_lookup() {
        let key = ConversationKey::parse("alice_bob").unwrap();
        let alice = Identity::parse("alice").unwrap();
        let bob = Identity::parse("bob").unwrap();
        let carol = Identity::parse("carol").unwrap();

        assert_eq!(key.counterpart_of(&alice), Some(bob.clone()));
        assert_eq!(key.counterpart_of(&bob), Some(alice));
        assert_eq!(key.counterpart_of(&carol), None);
    }

    #[test]
    fn serde_validates_on_the_way_in() {
        let ok: Identity = serde_json::from_str("\"u1\"").unwrap();
        assert_eq!(ok.as_str(), "u1");
        assert!(serde_json::from_str::<Identity>("\"\"").is_err());
        assert!(serde_json::from_str::<ConversationKey>("\"u2_u1\"").is_err());
    }
}

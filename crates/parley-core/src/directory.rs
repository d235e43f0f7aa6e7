//! Participant directory: who is on the other end of a conversation.
//!
//! Read-only. Looked up when a conversation is opened or created and when
//! the inbox meets a counterpart for the first time, never per render.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use parley_shared::constants::{FALLBACK_DISPLAY_NAME, NO_PAYMENT_METHOD};
use parley_shared::Identity;
use parley_store::{DocumentStore, Listing, ParticipantMeta, PaymentInfo, Profile};

use crate::error::Result;

/// What the opening screen already knows about the counterpart. Used only
/// when the directory has nothing better.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CounterpartHint {
    pub display_name: Option<String>,
    pub avatar: Option<String>,
}

impl CounterpartHint {
    pub fn named(display_name: impl Into<String>) -> Self {
        Self {
            display_name: Some(display_name.into()),
            avatar: None,
        }
    }
}

/// Render-ready description of a participant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantDisplay {
    pub identity: Identity,
    pub display_name: String,
    pub avatar: Option<String>,
    pub service_name: Option<String>,
    pub payment: Option<PaymentInfo>,
    /// `false` when neither a profile nor a listing exists and the label is
    /// a placeholder.
    pub known: bool,
}

impl ParticipantDisplay {
    /// Fill placeholder fields from `hint`.
    pub fn with_hint(mut self, hint: &CounterpartHint) -> Self {
        if !self.known {
            if let Some(name) = non_blank(hint.display_name.as_deref()) {
                self.display_name = name.to_string();
            }
        }
        if self.avatar.is_none() {
            self.avatar = non_blank(hint.avatar.as_deref()).map(str::to_string);
        }
        self
    }

    /// Metadata entry to seed a new conversation with.
    pub fn to_meta(&self) -> ParticipantMeta {
        ParticipantMeta::labelled(self.display_name.clone(), self.avatar.clone())
    }

    pub fn payment_summary(&self) -> String {
        match &self.payment {
            Some(info) => info.summary(),
            None => NO_PAYMENT_METHOD.to_string(),
        }
    }
}

#[derive(Clone)]
pub struct ParticipantDirectory {
    store: Arc<dyn DocumentStore>,
    fallback_name: String,
}

impl ParticipantDirectory {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            fallback_name: FALLBACK_DISPLAY_NAME.to_string(),
        }
    }

    pub fn with_fallback_name(mut self, name: impl Into<String>) -> Self {
        self.fallback_name = name.into();
        self
    }

    /// Placeholder display for an identity nothing is known about.
    pub fn fallback(&self, identity: &Identity) -> ParticipantDisplay {
        ParticipantDisplay {
            identity: identity.clone(),
            display_name: self.fallback_name.clone(),
            avatar: None,
            service_name: None,
            payment: None,
            known: false,
        }
    }

    /// Look up the profile and listing of `identity` and build its label.
    ///
    /// A missing profile is not an error; the fallback label is used.
    pub async fn resolve_display(&self, identity: &Identity) -> Result<ParticipantDisplay> {
        let (profile, listing) = futures::try_join!(
            self.store.get_profile(identity),
            self.store.find_listing_by_owner(identity),
        )?;

        let Some(label) = compose_label(profile.as_ref(), listing.as_ref()) else {
            debug!(identity = %identity, "no directory entry, using fallback label");
            let mut display = self.fallback(identity);
            display.payment = profile.and_then(|p| p.payment);
            return Ok(display);
        };

        let service_name = listing
            .as_ref()
            .and_then(|l| non_blank(Some(l.service_name.as_str())))
            .map(str::to_string);
        let (avatar, payment) = match profile {
            Some(p) => (non_blank(p.profile_image.as_deref()).map(str::to_string), p.payment),
            None => (None, None),
        };

        Ok(ParticipantDisplay {
            identity: identity.clone(),
            display_name: label,
            avatar,
            service_name,
            payment,
            known: true,
        })
    }
}

/// `"First Last (Service)"`, `"First Last"`, `"Service"`, or `None`.
fn compose_label(profile: Option<&Profile>, listing: Option<&Listing>) -> Option<String> {
    let full_name = profile.and_then(|p| {
        let first = non_blank(p.first_name.as_deref())?;
        let last = non_blank(p.last_name.as_deref())?;
        Some(format!("{first} {last}"))
    });
    let service = listing.and_then(|l| non_blank(Some(l.service_name.as_str())));

    match (full_name, service) {
        (Some(name), Some(service)) => Some(format!("{name} ({service})")),
        (Some(name), None) => Some(name),
        (None, Some(service)) => Some(service.to_string()),
        (None, None) => None,
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{id, seeded_store};

    fn directory() -> (ParticipantDirectory, parley_store::LocalStore) {
        let store = seeded_store();
        (ParticipantDirectory::new(Arc::new(store.clone())), store)
    }

    #[tokio::test]
    async fn provider_label_includes_service() {
        let (directory, _) = directory();
        let display = directory.resolve_display(&id("u2")).await.unwrap();
        assert_eq!(display.display_name, "Kojo Boateng (Plumbing)");
        assert_eq!(display.service_name.as_deref(), Some("Plumbing"));
        assert!(display.known);
        assert_eq!(
            display.payment_summary(),
            "Network: MTN\nName: Kojo Boateng\nNumber: 0240000000"
        );
    }

    #[tokio::test]
    async fn requester_label_is_full_name() {
        let (directory, _) = directory();
        let display = directory.resolve_display(&id("u1")).await.unwrap();
        assert_eq!(display.display_name, "Ama Mensah");
        assert_eq!(display.avatar.as_deref(), Some("https://img.example/u1.png"));
        assert_eq!(display.payment_summary(), NO_PAYMENT_METHOD);
    }

    #[tokio::test]
    async fn listing_without_profile_uses_service_name() {
        let (directory, store) = directory();
        store.put_listing(&Listing::new(id("p9"), "Tiling")).unwrap();
        let display = directory.resolve_display(&id("p9")).await.unwrap();
        assert_eq!(display.display_name, "Tiling");
        assert_eq!(display.avatar, None);
    }

    #[tokio::test]
    async fn unknown_identity_falls_back() {
        let (directory, store) = directory();
        let mut half = Profile::new(id("u7"));
        half.first_name = Some("Esi".into());
        store.put_profile(&half).unwrap();

        let nobody = directory.resolve_display(&id("u8")).await.unwrap();
        assert_eq!(nobody.display_name, "User");
        assert_eq!(nobody.avatar, None);
        assert!(!nobody.known);

        // A first name alone is not enough for a label.
        let partial = directory.resolve_display(&id("u7")).await.unwrap();
        assert_eq!(partial.display_name, "User");

        let custom = directory.clone().with_fallback_name("Customer");
        assert_eq!(custom.fallback(&id("u8")).display_name, "Customer");
    }

    #[tokio::test]
    async fn hint_only_fills_placeholders() {
        let (directory, _) = directory();
        let hint = CounterpartHint {
            display_name: Some("Plumber near me".into()),
            avatar: Some("https://img.example/hint.png".into()),
        };

        let known = directory.resolve_display(&id("u2")).await.unwrap().with_hint(&hint);
        assert_eq!(known.display_name, "Kojo Boateng (Plumbing)");
        assert_eq!(known.avatar.as_deref(), Some("https://img.example/hint.png"));

        let unknown = directory.fallback(&id("u8")).with_hint(&hint);
        assert_eq!(unknown.display_name, "Plumber near me");
        assert_eq!(unknown.to_meta().unread_count, 0);
    }
}

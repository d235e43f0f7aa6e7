//! Directory records: user [`Profile`]s and provider [`Listing`]s.

use rusqlite::{params, OptionalExtension};
use uuid::Uuid;

use parley_shared::Identity;

use crate::database::{conversion_failure, format_ts, parse_ts, Database};
use crate::error::Result;
use crate::models::{Listing, PaymentInfo, PaymentMethod, Profile};

impl Database {
    // ------------------------------------------------------------------
    // Profiles
    // ------------------------------------------------------------------

    /// Insert or replace the profile of `profile.identity`.
    pub fn upsert_profile(&self, profile: &Profile) -> Result<()> {
        let (method_json, details) = match &profile.payment {
            Some(PaymentInfo::Method(method)) => (Some(serde_json::to_string(method)?), None),
            Some(PaymentInfo::Details(text)) => (None, Some(text.as_str())),
            None => (None, None),
        };

        self.conn().execute(
            "INSERT INTO profiles (identity, first_name, last_name, email, phone, profile_image,
                                   payment_method, payment_details, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(identity) DO UPDATE SET
                 first_name      = excluded.first_name,
                 last_name       = excluded.last_name,
                 email           = excluded.email,
                 phone           = excluded.phone,
                 profile_image   = excluded.profile_image,
                 payment_method  = excluded.payment_method,
                 payment_details = excluded.payment_details",
            params![
                profile.identity.as_str(),
                profile.first_name,
                profile.last_name,
                profile.email,
                profile.phone,
                profile.profile_image,
                method_json,
                details,
                format_ts(&profile.created_at),
            ],
        )?;
        Ok(())
    }

    pub fn get_profile(&self, identity: &Identity) -> Result<Option<Profile>> {
        let profile = self
            .conn()
            .query_row(
                "SELECT identity, first_name, last_name, email, phone, profile_image,
                        payment_method, payment_details, created_at
                 FROM profiles WHERE identity = ?1",
                params![identity.as_str()],
                row_to_profile,
            )
            .optional()?;
        Ok(profile)
    }

    // ------------------------------------------------------------------
    // Listings
    // ------------------------------------------------------------------

    pub fn insert_listing(&self, listing: &Listing) -> Result<()> {
        self.conn().execute(
            "INSERT INTO listings (id, owner_id, service_name, description, location, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                listing.id.to_string(),
                listing.owner_id.as_str(),
                listing.service_name,
                listing.description,
                listing.location,
                format_ts(&listing.created_at),
            ],
        )?;
        Ok(())
    }

    /// The oldest listing posted by `owner`, if any.
    pub fn find_listing_by_owner(&self, owner: &Identity) -> Result<Option<Listing>> {
        let listing = self
            .conn()
            .query_row(
                "SELECT id, owner_id, service_name, description, location, created_at
                 FROM listings
                 WHERE owner_id = ?1
                 ORDER BY created_at ASC
                 LIMIT 1",
                params![owner.as_str()],
                row_to_listing,
            )
            .optional()?;
        Ok(listing)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn row_to_profile(row: &rusqlite::Row<'_>) -> rusqlite::Result<Profile> {
    let identity: String = row.get(0)?;
    let method_json: Option<String> = row.get(6)?;
    let details: Option<String> = row.get(7)?;
    let created_str: String = row.get(8)?;

    let identity = Identity::parse(identity).map_err(|e| conversion_failure(0, e))?;

    // A structured method wins over the free-form fallback.
    let payment = match (method_json, details) {
        (Some(json), _) => {
            let method: PaymentMethod =
                serde_json::from_str(&json).map_err(|e| conversion_failure(6, e))?;
            Some(PaymentInfo::Method(method))
        }
        (None, Some(text)) if !text.trim().is_empty() => Some(PaymentInfo::Details(text)),
        _ => None,
    };

    Ok(Profile {
        identity,
        first_name: row.get(1)?,
        last_name: row.get(2)?,
        email: row.get(3)?,
        phone: row.get(4)?,
        profile_image: row.get(5)?,
        payment,
        created_at: parse_ts(8, &created_str)?,
    })
}

fn row_to_listing(row: &rusqlite::Row<'_>) -> rusqlite::Result<Listing> {
    let id_str: String = row.get(0)?;
    let owner: String = row.get(1)?;
    let created_str: String = row.get(5)?;

    let id = Uuid::parse_str(&id_str).map_err(|e| conversion_failure(0, e))?;
    let owner_id = Identity::parse(owner).map_err(|e| conversion_failure(1, e))?;

    Ok(Listing {
        id,
        owner_id,
        service_name: row.get(2)?,
        description: row.get(3)?,
        location: row.get(4)?,
        created_at: parse_ts(5, &created_str)?,
    })
}

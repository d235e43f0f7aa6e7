/// Application name
pub const APP_NAME: &str = "Parley";

/// Separator placed between the two sorted identities of a conversation key
pub const KEY_SEPARATOR: char = '_';

/// Label shown for a participant with no profile and no listing
pub const FALLBACK_DISPLAY_NAME: &str = "User";

/// Preview text for a conversation that has no messages yet
pub const EMPTY_CONVERSATION_PREVIEW: &str = "No messages yet";

/// Shown when the counterpart never set up a payment method
pub const NO_PAYMENT_METHOD: &str = "This user has not set up a payment method.";

/// Placeholder for a missing payment field
pub const MISSING_FIELD: &str = "N/A";

/// Default capacity of a live subscription's delivery channel
pub const DEFAULT_SUBSCRIPTION_BUFFER: usize = 32;

/// Capacity of the store's change-feed broadcast channel
pub const CHANGE_FEED_CAPACITY: usize = 256;

/// Maximum identity length accepted by [`crate::Identity::parse`]
pub const MAX_IDENTITY_LEN: usize = 128;

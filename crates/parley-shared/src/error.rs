use thiserror::Error;

/// Why a raw string was rejected as a participant identity.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    #[error("Identity is empty")]
    Empty,

    #[error("Identity is longer than {max} characters")]
    TooLong { max: usize },

    #[error("Identity contains the reserved character {0:?}")]
    ReservedChar(char),

    #[error("A conversation needs two distinct participants")]
    SameParticipant,

    #[error("Malformed conversation key: {0}")]
    MalformedKey(String),
}

//! Error types for nostrpress-nostr.

use thiserror::Error;

/// A NIP-19 string could not be turned into the reference the caller expected.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("invalid bech32 string: {0}")]
    Bech32(String),

    /// The string decoded fine but carries a different prefix (e.g. `nprofile`
    /// where an article `nevent` was expected).
    #[error("expected {expected} reference, found {found}")]
    WrongType { expected: &'static str, found: String },

    /// The reference points at an event of another kind.
    #[error("expected kind {expected}, found kind {found}")]
    WrongKind { expected: u32, found: u32 },

    #[error("unknown bech32 prefix: {0}")]
    UnknownPrefix(String),

    #[error("malformed TLV entry: {0}")]
    InvalidTlv(String),

    #[error("reference carries no event id")]
    MissingId,

    #[error("expected 32 bytes, found {0}")]
    InvalidLength(usize),
}

/// Outcome of a single delivery attempt to one relay.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RelayError {
    /// The relay answered `["OK", id, false, reason]`.
    #[error("{relay} rejected event: {reason}")]
    Rejected { relay: String, reason: String },

    /// Network-level failure: connect error, closed socket, timeout.
    #[error("{relay} unreachable: {reason}")]
    Unreachable { relay: String, reason: String },
}

impl RelayError {
    pub fn relay(&self) -> &str {
        match self {
            RelayError::Rejected { relay, .. } | RelayError::Unreachable { relay, .. } => relay,
        }
    }

    pub fn reason(&self) -> &str {
        match self {
            RelayError::Rejected { reason, .. } | RelayError::Unreachable { reason, .. } => reason,
        }
    }

    /// Relays signal throttling with a message containing "rate"
    /// (`rate-limited: slow down`, `Rate limit exceeded`, …).
    pub fn is_rate_limited(&self) -> bool {
        self.reason().to_ascii_lowercase().contains("rate")
    }
}

/// Errors from key handling, signing, and relay queries.
#[derive(Debug, Error)]
pub enum NostrError {
    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("signing failed: {0}")]
    Signing(#[from] secp256k1::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("event {id} failed verification: {reason}")]
    InvalidEvent { id: String, reason: String },

    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// A query reached none of the relays it was sent to.
    #[error("no relay answered the query: {0}")]
    QueryFailed(String),
}

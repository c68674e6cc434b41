//! Nostr protocol layer for nostrpress.
//!
//! - [`event`] — event model, NIP-01 hashing and verification
//! - [`keys`] — secret key parsing and deterministic Schnorr signing
//! - [`nip19`] — `nevent` / `nsec` / `npub` codec
//! - [`filter`] — subscription filters
//! - [`transport`] — the [`RelayTransport`] seam
//! - [`ws`] — WebSocket [`RelayPool`]
//! - [`fanout`] — concurrent multi-relay publish with retry

pub mod error;
pub mod event;
pub mod fanout;
pub mod filter;
pub mod keys;
pub mod nip19;
pub mod transport;
pub mod ws;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use error::{DecodeError, NostrError, RelayError};
pub use event::{Event, Tag, UnsignedEvent, KIND_ARTICLE, KIND_DELETION};
pub use fanout::{publish, FanoutReport, RelayFailure, RetryPolicy};
pub use filter::Filter;
pub use keys::Keys;
pub use nip19::EventPointer;
pub use transport::{RelayTransport, RemoteEvent};
pub use ws::RelayPool;

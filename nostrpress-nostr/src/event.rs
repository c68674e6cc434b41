//! Nostr event model.

use secp256k1::{schnorr::Signature, Message, Secp256k1, XOnlyPublicKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::NostrError;

/// Long-form article (NIP-23). Parameterized replaceable, keyed by its `d` tag.
pub const KIND_ARTICLE: u32 = 30023;
/// Deletion request (NIP-09).
pub const KIND_DELETION: u32 = 5;

/// Wrapper for a Nostr tag expressed as an array of strings.
///
/// The first element names the tag, the rest hold data. Keys are not unique
/// and order is kept exactly as built:
///
/// - `d` – identifier of a replaceable event (the article slug)
/// - `t` – topic / hashtag
/// - `e` – reference to another event id
/// - `a` – reference to a replaceable event (`kind:pubkey:d`)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tag(pub Vec<String>);

impl Tag {
    pub fn new(key: &str, value: impl Into<String>) -> Self {
        Self(vec![key.to_owned(), value.into()])
    }

    pub fn key(&self) -> Option<&str> {
        self.0.first().map(String::as_str)
    }

    pub fn value(&self) -> Option<&str> {
        self.0.get(1).map(String::as_str)
    }
}

/// An event before it has an author, id and signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsignedEvent {
    pub kind: u32,
    pub created_at: u64,
    pub tags: Vec<Tag>,
    pub content: String,
}

impl UnsignedEvent {
    /// First value of the tag named `key`.
    pub fn tag_value(&self, key: &str) -> Option<&str> {
        find_tag(&self.tags, key)
    }
}

/// A signed Nostr event as sent to and received from relays.
///
/// ```json
/// {
///   "id": "aa11…",
///   "pubkey": "79be…",
///   "kind": 30023,
///   "created_at": 1700000000,
///   "tags": [["d", "hello"], ["title", "Hello"]],
///   "content": "…",
///   "sig": "dead…"
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Event {
    /// Event identifier (hex of SHA-256 hash).
    pub id: String,
    /// Author public key (x-only, hex).
    pub pubkey: String,
    pub kind: u32,
    /// Unix timestamp of creation.
    pub created_at: u64,
    pub tags: Vec<Tag>,
    pub content: String,
    /// Schnorr signature over the event hash.
    pub sig: String,
}

impl Event {
    pub fn tag_value(&self, key: &str) -> Option<&str> {
        find_tag(&self.tags, key)
    }

    /// All values of tags named `key`, in order.
    pub fn tag_values<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.tags
            .iter()
            .filter(move |t| t.key() == Some(key))
            .filter_map(Tag::value)
    }

    /// Check that `id` is the hash of the content and `sig` signs it under `pubkey`.
    pub fn verify(&self) -> Result<(), NostrError> {
        let invalid = |reason: String| NostrError::InvalidEvent {
            id: self.id.clone(),
            reason,
        };

        let hash = event_hash(&self.pubkey, self.created_at, self.kind, &self.tags, &self.content)?;
        if hex::encode(hash) != self.id {
            return Err(invalid("id mismatch".into()));
        }
        let sig_bytes = hex::decode(&self.sig).map_err(|e| invalid(e.to_string()))?;
        let pk_bytes = hex::decode(&self.pubkey).map_err(|e| invalid(e.to_string()))?;
        let sig = Signature::from_slice(&sig_bytes).map_err(|e| invalid(e.to_string()))?;
        let pk = XOnlyPublicKey::from_slice(&pk_bytes).map_err(|e| invalid(e.to_string()))?;
        let msg = Message::from_digest_slice(&hash).map_err(|e| invalid(e.to_string()))?;
        Secp256k1::verification_only()
            .verify_schnorr(&sig, &msg, &pk)
            .map_err(|e| invalid(e.to_string()))
    }
}

fn find_tag<'a>(tags: &'a [Tag], key: &str) -> Option<&'a str> {
    tags.iter().find(|t| t.key() == Some(key)).and_then(Tag::value)
}

/// NIP-01 id: SHA-256 of `[0, pubkey, created_at, kind, tags, content]`.
pub fn event_hash(
    pubkey: &str,
    created_at: u64,
    kind: u32,
    tags: &[Tag],
    content: &str,
) -> Result<[u8; 32], NostrError> {
    let arr = serde_json::json!([0, pubkey, created_at, kind, tags, content]);
    let data = serde_json::to_vec(&arr)?;
    Ok(Sha256::digest(&data).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_hash_matches_reference() {
        let pubkey = "00".repeat(32);
        let expected: [u8; 32] = {
            let obj = serde_json::json!([0, pubkey, 1, 1, Vec::<Tag>::new(), ""]);
            Sha256::digest(serde_json::to_vec(&obj).unwrap()).into()
        };
        assert_eq!(event_hash(&pubkey, 1, 1, &[], "").unwrap(), expected);
    }

    #[test]
    fn tag_lookup_returns_first_match() {
        let ev = UnsignedEvent {
            kind: KIND_ARTICLE,
            created_at: 0,
            tags: vec![Tag::new("t", "a"), Tag::new("t", "b"), Tag::new("d", "slug")],
            content: String::new(),
        };
        assert_eq!(ev.tag_value("t"), Some("a"));
        assert_eq!(ev.tag_value("d"), Some("slug"));
        assert_eq!(ev.tag_value("x"), None);
    }

    #[test]
    fn tags_serialize_as_plain_arrays() {
        let json = serde_json::to_string(&vec![Tag::new("d", "hello")]).unwrap();
        assert_eq!(json, r#"[["d","hello"]]"#);
    }

    #[test]
    fn tampered_event_fails_verification() {
        let ev = Event {
            id: "00".repeat(32),
            pubkey: "00".repeat(32),
            kind: 1,
            created_at: 1,
            tags: vec![],
            content: String::new(),
            sig: "00".repeat(64),
        };
        assert!(matches!(ev.verify(), Err(NostrError::InvalidEvent { .. })));
    }
}

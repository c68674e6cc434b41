//! Author identity and Schnorr signing.
//!
//! Signing uses `sign_schnorr_no_aux_rand`, so the same key and the same
//! unsigned event always produce the same `id` and `sig`.

use std::fmt;

use secp256k1::{All, Keypair, Message, Secp256k1, XOnlyPublicKey};

use crate::error::NostrError;
use crate::event::{event_hash, Event, UnsignedEvent};
use crate::nip19;

/// A secret key together with its derived public key.
#[derive(Clone)]
pub struct Keys {
    secp: Secp256k1<All>,
    keypair: Keypair,
    public_key: XOnlyPublicKey,
}

impl fmt::Debug for Keys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keys")
            .field("public_key", &self.public_key_hex())
            .finish_non_exhaustive()
    }
}

impl Keys {
    /// Accepts an `nsec1…` string or 64 hex characters.
    pub fn parse(secret: &str) -> Result<Self, NostrError> {
        let secret = secret.trim();
        let bytes = if secret.starts_with(nip19::PREFIX_NSEC) {
            nip19::decode_secret_key(secret)?
        } else {
            let raw = hex::decode(secret).map_err(|e| NostrError::InvalidKey(e.to_string()))?;
            <[u8; 32]>::try_from(raw.as_slice())
                .map_err(|_| NostrError::InvalidKey(format!("expected 32 bytes, found {}", raw.len())))?
        };
        Self::from_secret_bytes(&bytes)
    }

    pub fn from_secret_bytes(bytes: &[u8; 32]) -> Result<Self, NostrError> {
        let secp = Secp256k1::new();
        let keypair = Keypair::from_seckey_slice(&secp, bytes)
            .map_err(|e| NostrError::InvalidKey(e.to_string()))?;
        let (public_key, _) = keypair.x_only_public_key();
        Ok(Self {
            secp,
            keypair,
            public_key,
        })
    }

    pub fn public_key_hex(&self) -> String {
        hex::encode(self.public_key.serialize())
    }

    pub fn npub(&self) -> String {
        nip19::encode_public_key(&self.public_key.serialize())
    }

    /// Assign author, id and signature.
    pub fn sign(&self, unsigned: UnsignedEvent) -> Result<Event, NostrError> {
        let pubkey = self.public_key_hex();
        let hash = event_hash(
            &pubkey,
            unsigned.created_at,
            unsigned.kind,
            &unsigned.tags,
            &unsigned.content,
        )?;
        let msg = Message::from_digest_slice(&hash)?;
        let sig = self.secp.sign_schnorr_no_aux_rand(&msg, &self.keypair);

        Ok(Event {
            id: hex::encode(hash),
            pubkey,
            kind: unsigned.kind,
            created_at: unsigned.created_at,
            tags: unsigned.tags,
            content: unsigned.content,
            sig: hex::encode(sig.as_ref()),
        })
    }
}

//! NIP-19 bech32 identifiers.
//!
//! Bare keys and ids (`nsec`, `npub`, `note`) are plain bech32 over 32 bytes.
//! Pointers (`nevent`, `nprofile`) carry a TLV payload:
//!
//! | type | meaning | value                          |
//! |------|---------|--------------------------------|
//! | 0    | special | event id / pubkey (32 bytes)   |
//! | 1    | relay   | relay URL (ascii)              |
//! | 2    | author  | pubkey (32 bytes)              |
//! | 3    | kind    | u32, big-endian                |
//!
//! Entries are written highest type first, each relay in the order given, so
//! strings match the ones produced by common JavaScript tooling byte for byte.
//! [`decode_article`] is the only entry point the engine uses for `nostr_id`:
//! it refuses anything that is not an `nevent` for a long-form article.

use bech32::{FromBase32, ToBase32, Variant};

use crate::error::DecodeError;
use crate::event::KIND_ARTICLE;

pub const PREFIX_NSEC: &str = "nsec";
pub const PREFIX_NPUB: &str = "npub";
pub const PREFIX_NOTE: &str = "note";
pub const PREFIX_NPROFILE: &str = "nprofile";
pub const PREFIX_NEVENT: &str = "nevent";

const TLV_SPECIAL: u8 = 0;
const TLV_RELAY: u8 = 1;
const TLV_AUTHOR: u8 = 2;
const TLV_KIND: u8 = 3;

/// Contents of an `nevent`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventPointer {
    /// Event id, lowercase hex.
    pub id: String,
    pub relays: Vec<String>,
    /// Author pubkey, lowercase hex.
    pub author: Option<String>,
    pub kind: Option<u32>,
}

impl EventPointer {
    /// Pointer to a long-form article seen on `relays`.
    pub fn article(id: impl Into<String>, relays: &[String]) -> Self {
        Self {
            id: id.into(),
            relays: relays.to_vec(),
            author: None,
            kind: Some(KIND_ARTICLE),
        }
    }

    /// Same id and kind, different relay hints.
    pub fn with_relays(&self, relays: &[String]) -> Self {
        Self {
            relays: relays.to_vec(),
            ..self.clone()
        }
    }
}

/// Any decoded NIP-19 entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Nip19 {
    SecretKey([u8; 32]),
    PublicKey(String),
    Note(String),
    Profile { pubkey: String, relays: Vec<String> },
    Event(EventPointer),
}

impl Nip19 {
    pub fn prefix(&self) -> &'static str {
        match self {
            Nip19::SecretKey(_) => PREFIX_NSEC,
            Nip19::PublicKey(_) => PREFIX_NPUB,
            Nip19::Note(_) => PREFIX_NOTE,
            Nip19::Profile { .. } => PREFIX_NPROFILE,
            Nip19::Event(_) => PREFIX_NEVENT,
        }
    }
}

// ---------------------------------------------------------------------------
// Encode
// ---------------------------------------------------------------------------

fn encode_raw(prefix: &str, data: &[u8]) -> String {
    // Infallible for the fixed, valid lowercase prefixes used here.
    bech32::encode(prefix, data.to_base32(), Variant::Bech32).unwrap_or_default()
}

pub fn encode_secret_key(bytes: &[u8; 32]) -> String {
    encode_raw(PREFIX_NSEC, bytes)
}

pub fn encode_public_key(bytes: &[u8; 32]) -> String {
    encode_raw(PREFIX_NPUB, bytes)
}

/// Encode an `nevent`. Relay URLs longer than 255 bytes cannot be
/// represented in a TLV entry and are left out.
pub fn encode_event(pointer: &EventPointer) -> Result<String, DecodeError> {
    let id = hex_32(&pointer.id)?;
    let mut tlv = Vec::new();

    if let Some(kind) = pointer.kind {
        push_tlv(&mut tlv, TLV_KIND, &kind.to_be_bytes());
    }
    if let Some(author) = &pointer.author {
        push_tlv(&mut tlv, TLV_AUTHOR, &hex_32(author)?);
    }
    for relay in &pointer.relays {
        if relay.len() > u8::MAX as usize {
            tracing::warn!("relay URL too long for nevent, skipped: {relay}");
            continue;
        }
        push_tlv(&mut tlv, TLV_RELAY, relay.as_bytes());
    }
    push_tlv(&mut tlv, TLV_SPECIAL, &id);

    Ok(encode_raw(PREFIX_NEVENT, &tlv))
}

/// `nevent` for an article id under `relays`.
pub fn encode_article(id: &str, relays: &[String]) -> Result<String, DecodeError> {
    encode_event(&EventPointer::article(id, relays))
}

fn push_tlv(out: &mut Vec<u8>, t: u8, value: &[u8]) {
    out.push(t);
    out.push(value.len() as u8);
    out.extend_from_slice(value);
}

fn hex_32(s: &str) -> Result<[u8; 32], DecodeError> {
    let raw = hex::decode(s).map_err(|e| DecodeError::InvalidTlv(e.to_string()))?;
    to_32(&raw)
}

fn to_32(raw: &[u8]) -> Result<[u8; 32], DecodeError> {
    <[u8; 32]>::try_from(raw).map_err(|_| DecodeError::InvalidLength(raw.len()))
}

// ---------------------------------------------------------------------------
// Decode
// ---------------------------------------------------------------------------

pub fn decode(s: &str) -> Result<Nip19, DecodeError> {
    let (prefix, data, _variant) =
        bech32::decode(s.trim()).map_err(|e| DecodeError::Bech32(e.to_string()))?;
    let bytes = Vec::<u8>::from_base32(&data).map_err(|e| DecodeError::Bech32(e.to_string()))?;

    match prefix.as_str() {
        PREFIX_NSEC => Ok(Nip19::SecretKey(to_32(&bytes)?)),
        PREFIX_NPUB => Ok(Nip19::PublicKey(hex::encode(to_32(&bytes)?))),
        PREFIX_NOTE => Ok(Nip19::Note(hex::encode(to_32(&bytes)?))),
        PREFIX_NPROFILE => {
            let tlv = parse_tlv(&bytes)?;
            Ok(Nip19::Profile {
                pubkey: tlv.special.ok_or(DecodeError::MissingId)?,
                relays: tlv.relays,
            })
        }
        PREFIX_NEVENT => {
            let tlv = parse_tlv(&bytes)?;
            Ok(Nip19::Event(EventPointer {
                id: tlv.special.ok_or(DecodeError::MissingId)?,
                relays: tlv.relays,
                author: tlv.author,
                kind: tlv.kind,
            }))
        }
        other => Err(DecodeError::UnknownPrefix(other.to_owned())),
    }
}

/// Decode a `nostr_id` that must reference a long-form article.
///
/// Any other NIP-19 type fails with [`DecodeError::WrongType`], an `nevent`
/// for another kind with [`DecodeError::WrongKind`]. A missing kind is read as
/// an article.
pub fn decode_article(s: &str) -> Result<EventPointer, DecodeError> {
    match decode(s)? {
        Nip19::Event(mut pointer) => match pointer.kind {
            Some(kind) if kind != KIND_ARTICLE => Err(DecodeError::WrongKind {
                expected: KIND_ARTICLE,
                found: kind,
            }),
            _ => {
                pointer.kind = Some(KIND_ARTICLE);
                Ok(pointer)
            }
        },
        other => Err(DecodeError::WrongType {
            expected: PREFIX_NEVENT,
            found: other.prefix().to_owned(),
        }),
    }
}

pub fn decode_secret_key(s: &str) -> Result<[u8; 32], DecodeError> {
    match decode(s)? {
        Nip19::SecretKey(bytes) => Ok(bytes),
        other => Err(DecodeError::WrongType {
            expected: PREFIX_NSEC,
            found: other.prefix().to_owned(),
        }),
    }
}

/// Hex pubkey from an `npub` or a bare hex string.
pub fn public_key_hex(s: &str) -> Result<String, DecodeError> {
    let s = s.trim();
    if s.starts_with(PREFIX_NPUB) {
        return match decode(s)? {
            Nip19::PublicKey(pk) => Ok(pk),
            other => Err(DecodeError::WrongType {
                expected: PREFIX_NPUB,
                found: other.prefix().to_owned(),
            }),
        };
    }
    Ok(hex::encode(hex_32(s)?))
}

#[derive(Default)]
struct Tlv {
    special: Option<String>,
    relays: Vec<String>,
    author: Option<String>,
    kind: Option<u32>,
}

fn parse_tlv(mut bytes: &[u8]) -> Result<Tlv, DecodeError> {
    let mut out = Tlv::default();
    while !bytes.is_empty() {
        let [t, len, rest @ ..] = bytes else {
            return Err(DecodeError::InvalidTlv("truncated header".into()));
        };
        let len = *len as usize;
        if rest.len() < len {
            return Err(DecodeError::InvalidTlv(format!(
                "type {t} claims {len} bytes, {} left",
                rest.len()
            )));
        }
        let (value, tail) = rest.split_at(len);
        match *t {
            TLV_SPECIAL if out.special.is_none() => {
                out.special = Some(hex::encode(to_32(value)?));
            }
            TLV_RELAY => {
                let relay = std::str::from_utf8(value)
                    .map_err(|e| DecodeError::InvalidTlv(e.to_string()))?;
                out.relays.push(relay.to_owned());
            }
            TLV_AUTHOR if out.author.is_none() => {
                out.author = Some(hex::encode(to_32(value)?));
            }
            TLV_KIND if out.kind.is_none() => {
                let raw: [u8; 4] = value
                    .try_into()
                    .map_err(|_| DecodeError::InvalidTlv(format!("kind is {len} bytes")))?;
                out.kind = Some(u32::from_be_bytes(raw));
            }
            _ => {}
        }
        bytes = tail;
    }
    Ok(out)
}

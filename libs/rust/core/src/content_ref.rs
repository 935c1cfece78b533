//! Two-slot content reference codec.
//!
//! A content identifier (typically an IPFS multihash such as `Qm...`) is stored as
//! two fixed-width 32 byte words. The registry never interprets the bytes beyond
//! equality; it only carries them.

use std::fmt;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

pub const SLOT_WIDTH: usize = 32;
pub const SLOT_COUNT: usize = 2;
/// Right-padding byte for the second slot.
pub const FILLER: u8 = b'0';

pub type Slot = [u8; SLOT_WIDTH];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ContentRefError {
    #[error("content identifier is empty")]
    Empty,
    #[error("content identifier is {0} bytes, at most {max} fit", max = SLOT_WIDTH * SLOT_COUNT)]
    TooLong(usize),
    #[error("slot {slot}: {reason}")]
    BadSlot { slot: usize, reason: String },
}

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentRef([Slot; SLOT_COUNT]);

impl ContentRef {
    /// Sentinel for "not set yet" (both words zero).
    pub const UNSET: ContentRef = ContentRef([[0u8; SLOT_WIDTH]; SLOT_COUNT]);

    /// Split `id` after its first 32 bytes. Slot 1 holds the tail followed by
    /// `FILLER` up to the full slot width, so it never carries NUL bytes.
    ///
    /// For 46-byte CIDv0 hashes this is byte-for-byte the classic layout (tail
    /// plus eighteen `'0'`). Shorter or longer identifiers differ from that
    /// layout, which appended exactly eighteen `'0'` and left the rest NUL.
    pub fn from_identifier(id: &str) -> Result<Self, ContentRefError> {
        let bytes = id.as_bytes();
        if bytes.is_empty() { return Err(ContentRefError::Empty); }
        if bytes.len() > SLOT_WIDTH * SLOT_COUNT { return Err(ContentRefError::TooLong(bytes.len())); }

        let mut first = [0u8; SLOT_WIDTH];
        let mut second = [FILLER; SLOT_WIDTH];
        let head = bytes.len().min(SLOT_WIDTH);
        first[..head].copy_from_slice(&bytes[..head]);
        if bytes.len() > SLOT_WIDTH {
            let tail = &bytes[SLOT_WIDTH..];
            second[..tail.len()].copy_from_slice(tail);
        }
        Ok(Self([first, second]))
    }

    /// Accepts an already-encoded pair verbatim.
    pub const fn from_slots(slots: [Slot; SLOT_COUNT]) -> Self { Self(slots) }

    pub fn slots(&self) -> &[Slot; SLOT_COUNT] { &self.0 }

    pub fn slot(&self, i: usize) -> Option<&Slot> { self.0.get(i) }

    /// UTF-8 view of one slot with trailing NULs trimmed. `None` when the slot is
    /// out of range or not valid UTF-8.
    pub fn slot_str(&self, i: usize) -> Option<&str> {
        let s = self.slot(i)?;
        let end = s.iter().rposition(|b| *b != 0).map(|p| p + 1).unwrap_or(0);
        std::str::from_utf8(&s[..end]).ok()
    }

    pub fn is_unset(&self) -> bool { *self == Self::UNSET }

    pub fn to_hex_words(&self) -> [String; SLOT_COUNT] {
        [format!("0x{}", hex::encode(self.0[0])), format!("0x{}", hex::encode(self.0[1]))]
    }

    fn parse_word(slot: usize, word: &str) -> Result<Slot, ContentRefError> {
        let raw = word.strip_prefix("0x").unwrap_or(word);
        let bytes = hex::decode(raw).map_err(|e| ContentRefError::BadSlot { slot, reason: e.to_string() })?;
        bytes.try_into().map_err(|b: Vec<u8>| ContentRefError::BadSlot { slot, reason: format!("expected {SLOT_WIDTH} bytes, got {}", b.len()) })
    }

    pub fn from_hex_words(words: [&str; SLOT_COUNT]) -> Result<Self, ContentRefError> {
        Ok(Self([Self::parse_word(0, words[0])?, Self::parse_word(1, words[1])?]))
    }
}

impl Default for ContentRef { fn default() -> Self { Self::UNSET } }

impl fmt::Debug for ContentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.slot_str(0), self.slot_str(1)) {
            (Some(a), Some(b)) if !self.is_unset() => write!(f, "ContentRef({a:?}, {b:?})"),
            _ => write!(f, "ContentRef({self})"),
        }
    }
}

impl fmt::Display for ContentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b] = self.to_hex_words();
        write!(f, "[{a}, {b}]")
    }
}

impl Serialize for ContentRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_hex_words().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ContentRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let [a, b] = <[String; SLOT_COUNT]>::deserialize(deserializer)?;
        Self::from_hex_words([&a, &b]).map_err(serde::de::Error::custom)
    }
}

use super::{
    CursorError,
    crockford::{decode_base32, encode_base32, encoded_len},
};
use crate::types::{ContentId, ContentItem, Position};
use core::{fmt, str::FromStr};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Version byte written into every token minted by this codec.
pub const CURSOR_VERSION: u8 = 1;

/// `version | direction | sort_key (i64 BE) | tie_break_id (u64 BE)`
const RAW_LEN: usize = 1 + 1 + 8 + 8;

/// Length of an encoded token in characters.
pub const CURSOR_TOKEN_LEN: usize = encoded_len(RAW_LEN);

/// Which side of the cursor position the next page lies on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Older items: `(createdAt, id) < position`.
    #[default]
    Forward,
    /// Newer items: `(createdAt, id) > position`.
    Backward,
}

impl Direction {
    const fn tag(self) -> u8 {
        match self {
            Self::Forward => 0,
            Self::Backward => 1,
        }
    }

    const fn from_tag(tag: u8) -> Result<Self, CursorError> {
        match tag {
            0 => Ok(Self::Forward),
            1 => Ok(Self::Backward),
            _ => Err(CursorError::InvalidDirection { tag }),
        }
    }
}

/// A decoded continuation token.
///
/// Cursors are derived purely from an item of the previous page, which keeps
/// pagination stateless. Decoding a token minted by the same codec version
/// reproduces the exact `(sort_key, tie_break_id)` pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Cursor {
    /// `createdAt` of the anchor item in microseconds since the Unix epoch.
    pub sort_key: i64,
    /// Id of the anchor item.
    pub tie_break_id: ContentId,
    pub direction: Direction,
}

impl Cursor {
    pub const fn new(sort_key: i64, tie_break_id: ContentId, direction: Direction) -> Self {
        Self {
            sort_key,
            tie_break_id,
            direction,
        }
    }

    /// Cursor continuing to items older than `item`.
    pub fn forward_from(item: &ContentItem) -> Self {
        Self::at(item.position(), Direction::Forward)
    }

    /// Cursor continuing to items newer than `item`.
    pub fn backward_from(item: &ContentItem) -> Self {
        Self::at(item.position(), Direction::Backward)
    }

    pub const fn at(position: Position, direction: Direction) -> Self {
        Self::new(position.sort_key, position.id, direction)
    }

    /// The anchor position of the strict row-value predicate.
    pub const fn position(&self) -> Position {
        Position::new(self.sort_key, self.tie_break_id)
    }

    fn to_bytes(self) -> [u8; RAW_LEN] {
        let mut raw = [0_u8; RAW_LEN];
        raw[0] = CURSOR_VERSION;
        raw[1] = self.direction.tag();
        raw[2..10].copy_from_slice(&self.sort_key.to_be_bytes());
        raw[10..18].copy_from_slice(&self.tie_break_id.0.to_be_bytes());
        raw
    }

    fn from_bytes(raw: &[u8; RAW_LEN]) -> Result<Self, CursorError> {
        if raw[0] != CURSOR_VERSION {
            return Err(CursorError::UnsupportedVersion { version: raw[0] });
        }
        let direction = Direction::from_tag(raw[1])?;

        let mut sort_key = [0_u8; 8];
        sort_key.copy_from_slice(&raw[2..10]);
        let mut id = [0_u8; 8];
        id.copy_from_slice(&raw[10..18]);

        Ok(Self::new(
            i64::from_be_bytes(sort_key),
            ContentId(u64::from_be_bytes(id)),
            direction,
        ))
    }

    /// Renders this cursor as an opaque, URL-safe token.
    pub fn encode(&self) -> String {
        let mut buf = [0_u8; CURSOR_TOKEN_LEN];
        encode_base32(&self.to_bytes(), &mut buf);
        buf.iter().map(|&b| char::from(b)).collect()
    }

    /// Parses a token produced by [`Cursor::encode`].
    ///
    /// Surrounding whitespace is ignored and decoding is case-insensitive.
    ///
    /// # Errors
    ///
    /// Returns a [`CursorError`] if the token is empty, has the wrong length,
    /// contains characters outside the Crockford alphabet, carries non-zero
    /// padding bits, or was minted by a different codec version.
    pub fn decode(token: &str) -> Result<Self, CursorError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(CursorError::Empty);
        }

        let mut raw = [0_u8; RAW_LEN];
        decode_base32(token.as_bytes(), &mut raw)?;
        Self::from_bytes(&raw)
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for Cursor {
    type Err = CursorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode(s)
    }
}

impl Serialize for Cursor {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.encode())
    }
}

impl<'de> Deserialize<'de> for Cursor {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let token = String::deserialize(deserializer)?;
        Self::decode(&token).map_err(serde::de::Error::custom)
    }
}

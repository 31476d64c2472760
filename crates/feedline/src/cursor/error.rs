/// Reasons a continuation token fails to decode.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum CursorError {
    #[error("cursor token is empty")]
    Empty,

    #[error("cursor token has {len} characters, expected {expected}")]
    InvalidLength { len: usize, expected: usize },

    #[error("invalid cursor character {byte:#04x} at index {index}")]
    InvalidCharacter { byte: u8, index: usize },

    #[error("cursor token has non-zero padding bits")]
    NonCanonical,

    #[error("unsupported cursor version {version}")]
    UnsupportedVersion { version: u8 },

    #[error("invalid cursor direction tag {tag}")]
    InvalidDirection { tag: u8 },
}

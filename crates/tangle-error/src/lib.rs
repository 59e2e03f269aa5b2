//! Error taxonomy for the tangle serialization engine.
//!
//! Every failure an encode or decode call can report is one of the variants
//! below. There is no partial-success surface: a call either produces a
//! complete byte vector / value, or one of these errors.

use thiserror::Error;

/// Primary error type for encode/decode operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Input ended in the middle of a token or body.
    #[error("unexpected end of input")]
    Truncated,

    /// A tag byte matched no kind expected at this position.
    #[error("unrecognised tag byte {byte:#010b} at offset {offset}")]
    UnrecognisedKind { byte: u8, offset: usize },

    /// A registry lookup failed, by id (decode) or by name (encode with
    /// auto-registration disabled).
    #[error("unknown type: {detail}")]
    UnknownTypeId { detail: String },

    /// A reference to a node id that was never assigned by end-of-stream,
    /// or whose resolved type is incompatible with the pointer demanding it.
    #[error("bad reference to node {id}{}", .detail.as_deref().map(|d| format!(": {d}")).unwrap_or_default())]
    BadReference { id: u64, detail: Option<String> },

    /// The stream carries a value wider than this platform's native word.
    #[error("stream value needs {needed} bits but native width is {native} bits")]
    WidthMismatch { needed: u32, native: u32 },

    /// The encoder met a value whose kind cannot be serialised.
    #[error("unsupported value kind {kind}")]
    UnsupportedKind { kind: &'static str },

    /// An unknown or conflicting option was passed to encode/decode.
    #[error("bad option: {detail}")]
    BadOption { detail: String },

    /// Umbrella for internal invariant violations reached via malformed
    /// input. Decoding never panics through to the host; the top-level
    /// barrier converts panics into this.
    #[error("corrupt stream: {detail}")]
    Corrupt { detail: String },
}

impl Error {
    /// Create a corrupt-stream error.
    pub fn corrupt(detail: impl Into<String>) -> Self {
        Self::Corrupt {
            detail: detail.into(),
        }
    }

    /// Create a bad-option error.
    pub fn bad_option(detail: impl Into<String>) -> Self {
        Self::BadOption {
            detail: detail.into(),
        }
    }

    /// Create an unknown-type error for a decoded type id.
    pub fn unknown_id(id: u64) -> Self {
        Self::UnknownTypeId {
            detail: format!("id {id}"),
        }
    }

    /// Create an unknown-type error for an unregistered type name.
    pub fn unknown_name(name: impl Into<String>) -> Self {
        Self::UnknownTypeId {
            detail: format!("unregistered {}", name.into()),
        }
    }

    /// Create a bad-reference error.
    pub fn bad_reference(id: u64) -> Self {
        Self::BadReference { id, detail: None }
    }

    /// Whether this error indicates malformed input bytes (as opposed to a
    /// caller mistake such as a bad option or an unsupported value).
    pub const fn is_malformed_input(&self) -> bool {
        matches!(
            self,
            Self::Truncated
                | Self::UnrecognisedKind { .. }
                | Self::BadReference { .. }
                | Self::Corrupt { .. }
        )
    }
}

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

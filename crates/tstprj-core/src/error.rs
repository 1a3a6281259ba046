//! Error types shared by the codec, the markup parser and the project API.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// An error originating from file I/O.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The byte stream ended inside a field.
    #[error("truncated stream while reading {context} at offset {offset:#x}")]
    Truncated {
        context: &'static str,
        offset: usize,
    },

    /// The input buffer is empty.
    #[error("empty stream")]
    Empty,

    /// The stream finished without producing a top-level element.
    #[error("stream produced no document root")]
    MissingRoot,

    /// A byte slice that should hold text is not valid UTF-8.
    #[error("invalid UTF-8 in {context}")]
    InvalidUtf8 { context: &'static str },

    /// An attribute carries a type discriminant the format does not define.
    #[error("unknown attribute type {tag:#04x} for key {key:?} at offset {offset:#x}")]
    UnknownAttributeType { key: String, tag: u8, offset: usize },

    /// A float payload must be exactly 8 bytes.
    #[error("float payload must be 8 bytes, got {got}")]
    FloatWidth { got: usize },

    /// An unsigned field carries significant bytes beyond the 8th.
    #[error("unsigned field wider than 8 bytes ({len} bytes)")]
    UintWidth { len: usize },

    /// A markup fragment failed to parse.
    #[error("markup syntax error at byte {offset}: {message}")]
    Markup { offset: usize, message: String },

    /// A key violates the casing/content rules of the wire format.
    #[error("invalid key {key:?}: {reason}")]
    InvalidKey { key: String, reason: &'static str },

    /// Markup parsing was requested on a non-string attribute.
    #[error("attribute {key:?} does not hold markup text")]
    NotMarkup { key: String },

    /// An operation needed a parsed document but none is loaded.
    #[error("no document has been parsed")]
    NotParsed,

    /// A parse was requested while another is in flight on the same project.
    #[error("a parse is already in progress on this project")]
    ParseInFlight,
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

//! Error types for the typed protocol layer.
//!
//! Each stage owns its error enum: kind resolution (`KindError`), value
//! translation (`CodecError`), and frame structure (`FrameError`).

use helmpack::Error as PackError;

/// Failure to resolve a native type descriptor to a wire kind.
///
/// Surfaced at method-registration time, never at call time.
#[derive(Debug, Clone)]
pub enum KindError {
    /// The requested type (or something nested inside it) has no wire mapping.
    Unresolvable {
        /// Structural signature of the type being resolved.
        requested: String,
        /// The nested type that broke resolution.
        offending: String,
    },
}

impl std::fmt::Display for KindError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KindError::Unresolvable { requested, offending } => {
                write!(f, "cannot resolve wire kind for '{}': no mapping for '{}'", requested, offending)
            }
        }
    }
}

impl std::error::Error for KindError {}

/// Failure to translate between a `WireValue` and its wire bytes.
#[derive(Debug, Clone)]
pub enum CodecError {
    /// The underlying helmpack serialization failed.
    Pack(PackError),
    /// The value does not belong to the declared wire kind.
    TypeMismatch { expected: String, found: &'static str },
    /// A map carried the same key twice.
    DuplicateMapKey,
    /// Inet address bytes were neither 4 (v4) nor 16 (v6) long.
    InvalidInet(usize),
    /// `void` declares the absence of a value; it cannot carry one.
    VoidValue,
    /// The value was nested deeper than the codec permits.
    RecursionLimitExceeded,
    /// A self-describing decode met a tag with no value mapping.
    UnsupportedTag(u8),
}

impl From<PackError> for CodecError {
    fn from(e: PackError) -> Self { Self::Pack(e) }
}

impl std::fmt::Display for CodecError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CodecError::Pack(e) => write!(f, "pack error: {}", e),
            CodecError::TypeMismatch { expected, found } => {
                write!(f, "value does not match wire kind: expected {}, found {}", expected, found)
            }
            CodecError::DuplicateMapKey => write!(f, "map key appears more than once"),
            CodecError::InvalidInet(n) => write!(f, "inet address must be 4 or 16 bytes, got {}", n),
            CodecError::VoidValue => write!(f, "void carries no value"),
            CodecError::RecursionLimitExceeded => write!(f, "value nested too deeply"),
            CodecError::UnsupportedTag(b) => write!(f, "tag {:#04x} has no value mapping", b),
        }
    }
}

impl std::error::Error for CodecError {}

/// Failure in the structure of an RPC envelope.
#[derive(Debug, Clone)]
pub enum FrameError {
    /// The underlying helmpack serialization failed.
    Pack(PackError),
    /// A value inside the frame failed to translate.
    Codec(CodecError),
    /// The internal structure of the message was malformed.
    ProtocolViolation(String),
    /// An unknown frame or outcome variant was encountered.
    UnknownVariant(String),
}

impl From<PackError> for FrameError {
    fn from(e: PackError) -> Self { Self::Pack(e) }
}

impl From<CodecError> for FrameError {
    fn from(e: CodecError) -> Self { Self::Codec(e) }
}

impl std::fmt::Display for FrameError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FrameError::Pack(e) => write!(f, "pack error: {}", e),
            FrameError::Codec(e) => write!(f, "codec error: {}", e),
            FrameError::ProtocolViolation(msg) => write!(f, "protocol violation: {}", msg),
            FrameError::UnknownVariant(name) => write!(f, "unknown variant: {}", name),
        }
    }
}

impl std::error::Error for FrameError {}

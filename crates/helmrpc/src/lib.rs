// crates/helmrpc/src/lib.rs
//! # Helmrpc
//!
//! The typed protocol layer of the helm control bridge, over `helmpack`.
//!
//! ## Architecture
//!
//! This library bridges native management values (`WireValue`) with the
//! structural rigor of `helmpack`. The type system is deliberately closed:
//! every parameter and result of a registered operation must resolve to a
//! `WireKind`, and resolution failures surface at registration time, never
//! while traffic is being served.

mod codec;
mod error;
mod frame;
mod kind;
mod value;

#[cfg(test)]
mod tests;

pub use crate::error::CodecError;
pub use crate::error::FrameError;
pub use crate::error::KindError;

pub use crate::kind::KindCache;
pub use crate::kind::NativeType;
pub use crate::kind::WireKind;

pub use crate::value::WireValue;

pub use crate::codec::decode_value;
pub use crate::codec::decode_value_any;
pub use crate::codec::encode_value;
pub use crate::codec::encode_value_any;

pub use crate::frame::decode_seq;
pub use crate::frame::CallDecoder;
pub use crate::frame::CallEncoder;
pub use crate::frame::ErrorCode;
pub use crate::frame::Frame;
pub use crate::frame::ReplyBody;
pub use crate::frame::ReplyDecoder;
pub use crate::frame::ReplyEncoder;
pub use crate::frame::ReplyOutcome;
pub use crate::frame::Row;

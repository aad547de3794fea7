//! # Protocol Frames
//!
//! Defines the structure of the RPC envelope (Call vs Reply).
//!
//! ## Invariants
//! - **Panic Safety**: All decoding paths return `Result`, never panicking on
//!   unknown data.
//! - **Forward Compatibility**: Unknown header fields are safely skipped.
//!
//! A Call carries `(object, method, ordered args)` plus an optional opaque
//! caller-identity token. A Reply carries one of three outcomes: result rows,
//! an explicit not-found marker, or an error code with its message.

use helmpack::Decoder;
use helmpack::Encoder;

use crate::codec::decode_value_any;
use crate::codec::encode_value_any;
use crate::error::FrameError;
use crate::value::WireValue;

type Result<T> = std::result::Result<T, FrameError>;

/// One result row: named fields in declaration order.
pub type Row = Vec<(String, WireValue)>;

/// Wire error codes surfaced to external callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// The caller identity failed a permission check.
    Unauthorized,
    /// Any other failure; the original message is preserved.
    ServerError,
}

impl ErrorCode {
    fn as_tag(&self) -> &'static str {
        match self {
            ErrorCode::Unauthorized => "Unauthorized",
            ErrorCode::ServerError => "ServerError",
        }
    }

    fn from_tag(tag: &str) -> Result<Self> {
        match tag {
            "Unauthorized" => Ok(ErrorCode::Unauthorized),
            "ServerError" => Ok(ErrorCode::ServerError),
            other => Err(FrameError::UnknownVariant(other.to_string())),
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCode::Unauthorized => write!(f, "UNAUTHORIZED"),
            ErrorCode::ServerError => write!(f, "SERVER_ERROR"),
        }
    }
}

/// Encodes an outbound Call frame.
pub struct CallEncoder<'a> {
    pub seq: u64,
    pub object: &'a str,
    pub method: &'a str,
    pub caller: Option<&'a str>,
    pub args: &'a [WireValue],
}

impl<'a> CallEncoder<'a> {
    pub fn new(
        seq: u64,
        object: &'a str,
        method: &'a str,
        caller: Option<&'a str>,
        args: &'a [WireValue],
    ) -> Self {
        Self { seq, object, method, caller, args }
    }

    /// Encode this call into the encoder.
    pub fn encode(&self, enc: &mut Encoder) -> Result<()> {
        enc.variant_begin("Call")?;
        enc.record_begin()?;

        write_field_seq(enc, self.seq)?;
        write_field_str(enc, "object", self.object)?;
        write_field_str(enc, "method", self.method)?;

        enc.variant_begin("caller")?;
        match self.caller {
            Some(token) => enc.str(token)?,
            None => enc.null()?,
        }
        enc.variant_end()?;

        enc.variant_begin("args")?;
        enc.list_begin()?;
        for val in self.args {
            encode_value_any(enc, val)?;
        }
        enc.list_end()?;
        enc.variant_end()?;

        enc.record_end()?;
        enc.variant_end()?;
        Ok(())
    }
}

/// Decodes an inbound Call frame.
///
/// **Invariant**: the `args` decoder points to a List container holding the
/// positional arguments; decode them against the resolved method signature.
#[derive(Debug)]
pub struct CallDecoder<'a> {
    pub seq: u64,
    pub object: &'a str,
    pub method: &'a str,
    pub caller: Option<&'a str>,
    pub args: Decoder<'a>,
}

impl<'a> CallDecoder<'a> {
    /// Decode a Call frame body.
    pub fn decode(mut dec: Decoder<'a>) -> Result<Self> {
        let mut fields = dec.record()?;
        let mut seq = None;
        let mut object = None;
        let mut method = None;
        let mut caller = None;
        let mut args_dec = None;

        while let Some((key, mut val)) = fields.next()? {
            match key {
                "seq" => seq = Some(val.s64()? as u64),
                "object" => object = Some(val.str()?),
                "method" => method = Some(val.str()?),
                "caller" => {
                    if !val.peek_null() {
                        caller = Some(val.str()?);
                    }
                }
                "args" => args_dec = Some(val),
                _ => val.skip()?,
            }
        }

        Ok(CallDecoder {
            seq: seq.ok_or(FrameError::ProtocolViolation("Missing seq".into()))?,
            object: object.ok_or(FrameError::ProtocolViolation("Missing object".into()))?,
            method: method.ok_or(FrameError::ProtocolViolation("Missing method".into()))?,
            caller,
            args: args_dec.ok_or(FrameError::ProtocolViolation("Missing args".into()))?,
        })
    }
}

/// The body of an outbound Reply frame.
pub enum ReplyBody<'a> {
    /// Result rows. A void result is an explicit zero-row reply, which stays
    /// distinct from NotFound and from a row holding a null value.
    Rows(&'a [Row]),
    /// The requested object or method is not registered.
    NotFound,
    /// The call failed; the original message is preserved.
    Error { code: ErrorCode, message: &'a str },
}

/// Encodes an outbound Reply frame.
pub struct ReplyEncoder<'a> {
    pub seq: u64,
    pub body: ReplyBody<'a>,
}

impl<'a> ReplyEncoder<'a> {
    pub fn new(seq: u64, body: ReplyBody<'a>) -> Self {
        Self { seq, body }
    }

    /// Encode this reply into the encoder.
    pub fn encode(&self, enc: &mut Encoder) -> Result<()> {
        enc.variant_begin("Reply")?;
        enc.record_begin()?;

        write_field_seq(enc, self.seq)?;

        enc.variant_begin("outcome")?;
        match &self.body {
            ReplyBody::Rows(rows) => {
                enc.variant_begin("Rows")?;
                enc.list_begin()?;
                for row in rows.iter() {
                    enc.record_begin()?;
                    for (name, value) in row {
                        enc.variant_begin(name)?;
                        encode_value_any(enc, value)?;
                        enc.variant_end()?;
                    }
                    enc.record_end()?;
                }
                enc.list_end()?;
                enc.variant_end()?;
            }
            ReplyBody::NotFound => {
                enc.variant_begin("NotFound")?;
                enc.unit()?;
                enc.variant_end()?;
            }
            ReplyBody::Error { code, message } => {
                enc.variant_begin("Error")?;
                enc.record_begin()?;
                enc.variant_begin("code")?;
                enc.str(code.as_tag())?;
                enc.variant_end()?;
                write_field_str(enc, "message", message)?;
                enc.record_end()?;
                enc.variant_end()?;
            }
        }
        enc.variant_end()?;

        enc.record_end()?;
        enc.variant_end()?;
        Ok(())
    }
}

/// The decoded outcome of a call, owned.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplyOutcome {
    Rows(Vec<Row>),
    NotFound,
    Error { code: ErrorCode, message: String },
}

/// Decodes an inbound Reply frame.
#[derive(Debug)]
pub struct ReplyDecoder {
    pub seq: u64,
    pub outcome: ReplyOutcome,
}

impl ReplyDecoder {
    /// Decode a Reply frame body.
    pub fn decode(mut dec: Decoder<'_>) -> Result<Self> {
        let mut fields = dec.record()?;
        let mut seq = None;
        let mut outcome = None;

        while let Some((key, mut val)) = fields.next()? {
            match key {
                "seq" => seq = Some(val.s64()? as u64),
                "outcome" => outcome = Some(Self::decode_outcome(val)?),
                _ => val.skip()?,
            }
        }

        Ok(ReplyDecoder {
            seq: seq.ok_or(FrameError::ProtocolViolation("Missing seq".into()))?,
            outcome: outcome.ok_or(FrameError::ProtocolViolation("Missing outcome".into()))?,
        })
    }

    fn decode_outcome(mut dec: Decoder<'_>) -> Result<ReplyOutcome> {
        let (name, mut body) = dec.variant()?;
        match name {
            "Rows" => {
                let mut rows = Vec::new();
                let mut iter = body.list()?;
                while let Some(mut row_dec) = iter.next() {
                    let mut row = Row::new();
                    let mut fields = row_dec.record()?;
                    while let Some((field, mut val)) = fields.next()? {
                        row.push((field.to_string(), decode_value_any(&mut val)?));
                    }
                    rows.push(row);
                }
                Ok(ReplyOutcome::Rows(rows))
            }
            "NotFound" => {
                body.unit()?;
                Ok(ReplyOutcome::NotFound)
            }
            "Error" => {
                let mut fields = body.record()?;
                let mut code = None;
                let mut message = None;
                while let Some((field, mut val)) = fields.next()? {
                    match field {
                        "code" => code = Some(ErrorCode::from_tag(val.str()?)?),
                        "message" => message = Some(val.str()?.to_string()),
                        _ => val.skip()?,
                    }
                }
                Ok(ReplyOutcome::Error {
                    code: code.ok_or(FrameError::ProtocolViolation("Missing code".into()))?,
                    message: message.ok_or(FrameError::ProtocolViolation("Missing message".into()))?,
                })
            }
            other => Err(FrameError::UnknownVariant(other.to_string())),
        }
    }
}

/// Top-level frame decoder.
#[derive(Debug)]
pub enum Frame<'a> {
    Call(CallDecoder<'a>),
    Reply(ReplyDecoder),
}

impl<'a> Frame<'a> {
    /// Decode an RPC frame from the decoder.
    pub fn decode(dec: &mut Decoder<'a>) -> Result<Self> {
        let (msg_type, body) = dec.variant()?;
        match msg_type {
            "Call" => Ok(Frame::Call(CallDecoder::decode(body)?)),
            "Reply" => Ok(Frame::Reply(ReplyDecoder::decode(body)?)),
            _ => Err(FrameError::UnknownVariant(format!("Top-level frame: {}", msg_type))),
        }
    }
}

/// Decodes just the sequence number from a raw frame.
///
/// Useful for answering with an error reply when the full decoding of the
/// request might itself fail.
pub fn decode_seq(bytes: &[u8]) -> Result<u64> {
    let mut dec = Decoder::new(bytes);
    let (_msg_type, mut body) = dec.variant()?;
    let mut fields = body.record()?;

    while let Some((key, mut val)) = fields.next()? {
        if key == "seq" {
            return Ok(val.s64()? as u64);
        } else {
            val.skip()?;
        }
    }

    Err(FrameError::ProtocolViolation("Missing seq".into()))
}

// Helper functions

fn write_field_seq(enc: &mut Encoder, seq: u64) -> Result<()> {
    enc.variant_begin("seq")?;
    enc.s64(seq as i64)?;
    enc.variant_end()?;
    Ok(())
}

fn write_field_str(enc: &mut Encoder, key: &str, val: &str) -> Result<()> {
    enc.variant_begin(key)?;
    enc.str(val)?;
    enc.variant_end()?;
    Ok(())
}

//! # Helmpack
//!
//! The byte-level wire format for the helm control bridge.
//!
//! ## Philosophy
//!
//! - **Closed vocabulary**: the tag set is exactly the value shapes the
//!   bridge exchanges. There is no escape hatch for arbitrary types.
//! - **TLV Architecture**: `[Tag][Length?][Value]` structure enables safe
//!   skipping of unknown fields.
//! - **Bounded**: Encoders track state explicitly. Decoders are zero-copy,
//!   bounds-checked views.
//!
//! ## Format
//!
//! - **Scalars**: `[Tag: 1b][Data: N]`
//! - **Blobs**: `[Tag: 1b][Len: 4b][Data: Len]`
//! - **Containers**: `[Tag: 1b][Len: 4b][Body: Len]`
//!
//! All integers are Little-Endian. Absence is an explicit `Null` tag, never
//! zero bytes, so "field absent" and "field present but empty" stay distinct.

#[cfg(test)]
mod tests;

/// Helmpack serialization and deserialization errors.
#[derive(Debug, Clone)]
pub enum Error {
    /// Byte does not correspond to a valid helmpack `Tag`.
    InvalidTag(u8),
    /// String data is not valid UTF-8.
    InvalidUtf8,
    /// Closing a scope that does not match the active scope stack.
    ScopeMismatch { expected: Scope, actual: Scope },
    /// Attempted to close a scope when only the Root remains.
    ScopeUnderflow,
    /// Attempted to finalize the buffer with open scopes.
    ScopeStillOpen,
    /// Buffer exhausted while reading.
    UnexpectedEnd,
    /// Blob or container length exceeds `u32::MAX`.
    BlobTooLarge(usize),
    /// Structural Violation: Attempted to write >1 payload into a Variant.
    TooManyItems(Scope),
    /// Structural Violation: Attempted to close a Variant without a payload.
    EmptyVariant,
    /// Structural Violation: Attempted to write a non-Variant directly into a Record.
    InvalidRecordEntry,
    /// Structural Violation: Map closed with a dangling key (odd item count).
    OddMapEntry,
    /// Inet address bytes exceed the one-byte length header.
    InetTooLong(usize),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::InvalidTag(b) => write!(f, "Invalid Tag byte: {:#04x}", b),
            Error::ScopeMismatch { expected, actual } => {
                write!(f, "Scope Mismatch: expected {:?}, found {:?}", expected, actual)
            }
            Error::TooManyItems(s) => write!(f, "Too many items in scope {:?}; expected exactly 1", s),
            Error::OddMapEntry => write!(f, "Map closed with a key missing its value"),
            Error::InetTooLong(n) => write!(f, "Inet address of {} bytes exceeds header", n),
            _ => write!(f, "{:?}", self),
        }
    }
}

impl std::error::Error for Error {}

/// Specialized `Result` for helmpack operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Identifies the type of the encoded value.
///
/// Used for self-description and safe skipping of unknown fields.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    /// Padding/Alignment (Skip).
    Pad = 0x00,

    // Fixed-width scalars
    BoolTrue = 0x01,
    BoolFalse = 0x02,
    Byte = 0x03,
    S32 = 0x04,
    S64 = 0x05,
    F32 = 0x06,
    F64 = 0x07,
    /// Milliseconds since the Unix epoch, signed 64-bit.
    Timestamp = 0x08,
    /// 16 raw bytes.
    Uuid = 0x09,

    // Unit / absence
    Unit = 0x0E,
    Null = 0x0F,

    // Blobs (Tag + u32 Len + Bytes)
    String = 0x10,
    Bytes = 0x11,
    /// Tag + u8 Len + address bytes (4 for v4, 16 for v6).
    Inet = 0x12,

    // Containers (Tag + u32 Len + Body)
    List = 0x20,
    Set = 0x21,
    /// Alternating key/value items; even item count enforced at close.
    Map = 0x22,
    /// Named fields; only Variant children permitted.
    Record = 0x23,

    /// Named payload (Tag + u32 Len + name String + payload).
    Variant = 0x33,
}

impl Tag {
    /// Returns the Tag variant for a given byte, or `None` if invalid.
    pub fn from_u8(b: u8) -> Option<Self> {
        match b {
            0x00 => Some(Tag::Pad),
            0x01 => Some(Tag::BoolTrue),
            0x02 => Some(Tag::BoolFalse),
            0x03 => Some(Tag::Byte),
            0x04 => Some(Tag::S32),
            0x05 => Some(Tag::S64),
            0x06 => Some(Tag::F32),
            0x07 => Some(Tag::F64),
            0x08 => Some(Tag::Timestamp),
            0x09 => Some(Tag::Uuid),
            0x0E => Some(Tag::Unit),
            0x0F => Some(Tag::Null),
            0x10 => Some(Tag::String),
            0x11 => Some(Tag::Bytes),
            0x12 => Some(Tag::Inet),
            0x20 => Some(Tag::List),
            0x21 => Some(Tag::Set),
            0x22 => Some(Tag::Map),
            0x23 => Some(Tag::Record),
            0x33 => Some(Tag::Variant),
            _ => None,
        }
    }
}

/// Internal state tracking for the `Encoder` stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// The virtual root; allows any item.
    Root,
    /// Ordered sequence; allows any number of items.
    List,
    /// Unordered unique sequence; structurally identical to List.
    Set,
    /// Alternating key/value items; must close on an even count.
    Map,
    /// Named-field container; strictly allows only `Tag::Variant` items.
    Record,
    /// Strict container; allows exactly one item (the payload) after the name.
    Variant,
}

/// An active container scope on the `Encoder` stack.
struct Frame {
    start: usize,
    scope: Scope,
    count: usize,
}

/// A bounded, state-machine driven encoder.
///
/// The Encoder maintains a stack of open scopes to enforce structural
/// strictness and automatically back-patch length headers.
///
/// # Structural Invariants
///
/// All write methods validate the operation against the current `Scope`:
///
/// 1.  **Record Scopes**: Only `Tag::Variant` items may be written.
/// 2.  **Variant Scopes**: Exactly one payload item must be written.
/// 3.  **Map Scopes**: The item count must be even when the scope closes.
/// 4.  **Root Scope**: The encoder must end in the Root scope to finalize.
pub struct Encoder {
    buf: Vec<u8>,
    /// Bottom is always `Scope::Root`.
    stack: Vec<Frame>,
}

impl Default for Encoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Encoder {
    /// Creates a new encoder with default capacity.
    pub fn new() -> Self {
        let mut enc = Self {
            buf: Vec::with_capacity(1024),
            stack: Vec::with_capacity(8),
        };
        enc.stack.push(Frame { start: 0, scope: Scope::Root, count: 0 });
        enc
    }

    /// Consumes the encoder and returns the final byte vector.
    ///
    /// # Errors
    /// Returns `Error::ScopeStillOpen` if the stack depth > 1.
    pub fn into_bytes(self) -> Result<Vec<u8>> {
        if self.stack.len() > 1 {
            return Err(Error::ScopeStillOpen);
        }
        Ok(self.buf)
    }

    fn current_frame(&mut self) -> &mut Frame {
        self.stack.last_mut().unwrap()
    }

    fn check_write(&mut self, tag: Tag) -> Result<()> {
        let frame = self.current_frame();
        match frame.scope {
            Scope::Root | Scope::List | Scope::Set | Scope::Map => Ok(()),
            Scope::Record => {
                if tag != Tag::Variant {
                    Err(Error::InvalidRecordEntry)
                } else {
                    Ok(())
                }
            }
            Scope::Variant => {
                if frame.count >= 1 {
                    Err(Error::TooManyItems(frame.scope))
                } else {
                    Ok(())
                }
            }
        }
    }

    fn on_item_written(&mut self) {
        let frame = self.current_frame();
        frame.count += 1;
    }

    fn write_tag(&mut self, tag: Tag) -> Result<()> {
        self.check_write(tag)?;
        self.buf.push(tag as u8);
        Ok(())
    }

    fn write_u32_raw(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn begin_scope(&mut self, tag: Tag, scope: Scope) -> Result<()> {
        self.check_write(tag)?;

        self.buf.push(tag as u8);
        self.buf.extend_from_slice(&[0, 0, 0, 0]); // Length placeholder

        self.stack.push(Frame {
            start: self.buf.len(), // Body starts after Length
            scope,
            count: 0,
        });
        Ok(())
    }

    fn end_scope(&mut self, expected: Scope) -> Result<()> {
        if self.stack.len() <= 1 {
            return Err(Error::ScopeUnderflow);
        }

        { // Validate Scope State
            let frame = self.current_frame();
            if frame.scope != expected {
                return Err(Error::ScopeMismatch { expected, actual: frame.scope });
            }

            match frame.scope {
                Scope::Variant => {
                    if frame.count == 0 {
                        return Err(Error::EmptyVariant);
                    }
                }
                Scope::Map => {
                    if frame.count % 2 != 0 {
                        return Err(Error::OddMapEntry);
                    }
                }
                _ => {}
            }
        }

        // Pop and Patch
        let frame = self.stack.pop().unwrap();
        let body_len = self.buf.len() - frame.start;

        if body_len > u32::MAX as usize {
            return Err(Error::BlobTooLarge(body_len));
        }

        let len_bytes = (body_len as u32).to_le_bytes();
        let len_pos = frame.start - 4;
        self.buf[len_pos..frame.start].copy_from_slice(&len_bytes);

        self.on_item_written();

        Ok(())
    }

    /// Encodes a boolean value.
    pub fn bool(&mut self, v: bool) -> Result<()> {
        self.write_tag(if v { Tag::BoolTrue } else { Tag::BoolFalse })?;
        self.on_item_written();
        Ok(())
    }

    /// Encodes a single byte.
    pub fn byte(&mut self, v: u8) -> Result<()> { self.write_tag(Tag::Byte)?; self.buf.push(v); self.on_item_written(); Ok(()) }

    /// Encodes a signed 32-bit integer (LE).
    pub fn s32(&mut self, v: i32) -> Result<()> { self.write_tag(Tag::S32)?; self.buf.extend_from_slice(&v.to_le_bytes()); self.on_item_written(); Ok(()) }
    /// Encodes a signed 64-bit integer (LE).
    pub fn s64(&mut self, v: i64) -> Result<()> { self.write_tag(Tag::S64)?; self.buf.extend_from_slice(&v.to_le_bytes()); self.on_item_written(); Ok(()) }

    /// Encodes a 32-bit float (LE).
    pub fn f32(&mut self, v: f32) -> Result<()> { self.write_tag(Tag::F32)?; self.buf.extend_from_slice(&v.to_le_bytes()); self.on_item_written(); Ok(()) }
    /// Encodes a 64-bit float (LE).
    pub fn f64(&mut self, v: f64) -> Result<()> { self.write_tag(Tag::F64)?; self.buf.extend_from_slice(&v.to_le_bytes()); self.on_item_written(); Ok(()) }

    /// Encodes a timestamp as signed millis since the Unix epoch (LE).
    pub fn timestamp(&mut self, millis: i64) -> Result<()> {
        self.write_tag(Tag::Timestamp)?;
        self.buf.extend_from_slice(&millis.to_le_bytes());
        self.on_item_written();
        Ok(())
    }

    /// Encodes a uuid as 16 raw bytes.
    pub fn uuid(&mut self, v: [u8; 16]) -> Result<()> {
        self.write_tag(Tag::Uuid)?;
        self.buf.extend_from_slice(&v);
        self.on_item_written();
        Ok(())
    }

    /// Encodes Unit (the void result).
    pub fn unit(&mut self) -> Result<()> { self.write_tag(Tag::Unit)?; self.on_item_written(); Ok(()) }

    /// Encodes the explicit absence marker.
    pub fn null(&mut self) -> Result<()> { self.write_tag(Tag::Null)?; self.on_item_written(); Ok(()) }

    /// Encodes a UTF-8 string blob.
    pub fn str(&mut self, v: &str) -> Result<()> {
        let len = v.len();
        if len > u32::MAX as usize { return Err(Error::BlobTooLarge(len)); }
        self.write_tag(Tag::String)?;
        self.write_u32_raw(len as u32);
        self.buf.extend_from_slice(v.as_bytes());
        self.on_item_written();
        Ok(())
    }

    /// Encodes a raw byte blob.
    pub fn bytes(&mut self, v: &[u8]) -> Result<()> {
        let len = v.len();
        if len > u32::MAX as usize { return Err(Error::BlobTooLarge(len)); }
        self.write_tag(Tag::Bytes)?;
        self.write_u32_raw(len as u32);
        self.buf.extend_from_slice(v);
        self.on_item_written();
        Ok(())
    }

    /// Encodes raw inet address bytes (4 for v4, 16 for v6).
    ///
    /// The pack layer does not interpret the bytes; length validation beyond
    /// the one-byte header is the codec's concern.
    pub fn inet(&mut self, addr: &[u8]) -> Result<()> {
        if addr.len() > u8::MAX as usize { return Err(Error::InetTooLong(addr.len())); }
        self.write_tag(Tag::Inet)?;
        self.buf.push(addr.len() as u8);
        self.buf.extend_from_slice(addr);
        self.on_item_written();
        Ok(())
    }

    /// Begins a List container.
    ///
    /// # Invariants
    /// - Must be closed via `list_end()`.
    /// - Allows any number of items.
    pub fn list_begin(&mut self) -> Result<()> { self.begin_scope(Tag::List, Scope::List) }
    /// Ends a List container.
    pub fn list_end(&mut self) -> Result<()> { self.end_scope(Scope::List) }

    /// Begins a Set container. Structurally a List; the distinct tag
    /// preserves the declared kind across the wire.
    pub fn set_begin(&mut self) -> Result<()> { self.begin_scope(Tag::Set, Scope::Set) }
    /// Ends a Set container.
    pub fn set_end(&mut self) -> Result<()> { self.end_scope(Scope::Set) }

    /// Begins a Map container.
    ///
    /// # Invariants
    /// - Must be closed via `map_end()`.
    /// - Items alternate key, value, key, value; the count must be even
    ///   when the scope closes.
    pub fn map_begin(&mut self) -> Result<()> { self.begin_scope(Tag::Map, Scope::Map) }
    /// Ends a Map container.
    pub fn map_end(&mut self) -> Result<()> { self.end_scope(Scope::Map) }

    /// Begins a Record container.
    ///
    /// # Invariants
    /// - Must be closed via `record_end()`.
    /// - **Strict:** Only `variant_begin()` (named field) is allowed as a
    ///   direct child.
    pub fn record_begin(&mut self) -> Result<()> { self.begin_scope(Tag::Record, Scope::Record) }
    /// Ends a Record container.
    pub fn record_end(&mut self) -> Result<()> { self.end_scope(Scope::Record) }

    /// Begins a Variant (Named Payload).
    ///
    /// Encodes the name string immediately.
    ///
    /// # Invariants
    /// - Must be closed via `variant_end()`.
    /// - **Strict:** Requires exactly one item (the payload) to be written
    ///   after this call.
    pub fn variant_begin(&mut self, name: &str) -> Result<()> {
        self.begin_scope(Tag::Variant, Scope::Variant)?;
        // Write Name (metadata, not payload)
        self.str(name)?;
        // Reset count; user must write exactly one payload item next.
        self.current_frame().count = 0;
        Ok(())
    }
    /// Ends a Variant.
    pub fn variant_end(&mut self) -> Result<()> { self.end_scope(Scope::Variant) }
}

/// A zero-copy, bounds-checked cursor over a byte slice.
///
/// Decoders are immutable views. Reading advances the internal cursor.
/// Container reads return new `Decoder` instances restricted to the
/// container's body.
///
/// # Errors
/// All read operations return `Error::UnexpectedEnd` if the buffer is
/// exhausted.
#[derive(Debug, Clone)]
pub struct Decoder<'a> {
    buf: &'a [u8],
}

impl<'a> Decoder<'a> {
    /// Creates a decoder over the slice.
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    /// Returns the remaining bytes in the view.
    pub fn remaining(&self) -> usize {
        self.buf.len()
    }

    /// Returns the raw unread bytes of the view.
    ///
    /// Useful for comparing encoded segments (e.g. map key uniqueness)
    /// without decoding them.
    pub fn as_bytes(&self) -> &'a [u8] {
        self.buf
    }

    /// Peeks the next Tag without advancing.
    pub fn peek_tag(&self) -> Result<Tag> {
        if self.buf.is_empty() { return Err(Error::UnexpectedEnd); }
        Tag::from_u8(self.buf[0]).ok_or(Error::InvalidTag(self.buf[0]))
    }

    fn consume(&mut self, n: usize) -> Result<()> {
        if n > self.buf.len() { return Err(Error::UnexpectedEnd); }
        self.buf = &self.buf[n..];
        Ok(())
    }

    fn read_u8(&mut self) -> Result<u8> {
        if self.buf.is_empty() { return Err(Error::UnexpectedEnd); }
        let b = self.buf[0];
        self.buf = &self.buf[1..];
        Ok(b)
    }

    fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        if n > self.buf.len() { return Err(Error::UnexpectedEnd); }
        let (head, tail) = self.buf.split_at(n);
        self.buf = tail;
        Ok(head)
    }

    fn read_slice(&mut self, n: usize) -> Result<Decoder<'a>> {
        let bytes = self.read_bytes(n)?;
        Ok(Decoder::new(bytes))
    }

    fn read_len(&mut self) -> Result<usize> {
        let len_bytes = self.read_bytes(4)?;
        Ok(u32::from_le_bytes(len_bytes.try_into().unwrap()) as usize)
    }

    fn check_tag(&mut self, expected: Tag) -> Result<()> {
        let tag = self.peek_tag()?;
        if tag == expected {
            self.consume(1)?;
            Ok(())
        } else {
            Err(Error::InvalidTag(tag as u8))
        }
    }

    /// Skips the next item and its nested children.
    pub fn skip(&mut self) -> Result<()> {
        let tag = self.peek_tag()?;
        self.consume(1)?; // Consume Tag

        match tag {
            Tag::Pad => {}
            Tag::BoolTrue | Tag::BoolFalse | Tag::Unit | Tag::Null => {}

            // Fixed scalars
            Tag::Byte => { self.consume(1)?; }
            Tag::S32 | Tag::F32 => { self.consume(4)?; }
            Tag::S64 | Tag::F64 | Tag::Timestamp => { self.consume(8)?; }
            Tag::Uuid => { self.consume(16)?; }

            // One-byte length header
            Tag::Inet => {
                let len = self.read_u8()? as usize;
                self.consume(len)?;
            }

            // Variable length (Blob or Scoped)
            // Structure: [Length: u32] [Body: Length]
            Tag::String | Tag::Bytes |
            Tag::List | Tag::Set | Tag::Map | Tag::Record | Tag::Variant => {
                let len = self.read_len()?;
                self.consume(len)?;
            }
        }
        Ok(())
    }

    /// Returns true if the next item is the absence marker.
    pub fn peek_null(&self) -> bool {
        matches!(self.peek_tag(), Ok(Tag::Null))
    }

    /// Decodes a bool.
    pub fn bool(&mut self) -> Result<bool> {
        let tag = self.peek_tag()?;
        match tag {
            Tag::BoolTrue => { self.consume(1)?; Ok(true) }
            Tag::BoolFalse => { self.consume(1)?; Ok(false) }
            _ => Err(Error::InvalidTag(tag as u8)),
        }
    }

    /// Decodes a byte.
    pub fn byte(&mut self) -> Result<u8> { self.check_tag(Tag::Byte)?; self.read_u8() }

    /// Decodes s32 (LE).
    pub fn s32(&mut self) -> Result<i32> { self.check_tag(Tag::S32)?; Ok(i32::from_le_bytes(self.read_bytes(4)?.try_into().unwrap())) }
    /// Decodes s64 (LE).
    pub fn s64(&mut self) -> Result<i64> { self.check_tag(Tag::S64)?; Ok(i64::from_le_bytes(self.read_bytes(8)?.try_into().unwrap())) }

    /// Decodes f32 (LE).
    pub fn f32(&mut self) -> Result<f32> { self.check_tag(Tag::F32)?; Ok(f32::from_le_bytes(self.read_bytes(4)?.try_into().unwrap())) }
    /// Decodes f64 (LE).
    pub fn f64(&mut self) -> Result<f64> { self.check_tag(Tag::F64)?; Ok(f64::from_le_bytes(self.read_bytes(8)?.try_into().unwrap())) }

    /// Decodes a timestamp (signed millis since epoch, LE).
    pub fn timestamp(&mut self) -> Result<i64> {
        self.check_tag(Tag::Timestamp)?;
        Ok(i64::from_le_bytes(self.read_bytes(8)?.try_into().unwrap()))
    }

    /// Decodes a uuid as 16 raw bytes.
    pub fn uuid(&mut self) -> Result<[u8; 16]> {
        self.check_tag(Tag::Uuid)?;
        Ok(self.read_bytes(16)?.try_into().unwrap())
    }

    /// Decodes Unit (the void result).
    pub fn unit(&mut self) -> Result<()> { self.check_tag(Tag::Unit) }

    /// Decodes the absence marker.
    pub fn null(&mut self) -> Result<()> { self.check_tag(Tag::Null) }

    /// Decodes a string slice (UTF-8).
    pub fn str(&mut self) -> Result<&'a str> {
        self.check_tag(Tag::String)?;
        let len = self.read_len()?;
        let bytes = self.read_bytes(len)?;
        std::str::from_utf8(bytes).map_err(|_| Error::InvalidUtf8)
    }

    /// Decodes a byte slice.
    pub fn bytes(&mut self) -> Result<&'a [u8]> {
        self.check_tag(Tag::Bytes)?;
        let len = self.read_len()?;
        self.read_bytes(len)
    }

    /// Decodes raw inet address bytes.
    pub fn inet(&mut self) -> Result<&'a [u8]> {
        self.check_tag(Tag::Inet)?;
        let len = self.read_u8()? as usize;
        self.read_bytes(len)
    }

    fn enter_container(&mut self, expected: Tag) -> Result<Decoder<'a>> {
        self.check_tag(expected)?;
        let len = self.read_len()?;
        self.read_slice(len)
    }

    /// Decodes a List into an iterator.
    pub fn list(&mut self) -> Result<ListIter<'a>> {
        Ok(ListIter { dec: self.enter_container(Tag::List)? })
    }

    /// Decodes a Set into an iterator over its items.
    pub fn set(&mut self) -> Result<ListIter<'a>> {
        Ok(ListIter { dec: self.enter_container(Tag::Set)? })
    }

    /// Decodes a Map into an iterator over key/value pairs.
    pub fn map(&mut self) -> Result<MapIter<'a>> {
        Ok(MapIter { dec: self.enter_container(Tag::Map)? })
    }

    /// Decodes a Record into an iterator over named fields.
    pub fn record(&mut self) -> Result<RecordIter<'a>> {
        Ok(RecordIter { dec: self.enter_container(Tag::Record)? })
    }

    /// Decodes a Variant.
    ///
    /// Returns `(Name, PayloadDecoder)`.
    pub fn variant(&mut self) -> Result<(&'a str, Decoder<'a>)> {
        let mut inner = self.enter_container(Tag::Variant)?;
        let name = inner.str()?;
        Ok((name, inner))
    }
}

/// Iterator for items within a List or Set.
#[derive(Debug)]
pub struct ListIter<'a> {
    dec: Decoder<'a>,
}

impl<'a> ListIter<'a> {
    /// Returns a Decoder for the next item, or `None`.
    pub fn next(&mut self) -> Option<Decoder<'a>> {
        if self.dec.remaining() == 0 {
            return None;
        }
        let mut probe = self.dec.clone();
        if probe.skip().is_err() {
            return None;
        }
        let len = self.dec.remaining() - probe.remaining();
        self.dec.read_slice(len).ok()
    }
}

/// Iterator for key/value pairs within a Map.
#[derive(Debug)]
pub struct MapIter<'a> {
    dec: Decoder<'a>,
}

impl<'a> MapIter<'a> {
    /// Returns `(KeyDecoder, ValueDecoder)` for the next pair, or `None`.
    ///
    /// A key without a following value is `Error::OddMapEntry`.
    pub fn next(&mut self) -> Result<Option<(Decoder<'a>, Decoder<'a>)>> {
        if self.dec.remaining() == 0 {
            return Ok(None);
        }
        let key = self.next_item()?;
        if self.dec.remaining() == 0 {
            return Err(Error::OddMapEntry);
        }
        let value = self.next_item()?;
        Ok(Some((key, value)))
    }

    fn next_item(&mut self) -> Result<Decoder<'a>> {
        let mut probe = self.dec.clone();
        probe.skip()?;
        let len = self.dec.remaining() - probe.remaining();
        self.dec.read_slice(len)
    }
}

/// Iterator for named fields (Variants) within a Record.
#[derive(Debug)]
pub struct RecordIter<'a> {
    dec: Decoder<'a>,
}

impl<'a> RecordIter<'a> {
    /// Returns `(Name, ValueDecoder)` for the next field, or `None`.
    pub fn next(&mut self) -> Result<Option<(&'a str, Decoder<'a>)>> {
        if self.dec.remaining() == 0 {
            return Ok(None);
        }
        if self.dec.peek_tag()? != Tag::Variant {
            return Err(Error::InvalidTag(self.dec.peek_tag()? as u8));
        }
        let (name, val) = self.dec.variant()?;
        Ok(Some((name, val)))
    }
}

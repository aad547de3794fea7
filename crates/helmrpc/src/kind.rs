//! # Wire kinds and the compound-kind cache
//!
//! The closed set of value shapes the bridge exchanges, and the registry of
//! compound shapes (`list<T>`, `set<T>`, `map<K,V>`) constructed on demand.
//!
//! ## Philosophy
//!
//! - **Registration-Time Safety**: every native type a method declares is
//!   resolved here before the method is published. Broken registrations fail
//!   before any traffic is served.
//! - **Shape Cache**: compound kinds are cached by structural signature, so
//!   the hot path of a call is an O(1) lookup and repeated resolutions of the
//!   same shape share one instance.

use std::sync::Arc;

use dashmap::DashMap;

use crate::error::KindError;

/// One element of the closed set of value shapes exchangeable across the
/// invocation protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireKind {
    /// The absence of a result. Not a value kind; only legal as a result shape.
    Void,
    Bool,
    Byte,
    Int32,
    Int64,
    Float32,
    Float64,
    Text,
    Inet,
    /// Milliseconds since the Unix epoch.
    Timestamp,
    Blob,
    Uuid,
    List(Arc<WireKind>),
    Set(Arc<WireKind>),
    Map(Arc<WireKind>, Arc<WireKind>),
}

impl WireKind {
    /// The normalized structural signature, e.g. `"list<string>"` or
    /// `"map<uuid,int64>"`. Used as the cache key for compound kinds.
    pub fn signature(&self) -> String {
        match self {
            WireKind::Void => "void".into(),
            WireKind::Bool => "bool".into(),
            WireKind::Byte => "byte".into(),
            WireKind::Int32 => "int32".into(),
            WireKind::Int64 => "int64".into(),
            WireKind::Float32 => "float32".into(),
            WireKind::Float64 => "float64".into(),
            WireKind::Text => "string".into(),
            WireKind::Inet => "inet".into(),
            WireKind::Timestamp => "timestamp".into(),
            WireKind::Blob => "blob".into(),
            WireKind::Uuid => "uuid".into(),
            WireKind::List(e) => format!("list<{}>", e.signature()),
            WireKind::Set(e) => format!("set<{}>", e.signature()),
            WireKind::Map(k, v) => format!("map<{},{}>", k.signature(), v.signature()),
        }
    }
}

impl std::fmt::Display for WireKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.signature())
    }
}

/// A native type descriptor, as written in a declarative operation table.
///
/// Mirrors `WireKind` shape for shape, plus `Opaque` for native types that
/// have no wire mapping. Resolving an `Opaque` (at any nesting depth) fails
/// and names it, which is how a broken registration is rejected up front.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NativeType {
    Void,
    Bool,
    Byte,
    Int32,
    Int64,
    Float32,
    Float64,
    Text,
    Inet,
    Timestamp,
    Blob,
    Uuid,
    List(Box<NativeType>),
    Set(Box<NativeType>),
    Map(Box<NativeType>, Box<NativeType>),
    /// A native type with no wire representation.
    Opaque(String),
}

impl NativeType {
    /// The structural signature of this descriptor; `Opaque` contributes its
    /// native name.
    pub fn signature(&self) -> String {
        match self {
            NativeType::Void => "void".into(),
            NativeType::Bool => "bool".into(),
            NativeType::Byte => "byte".into(),
            NativeType::Int32 => "int32".into(),
            NativeType::Int64 => "int64".into(),
            NativeType::Float32 => "float32".into(),
            NativeType::Float64 => "float64".into(),
            NativeType::Text => "string".into(),
            NativeType::Inet => "inet".into(),
            NativeType::Timestamp => "timestamp".into(),
            NativeType::Blob => "blob".into(),
            NativeType::Uuid => "uuid".into(),
            NativeType::List(e) => format!("list<{}>", e.signature()),
            NativeType::Set(e) => format!("set<{}>", e.signature()),
            NativeType::Map(k, v) => format!("map<{},{}>", k.signature(), v.signature()),
            NativeType::Opaque(name) => name.clone(),
        }
    }
}

/// The append-only registry of compound wire kinds.
///
/// Scalar kinds resolve through a static mapping; compound kinds are built
/// recursively and published with insert-if-absent semantics, so concurrent
/// resolvers of the same shape converge on one shared instance and readers
/// never observe a partial entry.
#[derive(Debug, Default)]
pub struct KindCache {
    compound: DashMap<String, WireKind>,
}

impl KindCache {
    pub fn new() -> Self {
        Self { compound: DashMap::new() }
    }

    /// The number of distinct compound shapes registered so far.
    pub fn compound_count(&self) -> usize {
        self.compound.len()
    }

    /// Resolves a native type descriptor to its wire kind.
    ///
    /// # Errors
    /// `KindError::Unresolvable` naming the offending nested type if the
    /// descriptor (or anything inside it) has no wire mapping.
    pub fn resolve(&self, ty: &NativeType) -> Result<WireKind, KindError> {
        match ty {
            NativeType::Void => Ok(WireKind::Void),
            NativeType::Bool => Ok(WireKind::Bool),
            NativeType::Byte => Ok(WireKind::Byte),
            NativeType::Int32 => Ok(WireKind::Int32),
            NativeType::Int64 => Ok(WireKind::Int64),
            NativeType::Float32 => Ok(WireKind::Float32),
            NativeType::Float64 => Ok(WireKind::Float64),
            NativeType::Text => Ok(WireKind::Text),
            NativeType::Inet => Ok(WireKind::Inet),
            NativeType::Timestamp => Ok(WireKind::Timestamp),
            NativeType::Blob => Ok(WireKind::Blob),
            NativeType::Uuid => Ok(WireKind::Uuid),
            NativeType::List(_) | NativeType::Set(_) | NativeType::Map(..) => {
                self.resolve_compound(ty)
            }
            NativeType::Opaque(name) => Err(KindError::Unresolvable {
                requested: ty.signature(),
                offending: name.clone(),
            }),
        }
    }

    fn resolve_compound(&self, ty: &NativeType) -> Result<WireKind, KindError> {
        let sig = ty.signature();
        if let Some(cached) = self.compound.get(&sig) {
            return Ok(cached.clone());
        }

        let rewrap = |e: KindError| match e {
            KindError::Unresolvable { offending, .. } => KindError::Unresolvable {
                requested: sig.clone(),
                offending,
            },
        };

        let kind = match ty {
            NativeType::List(e) => {
                WireKind::List(Arc::new(self.resolve(e).map_err(rewrap)?))
            }
            NativeType::Set(e) => {
                WireKind::Set(Arc::new(self.resolve(e).map_err(rewrap)?))
            }
            NativeType::Map(k, v) => WireKind::Map(
                Arc::new(self.resolve(k).map_err(&rewrap)?),
                Arc::new(self.resolve(v).map_err(&rewrap)?),
            ),
            _ => unreachable!("resolve_compound called on a scalar"),
        };

        // Insert-if-absent: a concurrent resolver may have won the race; the
        // first published instance is the one everybody shares.
        Ok(self.compound.entry(sig).or_insert(kind).clone())
    }
}

//! # Object Registry
//!
//! The declarative table of management objects and their methods.
//!
//! ## Philosophy
//!
//! - **Registration-Time Safety**: every parameter and result type is
//!   resolved to a wire kind while the descriptor is being built. A spec that
//!   cannot be fully resolved is rejected whole; no partially-usable object
//!   is ever published.
//! - **Immutable Descriptors**: once published, a descriptor never changes.
//!   Signatures are fixed for the process lifetime.
//!
//! ## Invariants
//! - Duplicate object names fail without touching the existing entry.
//! - Concurrent readers never observe a partially-built object.

use std::collections::BTreeSet;
use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use helmrpc::KindCache;
use helmrpc::KindError;
use helmrpc::NativeType;
use helmrpc::WireKind;
use helmrpc::WireValue;

/// The default permission every registered resource carries.
pub const DEFAULT_PERMISSION: &str = "authorize";

#[derive(Debug, Clone)]
pub enum Error {
    /// An object with this name is already registered.
    DuplicateObject(String),
    /// Two methods on the same object share a name.
    DuplicateMethod { object: String, method: String },
    /// A parameter or result type has no wire mapping.
    Kind { object: String, method: String, source: KindError },
    /// A job-mode method must return a single string (the job id).
    JobResultShape { object: String, method: String },
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::DuplicateObject(name) => {
                write!(f, "object '{}' is already registered", name)
            }
            Error::DuplicateMethod { object, method } => {
                write!(f, "method '{}' declared twice on object '{}'", method, object)
            }
            Error::Kind { object, method, source } => {
                write!(f, "cannot register {}.{}: {}", object, method, source)
            }
            Error::JobResultShape { object, method } => {
                write!(f, "job method {}.{} must declare a single string result", object, method)
            }
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;

/// How a method's native function runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecMode {
    /// Runs on the dispatching task; the reply carries the actual result.
    Inline,
    /// Submitted to the job subsystem under this operation tag; the reply
    /// carries the job id.
    Job(String),
}

/// The declared shape of a method result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultShape {
    /// No result; the reply is an explicit zero-row success.
    Void,
    /// One unnamed value, replied as a single row with one `result` field.
    Single(NativeType),
    /// Named columns, replied as rows.
    Rows(Vec<(String, NativeType)>),
}

/// One declared parameter.
#[derive(Debug, Clone)]
pub struct ParamSpec {
    pub name: String,
    pub ty: NativeType,
    /// Marks the caller-identity slot. Never wire-decoded; the dispatcher
    /// fills it from the transport.
    pub caller_identity: bool,
}

impl ParamSpec {
    pub fn new(name: impl Into<String>, ty: NativeType) -> Self {
        Self { name: name.into(), ty, caller_identity: false }
    }

    pub fn caller_identity(name: impl Into<String>) -> Self {
        Self { name: name.into(), ty: NativeType::Text, caller_identity: true }
    }
}

/// What a native operation hands back to the dispatcher.
#[derive(Debug, Clone)]
pub enum NativeOutput {
    Void,
    Single(WireValue),
    Rows(Vec<Vec<(String, WireValue)>>),
}

/// A native operation failure, split along the wire error taxonomy.
#[derive(Debug, Clone)]
pub enum InvokeError {
    /// The caller identity failed an authorization check.
    Unauthorized(String),
    /// Anything else the operation could not do.
    Failed(String),
}

impl std::fmt::Display for InvokeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvokeError::Unauthorized(msg) => write!(f, "unauthorized: {}", msg),
            InvokeError::Failed(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for InvokeError {}

/// The decoded arguments handed to a native operation, caller slot filled.
#[derive(Debug, Clone)]
pub struct CallContext {
    /// One value per declared parameter, in declaration order.
    pub args: Vec<WireValue>,
}

impl CallContext {
    /// The argument at a declared position.
    pub fn arg(&self, index: usize) -> &WireValue {
        &self.args[index]
    }
}

/// The native function behind a method.
pub type NativeFn =
    Arc<dyn Fn(CallContext) -> std::result::Result<NativeOutput, InvokeError> + Send + Sync>;

/// The declarative description of one method, before resolution.
pub struct MethodSpec {
    pub name: String,
    pub params: Vec<ParamSpec>,
    pub result: ResultShape,
    pub mode: ExecMode,
    /// Extra permission strings this method contributes to its resource.
    pub permissions: Vec<String>,
    pub native: NativeFn,
}

impl MethodSpec {
    pub fn new(
        name: impl Into<String>,
        params: Vec<ParamSpec>,
        result: ResultShape,
        native: NativeFn,
    ) -> Self {
        Self {
            name: name.into(),
            params,
            result,
            mode: ExecMode::Inline,
            permissions: Vec::new(),
            native,
        }
    }

    pub fn with_mode(mut self, mode: ExecMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_permissions(mut self, perms: Vec<String>) -> Self {
        self.permissions = perms;
        self
    }
}

/// The declarative description of one object.
pub struct ObjectSpec {
    pub name: String,
    pub methods: Vec<MethodSpec>,
    /// Extra permission strings the object contributes to its resource.
    pub permissions: Vec<String>,
}

impl ObjectSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), methods: Vec::new(), permissions: Vec::new() }
    }

    pub fn method(mut self, spec: MethodSpec) -> Self {
        self.methods.push(spec);
        self
    }

    pub fn with_permissions(mut self, perms: Vec<String>) -> Self {
        self.permissions = perms;
        self
    }
}

/// A fully-resolved parameter.
#[derive(Debug, Clone)]
pub struct ParameterDescriptor {
    pub name: String,
    pub kind: WireKind,
    pub caller_identity: bool,
}

/// The resolved result shape, kinds included.
#[derive(Debug, Clone)]
pub enum ResolvedResult {
    Void,
    Single(WireKind),
    Rows(Vec<(String, WireKind)>),
}

/// A fully-resolved, immutable method.
pub struct MethodDescriptor {
    pub object: String,
    pub name: String,
    pub params: Vec<ParameterDescriptor>,
    pub result: ResolvedResult,
    pub mode: ExecMode,
    pub permissions: Vec<String>,
    pub native: NativeFn,
}

impl MethodDescriptor {
    /// The number of wire-carried arguments (caller slots excluded).
    pub fn wire_arity(&self) -> usize {
        self.params.iter().filter(|p| !p.caller_identity).count()
    }
}

/// A fully-resolved, immutable object.
pub struct ObjectDescriptor {
    pub name: String,
    pub methods: HashMap<String, Arc<MethodDescriptor>>,
    pub permissions: Vec<String>,
}

/// The concurrent object table plus the shared kind cache.
#[derive(Default)]
pub struct Registry {
    objects: DashMap<String, Arc<ObjectDescriptor>>,
    kinds: Arc<KindCache>,
}

impl Registry {
    pub fn new() -> Self {
        Self { objects: DashMap::new(), kinds: Arc::new(KindCache::new()) }
    }

    /// The shared compound-kind cache.
    pub fn kinds(&self) -> &Arc<KindCache> {
        &self.kinds
    }

    /// Builds and publishes an object.
    ///
    /// The whole descriptor is resolved before publication, so a failure
    /// (unresolvable kind, duplicate method, bad job result shape) leaves
    /// the table untouched. Publication is insert-if-absent: a duplicate
    /// name fails and the first registration stays resolvable.
    pub fn register_object(&self, spec: ObjectSpec) -> Result<()> {
        let descriptor = self.build_object(spec)?;

        match self.objects.entry(descriptor.name.clone()) {
            Entry::Occupied(_) => Err(Error::DuplicateObject(descriptor.name)),
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(descriptor));
                Ok(())
            }
        }
    }

    /// Removes an object. Returns whether it was present. A later
    /// registration under the same name succeeds.
    pub fn unregister_object(&self, name: &str) -> bool {
        self.objects.remove(name).is_some()
    }

    pub fn contains_object(&self, name: &str) -> bool {
        self.objects.contains_key(name)
    }

    pub fn contains_method(&self, object: &str, method: &str) -> bool {
        self.objects
            .get(object)
            .map(|o| o.methods.contains_key(method))
            .unwrap_or(false)
    }

    /// Looks up a method for dispatch.
    pub fn resolve_method(&self, object: &str, method: &str) -> Option<Arc<MethodDescriptor>> {
        self.objects.get(object)?.methods.get(method).cloned()
    }

    /// Every permission string any registered resource can carry.
    pub fn all_permissions(&self) -> BTreeSet<String> {
        let mut set = BTreeSet::new();
        set.insert(DEFAULT_PERMISSION.to_string());
        for obj in self.objects.iter() {
            set.extend(obj.permissions.iter().cloned());
            for method in obj.methods.values() {
                set.extend(method.permissions.iter().cloned());
            }
        }
        set
    }

    /// Permissions applicable to one object resource.
    pub fn object_permissions(&self, name: &str) -> BTreeSet<String> {
        let mut set = BTreeSet::new();
        set.insert(DEFAULT_PERMISSION.to_string());
        if let Some(obj) = self.objects.get(name) {
            set.extend(obj.permissions.iter().cloned());
        }
        set
    }

    /// Permissions applicable to one method resource.
    pub fn method_permissions(&self, object: &str, method: &str) -> BTreeSet<String> {
        let mut set = BTreeSet::new();
        set.insert(DEFAULT_PERMISSION.to_string());
        if let Some(obj) = self.objects.get(object) {
            if let Some(m) = obj.methods.get(method) {
                set.extend(m.permissions.iter().cloned());
            }
        }
        set
    }

    fn build_object(&self, spec: ObjectSpec) -> Result<ObjectDescriptor> {
        let object_name = spec.name;
        let mut methods = HashMap::with_capacity(spec.methods.len());

        for method in spec.methods {
            let descriptor = self.build_method(&object_name, method)?;
            if methods.contains_key(&descriptor.name) {
                return Err(Error::DuplicateMethod {
                    object: object_name,
                    method: descriptor.name,
                });
            }
            methods.insert(descriptor.name.clone(), Arc::new(descriptor));
        }

        Ok(ObjectDescriptor { name: object_name, methods, permissions: spec.permissions })
    }

    fn build_method(&self, object: &str, spec: MethodSpec) -> Result<MethodDescriptor> {
        let kind_err = |method: &str, source: KindError| Error::Kind {
            object: object.to_string(),
            method: method.to_string(),
            source,
        };

        let mut params = Vec::with_capacity(spec.params.len());
        for p in &spec.params {
            let kind =
                self.kinds.resolve(&p.ty).map_err(|e| kind_err(&spec.name, e))?;
            params.push(ParameterDescriptor {
                name: p.name.clone(),
                kind,
                caller_identity: p.caller_identity,
            });
        }

        let result = match &spec.result {
            ResultShape::Void => ResolvedResult::Void,
            ResultShape::Single(ty) => {
                ResolvedResult::Single(self.kinds.resolve(ty).map_err(|e| kind_err(&spec.name, e))?)
            }
            ResultShape::Rows(fields) => {
                let mut resolved = Vec::with_capacity(fields.len());
                for (name, ty) in fields {
                    let kind = self.kinds.resolve(ty).map_err(|e| kind_err(&spec.name, e))?;
                    resolved.push((name.clone(), kind));
                }
                ResolvedResult::Rows(resolved)
            }
        };

        // A job-mode reply is the job id, so the declared result must be a
        // single string.
        if let ExecMode::Job(_) = spec.mode {
            if !matches!(result, ResolvedResult::Single(WireKind::Text)) {
                return Err(Error::JobResultShape {
                    object: object.to_string(),
                    method: spec.name,
                });
            }
        }

        Ok(MethodDescriptor {
            object: object.to_string(),
            name: spec.name,
            params,
            result,
            mode: spec.mode,
            permissions: spec.permissions,
            native: spec.native,
        })
    }
}

//! # Resource Model
//!
//! The hierarchical naming of everything the bridge exposes, for permission
//! checks and audit trails.
//!
//! A resource is a pure computed view over the registry: root covers the
//! whole bridge, an object resource covers one registered object, a method
//! resource covers one method. Nothing here does I/O or holds mutable state.

use std::collections::BTreeSet;

use crate::registry::Registry;

/// The root resource name; every other name nests under it.
pub const ROOT_NAME: &str = "rpc";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The root resource has no parent.
    RootHasNoParent,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::RootHasNoParent => write!(f, "the root resource has no parent"),
        }
    }
}

impl std::error::Error for Error {}

/// One node of the resource hierarchy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resource {
    Root,
    Object(String),
    Method { object: String, method: String },
}

impl Resource {
    pub fn object(name: impl Into<String>) -> Self {
        Resource::Object(name.into())
    }

    pub fn method(object: impl Into<String>, method: impl Into<String>) -> Self {
        Resource::Method { object: object.into(), method: method.into() }
    }

    /// The hierarchical name: `"rpc"`, `"rpc/Obj"`, `"rpc/Obj/Method"`.
    pub fn name(&self) -> String {
        match self {
            Resource::Root => ROOT_NAME.to_string(),
            Resource::Object(obj) => format!("{}/{}", ROOT_NAME, obj),
            Resource::Method { object, method } => {
                format!("{}/{}/{}", ROOT_NAME, object, method)
            }
        }
    }

    /// The enclosing resource. The root has none.
    pub fn parent(&self) -> Result<Resource, Error> {
        match self {
            Resource::Root => Err(Error::RootHasNoParent),
            Resource::Object(_) => Ok(Resource::Root),
            Resource::Method { object, .. } => Ok(Resource::Object(object.clone())),
        }
    }

    /// Whether this resource currently exists. Root always exists; the rest
    /// follow the registry's live contents.
    pub fn exists(&self, registry: &Registry) -> bool {
        match self {
            Resource::Root => true,
            Resource::Object(obj) => registry.contains_object(obj),
            Resource::Method { object, method } => registry.contains_method(object, method),
        }
    }

    /// The permission strings applicable at this node: the fixed default
    /// plus whatever the registry contributes for it.
    pub fn applicable_permissions(&self, registry: &Registry) -> BTreeSet<String> {
        match self {
            Resource::Root => registry.all_permissions(),
            Resource::Object(obj) => registry.object_permissions(obj),
            Resource::Method { object, method } => {
                registry.method_permissions(object, method)
            }
        }
    }
}

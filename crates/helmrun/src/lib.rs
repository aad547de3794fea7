//! # Helmrun
//!
//! The runtime half of the helm control bridge: the object/method registry,
//! the resource and permission model, the async job subsystem, the Unix
//! domain socket transport, and the dispatcher that ties them together.
//!
//! ## Architecture
//!
//! Bytes arrive on the socket, the frame layer turns them into a call, the
//! registry resolves the method, the dispatcher decodes arguments against the
//! method's declared kinds and runs the native operation (inline, or through
//! the job tracker for slow work), and the reply travels back the same way.
//! The registry table and the kind cache are the only cross-thread mutable
//! structures, and both are insert-if-absent concurrent maps.

pub mod client;
pub mod dispatch;
pub mod ipc;
pub mod jobs;
pub mod pipe;
pub mod registry;
pub mod resource;
pub mod transport;

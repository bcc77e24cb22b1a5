//! Path-confined object storage for nanocloud.
//!
//! Objects are plain files beneath a single storage root and are addressed
//! by an untrusted, path-like key. Every operation funnels the key through
//! [`path::resolve`] before any syscall is issued, so no key can name a file
//! outside the root.
//!
//! # Storage Backends
//!
//! All backends implement the [`ObjectStore`] trait:
//!
//! - [`LocalObjectStore`] -- files on the local filesystem
//!
//! # Design Rules
//!
//! 1. Resolution is pure: it never touches the filesystem and never fails
//!    with an I/O error.
//! 2. The filesystem is the only source of truth. There is no index.
//! 3. The store holds no locks. Concurrent writers to one key race and the
//!    last writer wins.
//! 4. The store never logs. Failures are returned as [`StoreError`] and the
//!    caller decides how to report them.

pub mod error;
pub mod local;
pub mod object;
pub mod path;
pub mod traits;

// Re-export primary types at crate root for ergonomic imports.
pub use error::{StoreError, StoreResult};
pub use local::LocalObjectStore;
pub use object::{ObjectInfo, ObjectMetadata, ObjectReader, StreamHandle};
pub use path::{normalize, relative_key, resolve};
pub use traits::ObjectStore;

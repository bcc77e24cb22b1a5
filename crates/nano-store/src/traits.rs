use std::io::Read;

use crate::error::{StoreError, StoreResult};
use crate::object::{ObjectMetadata, StreamHandle};

/// Key-addressed object store.
///
/// All implementations must satisfy these invariants:
/// - Every keyed operation resolves its key before any I/O and fails with
///   [`StoreError::InvalidPath`] when the key does not stay inside the store.
/// - Operations that need an existing object fail with
///   [`StoreError::NotFound`] when it is missing, never with `Io`.
/// - No partial results: a failed [`Self::list`] returns nothing.
/// - The store keeps no cross-call state beyond its configuration, so calls
///   may run in parallel from any number of threads.
pub trait ObjectStore: Send + Sync {
    /// Write the whole of `content` under `key` and return the byte count.
    ///
    /// Creates missing parent directories and silently replaces an existing
    /// object. Directories created before a failed write are left behind.
    fn save(&self, key: &str, content: &mut dyn Read) -> StoreResult<u64>;

    /// Read an object fully into memory.
    fn read(&self, key: &str) -> StoreResult<Vec<u8>>;

    /// Open an object for random-access reads without reading it.
    fn open(&self, key: &str) -> StoreResult<StreamHandle>;

    /// Remove an object. Parent directories are kept.
    fn delete(&self, key: &str) -> StoreResult<()>;

    /// Enumerate every object in the store.
    fn list(&self) -> StoreResult<Vec<ObjectMetadata>>;

    /// Check whether an object exists under `key`.
    ///
    /// Default implementation opens and immediately releases the object.
    fn exists(&self, key: &str) -> StoreResult<bool> {
        match self.open(key) {
            Ok(_) => Ok(true),
            Err(StoreError::NotFound { .. }) => Ok(false),
            Err(err) => Err(err),
        }
    }
}

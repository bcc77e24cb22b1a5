use std::fmt;
use std::io::{self, Read, Seek, SeekFrom};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ObjectMetadata
// ---------------------------------------------------------------------------

/// One entry of a store listing.
///
/// Produced only by [`crate::ObjectStore::list`] and recomputed on every
/// call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMetadata {
    /// Object key relative to the storage root, `/`-separated.
    pub path: String,
    /// Base name of the file.
    pub name: String,
    /// Size in bytes.
    pub size: u64,
}

// ---------------------------------------------------------------------------
// ObjectInfo
// ---------------------------------------------------------------------------

/// Metadata delivered alongside a [`StreamHandle`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectInfo {
    /// Base name of the file.
    pub name: String,
    /// Last modification time.
    pub modified: SystemTime,
    /// Size in bytes.
    pub size: u64,
}

// ---------------------------------------------------------------------------
// StreamHandle
// ---------------------------------------------------------------------------

/// Seekable byte source behind a [`StreamHandle`].
pub trait ObjectReader: Read + Seek + Send {}

impl<T: Read + Seek + Send> ObjectReader for T {}

/// An open object: a seekable reader plus its metadata.
///
/// Nothing is read until the caller reads. The underlying descriptor is
/// released when the handle is dropped.
pub struct StreamHandle {
    reader: Box<dyn ObjectReader>,
    info: ObjectInfo,
}

impl StreamHandle {
    pub fn new(reader: impl ObjectReader + 'static, info: ObjectInfo) -> Self {
        Self {
            reader: Box::new(reader),
            info,
        }
    }

    pub fn info(&self) -> &ObjectInfo {
        &self.info
    }

    pub fn into_parts(self) -> (Box<dyn ObjectReader>, ObjectInfo) {
        (self.reader, self.info)
    }
}

impl Read for StreamHandle {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf)
    }
}

impl Seek for StreamHandle {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.reader.seek(pos)
    }
}

impl fmt::Debug for StreamHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamHandle")
            .field("info", &self.info)
            .finish_non_exhaustive()
    }
}

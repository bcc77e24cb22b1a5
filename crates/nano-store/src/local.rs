use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{StoreError, StoreResult};
use crate::object::{ObjectInfo, ObjectMetadata, StreamHandle};
use crate::path::{self, is_contained};
use crate::traits::ObjectStore;

/// Object store backed by a directory on the local filesystem.
///
/// The root is created if missing and canonicalized once at construction.
/// Beyond the lexical checks of [`path::resolve`], every keyed operation
/// confines symlinks: the deepest existing entry on the way to the target
/// must canonicalize to a location inside the root.
#[derive(Clone, Debug)]
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    /// Open (creating if necessary) a store rooted at `root`.
    pub fn new(root: impl AsRef<Path>) -> StoreResult<Self> {
        let root = root.as_ref();
        create_dirs(root).map_err(StoreError::io("create root"))?;
        let root = fs::canonicalize(root).map_err(StoreError::io("canonicalize root"))?;
        Ok(Self { root })
    }

    /// The canonical storage root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// A store rooted at the `bucket` sub-directory of this one.
    ///
    /// An empty or `.` bucket yields a store with the same root.
    pub fn with_bucket(&self, bucket: &str) -> StoreResult<Self> {
        if path::normalize(bucket) == "." {
            return Ok(self.clone());
        }
        let root = self.locate(bucket)?;
        Self::new(root)
    }

    /// Resolve `key` and confine symlinks along the way.
    fn locate(&self, key: &str) -> StoreResult<PathBuf> {
        let target = path::resolve(&self.root, key)?;
        self.confine(key, &target)?;
        Ok(target)
    }

    fn confine(&self, key: &str, target: &Path) -> StoreResult<()> {
        for ancestor in target.ancestors().take_while(|a| a.starts_with(&self.root)) {
            // Anything lstat cannot see cannot be traversed by the real call either.
            if fs::symlink_metadata(ancestor).is_err() {
                continue;
            }

            return match fs::canonicalize(ancestor) {
                Ok(real) if is_contained(&self.root, &real) => Ok(()),
                Ok(_) => Err(StoreError::invalid(key, "symlink escapes storage root")),
                Err(err) if err.kind() == io::ErrorKind::NotFound => {
                    Err(StoreError::invalid(key, "dangling symlink"))
                }
                Err(err) => Err(StoreError::io("canonicalize path")(err)),
            };
        }
        Ok(())
    }

    /// Classify a failed lookup. A directory under the key is not an object.
    fn missing_or_io(key: &str, op: &'static str, target: &Path, err: io::Error) -> StoreError {
        if target.is_dir() {
            return StoreError::NotFound {
                key: key.to_string(),
            };
        }
        StoreError::lookup(key, op, err)
    }
}

impl ObjectStore for LocalObjectStore {
    fn save(&self, key: &str, content: &mut dyn Read) -> StoreResult<u64> {
        let target = self.locate(key)?;

        if let Some(parent) = target.parent() {
            create_dirs(parent).map_err(StoreError::io("create dirs"))?;
        }

        let mut file = File::create(&target).map_err(StoreError::io("create file"))?;
        io::copy(content, &mut file).map_err(StoreError::io("write file"))
    }

    fn read(&self, key: &str) -> StoreResult<Vec<u8>> {
        let target = self.locate(key)?;
        fs::read(&target).map_err(|err| Self::missing_or_io(key, "read file", &target, err))
    }

    fn open(&self, key: &str) -> StoreResult<StreamHandle> {
        let target = self.locate(key)?;

        let file = File::open(&target)
            .map_err(|err| Self::missing_or_io(key, "open file", &target, err))?;
        let stat = file.metadata().map_err(StoreError::io("stat file"))?;
        if stat.is_dir() {
            return Err(StoreError::NotFound {
                key: key.to_string(),
            });
        }

        let name = target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let modified = stat.modified().map_err(StoreError::io("stat file"))?;

        Ok(StreamHandle::new(
            file,
            ObjectInfo {
                name,
                modified,
                size: stat.len(),
            },
        ))
    }

    fn delete(&self, key: &str) -> StoreResult<()> {
        let target = self.locate(key)?;
        fs::remove_file(&target)
            .map_err(|err| Self::missing_or_io(key, "delete file", &target, err))
    }

    fn list(&self) -> StoreResult<Vec<ObjectMetadata>> {
        self.collect_objects(WalkDir::new(&self.root).sort_by_file_name())
    }
}

impl LocalObjectStore {
    /// Every object `walk` reaches. The first walk error aborts the listing.
    ///
    /// Only entries whose key can be handed back to the keyed operations are
    /// reported: names that are not UTF-8 and symlinks that escape the root,
    /// dangle or lead to a directory are skipped.
    fn collect_objects(&self, walk: WalkDir) -> StoreResult<Vec<ObjectMetadata>> {
        let mut objects = Vec::new();

        for entry in walk {
            let entry = entry.map_err(|err| StoreError::io("walk")(err.into()))?;
            if entry.file_type().is_dir() {
                continue;
            }
            let Some(path) = path::relative_key(&self.root, entry.path()) else {
                continue;
            };

            let size = if entry.path_is_symlink() {
                match self.linked_size(entry.path())? {
                    Some(size) => size,
                    None => continue,
                }
            } else {
                let stat = entry.metadata().map_err(|err| StoreError::io("walk")(err.into()))?;
                stat.len()
            };

            objects.push(ObjectMetadata {
                path,
                name: entry.file_name().to_string_lossy().into_owned(),
                size,
            });
        }

        Ok(objects)
    }

    /// Size of the regular file behind `link` when it stays inside the root.
    fn linked_size(&self, link: &Path) -> StoreResult<Option<u64>> {
        let Ok(real) = fs::canonicalize(link) else {
            return Ok(None);
        };
        if !is_contained(&self.root, &real) {
            return Ok(None);
        }
        let stat = fs::metadata(&real).map_err(StoreError::io("walk"))?;
        Ok(stat.is_file().then(|| stat.len()))
    }
}

/// Recursive directory creation with `rwxr-xr-x` permissions.
fn create_dirs(dir: &Path) -> io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        fs::DirBuilder::new().recursive(true).mode(0o755).create(dir)
    }
    #[cfg(not(unix))]
    {
        fs::create_dir_all(dir)
    }
}

use std::io;

/// Errors from object store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The key does not resolve to a location inside the storage root.
    #[error("invalid filepath {key:?}: {reason}")]
    InvalidPath { key: String, reason: &'static str },

    /// No object exists under the key.
    #[error("object not found: {key}")]
    NotFound { key: String },

    /// Any other failure from the underlying filesystem.
    #[error("{op}: {source}")]
    Io {
        op: &'static str,
        #[source]
        source: io::Error,
    },
}

impl StoreError {
    pub(crate) fn invalid(key: &str, reason: &'static str) -> Self {
        Self::InvalidPath {
            key: key.to_string(),
            reason,
        }
    }

    /// Adapter for `map_err` that tags an I/O error with the failing step.
    pub(crate) fn io(op: &'static str) -> impl FnOnce(io::Error) -> Self {
        move |source| Self::Io { op, source }
    }

    /// Like [`Self::io`], but maps a missing file to [`Self::NotFound`].
    pub(crate) fn lookup(key: &str, op: &'static str, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::NotFound {
            Self::NotFound {
                key: key.to_string(),
            }
        } else {
            Self::Io { op, source }
        }
    }

    /// Returns `true` for [`Self::InvalidPath`].
    pub fn is_invalid_path(&self) -> bool {
        matches!(self, Self::InvalidPath { .. })
    }

    /// Returns `true` for [`Self::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_classifies_missing_files() {
        let err = StoreError::lookup("a.txt", "read file", io::ErrorKind::NotFound.into());
        assert!(err.is_not_found());

        let err = StoreError::lookup(
            "a.txt",
            "read file",
            io::ErrorKind::PermissionDenied.into(),
        );
        assert!(matches!(err, StoreError::Io { op: "read file", .. }));
    }

    #[test]
    fn display_names_the_operation() {
        let err = StoreError::io("delete file")(io::Error::other("disk on fire"));
        assert_eq!(err.to_string(), "delete file: disk on fire");
    }

    #[test]
    fn invalid_path_quotes_the_key() {
        let err = StoreError::invalid("../etc", "escapes storage root");
        assert!(err.is_invalid_path());
        assert_eq!(
            err.to_string(),
            "invalid filepath \"../etc\": escapes storage root"
        );
    }
}

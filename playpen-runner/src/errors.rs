//! Public error surface
//!
//! The read API exposes two error kinds to its callers: a key (or sub-key)
//! missing from the cache, and an internal inconsistency such as a cache
//! slot holding a value of the wrong type. Both carry a caller-supplied
//! title plus a detail string, so the serving layer can surface them
//! without further mapping.

use thiserror::Error;

/// Error returned by the public read API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("{title}: {detail}")]
    NotFound { title: String, detail: String },

    #[error("{title}: {detail}")]
    Internal { title: String, detail: String },
}

impl Error {
    pub fn not_found(title: impl Into<String>, detail: impl Into<String>) -> Self {
        Error::NotFound {
            title: title.into(),
            detail: detail.into(),
        }
    }

    pub fn internal(title: impl Into<String>, detail: impl Into<String>) -> Self {
        Error::Internal {
            title: title.into(),
            detail: detail.into(),
        }
    }
}

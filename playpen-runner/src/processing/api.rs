//! Public read API
//!
//! Other subsystems poll pipeline results through these functions. Cache
//! misses surface as [`Error::NotFound`]; a slot holding a value of an
//! unexpected shape surfaces as [`Error::Internal`]. Callers pass an
//! error title so the serving layer can return the error as-is.

use tracing::error;
use uuid::Uuid;

use playpen_core::domain::Status;

use crate::cache::{Cache, SubKey};
use crate::errors::Error;

/// Fetches a string-typed slot (run output, run error, compile output).
pub async fn get_processing_output(
    cache: &dyn Cache,
    key: Uuid,
    sub_key: SubKey,
    error_title: &str,
) -> Result<String, Error> {
    let value = cache.get_value(key, sub_key).await.map_err(|e| {
        error!("{}: get_processing_output: cache read failed: {}", key, e);
        Error::not_found(
            error_title,
            format!("no cached value for key {} under {:?}", key, sub_key),
        )
    })?;

    match value.as_text() {
        Some(text) => Ok(text.to_string()),
        None => {
            error!("{}: cached value under {:?} is not a string", key, sub_key);
            Err(Error::internal(
                error_title,
                format!("cached value under {:?} is not a string", sub_key),
            ))
        }
    }
}

/// Fetches the pipeline's current status.
pub async fn get_processing_status(
    cache: &dyn Cache,
    key: Uuid,
    error_title: &str,
) -> Result<Status, Error> {
    let value = cache.get_value(key, SubKey::Status).await.map_err(|e| {
        error!("{}: get_processing_status: cache read failed: {}", key, e);
        Error::not_found(
            error_title,
            format!("no cached status for key {}", key),
        )
    })?;

    match value.as_status() {
        Some(status) => Ok(status),
        None => {
            error!("{}: cached value under Status is not a status", key);
            Err(Error::internal(
                error_title,
                "cached value under Status is not a status".to_string(),
            ))
        }
    }
}

/// Fetches the last-written index of an incrementally-updated slot, used
/// by streaming output consumers to resume reading.
pub async fn get_last_index(
    cache: &dyn Cache,
    key: Uuid,
    sub_key: SubKey,
    error_title: &str,
) -> Result<usize, Error> {
    let value = cache.get_value(key, sub_key).await.map_err(|e| {
        error!("{}: get_last_index: cache read failed: {}", key, e);
        Error::not_found(
            error_title,
            format!("no cached value for key {} under {:?}", key, sub_key),
        )
    })?;

    match value.as_index() {
        Some(index) => Ok(index),
        None => {
            error!("{}: cached value under {:?} is not an index", key, sub_key);
            Err(Error::internal(
                error_title,
                format!("cached value under {:?} is not an index", sub_key),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{LocalCache, Value};

    #[tokio::test]
    async fn test_get_processing_output() {
        let cache = LocalCache::new();
        let key = Uuid::new_v4();

        cache
            .set_value(key, SubKey::RunOutput, Value::Text("hello".to_string()))
            .await
            .unwrap();

        let output = get_processing_output(&cache, key, SubKey::RunOutput, "Get run output")
            .await
            .unwrap();
        assert_eq!(output, "hello");
    }

    #[tokio::test]
    async fn test_get_processing_output_missing_is_not_found() {
        let cache = LocalCache::new();

        let err = get_processing_output(&cache, Uuid::new_v4(), SubKey::RunOutput, "Get run output")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_get_processing_output_type_mismatch_is_internal() {
        let cache = LocalCache::new();
        let key = Uuid::new_v4();

        cache
            .set_value(key, SubKey::RunOutput, Value::Flag(true))
            .await
            .unwrap();

        let err = get_processing_output(&cache, key, SubKey::RunOutput, "Get run output")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Internal { .. }));
    }

    #[tokio::test]
    async fn test_get_processing_status() {
        let cache = LocalCache::new();
        let key = Uuid::new_v4();

        cache
            .set_value(key, SubKey::Status, Value::Status(Status::Executing))
            .await
            .unwrap();

        let status = get_processing_status(&cache, key, "Get status").await.unwrap();
        assert_eq!(status, Status::Executing);
    }

    #[tokio::test]
    async fn test_get_processing_status_mismatch_is_internal() {
        let cache = LocalCache::new();
        let key = Uuid::new_v4();

        cache
            .set_value(key, SubKey::Status, Value::Text("EXECUTING".to_string()))
            .await
            .unwrap();

        let err = get_processing_status(&cache, key, "Get status").await.unwrap_err();
        assert!(matches!(err, Error::Internal { .. }));
    }

    #[tokio::test]
    async fn test_get_last_index() {
        let cache = LocalCache::new();
        let key = Uuid::new_v4();

        cache
            .set_value(key, SubKey::RunOutputIndex, Value::Index(7))
            .await
            .unwrap();

        let index = get_last_index(&cache, key, SubKey::RunOutputIndex, "Get last index")
            .await
            .unwrap();
        assert_eq!(index, 7);

        let err = get_last_index(&cache, Uuid::new_v4(), SubKey::RunOutputIndex, "Get last index")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }
}

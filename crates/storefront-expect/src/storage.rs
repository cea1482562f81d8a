//! Reading JSON state the storefront persists in browser storage.

use crate::driver::StorageReader;
use crate::poll::{poll_until, PollOptions};
use crate::result::ExpectResult;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;

/// Key holding the cart's item ids
pub const CART_CONTENTS: &str = "cart-contents";

/// Key holding the logged-in username
pub const SESSION_USERNAME: &str = "session-username";

/// What a storage key held at the moment it was read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageReading {
    /// No value under the key
    Missing,
    /// A value that is not JSON
    InvalidJson {
        /// Raw stored string
        raw: String,
    },
    /// Valid JSON that is not an array
    NotAnArray {
        /// Raw stored string
        raw: String,
    },
    /// A JSON array
    Array {
        /// Number of elements
        len: usize,
    },
}

impl StorageReading {
    /// Classify a raw stored value
    #[must_use]
    pub fn classify(raw: Option<&str>) -> Self {
        let Some(raw) = raw else {
            return Self::Missing;
        };
        match serde_json::from_str::<Value>(raw) {
            Ok(Value::Array(items)) => Self::Array { len: items.len() },
            Ok(_) => Self::NotAnArray {
                raw: raw.to_string(),
            },
            Err(_) => Self::InvalidJson {
                raw: raw.to_string(),
            },
        }
    }

    /// Array length, if the value was an array
    #[must_use]
    pub const fn array_len(&self) -> Option<usize> {
        match self {
            Self::Array { len } => Some(*len),
            _ => None,
        }
    }
}

impl fmt::Display for StorageReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing => f.write_str("missing"),
            Self::InvalidJson { raw } => write!(f, "invalid JSON {raw:?}"),
            Self::NotAnArray { raw } => write!(f, "not an array {raw:?}"),
            Self::Array { len } => write!(f, "array of {len}"),
        }
    }
}

/// Read and classify `key` once
pub async fn read_storage_reading<S>(reader: &S, key: &str) -> ExpectResult<StorageReading>
where
    S: StorageReader + ?Sized,
{
    let raw = reader.get_item(key).await?;
    Ok(StorageReading::classify(raw.as_deref()))
}

/// Wait for `key` to exist, then deserialize its value.
///
/// A stored value that is not JSON is handed to the deserializer as a JSON
/// string, so `String` targets accept plain values like a username. Fails
/// with [`crate::ExpectError::Timeout`] if the key never appears.
pub async fn read_storage_json<T, S>(reader: &S, key: &str, options: &PollOptions) -> ExpectResult<T>
where
    T: DeserializeOwned,
    S: StorageReader + ?Sized,
{
    let outcome = poll_until(move || reader.get_item(key), |_: &String| true, options).await;
    let raw = outcome.into_value(options.timeout)?;
    let value = serde_json::from_str(&raw).unwrap_or_else(|_| Value::String(raw));
    Ok(serde_json::from_value(value)?)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::driver::MemoryStorage;
    use crate::result::ExpectError;
    use std::time::Duration;

    mod classify {
        use super::*;

        #[test]
        fn test_missing() {
            assert_eq!(StorageReading::classify(None), StorageReading::Missing);
        }

        #[test]
        fn test_array() {
            assert_eq!(
                StorageReading::classify(Some("[4,0,1]")),
                StorageReading::Array { len: 3 }
            );
            assert_eq!(StorageReading::classify(Some("[]")).array_len(), Some(0));
        }

        #[test]
        fn test_invalid_json() {
            assert_eq!(
                StorageReading::classify(Some("{not json")),
                StorageReading::InvalidJson {
                    raw: "{not json".to_string()
                }
            );
        }

        #[test]
        fn test_not_an_array() {
            let reading = StorageReading::classify(Some("{\"items\":[1]}"));
            assert!(matches!(reading, StorageReading::NotAnArray { .. }));
            assert_eq!(reading.array_len(), None);
        }

        #[test]
        fn test_display() {
            assert_eq!(StorageReading::Array { len: 2 }.to_string(), "array of 2");
            assert_eq!(StorageReading::Missing.to_string(), "missing");
        }
    }

    mod read_json {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_reads_cart_ids() {
            let storage = MemoryStorage::new().with_item(CART_CONTENTS, "[4,0]");
            let ids: Vec<u32> = read_storage_json(&storage, CART_CONTENTS, &PollOptions::default())
                .await
                .unwrap();
            assert_eq!(ids, vec![4, 0]);
        }

        #[tokio::test(start_paused = true)]
        async fn test_plain_value_read_as_string() {
            let storage = MemoryStorage::new().with_item(SESSION_USERNAME, "standard_user");
            let user: String =
                read_storage_json(&storage, SESSION_USERNAME, &PollOptions::default())
                    .await
                    .unwrap();
            assert_eq!(user, "standard_user");
        }

        #[tokio::test(start_paused = true)]
        async fn test_waits_for_lagging_write() {
            let storage = MemoryStorage::new();
            storage.set_item_after(CART_CONTENTS, "[1]", Duration::from_millis(300));
            let ids: Vec<u32> = read_storage_json(&storage, CART_CONTENTS, &PollOptions::default())
                .await
                .unwrap();
            assert_eq!(ids, vec![1]);
            assert!(storage.reads() > 1);
        }

        #[tokio::test(start_paused = true)]
        async fn test_missing_key_times_out() {
            let storage = MemoryStorage::new();
            let options = PollOptions::new(Duration::from_millis(600));
            let err = read_storage_json::<Vec<u32>, _>(&storage, CART_CONTENTS, &options)
                .await
                .unwrap_err();
            assert!(matches!(err, ExpectError::Timeout { ms: 600 }));
        }

        #[tokio::test(start_paused = true)]
        async fn test_wrong_shape_is_json_error() {
            let storage = MemoryStorage::new().with_item(CART_CONTENTS, "{\"a\":1}");
            let err = read_storage_json::<Vec<u32>, _>(&storage, CART_CONTENTS, &PollOptions::default())
                .await
                .unwrap_err();
            assert!(matches!(err, ExpectError::Json(_)));
        }
    }
}

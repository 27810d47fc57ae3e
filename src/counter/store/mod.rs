//! Durable storage of the counter record.
//!
//! The record is a single item identified by a fixed partition key. Reads are
//! strongly consistent and increments are a single atomic update, so no
//! coordination between lambda execution environments is necessary.

#[cfg(feature = "store_aws_sdk")]
mod aws_sdk;
#[cfg(feature = "store_rusoto")]
mod rusoto;

#[cfg(feature = "store_aws_sdk")]
#[cfg_attr(docsrs, doc(cfg(feature = "store_aws_sdk")))]
pub use aws_sdk::AwsSdkStore;
#[cfg(feature = "store_rusoto")]
#[cfg_attr(docsrs, doc(cfg(feature = "store_rusoto")))]
pub use rusoto::RusotoStore;

/// Update expression used by every backend. `ADD` treats a missing
/// attribute as `0` and is applied atomically by the store.
#[cfg(feature = "_store")]
pub(crate) const INCREMENT_EXPRESSION: &str = "ADD #value :one";

/// Failure while talking to or executing against the counter store
#[derive(Debug, thiserror::Error)]
pub enum StoreFault {
    /// The store rejected the request because of request limits
    #[error("request to counter store was throttled: {0}")]
    Throttled(String),
    /// The lambda role is not allowed to access the table
    #[error("access to counter store denied: {0}")]
    AccessDenied(String),
    /// The request did not reach the store or no response was received
    #[error("unable to reach counter store: {0}")]
    Transport(String),
    /// The request did not complete before the invocation deadline
    #[error("counter store did not respond before the invocation deadline")]
    Timeout,
    /// The stored attribute is not an unsigned integer
    #[error("counter attribute `{attribute}` holds an invalid value: {value}")]
    InvalidItem {
        /// Name of the counter attribute
        attribute: String,
        /// Raw value found in the store
        value: String,
    },
    /// Any other error returned by the store
    #[error("counter store request failed: {0}")]
    Other(String),
}

/// Store holding the counter record.
///
/// Implementations must not keep a copy of the value between calls, every
/// call has to round-trip to the backing store.
#[async_trait::async_trait]
pub trait CounterStore: Send + Sync {
    /// Strongly consistent read of the counter. `None` if the record
    /// was never created.
    async fn get(&self) -> Result<Option<u64>, StoreFault>;

    /// Atomically increments the counter by one, creating the record
    /// with a base of `0` if it does not exist. Returns the new value.
    async fn increment(&self) -> Result<u64, StoreFault>;
}

#[async_trait::async_trait]
impl<S: CounterStore + ?Sized> CounterStore for Box<S> {
    async fn get(&self) -> Result<Option<u64>, StoreFault> {
        (**self).get().await
    }

    async fn increment(&self) -> Result<u64, StoreFault> {
        (**self).increment().await
    }
}

#[async_trait::async_trait]
impl<S: CounterStore + ?Sized> CounterStore for std::sync::Arc<S> {
    async fn get(&self) -> Result<Option<u64>, StoreFault> {
        (**self).get().await
    }

    async fn increment(&self) -> Result<u64, StoreFault> {
        (**self).increment().await
    }
}

/// Parses the numeric attribute of a stored item
#[cfg(feature = "_store")]
pub(crate) fn parse_counter(attribute: &str, raw: &str) -> Result<u64, StoreFault> {
    raw.parse().map_err(|_| StoreFault::InvalidItem {
        attribute: attribute.to_string(),
        value: raw.to_string(),
    })
}

/// Process local store.
///
/// Only meaningful for local test runs with [`crate::exec_test`] and unit
/// tests: the value lives as long as the execution environment and is not
/// shared between environments.
#[derive(Debug, Default)]
pub struct MemoryStore {
    value: tokio::sync::Mutex<Option<u64>>,
}

impl MemoryStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store which already holds a counter record
    pub fn with_value(value: u64) -> Self {
        Self {
            value: tokio::sync::Mutex::new(Some(value)),
        }
    }
}

#[async_trait::async_trait]
impl CounterStore for MemoryStore {
    async fn get(&self) -> Result<Option<u64>, StoreFault> {
        Ok(*self.value.lock().await)
    }

    async fn increment(&self) -> Result<u64, StoreFault> {
        let mut value = self.value.lock().await;
        let new = value
            .unwrap_or(0)
            .checked_add(1)
            .ok_or_else(|| StoreFault::Other(format!("counter exceeds {}", u64::MAX)))?;
        *value = Some(new);
        Ok(new)
    }
}

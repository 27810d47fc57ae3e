use super::store::{CounterStore, StoreFault};

/// Read and increment operations on the shared counter.
///
/// Holds no copy of the value. Every call is a single round-trip to the
/// store and faults are returned unmodified.
#[derive(Debug)]
pub struct Counter<S> {
    store: S,
}

impl<S: CounterStore> Counter<S> {
    /// Create a service on top of the given store
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Current value of the counter. A counter which was never
    /// incremented reads as `0`.
    pub async fn read_counter(&self) -> Result<u64, StoreFault> {
        Ok(self.store.get().await?.unwrap_or(0))
    }

    /// Increments the counter by one and returns the new value
    pub async fn increment_counter(&self) -> Result<u64, StoreFault> {
        self.store.increment().await
    }

    /// The underlying store
    pub fn store(&self) -> &S {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::Counter;
    use crate::counter::MemoryStore;

    #[tokio::test]
    async fn read_does_not_create_record() {
        let counter = Counter::new(MemoryStore::new());
        assert_eq!(counter.read_counter().await.unwrap(), 0);
        assert_eq!(counter.read_counter().await.unwrap(), 0);
        assert_eq!(counter.increment_counter().await.unwrap(), 1);
        assert_eq!(counter.read_counter().await.unwrap(), 1);
    }
}

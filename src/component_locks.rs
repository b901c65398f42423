//! per component locks serializing the search-then-mutate sequence of
//! concurrent webhook deliveries
use std::sync::Arc;

use hashbrown::HashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::cachet::ComponentId;

/// one async mutex per component, created on first use
///
/// the map only grows with the number of distinct components cachet knows
/// about, so entries are never evicted
#[derive(Debug, Default, Clone)]
pub struct ComponentLocks {
    locks: Arc<Mutex<HashMap<ComponentId, Arc<Mutex<()>>>>>,
}

impl ComponentLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// waits until no other request works on `component_id`, the lock is
    /// held until the guard is dropped
    pub async fn lock(&self, component_id: ComponentId) -> OwnedMutexGuard<()> {
        let lock = self
            .locks
            .lock()
            .await
            .entry(component_id)
            .or_default()
            .clone();

        lock.lock_owned().await
    }
}

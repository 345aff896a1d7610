//! Device service — keeps the persistent discovery cache and enriches
//! scan results with it.
//!
//! Machines advertise inconsistently: the name is sometimes missing from
//! an advertisement, and the equipment kind may only have been inferable
//! on an earlier scan. The cache papers over both.

use fitbridge_domain::device::{CachedDevice, DeviceDescriptor, EquipmentKind};
use fitbridge_domain::error::FitBridgeError;
use fitbridge_domain::time;

use crate::ports::DeviceCacheRepository;

/// Use-cases around the device discovery cache.
pub struct DeviceService<DR> {
    cache: DR,
}

impl<DR: DeviceCacheRepository + Send + Sync> DeviceService<DR> {
    /// Create a new service backed by the given cache repository.
    pub fn new(cache: DR) -> Self {
        Self { cache }
    }

    /// Record a scan result and return it enriched from the cache.
    ///
    /// A descriptor whose kind is still `Unknown` picks up the cached
    /// kind for its address. Every descriptor refreshes `last_seen`.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    #[tracing::instrument(skip(self, descriptors), fields(count = descriptors.len()))]
    pub async fn record_discovery(
        &self,
        descriptors: Vec<DeviceDescriptor>,
    ) -> Result<Vec<DeviceDescriptor>, FitBridgeError> {
        let now = time::now();
        let mut enriched = Vec::with_capacity(descriptors.len());

        for mut descriptor in descriptors {
            if descriptor.kind == EquipmentKind::Unknown {
                if let Some(cached) = self.cache.get_by_address(&descriptor.address).await? {
                    descriptor.kind = cached.kind;
                }
            }
            self.cache.upsert(descriptor.clone(), now).await?;
            enriched.push(descriptor);
        }

        Ok(enriched)
    }

    /// All devices ever seen, most recent first.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn known_devices(&self) -> Result<Vec<CachedDevice>, FitBridgeError> {
        self.cache.get_all().await
    }
}

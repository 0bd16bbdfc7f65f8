//! Turning catalog references into persisted items
//!
//! The store owns idempotency. Without coalescing every mutation attempt
//! issues its own find-or-create call, so two concurrent attempts for the
//! same reference reach the store twice.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::OnceCell;

use crate::error::MaterializationError;
use crate::item::{CatalogRef, ItemIdentity, ItemKey, PersistedId};
use crate::store::{bounded, WatchlistStore};

type Slot = Arc<OnceCell<PersistedId>>;

pub struct CatalogMaterializer {
    store: Arc<dyn WatchlistStore>,
    timeout: Option<Duration>,
    coalesce: bool,
    in_flight: Mutex<HashMap<CatalogRef, Slot>>,
}

impl CatalogMaterializer {
    pub fn new(store: Arc<dyn WatchlistStore>) -> Self {
        Self {
            store,
            timeout: None,
            coalesce: false,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Share one store call between concurrent materializations of the
    /// same reference.
    pub fn with_coalescing(mut self, coalesce: bool) -> Self {
        self.coalesce = coalesce;
        self
    }

    /// Persisted id for `item`. Persisted keys pass through untouched.
    pub async fn materialize(&self, item: &ItemIdentity) -> Result<PersistedId, MaterializationError> {
        match &item.key {
            ItemKey::Persisted(id) => Ok(*id),
            ItemKey::Catalog(catalog_ref) => {
                self.materialize_ref(catalog_ref, item.title.as_deref()).await
            }
        }
    }

    pub async fn materialize_ref(
        &self,
        catalog_ref: &CatalogRef,
        title: Option<&str>,
    ) -> Result<PersistedId, MaterializationError> {
        if !self.coalesce {
            return self.find_or_create(catalog_ref, title).await;
        }

        let slot = self.slot(catalog_ref);
        let result = slot
            .get_or_try_init(|| self.find_or_create(catalog_ref, title))
            .await
            .copied();
        self.release(catalog_ref, &slot);
        result
    }

    /// Number of references with a shared call currently outstanding.
    pub fn pending(&self) -> usize {
        self.in_flight.lock().map(|slots| slots.len()).unwrap_or(0)
    }

    fn slot(&self, catalog_ref: &CatalogRef) -> Slot {
        match self.in_flight.lock() {
            Ok(mut slots) => slots
                .entry(catalog_ref.clone())
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .clone(),
            // A poisoned table only loses sharing, not correctness.
            Err(_) => Arc::new(OnceCell::new()),
        }
    }

    fn release(&self, catalog_ref: &CatalogRef, slot: &Slot) {
        if let Ok(mut slots) = self.in_flight.lock() {
            if slots
                .get(catalog_ref)
                .is_some_and(|current| Arc::ptr_eq(current, slot))
            {
                slots.remove(catalog_ref);
            }
        }
    }

    async fn find_or_create(
        &self,
        catalog_ref: &CatalogRef,
        title: Option<&str>,
    ) -> Result<PersistedId, MaterializationError> {
        tracing::debug!(%catalog_ref, "materializing catalog item");
        let call = self.store.find_or_create_item(catalog_ref, title);
        match bounded(self.timeout, call).await {
            Some(Ok(item)) => {
                tracing::debug!(%catalog_ref, id = %item.id, "materialized");
                Ok(item.id)
            }
            Some(Err(source)) => {
                tracing::warn!(%catalog_ref, error = %source, "materialization failed");
                Err(MaterializationError::Store {
                    catalog_ref: catalog_ref.clone(),
                    source,
                })
            }
            None => {
                tracing::warn!(%catalog_ref, "materialization timed out");
                Err(MaterializationError::Timeout(catalog_ref.clone()))
            }
        }
    }
}

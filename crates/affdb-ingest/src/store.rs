//! Storage seam for the pipeline, plus an in-process implementation used by
//! tests and dry runs.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use affdb_core::{NormalizedProduct, StoredProductSummary};
use async_trait::async_trait;

use crate::error::StoreError;
use crate::fingerprint::Fingerprint;

/// What gets persisted for one product.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductRecord {
    pub product: NormalizedProduct,
    pub fingerprint: Fingerprint,
    pub quality_score: u32,
}

impl ProductRecord {
    #[must_use]
    pub fn summary(&self, id: i64) -> StoredProductSummary {
        StoredProductSummary {
            id,
            product_url: self.product.product_url.clone(),
            description: self.product.description.clone(),
            price: self.product.price,
            brand: self.product.brand.clone(),
            image_url: self.product.image_url.clone(),
            rating: self.product.rating,
        }
    }
}

#[async_trait]
pub trait ProductStore: Send + Sync {
    /// Best stored product with this fingerprint: highest quality score,
    /// then lowest price, then lowest id.
    async fn find_by_fingerprint(
        &self,
        fingerprint: &Fingerprint,
    ) -> Result<Option<StoredProductSummary>, StoreError>;

    /// Inserts or overwrites the row keyed by `product_url`; returns its id.
    /// Writing the same record twice leaves one row.
    async fn upsert_by_url(&self, record: &ProductRecord) -> Result<i64, StoreError>;

    /// Deleting a missing id is not an error.
    async fn delete_by_id(&self, id: i64) -> Result<(), StoreError>;
}

#[derive(Debug, Default)]
struct MemoryInner {
    rows: BTreeMap<i64, ProductRecord>,
    next_id: i64,
}

/// A [`ProductStore`] held in memory. Nothing outlives the process.
#[derive(Debug, Default)]
pub struct MemoryProductStore {
    inner: Mutex<MemoryInner>,
}

impl MemoryProductStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryInner>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".into()))
    }

    /// Number of stored rows.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the lock is poisoned.
    pub fn len(&self) -> Result<usize, StoreError> {
        Ok(self.lock()?.rows.len())
    }

    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the lock is poisoned.
    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }

    /// Snapshot of every stored row, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the lock is poisoned.
    pub fn records(&self) -> Result<Vec<(i64, ProductRecord)>, StoreError> {
        Ok(self
            .lock()?
            .rows
            .iter()
            .map(|(id, r)| (*id, r.clone()))
            .collect())
    }
}

#[async_trait]
impl ProductStore for MemoryProductStore {
    async fn find_by_fingerprint(
        &self,
        fingerprint: &Fingerprint,
    ) -> Result<Option<StoredProductSummary>, StoreError> {
        let inner = self.lock()?;
        let best = inner
            .rows
            .iter()
            .filter(|(_, r)| &r.fingerprint == fingerprint)
            .min_by(|(a_id, a), (b_id, b)| {
                b.quality_score
                    .cmp(&a.quality_score)
                    .then_with(|| match (a.product.price, b.product.price) {
                        (Some(x), Some(y)) => x.cmp(&y),
                        (Some(_), None) => std::cmp::Ordering::Less,
                        (None, Some(_)) => std::cmp::Ordering::Greater,
                        (None, None) => std::cmp::Ordering::Equal,
                    })
                    .then_with(|| a_id.cmp(b_id))
            })
            .map(|(id, r)| r.summary(*id));
        Ok(best)
    }

    async fn upsert_by_url(&self, record: &ProductRecord) -> Result<i64, StoreError> {
        let mut inner = self.lock()?;
        let existing = inner
            .rows
            .iter()
            .find(|(_, r)| r.product.product_url == record.product.product_url)
            .map(|(id, _)| *id);

        let id = if let Some(id) = existing {
            id
        } else {
            inner.next_id += 1;
            inner.next_id
        };
        inner.rows.insert(id, record.clone());
        Ok(id)
    }

    async fn delete_by_id(&self, id: i64) -> Result<(), StoreError> {
        self.lock()?.rows.remove(&id);
        Ok(())
    }
}

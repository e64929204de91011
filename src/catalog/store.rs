//! Holder of the fetched record set.
//!
//! The store owns the unfiltered list for the lifetime of the process and
//! publishes derived, read-only snapshots through a watch channel. Consumers
//! never mutate the list; every input change re-runs the pipeline and
//! replaces the published view.

use std::sync::Arc;

use tokio::sync::{watch, Mutex};

use crate::backend::{BackendError, RecordStore};
use crate::catalog::derive;
use crate::models::{FilterField, FilterSet, Norma, SortDirection, SortField, SortSpec};

/// User-facing message when the catalog cannot be loaded.
const LOAD_ERROR: &str = "Não foi possível carregar as normas";

/// A derived, read-only snapshot of the catalog.
#[derive(Debug, Clone, Default)]
pub struct CatalogView {
    /// Records that survive the current search/filter/sort inputs, in order.
    pub normas: Vec<Norma>,
    /// Whether a load is in flight.
    pub loading: bool,
    /// Generic message when the last load failed.
    pub error: Option<String>,
}

struct Inner {
    records: Vec<Norma>,
    search: String,
    filters: FilterSet,
    sort: SortSpec,
    loading: bool,
    error: Option<String>,
    load_generation: u64,
}

/// Owns the fetched record list and the transient query inputs.
pub struct CatalogStore {
    store: Arc<dyn RecordStore>,
    inner: Mutex<Inner>,
    tx: watch::Sender<CatalogView>,
}

impl CatalogStore {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        let (tx, _) = watch::channel(CatalogView::default());
        Self {
            store,
            inner: Mutex::new(Inner {
                records: Vec::new(),
                search: String::new(),
                filters: FilterSet::new(),
                sort: SortSpec::default(),
                loading: false,
                error: None,
                load_generation: 0,
            }),
            tx,
        }
    }

    /// Subscribe to derived snapshots.
    pub fn subscribe(&self) -> watch::Receiver<CatalogView> {
        self.tx.subscribe()
    }

    /// The current derived snapshot.
    pub fn current(&self) -> CatalogView {
        self.tx.borrow().clone()
    }

    /// Fetch the full record set from the record store.
    ///
    /// A load that resolves after a newer one started is discarded, so a
    /// slow response can never overwrite state produced from newer inputs.
    /// Failure becomes local state (message plus empty list), never a panic.
    pub async fn load(&self) {
        let generation = {
            let mut inner = self.inner.lock().await;
            inner.load_generation += 1;
            inner.loading = true;
            self.publish(&inner);
            inner.load_generation
        };

        let fetched = self.store.select(None, None).await;

        let mut inner = self.inner.lock().await;
        if inner.load_generation != generation {
            // A newer load is in flight; it wins.
            return;
        }
        inner.loading = false;
        match fetched {
            Ok(records) => {
                tracing::debug!(count = records.len(), "catalog loaded");
                inner.records = records;
                inner.error = None;
            }
            Err(err) => {
                tracing::error!(%err, "failed to load catalog");
                inner.records = Vec::new();
                inner.error = Some(LOAD_ERROR.to_string());
            }
        }
        self.publish(&inner);
    }

    /// Set the free-text search query and re-derive.
    pub async fn set_search(&self, query: impl Into<String>) {
        let mut inner = self.inner.lock().await;
        inner.search = query.into();
        self.publish(&inner);
    }

    /// Set or clear (empty value) one field filter and re-derive.
    pub async fn set_filter(&self, field: FilterField, value: impl Into<String>) {
        let mut inner = self.inner.lock().await;
        inner.filters.set(field, value);
        self.publish(&inner);
    }

    /// Set the sort selection and re-derive.
    pub async fn set_sort(&self, sort: SortSpec) {
        let mut inner = self.inner.lock().await;
        inner.sort = sort;
        self.publish(&inner);
    }

    fn publish(&self, inner: &Inner) {
        self.tx.send_replace(CatalogView {
            normas: derive(&inner.records, &inner.search, &inner.filters, inner.sort),
            loading: inner.loading,
            error: inner.error.clone(),
        });
    }
}

/// Fetch the most recently added records straight from the record store.
pub async fn recent(store: &dyn RecordStore, limit: u32) -> Result<Vec<Norma>, BackendError> {
    store
        .select(
            Some((SortField::CreatedAt, SortDirection::Desc)),
            Some(limit),
        )
        .await
}

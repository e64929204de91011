//! Administrative write operations over the record store.

use std::sync::Arc;

use thiserror::Error;

use crate::backend::{BackendError, RecordStore};
use crate::models::{Norma, NormaDraft, SortDirection, SortField, ValidationError};

/// Failure of an administrative operation.
#[derive(Debug, Error)]
pub enum AdminError {
    /// The draft failed validation; no write was attempted.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Create, edit and delete catalog records.
///
/// Every write validates its draft first; an invalid draft never reaches the
/// record store. `id` and `created_at` stay server-assigned throughout.
pub struct AdminService {
    store: Arc<dyn RecordStore>,
}

impl AdminService {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    pub async fn create(&self, draft: &NormaDraft) -> Result<Norma, AdminError> {
        let draft = draft.normalized();
        draft.validate()?;
        let norma = self.store.insert(&draft).await?;
        tracing::info!(id = %norma.id, nome = %norma.nome, "norma created");
        Ok(norma)
    }

    pub async fn update(&self, id: &str, draft: &NormaDraft) -> Result<Norma, AdminError> {
        let draft = draft.normalized();
        draft.validate()?;
        let norma = self.store.update(id, &draft).await?;
        tracing::info!(id = %norma.id, "norma updated");
        Ok(norma)
    }

    pub async fn delete(&self, id: &str) -> Result<(), AdminError> {
        self.store.delete(id).await?;
        tracing::info!(id, "norma deleted");
        Ok(())
    }

    /// Full record set, newest first, for the management table.
    pub async fn list_for_table(&self) -> Result<Vec<Norma>, AdminError> {
        Ok(self
            .store
            .select(Some((SortField::CreatedAt, SortDirection::Desc)), None)
            .await?)
    }
}

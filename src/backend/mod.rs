//! Contracts for the hosted backend collaborators.
//!
//! The record store, the authentication provider and the file hosting behind
//! `pdf_url` live in a managed backend and are not reimplemented here. This
//! module defines the operations the rest of the crate expects from them,
//! plus one HTTP implementation speaking the backend's wire protocol.
//! Every operation returns its error as a value; callers check it at the
//! call site and convert failures into local state instead of crashing.

mod http;

pub use http::HttpBackend;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{Norma, NormaDraft, Session, SortDirection, SortField, User};

/// Failure reported by the record store.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("backend request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("backend returned status {status}: {detail}")]
    Status { status: u16, detail: String },
    #[error("malformed backend response: {0}")]
    Malformed(String),
}

/// Failure reported by the authentication provider.
///
/// `InvalidCredentials` is an expected, recoverable case and is surfaced
/// inline; everything else gets a generic user-facing message.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("authentication request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("authentication failed: {0}")]
    Other(String),
}

/// The `normas` table of the hosted record store.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Fetch rows, optionally ordered and limited.
    async fn select(
        &self,
        order: Option<(SortField, SortDirection)>,
        limit: Option<u32>,
    ) -> Result<Vec<Norma>, BackendError>;

    /// Fetch a single row by id.
    async fn get(&self, id: &str) -> Result<Option<Norma>, BackendError>;

    /// Insert a row. The store assigns `id` and `created_at`.
    async fn insert(&self, draft: &NormaDraft) -> Result<Norma, BackendError>;

    /// Update the client-supplied fields of a row.
    async fn update(&self, id: &str, draft: &NormaDraft) -> Result<Norma, BackendError>;

    /// Delete a row.
    async fn delete(&self, id: &str) -> Result<(), BackendError>;
}

/// The hosted authentication provider.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Verify credentials and mint a session.
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<(User, Session), AuthError>;

    /// Re-derive the user projection from a session. Returns `None` when the
    /// provider no longer recognizes the session.
    async fn get_user(&self, session: &Session) -> Result<Option<User>, AuthError>;

    /// Revoke a session.
    async fn sign_out(&self, session: &Session) -> Result<(), AuthError>;
}

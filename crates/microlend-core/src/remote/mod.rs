//! Remote service boundary
//!
//! Stores talk to the backend through these traits. Every call is async and
//! may fail with a `RemoteError`; none is assumed idempotent here.
//!
//! - `RemoteService<E>` - per-entity document operations
//! - `AuthService` - session operations, separate from entity CRUD
//!
//! `DocumentRemote` and `LocalAuthService` implement them over local JSON
//! files so the stores can run without a hosted backend.

mod document;

pub use document::{Backend, DocumentRemote, LocalAccount, LocalAuthService};

use async_trait::async_trait;
use thiserror::Error;

use crate::models::Entity;
use crate::user::User;

/// A rejected backend call
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// The backend could not be reached
    #[error("Network error: {0}")]
    Network(String),

    /// The backend refused or failed the request
    #[error("Backend error: {0}")]
    Backend(String),

    /// Credentials were missing, wrong or the account is disabled
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The document changed or already exists
    #[error("Conflict: {0}")]
    Conflict(String),
}

impl RemoteError {
    /// Transient failures worth retrying
    pub fn is_retryable(&self) -> bool {
        matches!(self, RemoteError::Network(_))
    }
}

/// Result type for remote calls
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Document operations for one entity kind
#[async_trait]
pub trait RemoteService<E: Entity>: Send + Sync {
    /// Every document, in backend order
    async fn list(&self) -> RemoteResult<Vec<E>>;

    /// Documents whose parent id matches
    async fn list_by_parent(&self, parent_id: &str) -> RemoteResult<Vec<E>>;

    /// A single document; `Ok(None)` when it does not exist
    async fn get_by_id(&self, id: &str) -> RemoteResult<Option<E>>;

    /// Create a document and return only its assigned id
    async fn create(&self, draft: E::Draft) -> RemoteResult<String>;

    async fn update(&self, id: &str, update: E::Update) -> RemoteResult<()>;

    async fn delete(&self, id: &str) -> RemoteResult<()>;

    /// Free-text search
    async fn search(&self, query: &str) -> RemoteResult<Vec<E>>;
}

/// Session operations of the identity provider
#[async_trait]
pub trait AuthService: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> RemoteResult<User>;

    async fn sign_out(&self) -> RemoteResult<()>;

    /// User of the live remote session, if any
    async fn current_user(&self) -> RemoteResult<Option<User>>;
}

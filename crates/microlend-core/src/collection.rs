//! Entity collection store
//!
//! Caches one entity kind: an ordered list, a "current" entity and a loading
//! flag. Operations call the remote service and reconcile the local copy.
//!
//! ## Error policy
//!
//! - Reads (`fetch_all`, `fetch_by_parent`, `fetch_one`, `search`) log
//!   failures and leave the cache as it was. They never return an error.
//! - Mutations (`create`, `update`, `delete`) log failures and return them.
//!
//! ## Concurrency
//!
//! Calls are not serialized. Each one commits its own patches when its
//! remote call completes, so the last completion wins and every intermediate
//! state is visible to subscribers. `loading` reflects the most recent
//! entry/exit and is meant for busy indicators only.
//!
//! ## Ordering
//!
//! List replacements keep backend order. `create` always inserts at the
//! front so the newest entity created by this client is shown first.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::error::{StoreError, StoreResult};
use crate::models::{Client, Entity, Loan, Payment};
use crate::remote::RemoteService;
use crate::store::{Reducer, Store, Subscription};

/// How `update` reconciles the local copy with the remote call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UpdateStrategy {
    /// Merge after the remote call succeeds
    #[default]
    Confirmed,
    /// Merge before the remote call; keep the merge if it fails
    Optimistic,
    /// Merge before the remote call; restore the previous entry if it fails
    OptimisticRollback,
}

impl fmt::Display for UpdateStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpdateStrategy::Confirmed => f.write_str("confirmed"),
            UpdateStrategy::Optimistic => f.write_str("optimistic"),
            UpdateStrategy::OptimisticRollback => f.write_str("optimistic-rollback"),
        }
    }
}

impl FromStr for UpdateStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "confirmed" => Ok(UpdateStrategy::Confirmed),
            "optimistic" => Ok(UpdateStrategy::Optimistic),
            "optimistic-rollback" => Ok(UpdateStrategy::OptimisticRollback),
            other => Err(format!(
                "unknown update strategy '{}' (expected confirmed, optimistic or optimistic-rollback)",
                other
            )),
        }
    }
}

/// Cached state of one entity kind
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionState<E> {
    pub items: Vec<E>,
    pub current: Option<E>,
    pub loading: bool,
}

impl<E> Default for CollectionState<E> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            current: None,
            loading: false,
        }
    }
}

impl<E: Entity> CollectionState<E> {
    pub fn get(&self, id: &str) -> Option<&E> {
        self.items.iter().find(|e| e.id() == id)
    }
}

/// Every change a collection store can commit
#[derive(Debug, Clone)]
pub enum CollectionPatch<E: Entity> {
    SetLoading(bool),
    /// Replace the whole list
    ReplaceItems(Vec<E>),
    SetCurrent(Option<E>),
    /// Insert at the front and make current
    Created(E),
    /// Merge a partial update into the entry (and current) with this id
    Merge { id: String, update: E::Update },
    /// Put `previous` back where the entry still equals `expected`
    Restore { expected: E, previous: E },
    /// Drop the entry (and current) with this id
    Remove(String),
    Clear,
}

impl<E: Entity> Reducer for CollectionState<E> {
    type Patch = CollectionPatch<E>;

    fn apply(&mut self, patch: CollectionPatch<E>) {
        match patch {
            CollectionPatch::SetLoading(loading) => self.loading = loading,
            CollectionPatch::ReplaceItems(items) => self.items = items,
            CollectionPatch::SetCurrent(current) => self.current = current,
            CollectionPatch::Created(entity) => {
                self.items.insert(0, entity.clone());
                self.current = Some(entity);
            }
            CollectionPatch::Merge { id, update } => {
                for entity in self.items.iter_mut().filter(|e| e.id() == id) {
                    entity.apply_update(&update);
                }
                if let Some(current) = self.current.as_mut().filter(|e| e.id() == id) {
                    current.apply_update(&update);
                }
            }
            CollectionPatch::Restore { expected, previous } => {
                for entity in self.items.iter_mut().filter(|e| **e == expected) {
                    *entity = previous.clone();
                }
                if self.current.as_ref() == Some(&expected) {
                    self.current = Some(previous);
                }
            }
            CollectionPatch::Remove(id) => {
                self.items.retain(|e| e.id() != id);
                if self.current.as_ref().is_some_and(|e| e.id() == id) {
                    self.current = None;
                }
            }
            CollectionPatch::Clear => *self = Self::default(),
        }
    }
}

/// Cache for one entity kind, synchronized against a remote service
pub struct CollectionStore<E: Entity> {
    store: Store<CollectionState<E>>,
    remote: Arc<dyn RemoteService<E>>,
    strategy: UpdateStrategy,
}

pub type PaymentStore = CollectionStore<Payment>;
pub type LoanStore = CollectionStore<Loan>;
pub type ClientStore = CollectionStore<Client>;

impl<E: Entity> CollectionStore<E> {
    pub fn new(remote: Arc<dyn RemoteService<E>>) -> Self {
        Self::with_strategy(remote, UpdateStrategy::default())
    }

    pub fn with_strategy(remote: Arc<dyn RemoteService<E>>, strategy: UpdateStrategy) -> Self {
        Self {
            store: Store::new(CollectionState::default()),
            remote,
            strategy,
        }
    }

    pub fn strategy(&self) -> UpdateStrategy {
        self.strategy
    }

    // ==================== Synchronous access ====================

    pub fn snapshot(&self) -> CollectionState<E> {
        self.store.snapshot()
    }

    pub fn subscribe<F>(&self, listener: F) -> Subscription<CollectionState<E>>
    where
        F: Fn(&CollectionState<E>) + Send + Sync + 'static,
    {
        self.store.subscribe(listener)
    }

    pub fn items(&self) -> Vec<E> {
        self.store.with(|state| state.items.clone())
    }

    pub fn current(&self) -> Option<E> {
        self.store.with(|state| state.current.clone())
    }

    pub fn is_loading(&self) -> bool {
        self.store.with(|state| state.loading)
    }

    /// Cached entity with this id
    pub fn get(&self, id: &str) -> Option<E> {
        self.store.with(|state| state.get(id).cloned())
    }

    pub fn set_current(&self, entity: Option<E>) {
        self.store.patch(CollectionPatch::SetCurrent(entity));
    }

    /// Forget everything cached
    pub fn clear(&self) {
        self.store.patch(CollectionPatch::Clear);
    }

    // ==================== Reads ====================

    /// Replace the list with every remote document
    pub async fn fetch_all(&self) {
        self.store.patch(CollectionPatch::SetLoading(true));

        match self.remote.list().await {
            Ok(items) => {
                debug!(kind = E::KIND, count = items.len(), "Fetched collection");
                self.store.patch(CollectionPatch::ReplaceItems(items));
            }
            Err(e) => warn!(kind = E::KIND, error = %e, "Failed to fetch collection"),
        }

        self.store.patch(CollectionPatch::SetLoading(false));
    }

    /// Replace the list with the documents belonging to `parent_id`
    pub async fn fetch_by_parent(&self, parent_id: &str) {
        self.store.patch(CollectionPatch::SetLoading(true));

        match self.remote.list_by_parent(parent_id).await {
            Ok(items) => {
                debug!(kind = E::KIND, parent_id, count = items.len(), "Fetched by parent");
                self.store.patch(CollectionPatch::ReplaceItems(items));
            }
            Err(e) => warn!(kind = E::KIND, parent_id, error = %e, "Failed to fetch by parent"),
        }

        self.store.patch(CollectionPatch::SetLoading(false));
    }

    /// Load one document into `current` and return it
    ///
    /// A missing document clears `current`. A failed call leaves it alone and
    /// returns `None`.
    pub async fn fetch_one(&self, id: &str) -> Option<E> {
        self.store.patch(CollectionPatch::SetLoading(true));

        let fetched = match self.remote.get_by_id(id).await {
            Ok(entity) => {
                if entity.is_none() {
                    debug!(kind = E::KIND, id, "Document not found");
                }
                self.store.patch(CollectionPatch::SetCurrent(entity.clone()));
                entity
            }
            Err(e) => {
                warn!(kind = E::KIND, id, error = %e, "Failed to fetch document");
                None
            }
        };

        self.store.patch(CollectionPatch::SetLoading(false));
        fetched
    }

    /// Replace the list with search results
    pub async fn search(&self, query: &str) {
        self.store.patch(CollectionPatch::SetLoading(true));

        match self.remote.search(query).await {
            Ok(items) => {
                debug!(kind = E::KIND, query, count = items.len(), "Search complete");
                self.store.patch(CollectionPatch::ReplaceItems(items));
            }
            Err(e) => warn!(kind = E::KIND, query, error = %e, "Search failed"),
        }

        self.store.patch(CollectionPatch::SetLoading(false));
    }

    // ==================== Mutations ====================

    /// Create a document, read it back and put it first in the list
    ///
    /// The backend only returns the new id, so the entity is fetched again
    /// before it is cached. If that read fails or finds nothing the create is
    /// reported as [`StoreError::CreationIncomplete`].
    pub async fn create(&self, draft: E::Draft) -> StoreResult<E> {
        self.store.patch(CollectionPatch::SetLoading(true));
        let result = self.create_and_fetch(draft).await;
        self.store.patch(CollectionPatch::SetLoading(false));

        match result {
            Ok(entity) => {
                debug!(kind = E::KIND, id = entity.id(), "Created");
                Ok(entity)
            }
            Err(e) => {
                error!(kind = E::KIND, error = %e, "Create failed");
                Err(e)
            }
        }
    }

    async fn create_and_fetch(&self, draft: E::Draft) -> StoreResult<E> {
        let id = self.remote.create(draft).await?;

        let created = match self.remote.get_by_id(&id).await {
            Ok(Some(entity)) => entity,
            Ok(None) => {
                return Err(StoreError::CreationIncomplete {
                    kind: E::KIND,
                    id,
                    source: None,
                })
            }
            Err(source) => {
                return Err(StoreError::CreationIncomplete {
                    kind: E::KIND,
                    id,
                    source: Some(source),
                })
            }
        };

        self.store.patch(CollectionPatch::Created(created.clone()));
        Ok(created)
    }

    /// Update a document and merge the change into the cache
    ///
    /// The merged value is not confirmed by a re-fetch. See [`UpdateStrategy`]
    /// for when the merge happens and what a failure leaves behind.
    pub async fn update(&self, id: &str, update: E::Update) -> StoreResult<()> {
        self.store.patch(CollectionPatch::SetLoading(true));

        let result = match self.strategy {
            UpdateStrategy::Confirmed => {
                let result = self.remote.update(id, update.clone()).await;
                if result.is_ok() {
                    self.merge(id, update);
                }
                result
            }
            UpdateStrategy::Optimistic => {
                self.merge(id, update.clone());
                self.remote.update(id, update).await
            }
            UpdateStrategy::OptimisticRollback => {
                let previous = self.get(id);
                self.merge(id, update.clone());

                let result = self.remote.update(id, update.clone()).await;
                if let (Err(_), Some(previous)) = (&result, previous) {
                    let mut expected = previous.clone();
                    expected.apply_update(&update);
                    debug!(kind = E::KIND, id, "Rolling back optimistic update");
                    self.store.patch(CollectionPatch::Restore { expected, previous });
                }
                result
            }
        };

        self.store.patch(CollectionPatch::SetLoading(false));

        result.map_err(|e| {
            error!(kind = E::KIND, id, strategy = %self.strategy, error = %e, "Update failed");
            StoreError::from(e)
        })
    }

    fn merge(&self, id: &str, update: E::Update) {
        self.store.patch(CollectionPatch::Merge {
            id: id.to_string(),
            update,
        });
    }

    /// Delete a document, then drop it from the cache
    pub async fn delete(&self, id: &str) -> StoreResult<()> {
        self.store.patch(CollectionPatch::SetLoading(true));
        let result = self.remote.delete(id).await;

        if result.is_ok() {
            self.store.patch(CollectionPatch::Remove(id.to_string()));
        }
        self.store.patch(CollectionPatch::SetLoading(false));

        result.map_err(|e| {
            error!(kind = E::KIND, id, error = %e, "Delete failed");
            StoreError::from(e)
        })
    }
}

//! Auth store
//!
//! Holds the signed-in user and the session lifecycle flags. The subset
//! `{user, isAuthenticated, initialized}` is written to the persistence
//! adapter after every commit and read back once at startup.
//!
//! ## Startup
//!
//! `loading` starts `true` and stays so until the remote session check
//! settles (`check_session`, or an explicit `set_user`/`set_initialized`).
//! A rehydrated user is shown immediately but is not proof of a live
//! remote session; a failed check clears it.
//!
//! ## Sign-out
//!
//! - `sign_out` ends the remote session, then clears the local identity.
//!   On failure the user is kept and the error is returned.
//! - `logout` only clears the local identity. Use it when the remote
//!   session is already known to be gone.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::error::StoreResult;
use crate::remote::AuthService;
use crate::storage::{load_persisted, save_persisted, PersistenceAdapter};
use crate::store::{Reducer, Store, Subscription};
use crate::user::{Action, Resource, User};

/// Persistence key of the auth subset
pub const AUTH_STORAGE_KEY: &str = "auth-storage";

/// Format version of the persisted auth subset
pub const AUTH_STORAGE_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq)]
pub struct AuthState {
    pub user: Option<User>,
    /// Always `user.is_some()`
    pub is_authenticated: bool,
    pub loading: bool,
    pub initialized: bool,
}

impl Default for AuthState {
    fn default() -> Self {
        Self {
            user: None,
            is_authenticated: false,
            loading: true,
            initialized: false,
        }
    }
}

/// The part of `AuthState` that survives restarts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedAuth {
    pub user: Option<User>,
    pub is_authenticated: bool,
    pub initialized: bool,
}

impl From<&AuthState> for PersistedAuth {
    fn from(state: &AuthState) -> Self {
        Self {
            user: state.user.clone(),
            is_authenticated: state.is_authenticated,
            initialized: state.initialized,
        }
    }
}

#[derive(Debug, Clone)]
pub enum AuthPatch {
    /// Replace the identity and clear `loading`
    SetUser(Option<User>),
    SetLoading(bool),
    SetInitialized(bool),
    /// Restore the persisted subset; `loading` is untouched
    Rehydrate(PersistedAuth),
}

impl Reducer for AuthState {
    type Patch = AuthPatch;

    fn apply(&mut self, patch: AuthPatch) {
        match patch {
            AuthPatch::SetUser(user) => {
                self.is_authenticated = user.is_some();
                self.user = user;
                self.loading = false;
            }
            AuthPatch::SetLoading(loading) => self.loading = loading,
            AuthPatch::SetInitialized(initialized) => self.initialized = initialized,
            AuthPatch::Rehydrate(persisted) => {
                // Derived from the user, never trusted from disk
                self.is_authenticated = persisted.user.is_some();
                self.user = persisted.user;
                self.initialized = persisted.initialized;
            }
        }
    }
}

/// Cache of the current identity
pub struct AuthStore {
    store: Store<AuthState>,
    service: Arc<dyn AuthService>,
    persistence: Arc<dyn PersistenceAdapter>,
    persist_lock: Mutex<()>,
}

impl AuthStore {
    /// Create the store without reading persisted state
    pub fn new(service: Arc<dyn AuthService>, persistence: Arc<dyn PersistenceAdapter>) -> Self {
        Self {
            store: Store::new(AuthState::default()),
            service,
            persistence,
            persist_lock: Mutex::new(()),
        }
    }

    /// Create the store and restore the persisted subset
    ///
    /// Missing, outdated or unreadable persisted values leave the defaults in
    /// place.
    pub fn rehydrate(
        service: Arc<dyn AuthService>,
        persistence: Arc<dyn PersistenceAdapter>,
    ) -> Self {
        let store = Self::new(service, persistence);

        match load_persisted::<PersistedAuth>(
            store.persistence.as_ref(),
            AUTH_STORAGE_KEY,
            AUTH_STORAGE_VERSION,
        ) {
            Ok(Some(persisted)) => {
                debug!(
                    authenticated = persisted.user.is_some(),
                    "Rehydrated auth state"
                );
                store.store.patch(AuthPatch::Rehydrate(persisted));
            }
            Ok(None) => debug!("No persisted auth state"),
            Err(e) => warn!(error = %e, "Ignoring unreadable auth state"),
        }

        store
    }

    // ==================== Synchronous access ====================

    pub fn snapshot(&self) -> AuthState {
        self.store.snapshot()
    }

    pub fn subscribe<F>(&self, listener: F) -> Subscription<AuthState>
    where
        F: Fn(&AuthState) + Send + Sync + 'static,
    {
        self.store.subscribe(listener)
    }

    pub fn user(&self) -> Option<User> {
        self.store.with(|state| state.user.clone())
    }

    pub fn is_authenticated(&self) -> bool {
        self.store.with(|state| state.is_authenticated)
    }

    pub fn is_loading(&self) -> bool {
        self.store.with(|state| state.loading)
    }

    pub fn is_initialized(&self) -> bool {
        self.store.with(|state| state.initialized)
    }

    /// Whether the signed-in user may perform `action` on `resource`
    pub fn has_permission(&self, resource: Resource, action: Action) -> bool {
        self.store.with(|state| {
            state
                .user
                .as_ref()
                .is_some_and(|user| user.can(resource, action))
        })
    }

    // ==================== Setters ====================

    pub fn set_user(&self, user: Option<User>) {
        self.commit(AuthPatch::SetUser(user));
    }

    pub fn set_loading(&self, loading: bool) {
        self.commit(AuthPatch::SetLoading(loading));
    }

    pub fn set_initialized(&self, initialized: bool) {
        self.commit(AuthPatch::SetInitialized(initialized));
    }

    /// Clear the local identity without contacting the backend
    pub fn logout(&self) {
        info!("Local logout");
        self.commit(AuthPatch::SetUser(None));
    }

    // ==================== Remote session ====================

    /// Ask the backend for the live session and settle startup state
    ///
    /// A failed check ends with no user: a rehydrated identity is only kept
    /// once the backend confirms it.
    pub async fn check_session(&self) -> Option<User> {
        self.commit(AuthPatch::SetLoading(true));

        match self.service.current_user().await {
            Ok(user) => {
                debug!(authenticated = user.is_some(), "Session checked");
                self.commit(AuthPatch::SetUser(user));
            }
            Err(e) => {
                warn!(error = %e, "Session check failed");
                self.commit(AuthPatch::SetUser(None));
            }
        }

        self.commit(AuthPatch::SetInitialized(true));
        self.user()
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> StoreResult<User> {
        self.commit(AuthPatch::SetLoading(true));

        match self.service.sign_in(email, password).await {
            Ok(user) => {
                info!(user_id = %user.id, "Signed in");
                self.commit(AuthPatch::SetUser(Some(user.clone())));
                Ok(user)
            }
            Err(e) => {
                error!(error = %e, "Sign-in failed");
                self.commit(AuthPatch::SetLoading(false));
                Err(e.into())
            }
        }
    }

    /// End the remote session, then clear the local identity
    pub async fn sign_out(&self) -> StoreResult<()> {
        self.commit(AuthPatch::SetLoading(true));

        match self.service.sign_out().await {
            Ok(()) => {
                info!("Signed out");
                self.commit(AuthPatch::SetUser(None));
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "Sign-out failed");
                self.commit(AuthPatch::SetLoading(false));
                Err(e.into())
            }
        }
    }

    // ==================== Persistence ====================

    fn commit(&self, patch: AuthPatch) {
        self.store.patch(patch);
        self.persist();
    }

    /// Write the persisted subset of the current state
    ///
    /// The snapshot is taken under the persist lock, so whichever write lands
    /// last carries the latest committed state.
    pub fn persist(&self) {
        let _guard = self
            .persist_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let subset = self.store.with(|state| PersistedAuth::from(state));

        if let Err(e) = save_persisted(
            self.persistence.as_ref(),
            AUTH_STORAGE_KEY,
            AUTH_STORAGE_VERSION,
            &subset,
        ) {
            warn!(error = %e, "Failed to persist auth state");
        }
    }
}

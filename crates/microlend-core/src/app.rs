//! Store wiring for one process

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::debug;

use crate::auth::AuthStore;
use crate::collection::{ClientStore, LoanStore, PaymentStore};
use crate::config::Config;
use crate::notifications::NotificationStore;
use crate::preferences::PreferencesStore;
use crate::remote::Backend;
use crate::storage::{FilePersistence, PersistenceAdapter};

/// Every store the application uses, created once at startup
pub struct AppStores {
    pub auth: AuthStore,
    pub payments: PaymentStore,
    pub loans: LoanStore,
    pub clients: ClientStore,
    pub notifications: NotificationStore,
    pub preferences: PreferencesStore,
}

impl AppStores {
    /// Build the stores, rehydrating persisted subsets before returning
    pub fn open(
        config: &Config,
        backend: Backend,
        persistence: Arc<dyn PersistenceAdapter>,
    ) -> Self {
        let strategy = config.update_strategy;
        debug!(%strategy, capacity = config.effective_notification_capacity(), "Opening stores");

        Self {
            auth: AuthStore::rehydrate(backend.auth, persistence.clone()),
            payments: PaymentStore::with_strategy(backend.payments, strategy),
            loans: LoanStore::with_strategy(backend.loans, strategy),
            clients: ClientStore::with_strategy(backend.clients, strategy),
            notifications: NotificationStore::new(config.effective_notification_capacity()),
            preferences: PreferencesStore::rehydrate(persistence, &config.default_language),
        }
    }

    /// Stores over the file-backed local backend and state directory
    pub fn open_local(config: &Config) -> Result<Self> {
        let backend = Backend::open_local(&config.backend_dir()).with_context(|| {
            format!("Failed to open local backend at {:?}", config.backend_dir())
        })?;
        let persistence = Arc::new(FilePersistence::new(config.state_dir()));
        Ok(Self::open(config, backend, persistence))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::UpdateStrategy;
    use crate::models::{ClientDraft, LoanDraft, PaymentDraft};
    use crate::remote::{LocalAccount, LocalAuthService};
    use crate::user::{Role, User};
    use tempfile::TempDir;

    fn config(dir: &TempDir) -> Config {
        Config {
            data_dir: dir.path().to_path_buf(),
            notification_capacity: 3,
            update_strategy: UpdateStrategy::Optimistic,
            ..Config::default()
        }
    }

    fn account() -> LocalAccount {
        LocalAccount {
            user: User::new("ana@example.com", "Ana", Role::Agent),
            password: "secret".to_string(),
        }
    }

    #[test]
    fn test_open_applies_config() {
        let temp_dir = TempDir::new().unwrap();
        let stores = AppStores::open(
            &config(&temp_dir),
            Backend::in_memory(vec![]),
            Arc::new(crate::storage::MemoryPersistence::new()),
        );

        assert_eq!(stores.payments.strategy(), UpdateStrategy::Optimistic);
        assert_eq!(stores.notifications.snapshot().capacity, 3);
        assert!(stores.auth.is_loading());
        assert_eq!(stores.preferences.language(), "es");
    }

    #[tokio::test]
    async fn test_local_stores_survive_restart() {
        let temp_dir = TempDir::new().unwrap();
        let config = config(&temp_dir);

        let payment_id = {
            LocalAuthService::open(&config.backend_dir())
                .unwrap()
                .register(account())
                .unwrap();
            let stores = AppStores::open_local(&config).unwrap();

            stores.auth.sign_in("ana@example.com", "secret").await.unwrap();
            let agent_id = stores.auth.user().unwrap().id;
            let client = stores
                .clients
                .create(ClientDraft::new(agent_id, "Rosa Quispe"))
                .await
                .unwrap();
            let loan = stores
                .loans
                .create(LoanDraft::new(client.id, 100_000, 1200, 12))
                .await
                .unwrap();
            stores
                .payments
                .create(PaymentDraft::new(loan.id, 9_000))
                .await
                .unwrap()
                .id
        };

        let stores = AppStores::open_local(&config).unwrap();
        assert!(stores.auth.is_authenticated());

        stores.auth.check_session().await;
        assert!(stores.auth.is_authenticated());

        stores.payments.fetch_all().await;
        assert_eq!(stores.payments.items().len(), 1);
        assert_eq!(stores.payments.items()[0].id, payment_id);
    }
}

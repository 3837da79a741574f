//! Microlend Core Library
//!
//! Client-side state layer for a micro-lending field app: the signed-in
//! agent, cached clients, loans and payments, transient notifications and
//! UI preferences.
//!
//! # Architecture
//!
//! - **Store**: single-owner state container with synchronous, ordered
//!   change notification
//! - **Remote services**: async traits the stores call for backend I/O
//! - **Persistence adapter**: key-value storage for the subsets that
//!   survive restarts (auth session, preferences)
//!
//! # Quick Start
//!
//! ```text
//! let config = Config::load()?;
//! let stores = AppStores::open_local(&config)?;
//!
//! stores.auth.check_session().await;
//! stores.payments.fetch_by_parent(&loan_id).await;
//!
//! for payment in stores.payments.items() {
//!     println!("{} {}", payment.id, payment.amount);
//! }
//! ```
//!
//! # Modules
//!
//! - `store`: generic observable state container
//! - `auth`: identity and session lifecycle
//! - `collection`: cached entity collections (payments, loans, clients)
//! - `notifications`: bounded notification queue
//! - `preferences`: language and theme
//! - `remote`: backend service traits and the local document backend
//! - `storage`: persistence adapter
//! - `config`: application configuration

pub mod app;
pub mod auth;
pub mod collection;
pub mod config;
pub mod error;
pub mod models;
pub mod notifications;
pub mod preferences;
pub mod remote;
pub mod storage;
pub mod store;
pub mod user;

pub use app::AppStores;
pub use auth::{AuthState, AuthStore};
pub use collection::{ClientStore, CollectionStore, LoanStore, PaymentStore, UpdateStrategy};
pub use config::Config;
pub use error::{StoreError, StoreResult};
pub use models::{Client, Entity, Loan, LoanStatus, Payment, PaymentStatus};
pub use notifications::{Notification, NotificationKind, NotificationStore};
pub use preferences::{PreferencesStore, Theme};
pub use remote::{AuthService, Backend, RemoteError, RemoteService};
pub use storage::{FilePersistence, MemoryPersistence, PersistenceAdapter, StorageError};
pub use store::{Reducer, Store, Subscription};
pub use user::{Action, Resource, Role, User};

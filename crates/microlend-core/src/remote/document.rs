//! Local document backend
//!
//! A stand-in for the hosted document store: each collection is a vector of
//! documents kept in memory and, when opened from a directory, mirrored to a
//! JSON file after every successful write.
//!
//! Files inside the backend directory:
//! - `clients.json`, `loans.json`, `payments.json` - one array per collection
//! - `users.json` - accounts able to sign in
//! - `session.json` - id of the signed-in account

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use super::{AuthService, RemoteError, RemoteResult, RemoteService};
use crate::models::{Client, Entity, Loan, Payment};
use crate::storage::{atomic_write, StorageError, StorageResult};
use crate::user::User;

/// One collection of documents
pub struct DocumentRemote<E> {
    docs: Mutex<Vec<E>>,
    path: Option<PathBuf>,
}

impl<E: Entity> DocumentRemote<E> {
    /// Empty in-memory collection
    pub fn new() -> Self {
        Self::with_documents(Vec::new())
    }

    /// In-memory collection with initial documents
    pub fn with_documents(docs: Vec<E>) -> Self {
        Self {
            docs: Mutex::new(docs),
            path: None,
        }
    }

    /// Collection mirrored to a JSON file
    ///
    /// A missing file is an empty collection.
    pub fn open(path: impl Into<PathBuf>) -> StorageResult<Self> {
        let path = path.into();
        let docs = read_json_or_default(&path)?;

        Ok(Self {
            docs: Mutex::new(docs),
            path: Some(path),
        })
    }

    /// Copy of every stored document
    pub fn documents(&self) -> Vec<E> {
        self.docs().clone()
    }

    /// Store a document as-is, replacing one with the same id
    pub fn insert(&self, doc: E) -> RemoteResult<()> {
        self.mutate(|docs| {
            match docs.iter_mut().find(|d| d.id() == doc.id()) {
                Some(existing) => *existing = doc,
                None => docs.push(doc),
            }
            Ok(())
        })
    }

    fn docs(&self) -> MutexGuard<'_, Vec<E>> {
        self.docs
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Apply a change to a copy, persist it, then publish it
    fn mutate<R>(&self, f: impl FnOnce(&mut Vec<E>) -> RemoteResult<R>) -> RemoteResult<R> {
        let mut docs = self.docs();
        let mut next = docs.clone();
        let out = f(&mut next)?;

        if let Some(ref path) = self.path {
            write_json(path, &next).map_err(|e| RemoteError::Backend(e.to_string()))?;
        }

        *docs = next;
        Ok(out)
    }
}

impl<E: Entity> Default for DocumentRemote<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<E: Entity> RemoteService<E> for DocumentRemote<E> {
    async fn list(&self) -> RemoteResult<Vec<E>> {
        tokio::task::yield_now().await;
        Ok(self.documents())
    }

    async fn list_by_parent(&self, parent_id: &str) -> RemoteResult<Vec<E>> {
        tokio::task::yield_now().await;
        Ok(self
            .docs()
            .iter()
            .filter(|d| d.parent_id() == parent_id)
            .cloned()
            .collect())
    }

    async fn get_by_id(&self, id: &str) -> RemoteResult<Option<E>> {
        tokio::task::yield_now().await;
        Ok(self.docs().iter().find(|d| d.id() == id).cloned())
    }

    async fn create(&self, draft: E::Draft) -> RemoteResult<String> {
        tokio::task::yield_now().await;
        let id = Uuid::new_v4().to_string();
        let doc = E::from_draft(id.clone(), draft, Utc::now());

        self.mutate(|docs| {
            docs.push(doc);
            Ok(())
        })?;

        debug!(kind = E::KIND, %id, "Document created");
        Ok(id)
    }

    async fn update(&self, id: &str, update: E::Update) -> RemoteResult<()> {
        tokio::task::yield_now().await;
        self.mutate(|docs| match docs.iter_mut().find(|d| d.id() == id) {
            Some(doc) => {
                doc.apply_update(&update);
                Ok(())
            }
            None => Err(RemoteError::Backend(format!(
                "No {} document to update: {}",
                E::KIND,
                id
            ))),
        })
    }

    async fn delete(&self, id: &str) -> RemoteResult<()> {
        tokio::task::yield_now().await;
        self.mutate(|docs| {
            docs.retain(|d| d.id() != id);
            Ok(())
        })
    }

    async fn search(&self, query: &str) -> RemoteResult<Vec<E>> {
        tokio::task::yield_now().await;
        Ok(self
            .docs()
            .iter()
            .filter(|d| d.matches(query))
            .cloned()
            .collect())
    }
}

// ==================== Accounts ====================

/// A user together with the password checked at sign-in
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalAccount {
    #[serde(flatten)]
    pub user: User,
    pub password: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct SessionFile {
    user_id: Option<String>,
}

/// Identity provider backed by local files
pub struct LocalAuthService {
    accounts: Mutex<Vec<LocalAccount>>,
    accounts_path: Option<PathBuf>,
    session: Mutex<Option<String>>,
    session_path: Option<PathBuf>,
}

impl LocalAuthService {
    /// In-memory provider with the given accounts and no session
    pub fn new(accounts: Vec<LocalAccount>) -> Self {
        Self {
            accounts: Mutex::new(accounts),
            accounts_path: None,
            session: Mutex::new(None),
            session_path: None,
        }
    }

    /// Provider reading `users.json` and `session.json` from `dir`
    pub fn open(dir: &Path) -> StorageResult<Self> {
        let accounts_path = dir.join("users.json");
        let session_path = dir.join("session.json");
        let accounts: Vec<LocalAccount> = read_json_or_default(&accounts_path)?;
        let session: SessionFile = read_json_or_default(&session_path)?;

        Ok(Self {
            accounts: Mutex::new(accounts),
            accounts_path: Some(accounts_path),
            session: Mutex::new(session.user_id),
            session_path: Some(session_path),
        })
    }

    /// Add an account; emails are unique ignoring case
    pub fn register(&self, account: LocalAccount) -> RemoteResult<User> {
        let mut accounts = lock(&self.accounts);

        if accounts
            .iter()
            .any(|a| a.user.email.eq_ignore_ascii_case(&account.user.email))
        {
            return Err(RemoteError::Conflict(format!(
                "An account for {} already exists",
                account.user.email
            )));
        }

        let user = account.user.clone();
        let mut next = accounts.clone();
        next.push(account);

        if let Some(ref path) = self.accounts_path {
            write_json(path, &next).map_err(|e| RemoteError::Backend(e.to_string()))?;
        }
        *accounts = next;

        Ok(user)
    }

    fn set_session(&self, user_id: Option<String>) -> RemoteResult<()> {
        if let Some(ref path) = self.session_path {
            let file = SessionFile {
                user_id: user_id.clone(),
            };
            write_json(path, &file).map_err(|e| RemoteError::Backend(e.to_string()))?;
        }
        *lock(&self.session) = user_id;
        Ok(())
    }
}

#[async_trait]
impl AuthService for LocalAuthService {
    async fn sign_in(&self, email: &str, password: &str) -> RemoteResult<User> {
        tokio::task::yield_now().await;

        let user = {
            let accounts = lock(&self.accounts);
            let account = accounts
                .iter()
                .find(|a| a.user.email.eq_ignore_ascii_case(email))
                .filter(|a| a.password == password)
                .ok_or_else(|| RemoteError::Unauthorized("Invalid email or password".to_string()))?;

            if !account.user.active {
                return Err(RemoteError::Unauthorized(format!(
                    "Account {} is disabled",
                    account.user.email
                )));
            }
            account.user.clone()
        };

        self.set_session(Some(user.id.clone()))?;
        Ok(user)
    }

    async fn sign_out(&self) -> RemoteResult<()> {
        tokio::task::yield_now().await;
        self.set_session(None)
    }

    async fn current_user(&self) -> RemoteResult<Option<User>> {
        tokio::task::yield_now().await;

        let Some(user_id) = lock(&self.session).clone() else {
            return Ok(None);
        };

        Ok(lock(&self.accounts)
            .iter()
            .find(|a| a.user.id == user_id && a.user.active)
            .map(|a| a.user.clone()))
    }
}

// ==================== Wiring ====================

/// Remote services for every store
#[derive(Clone)]
pub struct Backend {
    pub auth: Arc<dyn AuthService>,
    pub clients: Arc<dyn RemoteService<Client>>,
    pub loans: Arc<dyn RemoteService<Loan>>,
    pub payments: Arc<dyn RemoteService<Payment>>,
}

impl Backend {
    /// Empty in-memory backend with the given accounts
    pub fn in_memory(accounts: Vec<LocalAccount>) -> Self {
        Self {
            auth: Arc::new(LocalAuthService::new(accounts)),
            clients: Arc::new(DocumentRemote::<Client>::new()),
            loans: Arc::new(DocumentRemote::<Loan>::new()),
            payments: Arc::new(DocumentRemote::<Payment>::new()),
        }
    }

    /// File-backed backend rooted at `dir`
    pub fn open_local(dir: &Path) -> StorageResult<Self> {
        Ok(Self {
            auth: Arc::new(LocalAuthService::open(dir)?),
            clients: Arc::new(DocumentRemote::<Client>::open(collection_path::<Client>(dir))?),
            loans: Arc::new(DocumentRemote::<Loan>::open(collection_path::<Loan>(dir))?),
            payments: Arc::new(DocumentRemote::<Payment>::open(collection_path::<Payment>(
                dir,
            ))?),
        })
    }
}

fn collection_path<E: Entity>(dir: &Path) -> PathBuf {
    dir.join(format!("{}.json", E::KIND))
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn read_json_or_default<T: Default + for<'de> Deserialize<'de>>(path: &Path) -> StorageResult<T> {
    match fs::read_to_string(path) {
        Ok(content) => serde_json::from_str(&content).map_err(|source| {
            StorageError::Serialization {
                key: path.display().to_string(),
                source,
            }
        }),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(T::default()),
        Err(source) => Err(StorageError::ReadError {
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> StorageResult<()> {
    let json = serde_json::to_vec_pretty(value).map_err(|source| StorageError::Serialization {
        key: path.display().to_string(),
        source,
    })?;
    atomic_write(path, &json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PaymentDraft, PaymentStatus, PaymentUpdate};
    use crate::user::Role;
    use tempfile::TempDir;

    fn account(email: &str, password: &str) -> LocalAccount {
        LocalAccount {
            user: User::new(email, "Test User", Role::Agent),
            password: password.to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_then_get() {
        let remote = DocumentRemote::<Payment>::new();
        let id = remote.create(PaymentDraft::new("loan-1", 1500)).await.unwrap();

        let payment = remote.get_by_id(&id).await.unwrap().unwrap();
        assert_eq!(payment.loan_id, "loan-1");
        assert_eq!(payment.amount, 1500);
    }

    #[tokio::test]
    async fn test_get_missing_is_none() {
        let remote = DocumentRemote::<Payment>::new();
        assert!(remote.get_by_id("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_missing_is_backend_error() {
        let remote = DocumentRemote::<Payment>::new();
        let err = remote
            .update("nope", PaymentUpdate::status(PaymentStatus::Paid))
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::Backend(_)));
    }

    #[tokio::test]
    async fn test_list_by_parent_and_search() {
        let remote = DocumentRemote::<Payment>::new();
        remote.create(PaymentDraft::new("loan-1", 100)).await.unwrap();
        remote.create(PaymentDraft::new("loan-2", 200)).await.unwrap();
        remote
            .create(PaymentDraft::new("loan-1", 300).with_status(PaymentStatus::Overdue))
            .await
            .unwrap();

        assert_eq!(remote.list_by_parent("loan-1").await.unwrap().len(), 2);
        let overdue = remote.search("OVERDUE").await.unwrap();
        assert_eq!(overdue.len(), 1);
        assert_eq!(overdue[0].amount, 300);
    }

    #[tokio::test]
    async fn test_file_backed_collection_persists() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("payments.json");

        let id = {
            let remote = DocumentRemote::<Payment>::open(&path).unwrap();
            remote.create(PaymentDraft::new("loan-1", 100)).await.unwrap()
        };

        let reopened = DocumentRemote::<Payment>::open(&path).unwrap();
        assert!(reopened.get_by_id(&id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_sign_in_checks_password_and_active_flag() {
        let mut disabled = account("off@example.com", "pw");
        disabled.user.active = false;
        let auth = LocalAuthService::new(vec![account("ana@example.com", "secret"), disabled]);

        assert!(auth.sign_in("ANA@example.com", "secret").await.is_ok());
        assert!(matches!(
            auth.sign_in("ana@example.com", "wrong").await,
            Err(RemoteError::Unauthorized(_))
        ));
        assert!(matches!(
            auth.sign_in("off@example.com", "pw").await,
            Err(RemoteError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn test_session_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();

        {
            let auth = LocalAuthService::open(temp_dir.path()).unwrap();
            auth.register(account("ana@example.com", "secret")).unwrap();
            auth.sign_in("ana@example.com", "secret").await.unwrap();
        }

        let auth = LocalAuthService::open(temp_dir.path()).unwrap();
        let user = auth.current_user().await.unwrap().unwrap();
        assert_eq!(user.email, "ana@example.com");

        auth.sign_out().await.unwrap();
        assert!(auth.current_user().await.unwrap().is_none());
    }

    #[test]
    fn test_register_rejects_duplicate_email() {
        let auth = LocalAuthService::new(vec![account("ana@example.com", "a")]);
        let err = auth.register(account("Ana@Example.com", "b")).unwrap_err();
        assert!(matches!(err, RemoteError::Conflict(_)));
    }
}
